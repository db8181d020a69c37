//! # IPC Syscalls
//!
//! futex_wait, futex_wake, ipc_create, ipc_accept, ipc_connect
//!
//! Servidores e conexões viram fds; os dados trafegam com `io_read`/`io_write`
//! ou direto pelos buffers mapeados no processo.

use crate::ipc::channel::{self, IpcEndpoint, IpcServerIo};
use crate::ipc::futex;
use crate::mm::usercopy::write_user;
use crate::sys::{Errno, SysResult};
use crate::syscall::abi::{read_str, user_aspace, SyscallArgs, MAX_NAME};
use crate::syscall::io::{get_fd, install_fd};
use alloc::sync::Arc;

// === WRAPPERS ===

pub fn sys_futex_wait_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_futex_wait(args.arg1, args.arg2 as u32)
}

pub fn sys_futex_wake_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_futex_wake(args.arg1, args.arg2)
}

pub fn sys_ipc_create_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_ipc_create(args.arg1, args.arg2)
}

pub fn sys_ipc_accept_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_ipc_accept(args.arg1, args.arg2)
}

pub fn sys_ipc_connect_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_ipc_connect(args.arg1, args.arg2, args.arg3)
}

// === IMPLEMENTAÇÕES ===

/// Dorme enquanto `*addr == expected`.
pub fn sys_futex_wait(addr: usize, expected: u32) -> SysResult<usize> {
    let aspace = user_aspace()?;
    futex::wait(&aspace, addr, expected)?;
    Ok(0)
}

/// Acorda até `count` threads em `addr`. Devolve quantas acordaram.
pub fn sys_futex_wake(addr: usize, count: usize) -> SysResult<usize> {
    let aspace = user_aspace()?;
    Ok(futex::wake(&aspace, addr, count))
}

/// Anuncia o servidor `name`. Devolve o fd do servidor.
pub fn sys_ipc_create(name_ptr: usize, max_pending: usize) -> SysResult<usize> {
    let name = read_str(name_ptr, MAX_NAME)?;
    let server = channel::create_server(&name, max_pending)?;
    let fd = install_fd(server)?;
    crate::kdebug!("(IPC) Servidor criado: ", str name.as_str());
    Ok(fd)
}

/// Escreve `(leitura, escrita)` dos buffers mapeados em `out_ptr`, se pedido.
fn publish_buffers(endpoint: &IpcEndpoint, out_ptr: usize) -> SysResult<()> {
    if out_ptr == 0 {
        return Ok(());
    }
    let (rx, tx) = endpoint.user_buffers().ok_or(Errno::EFAULT)?;
    let aspace = user_aspace()?;
    write_user(&aspace, out_ptr, &rx)?;
    write_user(&aspace, out_ptr + core::mem::size_of::<usize>(), &tx)?;
    Ok(())
}

fn install_endpoint(endpoint: Arc<IpcEndpoint>, out_ptr: usize) -> SysResult<usize> {
    // Falhar aqui solta a ponta, o que fecha a conexão.
    publish_buffers(&endpoint, out_ptr)?;
    install_fd(endpoint)
}

/// Espera um cliente no servidor `server_fd`. Devolve o fd da conexão.
pub fn sys_ipc_accept(server_fd: usize, out_ptr: usize) -> SysResult<usize> {
    let io = get_fd(server_fd)?;
    let server = io.as_any().downcast_ref::<IpcServerIo>().ok_or(Errno::EBADF)?;
    let endpoint = channel::accept(server)?;
    install_endpoint(endpoint, out_ptr)
}

/// Conecta ao servidor `name` com buffers de `size` bytes. Devolve o fd.
pub fn sys_ipc_connect(name_ptr: usize, size: usize, out_ptr: usize) -> SysResult<usize> {
    let name = read_str(name_ptr, MAX_NAME)?;
    let endpoint = channel::connect(&name, size)?;
    install_endpoint(endpoint, out_ptr)
}
