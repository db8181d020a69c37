//! # I/O Syscalls
//!
//! io_read, io_write, io_close, pipe
//!
//! Os dados passam por um buffer do kernel: o handle nunca vê ponteiros de
//! usuário.

use crate::fs::{pipe, Io};
use crate::mm::config::PAGE_SIZE;
use crate::mm::usercopy::{copy_from_user, copy_to_user, write_user};
use crate::sched::TaskError;
use crate::sys::{Errno, SysResult};
use crate::syscall::abi::{user_aspace, SyscallArgs};
use alloc::sync::Arc;
use alloc::vec;

/// Maior bloco copiado por vez entre o usuário e o handle.
const IO_CHUNK: usize = 16 * PAGE_SIZE;

// === WRAPPERS ===

pub fn sys_io_read_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_io_read(args.arg1, args.arg2, args.arg3)
}

pub fn sys_io_write_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_io_write(args.arg1, args.arg2, args.arg3)
}

pub fn sys_io_close_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_io_close(args.arg1)
}

pub fn sys_pipe_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_pipe(args.arg1)
}

// === HELPERS ===

/// Handle de `fd` no processo corrente. A tabela não fica travada enquanto o
/// handle é usado.
pub fn get_fd(fd: usize) -> SysResult<Arc<dyn Io>> {
    let process = crate::sched::current_process().ok_or(TaskError::NoCurrentThread)?;
    let io = process.files.lock().get(fd)?;
    Ok(io)
}

/// Instala `io` na tabela do processo corrente.
pub fn install_fd(io: Arc<dyn Io>) -> SysResult<usize> {
    let process = crate::sched::current_process().ok_or(TaskError::NoCurrentThread)?;
    let fd = process.files.lock().install(io)?;
    Ok(fd)
}

fn close_fd(fd: usize) -> SysResult<Arc<dyn Io>> {
    let process = crate::sched::current_process().ok_or(TaskError::NoCurrentThread)?;
    let io = process.files.lock().close(fd)?;
    Ok(io)
}

// === IMPLEMENTAÇÕES ===

/// Lê até `len` bytes. Leitura curta é normal; 0 é fim de arquivo.
pub fn sys_io_read(fd: usize, buf_ptr: usize, len: usize) -> SysResult<usize> {
    let io = get_fd(fd)?;
    if len == 0 {
        return Ok(0);
    }
    if buf_ptr == 0 {
        return Err(Errno::EFAULT);
    }
    let aspace = user_aspace()?;
    let mut kbuf = vec![0u8; len.min(IO_CHUNK)];
    let n = io.read(&mut kbuf)?;
    copy_to_user(&aspace, buf_ptr, &kbuf[..n])?;
    Ok(n)
}

/// Escreve `len` bytes em blocos. Para no primeiro bloco curto; um erro depois de
/// algo escrito vira escrita parcial.
pub fn sys_io_write(fd: usize, buf_ptr: usize, len: usize) -> SysResult<usize> {
    let io = get_fd(fd)?;
    if len == 0 {
        return Ok(0);
    }
    if buf_ptr == 0 {
        return Err(Errno::EFAULT);
    }
    let aspace = user_aspace()?;
    let mut kbuf = vec![0u8; len.min(IO_CHUNK)];
    let mut done = 0;

    while done < len {
        let chunk = (len - done).min(IO_CHUNK);
        copy_from_user(&aspace, buf_ptr + done, &mut kbuf[..chunk])?;
        let n = match io.write(&kbuf[..chunk]) {
            Ok(n) => n,
            Err(_) if done > 0 => break,
            Err(e) => return Err(e.into()),
        };
        done += n;
        if n < chunk {
            break;
        }
    }
    Ok(done)
}

/// Tira `fd` da tabela. O handle fecha com a última referência.
pub fn sys_io_close(fd: usize) -> SysResult<usize> {
    close_fd(fd)?;
    Ok(0)
}

/// Cria um pipe e escreve os dois fds (`u32` de leitura, `u32` de escrita) em
/// `fds_ptr`.
pub fn sys_pipe(fds_ptr: usize) -> SysResult<usize> {
    if fds_ptr == 0 {
        return Err(Errno::EFAULT);
    }
    let aspace = user_aspace()?;
    let (reader, writer) = pipe::pipe();
    let read_fd = install_fd(reader)?;
    let write_fd = match install_fd(writer) {
        Ok(fd) => fd,
        Err(e) => {
            let _ = close_fd(read_fd);
            return Err(e);
        }
    };

    let fds = [read_fd as u32, write_fd as u32];
    let written = write_user(&aspace, fds_ptr, &fds[0]).and_then(|_| write_user(&aspace, fds_ptr + 4, &fds[1]));
    if let Err(e) = written {
        let _ = close_fd(read_fd);
        let _ = close_fd(write_fd);
        return Err(e.into());
    }
    crate::ktrace!("(Syscall) pipe: fd de leitura ", read_fd as u64);
    Ok(0)
}
