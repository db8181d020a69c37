//! # Syscall Table
//!
//! Tabela estática de handlers indexada por número de syscall.

use super::super::abi::SyscallArgs;
use super::super::numbers::*;
use super::super::{fs, io, ipc, memory, process, signal, system};
use crate::arch::TrapFrame;
use crate::sys::SysResult;

/// Tipo de handler de syscall
#[derive(Clone, Copy)]
pub enum SyscallHandler {
    /// Só os argumentos; o resultado vai para o registrador de retorno.
    Plain(fn(&SyscallArgs) -> SysResult<usize>),
    /// Precisa do contexto do usuário (fork).
    Frame(fn(&SyscallArgs, &mut TrapFrame) -> SysResult<usize>),
    /// Reescreve o contexto inteiro no sucesso (exec, sigreturn): nada é escrito
    /// no registrador de retorno.
    NoReturn(fn(&SyscallArgs, &mut TrapFrame) -> SysResult<()>),
}

/// Tamanho da tabela (256 syscalls possíveis)
pub const TABLE_SIZE: usize = 256;

/// Tabela de syscalls
///
/// None = syscall não implementada.
pub static SYSCALL_TABLE: [Option<SyscallHandler>; TABLE_SIZE] = {
    use SyscallHandler::{Frame, NoReturn, Plain};
    let mut table: [Option<SyscallHandler>; TABLE_SIZE] = [None; TABLE_SIZE];

    // === PROCESSO (0x01-0x0F) ===
    table[SYS_EXIT] = Some(Plain(process::sys_exit_wrapper));
    table[SYS_FORK] = Some(Frame(process::sys_fork_wrapper));
    table[SYS_EXEC] = Some(NoReturn(process::sys_exec_wrapper));
    table[SYS_SPAWN] = Some(Plain(process::sys_spawn_wrapper));
    table[SYS_WAIT_FOR_PROCESS] = Some(Plain(process::sys_wait_for_process_wrapper));
    table[SYS_GET_PID] = Some(Plain(process::sys_get_pid_wrapper));
    table[SYS_GET_PARENT_PID] = Some(Plain(process::sys_get_parent_pid_wrapper));
    table[SYS_YIELD_CPU] = Some(Plain(process::sys_yield_cpu_wrapper));

    // === THREADS (0x10-0x1F) ===
    table[SYS_CREATE_THREAD] = Some(Plain(process::sys_create_thread_wrapper));
    table[SYS_GET_TID] = Some(Plain(process::sys_get_tid_wrapper));
    table[SYS_THREAD_EXIT] = Some(Plain(process::sys_thread_exit_wrapper));
    table[SYS_WAIT_FOR_THREAD] = Some(Plain(process::sys_wait_for_thread_wrapper));

    // === MEMÓRIA (0x20-0x2F) ===
    table[SYS_MMAP_ANONYMOUS] = Some(Plain(memory::sys_mmap_anonymous_wrapper));
    table[SYS_MMAP_FILE] = Some(Plain(memory::sys_mmap_file_wrapper));
    table[SYS_MUNMAP] = Some(Plain(memory::sys_munmap_wrapper));
    table[SYS_VM_PROTECT] = Some(Plain(memory::sys_vm_protect_wrapper));
    table[SYS_HEAP_CONTROL] = Some(Plain(memory::sys_heap_control_wrapper));

    // === E/S (0x30-0x3F) ===
    table[SYS_IO_READ] = Some(Plain(io::sys_io_read_wrapper));
    table[SYS_IO_WRITE] = Some(Plain(io::sys_io_write_wrapper));
    table[SYS_IO_CLOSE] = Some(Plain(io::sys_io_close_wrapper));
    table[SYS_PIPE] = Some(Plain(io::sys_pipe_wrapper));

    // === FILESYSTEM (0x40-0x4F) ===
    table[SYS_VFS_OPEN] = Some(Plain(fs::sys_vfs_open_wrapper));
    table[SYS_VFS_STAT] = Some(Plain(fs::sys_vfs_stat_wrapper));
    table[SYS_VFS_FSTAT] = Some(Plain(fs::sys_vfs_fstat_wrapper));
    table[SYS_VFS_MOUNT] = Some(Plain(fs::sys_vfs_mount_wrapper));
    table[SYS_VFS_UNMOUNT] = Some(Plain(fs::sys_vfs_unmount_wrapper));
    table[SYS_VFS_READLINK] = Some(Plain(fs::sys_vfs_readlink_wrapper));
    table[SYS_VFS_TOUCH] = Some(Plain(fs::sys_vfs_touch_wrapper));
    table[SYS_VFS_SYMLINK] = Some(Plain(fs::sys_vfs_symlink_wrapper));
    table[SYS_VFS_MKDIR] = Some(Plain(fs::sys_vfs_mkdir_wrapper));
    table[SYS_VFS_LIST_DIR] = Some(Plain(fs::sys_vfs_list_dir_wrapper));
    table[SYS_VFS_CHDIR] = Some(Plain(fs::sys_vfs_chdir_wrapper));
    table[SYS_VFS_GETCWD] = Some(Plain(fs::sys_vfs_getcwd_wrapper));
    table[SYS_VFS_REGISTER_USERFS] = Some(Plain(fs::sys_vfs_register_userfs_wrapper));

    // === SINCRONIZAÇÃO / IPC (0x50-0x5F) ===
    table[SYS_FUTEX_WAIT] = Some(Plain(ipc::sys_futex_wait_wrapper));
    table[SYS_FUTEX_WAKE] = Some(Plain(ipc::sys_futex_wake_wrapper));
    table[SYS_IPC_CREATE] = Some(Plain(ipc::sys_ipc_create_wrapper));
    table[SYS_IPC_ACCEPT] = Some(Plain(ipc::sys_ipc_accept_wrapper));
    table[SYS_IPC_CONNECT] = Some(Plain(ipc::sys_ipc_connect_wrapper));

    // === SINAIS (0x60-0x6F) ===
    table[SYS_SIGACTION] = Some(Plain(signal::sys_sigaction_wrapper));
    table[SYS_SIGRETURN] = Some(NoReturn(signal::sys_sigreturn_wrapper));
    table[SYS_KILL] = Some(Plain(signal::sys_kill_wrapper));

    // === SISTEMA (0xF0-0xFF) ===
    table[SYS_POWEROFF] = Some(Plain(system::sys_poweroff_wrapper));
    table[SYS_ARCH_SYSCALL] = Some(Plain(system::sys_arch_syscall_wrapper));

    table
};
