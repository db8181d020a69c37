//! # Process Lifecycle
//!
//! exit, fork, exec, spawn, wait, yield e threads.

use crate::arch::TrapFrame;
use crate::sched::task::ExitStatus;
use crate::sched::{exec, fork, TaskError};
use crate::sys::{Errno, Pid, SysResult, Tid};
use crate::syscall::abi::{read_path, read_str_array, SyscallArgs};

// === WRAPPERS ===

pub fn sys_exit_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_exit(args.arg1 as i32)
}

pub fn sys_fork_wrapper(_args: &SyscallArgs, frame: &mut TrapFrame) -> SysResult<usize> {
    sys_fork(frame)
}

pub fn sys_exec_wrapper(args: &SyscallArgs, frame: &mut TrapFrame) -> SysResult<()> {
    sys_exec(frame, args.arg1, args.arg2, args.arg3)
}

pub fn sys_spawn_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_spawn(args.arg1, args.arg2, args.arg3)
}

pub fn sys_wait_for_process_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_wait_for_process(args.arg1)
}

pub fn sys_get_pid_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    sys_get_pid()
}

pub fn sys_get_parent_pid_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    sys_get_parent_pid()
}

pub fn sys_yield_cpu_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    sys_yield_cpu()
}

pub fn sys_create_thread_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_create_thread(args.arg1, args.arg2, args.arg3)
}

pub fn sys_get_tid_wrapper(_args: &SyscallArgs) -> SysResult<usize> {
    sys_get_tid()
}

pub fn sys_thread_exit_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_thread_exit(args.arg1 as i32)
}

pub fn sys_wait_for_thread_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_wait_for_thread(args.arg1)
}

// === IMPLEMENTAÇÕES ===

fn pid_arg(raw: usize) -> SysResult<Pid> {
    u32::try_from(raw).map(Pid).map_err(|_| Errno::ESRCH)
}

/// Encerra o processo atual.
///
/// A thread não volta ao usuário: `return_to_user` a tira da CPU.
pub fn sys_exit(code: i32) -> SysResult<usize> {
    crate::kdebug!("(Syscall) sys_exit code=", code as u64);
    crate::sched::exit_current(ExitStatus::Exited(code));
    Ok(0)
}

/// Duplica o processo. O filho recebe 0 no registrador de retorno.
pub fn sys_fork(frame: &TrapFrame) -> SysResult<usize> {
    let pid = fork::fork(frame)?;
    Ok(pid.0 as usize)
}

/// Troca a imagem do processo. No sucesso o `frame` já aponta para o novo
/// entry point e nada mais é escrito nele.
pub fn sys_exec(frame: &mut TrapFrame, path_ptr: usize, argv_ptr: usize, envp_ptr: usize) -> SysResult<()> {
    let path = read_path(path_ptr)?;
    let argv = read_str_array(argv_ptr)?;
    let envp = read_str_array(envp_ptr)?;
    crate::kdebug!("(Syscall) sys_exec: ", str path.as_str());
    exec::exec(frame, &path, argv, envp)?;
    Ok(())
}

/// Cria um processo novo a partir de um executável.
pub fn sys_spawn(path_ptr: usize, argv_ptr: usize, envp_ptr: usize) -> SysResult<usize> {
    let path = read_path(path_ptr)?;
    let argv = read_str_array(argv_ptr)?;
    let envp = read_str_array(envp_ptr)?;
    let pid = exec::spawn(&path, argv, envp)?;
    crate::kdebug!("(Syscall) sys_spawn pid=", pid.0 as u64);
    Ok(pid.0 as usize)
}

/// Espera o filho `pid` e devolve o código de saída.
pub fn sys_wait_for_process(pid: usize) -> SysResult<usize> {
    let code = crate::sched::wait_for_process(pid_arg(pid)?)?;
    Ok(code as u32 as usize)
}

pub fn sys_get_pid() -> SysResult<usize> {
    let process = crate::sched::current_process().ok_or(TaskError::NoCurrentThread)?;
    Ok(process.pid().0 as usize)
}

/// 0 para processos sem pai.
pub fn sys_get_parent_pid() -> SysResult<usize> {
    let process = crate::sched::current_process().ok_or(TaskError::NoCurrentThread)?;
    Ok(process.parent().map_or(0, |pid| pid.0 as usize))
}

pub fn sys_yield_cpu() -> SysResult<usize> {
    crate::sched::yield_now();
    Ok(0)
}

pub fn sys_create_thread(entry: usize, arg: usize, stack_top: usize) -> SysResult<usize> {
    let tid = crate::sched::create_thread(entry, arg, stack_top)?;
    Ok(tid.0 as usize)
}

pub fn sys_get_tid() -> SysResult<usize> {
    let tid = crate::sched::current_tid().ok_or(TaskError::NoCurrentThread)?;
    Ok(tid.0 as usize)
}

/// Encerra só a thread atual; a última leva o processo.
pub fn sys_thread_exit(code: i32) -> SysResult<usize> {
    crate::sched::exit_current_thread(code);
    Ok(0)
}

pub fn sys_wait_for_thread(tid: usize) -> SysResult<usize> {
    let tid = u32::try_from(tid).map(Tid).map_err(|_| Errno::ESRCH)?;
    let code = crate::sched::wait_for_thread(tid)?;
    Ok(code as u32 as usize)
}
