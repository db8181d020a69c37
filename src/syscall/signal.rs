//! # Signal Syscalls
//!
//! sigaction, sigreturn, kill

use crate::arch::TrapFrame;
use crate::mm::usercopy::{read_user, write_user};
use crate::sched::signal::{self, Disposition, UserSigAction};
use crate::sys::{Errno, Pid, SysResult};
use crate::syscall::abi::{user_aspace, SyscallArgs};

// === WRAPPERS ===

pub fn sys_sigaction_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_sigaction(args.arg1, args.arg2, args.arg3)
}

pub fn sys_sigreturn_wrapper(_args: &SyscallArgs, frame: &mut TrapFrame) -> SysResult<()> {
    sys_sigreturn(frame)
}

pub fn sys_kill_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_kill(args.arg1, args.arg2)
}

// === IMPLEMENTAÇÕES ===

/// Instala a ação em `new_ptr` (0 = só consulta) e escreve a anterior em
/// `old_ptr` (0 = descarta).
pub fn sys_sigaction(sig: usize, new_ptr: usize, old_ptr: usize) -> SysResult<usize> {
    let aspace = user_aspace()?;
    let new = match new_ptr {
        0 => None,
        ptr => Some(Disposition::from(read_user::<UserSigAction>(&aspace, ptr)?)),
    };
    let old = signal::sigaction(sig, new)?;
    if old_ptr != 0 {
        write_user(&aspace, old_ptr, &UserSigAction::from(old))?;
    }
    Ok(0)
}

/// Volta ao contexto salvo antes do handler. O `frame` inteiro é restaurado.
pub fn sys_sigreturn(frame: &mut TrapFrame) -> SysResult<()> {
    signal::sigreturn(frame)?;
    Ok(())
}

pub fn sys_kill(pid: usize, sig: usize) -> SysResult<usize> {
    let pid = u32::try_from(pid).map(Pid).map_err(|_| Errno::ESRCH)?;
    crate::sched::kill(pid, sig)?;
    Ok(0)
}
