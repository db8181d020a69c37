//! # System Syscalls
//!
//! poweroff, arch_syscall

use crate::arch::{Cpu, CpuOps};
use crate::core::power::{self, POWEROFF_MAGIC};
use crate::sys::{Errno, SysResult};
use crate::syscall::abi::SyscallArgs;
use crate::syscall::numbers::ARCH_CPU_ID;

// === WRAPPERS ===

pub fn sys_poweroff_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_poweroff(args.arg1 != 0, args.arg2)
}

pub fn sys_arch_syscall_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_arch_syscall(args.arg1, [args.arg2, args.arg3, args.arg4, args.arg5])
}

// === IMPLEMENTAÇÕES ===

/// Desliga ou reinicia. Sem o magic certo nada acontece.
pub fn sys_poweroff(reboot: bool, magic: usize) -> SysResult<usize> {
    if magic != POWEROFF_MAGIC as usize {
        crate::kwarn!("(Syscall) poweroff com magic inválido: ", magic as u64);
        return Err(Errno::EINVAL);
    }
    if let Some(process) = crate::sched::current_process() {
        crate::kinfo!("(Syscall) poweroff pedido por pid=", process.pid().0 as u64);
    }
    power::poweroff(reboot)
}

/// Operações específicas da arquitetura. Por enquanto só a CPU corrente.
pub fn sys_arch_syscall(nr: usize, _args: [usize; 4]) -> SysResult<usize> {
    match nr {
        ARCH_CPU_ID => Ok(Cpu::current_id()),
        _ => {
            crate::kdebug!("(Syscall) arch_syscall desconhecida: ", nr as u64);
            Err(Errno::ENOSYS)
        }
    }
}
