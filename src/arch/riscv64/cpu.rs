//! CPU RISC-V (modo supervisor sobre SBI).

use crate::arch::traits::{CpuOps, IpiKind};
use crate::sched::config::MAX_CPUS;
use crate::sync::PerCpu;
use crate::sys::Errno;
use core::arch::asm;
use core::sync::atomic::{AtomicU8, Ordering};
use riscv::register::{sie, sip, sstatus};

/// Chamadas SBI legadas.
const SBI_SET_TIMER: usize = 0x00;
const SBI_SEND_IPI: usize = 0x04;
const SBI_SHUTDOWN: usize = 0x08;

/// Motivo pendente do IPI de cada hart (0 = nenhum).
static IPI_MAILBOX: PerCpu<AtomicU8> = PerCpu::new([const { AtomicU8::new(0) }; MAX_CPUS]);

const MAIL_TLB: u8 = 1;
const MAIL_HALT: u8 = 2;

#[inline]
pub(super) fn sbi_call(eid: usize, arg0: usize) -> isize {
    let ret: isize;
    unsafe {
        asm!(
            "ecall",
            inlateout("a0") arg0 => ret,
            in("a7") eid,
            options(nostack),
        );
    }
    ret
}

pub struct RiscvCpu;

impl RiscvCpu {
    /// Programa o próximo timer para `deadline` (em ticks de `time`).
    pub fn set_timer(deadline: u64) {
        sbi_call(SBI_SET_TIMER, deadline as usize);
    }

    pub fn read_time() -> u64 {
        let time: u64;
        unsafe { asm!("rdtime {}", out(reg) time, options(nomem, nostack)) };
        time
    }

    /// Desliga a máquina via SBI.
    pub fn shutdown() -> ! {
        sbi_call(SBI_SHUTDOWN, 0);
        Self::hang();
    }

    /// Habilita interrupções de timer e de software (IPI) no `sie`.
    ///
    /// # Safety
    /// O vetor de traps já deve estar instalado.
    pub unsafe fn enable_sources() {
        sie::set_stimer();
        sie::set_ssoft();
    }
}

/// Lê e limpa o motivo do IPI recebido por esta hart.
pub(super) fn take_ipi() -> IpiKind {
    unsafe { sip::clear_ssoft() };
    match IPI_MAILBOX.get().swap(0, Ordering::AcqRel) {
        MAIL_HALT => IpiKind::Halt,
        _ => IpiKind::TlbShootdown,
    }
}

impl CpuOps for RiscvCpu {
    /// O `_start` guarda o hartid em `tp`.
    fn current_id() -> usize {
        let hart: usize;
        unsafe { asm!("mv {}, tp", out(reg) hart, options(nomem, nostack, preserves_flags)) };
        hart
    }

    #[inline]
    fn halt() {
        unsafe { riscv::asm::wfi() };
    }

    #[inline]
    fn relax() {
        core::hint::spin_loop();
    }

    #[inline]
    fn disable_interrupts() {
        unsafe { sstatus::clear_sie() };
    }

    #[inline]
    fn enable_interrupts() {
        unsafe { sstatus::set_sie() };
    }

    #[inline]
    fn are_interrupts_enabled() -> bool {
        sstatus::read().sie()
    }

    fn send_ipi(target: usize, kind: IpiKind) -> Result<(), Errno> {
        if target >= MAX_CPUS || target >= usize::BITS as usize {
            return Err(Errno::EINVAL);
        }
        let mail = match kind {
            IpiKind::TlbShootdown => MAIL_TLB,
            IpiKind::Halt => MAIL_HALT,
        };
        IPI_MAILBOX.get_for(target).store(mail, Ordering::Release);
        let mask: usize = 1 << target;
        if sbi_call(SBI_SEND_IPI, &mask as *const usize as usize) != 0 {
            return Err(Errno::EIO);
        }
        Ok(())
    }
}

pub type Cpu = RiscvCpu;
