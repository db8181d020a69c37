//! Tratamento genérico de traps.
//!
//! O assembly de cada arquitetura salva o `TrapFrame`, decodifica a causa em um
//! [`TrapKind`] e chama [`handle`]. Daqui em diante nada depende da arquitetura.
//!
//! Toda trap vinda do modo usuário termina em `sched::return_to_user`, o único ponto
//! onde sinais pendentes são entregues e onde a preempção acontece.

use crate::arch::traits::{IpiKind, UserContext};
use crate::arch::TrapFrame;
use crate::sched::signal::Signal;

/// Informações de um page fault, empacotadas pela arquitetura.
#[derive(Debug, Clone, Copy, Default)]
pub struct PageFaultInfo {
    pub vaddr: usize,
    /// A página estava presente (violação de permissão).
    pub present: bool,
    pub write: bool,
    pub user: bool,
    pub exec: bool,
    /// Instrução que falhou (diagnóstico).
    pub ip: usize,
}

#[derive(Debug, Clone, Copy)]
pub enum TrapKind {
    PageFault(PageFaultInfo),
    Syscall,
    Timer,
    Ipi(IpiKind),
    /// Exceção síncrona que vira sinal em modo usuário.
    Exception { name: &'static str, signal: Signal },
    /// Exceção sem recuperação possível.
    Fatal(&'static str),
}

/// Ponto único de tratamento de traps.
pub fn handle(kind: TrapKind, frame: &mut TrapFrame) {
    let from_user = frame.from_user();

    match kind {
        TrapKind::PageFault(info) => {
            if crate::mm::fault::handle_current(&info).is_err() {
                if from_user {
                    crate::sched::signal::force_current(Signal::SIGSEGV);
                } else {
                    crate::mm::fault::kernel_fault_panic(&info);
                }
            }
        }
        TrapKind::Syscall => crate::syscall::dispatch(frame),
        TrapKind::Timer => crate::sched::timer_tick(),
        TrapKind::Ipi(IpiKind::TlbShootdown) => crate::mm::paging::tlb::handle_ipi(),
        TrapKind::Ipi(IpiKind::Halt) => {
            use crate::arch::traits::CpuOps;
            crate::arch::Cpu::hang();
        }
        TrapKind::Exception { name, signal } => {
            if from_user {
                crate::kdebug!("(Trap) Exceção em usuário: ", str name);
                crate::sched::signal::force_current(signal);
            } else {
                crate::kerror!("(Trap) Exceção no kernel: ", str name);
                crate::kerror!("(Trap) IP=", frame.ip());
                panic!("exceção no kernel");
            }
        }
        TrapKind::Fatal(name) => {
            crate::kerror!("(Trap) Trap fatal: ", str name);
            crate::kerror!("(Trap) IP=", frame.ip());
            panic!("trap fatal");
        }
    }

    if from_user {
        crate::sched::return_to_user(frame);
    }
}
