//! Interface Abstrata de CPU (HAL).
//! Define as operações que qualquer arquitetura (x86, RISC-V, hospedada) deve implementar.

use crate::sys::Errno;

/// Motivo de um IPI enviado pelo kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpiKind {
    /// Invalidar TLB (ver `mm::paging::tlb`).
    TlbShootdown,
    /// Parar a CPU (pânico).
    Halt,
}

pub trait CpuOps {
    /// Índice da CPU corrente (0..MAX_CPUS).
    fn current_id() -> usize;

    /// Para a execução da CPU até a próxima interrupção.
    fn halt();

    /// Dica para a CPU que estamos em um spinloop.
    fn relax();

    /// Desabilita interrupções globalmente.
    fn disable_interrupts();

    /// Habilita interrupções globalmente.
    fn enable_interrupts();

    /// Verifica se as interrupções estão habilitadas.
    fn are_interrupts_enabled() -> bool;

    /// Envia um IPI para `target`. Sem controlador de interrupções: `ENOSYS`.
    fn send_ipi(_target: usize, _kind: IpiKind) -> Result<(), Errno> {
        Err(Errno::ENOSYS)
    }

    /// Entra em loop infinito de halt com interrupções desabilitadas.
    /// Usado em pânicos irrecuperáveis.
    fn hang() -> ! {
        Self::disable_interrupts();
        loop {
            Self::halt();
        }
    }
}
