//! Estados de thread

use bitflags::bitflags;

/// Estado de uma thread. Toda transição acontece com o `state_lock` da thread tomado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// Em construção: ainda não pode ser escolhida.
    Creating,
    /// Pronta, mas nunca executou.
    Created,
    /// Pronta para executar
    Ready,
    /// Executando em alguma CPU
    Running,
    /// Bloqueada numa WaitCondition ou Waitlist
    Blocked,
    /// Terminada, esperando ser colhida pelo scheduler
    Dead,
}

impl ThreadState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Created => "created",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Blocked => "blocked",
            Self::Dead => "dead",
        }
    }
}

/// Modo de execução da thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadMode {
    Kernel,
    User,
}

bitflags! {
    /// Como a arquitetura deve entrar na thread escolhida.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SwitchFlags: u32 {
        /// Primeira execução de uma thread de usuário (retorno de interrupção).
        const START_USER   = 1 << 0;
        /// Primeira execução de uma thread de kernel.
        const START_KERNEL = 1 << 1;
        /// Retomada normal a partir da stack salva.
        const RESUME       = 1 << 2;
    }
}
