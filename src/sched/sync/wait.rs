//! Condições de espera.
//!
//! Uma thread `Blocked` com uma `WaitCondition` anexada só volta a ser escolhida
//! quando `verify()` devolve `true`. A limpeza é o `Drop` da condição: o scheduler
//! a remove da thread antes de colocá-la em `Running`.

use crate::ipc::shm::{IpcConnection, IpcServer};
use crate::sched::task::{Process, Thread, ThreadState};
use alloc::string::String;
use alloc::sync::Arc;

pub enum WaitCondition {
    /// A thread alvo terminou.
    ThreadDead(Arc<Thread>),
    /// O processo (parado por sinal) recebeu SIGCONT ou morreu.
    Continued(Arc<Process>),
    /// Existe conexão pendente no servidor (ou ele foi fechado).
    IpcPending(Arc<IpcServer>),
    /// O handshake da conexão terminou, com sucesso ou não.
    IpcSettled(Arc<IpcConnection>),
    /// Algum servidor anunciou o nome.
    IpcAnnounced(String),
}

impl WaitCondition {
    /// Predicado da espera.
    pub fn verify(&self) -> bool {
        match self {
            Self::ThreadDead(thread) => thread.state() == ThreadState::Dead,
            Self::Continued(process) => !process.is_stopped() || process.has_exited(),
            Self::IpcPending(server) => server.has_pending() || server.is_closed(),
            Self::IpcSettled(conn) => conn.is_settled(),
            Self::IpcAnnounced(name) => crate::ipc::shm::is_announced(name),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ThreadDead(_) => "thread-dead",
            Self::Continued(_) => "continued",
            Self::IpcPending(_) => "ipc-pending",
            Self::IpcSettled(_) => "ipc-settled",
            Self::IpcAnnounced(_) => "ipc-announced",
        }
    }
}

impl core::fmt::Debug for WaitCondition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}
