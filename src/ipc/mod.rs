//! # Inter-Process Communication (IPC)
//!
//! ## Mecanismos
//!
//! | Tipo      | Padrão | Transporte                      | Bloqueio |
//! |-----------|--------|---------------------------------|----------|
//! | IPC-SHM   | 1:1    | dois ring buffers compartilhados | Sim      |
//! | Futex     | N:N    | palavra na memória do usuário   | Sim      |
//!
//! Pipes anônimos moram em `fs::pipe`: são só mais um [`Io`](crate::fs::io::Io).
//!
//! ## Ciclo de um canal
//!
//! 1. O servidor anuncia um nome ([`shm::announce`]) com um limite de conexões pendentes.
//! 2. O cliente pede conexão ([`shm::connect`]) e aloca o buffer em que escreve.
//! 3. O servidor aceita ([`shm::accept`]), aloca o buffer dele e a conexão vira `Attached`.
//! 4. Os dois lados trocam bytes pelos [`channel`]s; fechar qualquer ponta libera a conexão.

pub mod channel;
pub mod futex;
pub mod shm;

#[cfg(any(test, feature = "self_test"))]
pub mod test;

pub use channel::{IpcEndpoint, IpcServerIo};
pub use shm::{IpcConnection, IpcServer};

use crate::mm::MmError;
use crate::sys::Errno;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpcError {
    /// Já existe servidor com esse nome.
    NameInUse,
    /// Nome vazio, tamanho zero ou limite de pendentes zero.
    InvalidArgument,
    /// Fila de pendentes cheia, ou o servidor fechou antes de aceitar.
    ConnectionRefused,
    /// O servidor foi fechado durante o `accept`.
    Aborted,
    /// A outra ponta do canal fechou.
    PeerClosed,
    /// Cursores do ring buffer inconsistentes (o userspace mexeu no cabeçalho).
    Corrupted,
    /// Espera interrompida por sinal.
    Interrupted,
    Memory(MmError),
}

impl IpcError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NameInUse => "nome de servidor em uso",
            Self::InvalidArgument => "argumento inválido",
            Self::ConnectionRefused => "conexão recusada",
            Self::Aborted => "servidor fechado",
            Self::PeerClosed => "a outra ponta fechou",
            Self::Corrupted => "ring buffer corrompido",
            Self::Interrupted => "interrompido por sinal",
            Self::Memory(e) => e.as_str(),
        }
    }
}

impl core::fmt::Display for IpcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MmError> for IpcError {
    fn from(e: MmError) -> Self {
        Self::Memory(e)
    }
}

impl From<IpcError> for Errno {
    fn from(e: IpcError) -> Errno {
        match e {
            IpcError::NameInUse => Errno::EEXIST,
            IpcError::InvalidArgument => Errno::EINVAL,
            IpcError::ConnectionRefused => Errno::ECONNREFUSED,
            IpcError::Aborted => Errno::ECONNABORTED,
            IpcError::PeerClosed => Errno::EPIPE,
            IpcError::Corrupted => Errno::EIO,
            IpcError::Interrupted => Errno::ERESTARTSYS,
            IpcError::Memory(e) => e.into(),
        }
    }
}

pub type IpcResult<T> = Result<T, IpcError>;

/// Inicializa o subsistema de IPC.
pub fn init() {
    crate::kinfo!("(IPC) Inicializando subsistema de IPC...");
    crate::kinfo!("(IPC) IPC inicializado");
}
