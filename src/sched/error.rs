//! Erros do subsistema de tarefas.

use crate::fs::vfs::FsError;
use crate::mm::MmError;
use crate::sys::Errno;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskError {
    /// Pid/tid inexistente (ou já colhido).
    NoSuchProcess,
    NoSuchThread,
    /// Esperar por si mesmo ou por quem não é filho.
    NotChild,
    /// Executável inválido.
    BadExecutable,
    /// Sinal inválido ou não permitido para o alvo.
    InvalidSignal,
    PermissionDenied,
    /// Operação exige uma thread de usuário corrente.
    NoCurrentThread,
    /// Espera interrompida por sinal.
    Interrupted,
    Memory(MmError),
    Fs(FsError),
}

impl TaskError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoSuchProcess => "processo inexistente",
            Self::NoSuchThread => "thread inexistente",
            Self::NotChild => "não é filho do chamador",
            Self::BadExecutable => "executável inválido",
            Self::InvalidSignal => "sinal inválido",
            Self::PermissionDenied => "operação não permitida",
            Self::NoCurrentThread => "sem thread corrente",
            Self::Interrupted => "interrompido por sinal",
            Self::Memory(e) => e.as_str(),
            Self::Fs(e) => e.as_str(),
        }
    }
}

impl core::fmt::Display for TaskError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MmError> for TaskError {
    fn from(e: MmError) -> Self {
        Self::Memory(e)
    }
}

impl From<FsError> for TaskError {
    fn from(e: FsError) -> Self {
        Self::Fs(e)
    }
}

impl From<TaskError> for Errno {
    fn from(e: TaskError) -> Errno {
        match e {
            TaskError::NoSuchProcess | TaskError::NoSuchThread => Errno::ESRCH,
            TaskError::NotChild => Errno::ECHILD,
            TaskError::BadExecutable => Errno::ENOEXEC,
            TaskError::InvalidSignal => Errno::EINVAL,
            TaskError::PermissionDenied => Errno::EPERM,
            TaskError::NoCurrentThread => Errno::EINVAL,
            TaskError::Interrupted => Errno::ERESTARTSYS,
            TaskError::Memory(e) => e.into(),
            TaskError::Fs(e) => e.into(),
        }
    }
}

pub type TaskResult<T> = Result<T, TaskError>;
