//! Erros do VFS.

use crate::mm::MmError;
use crate::sys::Errno;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    Exists,
    NotDirectory,
    IsDirectory,
    InvalidArgument,
    /// O filesystem não implementa a operação.
    NotSupported,
    ReadOnly,
    NoSpace,
    /// Ponto de montagem ou árvore ainda em uso.
    Busy,
    NameTooLong,
    /// Cadeia de symlinks longa demais.
    Loop,
    BadFd,
    TooManyFiles,
    BrokenPipe,
    /// Falha do servidor (userfs) ou do transporte.
    Io,
    /// Espera interrompida por sinal.
    Interrupted,
    Memory(MmError),
}

impl FsError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "arquivo não encontrado",
            Self::Exists => "arquivo já existe",
            Self::NotDirectory => "não é diretório",
            Self::IsDirectory => "é diretório",
            Self::InvalidArgument => "argumento inválido",
            Self::NotSupported => "operação não suportada",
            Self::ReadOnly => "filesystem somente leitura",
            Self::NoSpace => "sem espaço",
            Self::Busy => "em uso",
            Self::NameTooLong => "nome longo demais",
            Self::Loop => "symlinks demais",
            Self::BadFd => "descritor inválido",
            Self::TooManyFiles => "descritores esgotados",
            Self::BrokenPipe => "pipe sem leitor",
            Self::Io => "erro de E/S",
            Self::Interrupted => "interrompido por sinal",
            Self::Memory(e) => e.as_str(),
        }
    }
}

impl core::fmt::Display for FsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<MmError> for FsError {
    fn from(e: MmError) -> Self {
        Self::Memory(e)
    }
}

impl From<FsError> for Errno {
    fn from(e: FsError) -> Errno {
        match e {
            FsError::NotFound => Errno::ENOENT,
            FsError::Exists => Errno::EEXIST,
            FsError::NotDirectory => Errno::ENOTDIR,
            FsError::IsDirectory => Errno::EISDIR,
            FsError::InvalidArgument => Errno::EINVAL,
            FsError::NotSupported => Errno::ENOSYS,
            FsError::ReadOnly => Errno::EROFS,
            FsError::NoSpace => Errno::ENOSPC,
            FsError::Busy => Errno::EBUSY,
            FsError::NameTooLong => Errno::ENAMETOOLONG,
            FsError::Loop => Errno::ELOOP,
            FsError::BadFd => Errno::EBADF,
            FsError::TooManyFiles => Errno::EMFILE,
            FsError::BrokenPipe => Errno::EPIPE,
            FsError::Io => Errno::EIO,
            FsError::Interrupted => Errno::ERESTARTSYS,
            FsError::Memory(e) => e.into(),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;
