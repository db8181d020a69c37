//! Handles de E/S.
//!
//! Tudo que vive na tabela de descritores implementa [`Io`]: arquivos, diretórios,
//! pipes, o console e as pontas de IPC. Fechar é soltar a última referência; cada
//! tipo faz a sua limpeza no `Drop`.

use crate::fs::vfs::{DentryRef, FileStat, FsError, FsResult};
use crate::mm::PageSource;
use alloc::sync::Arc;
use bitflags::bitflags;
use core::any::Any;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    File,
    Directory,
    Pipe,
    Console,
    IpcServer,
    IpcConnection,
}

bitflags! {
    /// Capacidades de um handle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct IoFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        /// Pode ser mapeado com `mmap_file`.
        const MMAP = 1 << 2;
        /// Leituras podem bloquear esperando dados.
        const BLOCKING = 1 << 3;
    }
}

pub trait Io: Send + Sync {
    fn kind(&self) -> IoKind;

    fn flags(&self) -> IoFlags;

    fn read(&self, _buf: &mut [u8]) -> FsResult<usize> {
        Err(FsError::BadFd)
    }

    fn write(&self, _buf: &[u8]) -> FsResult<usize> {
        Err(FsError::BadFd)
    }

    fn stat(&self) -> FsResult<FileStat> {
        Err(FsError::NotSupported)
    }

    /// Próximas entradas do diretório no formato de `DirIterState`. 0 no fim.
    fn list_dir(&self, _buf: &mut [u8]) -> FsResult<usize> {
        Err(FsError::NotDirectory)
    }

    /// Fonte das páginas para `mmap_file` e o tamanho mapeável.
    fn mmap_source(&self) -> Option<(Arc<dyn PageSource>, usize)> {
        None
    }

    fn dentry(&self) -> Option<DentryRef> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}
