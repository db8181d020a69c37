//! Tabela de descritores de um processo: `fd -> Arc<dyn Io>`.

use crate::fs::io::Io;
use crate::fs::vfs::{FsError, FsResult};
use crate::sched::config::MAX_FDS;
use alloc::sync::Arc;
use alloc::vec::Vec;

#[derive(Default, Clone)]
pub struct FdTable {
    slots: Vec<Option<Arc<dyn Io>>>,
}

impl FdTable {
    pub fn new() -> Self {
        Self { slots: Vec::new() }
    }

    /// Tabela do init: o console em 0, 1 e 2.
    pub fn with_console() -> Self {
        let console: Arc<dyn Io> = Arc::new(crate::fs::console::ConsoleIo::new());
        Self { slots: alloc::vec![Some(console.clone()), Some(console.clone()), Some(console)] }
    }

    /// Cópia para o filho de `fork`/`spawn`: os handles são compartilhados.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    /// Instala `io` no menor descritor livre.
    pub fn install(&mut self, io: Arc<dyn Io>) -> FsResult<usize> {
        if let Some(fd) = self.slots.iter().position(|s| s.is_none()) {
            self.slots[fd] = Some(io);
            return Ok(fd);
        }
        if self.slots.len() >= MAX_FDS {
            return Err(FsError::TooManyFiles);
        }
        self.slots.push(Some(io));
        Ok(self.slots.len() - 1)
    }

    pub fn get(&self, fd: usize) -> FsResult<Arc<dyn Io>> {
        self.slots.get(fd).and_then(|s| s.clone()).ok_or(FsError::BadFd)
    }

    /// Tira `fd` da tabela. O handle fecha quando a última referência some, que
    /// pode ser aqui ou no chamador.
    pub fn close(&mut self, fd: usize) -> FsResult<Arc<dyn Io>> {
        let io = self.slots.get_mut(fd).and_then(|s| s.take()).ok_or(FsError::BadFd)?;
        while matches!(self.slots.last(), Some(None)) {
            self.slots.pop();
        }
        Ok(io)
    }

    pub fn close_all(&mut self) {
        let slots = core::mem::take(&mut self.slots);
        drop(slots);
    }

    /// Descritores abertos.
    pub fn count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
