//! Arquivo aberto

use super::dentry::{self, DentryRef};
use super::mount::parent_of;
use super::{DirIterState, FileStat, FileType, FsError, FsResult, Inode};
use crate::fs::io::{Io, IoFlags, IoKind};
use crate::mm::PageSource;
use crate::sync::Mutex;
use alloc::sync::Arc;
use bitflags::bitflags;
use core::any::Any;

bitflags! {
    /// Flags de abertura
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const APPEND = 1 << 2;
        const CREATE = 1 << 3;
        const TRUNCATE = 1 << 4;
        /// Com `CREATE`: falha se já existe.
        const EXCLUSIVE = 1 << 5;
        /// Falha se não for diretório.
        const DIRECTORY = 1 << 6;
        const NOFOLLOW = 1 << 7;
    }
}

/// Arquivo (ou diretório) aberto.
pub struct File {
    dentry: DentryRef,
    inode: Arc<Inode>,
    flags: OpenFlags,
    /// Posição atual; em diretórios, a próxima entrada de `list_dir`.
    offset: Mutex<usize>,
}

impl File {
    pub fn new(dentry: DentryRef, inode: Arc<Inode>, flags: OpenFlags) -> Self {
        Self { dentry, inode, flags, offset: Mutex::new(0) }
    }

    pub fn inode(&self) -> &Arc<Inode> {
        &self.inode
    }

    pub fn open_flags(&self) -> OpenFlags {
        self.flags
    }

    pub fn offset(&self) -> usize {
        *self.offset.lock()
    }

    pub fn set_offset(&self, offset: usize) {
        *self.offset.lock() = offset;
    }
}

/// `.`, `..` e depois as entradas do filesystem (ou os filhos cacheados).
pub fn readdir(dir: &DentryRef, inode: &Inode, state: &mut DirIterState<'_>) -> FsResult<()> {
    if !inode.is_dir() {
        return Err(FsError::NotDirectory);
    }
    if !state.add(inode.ino(), FileType::Directory, ".") {
        return Ok(());
    }
    let parent_ino = match crate::fs::vfs::root() {
        Some(root) => parent_of(dir, &root).inode().map_or(inode.ino(), |p| p.ino()),
        None => inode.ino(),
    };
    if !state.add(parent_ino, FileType::Directory, "..") {
        return Ok(());
    }
    match inode.readdir(state) {
        Err(FsError::NotSupported) => {
            for (name, child) in dentry::cached_children(dir) {
                if !state.add(child.ino(), child.ftype(), &name) {
                    break;
                }
            }
            Ok(())
        }
        other => other,
    }
}

impl Io for File {
    fn kind(&self) -> IoKind {
        if self.inode.is_dir() {
            IoKind::Directory
        } else {
            IoKind::File
        }
    }

    fn flags(&self) -> IoFlags {
        let mut flags = IoFlags::empty();
        if self.flags.contains(OpenFlags::READ) {
            flags |= IoFlags::READ;
        }
        if self.flags.contains(OpenFlags::WRITE) {
            flags |= IoFlags::WRITE;
        }
        if self.inode.ftype() == FileType::Regular {
            flags |= IoFlags::MMAP;
        }
        flags
    }

    fn read(&self, buf: &mut [u8]) -> FsResult<usize> {
        if !self.flags.contains(OpenFlags::READ) {
            return Err(FsError::BadFd);
        }
        let mut offset = self.offset.lock();
        let n = self.inode.read_at(*offset, buf)?;
        *offset += n;
        Ok(n)
    }

    fn write(&self, buf: &[u8]) -> FsResult<usize> {
        if !self.flags.contains(OpenFlags::WRITE) {
            return Err(FsError::BadFd);
        }
        let mut offset = self.offset.lock();
        if self.flags.contains(OpenFlags::APPEND) {
            *offset = self.inode.size();
        }
        let n = self.inode.write_at(*offset, buf)?;
        *offset += n;
        Ok(n)
    }

    fn stat(&self) -> FsResult<FileStat> {
        Ok(self.inode.stat())
    }

    fn list_dir(&self, buf: &mut [u8]) -> FsResult<usize> {
        let mut offset = self.offset.lock();
        let mut state = DirIterState::new(buf, *offset);
        readdir(&self.dentry, &self.inode, &mut state)?;
        if state.written() == 0 && state.is_full() {
            // Nem a primeira entrada pendente coube.
            return Err(FsError::InvalidArgument);
        }
        *offset = state.nth();
        Ok(state.written())
    }

    fn mmap_source(&self) -> Option<(Arc<dyn PageSource>, usize)> {
        if self.inode.ftype() != FileType::Regular {
            return None;
        }
        let source: Arc<dyn PageSource> = self.inode.clone();
        Some((source, self.inode.size()))
    }

    fn dentry(&self) -> Option<DentryRef> {
        Some(self.dentry.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
