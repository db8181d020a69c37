//! TmpFS - Temporary Filesystem
//!
//! Sistema de arquivos em RAM. O conteúdo dos arquivos mora inteiro no page cache
//! do inode (páginas nunca são descartadas); diretórios guardam os filhos num
//! `BTreeMap`, então `readdir` sai em ordem alfabética.

use crate::fs::vfs::mount::{next_sb_id, Filesystem};
use crate::fs::vfs::{DirIterState, FileType, FsError, FsResult, Inode, InodeOps};
use crate::sync::Spinlock;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU64, Ordering};

/// Maior arquivo aceito.
const MAX_FILE_SIZE: usize = 64 * 1024 * 1024;

/// Inode raiz de cada instância.
const ROOT_INO: u64 = 1;

struct TmpSuper {
    sb: u64,
    next_ino: AtomicU64,
}

impl TmpSuper {
    fn allocate_ino(&self) -> u64 {
        self.next_ino.fetch_add(1, Ordering::Relaxed)
    }
}

struct TmpDir {
    sup: Arc<TmpSuper>,
    entries: Spinlock<BTreeMap<String, Arc<Inode>>>,
}

impl TmpDir {
    fn new_inode(sup: Arc<TmpSuper>, ino: u64, perm: u32) -> Arc<Inode> {
        let inode = Inode::new(
            sup.sb,
            ino,
            FileType::Directory,
            perm,
            0,
            TmpDir { sup, entries: Spinlock::new(BTreeMap::new()) },
        );
        inode.set_nlink(2);
        inode
    }

    fn insert(&self, name: &str, inode: Arc<Inode>) -> FsResult<Arc<Inode>> {
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return Err(FsError::Exists);
        }
        entries.insert(String::from(name), inode.clone());
        Ok(inode)
    }
}

impl InodeOps for TmpDir {
    fn lookup(&self, _dir: &Inode, name: &str) -> FsResult<Option<Arc<Inode>>> {
        Ok(self.entries.lock().get(name).cloned())
    }

    fn create(&self, _dir: &Inode, name: &str, ftype: FileType, perm: u32) -> FsResult<Arc<Inode>> {
        let ino = self.sup.allocate_ino();
        let inode = match ftype {
            FileType::Regular => Inode::new(self.sup.sb, ino, FileType::Regular, perm, 0, TmpFile),
            FileType::Directory => TmpDir::new_inode(self.sup.clone(), ino, perm),
            _ => return Err(FsError::InvalidArgument),
        };
        self.insert(name, inode)
    }

    fn symlink(&self, _dir: &Inode, name: &str, target: &str) -> FsResult<Arc<Inode>> {
        let ino = self.sup.allocate_ino();
        let inode = Inode::new(
            self.sup.sb,
            ino,
            FileType::Symlink,
            0o777,
            target.len(),
            TmpSymlink { target: String::from(target) },
        );
        self.insert(name, inode)
    }

    fn readdir(&self, _dir: &Inode, state: &mut DirIterState<'_>) -> FsResult<()> {
        let entries = self.entries.lock();
        for (name, inode) in entries.iter() {
            if !state.add(inode.ino(), inode.ftype(), name) {
                break;
            }
        }
        Ok(())
    }
}

struct TmpFile;

impl InodeOps for TmpFile {
    fn write(&self, inode: &Inode, offset: usize, buf: &[u8]) -> FsResult<usize> {
        if offset.saturating_add(buf.len()) > MAX_FILE_SIZE {
            return Err(FsError::NoSpace);
        }
        inode.write_cached(offset, buf)
    }

    fn truncate(&self, inode: &Inode, size: usize) -> FsResult<()> {
        if size > MAX_FILE_SIZE {
            return Err(FsError::NoSpace);
        }
        inode.truncate_cached(size);
        Ok(())
    }
}

struct TmpSymlink {
    target: String,
}

impl InodeOps for TmpSymlink {
    fn readlink(&self, _inode: &Inode) -> FsResult<String> {
        Ok(self.target.clone())
    }
}

pub struct TmpFs;

impl Filesystem for TmpFs {
    fn name(&self) -> &str {
        "tmpfs"
    }

    fn mount(&self, _source: &str) -> FsResult<Arc<Inode>> {
        let sup = Arc::new(TmpSuper { sb: next_sb_id(), next_ino: AtomicU64::new(ROOT_INO + 1) });
        Ok(TmpDir::new_inode(sup, ROOT_INO, 0o755))
    }
}
