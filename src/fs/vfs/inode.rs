//! Inodes.
//!
//! Um [`Inode`] tem identidade `(superbloco, ino)` e guarda os atributos comuns; o
//! comportamento específico do filesystem fica em [`InodeOps`]. Leitura e escrita
//! passam por padrão pelo page cache do inode, preenchido por `fill_page`.

use super::{FsError, FsResult};
use crate::fs::page_cache::PageCache;
use crate::klib::{align_up, div_round_up};
use crate::mm::config::PAGE_SIZE;
use crate::mm::usercopy::UserValue;
use crate::mm::{hhdm, MmError, MmResult, PageSource, Pfn};
use alloc::string::String;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

/// Tipo do arquivo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FileType {
    Regular = 1,
    Directory = 2,
    Symlink = 3,
    CharDevice = 4,
    Fifo = 5,
    Socket = 6,
}

impl FileType {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Regular),
            2 => Some(Self::Directory),
            3 => Some(Self::Symlink),
            4 => Some(Self::CharDevice),
            5 => Some(Self::Fifo),
            6 => Some(Self::Socket),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Regular => "file",
            Self::Directory => "dir",
            Self::Symlink => "symlink",
            Self::CharDevice => "chardev",
            Self::Fifo => "fifo",
            Self::Socket => "socket",
        }
    }
}

/// Atributos devolvidos por `vfs_stat`/`vfs_fstat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(C)]
pub struct FileStat {
    pub ino: u64,
    pub size: u64,
    pub ftype: u32,
    pub perm: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlinks: u32,
    pub _pad: u32,
}

// SAFETY: repr(C), só inteiros, padding explícito.
unsafe impl UserValue for FileStat {}

/// Cabeçalho de cada registro escrito por `readdir`.
///
/// O registro é `{ino: u64, reclen: u16, ftype: u8, namelen: u8}` seguido do nome
/// terminado em NUL, com tamanho total múltiplo de 8.
pub const DIRENT_HEADER: usize = 12;

/// Cursor de `readdir`: escreve registros num buffer até ele encher.
///
/// `nth` é o índice da primeira entrada ainda não entregue; a próxima chamada
/// recomeça dali.
pub struct DirIterState<'a> {
    buffer: &'a mut [u8],
    written: usize,
    start: usize,
    index: usize,
    full: bool,
}

impl<'a> DirIterState<'a> {
    pub fn new(buffer: &'a mut [u8], nth: usize) -> Self {
        Self { buffer, written: 0, start: nth, index: 0, full: false }
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn written(&self) -> usize {
        self.written
    }

    /// Próxima entrada a entregar.
    pub fn nth(&self) -> usize {
        self.index.max(self.start)
    }

    /// Entradas já consumidas nesta passada (incluindo as puladas).
    pub fn index(&self) -> usize {
        self.index
    }

    /// Alguma entrada não coube.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Acrescenta uma entrada. `false` quando o buffer acabou: o chamador para e
    /// retoma depois a partir de `nth()`.
    pub fn add(&mut self, ino: u64, ftype: FileType, name: &str) -> bool {
        if self.index < self.start {
            self.index += 1;
            return true;
        }
        let name = &name.as_bytes()[..name.len().min(u8::MAX as usize)];
        let reclen = align_up(DIRENT_HEADER + name.len() + 1, 8);
        if self.written + reclen > self.buffer.len() {
            self.full = true;
            return false;
        }

        let rec = &mut self.buffer[self.written..self.written + reclen];
        rec.fill(0);
        rec[0..8].copy_from_slice(&ino.to_ne_bytes());
        rec[8..10].copy_from_slice(&(reclen as u16).to_ne_bytes());
        rec[10] = ftype.as_u32() as u8;
        rec[11] = name.len() as u8;
        rec[DIRENT_HEADER..DIRENT_HEADER + name.len()].copy_from_slice(name);

        self.written += reclen;
        self.index += 1;
        true
    }
}

/// Operações de um inode. Todas têm implementação padrão: diretórios sem `lookup`
/// ficam vazios, arquivos sem `fill_page` leem zeros.
pub trait InodeOps: Send + Sync {
    /// Procura `name` no diretório. `None` é inexistência (vira dentry negativa).
    fn lookup(&self, _dir: &Inode, _name: &str) -> FsResult<Option<Arc<Inode>>> {
        Ok(None)
    }

    fn create(&self, _dir: &Inode, _name: &str, _ftype: FileType, _perm: u32) -> FsResult<Arc<Inode>> {
        Err(FsError::ReadOnly)
    }

    fn symlink(&self, _dir: &Inode, _name: &str, _target: &str) -> FsResult<Arc<Inode>> {
        Err(FsError::ReadOnly)
    }

    fn readlink(&self, _inode: &Inode) -> FsResult<String> {
        Err(FsError::InvalidArgument)
    }

    /// Entradas do diretório, sem `.` e `..`. `NotSupported` faz o VFS listar os
    /// filhos cacheados no dentry.
    fn readdir(&self, _dir: &Inode, _state: &mut DirIterState<'_>) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    /// Conteúdo da página `pgoff` (o buffer chega zerado).
    fn fill_page(&self, _inode: &Inode, _pgoff: usize, _buf: &mut [u8]) -> FsResult<()> {
        Ok(())
    }

    /// Grava uma página suja. `NotSupported` a mantém no cache para sempre (tmpfs).
    fn flush_page(&self, _inode: &Inode, _pgoff: usize, _data: &[u8]) -> FsResult<()> {
        Err(FsError::NotSupported)
    }

    fn read(&self, inode: &Inode, offset: usize, buf: &mut [u8]) -> FsResult<usize> {
        inode.read_cached(offset, buf)
    }

    fn write(&self, _inode: &Inode, _offset: usize, _buf: &[u8]) -> FsResult<usize> {
        Err(FsError::ReadOnly)
    }

    fn truncate(&self, _inode: &Inode, _size: usize) -> FsResult<()> {
        Err(FsError::ReadOnly)
    }
}

pub struct Inode {
    sb: u64,
    ino: u64,
    ftype: FileType,
    perm: AtomicU32,
    uid: AtomicU32,
    gid: AtomicU32,
    nlink: AtomicU32,
    size: AtomicUsize,
    ops: alloc::boxed::Box<dyn InodeOps>,
    cache: PageCache,
}

impl Inode {
    pub fn new<O: InodeOps + 'static>(sb: u64, ino: u64, ftype: FileType, perm: u32, size: usize, ops: O) -> Arc<Self> {
        Arc::new(Self {
            sb,
            ino,
            ftype,
            perm: AtomicU32::new(perm),
            uid: AtomicU32::new(0),
            gid: AtomicU32::new(0),
            nlink: AtomicU32::new(1),
            size: AtomicUsize::new(size),
            ops: alloc::boxed::Box::new(ops),
            cache: PageCache::new(),
        })
    }

    pub fn sb(&self) -> u64 {
        self.sb
    }

    pub fn ino(&self) -> u64 {
        self.ino
    }

    /// Mesma identidade `(superbloco, ino)`.
    pub fn same_identity(&self, other: &Inode) -> bool {
        self.sb == other.sb && self.ino == other.ino
    }

    pub fn ftype(&self) -> FileType {
        self.ftype
    }

    pub fn is_dir(&self) -> bool {
        self.ftype == FileType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.ftype == FileType::Symlink
    }

    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn set_size(&self, size: usize) {
        self.size.store(size, Ordering::Release);
    }

    fn grow_to(&self, size: usize) {
        self.size.fetch_max(size, Ordering::AcqRel);
    }

    pub fn set_owner(&self, uid: u32, gid: u32) {
        self.uid.store(uid, Ordering::Relaxed);
        self.gid.store(gid, Ordering::Relaxed);
    }

    pub fn set_nlink(&self, nlink: u32) {
        self.nlink.store(nlink, Ordering::Relaxed);
    }

    pub fn stat(&self) -> FileStat {
        FileStat {
            ino: self.ino,
            size: self.size() as u64,
            ftype: self.ftype.as_u32(),
            perm: self.perm.load(Ordering::Relaxed),
            uid: self.uid.load(Ordering::Relaxed),
            gid: self.gid.load(Ordering::Relaxed),
            nlinks: self.nlink.load(Ordering::Relaxed),
            _pad: 0,
        }
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    pub fn lookup(&self, name: &str) -> FsResult<Option<Arc<Inode>>> {
        if !self.is_dir() {
            return Err(FsError::NotDirectory);
        }
        self.ops.lookup(self, name)
    }

    pub fn create(&self, name: &str, ftype: FileType, perm: u32) -> FsResult<Arc<Inode>> {
        if !self.is_dir() {
            return Err(FsError::NotDirectory);
        }
        self.ops.create(self, name, ftype, perm)
    }

    pub fn symlink(&self, name: &str, target: &str) -> FsResult<Arc<Inode>> {
        if !self.is_dir() {
            return Err(FsError::NotDirectory);
        }
        self.ops.symlink(self, name, target)
    }

    pub fn readlink(&self) -> FsResult<String> {
        if !self.is_symlink() {
            return Err(FsError::InvalidArgument);
        }
        self.ops.readlink(self)
    }

    pub fn readdir(&self, state: &mut DirIterState<'_>) -> FsResult<()> {
        if !self.is_dir() {
            return Err(FsError::NotDirectory);
        }
        self.ops.readdir(self, state)
    }

    /// Lê a partir de `offset`. Devolve 0 no fim do arquivo.
    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> FsResult<usize> {
        if self.is_dir() {
            return Err(FsError::IsDirectory);
        }
        self.ops.read(self, offset, buf)
    }

    pub fn write_at(&self, offset: usize, buf: &[u8]) -> FsResult<usize> {
        if self.is_dir() {
            return Err(FsError::IsDirectory);
        }
        self.ops.write(self, offset, buf)
    }

    pub fn truncate(&self, size: usize) -> FsResult<()> {
        if self.is_dir() {
            return Err(FsError::IsDirectory);
        }
        self.ops.truncate(self, size)
    }

    /// Frame da página `pgoff` no page cache.
    pub fn cache_page(&self, pgoff: usize) -> FsResult<Pfn> {
        self.cache.get_or_fill(pgoff, |buf| self.ops.fill_page(self, pgoff, buf))
    }

    /// Devolve ao PMM as páginas limpas sem outros usuários.
    pub fn flush_or_drop(&self) -> usize {
        self.cache.flush_or_drop(|pgoff, data| self.ops.flush_page(self, pgoff, data))
    }

    /// Leitura genérica pelo page cache, limitada ao tamanho do arquivo.
    pub fn read_cached(&self, offset: usize, buf: &mut [u8]) -> FsResult<usize> {
        let size = self.size();
        if offset >= size {
            return Ok(0);
        }
        let len = buf.len().min(size - offset);
        let mut done = 0;
        while done < len {
            let pos = offset + done;
            let in_page = pos % PAGE_SIZE;
            let chunk = (PAGE_SIZE - in_page).min(len - done);
            let pfn = self.cache_page(pos / PAGE_SIZE)?;
            hhdm::read_frame(pfn, in_page, &mut buf[done..done + chunk]);
            done += chunk;
        }
        Ok(done)
    }

    /// Escrita genérica pelo page cache; cresce o arquivo se passar do fim.
    pub fn write_cached(&self, offset: usize, buf: &[u8]) -> FsResult<usize> {
        let mut done = 0;
        while done < buf.len() {
            let pos = offset + done;
            let in_page = pos % PAGE_SIZE;
            let chunk = (PAGE_SIZE - in_page).min(buf.len() - done);
            let pgoff = pos / PAGE_SIZE;
            let pfn = self.cache.get_for_write(pgoff, |page| self.ops.fill_page(self, pgoff, page))?;
            hhdm::write_frame(pfn, in_page, &buf[done..done + chunk]);
            done += chunk;
        }
        self.grow_to(offset + done);
        Ok(done)
    }

    /// Truncate genérico: descarta páginas além do novo fim e zera a cauda.
    pub fn truncate_cached(&self, size: usize) {
        let keep = div_round_up(size, PAGE_SIZE);
        self.cache.truncate_from(keep);
        if size % PAGE_SIZE != 0 {
            self.cache.zero_tail(size / PAGE_SIZE, size % PAGE_SIZE);
        }
        self.set_size(size);
    }
}

impl PageSource for Inode {
    fn get_page(&self, pgoff: usize) -> MmResult<Pfn> {
        self.cache_page(pgoff).map_err(|e| match e {
            FsError::Memory(m) => m,
            FsError::NoSpace => MmError::OutOfMemory,
            _ => MmError::BackingFailed,
        })
    }

    fn mark_dirty(&self, pgoff: usize) {
        self.cache.mark_dirty(pgoff);
    }
}

impl core::fmt::Debug for Inode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Inode")
            .field("sb", &self.sb)
            .field("ino", &self.ino)
            .field("ftype", &self.ftype)
            .field("size", &self.size())
            .finish()
    }
}
