//! CpioFS - o initrd como filesystem somente leitura.
//!
//! O arquivo está no formato `newc` (magic `070701` ou `070702`): cabeçalho ASCII
//! de 110 bytes com campos hexadecimais, nome e dados alinhados a 4 bytes, e o
//! registro `TRAILER!!!` no fim. A árvore inteira é montada na hora do `mount`;
//! os dados continuam no initrd e entram no page cache sob demanda.

use crate::fs::vfs::mount::{next_sb_id, Filesystem};
use crate::fs::vfs::{DirIterState, FileType, FsError, FsResult, Inode, InodeOps};
use crate::klib::align_up;
use crate::mm::config::PAGE_SIZE;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;

const HEADER_SIZE: usize = 110;
const TRAILER: &str = "TRAILER!!!";

const MODE_TYPE_MASK: u32 = 0o170_000;
const MODE_SOCKET: u32 = 0o140_000;
const MODE_SYMLINK: u32 = 0o120_000;
const MODE_FILE: u32 = 0o100_000;
const MODE_DIR: u32 = 0o040_000;
const MODE_CHARDEV: u32 = 0o020_000;
const MODE_FIFO: u32 = 0o010_000;

/// Um registro do arquivo.
#[derive(Debug, Clone, Copy)]
pub struct CpioEntry<'a> {
    pub name: &'a str,
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u32,
    pub data: &'a [u8],
}

impl CpioEntry<'_> {
    pub fn ftype(&self) -> Option<FileType> {
        match self.mode & MODE_TYPE_MASK {
            MODE_FILE => Some(FileType::Regular),
            MODE_DIR => Some(FileType::Directory),
            MODE_SYMLINK => Some(FileType::Symlink),
            MODE_CHARDEV => Some(FileType::CharDevice),
            MODE_FIFO => Some(FileType::Fifo),
            MODE_SOCKET => Some(FileType::Socket),
            _ => None,
        }
    }

    pub fn perm(&self) -> u32 {
        self.mode & 0o7777
    }
}

fn hex_field(header: &[u8], index: usize) -> FsResult<u32> {
    let start = 6 + index * 8;
    let text = core::str::from_utf8(&header[start..start + 8]).map_err(|_| FsError::Io)?;
    u32::from_str_radix(text, 16).map_err(|_| FsError::Io)
}

/// Iterador sobre os registros até o `TRAILER!!!`.
pub struct CpioReader<'a> {
    data: &'a [u8],
    offset: usize,
    done: bool,
}

impl<'a> CpioReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0, done: false }
    }

    fn parse_next(&mut self) -> FsResult<Option<CpioEntry<'a>>> {
        let header = self.data.get(self.offset..self.offset + HEADER_SIZE).ok_or(FsError::Io)?;
        if &header[..5] != b"07070" || (header[5] != b'1' && header[5] != b'2') {
            crate::kwarn!("(VFS) cpio: magic inválido no offset ", self.offset as u64);
            return Err(FsError::Io);
        }
        let mode = hex_field(header, 1)?;
        let uid = hex_field(header, 2)?;
        let gid = hex_field(header, 3)?;
        let nlink = hex_field(header, 4)?;
        let filesize = hex_field(header, 6)? as usize;
        let namesize = hex_field(header, 11)? as usize;

        let name_start = self.offset + HEADER_SIZE;
        let raw_name = self.data.get(name_start..name_start + namesize).ok_or(FsError::Io)?;
        // namesize inclui o NUL.
        let raw_name = raw_name.split(|b| *b == 0).next().unwrap_or(raw_name);
        let name = core::str::from_utf8(raw_name).map_err(|_| FsError::Io)?;

        let data_start = align_up(name_start + namesize, 4);
        let data = self.data.get(data_start..data_start + filesize).ok_or(FsError::Io)?;
        self.offset = align_up(data_start + filesize, 4);

        if name == TRAILER {
            return Ok(None);
        }
        Ok(Some(CpioEntry { name, mode, uid, gid, nlink, data }))
    }
}

impl<'a> Iterator for CpioReader<'a> {
    type Item = FsResult<CpioEntry<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.parse_next() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// `./a/b`, `/a/b` e `a/b` são o mesmo caminho; `.` é a raiz.
fn normalize(name: &str) -> &str {
    let mut name = name;
    loop {
        if let Some(rest) = name.strip_prefix("./") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest;
        } else {
            break;
        }
    }
    let name = name.trim_end_matches('/');
    if name == "." {
        ""
    } else {
        name
    }
}

/// Árvore intermediária, antes de virar inodes.
struct Node {
    ftype: FileType,
    perm: u32,
    uid: u32,
    gid: u32,
    data: &'static [u8],
    children: BTreeMap<String, Node>,
}

impl Node {
    fn dir(perm: u32) -> Self {
        Self { ftype: FileType::Directory, perm, uid: 0, gid: 0, data: &[], children: BTreeMap::new() }
    }

    fn insert(&mut self, path: &str, entry: &CpioEntry<'static>, ftype: FileType) {
        let (first, rest) = match path.split_once('/') {
            Some((first, rest)) => (first, Some(rest)),
            None => (path, None),
        };
        if first.is_empty() {
            return;
        }
        match rest {
            Some(rest) => {
                let child = self.children.entry(String::from(first)).or_insert_with(|| Node::dir(0o755));
                if child.ftype == FileType::Directory {
                    child.insert(rest, entry, ftype);
                }
            }
            None => {
                let node = self.children.entry(String::from(first)).or_insert_with(|| Node::dir(0o755));
                node.ftype = ftype;
                node.perm = entry.perm();
                node.uid = entry.uid;
                node.gid = entry.gid;
                node.data = entry.data;
            }
        }
    }
}

struct Builder {
    sb: u64,
    next_ino: u64,
}

impl Builder {
    fn build(&mut self, node: Node) -> Arc<Inode> {
        let ino = self.next_ino;
        self.next_ino += 1;
        let inode = match node.ftype {
            FileType::Directory => {
                let children = node.children.into_iter().map(|(name, child)| (name, self.build(child))).collect();
                let inode = Inode::new(self.sb, ino, FileType::Directory, node.perm, 0, CpioDir { children });
                inode.set_nlink(2);
                inode
            }
            FileType::Symlink => Inode::new(self.sb, ino, FileType::Symlink, node.perm, node.data.len(), CpioSymlink { target: node.data }),
            ftype => Inode::new(self.sb, ino, ftype, node.perm, node.data.len(), CpioFile { data: node.data }),
        };
        inode.set_owner(node.uid, node.gid);
        inode
    }
}

struct CpioDir {
    children: BTreeMap<String, Arc<Inode>>,
}

impl InodeOps for CpioDir {
    fn lookup(&self, _dir: &Inode, name: &str) -> FsResult<Option<Arc<Inode>>> {
        Ok(self.children.get(name).cloned())
    }

    fn readdir(&self, _dir: &Inode, state: &mut DirIterState<'_>) -> FsResult<()> {
        for (name, inode) in &self.children {
            if !state.add(inode.ino(), inode.ftype(), name) {
                break;
            }
        }
        Ok(())
    }
}

struct CpioFile {
    data: &'static [u8],
}

impl InodeOps for CpioFile {
    fn fill_page(&self, _inode: &Inode, pgoff: usize, buf: &mut [u8]) -> FsResult<()> {
        let start = pgoff * PAGE_SIZE;
        if start < self.data.len() {
            let end = (start + PAGE_SIZE).min(self.data.len());
            buf[..end - start].copy_from_slice(&self.data[start..end]);
        }
        Ok(())
    }

    /// Páginas do initrd são sempre recriáveis.
    fn flush_page(&self, _inode: &Inode, _pgoff: usize, _data: &[u8]) -> FsResult<()> {
        Ok(())
    }
}

struct CpioSymlink {
    target: &'static [u8],
}

impl InodeOps for CpioSymlink {
    fn readlink(&self, _inode: &Inode) -> FsResult<String> {
        core::str::from_utf8(self.target).map(String::from).map_err(|_| FsError::Io)
    }
}

pub struct CpioFs {
    archive: &'static [u8],
}

impl CpioFs {
    pub fn new(archive: &'static [u8]) -> Self {
        Self { archive }
    }
}

impl Filesystem for CpioFs {
    fn name(&self) -> &str {
        "cpiofs"
    }

    fn mount(&self, _source: &str) -> FsResult<Arc<Inode>> {
        let mut root = Node::dir(0o755);
        let mut count = 0u64;
        for entry in CpioReader::new(self.archive) {
            let entry = entry?;
            let path = normalize(entry.name);
            let Some(ftype) = entry.ftype() else {
                crate::kwarn!("(VFS) cpio: tipo de arquivo inválido: ", str entry.name);
                continue;
            };
            if path.is_empty() {
                if ftype == FileType::Directory {
                    root.perm = entry.perm();
                }
                continue;
            }
            root.insert(path, &entry, ftype);
            count += 1;
        }
        crate::kdebug!("(VFS) cpio: entradas carregadas: ", count);

        let mut builder = Builder { sb: next_sb_id(), next_ino: 1 };
        Ok(builder.build(root))
    }
}
