//! Protocolo entre o kernel e um servidor de userfs.
//!
//! Mensagens little-endian de layout fixo. Pedido:
//!
//! ```text
//! 0   magic    u32   "UFS1"
//! 4   op       u32   Op
//! 8   cookie   u64   referência do inode no servidor
//! 16  arg      u64   pgoff no GetPage
//! 24  name_len u32
//! 28  reserved u32
//! 32  name     [u8; name_len]
//! ```
//!
//! Resposta:
//!
//! ```text
//! 0   magic       u32
//! 4   status      i32   0 ou -errno
//! 8   cookie      u64   referência do inode devolvido (Mount/Lookup)
//! 16  ino         u64
//! 24  size        u64
//! 32  ftype       u32
//! 36  perm        u32
//! 40  uid         u32
//! 44  gid         u32
//! 48  nlinks      u32
//! 52  payload_len u32
//! 56  reserved    u64
//! 64  payload     [u8; payload_len]
//! ```
//!
//! O payload do `Readdir` é uma sequência de `ino u64 | ftype u32 | name_len u32 | name`.

use crate::fs::vfs::{FileType, FsError, FsResult};
use crate::mm::config::PAGE_SIZE;
use crate::sys::Errno;
use alloc::string::String;
use alloc::vec::Vec;

pub const MAGIC: u32 = u32::from_le_bytes(*b"UFS1");
pub const REQUEST_HEADER: usize = 32;
pub const REPLY_HEADER: usize = 64;
pub const MAX_NAME: usize = 255;
/// Maior payload aceito numa resposta.
pub const MAX_PAYLOAD: usize = 16 * PAGE_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Op {
    Mount = 1,
    Lookup = 2,
    Readdir = 3,
    Readlink = 4,
    GetPage = 5,
}

impl Op {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(Self::Mount),
            2 => Some(Self::Lookup),
            3 => Some(Self::Readdir),
            4 => Some(Self::Readlink),
            5 => Some(Self::GetPage),
            _ => None,
        }
    }
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn u64_at(buf: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(raw)
}

fn put_u32(buf: &mut [u8], at: usize, value: u32) {
    buf[at..at + 4].copy_from_slice(&value.to_le_bytes());
}

fn put_u64(buf: &mut [u8], at: usize, value: u64) {
    buf[at..at + 8].copy_from_slice(&value.to_le_bytes());
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub op: Op,
    pub cookie: u64,
    pub arg: u64,
    pub name: String,
}

impl Request {
    pub fn new(op: Op, cookie: u64) -> Self {
        Self { op, cookie, arg: 0, name: String::new() }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = alloc::vec![0u8; REQUEST_HEADER + self.name.len()];
        put_u32(&mut buf, 0, MAGIC);
        put_u32(&mut buf, 4, self.op as u32);
        put_u64(&mut buf, 8, self.cookie);
        put_u64(&mut buf, 16, self.arg);
        put_u32(&mut buf, 24, self.name.len() as u32);
        buf[REQUEST_HEADER..].copy_from_slice(self.name.as_bytes());
        buf
    }

    /// Lê um pedido com `recv_exact` (lado do servidor).
    pub fn read_from(mut recv_exact: impl FnMut(&mut [u8]) -> FsResult<()>) -> FsResult<Self> {
        let mut header = [0u8; REQUEST_HEADER];
        recv_exact(&mut header)?;
        if u32_at(&header, 0) != MAGIC {
            return Err(FsError::Io);
        }
        let op = Op::from_u32(u32_at(&header, 4)).ok_or(FsError::Io)?;
        let name_len = u32_at(&header, 24) as usize;
        if name_len > MAX_NAME {
            return Err(FsError::NameTooLong);
        }
        let mut name = alloc::vec![0u8; name_len];
        recv_exact(&mut name)?;
        let name = String::from_utf8(name).map_err(|_| FsError::Io)?;
        Ok(Self { op, cookie: u64_at(&header, 8), arg: u64_at(&header, 16), name })
    }
}

/// Atributos de um inode como o servidor os descreve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InodeInfo {
    pub ino: u64,
    pub size: u64,
    pub ftype: u32,
    pub perm: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlinks: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: i32,
    pub cookie: u64,
    pub info: InodeInfo,
    pub payload: Vec<u8>,
}

impl Reply {
    pub fn ok(cookie: u64, info: InodeInfo, payload: Vec<u8>) -> Self {
        Self { status: 0, cookie, info, payload }
    }

    pub fn error(errno: Errno) -> Self {
        Self { status: errno.as_isize() as i32, cookie: 0, info: InodeInfo::default(), payload: Vec::new() }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = alloc::vec![0u8; REPLY_HEADER + self.payload.len()];
        put_u32(&mut buf, 0, MAGIC);
        put_u32(&mut buf, 4, self.status as u32);
        put_u64(&mut buf, 8, self.cookie);
        put_u64(&mut buf, 16, self.info.ino);
        put_u64(&mut buf, 24, self.info.size);
        put_u32(&mut buf, 32, self.info.ftype);
        put_u32(&mut buf, 36, self.info.perm);
        put_u32(&mut buf, 40, self.info.uid);
        put_u32(&mut buf, 44, self.info.gid);
        put_u32(&mut buf, 48, self.info.nlinks);
        put_u32(&mut buf, 52, self.payload.len() as u32);
        buf[REPLY_HEADER..].copy_from_slice(&self.payload);
        buf
    }

    /// Lê uma resposta com `recv_exact` (lado do kernel).
    pub fn read_from(mut recv_exact: impl FnMut(&mut [u8]) -> FsResult<()>) -> FsResult<Self> {
        let mut header = [0u8; REPLY_HEADER];
        recv_exact(&mut header)?;
        if u32_at(&header, 0) != MAGIC {
            crate::kwarn!("(UserFS) Resposta com magic inválido");
            return Err(FsError::Io);
        }
        let payload_len = u32_at(&header, 52) as usize;
        if payload_len > MAX_PAYLOAD {
            return Err(FsError::Io);
        }
        let mut payload = alloc::vec![0u8; payload_len];
        recv_exact(&mut payload)?;
        Ok(Self {
            status: u32_at(&header, 4) as i32,
            cookie: u64_at(&header, 8),
            info: InodeInfo {
                ino: u64_at(&header, 16),
                size: u64_at(&header, 24),
                ftype: u32_at(&header, 32),
                perm: u32_at(&header, 36),
                uid: u32_at(&header, 40),
                gid: u32_at(&header, 44),
                nlinks: u32_at(&header, 48),
            },
            payload,
        })
    }

    /// O status como erro do VFS.
    pub fn check(&self) -> FsResult<()> {
        if self.status >= 0 {
            return Ok(());
        }
        Err(match Errno::from_isize(self.status as isize) {
            Some(Errno::ENOENT) => FsError::NotFound,
            Some(Errno::EEXIST) => FsError::Exists,
            Some(Errno::ENOTDIR) => FsError::NotDirectory,
            Some(Errno::EISDIR) => FsError::IsDirectory,
            Some(Errno::EINVAL) => FsError::InvalidArgument,
            Some(Errno::ENOSYS) => FsError::NotSupported,
            Some(Errno::EROFS) => FsError::ReadOnly,
            Some(Errno::ENOSPC) => FsError::NoSpace,
            Some(Errno::ENAMETOOLONG) => FsError::NameTooLong,
            _ => FsError::Io,
        })
    }
}

/// Uma entrada do payload de `Readdir`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub ino: u64,
    pub ftype: FileType,
    pub name: String,
}

pub fn encode_dirents(entries: &[DirEntry]) -> Vec<u8> {
    let mut buf = Vec::new();
    for entry in entries {
        buf.extend_from_slice(&entry.ino.to_le_bytes());
        buf.extend_from_slice(&entry.ftype.as_u32().to_le_bytes());
        buf.extend_from_slice(&(entry.name.len() as u32).to_le_bytes());
        buf.extend_from_slice(entry.name.as_bytes());
    }
    buf
}

pub fn decode_dirents(mut buf: &[u8]) -> FsResult<Vec<DirEntry>> {
    let mut entries = Vec::new();
    while !buf.is_empty() {
        if buf.len() < 16 {
            return Err(FsError::Io);
        }
        let ino = u64_at(buf, 0);
        let ftype = FileType::from_u32(u32_at(buf, 8)).ok_or(FsError::Io)?;
        let len = u32_at(buf, 12) as usize;
        let raw = buf.get(16..16 + len).ok_or(FsError::Io)?;
        let name = core::str::from_utf8(raw).map_err(|_| FsError::Io)?;
        entries.push(DirEntry { ino, ftype, name: String::from(name) });
        buf = &buf[16 + len..];
    }
    Ok(entries)
}
