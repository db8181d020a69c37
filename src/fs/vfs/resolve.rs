//! Resolução de caminhos.
//!
//! Componentes intermediários precisam ser diretórios (symlinks são seguidos); o
//! último é julgado pelas [`ResolveFlags`]. Pontos de montagem são atravessados a
//! cada passo e `..` nunca sobe acima da raiz passada.

use super::dentry::{self, DentryRef};
use super::mount::{enter_mounts, parent_of};
use super::path::{self, PathComponents};
use super::{FsError, FsResult};
use crate::sched::config::MAX_SYMLINK_DEPTH;
use bitflags::bitflags;

bitflags! {
    /// O que o chamador aceita no último componente.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ResolveFlags: u32 {
        /// Aceita arquivos (tudo que não é diretório).
        const EXPECT_FILE = 1 << 0;
        /// Aceita diretórios.
        const EXPECT_DIR = 1 << 1;
        /// Com `EXPECT_NONEXIST`: aceita também um alvo existente.
        const EXPECT_EXIST = 1 << 2;
        /// Devolve a dentry negativa se o nome não existe.
        const EXPECT_NONEXIST = 1 << 3;
        /// O chamador vai criar o nome (também aceita a dentry negativa).
        const WILL_CREATE = 1 << 4;
        /// Não segue um symlink no último componente.
        const SYMLINK_NOFOLLOW = 1 << 5;
    }
}

/// Resolve `path` a partir de `base` (relativo) ou `root` (absoluto).
pub fn resolve(base: &DentryRef, root: &DentryRef, path: &str, flags: ResolveFlags) -> FsResult<DentryRef> {
    path::validate(path)?;
    walk(base, root, path, flags, 0)
}

fn walk(base: &DentryRef, root: &DentryRef, path: &str, flags: ResolveFlags, depth: usize) -> FsResult<DentryRef> {
    let start = if path::is_absolute(path) { root.clone() } else { base.clone() };
    let mut cur = enter_mounts(start);
    let trailing = path::has_trailing_slash(path);
    if trailing && !flags.contains(ResolveFlags::EXPECT_DIR) {
        return Err(FsError::NotDirectory);
    }

    let mut components = PathComponents::new(path).peekable();
    let mut last = None;
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            last = Some(component);
            break;
        }
        cur = step(cur, root, component, depth)?;
    }

    let name = match last {
        None | Some(".") => return finish_dir(cur, flags),
        Some("..") => return finish_dir(enter_mounts(parent_of(&cur, root)), flags),
        Some(name) => name,
    };

    if !cur.positive()?.is_dir() {
        return Err(FsError::NotDirectory);
    }
    let child = dentry::lookup_child(&cur, name)?;
    let Some(inode) = child.inode() else {
        if flags.intersects(ResolveFlags::EXPECT_NONEXIST | ResolveFlags::WILL_CREATE) {
            return Ok(child);
        }
        return Err(FsError::NotFound);
    };

    if flags.contains(ResolveFlags::EXPECT_NONEXIST) && !flags.contains(ResolveFlags::EXPECT_EXIST) {
        return Err(FsError::Exists);
    }
    if inode.is_symlink() && !flags.contains(ResolveFlags::SYMLINK_NOFOLLOW) {
        let target = inode.readlink()?;
        drop(child);
        let resolved = follow(&cur, root, &target, flags, depth)?;
        if trailing && !resolved.inode().is_some_and(|i| i.is_dir()) {
            return Err(FsError::NotDirectory);
        }
        return Ok(resolved);
    }
    if inode.is_dir() {
        if !flags.contains(ResolveFlags::EXPECT_DIR) {
            return Err(FsError::IsDirectory);
        }
        return Ok(enter_mounts(child));
    }
    if trailing || !flags.contains(ResolveFlags::EXPECT_FILE) {
        return Err(FsError::NotDirectory);
    }
    Ok(child)
}

/// O resultado é o próprio diretório corrente (`/`, `.`, `..`, caminho vazio).
fn finish_dir(dir: DentryRef, flags: ResolveFlags) -> FsResult<DentryRef> {
    if !flags.contains(ResolveFlags::EXPECT_DIR) {
        return Err(FsError::IsDirectory);
    }
    if flags.contains(ResolveFlags::EXPECT_NONEXIST) && !flags.contains(ResolveFlags::EXPECT_EXIST) {
        return Err(FsError::Exists);
    }
    Ok(dir)
}

/// Um componente intermediário: precisa terminar num diretório.
fn step(cur: DentryRef, root: &DentryRef, name: &str, depth: usize) -> FsResult<DentryRef> {
    match name {
        "." => Ok(cur),
        ".." => Ok(enter_mounts(parent_of(&cur, root))),
        _ => {
            if !cur.positive()?.is_dir() {
                return Err(FsError::NotDirectory);
            }
            let child = dentry::lookup_child(&cur, name)?;
            let inode = child.positive()?;
            if inode.is_symlink() {
                let target = inode.readlink()?;
                drop(child);
                return follow(&cur, root, &target, ResolveFlags::EXPECT_DIR, depth);
            }
            if !inode.is_dir() {
                return Err(FsError::NotDirectory);
            }
            Ok(enter_mounts(child))
        }
    }
}

/// Segue um symlink relativo ao diretório que o contém.
fn follow(dir: &DentryRef, root: &DentryRef, target: &str, flags: ResolveFlags, depth: usize) -> FsResult<DentryRef> {
    if depth + 1 > MAX_SYMLINK_DEPTH {
        crate::kdebug!("(VFS) Symlinks demais: ", str target);
        return Err(FsError::Loop);
    }
    path::validate(target)?;
    walk(dir, root, target, flags, depth + 1)
}
