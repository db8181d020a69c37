//! Tabela de montagens e registro de filesystems.
//!
//! A tabela é uma lista lateral indexada pela identidade do dentry ponto de
//! montagem. A montagem guarda uma referência ao ponto de montagem e outra à raiz
//! montada; a raiz global é a entrada sem ponto de montagem.

use super::dentry::{self, DentryRef};
use super::{FsError, FsResult, Inode};
use crate::sync::Spinlock;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::RwLock;

/// Um tipo de filesystem montável.
pub trait Filesystem: Send + Sync {
    fn name(&self) -> &str;

    /// Monta uma instância nova a partir de `source` e devolve o inode raiz.
    fn mount(&self, source: &str) -> FsResult<Arc<Inode>>;
}

static FILESYSTEMS: RwLock<Vec<Arc<dyn Filesystem>>> = RwLock::new(Vec::new());

static NEXT_SB: AtomicU64 = AtomicU64::new(1);

/// Identificador para um superbloco novo.
pub fn next_sb_id() -> u64 {
    NEXT_SB.fetch_add(1, Ordering::Relaxed)
}

pub fn register_filesystem(fs: Arc<dyn Filesystem>) -> FsResult<()> {
    let mut list = FILESYSTEMS.write();
    if list.iter().any(|f| f.name() == fs.name()) {
        return Err(FsError::Exists);
    }
    crate::kdebug!("(VFS) Filesystem registrado: ", str fs.name());
    list.push(fs);
    Ok(())
}

pub fn unregister_filesystem(name: &str) -> Option<Arc<dyn Filesystem>> {
    let mut list = FILESYSTEMS.write();
    let index = list.iter().position(|f| f.name() == name)?;
    Some(list.remove(index))
}

pub fn find_filesystem(name: &str) -> Option<Arc<dyn Filesystem>> {
    FILESYSTEMS.read().iter().find(|f| f.name() == name).cloned()
}

pub struct Mount {
    pub mountpoint: Option<DentryRef>,
    pub root: DentryRef,
    pub fs: String,
    pub source: String,
}

static MOUNTS: Spinlock<Vec<Mount>> = Spinlock::new(Vec::new());

/// Raiz global, se já montada.
pub fn root() -> Option<DentryRef> {
    MOUNTS.lock().iter().find(|m| m.mountpoint.is_none()).map(|m| m.root.clone())
}

/// Se `dentry` é ponto de montagem, desce para a raiz montada (repetidamente).
pub fn enter_mounts(mut dentry: DentryRef) -> DentryRef {
    while dentry.is_mountpoint() {
        let next = {
            let mounts = MOUNTS.lock();
            mounts
                .iter()
                .find(|m| m.mountpoint.as_ref() == Some(&dentry))
                .map(|m| m.root.clone())
        };
        match next {
            Some(root) => dentry = root,
            None => break,
        }
    }
    dentry
}

/// Ponto de montagem de uma raiz montada.
pub fn mountpoint_of(root: &DentryRef) -> Option<DentryRef> {
    MOUNTS
        .lock()
        .iter()
        .find(|m| &m.root == root)
        .and_then(|m| m.mountpoint.clone())
}

/// `..` de `dentry`, sem subir acima de `root` e atravessando montagens.
pub fn parent_of(dentry: &DentryRef, root: &DentryRef) -> DentryRef {
    let mut cur = dentry.clone();
    loop {
        if &cur == root {
            return cur;
        }
        if let Some(parent) = cur.parent() {
            return parent;
        }
        match mountpoint_of(&cur) {
            Some(mp) => cur = mp,
            None => return cur,
        }
    }
}

/// Monta `root_inode` sobre `mountpoint` (`None` monta a raiz global).
pub fn add_mount(mountpoint: Option<DentryRef>, root_inode: Arc<Inode>, fs: &str, source: &str) -> FsResult<DentryRef> {
    let mut mounts = MOUNTS.lock();
    match &mountpoint {
        Some(mp) => {
            if mp.is_mountpoint() {
                return Err(FsError::Busy);
            }
            if !mp.positive()?.is_dir() {
                return Err(FsError::NotDirectory);
            }
            dentry::set_mountpoint(mp, true);
        }
        None => {
            if mounts.iter().any(|m| m.mountpoint.is_none()) {
                return Err(FsError::Busy);
            }
        }
    }
    let root = dentry::new_root(root_inode);
    mounts.push(Mount {
        mountpoint,
        root: root.clone(),
        fs: String::from(fs),
        source: String::from(source),
    });
    drop(mounts);
    crate::kinfo!("(VFS) Montado: ", str fs);
    Ok(root)
}

/// Desmonta a árvore cuja raiz é `root`. Falha com `Busy` se algo além da própria
/// montagem ainda a referencia (descritores, cwd, montagens aninhadas).
pub fn remove_mount(root: DentryRef) -> FsResult<()> {
    let id = root.id();
    drop(root);

    let mut mounts = MOUNTS.lock();
    let index = mounts.iter().position(|m| m.root.id() == id).ok_or(FsError::InvalidArgument)?;
    if mounts[index].mountpoint.is_none() {
        return Err(FsError::Busy);
    }
    if !dentry::is_idle(id, 1) {
        return Err(FsError::Busy);
    }
    let mount = mounts.remove(index);
    if let Some(mp) = &mount.mountpoint {
        dentry::set_mountpoint(mp, false);
    }
    drop(mounts);
    crate::kinfo!("(VFS) Desmontado: ", str mount.fs.as_str());
    drop(mount);
    Ok(())
}

/// `(fs, source)` de cada montagem, na ordem em que foram feitas.
pub fn mounts() -> Vec<(String, String)> {
    MOUNTS.lock().iter().map(|m| (m.fs.clone(), m.source.clone())).collect()
}
