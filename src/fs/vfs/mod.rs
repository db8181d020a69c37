//! Virtual File System
//!
//! - `dentry`: árvore de nomes (arena + referências contadas).
//! - `mount`: tabela de montagens e registro de filesystems.
//! - `resolve`: resolução de caminhos com [`ResolveFlags`].
//! - `inode`/`file`: inodes, page cache por inode e arquivos abertos.
//!
//! As operações daqui recebem o diretório corrente do chamador (`cwd`); `None`
//! resolve a partir da raiz.

pub mod dentry;
pub mod error;
pub mod file;
pub mod inode;
pub mod mount;
pub mod path;
pub mod resolve;

pub use dentry::DentryRef;
pub use error::{FsError, FsResult};
pub use file::{File, OpenFlags};
pub use inode::{DirIterState, FileStat, FileType, Inode, InodeOps};
pub use mount::{root, Filesystem};
pub use resolve::{resolve, ResolveFlags};

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Permissão padrão de arquivos e diretórios criados pelo kernel.
const DEFAULT_FILE_PERM: u32 = 0o644;
const DEFAULT_DIR_PERM: u32 = 0o755;

fn start(cwd: Option<&DentryRef>) -> FsResult<(DentryRef, DentryRef)> {
    let root = root().ok_or(FsError::NotFound)?;
    let base = cwd.cloned().unwrap_or_else(|| root.clone());
    Ok((base, root))
}

/// Resolve `path` relativo a `cwd`.
pub fn lookup(cwd: Option<&DentryRef>, path: &str, flags: ResolveFlags) -> FsResult<DentryRef> {
    let (base, root) = start(cwd)?;
    resolve(&base, &root, path, flags)
}

/// Inode de um arquivo existente (executáveis, `mmap`).
pub fn lookup_inode(cwd: Option<&DentryRef>, path: &str) -> FsResult<Arc<Inode>> {
    lookup(cwd, path, ResolveFlags::EXPECT_FILE)?.positive()
}

/// Cria o nome da dentry negativa `dentry` no diretório pai.
fn create_at(dentry: &DentryRef, ftype: FileType, perm: u32, target: Option<&str>) -> FsResult<Arc<Inode>> {
    let parent = dentry.parent().ok_or(FsError::InvalidArgument)?;
    let dir = parent.positive()?;
    let name = dentry.name();
    let inode = match target {
        Some(target) => dir.symlink(&name, target)?,
        None => dir.create(&name, ftype, perm)?,
    };
    dentry::attach(dentry, inode.clone())?;
    crate::ktrace!("(VFS) Criado: ", str name.as_str());
    Ok(inode)
}

/// Abre (e opcionalmente cria) um arquivo ou diretório.
pub fn open(cwd: Option<&DentryRef>, path: &str, flags: OpenFlags) -> FsResult<Arc<File>> {
    let mut resolve_flags = ResolveFlags::EXPECT_FILE | ResolveFlags::EXPECT_DIR;
    if flags.contains(OpenFlags::CREATE) {
        resolve_flags |= ResolveFlags::EXPECT_NONEXIST;
        if !flags.contains(OpenFlags::EXCLUSIVE) {
            resolve_flags |= ResolveFlags::EXPECT_EXIST;
        }
    }
    if flags.contains(OpenFlags::NOFOLLOW) {
        resolve_flags |= ResolveFlags::SYMLINK_NOFOLLOW;
    }

    let dentry = lookup(cwd, path, resolve_flags)?;
    let inode = match dentry.inode() {
        Some(inode) => inode,
        None => create_at(&dentry, FileType::Regular, DEFAULT_FILE_PERM, None)?,
    };

    if flags.contains(OpenFlags::DIRECTORY) && !inode.is_dir() {
        return Err(FsError::NotDirectory);
    }
    if inode.is_dir() && flags.intersects(OpenFlags::WRITE | OpenFlags::TRUNCATE) {
        return Err(FsError::IsDirectory);
    }
    if flags.contains(OpenFlags::TRUNCATE) && inode.ftype() == FileType::Regular {
        inode.truncate(0)?;
    }
    Ok(Arc::new(File::new(dentry, inode, flags)))
}

/// `vfs_stat`: não segue o último symlink.
pub fn stat(cwd: Option<&DentryRef>, path: &str) -> FsResult<FileStat> {
    let flags = ResolveFlags::EXPECT_FILE | ResolveFlags::EXPECT_DIR | ResolveFlags::SYMLINK_NOFOLLOW;
    Ok(lookup(cwd, path, flags)?.positive()?.stat())
}

/// Alvo de um symlink, exatamente como gravado.
pub fn readlink(cwd: Option<&DentryRef>, path: &str) -> FsResult<String> {
    let dentry = lookup(cwd, path, ResolveFlags::EXPECT_FILE | ResolveFlags::SYMLINK_NOFOLLOW)?;
    dentry.positive()?.readlink()
}

/// Cria um arquivo vazio se ainda não existe.
pub fn touch(cwd: Option<&DentryRef>, path: &str) -> FsResult<()> {
    let flags = ResolveFlags::EXPECT_FILE | ResolveFlags::EXPECT_NONEXIST | ResolveFlags::EXPECT_EXIST;
    let dentry = lookup(cwd, path, flags)?;
    if dentry.is_negative() {
        create_at(&dentry, FileType::Regular, DEFAULT_FILE_PERM, None)?;
    }
    Ok(())
}

pub fn symlink(cwd: Option<&DentryRef>, path: &str, target: &str) -> FsResult<()> {
    let dentry = lookup(cwd, path, ResolveFlags::EXPECT_FILE | ResolveFlags::EXPECT_NONEXIST)?;
    create_at(&dentry, FileType::Symlink, 0o777, Some(target))?;
    Ok(())
}

pub fn mkdir(cwd: Option<&DentryRef>, path: &str) -> FsResult<()> {
    let dentry = lookup(cwd, path, ResolveFlags::EXPECT_DIR | ResolveFlags::EXPECT_NONEXIST)?;
    create_at(&dentry, FileType::Directory, DEFAULT_DIR_PERM, None)?;
    Ok(())
}

/// Diretório para `chdir`; o chamador o guarda como novo cwd.
pub fn chdir(cwd: Option<&DentryRef>, path: &str) -> FsResult<DentryRef> {
    lookup(cwd, path, ResolveFlags::EXPECT_DIR)
}

/// Caminho absoluto de `dentry`, atravessando montagens. Uma árvore que não está
/// pendurada na raiz global sai como `:/caminho`.
pub fn path_of(dentry: &DentryRef) -> String {
    let global = root();
    let mut parts: Vec<String> = Vec::new();
    let mut cur = dentry.clone();
    let mut foreign = false;
    loop {
        let (mut names, top) = dentry::path_in_tree(&cur);
        names.append(&mut parts);
        parts = names;
        let top = dentry::get_by_id(top);
        if global.as_ref() == Some(&top) {
            break;
        }
        match mount::mountpoint_of(&top) {
            Some(mp) => cur = mp,
            None => {
                foreign = true;
                break;
            }
        }
    }
    let path = path::join(parts.iter().map(String::as_str));
    if foreign {
        let mut marked = String::from(":");
        marked.push_str(&path);
        marked
    } else {
        path
    }
}

/// `vfs_getcwd`.
pub fn getcwd(cwd: Option<&DentryRef>) -> FsResult<String> {
    match cwd {
        Some(dentry) => Ok(path_of(dentry)),
        None => root().map(|r| path_of(&r)).ok_or(FsError::NotFound),
    }
}

/// Monta uma instância nova de `fs_name` sobre o diretório `target`.
pub fn mount(cwd: Option<&DentryRef>, fs_name: &str, source: &str, target: &str) -> FsResult<()> {
    let fs = mount::find_filesystem(fs_name).ok_or(FsError::NotSupported)?;
    let flags = ResolveFlags::EXPECT_DIR;
    let mountpoint = lookup(cwd, target, flags)?;
    let root_inode = fs.mount(source)?;
    mount::add_mount(Some(mountpoint), root_inode, fs_name, source)?;
    Ok(())
}

/// Desmonta o filesystem montado em `target`.
pub fn unmount(cwd: Option<&DentryRef>, target: &str) -> FsResult<()> {
    let root = lookup(cwd, target, ResolveFlags::EXPECT_DIR)?;
    if root.parent().is_some() {
        return Err(FsError::InvalidArgument);
    }
    mount::remove_mount(root)
}
