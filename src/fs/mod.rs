//! Sistema de Arquivos Virtual (VFS).
//!
//! Submódulos:
//! - `vfs`: dentries, montagens, resolução de caminhos, inodes e arquivos abertos.
//! - `io` / `fdtable`: handles de E/S e a tabela de descritores por processo.
//! - `page_cache`: páginas de arquivo em memória, por inode.
//! - `tmpfs`, `cpiofs`, `sysfs`, `userfs`: os filesystems.
//! - `pipe`, `console`: handles que não vêm de um filesystem.

pub mod console;
pub mod cpiofs;
pub mod fdtable;
pub mod io;
pub mod page_cache;
pub mod pipe;
pub mod sysfs;
pub mod tmpfs;
pub mod userfs;
pub mod vfs;

#[cfg(any(test, feature = "self_test"))]
pub mod test;

pub use fdtable::FdTable;
pub use io::{Io, IoFlags, IoKind};

use alloc::sync::Arc;
use vfs::mount::{self, Filesystem};

fn register(fs: Arc<dyn Filesystem>) {
    let name = alloc::string::String::from(fs.name());
    if let Err(e) = mount::register_filesystem(fs) {
        crate::kwarn!("(VFS) Falha ao registrar filesystem: ", str e.as_str());
    } else {
        crate::kdebug!("(VFS) Filesystem registrado: ", str name.as_str());
    }
}

/// Monta uma instância nova de `fs_name` como raiz global.
fn mount_root(fs_name: &str, source: &str) -> vfs::FsResult<()> {
    let fs = mount::find_filesystem(fs_name).ok_or(vfs::FsError::NotSupported)?;
    let inode = fs.mount(source)?;
    mount::add_mount(None, inode, fs_name, source)?;
    Ok(())
}

/// Monta `fs_name` em `target` se o diretório existe.
fn mount_if_present(fs_name: &str, target: &str) {
    if vfs::stat(None, target).is_err() {
        return;
    }
    if let Err(e) = vfs::mount(None, fs_name, "none", target) {
        crate::kwarn!("(VFS) Falha ao montar: ", str target);
        crate::kwarn!("(VFS) Motivo: ", str e.as_str());
    }
}

/// Inicializa o subsistema de arquivos.
///
/// Com initrd, o CPIO é a raiz (somente leitura) e recebe `sysfs` em `/sys` e
/// `tmpfs` em `/tmp` se esses diretórios existirem. Sem initrd, um `tmpfs` vazio
/// vira a raiz com `/sys` e `/tmp` criados na hora.
pub fn init(initrd: Option<&'static [u8]>) {
    crate::kinfo!("(VFS) Inicializando subsistema de arquivos...");

    register(Arc::new(tmpfs::TmpFs));
    register(Arc::new(sysfs::SysFs));
    if let Some(archive) = initrd {
        register(Arc::new(cpiofs::CpioFs::new(archive)));
    }

    let cpio_root = match initrd {
        Some(archive) => {
            crate::kdebug!("(VFS) Initrd encontrado, bytes: ", archive.len() as u64);
            match mount_root("cpiofs", "initrd") {
                Ok(()) => true,
                Err(e) => {
                    crate::kerror!("(VFS) Initrd inválido: ", str e.as_str());
                    false
                }
            }
        }
        None => {
            crate::kwarn!("(VFS) Initrd não encontrado! O sistema não poderá carregar o /init");
            false
        }
    };

    if !cpio_root {
        if let Err(e) = mount_root("tmpfs", "none") {
            crate::kerror!("(VFS) Falha ao montar a raiz: ", str e.as_str());
            return;
        }
        for dir in ["/sys", "/tmp"] {
            if let Err(e) = vfs::mkdir(None, dir) {
                crate::kwarn!("(VFS) Falha ao criar diretório: ", str e.as_str());
            }
        }
        mount_if_present("sysfs", "/sys");
    } else {
        mount_if_present("sysfs", "/sys");
        mount_if_present("tmpfs", "/tmp");
    }
    crate::kinfo!("(VFS) Sistema de arquivos raiz montado");
}
