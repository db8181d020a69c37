//! SysFS - System Filesystem
//!
//! Árvore fixa com atributos somente leitura gerados na hora da leitura:
//!
//! ```text
//! /kernel/bootargs   linha de comando do kernel
//! /kernel/meminfo    páginas do PMM e contadores por categoria
//! ```

use crate::fs::vfs::mount::{next_sb_id, Filesystem};
use crate::fs::vfs::{DirIterState, FileType, FsResult, Inode, InodeOps};
use crate::mm::config::PAGE_SIZE;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;

type Show = fn() -> String;

struct SysDir {
    children: BTreeMap<&'static str, Arc<Inode>>,
}

impl InodeOps for SysDir {
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

/// Atributo: o conteúdo é regerado a cada leitura.
struct SysAttr {
    show: Show,
}

impl InodeOps for SysAttr {
    fn read(&self, _inode: &Inode, offset: usize, buf: &mut [u8]) -> FsResult<usize> {
        let text = (self.show)();
        let bytes = text.as_bytes();
        if offset >= bytes.len() {
            return Ok(0);
        }
        let n = buf.len().min(bytes.len() - offset);
        buf[..n].copy_from_slice(&bytes[offset..offset + n]);
        Ok(n)
    }

    fn fill_page(&self, _inode: &Inode, pgoff: usize, buf: &mut [u8]) -> FsResult<()> {
        let text = (self.show)();
        let bytes = text.as_bytes();
        let start = pgoff * PAGE_SIZE;
        if start < bytes.len() {
            let end = (start + PAGE_SIZE).min(bytes.len());
            buf[..end - start].copy_from_slice(&bytes[start..end]);
        }
        Ok(())
    }
}

fn show_bootargs() -> String {
    let mut text = String::from(crate::core::cmdline::raw());
    text.push('\n');
    text
}

fn show_meminfo() -> String {
    let pmm = &crate::mm::pmm::PMM;
    let mut text = format!(
        "total_pages {}\nfree_pages {}\nused_pages {}\n",
        pmm.stats().total(),
        pmm.free_pages(),
        pmm.stats().used()
    );
    let counters = crate::mm::stat::snapshot();
    for (name, value) in crate::mm::stat::COUNTER_NAMES.iter().zip(counters.iter()) {
        text.push_str(&format!("{} {}\n", name, value));
    }
    text
}

pub struct SysFs;

impl SysFs {
    fn attr(sb: u64, ino: u64, show: Show) -> Arc<Inode> {
        Inode::new(sb, ino, FileType::Regular, 0o444, 0, SysAttr { show })
    }

    fn dir(sb: u64, ino: u64, children: BTreeMap<&'static str, Arc<Inode>>) -> Arc<Inode> {
        let inode = Inode::new(sb, ino, FileType::Directory, 0o555, 0, SysDir { children });
        inode.set_nlink(2);
        inode
    }
}

impl Filesystem for SysFs {
    fn name(&self) -> &str {
        "sysfs"
    }

    fn mount(&self, _source: &str) -> FsResult<Arc<Inode>> {
        let sb = next_sb_id();
        let mut kernel = BTreeMap::new();
        kernel.insert("bootargs", Self::attr(sb, 3, show_bootargs));
        kernel.insert("meminfo", Self::attr(sb, 4, show_meminfo));

        let mut root = BTreeMap::new();
        root.insert("kernel", Self::dir(sb, 2, kernel));
        Ok(Self::dir(sb, 1, root))
    }
}
