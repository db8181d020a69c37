//! Page cache por inode.
//!
//! Cada página cacheada é um frame do PMM com uma referência pertencente ao cache.
//! Quem mapeia a página (fault de arquivo) soma a própria referência; `flush_or_drop`
//! só devolve ao PMM páginas limpas que ninguém mais usa.

use crate::fs::vfs::{FsError, FsResult};
use crate::mm::config::PAGE_SIZE;
use crate::mm::stat::{self, Counter};
use crate::mm::{hhdm, pmm, Pfn};
use crate::sync::Spinlock;
use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy)]
struct CachedPage {
    pfn: Pfn,
    dirty: bool,
}

pub struct PageCache {
    pages: Spinlock<BTreeMap<usize, CachedPage>>,
}

impl PageCache {
    pub const fn new() -> Self {
        Self { pages: Spinlock::new(BTreeMap::new()) }
    }

    /// Frame da página `pgoff`, preenchida por `fill` na primeira vez.
    ///
    /// `fill` roda sem o lock do cache (pode bloquear, ex. userfs). Se dois
    /// preenchimentos correm juntos, o primeiro a inserir vence.
    pub fn get_or_fill<F>(&self, pgoff: usize, fill: F) -> FsResult<Pfn>
    where
        F: FnOnce(&mut [u8]) -> FsResult<()>,
    {
        if let Some(page) = self.pages.lock().get(&pgoff) {
            return Ok(page.pfn);
        }

        let mut buf = vec![0u8; PAGE_SIZE];
        fill(&mut buf)?;
        let pfn = pmm::try_allocate(1).ok_or(FsError::NoSpace)?;
        hhdm::write_frame(pfn, 0, &buf);

        let mut pages = self.pages.lock();
        if let Some(page) = pages.get(&pgoff) {
            let winner = page.pfn;
            drop(pages);
            pmm::unref_range(pfn, 1);
            return Ok(winner);
        }
        pages.insert(pgoff, CachedPage { pfn, dirty: false });
        stat::add(Counter::PageCache, 1);
        Ok(pfn)
    }

    /// Página para escrita: como `get_or_fill`, marcando-a suja.
    pub fn get_for_write<F>(&self, pgoff: usize, fill: F) -> FsResult<Pfn>
    where
        F: FnOnce(&mut [u8]) -> FsResult<()>,
    {
        let pfn = self.get_or_fill(pgoff, fill)?;
        self.mark_dirty(pgoff);
        Ok(pfn)
    }

    pub fn mark_dirty(&self, pgoff: usize) {
        if let Some(page) = self.pages.lock().get_mut(&pgoff) {
            page.dirty = true;
        }
    }

    pub fn is_dirty(&self, pgoff: usize) -> bool {
        self.pages.lock().get(&pgoff).is_some_and(|p| p.dirty)
    }

    pub fn contains(&self, pgoff: usize) -> bool {
        self.pages.lock().contains_key(&pgoff)
    }

    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grava as páginas sujas com `flush` e solta as limpas sem outros usuários.
    ///
    /// Uma página cujo `flush` falha continua suja e cacheada. Devolve quantas
    /// páginas voltaram ao PMM.
    pub fn flush_or_drop<F>(&self, mut flush: F) -> usize
    where
        F: FnMut(usize, &[u8]) -> FsResult<()>,
    {
        let snapshot: Vec<(usize, CachedPage)> = self.pages.lock().iter().map(|(k, v)| (*k, *v)).collect();
        let mut buf = vec![0u8; PAGE_SIZE];

        for (pgoff, page) in &snapshot {
            if page.dirty {
                hhdm::read_frame(page.pfn, 0, &mut buf);
                if flush(*pgoff, &buf).is_ok() {
                    if let Some(p) = self.pages.lock().get_mut(pgoff) {
                        p.dirty = false;
                    }
                }
            }
        }

        let mut released = Vec::new();
        {
            let mut pages = self.pages.lock();
            pages.retain(|pgoff, page| {
                if page.dirty || pmm::refcount(page.pfn) > 1 {
                    return true;
                }
                released.push((*pgoff, page.pfn));
                false
            });
        }
        for (_, pfn) in &released {
            pmm::unref_range(*pfn, 1);
        }
        stat::sub(Counter::PageCache, released.len());
        released.len()
    }

    /// Descarta as páginas a partir de `first` (truncate). Páginas mapeadas por
    /// alguém continuam vivas até o último `munmap`.
    pub fn truncate_from(&self, first: usize) {
        let removed = self.pages.lock().split_off(&first);
        for page in removed.values() {
            pmm::unref_range(page.pfn, 1);
        }
        stat::sub(Counter::PageCache, removed.len());
    }

    /// Zera o trecho `[offset, PAGE_SIZE)` da página `pgoff`, se cacheada.
    pub fn zero_tail(&self, pgoff: usize, offset: usize) {
        let pfn = self.pages.lock().get(&pgoff).map(|p| p.pfn);
        if let Some(pfn) = pfn {
            if offset < PAGE_SIZE {
                let zeros = vec![0u8; PAGE_SIZE - offset];
                hhdm::write_frame(pfn, offset, &zeros);
            }
        }
    }
}

impl Default for PageCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PageCache {
    fn drop(&mut self) {
        let pages = core::mem::take(self.pages.get_mut());
        for page in pages.values() {
            pmm::unref_range(page.pfn, 1);
        }
        stat::sub(Counter::PageCache, pages.len());
    }
}
