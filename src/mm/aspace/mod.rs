//! # Address Space Manager
//!
//! Um `AddressSpace` é dono de uma raiz de page table de usuário, da lista de VMAs e
//! do `PageMap` da metade baixa. A metade alta é a do kernel, compartilhada.
//!
//! O `pgd_lock` protege ao mesmo tempo a lista de VMAs e as page tables; todas as
//! operações passam por um [`AspaceGuard`].

pub mod page_map;
pub mod vmap;

pub use page_map::PageMap;
pub use vmap::{Backing, ForkMode, PageSource, Vmap, VmapContent};

use crate::arch::{Mmu, MmuOps};
use crate::mm::config::{PAGE_SIZE, USER_MMAP_BASE, USER_SPACE_START};
use crate::mm::paging::{self, FrameRef};
use crate::mm::{MmError, MmResult, Pfn, VmFlags};
use crate::sync::{Spinlock, SpinlockGuard};
use alloc::sync::Arc;
use alloc::vec::Vec;

pub struct AddressSpace {
    root: Pfn,
    pgd_lock: Spinlock<Vec<Vmap>>,
    page_map: Spinlock<PageMap>,
}

impl AddressSpace {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            root: paging::create_user_root(),
            pgd_lock: Spinlock::new(Vec::new()),
            page_map: Spinlock::new(PageMap::new()),
        })
    }

    pub fn root(&self) -> Pfn {
        self.root
    }

    /// Adquire o `pgd_lock`.
    pub fn lock(&self) -> AspaceGuard<'_> {
        AspaceGuard { aspace: self, vmaps: self.pgd_lock.lock() }
    }

    /// Ativa este address space na CPU corrente.
    pub fn activate(&self) {
        paging::switch_to(self.root);
    }

    /// Páginas reivindicadas no `PageMap`.
    pub fn claimed_pages(&self) -> usize {
        self.page_map.lock().claimed()
    }

    /// Cópia do address space para um processo filho.
    ///
    /// Regiões `Private` viram copy-on-write nos dois lados; `Shared` compartilham
    /// frames e permissões; `Na` não passam para o filho.
    pub fn fork(&self) -> Arc<AddressSpace> {
        let child = AddressSpace::new();
        {
            let (parent, mut dst) = lock_pair(self, &child);
            let regions: Vec<Vmap> = parent.vmaps.iter().filter(|v| v.fork != ForkMode::Na).cloned().collect();

            for region in regions {
                paging::copy_maps(self.root, region.vaddr, child.root, region.vaddr, region.npages);
                if region.fork == ForkMode::Private {
                    paging::update_flags(self.root, region.vaddr, region.npages, |f| f - VmFlags::WRITE);
                    paging::update_flags(child.root, region.vaddr, region.npages, |f| f - VmFlags::WRITE);
                }
                dst.attach(region);
            }
        }

        crate::kdebug!("(VMM) fork do address space: raiz filha=", child.root);
        child
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        let vmaps = core::mem::take(self.pgd_lock.get_mut());
        for vmap in &vmaps {
            paging::unmap_pages(self.root, vmap.vaddr, vmap.npages, FrameRef::Counted);
        }
        if Mmu::current_root() == self.root {
            paging::switch_to(paging::kernel_root());
        }
        paging::destroy_user_root(self.root);
    }
}

/// Trava dois address spaces em ordem crescente de endereço.
pub fn lock_pair<'a>(a: &'a AddressSpace, b: &'a AddressSpace) -> (AspaceGuard<'a>, AspaceGuard<'a>) {
    assert!(!core::ptr::eq(a, b), "lock_pair: mesmo address space");
    if (a as *const AddressSpace) < (b as *const AddressSpace) {
        let ga = a.lock();
        let gb = b.lock();
        (ga, gb)
    } else {
        let gb = b.lock();
        let ga = a.lock();
        (ga, gb)
    }
}

/// Address space travado (`pgd_lock` tomado).
pub struct AspaceGuard<'a> {
    aspace: &'a AddressSpace,
    vmaps: SpinlockGuard<'a, Vec<Vmap>>,
}

impl<'a> AspaceGuard<'a> {
    pub fn root(&self) -> Pfn {
        self.aspace.root
    }

    pub fn vmaps(&self) -> &[Vmap] {
        &self.vmaps
    }

    pub fn get(&self, index: usize) -> &Vmap {
        &self.vmaps[index]
    }

    pub fn get_mut(&mut self, index: usize) -> &mut Vmap {
        &mut self.vmaps[index]
    }

    /// Índice da região que cobre `vaddr`.
    pub fn find(&self, vaddr: usize) -> Option<usize> {
        self.vmaps.iter().position(|v| v.contains(vaddr))
    }

    /// Primeira região com o conteúdo dado.
    pub fn find_content(&self, content: VmapContent) -> Option<usize> {
        self.vmaps.iter().position(|v| v.content == content)
    }

    /// Liga a região ao address space e reivindica suas páginas.
    pub fn attach(&mut self, vmap: Vmap) -> usize {
        self.aspace.page_map.lock().mark_used(vmap.vaddr, vmap.npages);
        self.vmaps.push(vmap);
        self.vmaps.len() - 1
    }

    /// Desliga a região (sem tocar nas page tables) e devolve as páginas.
    pub fn detach(&mut self, index: usize) -> Vmap {
        let vmap = self.vmaps.swap_remove(index);
        self.aspace.page_map.lock().mark_free(vmap.vaddr, vmap.npages);
        vmap
    }

    /// Remove a região e desfaz seus mapeamentos.
    pub fn destroy(&mut self, index: usize) {
        let vmap = self.detach(index);
        paging::unmap_pages(self.aspace.root, vmap.vaddr, vmap.npages, FrameRef::Counted);
    }

    /// Divide a região `index` em `at` páginas; devolve o índice da segunda parte.
    pub fn split(&mut self, index: usize, at: usize) -> usize {
        let second = self.vmaps[index].split_off(at);
        self.vmaps.push(second);
        self.vmaps.len() - 1
    }

    /// Isola `[start_page, end_page)` da região `index` numa região própria e devolve
    /// o índice dela.
    pub fn split_for_range(&mut self, index: usize, start_page: usize, end_page: usize) -> usize {
        let npages = self.vmaps[index].npages;
        debug_assert!(start_page < end_page && end_page <= npages);

        let middle = if start_page > 0 { self.split(index, start_page) } else { index };
        if end_page - start_page < self.vmaps[middle].npages {
            self.split(middle, end_page - start_page);
        }
        middle
    }

    /// Cresce a região `index` em `npages` para cima, se o espaço estiver livre.
    pub fn extend(&mut self, index: usize, npages: usize) -> MmResult<()> {
        let end = self.vmaps[index].end();
        let mut page_map = self.aspace.page_map.lock();
        if !page_map.range_is_free(end, npages) {
            return Err(MmError::NoVirtualSpace);
        }
        page_map.mark_used(end, npages);
        drop(page_map);
        self.vmaps[index].npages += npages;
        Ok(())
    }

    /// Encolhe a região `index` em `npages` no topo (as PTEs ficam com o chamador).
    pub fn shrink(&mut self, index: usize, npages: usize) {
        let vmap = &mut self.vmaps[index];
        debug_assert!(npages <= vmap.npages);
        vmap.npages -= npages;
        let end = vmap.end();
        self.aspace.page_map.lock().mark_free(end, npages);
    }

    /// Escolhe onde colocar `npages` páginas.
    ///
    /// Com `exact` a faixa tem de ser exatamente `[hint, hint + npages)`; caso contrário
    /// o hint (ou o início da região de mmap) é só o ponto de partida da busca.
    pub fn get_free_vaddr(&self, npages: usize, hint: usize, exact: bool) -> MmResult<usize> {
        if npages == 0 {
            return Err(MmError::InvalidSize);
        }
        if hint % PAGE_SIZE != 0 {
            return Err(MmError::InvalidAlignment);
        }
        let page_map = self.aspace.page_map.lock();
        if exact {
            if hint < USER_SPACE_START || !page_map.range_is_free(hint, npages) {
                return Err(MmError::AlreadyMapped);
            }
            return Ok(hint);
        }
        let base = if hint == 0 { USER_MMAP_BASE } else { hint.max(USER_SPACE_START) };
        page_map
            .find_free(base, npages)
            .or_else(|| page_map.find_free(USER_SPACE_START, npages))
            .ok_or(MmError::NoVirtualSpace)
    }

    /// Índices das regiões que tocam `[vaddr, vaddr + npages)`.
    pub fn overlapping(&self, vaddr: usize, npages: usize) -> Vec<usize> {
        (0..self.vmaps.len()).filter(|&i| self.vmaps[i].overlaps(vaddr, npages)).collect()
    }
}
