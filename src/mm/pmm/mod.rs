//! # PMM - Physical Memory Manager
//!
//! Dono de toda a RAM. Duas listas com locks independentes:
//! - **FreeList**: faixas `Free` e `Reserved`, ordenadas e fundidas;
//! - **AllocatedList**: alocações vivas com refcount.
//!
//! Regras:
//! - Memória abaixo de 1 MiB é sempre `Reserved`.
//! - Sobreposição ao adicionar uma região e unref de frame não alocado são bugs do
//!   chamador: pânico.
//! - `allocate` sem faixa contígua suficiente entra em pânico (não há OOM killer);
//!   `try_allocate` devolve `None` para quem sabe lidar com a falta.
//!
//! Ordem de locks: nunca as duas listas ao mesmo tempo. Uma faixa em trânsito entre
//! as listas fica momentaneamente fora de ambas.

pub mod list;
pub mod stats;

pub use list::{AllocatedList, FrameKind, FreeList, PmmBlock};
pub use stats::PmmStats;

use crate::core::handoff::{MemoryMapEntry, MemoryType};
use crate::mm::config::{LOW_MEMORY_LIMIT, PAGE_SIZE};
use crate::mm::{MmError, MmResult, Pfn, INVALID_PFN};
use crate::sync::Spinlock;
use alloc::vec::Vec;

/// Primeiro PFN fora da memória baixa.
pub const LOW_MEMORY_PFN: Pfn = LOW_MEMORY_LIMIT / PAGE_SIZE;

pub struct Pmm {
    free: Spinlock<FreeList>,
    allocated: Spinlock<AllocatedList>,
    stats: PmmStats,
}

impl Pmm {
    pub const fn new() -> Self {
        Self {
            free: Spinlock::new(FreeList::new()),
            allocated: Spinlock::new(AllocatedList::new()),
            stats: PmmStats::new(),
        }
    }

    pub fn stats(&self) -> &PmmStats {
        &self.stats
    }

    /// Adiciona uma região ao FreeList. A parte abaixo de 1 MiB vira `Reserved`.
    pub fn add_region(&self, start: Pfn, npages: usize, kind: FrameKind) {
        assert!(kind != FrameKind::Allocated, "(PMM) região inicial não pode ser Allocated");
        if npages == 0 {
            return;
        }

        let end = start + npages;
        if start < LOW_MEMORY_PFN {
            let low_end = end.min(LOW_MEMORY_PFN);
            self.insert_free(PmmBlock::new(start, low_end - start, FrameKind::Reserved));
            if end > LOW_MEMORY_PFN {
                self.insert_free(PmmBlock::new(LOW_MEMORY_PFN, end - LOW_MEMORY_PFN, kind));
            }
        } else {
            self.insert_free(PmmBlock::new(start, npages, kind));
        }

        if kind == FrameKind::Free {
            self.stats.add_total(end - start.max(LOW_MEMORY_PFN).min(end));
        }
    }

    fn insert_free(&self, block: PmmBlock) {
        if self.allocated.lock().overlaps(block.start, block.npages) {
            crate::kerror!("(PMM) Região sobrepõe alocação viva: pfn=", block.start);
            panic!("pmm: região sobrepõe alocação");
        }
        if let Err(existing) = self.free.lock().insert(block) {
            crate::kerror!("(PMM) Região sobreposta: pfn=", block.start);
            crate::kerror!("(PMM) Conflita com pfn=", existing.start);
            panic!("pmm: regiões sobrepostas");
        }
    }

    /// Aloca `npages` frames contíguos. Pânico se não houver faixa que comporte.
    ///
    /// `npages == 0` é no-op e devolve [`INVALID_PFN`].
    pub fn allocate(&self, npages: usize) -> Pfn {
        if npages == 0 {
            return INVALID_PFN;
        }
        match self.try_allocate(npages) {
            Some(pfn) => pfn,
            None => {
                crate::kerror!("(PMM) Sem memória! páginas pedidas=", npages);
                crate::kerror!("(PMM) páginas livres=", self.free_pages());
                panic!("pmm: sem memória física");
            }
        }
    }

    pub fn try_allocate(&self, npages: usize) -> Option<Pfn> {
        if npages == 0 {
            return Some(INVALID_PFN);
        }

        let taken = self.free.lock().take_first_fit(npages);
        let Some(start) = taken else {
            self.stats.inc_failed();
            return None;
        };

        self.allocated.lock().insert(start, npages);
        self.stats.inc_alloc(npages);

        #[cfg(feature = "mm_trace")]
        crate::ktrace!("(PMM) allocate pfn=", start);
        Some(start)
    }

    /// Reserva exatamente `[start, start + npages)` (tabelas de firmware, initrd).
    /// Falha se algum frame da faixa não estiver livre.
    pub fn allocate_at(&self, start: Pfn, npages: usize) -> MmResult<()> {
        if npages == 0 {
            return Ok(());
        }
        if !self.free.lock().take_exact(start, npages) {
            return Err(MmError::FrameBusy);
        }
        self.allocated.lock().insert(start, npages);
        self.stats.inc_alloc(npages);
        Ok(())
    }

    /// Incrementa o refcount de cada frame da faixa.
    pub fn ref_range(&self, start: Pfn, npages: usize) {
        if npages == 0 {
            return;
        }
        let mut released = Vec::new();
        if !self.allocated.lock().adjust(start, npages, 1, &mut released) {
            crate::kerror!("(PMM) ref de frame não alocado: pfn=", start);
            panic!("pmm: ref de frame não alocado");
        }
    }

    /// Decrementa o refcount; nós que chegam a zero voltam ao FreeList (fundidos).
    pub fn unref_range(&self, start: Pfn, npages: usize) {
        if npages == 0 {
            return;
        }
        let mut released = Vec::new();
        let ok = self.allocated.lock().adjust(start, npages, -1, &mut released);
        if !ok {
            crate::kerror!("(PMM) unref de frame não alocado (double free?): pfn=", start);
            panic!("pmm: unref de frame não alocado");
        }
        for block in released {
            self.release(block);
        }
    }

    /// Destino de um nó cujo refcount chegou a zero.
    fn release(&self, block: PmmBlock) {
        #[cfg(feature = "mm_trace")]
        crate::ktrace!("(PMM) release pfn=", block.start);
        self.stats.inc_free(block.npages);
        if let Err(existing) = self.free.lock().insert(PmmBlock::new(block.start, block.npages, FrameKind::Free)) {
            crate::kerror!("(PMM) frame liberado já está livre: pfn=", existing.start);
            panic!("pmm: double free");
        }
    }

    /// Refcount de `pfn` (0 se não alocado).
    pub fn refcount(&self, pfn: Pfn) -> usize {
        self.allocated.lock().find_containing(pfn).map_or(0, |b| b.refcount)
    }

    /// Bloco reservado que contém `pfn`, se houver.
    pub fn find_reserved(&self, pfn: Pfn) -> Option<PmmBlock> {
        self.free
            .lock()
            .find_containing(pfn)
            .filter(|b| b.kind == FrameKind::Reserved)
    }

    pub fn free_pages(&self) -> usize {
        self.free.lock().count(FrameKind::Free)
    }

    /// Cópia das duas listas (diagnóstico e testes).
    pub fn snapshot(&self) -> (Vec<PmmBlock>, Vec<PmmBlock>) {
        let free = self.free.lock().blocks().to_vec();
        let allocated = self.allocated.lock().blocks().to_vec();
        (free, allocated)
    }
}

impl Default for Pmm {
    fn default() -> Self {
        Self::new()
    }
}

/// PMM global.
pub static PMM: Pmm = Pmm::new();

/// Popula o PMM a partir do mapa de memória do bootloader.
pub fn init(memory_map: &[MemoryMapEntry]) {
    crate::kinfo!("(PMM) Inicializando a partir do mapa de memória...");

    for entry in memory_map {
        let base = entry.base as usize;
        let end = base + entry.len as usize;
        // Só páginas inteiras; restos desalinhados ficam fora das listas.
        let start_pfn = crate::klib::align_up(base, PAGE_SIZE) / PAGE_SIZE;
        let end_pfn = crate::klib::align_down(end, PAGE_SIZE) / PAGE_SIZE;
        if end_pfn <= start_pfn {
            continue;
        }
        let kind = match entry.typ {
            MemoryType::Usable => FrameKind::Free,
            _ => FrameKind::Reserved,
        };
        PMM.add_region(start_pfn, end_pfn - start_pfn, kind);
    }

    crate::kinfo!("(PMM) Frames livres: ", PMM.free_pages());
}

// Atalhos sobre o PMM global.

pub fn allocate(npages: usize) -> Pfn {
    PMM.allocate(npages)
}

pub fn try_allocate(npages: usize) -> Option<Pfn> {
    PMM.try_allocate(npages)
}

pub fn allocate_at(start: Pfn, npages: usize) -> MmResult<()> {
    PMM.allocate_at(start, npages)
}

pub fn ref_range(start: Pfn, npages: usize) {
    PMM.ref_range(start, npages)
}

pub fn unref_range(start: Pfn, npages: usize) {
    PMM.unref_range(start, npages)
}

pub fn refcount(pfn: Pfn) -> usize {
    PMM.refcount(pfn)
}

pub fn find_reserved(pfn: Pfn) -> Option<PmmBlock> {
    PMM.find_reserved(pfn)
}

/// Aloca um frame zerado.
pub fn allocate_zeroed() -> Pfn {
    let pfn = PMM.allocate(1);
    crate::mm::hhdm::zero_frame(pfn);
    pfn
}
