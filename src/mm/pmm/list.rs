//! Listas do PMM.
//!
//! Ambas são vetores ordenados por `start`:
//! - [`FreeList`]: faixas livres e reservadas; vizinhas do mesmo tipo são fundidas.
//! - [`AllocatedList`]: alocações vivas com refcount; vizinhas de mesmo refcount são
//!   fundidas depois de cada ajuste, então os recortes não se acumulam.

use crate::mm::Pfn;
use alloc::vec::Vec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Free,
    Allocated,
    /// Firmware, MMIO, imagem do kernel. Nunca entregue.
    Reserved,
}

/// Nó de uma das listas: `[start, start + npages)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmmBlock {
    pub start: Pfn,
    pub npages: usize,
    pub kind: FrameKind,
    pub refcount: usize,
}

impl PmmBlock {
    pub const fn new(start: Pfn, npages: usize, kind: FrameKind) -> Self {
        Self { start, npages, kind, refcount: 0 }
    }

    #[inline]
    pub const fn end(&self) -> Pfn {
        self.start + self.npages
    }

    #[inline]
    pub const fn contains(&self, pfn: Pfn) -> bool {
        pfn >= self.start && pfn < self.end()
    }

    #[inline]
    pub const fn overlaps(&self, start: Pfn, npages: usize) -> bool {
        start < self.end() && self.start < start + npages
    }
}

// =============================================================================
// FREE LIST
// =============================================================================

#[derive(Debug, Default)]
pub struct FreeList {
    blocks: Vec<PmmBlock>,
}

impl FreeList {
    pub const fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn blocks(&self) -> &[PmmBlock] {
        &self.blocks
    }

    /// Insere uma faixa, fundindo com vizinhas do mesmo tipo que encostam nela.
    ///
    /// Devolve a entrada conflitante se houver sobreposição.
    pub fn insert(&mut self, block: PmmBlock) -> Result<(), PmmBlock> {
        debug_assert!(block.kind != FrameKind::Allocated);
        if block.npages == 0 {
            return Ok(());
        }

        let idx = self.blocks.partition_point(|b| b.start < block.start);
        if let Some(prev) = idx.checked_sub(1).map(|i| self.blocks[i]) {
            if prev.end() > block.start {
                return Err(prev);
            }
        }
        if let Some(next) = self.blocks.get(idx) {
            if block.end() > next.start {
                return Err(*next);
            }
        }

        self.blocks.insert(idx, block);
        self.coalesce_around(idx);
        Ok(())
    }

    fn coalesce_around(&mut self, mut idx: usize) {
        // Com a anterior
        if idx > 0 {
            let prev = self.blocks[idx - 1];
            let cur = self.blocks[idx];
            if prev.kind == cur.kind && prev.end() == cur.start {
                self.blocks[idx - 1].npages += cur.npages;
                self.blocks.remove(idx);
                idx -= 1;
            }
        }
        // Com a próxima
        if idx + 1 < self.blocks.len() {
            let cur = self.blocks[idx];
            let next = self.blocks[idx + 1];
            if cur.kind == next.kind && cur.end() == next.start {
                self.blocks[idx].npages += next.npages;
                self.blocks.remove(idx + 1);
            }
        }
    }

    /// First-fit: retira `npages` do início da primeira faixa livre que comporta.
    pub fn take_first_fit(&mut self, npages: usize) -> Option<Pfn> {
        let idx = self
            .blocks
            .iter()
            .position(|b| b.kind == FrameKind::Free && b.npages >= npages)?;

        let block = &mut self.blocks[idx];
        let start = block.start;
        block.start += npages;
        block.npages -= npages;
        if block.npages == 0 {
            self.blocks.remove(idx);
        }
        Some(start)
    }

    /// Retira exatamente `[start, start + npages)`, que precisa estar inteiramente
    /// dentro de uma faixa livre. Divide frente e trás conforme necessário.
    pub fn take_exact(&mut self, start: Pfn, npages: usize) -> bool {
        let Some(idx) = self
            .blocks
            .iter()
            .position(|b| b.kind == FrameKind::Free && b.contains(start))
        else {
            return false;
        };

        let block = self.blocks[idx];
        if start + npages > block.end() {
            return false;
        }

        let front = PmmBlock::new(block.start, start - block.start, FrameKind::Free);
        let back = PmmBlock::new(start + npages, block.end() - (start + npages), FrameKind::Free);

        self.blocks.remove(idx);
        if back.npages > 0 {
            self.blocks.insert(idx, back);
        }
        if front.npages > 0 {
            self.blocks.insert(idx, front);
        }
        true
    }

    pub fn find_containing(&self, pfn: Pfn) -> Option<PmmBlock> {
        let idx = self.blocks.partition_point(|b| b.end() <= pfn);
        self.blocks.get(idx).copied().filter(|b| b.contains(pfn))
    }

    pub fn overlaps(&self, start: Pfn, npages: usize) -> bool {
        self.blocks.iter().any(|b| b.overlaps(start, npages))
    }

    pub fn count(&self, kind: FrameKind) -> usize {
        self.blocks.iter().filter(|b| b.kind == kind).map(|b| b.npages).sum()
    }
}

// =============================================================================
// ALLOCATED LIST
// =============================================================================

#[derive(Debug, Default)]
pub struct AllocatedList {
    blocks: Vec<PmmBlock>,
}

impl AllocatedList {
    pub const fn new() -> Self {
        Self { blocks: Vec::new() }
    }

    pub fn blocks(&self) -> &[PmmBlock] {
        &self.blocks
    }

    /// Registra uma alocação nova com refcount 1.
    pub fn insert(&mut self, start: Pfn, npages: usize) {
        let idx = self.blocks.partition_point(|b| b.start < start);
        debug_assert!(idx == 0 || self.blocks[idx - 1].end() <= start);
        debug_assert!(self.blocks.get(idx).map_or(true, |b| start + npages <= b.start));

        let mut block = PmmBlock::new(start, npages, FrameKind::Allocated);
        block.refcount = 1;
        self.blocks.insert(idx, block);
        self.coalesce(idx.saturating_sub(1), idx + 2);
    }

    /// Funde nós contíguos de mesmo refcount dentro de `[lo, hi)`.
    fn coalesce(&mut self, lo: usize, hi: usize) {
        let mut hi = hi.min(self.blocks.len());
        let mut i = lo;
        while i + 1 < hi {
            let (left, right) = (self.blocks[i], self.blocks[i + 1]);
            if left.end() == right.start && left.refcount == right.refcount {
                self.blocks[i].npages += right.npages;
                self.blocks.remove(i + 1);
                hi -= 1;
            } else {
                i += 1;
            }
        }
    }

    /// Garante uma fronteira de nó em `pfn`, dividindo o nó que o atravessa.
    fn split_at(&mut self, pfn: Pfn) {
        let idx = self.blocks.partition_point(|b| b.end() <= pfn);
        let Some(block) = self.blocks.get(idx).copied() else {
            return;
        };
        if block.start < pfn && pfn < block.end() {
            let mut front = block;
            front.npages = pfn - block.start;
            let mut back = block;
            back.start = pfn;
            back.npages = block.end() - pfn;
            self.blocks[idx] = front;
            self.blocks.insert(idx + 1, back);
        }
    }

    /// Soma `delta` ao refcount de cada frame em `[start, start + npages)`.
    ///
    /// A faixa é primeiro recortada para que só nós inteiros sejam tocados (prefixo,
    /// sufixo, interior ou nó inteiro); cada nó sobreposto é ajustado exatamente uma vez.
    /// Nós que chegam a zero saem da lista e são devolvidos em `released`.
    ///
    /// Retorna `false` (sem alterar nada) se algum frame da faixa não estiver alocado.
    pub fn adjust(&mut self, start: Pfn, npages: usize, delta: isize, released: &mut Vec<PmmBlock>) -> bool {
        let end = start + npages;
        self.split_at(start);
        self.split_at(end);

        let first = self.blocks.partition_point(|b| b.start < start);
        let last = self.blocks.partition_point(|b| b.start < end);

        let covered: usize = self.blocks[first..last].iter().map(|b| b.npages).sum();
        let underflow = delta < 0 && self.blocks[first..last].iter().any(|b| b.refcount < delta.unsigned_abs());
        if covered != npages || underflow {
            self.coalesce(first.saturating_sub(1), last + 1);
            return false;
        }

        for block in &mut self.blocks[first..last] {
            block.refcount = (block.refcount as isize + delta) as usize;
        }

        let mut i = first;
        let mut stop = last;
        while i < stop {
            if self.blocks[i].refcount == 0 {
                released.push(self.blocks.remove(i));
                stop -= 1;
            } else {
                i += 1;
            }
        }
        self.coalesce(first.saturating_sub(1), stop + 1);
        true
    }

    pub fn find_containing(&self, pfn: Pfn) -> Option<PmmBlock> {
        let idx = self.blocks.partition_point(|b| b.end() <= pfn);
        self.blocks.get(idx).copied().filter(|b| b.contains(pfn))
    }

    pub fn overlaps(&self, start: Pfn, npages: usize) -> bool {
        let idx = self.blocks.partition_point(|b| b.end() <= start);
        self.blocks.get(idx).map_or(false, |b| b.overlaps(start, npages))
    }

    pub fn total(&self) -> usize {
        self.blocks.iter().map(|b| b.npages).sum()
    }
}
