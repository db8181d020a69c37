//! Mapa de páginas reivindicadas da metade de usuário.
//!
//! Um bit por página. O espaço de usuário é grande demais para um bitmap plano, então
//! o mapa é esparso: um bloco de 512 bits (uma tabela Pml1) por região tocada.

use crate::klib::bitmap::Bitmap;
use crate::mm::config::{PAGE_SIZE, USER_SPACE_END};
use alloc::collections::BTreeMap;

const CHUNK_PAGES: usize = 512;
const CHUNK_WORDS: usize = CHUNK_PAGES / 64;

pub struct PageMap {
    chunks: BTreeMap<usize, [u64; CHUNK_WORDS]>,
    claimed: usize,
}

impl PageMap {
    pub const fn new() -> Self {
        Self { chunks: BTreeMap::new(), claimed: 0 }
    }

    fn locate(page: usize) -> (usize, usize) {
        (page / CHUNK_PAGES, page % CHUNK_PAGES)
    }

    pub fn is_used(&self, vaddr: usize) -> bool {
        let (chunk, bit) = Self::locate(vaddr / PAGE_SIZE);
        match self.chunks.get(&chunk) {
            Some(words) => words[bit / 64] & (1 << (bit % 64)) != 0,
            None => false,
        }
    }

    /// Reivindica `npages` a partir de `vaddr`. Reivindicar de novo é bug: pânico.
    pub fn mark_used(&mut self, vaddr: usize, npages: usize) {
        debug_assert!(vaddr % PAGE_SIZE == 0, "PageMap: vaddr desalinhado");
        for page in vaddr / PAGE_SIZE..vaddr / PAGE_SIZE + npages {
            let (chunk, bit) = Self::locate(page);
            let words = self.chunks.entry(chunk).or_insert([0; CHUNK_WORDS]);
            let mut bitmap = Bitmap::new(words, CHUNK_PAGES);
            if bitmap.test(bit) {
                crate::kerror!("(VMM) Página já reivindicada: ", page * PAGE_SIZE);
                panic!("page map: página já em uso");
            }
            bitmap.set(bit);
        }
        self.claimed += npages;
    }

    /// Devolve páginas. Liberar página livre é bug: pânico.
    pub fn mark_free(&mut self, vaddr: usize, npages: usize) {
        for page in vaddr / PAGE_SIZE..vaddr / PAGE_SIZE + npages {
            let (chunk, bit) = Self::locate(page);
            let Some(words) = self.chunks.get_mut(&chunk) else {
                crate::kerror!("(VMM) Página já livre: ", page * PAGE_SIZE);
                panic!("page map: página já livre");
            };
            let mut bitmap = Bitmap::new(words, CHUNK_PAGES);
            if !bitmap.test(bit) {
                crate::kerror!("(VMM) Página já livre: ", page * PAGE_SIZE);
                panic!("page map: página já livre");
            }
            bitmap.clear(bit);
            if bitmap.is_empty() {
                self.chunks.remove(&chunk);
            }
        }
        self.claimed -= npages;
    }

    /// Faixa está inteiramente livre?
    pub fn range_is_free(&self, vaddr: usize, npages: usize) -> bool {
        if range_end(vaddr, npages).is_none() {
            return false;
        }
        (0..npages).all(|i| !self.is_used(vaddr + i * PAGE_SIZE))
    }

    /// Primeira faixa livre de `npages` a partir de `base`.
    pub fn find_free(&self, base: usize, npages: usize) -> Option<usize> {
        let mut candidate = base;
        'search: loop {
            range_end(candidate, npages)?;
            for i in 0..npages {
                let page = candidate + i * PAGE_SIZE;
                if self.is_used(page) {
                    candidate = page + PAGE_SIZE;
                    continue 'search;
                }
            }
            return Some(candidate);
        }
    }

    /// Páginas reivindicadas.
    pub fn claimed(&self) -> usize {
        self.claimed
    }
}

/// Fim de `[vaddr, vaddr + npages)` se a faixa cabe no espaço de usuário.
///
/// `npages` vem do usuário: é limitado antes de qualquer laço por página.
fn range_end(vaddr: usize, npages: usize) -> Option<usize> {
    if npages > USER_SPACE_END / PAGE_SIZE {
        return None;
    }
    let end = vaddr.checked_add(npages * PAGE_SIZE)?;
    (end <= USER_SPACE_END).then_some(end)
}

impl Default for PageMap {
    fn default() -> Self {
        Self::new()
    }
}
