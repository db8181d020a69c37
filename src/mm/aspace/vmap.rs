//! # Virtual Memory Area (`Vmap`)
//!
//! Cada região de memória virtual de um address space, com intenção semântica
//! (`VmapContent`), política de fork e origem do conteúdo (`Backing`).

use crate::mm::config::PAGE_SIZE;
use crate::mm::shm::ShmBlock;
use crate::mm::{MmResult, Pfn, VmFlags};
use alloc::sync::Arc;

/// Intenção de uso da memória
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmapContent {
    Code,
    Data,
    Heap,
    Stack,
    File,
    Mmap,
    Shared,
}

/// O que acontece com a região no fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkMode {
    /// Copy-on-write: filho e pai compartilham frames somente leitura até a escrita.
    Private,
    /// Mesmos frames, mesmas permissões nos dois lados.
    Shared,
    /// Não é herdada pelo filho.
    Na,
}

/// Fonte de páginas de um mapeamento de arquivo (implementada pelos inodes).
pub trait PageSource: Send + Sync {
    /// Frame com o conteúdo da página `pgoff`. A referência do frame continua com a
    /// fonte; quem mapeia adiciona a sua.
    fn get_page(&self, pgoff: usize) -> MmResult<Pfn>;

    /// Uma página foi mapeada com escrita compartilhada.
    fn mark_dirty(&self, _pgoff: usize) {}
}

/// Origem do conteúdo das páginas ainda não materializadas.
#[derive(Clone)]
pub enum Backing {
    /// Zero-fill sob demanda (leituras compartilham a página zero).
    Anonymous,
    /// Páginas vindas de um inode, a partir de `offset` bytes; `len` bytes são do
    /// arquivo, o resto da região lê zeros.
    File {
        source: Arc<dyn PageSource>,
        offset: usize,
        len: usize,
    },
    /// Bloco compartilhado (IPC), mapeado por inteiro; `first` é a página do bloco
    /// que aparece no início da região.
    Shared { block: Arc<ShmBlock>, first: usize },
}

impl core::fmt::Debug for Backing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Backing::Anonymous => write!(f, "anon"),
            Backing::File { offset, len, .. } => write!(f, "file(+{:#x}, {:#x})", offset, len),
            Backing::Shared { block, first } => write!(f, "shm({}/{} pages)", first, block.npages()),
        }
    }
}

/// Virtual Memory Area
#[derive(Debug, Clone)]
pub struct Vmap {
    pub vaddr: usize,
    pub npages: usize,
    pub flags: VmFlags,
    pub content: VmapContent,
    pub fork: ForkMode,
    pub backing: Backing,
}

impl Vmap {
    pub fn new(vaddr: usize, npages: usize, flags: VmFlags, content: VmapContent, fork: ForkMode, backing: Backing) -> Self {
        Self { vaddr, npages, flags: flags | VmFlags::USER, content, fork, backing }
    }

    pub fn end(&self) -> usize {
        self.vaddr + self.npages * PAGE_SIZE
    }

    pub fn size(&self) -> usize {
        self.npages * PAGE_SIZE
    }

    pub fn contains(&self, vaddr: usize) -> bool {
        vaddr >= self.vaddr && vaddr < self.end()
    }

    /// Uma região vazia (heap recém-criado) não se sobrepõe a nada.
    pub fn overlaps(&self, vaddr: usize, npages: usize) -> bool {
        if self.npages == 0 || npages == 0 {
            return false;
        }
        let end = npages.saturating_mul(PAGE_SIZE).saturating_add(vaddr);
        vaddr < self.end() && end > self.vaddr
    }

    /// Índice da página de `vaddr` dentro da região.
    pub fn page_index(&self, vaddr: usize) -> usize {
        (vaddr - self.vaddr) / PAGE_SIZE
    }

    /// Divide em `[vaddr, vaddr + at)` (self) e o resto (devolvido).
    pub fn split_off(&mut self, at: usize) -> Vmap {
        debug_assert!(at > 0 && at < self.npages, "split_off fora da região");
        let mut second = self.clone();
        second.vaddr += at * PAGE_SIZE;
        second.npages -= at;
        if let Backing::File { offset, len, .. } = &mut second.backing {
            let shift = at * PAGE_SIZE;
            *offset += shift;
            *len = len.saturating_sub(shift);
        }
        if let Backing::Shared { first, .. } = &mut second.backing {
            *first += at;
        }
        self.npages = at;
        if let Backing::File { len, .. } = &mut self.backing {
            *len = (*len).min(at * PAGE_SIZE);
        }
        second
    }
}
