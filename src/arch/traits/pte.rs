//! Abstração de entrada de page table.
//!
//! Os algoritmos de paginação só conhecem esta interface; o layout de bits de cada
//! arquitetura fica na implementação. A hierarquia tem quatro níveis:
//! `Pml4 -> Pml3 -> Pml2 -> Pml1`, 512 entradas por tabela.

use crate::mm::{Pfn, VmFlags};

/// Nível de uma tabela (Pml1 contém as folhas de 4 KiB).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PageLevel {
    Pml1 = 1,
    Pml2 = 2,
    Pml3 = 3,
    Pml4 = 4,
}

impl PageLevel {
    /// Nível imediatamente abaixo (None para Pml1).
    pub const fn next(self) -> Option<PageLevel> {
        match self {
            PageLevel::Pml4 => Some(PageLevel::Pml3),
            PageLevel::Pml3 => Some(PageLevel::Pml2),
            PageLevel::Pml2 => Some(PageLevel::Pml1),
            PageLevel::Pml1 => None,
        }
    }

    /// Bit menos significativo do índice deste nível no endereço virtual.
    pub const fn shift(self) -> usize {
        12 + 9 * (self as usize - 1)
    }

    /// Quantas páginas de 4 KiB uma entrada deste nível cobre.
    pub const fn pages_per_entry(self) -> usize {
        1 << (9 * (self as usize - 1))
    }

    /// Índice da entrada que cobre `vaddr` numa tabela deste nível.
    pub const fn index(self, vaddr: usize) -> usize {
        (vaddr >> self.shift()) & 0x1FF
    }
}

/// Entradas por tabela.
pub const PTE_ENTRIES: usize = 512;

pub trait PteOps: Copy + Sized {
    /// Entrada zerada (não presente).
    fn empty() -> Self;
    fn from_raw(raw: u64) -> Self;
    fn raw(self) -> u64;

    fn present(self, level: PageLevel) -> bool;

    fn pfn(self, level: PageLevel) -> Pfn;
    fn set_pfn(&mut self, level: PageLevel, pfn: Pfn);

    /// Permissões da entrada (folha ou tabela).
    fn flags(self, level: PageLevel) -> VmFlags;
    /// Define permissões e marca a entrada como presente.
    fn set_flags(&mut self, level: PageLevel, flags: VmFlags);

    /// Suporte a páginas grandes neste nível (Pml2 = 2 MiB, Pml3 = 1 GiB).
    fn supports_huge(level: PageLevel) -> bool {
        matches!(level, PageLevel::Pml2 | PageLevel::Pml3)
    }
    fn is_huge(self, level: PageLevel) -> bool;
    /// Instala uma folha grande apontando para `pfn`.
    fn set_huge(&mut self, level: PageLevel, pfn: Pfn, flags: VmFlags);
    fn huge_pfn(self, level: PageLevel) -> Pfn;

    /// Entrada intermediária apontando para a tabela em `pfn`.
    fn make_table(level: PageLevel, pfn: Pfn) -> Self;

    /// Folha de 4 KiB.
    fn make_leaf(pfn: Pfn, flags: VmFlags) -> Self {
        let mut e = Self::empty();
        e.set_pfn(PageLevel::Pml1, pfn);
        e.set_flags(PageLevel::Pml1, flags);
        e
    }

    fn clear(&mut self) {
        *self = Self::empty();
    }
}
