//! Layout de PTE do RISC-V SV48.
//!
//! ```text
//! bit 0 V  válido      bit 4 U  usuário
//! bit 1 R  leitura     bit 5 G  global
//! bit 2 W  escrita     bit 6 A  accessed
//! bit 3 X  execução    bit 7 D  dirty
//! bits 10..53  PPN (44 bits)
//! ```
//!
//! Uma entrada válida com R/W/X zerados aponta para a próxima tabela; com qualquer um
//! deles setado é folha (em Pml2/Pml3, folha grande). Folhas já nascem com A e D
//! setados para não depender de atualização por hardware.

use crate::arch::traits::{PageLevel, PteOps};
use crate::mm::{Pfn, VmFlags};

const V: u64 = 1 << 0;
const R: u64 = 1 << 1;
const W: u64 = 1 << 2;
const X: u64 = 1 << 3;
const U: u64 = 1 << 4;
const G: u64 = 1 << 5;
const A: u64 = 1 << 6;
const D: u64 = 1 << 7;

const PPN_SHIFT: u64 = 10;
const PPN_MASK: u64 = ((1u64 << 44) - 1) << PPN_SHIFT;
const RWX: u64 = R | W | X;
const FLAG_MASK: u64 = V | R | W | X | U | G | A | D;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Sv48Pte(u64);

impl Sv48Pte {
    fn encode_flags(flags: VmFlags) -> u64 {
        let mut bits = 0;
        if flags.contains(VmFlags::READ) {
            bits |= R;
        }
        if flags.contains(VmFlags::WRITE) {
            // W sem R é reservado no RISC-V.
            bits |= R | W;
        }
        if flags.contains(VmFlags::EXEC) {
            bits |= X;
        }
        if bits != 0 {
            bits |= V | A | D;
        }
        if flags.contains(VmFlags::USER) {
            bits |= U;
        }
        if flags.contains(VmFlags::GLOBAL) {
            bits |= G;
        }
        bits
    }

    fn is_leaf(self) -> bool {
        self.0 & V != 0 && self.0 & RWX != 0
    }
}

impl PteOps for Sv48Pte {
    fn empty() -> Self {
        Sv48Pte(0)
    }

    fn from_raw(raw: u64) -> Self {
        Sv48Pte(raw)
    }

    fn raw(self) -> u64 {
        self.0
    }

    fn present(self, _level: PageLevel) -> bool {
        self.0 & V != 0
    }

    fn pfn(self, _level: PageLevel) -> Pfn {
        ((self.0 & PPN_MASK) >> PPN_SHIFT) as Pfn
    }

    fn set_pfn(&mut self, _level: PageLevel, pfn: Pfn) {
        self.0 = (self.0 & !PPN_MASK) | (((pfn as u64) << PPN_SHIFT) & PPN_MASK);
    }

    fn flags(self, _level: PageLevel) -> VmFlags {
        let mut flags = VmFlags::empty();
        if self.0 & V == 0 {
            return flags;
        }
        if !self.is_leaf() {
            // Tabela intermediária: permissões decididas pela folha.
            return VmFlags::READ | VmFlags::WRITE | VmFlags::EXEC | VmFlags::USER;
        }
        if self.0 & R != 0 {
            flags |= VmFlags::READ;
        }
        if self.0 & W != 0 {
            flags |= VmFlags::WRITE;
        }
        if self.0 & X != 0 {
            flags |= VmFlags::EXEC;
        }
        if self.0 & U != 0 {
            flags |= VmFlags::USER;
        }
        if self.0 & G != 0 {
            flags |= VmFlags::GLOBAL;
        }
        flags
    }

    fn set_flags(&mut self, _level: PageLevel, flags: VmFlags) {
        self.0 = (self.0 & !FLAG_MASK) | Self::encode_flags(flags);
    }

    fn is_huge(self, level: PageLevel) -> bool {
        Self::supports_huge(level) && self.is_leaf()
    }

    fn set_huge(&mut self, level: PageLevel, pfn: Pfn, flags: VmFlags) {
        debug_assert!(Self::supports_huge(level));
        debug_assert!(pfn % level.pages_per_entry() == 0);
        self.0 = (((pfn as u64) << PPN_SHIFT) & PPN_MASK) | Self::encode_flags(flags);
    }

    fn huge_pfn(self, level: PageLevel) -> Pfn {
        let pfn = self.pfn(level);
        pfn & !(level.pages_per_entry() - 1)
    }

    fn make_table(_level: PageLevel, pfn: Pfn) -> Self {
        Sv48Pte((((pfn as u64) << PPN_SHIFT) & PPN_MASK) | V)
    }
}
