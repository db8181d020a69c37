//! Layout de PTE do x86_64 (4 níveis, 4 KiB).
//!
//! ```text
//! bit  0  P    presente          bit  5  A    accessed
//! bit  1  RW   escrita           bit  6  D    dirty
//! bit  2  US   usuário           bit  7  PS   huge (níveis 2 e 3)
//! bit  3  PWT  write-through     bit  8  G    global
//! bit  4  PCD  cache disabled    bit 63  NX   não executável
//! bits 12..51  endereço físico
//! ```

use crate::arch::traits::{PageLevel, PteOps};
use crate::mm::{Pfn, VmFlags};

const P: u64 = 1 << 0;
const RW: u64 = 1 << 1;
const US: u64 = 1 << 2;
const PWT: u64 = 1 << 3;
const PCD: u64 = 1 << 4;
const PS: u64 = 1 << 7;
const G: u64 = 1 << 8;
const NX: u64 = 1 << 63;

const ADDR_MASK: u64 = 0x000F_FFFF_FFFF_F000;
const FLAG_MASK: u64 = P | RW | US | PWT | PCD | G | NX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct X86Pte(u64);

impl X86Pte {
    fn huge_mask(level: PageLevel) -> u64 {
        match level {
            PageLevel::Pml2 => 0x000F_FFFF_FFE0_0000,
            PageLevel::Pml3 => 0x000F_FFFF_C000_0000,
            _ => ADDR_MASK,
        }
    }

    fn encode_flags(flags: VmFlags) -> u64 {
        let mut bits = 0;
        if flags.intersects(VmFlags::READ | VmFlags::WRITE | VmFlags::EXEC) {
            bits |= P;
        }
        if flags.contains(VmFlags::WRITE) {
            bits |= RW;
        }
        if flags.contains(VmFlags::USER) {
            bits |= US;
        }
        if !flags.contains(VmFlags::EXEC) {
            bits |= NX;
        }
        if flags.contains(VmFlags::GLOBAL) {
            bits |= G;
        }
        if flags.contains(VmFlags::CACHE_DISABLED) {
            bits |= PCD;
        }
        if flags.contains(VmFlags::WRITE_THROUGH) {
            bits |= PWT;
        }
        bits
    }
}

impl PteOps for X86Pte {
    fn empty() -> Self {
        X86Pte(0)
    }

    fn from_raw(raw: u64) -> Self {
        X86Pte(raw)
    }

    fn raw(self) -> u64 {
        self.0
    }

    fn present(self, _level: PageLevel) -> bool {
        self.0 & P != 0
    }

    fn pfn(self, _level: PageLevel) -> Pfn {
        ((self.0 & ADDR_MASK) >> 12) as Pfn
    }

    fn set_pfn(&mut self, _level: PageLevel, pfn: Pfn) {
        self.0 = (self.0 & !ADDR_MASK) | (((pfn as u64) << 12) & ADDR_MASK);
    }

    fn flags(self, level: PageLevel) -> VmFlags {
        let mut flags = VmFlags::empty();
        if self.0 & P == 0 {
            return flags;
        }
        flags |= VmFlags::READ;
        if self.0 & RW != 0 {
            flags |= VmFlags::WRITE;
        }
        if self.0 & US != 0 {
            flags |= VmFlags::USER;
        }
        if self.0 & NX == 0 {
            flags |= VmFlags::EXEC;
        }
        // G só tem significado em folhas.
        if self.0 & G != 0 && (level == PageLevel::Pml1 || self.is_huge(level)) {
            flags |= VmFlags::GLOBAL;
        }
        if self.0 & PCD != 0 {
            flags |= VmFlags::CACHE_DISABLED;
        }
        if self.0 & PWT != 0 {
            flags |= VmFlags::WRITE_THROUGH;
        }
        flags
    }

    fn set_flags(&mut self, _level: PageLevel, flags: VmFlags) {
        self.0 = (self.0 & !FLAG_MASK) | Self::encode_flags(flags);
    }

    fn is_huge(self, level: PageLevel) -> bool {
        Self::supports_huge(level) && self.0 & (P | PS) == (P | PS)
    }

    fn set_huge(&mut self, level: PageLevel, pfn: Pfn, flags: VmFlags) {
        debug_assert!(Self::supports_huge(level));
        let addr = ((pfn as u64) << 12) & Self::huge_mask(level);
        self.0 = addr | PS | Self::encode_flags(flags);
    }

    fn huge_pfn(self, level: PageLevel) -> Pfn {
        ((self.0 & Self::huge_mask(level)) >> 12) as Pfn
    }

    fn make_table(_level: PageLevel, pfn: Pfn) -> Self {
        X86Pte((((pfn as u64) << 12) & ADDR_MASK) | P | RW | US)
    }
}
