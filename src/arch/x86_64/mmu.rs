//! CR3 e invalidação de TLB.

use crate::arch::traits::MmuOps;
use crate::mm::config::PAGE_SHIFT;
use crate::mm::Pfn;
use core::arch::asm;

pub struct X64Mmu;

impl MmuOps for X64Mmu {
    fn current_root() -> Pfn {
        let cr3: usize;
        unsafe { asm!("mov {}, cr3", out(reg) cr3, options(nomem, nostack, preserves_flags)) };
        (cr3 & 0x000F_FFFF_FFFF_F000) >> PAGE_SHIFT
    }

    unsafe fn switch_root(root: Pfn) {
        let cr3 = root << PAGE_SHIFT;
        asm!("mov cr3, {}", in(reg) cr3, options(nostack, preserves_flags));
    }

    fn invalidate_page(vaddr: usize) {
        unsafe { asm!("invlpg [{}]", in(reg) vaddr, options(nostack, preserves_flags)) };
    }

    fn flush_all() {
        unsafe {
            let root = Self::current_root();
            Self::switch_root(root);
        }
    }
}

pub type Mmu = X64Mmu;
