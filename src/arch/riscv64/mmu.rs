//! `satp` (SV48) e `sfence.vma`.

use crate::arch::traits::MmuOps;
use crate::mm::Pfn;
use riscv::register::satp::{self, Mode};

pub struct RiscvMmu;

impl MmuOps for RiscvMmu {
    fn current_root() -> Pfn {
        satp::read().ppn()
    }

    unsafe fn switch_root(root: Pfn) {
        satp::set(Mode::Sv48, 0, root);
        riscv::asm::sfence_vma_all();
    }

    fn invalidate_page(vaddr: usize) {
        unsafe { riscv::asm::sfence_vma(0, vaddr) };
    }

    fn flush_all() {
        unsafe { riscv::asm::sfence_vma_all() };
    }
}

pub type Mmu = RiscvMmu;
