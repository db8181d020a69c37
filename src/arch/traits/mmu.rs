//! Operações de MMU que o `mm` usa além das PTEs.

use crate::mm::Pfn;

pub trait MmuOps {
    /// PFN da raiz de page table ativa nesta CPU.
    fn current_root() -> Pfn;

    /// Ativa a raiz `root` nesta CPU.
    ///
    /// # Safety
    /// `root` deve conter o mapeamento do kernel (metade alta).
    unsafe fn switch_root(root: Pfn);

    /// Invalida a entrada de TLB de `vaddr` nesta CPU.
    fn invalidate_page(vaddr: usize);

    /// Invalida toda a TLB desta CPU.
    fn flush_all();
}
