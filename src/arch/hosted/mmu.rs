//! MMU hospedada: as page tables existem na RAM simulada, mas ninguém as percorre em
//! hardware. Só a raiz "ativa" por CPU é lembrada.

use crate::arch::traits::MmuOps;
use crate::mm::{Pfn, INVALID_PFN};
use crate::sync::PerCpu;
use core::sync::atomic::{AtomicUsize, Ordering};

static ACTIVE_ROOT: PerCpu<AtomicUsize> =
    PerCpu::new([const { AtomicUsize::new(INVALID_PFN) }; crate::sched::config::MAX_CPUS]);

pub struct HostedMmu;

impl MmuOps for HostedMmu {
    fn current_root() -> Pfn {
        ACTIVE_ROOT.get().load(Ordering::Relaxed)
    }

    unsafe fn switch_root(root: Pfn) {
        ACTIVE_ROOT.get().store(root, Ordering::Relaxed);
    }

    fn invalidate_page(_vaddr: usize) {}

    fn flush_all() {}
}

pub type Mmu = HostedMmu;
