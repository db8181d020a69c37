//! CPU hospedada.

use crate::arch::traits::{CpuOps, IpiKind};
use crate::sys::Errno;

pub struct HostedCpu;

#[cfg(test)]
mod ids {
    //! Ids de CPU por thread do hospedeiro (um bit por CPU ocupada).

    use crate::sched::config::MAX_CPUS;
    use core::sync::atomic::{AtomicU64, Ordering};

    static USED: AtomicU64 = AtomicU64::new(0);

    struct Slot(usize);

    impl Drop for Slot {
        fn drop(&mut self) {
            USED.fetch_and(!(1u64 << self.0), Ordering::AcqRel);
        }
    }

    fn claim() -> usize {
        loop {
            let used = USED.load(Ordering::Acquire);
            let free = (!used).trailing_zeros() as usize;
            if free < MAX_CPUS {
                if USED
                    .compare_exchange(used, used | (1u64 << free), Ordering::AcqRel, Ordering::Relaxed)
                    .is_ok()
                {
                    return free;
                }
            } else {
                std::thread::yield_now();
            }
        }
    }

    std::thread_local! {
        static SLOT: Slot = Slot(claim());
    }

    pub fn current() -> usize {
        SLOT.with(|slot| slot.0)
    }
}

impl CpuOps for HostedCpu {
    #[cfg(test)]
    fn current_id() -> usize {
        ids::current()
    }

    #[cfg(not(test))]
    fn current_id() -> usize {
        0
    }

    fn halt() {
        Self::relax();
    }

    #[cfg(test)]
    fn relax() {
        std::thread::yield_now();
    }

    #[cfg(not(test))]
    fn relax() {
        core::hint::spin_loop();
    }

    fn disable_interrupts() {}

    fn enable_interrupts() {}

    fn are_interrupts_enabled() -> bool {
        false
    }

    /// Não há outra CPU para interromper: o alvo "reconhece" na hora.
    fn send_ipi(target: usize, kind: IpiKind) -> Result<(), Errno> {
        if kind == IpiKind::TlbShootdown {
            crate::mm::paging::tlb::acknowledge(target);
        }
        Ok(())
    }

    fn hang() -> ! {
        panic!("hang() na plataforma hospedada");
    }
}

pub type Cpu = HostedCpu;
