//! Estado de escalonamento por CPU.

use crate::sched::config::MAX_CPUS;
use crate::sched::task::Thread;
use crate::sync::{PerCpu, Spinlock};
use alloc::sync::Arc;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};

pub struct CpuLocal {
    /// Thread em execução nesta CPU.
    current: Spinlock<Option<Arc<Thread>>>,
    idle: Spinlock<Option<Arc<Thread>>>,
    /// sp da stack do scheduler, salvo quando uma thread assume a CPU.
    scheduler_sp: UnsafeCell<usize>,
    need_resched: AtomicBool,
    online: AtomicBool,
    /// Trocas de contexto feitas por esta CPU.
    switches: AtomicU64,
}

// SAFETY: `scheduler_sp` só é tocado pela própria CPU, com interrupções desligadas.
unsafe impl Sync for CpuLocal {}

impl CpuLocal {
    const fn new() -> Self {
        Self {
            current: Spinlock::new(None),
            idle: Spinlock::new(None),
            scheduler_sp: UnsafeCell::new(0),
            need_resched: AtomicBool::new(false),
            online: AtomicBool::new(false),
            switches: AtomicU64::new(0),
        }
    }

    pub fn current(&self) -> Option<Arc<Thread>> {
        self.current.lock().clone()
    }

    pub fn set_current(&self, thread: Option<Arc<Thread>>) -> Option<Arc<Thread>> {
        core::mem::replace(&mut *self.current.lock(), thread)
    }

    pub fn idle(&self) -> Option<Arc<Thread>> {
        self.idle.lock().clone()
    }

    pub fn set_idle(&self, thread: Arc<Thread>) {
        *self.idle.lock() = Some(thread);
    }

    pub fn scheduler_sp_slot(&self) -> *mut usize {
        self.scheduler_sp.get()
    }

    pub fn scheduler_sp(&self) -> usize {
        // SAFETY: escrito por esta mesma CPU ao despachar a thread corrente.
        unsafe { *self.scheduler_sp.get() }
    }

    pub fn request_resched(&self) {
        self.need_resched.store(true, Ordering::Release);
    }

    pub fn take_resched(&self) -> bool {
        self.need_resched.swap(false, Ordering::AcqRel)
    }

    pub fn set_online(&self) {
        self.online.store(true, Ordering::Release);
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    pub fn count_switch(&self) {
        self.switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn switches(&self) -> u64 {
        self.switches.load(Ordering::Relaxed)
    }
}

pub static CPUS: PerCpu<CpuLocal> = PerCpu::new([const { CpuLocal::new() }; MAX_CPUS]);

/// Ids das CPUs que já entraram no loop do scheduler.
pub fn online_cpus() -> impl Iterator<Item = usize> {
    (0..MAX_CPUS).filter(|&cpu| CPUS.get_for(cpu).is_online())
}
