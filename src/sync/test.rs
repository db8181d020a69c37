//! # Synchronization Tests

use crate::arch::{Cpu, CpuOps};
use crate::kcheck;
use crate::klib::test_framework::{run_test_suite, TestResult};
use crate::sync::{Mutex, PerCpu, Spinlock};
use core::sync::atomic::{AtomicUsize, Ordering};

crate::kernel_test_suite! {
    pub SYNC_TESTS = [
        test_spinlock_api,
        test_mutex_try_lock,
        test_percpu_slot_is_stable,
    ];
}

/// Executa todos os testes de sync
pub fn run_sync_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DE SINCRONIZAÇÃO         ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("sync", SYNC_TESTS).1
}

fn test_spinlock_api() -> TestResult {
    let lock = Spinlock::new(0usize);
    {
        let mut guard = lock.lock();
        *guard += 1;
        kcheck!(lock.is_locked(), "lock tomado dentro do guard");
        kcheck!(lock.owner() == Some(Cpu::current_id()), "dono é a CPU corrente");
        kcheck!(lock.try_lock().is_none(), "try_lock deve falhar com lock tomado");
    }
    kcheck!(!lock.is_locked(), "guard libera no drop");
    kcheck!(lock.owner().is_none(), "sem dono após o drop");
    kcheck!(*lock.lock() == 1, "valor protegido");
    TestResult::Passed
}

fn test_mutex_try_lock() -> TestResult {
    let mutex = Mutex::new(5u32);
    let guard = mutex.lock();
    kcheck!(mutex.try_lock().is_none(), "mutex exclusivo");
    drop(guard);
    kcheck!(mutex.try_lock().map(|g| *g) == Some(5), "mutex livre após drop");
    TestResult::Passed
}

fn test_percpu_slot_is_stable() -> TestResult {
    static COUNTERS: PerCpu<AtomicUsize> =
        PerCpu::new([const { AtomicUsize::new(0) }; crate::sched::config::MAX_CPUS]);

    let before = COUNTERS.get().load(Ordering::Relaxed);
    COUNTERS.get().fetch_add(1, Ordering::Relaxed);
    kcheck!(
        COUNTERS.get().load(Ordering::Relaxed) == before + 1,
        "mesmo slot dentro da mesma CPU"
    );
    TestResult::Passed
}
