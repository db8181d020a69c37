//! Mutex - pode bloquear thread

use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Mutex - cede a CPU enquanto não consegue o lock
///
/// # Diferença do Spinlock
///
/// - Mutex PODE ser mantido através de bloqueios (chama scheduler)
/// - Spinlock NÃO pode (busy-wait com interrupções desabilitadas)
///
/// Usado pelos registros de IPC (billboard, pending de cada servidor).
pub struct Mutex<T> {
    /// Estado do lock
    locked: AtomicBool,
    /// TID do owner (para debug), 0 = sem dono
    owner: AtomicU32,
    /// Dados protegidos
    data: UnsafeCell<T>,
}

// SAFETY: Mutex protege acesso com lock
unsafe impl<T: Send> Send for Mutex<T> {}
unsafe impl<T: Send> Sync for Mutex<T> {}

impl<T> Mutex<T> {
    pub const fn new(data: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            owner: AtomicU32::new(0),
            data: UnsafeCell::new(data),
        }
    }

    /// Adquire o lock (pode ceder a CPU)
    pub fn lock(&self) -> MutexGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard;
            }
            crate::sched::yield_now();
        }
    }

    /// Tenta adquirir sem bloquear
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        if self
            .locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            let tid = crate::sched::current_tid().map(|t| t.0).unwrap_or(0);
            self.owner.store(tid, Ordering::Relaxed);
            Some(MutexGuard { lock: self })
        } else {
            None
        }
    }

    /// TID do dono atual (0 se livre ou adquirido fora de thread).
    pub fn owner(&self) -> u32 {
        self.owner.load(Ordering::Relaxed)
    }
}

pub struct MutexGuard<'a, T> {
    lock: &'a Mutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: Lock está adquirido
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: Lock está adquirido
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.owner.store(0, Ordering::Release);
        self.lock.locked.store(false, Ordering::Release);
    }
}
