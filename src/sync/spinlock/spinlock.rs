//! Spinlock - bloqueio com busy-wait e interrupções desligadas.
//!
//! Protege as estruturas tocadas em contexto de trap (runqueue, waitlists, tabelas de
//! tarefas, page tables). A seção crítica roda com interrupções desligadas na CPU dona,
//! então um handler de interrupção nunca espera por um lock que a própria CPU segura.
//!
//! O lock lembra a CPU dona: tentar tomá-lo de novo na mesma CPU é um deadlock certo e
//! vira pânico com diagnóstico, em vez de uma CPU travada em silêncio.

use crate::arch::{Cpu, CpuOps};
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicUsize, Ordering};

/// Valor de `owner` quando o lock está livre.
const UNLOCKED: usize = usize::MAX;

/// Estado de interrupções salvo na entrada da seção crítica.
struct IrqSave {
    was_enabled: bool,
}

impl IrqSave {
    fn disable() -> Self {
        let was_enabled = Cpu::are_interrupts_enabled();
        Cpu::disable_interrupts();
        Self { was_enabled }
    }

    fn restore(&self) {
        if self.was_enabled {
            Cpu::enable_interrupts();
        }
    }
}

/// Spinlock - usa busy-wait, NÃO pode dormir.
///
/// Quem segura um `Spinlock` não pode bloquear nem chamar o scheduler; para seções
/// longas use [`crate::sync::Mutex`].
pub struct Spinlock<T> {
    /// CPU dona, ou `UNLOCKED`.
    owner: AtomicUsize,
    data: UnsafeCell<T>,
}

// SAFETY: o acesso a `data` só acontece com o lock tomado.
unsafe impl<T: Send> Send for Spinlock<T> {}
unsafe impl<T: Send> Sync for Spinlock<T> {}

impl<T> Spinlock<T> {
    pub const fn new(data: T) -> Self {
        Self {
            owner: AtomicUsize::new(UNLOCKED),
            data: UnsafeCell::new(data),
        }
    }

    fn try_acquire(&self, cpu: usize) -> bool {
        self.owner
            .compare_exchange_weak(UNLOCKED, cpu, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    /// Adquire o lock, girando até conseguir.
    pub fn lock(&self) -> SpinlockGuard<'_, T> {
        let irq = IrqSave::disable();
        let cpu = Cpu::current_id();

        while !self.try_acquire(cpu) {
            if self.owner.load(Ordering::Relaxed) == cpu {
                panic!("spinlock tomado duas vezes pela CPU {}", cpu);
            }
            Cpu::relax();
        }

        SpinlockGuard { lock: self, irq }
    }

    /// Tenta adquirir sem girar.
    pub fn try_lock(&self) -> Option<SpinlockGuard<'_, T>> {
        let irq = IrqSave::disable();
        let cpu = Cpu::current_id();

        if self
            .owner
            .compare_exchange(UNLOCKED, cpu, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
        {
            Some(SpinlockGuard { lock: self, irq })
        } else {
            irq.restore();
            None
        }
    }

    /// Indica se o lock está tomado (diagnóstico e asserts).
    pub fn is_locked(&self) -> bool {
        self.owner.load(Ordering::Relaxed) != UNLOCKED
    }

    /// CPU que segura o lock, se alguma.
    pub fn owner(&self) -> Option<usize> {
        match self.owner.load(Ordering::Relaxed) {
            UNLOCKED => None,
            cpu => Some(cpu),
        }
    }

    /// Acesso exclusivo sem lock (quem tem `&mut` já é exclusivo).
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.data.into_inner()
    }
}

impl<T: Default> Default for Spinlock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Guard do spinlock: libera e restaura as interrupções no drop.
pub struct SpinlockGuard<'a, T> {
    lock: &'a Spinlock<T>,
    irq: IrqSave,
}

impl<T> Deref for SpinlockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: o guard prova posse do lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SpinlockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: o guard prova posse do lock.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SpinlockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.owner.store(UNLOCKED, Ordering::Release);
        self.irq.restore();
    }
}
