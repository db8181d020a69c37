//! Waitlist: fila FIFO de threads esperando um evento.
//!
//! Enfileirar e marcar a thread como `Blocked` acontecem sob o mesmo lock, então um
//! `wake` concorrente nunca se perde. Depois de `close` nenhuma thread entra na fila e
//! todas as que estavam nela acordam.

use crate::sched::task::{Thread, ThreadState};
use crate::sync::Spinlock;
use alloc::collections::VecDeque;
use alloc::sync::Arc;

/// Por que `wait` voltou.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Woken,
    /// A lista estava (ou foi) fechada.
    Closed,
    /// Sinal pendente ou thread morta.
    Interrupted,
}

struct Inner {
    queue: VecDeque<Arc<Thread>>,
    closed: bool,
}

pub struct Waitlist {
    inner: Spinlock<Inner>,
}

impl Waitlist {
    pub const fn new() -> Self {
        Self {
            inner: Spinlock::new(Inner { queue: VecDeque::new(), closed: false }),
        }
    }

    /// Enfileira `thread` e a coloca em `Blocked`. `false` se a lista está fechada.
    pub fn append(&self, thread: &Arc<Thread>) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }
        let mut state = thread.state_lock();
        if *state == ThreadState::Dead {
            return false;
        }
        *state = ThreadState::Blocked;
        drop(state);
        inner.queue.push_back(thread.clone());
        true
    }

    /// Bloqueia a thread corrente até um `wake`/`close`.
    pub fn wait(&self) -> WaitOutcome {
        let Some(thread) = crate::sched::current() else {
            panic!("waitlist: bloqueio fora de uma thread");
        };
        if !self.append(&thread) {
            return WaitOutcome::Closed;
        }
        self.finish_wait(&thread)
    }

    /// Como [`wait`](Self::wait), mas entra na fila antes de soltar `guard`.
    ///
    /// Quem acorda a lista precisa mudar o estado protegido por esse mesmo lock;
    /// assim o `wake` entre a checagem do chamador e o bloqueio não se perde.
    pub fn wait_locked<G>(&self, guard: G) -> WaitOutcome {
        let Some(thread) = crate::sched::current() else {
            panic!("waitlist: bloqueio fora de uma thread");
        };
        let appended = self.append(&thread);
        drop(guard);
        if !appended {
            return WaitOutcome::Closed;
        }
        self.finish_wait(&thread)
    }

    fn finish_wait(&self, thread: &Arc<Thread>) -> WaitOutcome {
        match crate::sched::core::block_current(thread) {
            crate::sched::core::WakeReason::Woken if self.is_closed() => WaitOutcome::Closed,
            crate::sched::core::WakeReason::Woken => WaitOutcome::Woken,
            crate::sched::core::WakeReason::Interrupted => {
                self.remove(thread);
                WaitOutcome::Interrupted
            }
        }
    }

    /// Acorda até `n` threads (Blocked → Ready). Devolve quantas saíram da fila.
    pub fn wake(&self, n: usize) -> usize {
        let mut inner = self.inner.lock();
        let mut woken = 0;
        while woken < n {
            let Some(thread) = inner.queue.pop_front() else { break };
            make_ready(&thread);
            woken += 1;
        }
        woken
    }

    pub fn wake_all(&self) -> usize {
        self.wake(usize::MAX)
    }

    /// Fecha a lista e acorda todos.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        while let Some(thread) = inner.queue.pop_front() {
            make_ready(&thread);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tira `thread` da fila sem acordá-la (espera interrompida).
    pub fn remove(&self, thread: &Arc<Thread>) {
        self.inner.lock().queue.retain(|t| !Arc::ptr_eq(t, thread));
    }
}

impl Default for Waitlist {
    fn default() -> Self {
        Self::new()
    }
}

fn make_ready(thread: &Arc<Thread>) {
    let mut state = thread.state_lock();
    if *state == ThreadState::Blocked {
        *state = ThreadState::Ready;
    }
}
