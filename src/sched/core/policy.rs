//! Políticas de escolha da próxima thread.
//!
//! A política só decide a ordem; a transição de estado é feita por
//! `core::claim_for_run`, que a política chama para cada candidata.

use super::claim_for_run;
use crate::sched::task::Thread;
use crate::sync::Spinlock;
use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

pub trait SchedulerPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Passa a considerar `thread`.
    fn enqueue(&self, thread: Arc<Thread>);

    /// Próxima thread, já reivindicada para esta CPU e em `Running`.
    fn pick_next(&self) -> Option<Arc<Thread>>;

    fn remove(&self, thread: &Arc<Thread>);

    /// Todas as threads conhecidas (varredura de colheita).
    fn threads(&self) -> Vec<Arc<Thread>>;

    fn len(&self) -> usize;
}

/// Round-robin sobre uma única fila global.
///
/// Cada escolha roda a fila: a thread examinada vai para o fim, escolhida ou não.
/// Uma thread pronta é escolhida em no máximo `len()` chamadas.
pub struct NaivePolicy {
    queue: Spinlock<VecDeque<Arc<Thread>>>,
}

impl NaivePolicy {
    pub const fn new() -> Self {
        Self { queue: Spinlock::new(VecDeque::new()) }
    }
}

impl Default for NaivePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulerPolicy for NaivePolicy {
    fn name(&self) -> &'static str {
        "naive"
    }

    fn enqueue(&self, thread: Arc<Thread>) {
        self.queue.lock().push_back(thread);
    }

    fn pick_next(&self) -> Option<Arc<Thread>> {
        let mut queue = self.queue.lock();
        for _ in 0..queue.len() {
            let thread = queue.pop_front()?;
            queue.push_back(thread.clone());
            if claim_for_run(&thread).is_some() {
                return Some(thread);
            }
        }
        None
    }

    fn remove(&self, thread: &Arc<Thread>) {
        self.queue.lock().retain(|t| !Arc::ptr_eq(t, thread));
    }

    fn threads(&self) -> Vec<Arc<Thread>> {
        self.queue.lock().iter().cloned().collect()
    }

    fn len(&self) -> usize {
        self.queue.lock().len()
    }
}

/// Política pelo nome da linha de comando (`scheduler=`).
pub fn by_name(name: &str) -> Option<Box<dyn SchedulerPolicy>> {
    match name {
        "naive" | "rr" => Some(Box::new(NaivePolicy::new())),
        _ => None,
    }
}
