//! # Memory Statistics
//!
//! Contadores de páginas por categoria (feature `memory_accounting`). Sem a feature as
//! funções existem mas não fazem nada, e `snapshot` devolve zeros.

use core::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    PageTables = 0,
    PageCache = 1,
    UserPages = 2,
    CowCopies = 3,
    ZeroFills = 4,
}

const COUNTERS: usize = 5;

pub const COUNTER_NAMES: [&str; COUNTERS] = ["PageTable", "PageCache", "User", "CowCopy", "ZeroFill"];

static COUNTS: [AtomicUsize; COUNTERS] = [const { AtomicUsize::new(0) }; COUNTERS];

#[inline]
pub fn add(counter: Counter, pages: usize) {
    #[cfg(feature = "memory_accounting")]
    COUNTS[counter as usize].fetch_add(pages, Ordering::Relaxed);
    #[cfg(not(feature = "memory_accounting"))]
    let _ = (counter, pages);
}

#[inline]
pub fn sub(counter: Counter, pages: usize) {
    #[cfg(feature = "memory_accounting")]
    COUNTS[counter as usize].fetch_sub(pages, Ordering::Relaxed);
    #[cfg(not(feature = "memory_accounting"))]
    let _ = (counter, pages);
}

pub fn get(counter: Counter) -> usize {
    COUNTS[counter as usize].load(Ordering::Relaxed)
}

/// Estado atual de todos os contadores, na ordem de [`COUNTER_NAMES`].
pub fn snapshot() -> [usize; COUNTERS] {
    core::array::from_fn(|i| COUNTS[i].load(Ordering::Relaxed))
}
