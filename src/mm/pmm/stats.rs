use core::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct PmmStats {
    pub total_frames: AtomicUsize,
    pub used_frames: AtomicUsize,
    pub failed_allocs: AtomicUsize,
}

impl PmmStats {
    pub const fn new() -> Self {
        Self {
            total_frames: AtomicUsize::new(0),
            used_frames: AtomicUsize::new(0),
            failed_allocs: AtomicUsize::new(0),
        }
    }

    pub fn add_total(&self, n: usize) {
        self.total_frames.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_alloc(&self, n: usize) {
        self.used_frames.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_free(&self, n: usize) {
        self.used_frames.fetch_sub(n, Ordering::Relaxed);
    }

    pub fn inc_failed(&self) {
        self.failed_allocs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn used(&self) -> usize {
        self.used_frames.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total_frames.load(Ordering::Relaxed)
    }
}
