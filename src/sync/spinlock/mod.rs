mod spinlock;

pub use spinlock::{Spinlock, SpinlockGuard};
