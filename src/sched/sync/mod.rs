//! Primitivas de bloqueio do scheduler.

pub mod wait;
pub mod waitlist;

pub use wait::WaitCondition;
pub use waitlist::{WaitOutcome, Waitlist};
