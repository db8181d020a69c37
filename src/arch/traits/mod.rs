//! Traits do Hardware Abstraction Layer (HAL).
//! Interfaces públicas que o Kernel Core usa para falar com o hardware.

pub mod context;
pub mod cpu;
pub mod mmu;
pub mod pte;

// Re-exportar para facilitar uso: `use crate::arch::traits::CpuOps;`
pub use context::UserContext;
pub use cpu::{CpuOps, IpiKind};
pub use mmu::MmuOps;
pub use pte::{PageLevel, PteOps, PTE_ENTRIES};
