//! # Synchronization Primitives
//!
//! Primitivas de sincronização para ambiente SMP.
//!
//! ## Hierarquia de Uso
//!
//! ```text
//! Spinlock   → Seções críticas curtas (não pode bloquear)
//! Mutex      → Seções que podem bloquear (cede a CPU)
//! PerCpu     → Estado por CPU (thread corrente, stack do scheduler)
//! spin::RwLock → Registros lidos com frequência (consoles, filesystems)
//! ```
//!
//! ## Regras
//!
//! - **Spinlock**: nunca mantido através de `reschedule*`
//! - **Ordem de Lock**: `pgd_lock` antes de `page_map_lock` do mesmo address space;
//!   dois address spaces em ordem crescente de endereço

pub mod mutex;
pub mod percpu;
pub mod spinlock;

#[cfg(any(test, feature = "self_test"))]
pub mod test;

pub use mutex::{Mutex, MutexGuard};
pub use percpu::PerCpu;
pub use spinlock::{Spinlock, SpinlockGuard};
