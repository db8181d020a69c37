//! Constantes de configuração do Scheduler

/// CPUs suportadas. Sem `smp` em bare metal existe só uma; a plataforma hospedada dá
/// um id por thread do hospedeiro.
#[cfg(any(feature = "smp", not(target_os = "none")))]
pub const MAX_CPUS: usize = 64;
#[cfg(not(any(feature = "smp", not(target_os = "none"))))]
pub const MAX_CPUS: usize = 1;

/// Quantum padrão (Timeslice) em ticks do timer
pub const DEFAULT_QUANTUM: u64 = 10;

/// Páginas da stack de kernel de cada thread.
pub const KERNEL_STACK_PAGES: usize = crate::mm::config::KERNEL_STACK_PAGES;

/// Maior pid/tid antes de dar a volta.
pub const MAX_PID: u32 = 32_768;
pub const MAX_TID: u32 = 65_536;

/// Primeiro pid entregue dinamicamente (0, 1 e 2 são reservados).
pub const FIRST_DYNAMIC_PID: u32 = 3;

/// Número de sinais (1..NSIG).
pub const NSIG: usize = 32;

/// Limites de `exec`/`spawn`.
pub const MAX_ARGS: usize = 256;
pub const MAX_ARG_LEN: usize = 4096;

/// Descritores por processo.
pub const MAX_FDS: usize = 256;

/// Symlinks seguidos numa única resolução de caminho.
pub const MAX_SYMLINK_DEPTH: usize = 8;
