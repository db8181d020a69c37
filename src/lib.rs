// src/lib.rs
//! Mosaic Kernel Library.
//!
//! Ponto central de exportação dos módulos do Kernel.
//! Define a estrutura hierárquica do sistema operacional.
//!
//! O mesmo código roda em duas "plataformas":
//! - **bare metal** (`target_os = "none"`): x86_64 ou RISC-V SV48, com assembly real.
//! - **hospedada** (qualquer outro alvo): RAM simulada atrás do direct map, usada pelos
//!   testes (`cargo test`).

#![cfg_attr(not(test), no_std)]

// Habilitar alocação dinâmica (necessário para Vec/Box/Arc)
extern crate alloc;

// --- Módulos de Baixo Nível (Hardware) ---
pub mod arch; // HAL (CPU, MMU, PTE, contexto)
pub mod drivers; // Serial e registro de consoles

// --- Módulos Centrais (Lógica do Kernel) ---
pub mod core; // Inicialização, Logging, Panic, Cmdline
pub mod klib; // Utilitários Internos (Bitmaps, Test framework)
pub mod mm; // Gerenciamento de Memória (PMM, Paging, VMA, Faults)
pub mod sync; // Primitivas de Sincronização (Spinlock, Mutex, PerCpu)
pub mod sys; // Definições de Sistema (Errno)

// --- Subsistemas Avançados ---
pub mod fs; // Sistema de Arquivos Virtual (VFS, dentry cache, tmpfs, cpio, userfs)
pub mod ipc; // Comunicação entre Processos (IPC-SHM, canais, pipes, futex)
pub mod sched; // Processos, Threads, Scheduler e Sinais
pub mod syscall; // Interface com Userspace

#[cfg(test)]
pub mod testing;

// Re-exportar BootInfo para acesso fácil no binário
pub use crate::core::handoff::BootInfo;
