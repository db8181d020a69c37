//! Interface de syscalls.
//!
//! Numeração própria, estável (ver [`numbers`]). O retorno é não negativo no
//! sucesso e `-errno` na falha.
//!
//! # Módulos
//!
//! - `abi`: argumentos do `TrapFrame`, strings e vetores de usuário
//! - `numbers`: constantes das syscalls
//! - `dispatch`: tabela e dispatcher central
//! - `process`: exit, fork, exec, spawn, wait, threads
//! - `memory`: mmap, munmap, vm_protect, heap_control
//! - `io`: io_read, io_write, io_close, pipe
//! - `fs`: operações do VFS
//! - `ipc`: futex e canais IPC
//! - `signal`: sigaction, sigreturn, kill
//! - `system`: poweroff, arch_syscall

pub mod abi;
pub mod dispatch;
pub mod numbers;

// Módulos de implementação
pub mod fs;
pub mod io;
pub mod ipc;
pub mod memory;
pub mod process;
pub mod signal;
pub mod system;

#[cfg(any(test, feature = "self_test"))]
pub mod test;

// Re-exports principais
pub use abi::SyscallArgs;
pub use dispatch::{dispatch, handle};
