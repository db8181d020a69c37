//! # Hardware Abstraction Layer (HAL)
//!
//! O módulo `arch` atua como a **única** ponte entre o *Kernel Core* (lógica agnóstica) e o hardware real.
//! Toda interação com registradores, instruções privilegiadas e controle de CPU deve passar por aqui.
//!
//! ## 🎯 Propósito e Responsabilidade
//! - **Isolamento:** O resto do kernel (`mm`, `sched`, `fs`) **não deve** saber em qual CPU está rodando.
//! - **Abstração:** Define traits (em `traits/`) que as implementações (`x86_64/`, `riscv64/`, `hosted/`) satisfazem.
//! - **Seleção de Plataforma:** `platform` aponta para a implementação escolhida em tempo de compilação.
//!
//! ## 🏗️ Arquitetura e Fluxo
//! 1. O `Kernel Core` importa `crate::arch::{Cpu, Mmu, Pte, TrapFrame}`.
//! 2. Cada um é um *type alias* para a implementação concreta.
//! 3. Traps entram pelo assembly da plataforma, são decodificadas em `trap::TrapKind` e
//!    tratadas de forma genérica por `trap::handle`.
//!
//! Os layouts de PTE e de `TrapFrame` das duas arquiteturas são Rust puro e compilam em
//! qualquer alvo; o layout usado pela plataforma hospedada segue o `target_arch` do host.

pub mod riscv64;
pub mod trap;
pub mod traits;
pub mod x86_64;

#[cfg(not(target_os = "none"))]
pub mod hosted;

// Seleção de Plataforma
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use self::x86_64 as platform;

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub use self::riscv64 as platform;

#[cfg(not(target_os = "none"))]
pub use self::hosted as platform;

// Layout de PTE/frame do alvo
#[cfg(target_arch = "riscv64")]
pub use self::riscv64::{Pte, TrapFrame};

#[cfg(not(target_arch = "riscv64"))]
pub use self::x86_64::{Pte, TrapFrame};

// Re-exports globais para o kernel usar
pub use platform::{Cpu, Mmu};
pub use traits::*;

#[cfg(any(test, feature = "self_test"))]
pub mod test;
