//! Core Module
//!
//! Contém a lógica central do kernel, independente de arquitetura,
//! mas fundamental para o funcionamento do sistema.

pub mod cmdline;
pub mod entry;
pub mod handoff;
pub mod logging;
#[cfg(target_os = "none")]
pub mod panic;
pub mod power;

#[cfg(any(test, feature = "self_test"))]
pub mod test;
