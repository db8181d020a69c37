//! Modelo de tarefas: processos, threads e as tabelas globais.

pub mod process;
pub mod state;
pub mod table;
pub mod thread;

pub use process::{ExitStatus, Process, ProcessArgs};
pub use state::{SwitchFlags, ThreadMode, ThreadState};
pub use thread::{KernelEntry, Thread, UserStack};
