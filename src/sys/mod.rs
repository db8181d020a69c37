//! System Definitions (ABI).
//!
//! Contém as constantes e tipos que definem a interface entre o Kernel e o Mundo.

pub mod error;
pub mod types;

pub use error::{Errno, SysResult};
pub use types::{Gid, Pid, Tid, Uid};
