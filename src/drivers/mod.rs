//! # Drivers mínimos do kernel
//!
//! | Driver   | Arquivo       | Papel |
//! |----------|---------------|-------|
//! | Serial   | `serial/`     | Sink de logs (UART 16550, SBI ou sink hospedado) |
//! | Console  | `console.rs`  | Registro de consoles, broadcast line-buffered |
//!
//! Drivers de dispositivo completos ficam fora do núcleo.

pub mod console;
pub mod serial;

#[cfg(any(test, feature = "self_test"))]
pub mod test;
