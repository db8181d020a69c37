// =============================================================================
// SERIAL DRIVER - ZERO OVERHEAD
// =============================================================================
//
// Sink de logging do kernel. Cada plataforma fornece um backend:
// - x86_64 bare metal: UART 16550 (COM1) em assembly puro
// - RISC-V bare metal: SBI legacy console (ecall)
// - hospedada: sink instalado pelo binário/testes (stderr), no-op por padrão
//
// FUNÇÕES DISPONÍVEIS:
// - emit(byte)       : Envia um byte
// - emit_str(s)      : Envia string
// - emit_hex(v)      : Envia u64 em hexadecimal (0x + 16 dígitos)
// - emit_dec(v)      : Envia usize em decimal
// - emit_nl()        : Envia newline
// - try_read()       : Lê um byte se disponível (console de entrada)
//
// =============================================================================

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
mod uart16550;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
use uart16550 as backend;

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
mod sbi;
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
use sbi as backend;

#[cfg(not(target_os = "none"))]
pub mod hosted;
#[cfg(not(target_os = "none"))]
use hosted as backend;

/// Inicializa o backend serial. Deve ser chamada uma vez no early-boot.
pub fn init() {
    backend::init();
}

#[inline(always)]
pub fn emit(byte: u8) {
    backend::emit(byte);
}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use uart16550::{emit_hex, emit_nl, emit_str};

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
#[inline(never)]
pub fn emit_str(s: &str) {
    backend::emit_bytes(s.as_bytes());
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
#[inline(never)]
pub fn emit_nl() {
    backend::emit_bytes(b"\n");
}

#[cfg(not(all(target_arch = "x86_64", target_os = "none")))]
#[inline(never)]
pub fn emit_hex(value: u64) {
    let mut buf = [0u8; 18];
    backend::emit_bytes(crate::core::logging::format_hex(value, &mut buf));
}

/// Envia um valor usize em formato decimal.
///
/// Usa um buffer de stack de 20 bytes (máximo para u64).
#[inline(never)]
pub fn emit_dec(mut value: usize) {
    let mut buf: [u8; 20] = [0; 20];
    let mut pos = 20;

    if value == 0 {
        emit(b'0');
        return;
    }

    while value > 0 {
        pos -= 1;
        buf[pos] = b'0' + (value % 10) as u8;
        value /= 10;
    }

    while pos < 20 {
        emit(buf[pos]);
        pos += 1;
    }
}

/// Lê um byte se houver dado disponível.
pub fn try_read() -> Option<u8> {
    backend::try_read()
}
