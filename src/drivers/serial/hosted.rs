//! Backend serial da plataforma hospedada.
//!
//! O kernel não conhece stdout/stderr: quem hospeda (os testes) instala
//! um sink. Sem sink, a saída é descartada.

use spin::Once;

pub type Sink = fn(&[u8]);

static SINK: Once<Sink> = Once::new();

/// Instala o sink de saída. Chamadas posteriores são ignoradas.
pub fn set_sink(sink: Sink) {
    SINK.call_once(|| sink);
}

pub fn init() {}

#[inline(always)]
pub fn emit(byte: u8) {
    emit_bytes(&[byte]);
}

pub fn emit_bytes(bytes: &[u8]) {
    if let Some(sink) = SINK.get() {
        sink(bytes);
    }
}

pub fn try_read() -> Option<u8> {
    None
}
