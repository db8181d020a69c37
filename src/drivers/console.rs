//! Registro de Consoles.
//!
//! Cada console registrado recebe, linha a linha, tudo que é escrito no console do
//! sistema (stdout/stderr do init) e a cópia dos logs INFO+ do kernel.
//!
//! # Regras
//! - Escritas são line-buffered: nada chega aos consoles antes de um `\n` ou `flush()`.
//! - Consoles com `ConsoleCaps::SERIAL_BACKED` não recebem a cópia dos logs (já os veem
//!   pela serial).
//! - Implementações de `Console` não podem logar (o lock do registro está tomado).

use crate::sync::Spinlock;
use alloc::sync::Arc;
use alloc::vec::Vec;
use bitflags::bitflags;
use spin::RwLock;

/// Definição de cores (32-bit ARGB/BGRA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u32);

pub const COLOR_BLACK: Color = Color(0x000000);
pub const COLOR_WHITE: Color = Color(0xFFFFFF);
pub const COLOR_RED: Color = Color(0xFF0000);
pub const COLOR_GREEN: Color = Color(0x00FF00);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ConsoleCaps: u32 {
        const COLOR         = 1 << 0;
        const CURSOR        = 1 << 1;
        const INPUT         = 1 << 2;
        const SERIAL_BACKED = 1 << 3;
    }
}

/// Interface de um console.
pub trait Console: Send + Sync {
    fn name(&self) -> &str;
    fn caps(&self) -> ConsoleCaps;
    fn write(&self, bytes: &[u8]);
    fn read(&self) -> Option<u8> {
        None
    }
    fn set_color(&self, _fg: Color, _bg: Color) {}
    fn get_color(&self) -> (Color, Color) {
        (COLOR_WHITE, COLOR_BLACK)
    }
    fn clear(&self) {}
    fn move_cursor(&self, _col: usize, _row: usize) {}
    /// (colunas, linhas)
    fn get_size(&self) -> (usize, usize) {
        (80, 25)
    }
}

static CONSOLES: RwLock<Vec<Arc<dyn Console>>> = RwLock::new(Vec::new());

/// Buffer da linha corrente do console do sistema.
static LINE: Spinlock<Vec<u8>> = Spinlock::new(Vec::new());

/// Buffer da linha corrente de logs.
static LOG_LINE: Spinlock<Vec<u8>> = Spinlock::new(Vec::new());

pub fn register(console: Arc<dyn Console>) {
    CONSOLES.write().push(console);
}

/// Remove um console pelo nome. Retorna `true` se existia.
pub fn unregister(name: &str) -> bool {
    let mut consoles = CONSOLES.write();
    let before = consoles.len();
    consoles.retain(|c| c.name() != name);
    consoles.len() != before
}

pub fn count() -> usize {
    CONSOLES.read().len()
}

fn broadcast(bytes: &[u8], include_serial: bool) {
    for console in CONSOLES.read().iter() {
        if include_serial || !console.caps().contains(ConsoleCaps::SERIAL_BACKED) {
            console.write(bytes);
        }
    }
}

fn buffered_write(line: &Spinlock<Vec<u8>>, bytes: &[u8], include_serial: bool) {
    let mut line = line.lock();
    for chunk in bytes.split_inclusive(|&b| b == b'\n') {
        line.extend_from_slice(chunk);
        if chunk.last() == Some(&b'\n') {
            broadcast(&line, include_serial);
            line.clear();
        }
    }
}

/// Escreve no console do sistema (todos os consoles registrados).
pub fn write(bytes: &[u8]) {
    if count() == 0 {
        return;
    }
    buffered_write(&LINE, bytes, true);
}

/// Cópia de logs do kernel (chamado pelos macros de logging).
pub fn log_write(bytes: &[u8]) {
    // Antes do heap existir ninguém se registrou; não alocar.
    if count() == 0 {
        return;
    }
    buffered_write(&LOG_LINE, bytes, false);
}

/// Esvazia a linha pendente do console do sistema.
pub fn flush() {
    let mut line = LINE.lock();
    if !line.is_empty() {
        broadcast(&line, true);
        line.clear();
    }
}

/// Lê um byte do primeiro console com entrada disponível.
pub fn read_byte() -> Option<u8> {
    CONSOLES
        .read()
        .iter()
        .filter(|c| c.caps().contains(ConsoleCaps::INPUT))
        .find_map(|c| c.read())
}

pub fn set_color(fg: Color, bg: Color) {
    for console in CONSOLES.read().iter() {
        console.set_color(fg, bg);
    }
}

pub fn clear() {
    for console in CONSOLES.read().iter() {
        console.clear();
    }
}

/// Console sobre a porta serial (stdin/stdout do init em bare metal).
pub struct SerialConsole;

impl Console for SerialConsole {
    fn name(&self) -> &str {
        "serial0"
    }

    fn caps(&self) -> ConsoleCaps {
        ConsoleCaps::INPUT | ConsoleCaps::SERIAL_BACKED
    }

    fn write(&self, bytes: &[u8]) {
        for &b in bytes {
            super::serial::emit(b);
        }
    }

    fn read(&self) -> Option<u8> {
        super::serial::try_read()
    }
}
