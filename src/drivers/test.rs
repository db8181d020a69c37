//! Testes dos drivers: registro de consoles e broadcast line-buffered.

use crate::drivers::console::{self, Color, Console, ConsoleCaps, COLOR_BLACK, COLOR_GREEN};
use crate::kcheck;
use crate::klib::test_framework::{run_test_suite, TestResult};
use crate::sync::Spinlock;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

crate::kernel_test_suite! {
    pub DRIVERS_TESTS = [
        test_console_line_buffering,
        test_console_log_copy_skips_serial,
        test_console_unregister,
        test_console_color_broadcast,
    ];
}

/// Executa todos os testes de drivers
pub fn run_drivers_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DE DRIVERS               ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("drivers", DRIVERS_TESTS).1
}

/// Console de memória: guarda cada escrita recebida.
struct CaptureConsole {
    name: &'static str,
    caps: ConsoleCaps,
    writes: Spinlock<Vec<Vec<u8>>>,
    color: Spinlock<(Color, Color)>,
}

impl CaptureConsole {
    fn new(name: &'static str, caps: ConsoleCaps) -> Arc<Self> {
        Arc::new(Self {
            name,
            caps,
            writes: Spinlock::new(Vec::new()),
            color: Spinlock::new((COLOR_BLACK, COLOR_BLACK)),
        })
    }

    /// Tudo que chegou, concatenado.
    fn text(&self) -> String {
        let writes = self.writes.lock();
        let bytes: Vec<u8> = writes.iter().flatten().copied().collect();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Console for CaptureConsole {
    fn name(&self) -> &str {
        self.name
    }

    fn caps(&self) -> ConsoleCaps {
        self.caps
    }

    fn write(&self, bytes: &[u8]) {
        self.writes.lock().push(bytes.to_vec());
    }

    fn set_color(&self, fg: Color, bg: Color) {
        *self.color.lock() = (fg, bg);
    }

    fn get_color(&self) -> (Color, Color) {
        *self.color.lock()
    }
}

// Outros testes também escrevem no console do sistema; só procuramos o que é nosso.

fn test_console_line_buffering() -> TestResult {
    let capture = CaptureConsole::new("test.capture.lines", ConsoleCaps::empty());
    console::register(capture.clone());

    console::write(b"drivers-marker-a ");
    let early = capture.text();
    console::write(b"parte\ndrivers-marker-b");
    console::flush();
    console::unregister("test.capture.lines");

    kcheck!(!early.contains("drivers-marker-a"), "linha incompleta não é entregue");
    let text = capture.text();
    kcheck!(text.contains("drivers-marker-a parte\n"), "linha completa entregue no \\n");
    kcheck!(text.contains("drivers-marker-b"), "flush entrega o resto");
    TestResult::Passed
}

fn test_console_log_copy_skips_serial() -> TestResult {
    let screen = CaptureConsole::new("test.capture.screen", ConsoleCaps::COLOR);
    let serial = CaptureConsole::new("test.capture.serial", ConsoleCaps::SERIAL_BACKED);
    console::register(screen.clone());
    console::register(serial.clone());

    console::log_write(b"drivers-log-marker\n");
    console::unregister("test.capture.screen");
    console::unregister("test.capture.serial");

    kcheck!(screen.text().contains("drivers-log-marker"), "cópia do log no console comum");
    kcheck!(!serial.text().contains("drivers-log-marker"), "console serial não recebe a cópia");
    TestResult::Passed
}

fn test_console_unregister() -> TestResult {
    let capture = CaptureConsole::new("test.capture.gone", ConsoleCaps::empty());
    console::register(capture.clone());
    kcheck!(console::count() >= 1, "console registrado");
    kcheck!(console::unregister("test.capture.gone"), "remoção pelo nome");
    kcheck!(!console::unregister("test.capture.gone"), "segunda remoção não acha nada");

    console::write(b"drivers-after-unregister\n");
    kcheck!(!capture.text().contains("drivers-after-unregister"), "removido não recebe mais");
    TestResult::Passed
}

fn test_console_color_broadcast() -> TestResult {
    let capture = CaptureConsole::new("test.capture.color", ConsoleCaps::COLOR);
    console::register(capture.clone());
    console::set_color(COLOR_GREEN, COLOR_BLACK);
    console::unregister("test.capture.color");

    kcheck!(capture.get_color() == (COLOR_GREEN, COLOR_BLACK), "cor aplicada a todos");
    TestResult::Passed
}
