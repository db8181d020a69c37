//! Panic Handler.
//!
//! O "Airbag" do sistema. Quando o Rust detecta um estado irrecuperável,
//! esta função é chamada.
//!
//! # Comportamento
//! 1. Desabilita interrupções e para as outras CPUs (IPI de halt).
//! 2. Loga local, mensagem e a thread/processo responsável na Serial.
//! 3. Trava a CPU (hlt loop) ou desliga, com `poweroff_on_panic`.
//!
//! Só existe em bare metal; na plataforma hospedada o pânico é o do `std`.

use crate::arch::{Cpu, CpuOps, IpiKind};
use core::fmt::Write;
use core::panic::PanicInfo;
use core::sync::atomic::{AtomicBool, Ordering};

static PANICKING: AtomicBool = AtomicBool::new(false);

/// `core::fmt` direto na serial, sem alocação.
struct SerialWriter;

impl Write for SerialWriter {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        crate::drivers::serial::emit_str(s);
        Ok(())
    }
}

/// Para todas as outras CPUs online.
fn halt_other_cpus() {
    let me = Cpu::current_id();
    for cpu in crate::sched::online_cpus() {
        if cpu != me {
            let _ = Cpu::send_ipi(cpu, IpiKind::Halt);
        }
    }
}

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    // 1. Segurança imediata: parar interrupções
    Cpu::disable_interrupts();

    if PANICKING.swap(true, Ordering::SeqCst) {
        // Pânico dentro do pânico: não arriscar mais nada.
        crate::drivers::serial::emit_str("\n!!! pânico recursivo\n");
        Cpu::hang();
    }

    halt_other_cpus();

    // 2. Log estruturado (Serial é o mais confiável aqui)
    crate::kerror!("================ KERNEL PANIC ================");
    let mut out = SerialWriter;
    if let Some(location) = info.location() {
        let _ = writeln!(out, "Location: {}:{}", location.file(), location.line());
    } else {
        crate::kerror!("Location: Unknown");
    }
    let _ = writeln!(out, "Reason:   {}", info.message());
    crate::kerror!("CPU=", Cpu::current_id());
    crate::sched::dump_current();
    crate::kerror!("==============================================");

    // 3. Morrer com dignidade
    if crate::core::cmdline::kernel_options().poweroff_on_panic {
        crate::core::power::poweroff(false);
    }
    Cpu::hang();
}
