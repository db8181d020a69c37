//! Boot da plataforma hospedada para os testes (`cargo test`).
//!
//! Cada `#[test]` gerado por `kernel_test_suite!` chama [`boot`] antes do caso. O boot
//! roda uma única vez por processo, na mesma ordem de `core::entry::kernel_main`, com a
//! RAM simulada no lugar do mapa de memória do bootloader.

use crate::arch::hosted::ram;
use crate::mm::config::HOSTED_RAM_SIZE;
use spin::Once;
use std::io::Write;

static BOOTED: Once<()> = Once::new();

fn stderr_sink(bytes: &[u8]) {
    let _ = std::io::stderr().write_all(bytes);
}

/// Inicializa o kernel hospedado (idempotente).
pub fn boot() {
    BOOTED.call_once(|| {
        crate::drivers::serial::hosted::set_sink(stderr_sink);
        crate::core::cmdline::init("");

        let arena = ram::allocate_arena();
        // SAFETY: a arena tem HOSTED_RAM_SIZE bytes e vive até o fim do processo.
        unsafe {
            crate::mm::hhdm::init(arena, HOSTED_RAM_SIZE);
            crate::arch::platform::init();
        }
        crate::mm::pmm::init(&ram::memory_map());
        crate::mm::paging::init(None);
        crate::mm::fault::init_zero_page();

        crate::fs::init(None);
        crate::ipc::init();
        crate::sched::init("naive");
    });
}
