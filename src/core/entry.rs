//! Entry Point Lógico do Kernel.
//!
//! `kernel_main` é o primeiro código Rust de alto nível a ser executado após o
//! trampolim em assembly (`_start`).
//!
//! # Ordem de inicialização
//! 1. **Validação**: magic do handoff (sem ele não confiamos em nada).
//! 2. **Early**: serial, heap do kernel, cmdline, direct map.
//! 3. **Arch**: traps, contexto por CPU.
//! 4. **Memória**: PMM, page tables, zero page.
//! 5. **Subsistemas**: VFS (com o initrd), IPC, scheduler.
//! 6. **Init**: primeiro processo de usuário; o timer é armado e a CPU entra no scheduler.

use crate::core::handoff::{MemoryMapEntry, MemoryType};

/// Tamanho do direct map: até o fim da última região que não seja reservada.
pub fn direct_map_size(memory_map: &[MemoryMapEntry]) -> usize {
    memory_map
        .iter()
        .filter(|e| e.typ != MemoryType::Reserved)
        .map(|e| (e.base + e.len) as usize)
        .max()
        .unwrap_or(0)
}

/// Função principal do Kernel (High-Level).
///
/// Chamada pelo `_start` com a stack já configurada e o BSS zerado.
#[cfg(target_os = "none")]
pub extern "C" fn kernel_main(boot_info: &'static crate::core::handoff::BootInfo) -> ! {
    use crate::arch::{Cpu, CpuOps};
    use crate::core::cmdline;
    use crate::drivers::{console, serial};
    use crate::mm::{heap, hhdm};
    use alloc::sync::Arc;

    // 1. Sanity check
    if !boot_info.is_valid() {
        Cpu::hang();
    }

    // 2. Early boot
    serial::init();
    crate::kinfo!("Mosaic Kernel - Iniciando");
    crate::kinfo!("Protocolo de boot v", boot_info.version as u64);

    heap::init();
    console::register(Arc::new(console::SerialConsole));

    cmdline::init(boot_info.cmdline());
    let opts = cmdline::kernel_options();

    // SAFETY: o bootloader mapeia toda a RAM do mapa de memória em hhdm_offset.
    unsafe {
        hhdm::init(
            boot_info.hhdm_offset as usize,
            direct_map_size(boot_info.memory_map()),
        );
    }

    // 3. Arquitetura
    crate::kinfo!("Inicializando arquitetura...");
    // SAFETY: executado uma única vez, no BSP, com interrupções desligadas.
    unsafe {
        crate::arch::platform::init();
    }

    // 4. Memória
    crate::mm::init(boot_info);

    // 5. Subsistemas
    let initrd = if boot_info.initrd_size > 0 {
        // SAFETY: os frames do initrd foram reservados por `mm::init` e nunca são
        // devolvidos; o direct map cobre a região.
        Some(unsafe {
            ::core::slice::from_raw_parts(
                hhdm::phys_to_virt::<u8>(boot_info.initrd_addr as usize) as *const u8,
                boot_info.initrd_size as usize,
            )
        })
    } else {
        None
    };
    crate::fs::init(initrd);
    crate::ipc::init();
    crate::sched::init(&opts.scheduler);

    #[cfg(feature = "self_test")]
    {
        let failed = run_self_tests();
        if failed > 0 {
            crate::kerror!("(SelfTest) Testes falharam: ", failed as u64);
        }
    }

    // 6. Init
    crate::kinfo!("(Init) Carregando: ", str opts.init_path.as_str());
    match crate::sched::exec::spawn_init(&opts.init_path, cmdline::raw()) {
        Ok(process) => crate::kinfo!("(Init) Processo iniciado, pid=", process.pid().0 as u64),
        Err(e) => crate::kerror!("(Init) Falha ao iniciar o init: ", str e.as_str()),
    }

    crate::arch::platform::arm_timer();
    crate::kinfo!("Habilitando interrupções - sistema ativo");
    crate::sched::core::run()
}

/// Roda todas as suítes de teste do kernel. Devolve o total de falhas.
#[cfg(feature = "self_test")]
pub fn run_self_tests() -> usize {
    let mut failed = 0;
    failed += crate::core::test::run_core_tests();
    failed += crate::klib::test::run_klib_tests();
    failed += crate::sync::test::run_sync_tests();
    failed += crate::arch::test::run_arch_tests();
    failed += crate::mm::test::run_mm_tests();
    failed += crate::drivers::test::run_drivers_tests();
    failed += crate::fs::test::run_fs_tests();
    failed += crate::ipc::test::run_ipc_tests();
    failed += crate::sched::test::run_sched_tests();
    failed += crate::syscall::test::run_syscall_tests();
    failed
}
