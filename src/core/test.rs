//! Testes do Core: linha de comando, formatação de logs e handoff.

use crate::core::cmdline::{options, parse_bool, CmdlineOption, KernelOptions, DEFAULT_INIT_PATH};
use crate::core::entry::direct_map_size;
use crate::core::handoff::{BootInfo, MemoryMapEntry, MemoryType, BOOT_MAGIC};
use crate::core::logging::format_hex;
use crate::kcheck;
use crate::klib::test_framework::{run_test_suite, TestResult};
use alloc::vec::Vec;

crate::kernel_test_suite! {
    pub CORE_TESTS = [
        test_cmdline_tokens,
        test_cmdline_quotes,
        test_cmdline_truthiness,
        test_kernel_options,
        test_hex_format,
        test_boot_info_validation,
        test_direct_map_size,
    ];
}

/// Executa todos os testes do Core
pub fn run_core_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DO CORE                  ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("core", CORE_TESTS).1
}

fn test_cmdline_tokens() -> TestResult {
    let opts: Vec<CmdlineOption<'_>> = options("  quiet init=/bin/sh   poweroff_on_panic=no ").collect();
    kcheck!(opts.len() == 3, "três opções");
    kcheck!(opts[0] == CmdlineOption { name: "quiet", arg: None }, "opção sem argumento");
    kcheck!(opts[1].name == "init" && opts[1].arg == Some("/bin/sh"), "init=/bin/sh");
    kcheck!(opts[2].as_bool() == Some(false), "poweroff_on_panic=no");
    kcheck!(options("").next().is_none(), "linha vazia");
    TestResult::Passed
}

fn test_cmdline_quotes() -> TestResult {
    let opts: Vec<CmdlineOption<'_>> = options("init=\"/bin/sh -x\" quiet").collect();
    kcheck!(opts.len() == 2, "aspas agrupam palavras");
    kcheck!(opts[0].arg == Some("/bin/sh -x"), "aspas removidas");
    kcheck!(opts[1].name == "quiet", "opção após aspas");
    TestResult::Passed
}

fn test_cmdline_truthiness() -> TestResult {
    for yes in ["true", "1", "yes", "on"] {
        kcheck!(parse_bool(yes) == Some(true), "verdadeiro");
    }
    for no in ["false", "0", "no", "off"] {
        kcheck!(parse_bool(no) == Some(false), "falso");
    }
    kcheck!(parse_bool("talvez").is_none(), "valor inválido");
    TestResult::Passed
}

fn test_kernel_options() -> TestResult {
    let defaults = KernelOptions::parse("");
    kcheck!(defaults.init_path == DEFAULT_INIT_PATH, "init padrão");
    kcheck!(!defaults.quiet, "quiet desligado por padrão");

    let opts = KernelOptions::parse("init=/initrd/programs/init quiet poweroff_on_panic scheduler=naive");
    kcheck!(opts.init_path == "/initrd/programs/init", "init customizado");
    kcheck!(opts.quiet, "quiet ligado");
    kcheck!(opts.poweroff_on_panic, "poweroff_on_panic ligado");
    kcheck!(opts.scheduler == "naive", "scheduler=naive");

    let off = KernelOptions::parse("quiet=off");
    kcheck!(!off.quiet, "quiet=off");
    TestResult::Passed
}

fn test_hex_format() -> TestResult {
    let mut buf = [0u8; 18];
    kcheck!(format_hex(0xDEAD_BEEF, &mut buf) == b"0x00000000DEADBEEF", "format_hex");
    TestResult::Passed
}

fn test_boot_info_validation() -> TestResult {
    let mut info = BootInfo {
        magic: BOOT_MAGIC,
        version: 1,
        hhdm_offset: 0,
        memory_map_addr: 0,
        memory_map_len: 0,
        cmdline_addr: 0,
        cmdline_len: 0,
        kernel_phys_addr: 0,
        kernel_size: 0,
        initrd_addr: 0,
        initrd_size: 0,
        boot_page_table: 0,
    };
    kcheck!(info.is_valid(), "magic válido");
    kcheck!(info.memory_map().is_empty(), "mapa ausente");
    kcheck!(info.cmdline().is_empty(), "cmdline ausente");

    let cmdline = "quiet";
    info.cmdline_addr = cmdline.as_ptr() as u64;
    info.cmdline_len = cmdline.len() as u64;
    kcheck!(info.cmdline() == "quiet", "cmdline lida do handoff");

    info.magic = 0;
    kcheck!(!info.is_valid(), "magic inválido");
    TestResult::Passed
}

fn test_direct_map_size() -> TestResult {
    let map = [
        MemoryMapEntry { base: 0, len: 0x9_F000, typ: MemoryType::Usable },
        MemoryMapEntry { base: 0x10_0000, len: 0x70_0000, typ: MemoryType::Usable },
        MemoryMapEntry { base: 0x80_0000, len: 0x1_0000, typ: MemoryType::BootloaderReclaimable },
        MemoryMapEntry { base: 0xFEC0_0000, len: 0x1000, typ: MemoryType::Reserved },
    ];
    kcheck!(direct_map_size(&map) == 0x81_0000, "MMIO reservado fica fora", direct_map_size(&map));
    kcheck!(direct_map_size(&[]) == 0, "mapa vazio");
    TestResult::Passed
}
