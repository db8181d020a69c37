//! Testes da Biblioteca de Base do Kernel (klib)

use crate::kcheck;
use crate::klib::bitmap::Bitmap;
use crate::klib::test_framework::{run_test_suite, TestResult};
use crate::klib::{align_down, align_up, div_round_up, is_aligned};

crate::kernel_test_suite! {
    pub KLIB_TESTS = [
        test_alignment_helpers,
        test_bitmap_ranges,
    ];
}

/// Executa todos os testes de klib
pub fn run_klib_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DE KLIB                  ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("klib", KLIB_TESTS).1
}

fn test_alignment_helpers() -> TestResult {
    kcheck!(align_up(10, 4) == 12, "align_up(10, 4)");
    kcheck!(align_up(4096, 4096) == 4096, "align_up alinhado");
    kcheck!(align_down(4097, 4096) == 4096, "align_down");
    kcheck!(is_aligned(0x2000, 0x1000), "is_aligned");
    kcheck!(!is_aligned(0x2001, 0x1000), "is_aligned desalinhado");
    kcheck!(div_round_up(4097, 4096) == 2, "div_round_up");
    TestResult::Passed
}

fn test_bitmap_ranges() -> TestResult {
    let mut words = [0u64; 2];
    let mut bitmap = Bitmap::new(&mut words, 100);

    bitmap.set_range(0, 70);
    kcheck!(bitmap.test(69), "bit 69 setado");
    kcheck!(!bitmap.test(70), "bit 70 livre");
    kcheck!(bitmap.find_first_zero() == Some(70), "primeiro zero");

    bitmap.clear_range(10, 5);
    kcheck!(bitmap.find_first_zero() == Some(10), "zero após clear");
    kcheck!(bitmap.find_next_set(10) == Some(15), "próximo setado");

    bitmap.clear_range(0, 70);
    kcheck!(bitmap.is_empty(), "bitmap vazio");
    TestResult::Passed
}
