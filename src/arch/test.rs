//! Testes da HAL: layouts de PTE e contexto de registradores das duas arquiteturas.

use crate::arch::riscv64::{paging::Sv48Pte, TrapFrame as RvFrame};
use crate::arch::traits::{PageLevel, PteOps, UserContext};
use crate::arch::x86_64::{paging::X86Pte, TrapFrame as X86Frame};
use crate::kcheck;
use crate::klib::test_framework::{run_test_suite, TestResult};
use crate::mm::VmFlags;

crate::kernel_test_suite! {
    pub ARCH_TESTS = [
        test_page_level_geometry,
        test_x86_pte_layout,
        test_sv48_pte_layout,
        test_syscall_rewind,
    ];
}

/// Executa todos os testes de arch
pub fn run_arch_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DE ARCH                  ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("arch", ARCH_TESTS).1
}

fn test_page_level_geometry() -> TestResult {
    let vaddr = 0x0000_7F12_3456_7000usize;
    kcheck!(PageLevel::Pml1.shift() == 12, "shift Pml1");
    kcheck!(PageLevel::Pml4.shift() == 39, "shift Pml4");
    kcheck!(PageLevel::Pml2.pages_per_entry() == 512, "páginas por entrada Pml2");
    kcheck!(PageLevel::Pml4.index(vaddr) == (vaddr >> 39) & 0x1FF, "índice Pml4");
    kcheck!(PageLevel::Pml1.next().is_none(), "Pml1 é o último nível");
    TestResult::Passed
}

fn check_layout<P: PteOps>() -> TestResult {
    let rw = VmFlags::READ | VmFlags::WRITE | VmFlags::USER;

    let leaf = P::make_leaf(0x1234, rw);
    kcheck!(leaf.present(PageLevel::Pml1), "folha presente");
    kcheck!(leaf.pfn(PageLevel::Pml1) == 0x1234, "pfn da folha");
    let flags = leaf.flags(PageLevel::Pml1);
    kcheck!(flags.contains(VmFlags::WRITE), "folha gravável");
    kcheck!(flags.contains(VmFlags::USER), "folha de usuário");
    kcheck!(!flags.contains(VmFlags::EXEC), "folha sem exec");

    let mut ro = leaf;
    ro.set_flags(PageLevel::Pml1, VmFlags::READ | VmFlags::USER);
    kcheck!(ro.pfn(PageLevel::Pml1) == 0x1234, "set_flags preserva pfn");
    kcheck!(!ro.flags(PageLevel::Pml1).contains(VmFlags::WRITE), "downgrade para RO");

    let mut moved = leaf;
    moved.set_pfn(PageLevel::Pml1, 0x9999);
    kcheck!(moved.flags(PageLevel::Pml1).contains(VmFlags::WRITE), "set_pfn preserva flags");

    let table = P::make_table(PageLevel::Pml3, 0x42);
    kcheck!(table.present(PageLevel::Pml3), "tabela presente");
    kcheck!(!table.is_huge(PageLevel::Pml3), "tabela não é huge");
    kcheck!(table.pfn(PageLevel::Pml3) == 0x42, "pfn da tabela");

    let mut huge = P::empty();
    huge.set_huge(PageLevel::Pml2, 0x200, rw);
    kcheck!(huge.is_huge(PageLevel::Pml2), "huge em Pml2");
    kcheck!(huge.huge_pfn(PageLevel::Pml2) == 0x200, "pfn huge");

    let mut cleared = leaf;
    cleared.clear();
    kcheck!(!cleared.present(PageLevel::Pml1), "entrada limpa");
    TestResult::Passed
}

fn test_x86_pte_layout() -> TestResult {
    // NX é o bit 63 quando EXEC não está presente.
    let leaf = X86Pte::make_leaf(1, VmFlags::READ);
    kcheck!(leaf.raw() & (1 << 63) != 0, "NX setado");
    check_layout::<X86Pte>()
}

fn test_sv48_pte_layout() -> TestResult {
    // PPN começa no bit 10.
    let leaf = Sv48Pte::make_leaf(1, VmFlags::READ);
    kcheck!(leaf.raw() >> 10 == 1, "PPN no bit 10");
    check_layout::<Sv48Pte>()
}

fn test_syscall_rewind() -> TestResult {
    let mut x86 = X86Frame::new_user(0x40_0000, 0x7000, 0, 0);
    x86.set_ip(0x40_0010);
    x86.set_return(-512);
    x86.rewind_syscall(7, 0);
    kcheck!(x86.ip() == 0x40_000E, "x86 volta para o int 0x88");
    kcheck!(x86.syscall_number() == 7, "x86 restaura rax");
    kcheck!(x86.from_user(), "x86 contexto de usuário");

    let mut rv = RvFrame::new_user(0x1_0000, 0x7000, 5, 6);
    kcheck!(rv.syscall_arg(0) == 5 && rv.syscall_arg(1) == 6, "riscv argumentos");
    rv.set_ip(0x1_0008);
    rv.set_return(-512);
    rv.rewind_syscall(9, 5);
    kcheck!(rv.ip() == 0x1_0004, "riscv volta para o ecall");
    kcheck!(rv.syscall_arg(0) == 5, "riscv restaura a0");
    kcheck!(rv.from_user(), "riscv contexto de usuário");
    TestResult::Passed
}
