//! Mosaic Kernel: binário principal.
//!
//! Responsabilidade:
//! 1. Configurar o ambiente de execução "naked" (Assembly).
//! 2. Inicializar a Stack.
//! 3. Habilitar SSE (x86_64).
//! 4. **ZERAR BSS** (o bootloader não garante que a região venha zerada).
//! 5. Saltar para `core::entry::kernel_main` (da biblioteca `mosaic`) com o `BootInfo`
//!    no primeiro registrador de argumento.
//!
//! Na plataforma hospedada não há boot: o kernel roda pelos testes (`cargo test`).

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod boot {
    // Força a ligação da biblioteca (panic handler, alocador global).
    use mosaic::core as kernel_core;

    const KERNEL_STACK_SIZE: usize = 64 * 1024;

    #[repr(C, align(16))]
    struct KernelStack([u8; KERNEL_STACK_SIZE]);

    #[no_mangle]
    static mut KERNEL_STACK: KernelStack = KernelStack([0; KERNEL_STACK_SIZE]);

    extern "C" {
        static __bss_start: u8;
        static __bss_end: u8;
    }

    #[cfg(target_arch = "x86_64")]
    ::core::arch::global_asm!(
        ".section .text._start, \"ax\"",
        ".global _start",
        "_start:",
        // boot_info em R15 (callee-saved)
        "mov r15, rdi",
        "lea rax, [rip + {stack}]",
        "lea rsp, [rax + {stack_size}]",
        "xor rbp, rbp",
        // SSE: CR0.EM=0, CR0.MP=1, CR4.OSFXSR|OSXMMEXCPT
        "mov rax, cr0",
        "and ax, 0xFFFB",
        "or ax, 0x2",
        "mov cr0, rax",
        "mov rax, cr4",
        "or ax, 0x600",
        "mov cr4, rax",
        // BSS
        "lea rdi, [rip + {bss_start}]",
        "lea rcx, [rip + {bss_end}]",
        "sub rcx, rdi",
        "xor eax, eax",
        "rep stosb",
        "and rsp, -16",
        "mov rdi, r15",
        "call {kernel_main}",
        "2:",
        "cli",
        "hlt",
        "jmp 2b",
        stack = sym KERNEL_STACK,
        stack_size = const KERNEL_STACK_SIZE,
        bss_start = sym __bss_start,
        bss_end = sym __bss_end,
        kernel_main = sym kernel_core::entry::kernel_main,
    );

    #[cfg(target_arch = "riscv64")]
    ::core::arch::global_asm!(
        ".section .text._start, \"ax\"",
        ".global _start",
        "_start:",
        // boot_info em s1 (callee-saved)
        "mv s1, a0",
        "la sp, {stack}",
        "li t0, {stack_size}",
        "add sp, sp, t0",
        // BSS (alinhado a 8 pelo linker)
        "la t0, {bss_start}",
        "la t1, {bss_end}",
        "1:",
        "bgeu t0, t1, 2f",
        "sd zero, 0(t0)",
        "addi t0, t0, 8",
        "j 1b",
        "2:",
        "mv a0, s1",
        "call {kernel_main}",
        "3:",
        "wfi",
        "j 3b",
        stack = sym KERNEL_STACK,
        stack_size = const KERNEL_STACK_SIZE,
        bss_start = sym __bss_start,
        bss_end = sym __bss_end,
        kernel_main = sym kernel_core::entry::kernel_main,
    );
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("mosaic: o kernel só inicia em bare metal; use `cargo test` na plataforma hospedada");
}
