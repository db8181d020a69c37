//! Implementação x86_64
//!
//! `paging` e `regs` são Rust puro e compilam em qualquer alvo (a plataforma hospedada
//! usa o mesmo layout de PTE). O resto só existe em bare metal x86_64.

pub mod paging;
pub mod regs;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod cpu;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod gdt;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod idt;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod mmu;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod switch;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub mod trap;

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use cpu::Cpu;
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub use mmu::Mmu;

pub use paging::X86Pte as Pte;
pub use regs::TrapFrame;

/// Inicializa o básico da arquitetura: NX, GDT/TSS, IDT.
///
/// # Safety
///
/// Deve ser chamado no início do boot, single-core.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub unsafe fn init() {
    cpu::X64Cpu::enable_nx();
    gdt::init();
    idt::init();
    crate::kinfo!("(Arch) x86_64: GDT, TSS e IDT carregados (syscall int 0x88)");
}

/// Arma o próximo tick. O driver de timer (PIT/LAPIC) é externo ao núcleo;
/// o vetor 32 é tratado quando alguém o programa.
#[cfg(all(target_arch = "x86_64", target_os = "none"))]
pub fn arm_timer() {}
