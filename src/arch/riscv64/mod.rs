//! Implementação RISC-V 64 (SV48, modo supervisor sobre SBI).
//!
//! `paging` e `regs` compilam em qualquer alvo; o resto só em bare metal RISC-V.

pub mod paging;
pub mod regs;

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub mod cpu;
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub mod mmu;
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub mod switch;
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub mod trap;

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub use cpu::Cpu;
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub use mmu::Mmu;

pub use paging::Sv48Pte as Pte;
pub use regs::TrapFrame;

/// Intervalo do timer em ticks de `time` (10 ms a 10 MHz no QEMU virt).
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
const TIMER_INTERVAL: u64 = 100_000;

/// Instala o vetor de traps e habilita as fontes de interrupção.
///
/// # Safety
///
/// Early boot, com `sscratch` ainda zerado.
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub unsafe fn init() {
    use riscv::register::{sscratch, stvec};

    sscratch::write(0);
    stvec::write(trap::entry_address(), stvec::TrapMode::Direct);
    cpu::RiscvCpu::enable_sources();
    crate::kinfo!("(Arch) riscv64: stvec instalado, SV48");
}

/// Arma o próximo tick via SBI.
#[cfg(all(target_arch = "riscv64", target_os = "none"))]
pub fn arm_timer() {
    cpu::RiscvCpu::set_timer(cpu::RiscvCpu::read_time() + TIMER_INTERVAL);
}
