//! Plataforma hospedada.
//!
//! Roda o núcleo como um programa comum (testes do host):
//! - a RAM é uma arena alinhada que fica atrás do direct map (`ram`);
//! - cada thread do SO hospedeiro recebe um id de CPU próprio;
//! - TLB e controle de interrupções são no-ops;
//! - não há troca de stack: uma thread bloqueada gira sobre a própria condição de espera.

pub mod cpu;
pub mod mmu;
pub mod ram;

pub use cpu::Cpu;
pub use mmu::Mmu;

/// Nada a configurar: não há GDT/IDT/stvec.
///
/// # Safety
/// Mantida `unsafe` para ter a mesma assinatura das plataformas reais.
pub unsafe fn init() {
    crate::kinfo!("(Arch) Plataforma hospedada: RAM simulada atrás do direct map");
}

/// Sem timer: a preempção hospedada é a do próprio SO hospedeiro.
pub fn arm_timer() {}
