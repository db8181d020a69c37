//! Implementação x86_64 das operações de CPU (HAL).
//!
//! Assembly inline para controle de interrupções e identificação do núcleo.
//! Assume modo longo e Ring 0.

use crate::arch::traits::{CpuOps, IpiKind};
use crate::sys::Errno;
use core::arch::asm;

pub struct X64Cpu;

impl X64Cpu {
    /// Lê um Model Specific Register (MSR).
    ///
    /// # Safety
    /// Ler um MSR inválido gera #GP.
    #[inline]
    pub unsafe fn read_msr(msr: u32) -> u64 {
        let (high, low): (u32, u32);
        asm!(
            "rdmsr",
            in("ecx") msr,
            out("eax") low,
            out("edx") high,
            options(nomem, nostack, preserves_flags),
        );
        ((high as u64) << 32) | (low as u64)
    }

    /// Escreve um MSR.
    ///
    /// # Safety
    /// Valores inválidos geram #GP ou mudam o modo da CPU.
    #[inline]
    pub unsafe fn write_msr(msr: u32, value: u64) {
        asm!(
            "wrmsr",
            in("ecx") msr,
            in("eax") value as u32,
            in("edx") (value >> 32) as u32,
            options(nostack, preserves_flags),
        );
    }

    /// Endereço que causou o último page fault.
    #[inline]
    pub fn read_cr2() -> usize {
        let cr2: usize;
        unsafe { asm!("mov {}, cr2", out(reg) cr2, options(nomem, nostack, preserves_flags)) };
        cr2
    }

    /// Habilita EFER.NXE para que o bit NX das PTEs seja respeitado.
    ///
    /// # Safety
    /// Early boot, antes de instalar PTEs com NX.
    pub unsafe fn enable_nx() {
        const MSR_EFER: u32 = 0xC000_0080;
        const EFER_NXE: u64 = 1 << 11;
        let efer = Self::read_msr(MSR_EFER);
        Self::write_msr(MSR_EFER, efer | EFER_NXE);
    }
}

impl CpuOps for X64Cpu {
    /// Initial APIC ID (CPUID folha 1, EBX[31:24]).
    fn current_id() -> usize {
        // LLVM reserva RBX: preservar manualmente.
        let ebx: u32;
        unsafe {
            asm!(
                "push rbx",
                "cpuid",
                "mov {0:e}, ebx",
                "pop rbx",
                out(reg) ebx,
                inout("eax") 1u32 => _,
                out("ecx") _,
                out("edx") _,
                options(nomem, preserves_flags),
            );
        }
        (ebx >> 24) as usize
    }

    #[inline]
    fn halt() {
        unsafe { asm!("hlt", options(nomem, nostack, preserves_flags)) };
    }

    #[inline]
    fn relax() {
        unsafe { asm!("pause", options(nomem, nostack, preserves_flags)) };
    }

    #[inline]
    fn disable_interrupts() {
        unsafe { asm!("cli", options(nomem, nostack, preserves_flags)) };
    }

    #[inline]
    fn enable_interrupts() {
        unsafe { asm!("sti", options(nomem, nostack, preserves_flags)) };
    }

    #[inline]
    fn are_interrupts_enabled() -> bool {
        let rflags: u64;
        unsafe { asm!("pushfq; pop {}", out(reg) rflags, options(nomem, preserves_flags)) };
        (rflags & (1 << 9)) != 0
    }

    fn send_ipi(_target: usize, _kind: IpiKind) -> Result<(), Errno> {
        // Sem driver de Local APIC no núcleo: apenas o BSP roda.
        Err(Errno::ENOSYS)
    }
}

pub type Cpu = X64Cpu;
