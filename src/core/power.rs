//! Desligamento e reinício da máquina.

use crate::arch::{Cpu, CpuOps};

/// Magic exigido pela syscall `poweroff` ("GBye").
pub const POWEROFF_MAGIC: u32 = 0x4742_7965;

/// Desliga (ou reinicia) a máquina. Não retorna.
pub fn poweroff(reboot: bool) -> ! {
    if reboot {
        crate::kinfo!("(Power) Reiniciando...");
    } else {
        crate::kinfo!("(Power) Desligando...");
    }
    crate::drivers::console::flush();
    Cpu::disable_interrupts();
    platform_poweroff(reboot)
}

#[cfg(all(target_arch = "x86_64", target_os = "none"))]
fn platform_poweroff(reboot: bool) -> ! {
    use core::arch::asm;

    unsafe {
        if reboot {
            // Pulso de reset pelo controlador de teclado.
            asm!("out dx, al", in("dx") 0x64u16, in("al") 0xFEu8, options(nomem, nostack));
        } else {
            // QEMU (PIIX4 ACPI PM1a) e Bochs.
            asm!("out dx, ax", in("dx") 0x604u16, in("ax") 0x2000u16, options(nomem, nostack));
            asm!("out dx, ax", in("dx") 0xB004u16, in("ax") 0x2000u16, options(nomem, nostack));
        }
    }
    Cpu::hang()
}

#[cfg(all(target_arch = "riscv64", target_os = "none"))]
fn platform_poweroff(reboot: bool) -> ! {
    use core::arch::asm;

    const SBI_EXT_SRST: usize = 0x5352_5354;
    const SRST_SHUTDOWN: usize = 0;
    const SRST_COLD_REBOOT: usize = 1;

    let kind = if reboot { SRST_COLD_REBOOT } else { SRST_SHUTDOWN };
    unsafe {
        asm!(
            "ecall",
            inlateout("a0") kind => _,
            inlateout("a1") 0usize => _,
            in("a6") 0usize,
            in("a7") SBI_EXT_SRST,
            options(nostack),
        );
    }
    // SBI sem SRST: shutdown legado.
    crate::arch::platform::cpu::RiscvCpu::shutdown()
}

#[cfg(not(target_os = "none"))]
fn platform_poweroff(_reboot: bool) -> ! {
    Cpu::hang()
}
