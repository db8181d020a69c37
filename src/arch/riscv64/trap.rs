//! Vetor de traps do RISC-V (modo direto em `stvec`).
//!
//! Convenção de `sscratch`: em modo usuário guarda o topo da stack de kernel da thread;
//! em modo supervisor vale 0. Assim a entrada sabe de onde veio e qual stack usar.
//! O `TrapFrame` fica sempre no topo da stack de kernel para traps vindas do usuário.

use super::regs::TrapFrame;
use crate::arch::trap::{self, PageFaultInfo, TrapKind};
use crate::sched::signal::Signal;
use core::arch::global_asm;

/// Tamanho do `TrapFrame` (36 palavras).
pub const FRAME_SIZE: usize = core::mem::size_of::<TrapFrame>();

global_asm!(
    ".align 4",
    ".global mosaic_trap_entry",
    "mosaic_trap_entry:",
    "    csrrw sp, sscratch, sp",
    "    bnez sp, 1f",
    // Veio do kernel: desfaz a troca.
    "    csrrw sp, sscratch, sp",
    "1:",
    "    addi sp, sp, -288",
    "    sd x1, 8(sp)",
    "    sd x3, 24(sp)",
    "    sd x4, 32(sp)",
    "    sd x5, 40(sp)",
    "    sd x6, 48(sp)",
    "    sd x7, 56(sp)",
    "    sd x8, 64(sp)",
    "    sd x9, 72(sp)",
    "    sd x10, 80(sp)",
    "    sd x11, 88(sp)",
    "    sd x12, 96(sp)",
    "    sd x13, 104(sp)",
    "    sd x14, 112(sp)",
    "    sd x15, 120(sp)",
    "    sd x16, 128(sp)",
    "    sd x17, 136(sp)",
    "    sd x18, 144(sp)",
    "    sd x19, 152(sp)",
    "    sd x20, 160(sp)",
    "    sd x21, 168(sp)",
    "    sd x22, 176(sp)",
    "    sd x23, 184(sp)",
    "    sd x24, 192(sp)",
    "    sd x25, 200(sp)",
    "    sd x26, 208(sp)",
    "    sd x27, 216(sp)",
    "    sd x28, 224(sp)",
    "    sd x29, 232(sp)",
    "    sd x30, 240(sp)",
    "    sd x31, 248(sp)",
    "    csrr t0, sscratch",
    "    bnez t0, 2f",
    "    addi t0, sp, 288",
    "2:",
    "    sd t0, 16(sp)",
    "    csrw sscratch, zero",
    "    csrr t1, sepc",
    "    sd t1, 256(sp)",
    "    csrr t2, sstatus",
    "    sd t2, 264(sp)",
    "    csrr t3, scause",
    "    sd t3, 272(sp)",
    "    csrr t4, stval",
    "    sd t4, 280(sp)",
    "    mv a0, sp",
    "    call mosaic_trap_dispatch",
    ".global mosaic_trap_return",
    "mosaic_trap_return:",
    "    ld t1, 256(sp)",
    "    csrw sepc, t1",
    "    ld t2, 264(sp)",
    "    csrw sstatus, t2",
    // Voltando ao usuário (SPP = 0): sscratch = topo da stack de kernel.
    "    andi t3, t2, 0x100",
    "    bnez t3, 3f",
    "    addi t4, sp, 288",
    "    csrw sscratch, t4",
    "3:",
    "    ld x1, 8(sp)",
    "    ld x3, 24(sp)",
    "    ld x4, 32(sp)",
    "    ld x5, 40(sp)",
    "    ld x6, 48(sp)",
    "    ld x7, 56(sp)",
    "    ld x8, 64(sp)",
    "    ld x9, 72(sp)",
    "    ld x10, 80(sp)",
    "    ld x11, 88(sp)",
    "    ld x12, 96(sp)",
    "    ld x13, 104(sp)",
    "    ld x14, 112(sp)",
    "    ld x15, 120(sp)",
    "    ld x16, 128(sp)",
    "    ld x17, 136(sp)",
    "    ld x18, 144(sp)",
    "    ld x19, 152(sp)",
    "    ld x20, 160(sp)",
    "    ld x21, 168(sp)",
    "    ld x22, 176(sp)",
    "    ld x23, 184(sp)",
    "    ld x24, 192(sp)",
    "    ld x25, 200(sp)",
    "    ld x26, 208(sp)",
    "    ld x27, 216(sp)",
    "    ld x28, 224(sp)",
    "    ld x29, 232(sp)",
    "    ld x30, 240(sp)",
    "    ld x31, 248(sp)",
    "    ld sp, 16(sp)",
    "    sret",
);

extern "C" {
    fn mosaic_trap_entry();
}

/// Endereço do vetor para `stvec`.
pub fn entry_address() -> usize {
    mosaic_trap_entry as usize
}

const INTERRUPT_BIT: u64 = 1 << 63;

const IRQ_SOFTWARE: u64 = 1;
const IRQ_TIMER: u64 = 5;

const EXC_INSN_MISALIGNED: u64 = 0;
const EXC_INSN_ACCESS: u64 = 1;
const EXC_ILLEGAL: u64 = 2;
const EXC_BREAKPOINT: u64 = 3;
const EXC_LOAD_MISALIGNED: u64 = 4;
const EXC_LOAD_ACCESS: u64 = 5;
const EXC_STORE_MISALIGNED: u64 = 6;
const EXC_STORE_ACCESS: u64 = 7;
const EXC_ECALL_U: u64 = 8;
const EXC_INSN_PAGE_FAULT: u64 = 12;
const EXC_LOAD_PAGE_FAULT: u64 = 13;
const EXC_STORE_PAGE_FAULT: u64 = 15;

fn decode(frame: &TrapFrame) -> TrapKind {
    use crate::arch::traits::UserContext;

    let cause = frame.scause;
    if cause & INTERRUPT_BIT != 0 {
        return match cause & !INTERRUPT_BIT {
            IRQ_TIMER => TrapKind::Timer,
            IRQ_SOFTWARE => TrapKind::Ipi(super::cpu::take_ipi()),
            _ => TrapKind::Fatal("interrupção externa sem driver"),
        };
    }

    match cause {
        EXC_ECALL_U => TrapKind::Syscall,
        EXC_INSN_PAGE_FAULT | EXC_LOAD_PAGE_FAULT | EXC_STORE_PAGE_FAULT => {
            TrapKind::PageFault(PageFaultInfo {
                vaddr: frame.stval as usize,
                // O RISC-V não informa; o handler consulta a PTE.
                present: false,
                write: cause == EXC_STORE_PAGE_FAULT,
                user: frame.from_user(),
                exec: cause == EXC_INSN_PAGE_FAULT,
                ip: frame.sepc as usize,
            })
        }
        EXC_ILLEGAL => TrapKind::Exception { name: "instrução ilegal", signal: Signal::SIGILL },
        EXC_BREAKPOINT => TrapKind::Exception { name: "breakpoint", signal: Signal::SIGTRAP },
        EXC_INSN_MISALIGNED | EXC_LOAD_MISALIGNED | EXC_STORE_MISALIGNED => {
            TrapKind::Exception { name: "acesso desalinhado", signal: Signal::SIGBUS }
        }
        EXC_INSN_ACCESS | EXC_LOAD_ACCESS | EXC_STORE_ACCESS => {
            TrapKind::Exception { name: "access fault", signal: Signal::SIGSEGV }
        }
        _ => TrapKind::Fatal("exceção inesperada"),
    }
}

#[no_mangle]
extern "C" fn mosaic_trap_dispatch(frame: &mut TrapFrame) {
    let kind = decode(frame);
    if let TrapKind::Syscall = kind {
        // Retorna depois do `ecall`.
        frame.sepc += 4;
    }
    trap::handle(kind, frame);
}
