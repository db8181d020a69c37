//! Stubs de trap (exceções, IRQs, IPIs e a syscall `int 0x88`).
//!
//! Cada stub empilha um código de erro (falso quando a CPU não empilha) e o número do
//! vetor, e salta para `mosaic_trap_common`, que completa o `TrapFrame` e chama
//! `mosaic_trap_dispatch`. O retorno passa sempre por `mosaic_trap_return` (`iretq`).

use super::cpu::X64Cpu;
use super::regs::TrapFrame;
use crate::arch::trap::{self, PageFaultInfo, TrapKind};
use crate::arch::IpiKind;
use core::arch::global_asm;

/// Vetor da syscall (`int 0x88`).
pub const DOUBLE_FAULT_VECTOR: u8 = 8;
pub const SYSCALL_VECTOR: u8 = 0x88;
pub const TIMER_VECTOR: u8 = 32;
pub const IPI_TLB_VECTOR: u8 = 0xF0;
pub const IPI_HALT_VECTOR: u8 = 0xF1;

macro_rules! trap_stub {
    ($name:literal, $vector:literal) => {
        concat!(
            ".global ", $name, "\n", $name, ":\n",
            "    push 0\n",
            "    push ", $vector, "\n",
            "    jmp mosaic_trap_common\n"
        )
    };
    ($name:literal, $vector:literal, error) => {
        concat!(
            ".global ", $name, "\n", $name, ":\n",
            "    push ", $vector, "\n",
            "    jmp mosaic_trap_common\n"
        )
    };
}

global_asm!(
    trap_stub!("trap_divide", "0"),
    trap_stub!("trap_debug", "1"),
    trap_stub!("trap_breakpoint", "3"),
    trap_stub!("trap_invalid_opcode", "6"),
    trap_stub!("trap_device_na", "7"),
    trap_stub!("trap_double_fault", "8", error),
    trap_stub!("trap_gpf", "13", error),
    trap_stub!("trap_page_fault", "14", error),
    trap_stub!("trap_x87", "16"),
    trap_stub!("trap_simd", "19"),
    trap_stub!("trap_timer", "32"),
    trap_stub!("trap_syscall", "0x88"),
    trap_stub!("trap_ipi_tlb", "0xF0"),
    trap_stub!("trap_ipi_halt", "0xF1"),
    ".global mosaic_trap_common",
    "mosaic_trap_common:",
    "    push rax",
    "    push rbx",
    "    push rcx",
    "    push rdx",
    "    push rbp",
    "    push rdi",
    "    push rsi",
    "    push r8",
    "    push r9",
    "    push r10",
    "    push r11",
    "    push r12",
    "    push r13",
    "    push r14",
    "    push r15",
    "    mov rdi, rsp",
    "    cld",
    "    call mosaic_trap_dispatch",
    ".global mosaic_trap_return",
    "mosaic_trap_return:",
    "    pop r15",
    "    pop r14",
    "    pop r13",
    "    pop r12",
    "    pop r11",
    "    pop r10",
    "    pop r9",
    "    pop r8",
    "    pop rsi",
    "    pop rdi",
    "    pop rbp",
    "    pop rdx",
    "    pop rcx",
    "    pop rbx",
    "    pop rax",
    "    add rsp, 16",
    "    iretq",
);

pub mod stubs {
    extern "C" {
        pub fn trap_divide();
        pub fn trap_debug();
        pub fn trap_breakpoint();
        pub fn trap_invalid_opcode();
        pub fn trap_device_na();
        pub fn trap_double_fault();
        pub fn trap_gpf();
        pub fn trap_page_fault();
        pub fn trap_x87();
        pub fn trap_simd();
        pub fn trap_timer();
        pub fn trap_syscall();
        pub fn trap_ipi_tlb();
        pub fn trap_ipi_halt();
    }

    /// Vetores com gate de kernel (DPL 0).
    pub static KERNEL_VECTORS: &[(u8, unsafe extern "C" fn())] = &[
        (0, trap_divide),
        (1, trap_debug),
        (3, trap_breakpoint),
        (6, trap_invalid_opcode),
        (7, trap_device_na),
        (13, trap_gpf),
        (14, trap_page_fault),
        (16, trap_x87),
        (19, trap_simd),
        (super::TIMER_VECTOR, trap_timer),
        (super::IPI_TLB_VECTOR, trap_ipi_tlb),
        (super::IPI_HALT_VECTOR, trap_ipi_halt),
    ];
}

/// Bits do código de erro do #PF.
const PF_PRESENT: u64 = 1 << 0;
const PF_WRITE: u64 = 1 << 1;
const PF_USER: u64 = 1 << 2;
const PF_INSN: u64 = 1 << 4;

fn decode(frame: &TrapFrame) -> TrapKind {
    use crate::sched::signal::Signal;

    match frame.vector {
        14 => TrapKind::PageFault(PageFaultInfo {
            vaddr: X64Cpu::read_cr2(),
            present: frame.error_code & PF_PRESENT != 0,
            write: frame.error_code & PF_WRITE != 0,
            user: frame.error_code & PF_USER != 0,
            exec: frame.error_code & PF_INSN != 0,
            ip: frame.rip as usize,
        }),
        0x88 => TrapKind::Syscall,
        32 => TrapKind::Timer,
        0xF0 => TrapKind::Ipi(IpiKind::TlbShootdown),
        0xF1 => TrapKind::Ipi(IpiKind::Halt),
        0 => TrapKind::Exception { name: "divide error", signal: Signal::SIGFPE },
        16 | 19 => TrapKind::Exception { name: "floating point", signal: Signal::SIGFPE },
        1 | 3 => TrapKind::Exception { name: "breakpoint", signal: Signal::SIGTRAP },
        6 => TrapKind::Exception { name: "invalid opcode", signal: Signal::SIGILL },
        8 => TrapKind::Fatal("double fault"),
        13 => TrapKind::Exception { name: "general protection", signal: Signal::SIGSEGV },
        _ => TrapKind::Fatal("vetor inesperado"),
    }
}

#[no_mangle]
extern "C" fn mosaic_trap_dispatch(frame: &mut TrapFrame) {
    let kind = decode(frame);
    trap::handle(kind, frame);
}
