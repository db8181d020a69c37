//! Primitivas de troca de stack do scheduler.
//!
//! Threads nunca trocam diretamente entre si: sempre passam pela stack do scheduler
//! da CPU. Só os registradores callee-saved são salvos na troca; o resto já está no
//! `TrapFrame` ou é caller-saved.

use super::regs::TrapFrame;
use core::arch::global_asm;

global_asm!(
    // mosaic_switch_stack(save_slot: *mut usize, next_sp: usize)
    ".global mosaic_switch_stack",
    "mosaic_switch_stack:",
    "    push rbp",
    "    push rbx",
    "    push r12",
    "    push r13",
    "    push r14",
    "    push r15",
    "    mov [rdi], rsp",
    "    mov rsp, rsi",
    "    pop r15",
    "    pop r14",
    "    pop r13",
    "    pop r12",
    "    pop rbx",
    "    pop rbp",
    "    ret",
    // mosaic_enter_frame(save_slot: *mut usize, frame: *const TrapFrame)
    ".global mosaic_enter_frame",
    "mosaic_enter_frame:",
    "    push rbp",
    "    push rbx",
    "    push r12",
    "    push r13",
    "    push r14",
    "    push r15",
    "    mov [rdi], rsp",
    "    mov rsp, rsi",
    "    jmp mosaic_trap_return",
);

extern "C" {
    fn mosaic_switch_stack(save_slot: *mut usize, next_sp: usize);
    fn mosaic_enter_frame(save_slot: *mut usize, frame: *const TrapFrame);
}

/// Salva o sp atual em `save_slot` e continua na stack salva em `next_sp`.
///
/// # Safety
/// `next_sp` deve ter sido produzido por uma troca anterior.
pub unsafe fn switch_stack(save_slot: *mut usize, next_sp: usize) {
    mosaic_switch_stack(save_slot, next_sp);
}

/// Salva o sp atual em `save_slot` e entra numa thread nova: copia `frame` para o topo
/// de `kstack_top` e sai por `iretq`.
///
/// # Safety
/// `kstack_top` é o topo de uma stack de kernel exclusiva da thread.
pub unsafe fn enter_frame(save_slot: *mut usize, kstack_top: usize, frame: &TrapFrame) {
    let dst = (kstack_top - core::mem::size_of::<TrapFrame>()) as *mut TrapFrame;
    dst.write(*frame);
    super::gdt::set_kernel_stack(kstack_top);
    mosaic_enter_frame(save_slot, dst);
}

/// Antes de retomar uma thread de usuário: traps do Ring 3 usam esta stack.
pub fn prepare_resume(kstack_top: usize) {
    super::gdt::set_kernel_stack(kstack_top);
}
