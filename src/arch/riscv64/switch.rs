//! Troca de stack do scheduler no RISC-V.
//!
//! Salva `ra` e `s0..s11`; o resto é caller-saved ou já está no `TrapFrame`.

use super::regs::TrapFrame;
use core::arch::global_asm;

global_asm!(
    // mosaic_switch_stack(save_slot: *mut usize, next_sp: usize)
    ".global mosaic_switch_stack",
    "mosaic_switch_stack:",
    "    addi sp, sp, -112",
    "    sd ra, 0(sp)",
    "    sd s0, 8(sp)",
    "    sd s1, 16(sp)",
    "    sd s2, 24(sp)",
    "    sd s3, 32(sp)",
    "    sd s4, 40(sp)",
    "    sd s5, 48(sp)",
    "    sd s6, 56(sp)",
    "    sd s7, 64(sp)",
    "    sd s8, 72(sp)",
    "    sd s9, 80(sp)",
    "    sd s10, 88(sp)",
    "    sd s11, 96(sp)",
    "    sd sp, 0(a0)",
    "    mv sp, a1",
    "    ld ra, 0(sp)",
    "    ld s0, 8(sp)",
    "    ld s1, 16(sp)",
    "    ld s2, 24(sp)",
    "    ld s3, 32(sp)",
    "    ld s4, 40(sp)",
    "    ld s5, 48(sp)",
    "    ld s6, 56(sp)",
    "    ld s7, 64(sp)",
    "    ld s8, 72(sp)",
    "    ld s9, 80(sp)",
    "    ld s10, 88(sp)",
    "    ld s11, 96(sp)",
    "    addi sp, sp, 112",
    "    ret",
    // mosaic_enter_frame(save_slot: *mut usize, frame: *const TrapFrame)
    ".global mosaic_enter_frame",
    "mosaic_enter_frame:",
    "    addi sp, sp, -112",
    "    sd ra, 0(sp)",
    "    sd s0, 8(sp)",
    "    sd s1, 16(sp)",
    "    sd s2, 24(sp)",
    "    sd s3, 32(sp)",
    "    sd s4, 40(sp)",
    "    sd s5, 48(sp)",
    "    sd s6, 56(sp)",
    "    sd s7, 64(sp)",
    "    sd s8, 72(sp)",
    "    sd s9, 80(sp)",
    "    sd s10, 88(sp)",
    "    sd s11, 96(sp)",
    "    sd sp, 0(a0)",
    "    mv sp, a1",
    "    j mosaic_trap_return",
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

/// Salva o sp atual em `save_slot` e entra numa thread nova com `frame` copiado para o
/// topo de `kstack_top`, saindo por `sret`.
///
/// # Safety
/// `kstack_top` é o topo de uma stack de kernel exclusiva da thread.
pub unsafe fn enter_frame(save_slot: *mut usize, kstack_top: usize, frame: &TrapFrame) {
    let dst = (kstack_top - core::mem::size_of::<TrapFrame>()) as *mut TrapFrame;
    dst.write(*frame);
    mosaic_enter_frame(save_slot, dst);
}

/// O `sscratch` é recalculado por `mosaic_trap_return`; nada a fazer.
pub fn prepare_resume(_kstack_top: usize) {}
