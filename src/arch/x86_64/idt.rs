//! Interrupt Descriptor Table (IDT).
//!
//! Tabela estática de 256 entradas apontando para os stubs de `trap.rs`. O vetor de
//! syscall (0x88) é o único gate com DPL 3; o double fault roda na stack IST do TSS.
use crate::arch::x86_64::gdt::KERNEL_CODE_SEL;
use core::mem::size_of;

/// Endereço de um stub assembly.
pub type HandlerFunc = u64;

/// Interrupt gate, presente, DPL 0.
const GATE_KERNEL: u8 = 0x8E;
/// Interrupt gate, presente, DPL 3 (alcançável com `int` do userspace).
const GATE_USER: u8 = 0xEE;

/// Entrada da IDT (16 bytes em 64-bit)
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct IdtEntry {
    offset_low: u16,
    selector: u16,
    ist_reserved_legacy: u8, // Bits 0-2: IST, 3-7: Reservado
    type_attr: u8,           // Gate Type, DPL, Present
    offset_mid: u16,
    offset_high: u32,
    reserved: u32,
}

impl IdtEntry {
    /// Cria uma entrada vazia (não presente)
    pub const fn missing() -> Self {
        Self {
            offset_low: 0,
            selector: 0,
            ist_reserved_legacy: 0,
            type_attr: 0,
            offset_mid: 0,
            offset_high: 0,
            reserved: 0,
        }
    }

    /// Cria uma entrada presente apontando para um handler
    ///
    /// `ist`: Index da Interrupt Stack Table (1-7) no TSS. 0 para não usar.
    pub fn new(handler: HandlerFunc, ist: u8, type_attr: u8) -> Self {
        let addr = handler;
        Self {
            offset_low: (addr & 0xFFFF) as u16,
            selector: KERNEL_CODE_SEL.0,
            ist_reserved_legacy: ist & 0x7, // Apenas 3 bits para IST
            type_attr,
            offset_mid: ((addr >> 16) & 0xFFFF) as u16,
            offset_high: (addr >> 32) as u32,
            reserved: 0,
        }
    }
}

/// A Tabela IDT propriamente dita
#[repr(C, align(16))]
pub struct Idt {
    entries: [IdtEntry; 256],
}

impl Idt {
    pub const fn new() -> Self {
        Self {
            entries: [IdtEntry::missing(); 256],
        }
    }

    /// Define um handler para o índice vector
    pub fn set_handler(&mut self, vector: u8, handler: HandlerFunc) {
        self.entries[vector as usize] = IdtEntry::new(handler, 0, GATE_KERNEL);
    }

    /// Define um handler invocável do Ring 3
    pub fn set_user_handler(&mut self, vector: u8, handler: HandlerFunc) {
        self.entries[vector as usize] = IdtEntry::new(handler, 0, GATE_USER);
    }

    /// Define um handler usando uma Stack IST específica
    pub fn set_handler_ist(&mut self, vector: u8, handler: HandlerFunc, ist_index: u8) {
        self.entries[vector as usize] = IdtEntry::new(handler, ist_index, GATE_KERNEL);
    }

    /// Carrega a IDT na CPU (lidt)
    ///
    /// # Safety
    ///
    /// `lidt` é unsafe. A tabela deve ter tempo de vida 'static ou ser válida enquanto usada.
    pub unsafe fn load(&'static self) {
        let descriptor = IdtDescriptor {
            limit: (size_of::<Self>() - 1) as u16,
            base: (self as *const Self) as u64,
        };
        core::arch::asm!("lidt [{}]", in(reg) &descriptor, options(readonly, nostack, preserves_flags));
    }
}

/// Descritor para LIDT
#[repr(C, packed)]
struct IdtDescriptor {
    limit: u16,
    base: u64,
}

// Global IDT (estática e mutável apenas na init)
static mut IDT: Idt = Idt::new();

/// Preenche a IDT com os stubs de trap e carrega.
///
/// # Safety
/// Single-core, early boot.
pub unsafe fn init() {
    use super::trap::{self, stubs};

    let idt = &mut *core::ptr::addr_of_mut!(IDT);
    for &(vector, stub) in stubs::KERNEL_VECTORS {
        idt.set_handler(vector, stub as usize as HandlerFunc);
    }
    idt.set_handler_ist(
        trap::DOUBLE_FAULT_VECTOR,
        stubs::trap_double_fault as usize as HandlerFunc,
        super::gdt::DOUBLE_FAULT_IST,
    );
    idt.set_user_handler(trap::SYSCALL_VECTOR, stubs::trap_syscall as usize as HandlerFunc);
    (*core::ptr::addr_of!(IDT)).load();
}
