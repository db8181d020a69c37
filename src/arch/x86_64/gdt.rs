//! Global Descriptor Table (GDT) e Task State Segment (TSS).
//!
//! Em long mode a segmentação é quase toda ignorada: os descritores de código e dados só
//! carregam o privilégio (DPL) e o bit L. O que importa de verdade é o TSS:
//! - `rsp0`: stack de kernel usada ao entrar de ring 3 (trocada a cada despacho);
//! - `ist[0]`: stack dedicada ao double fault, para sobreviver a um kernel stack overflow.
//!
//! O layout precisa bater com `regs::{KERNEL_CS, KERNEL_SS, USER_SS, USER_CS}`:
//!
//! | Índice | Descritor          |
//! |--------|--------------------|
//! | 0      | nulo               |
//! | 1      | código do kernel   |
//! | 2      | dados do kernel    |
//! | 3      | dados do usuário   |
//! | 4      | código do usuário  |
//! | 5..=6  | TSS (16 bytes)     |

use super::regs::{KERNEL_CS, KERNEL_SS};
use core::mem::size_of;

/// Seletor de segmento: `índice << 3 | RPL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct SegmentSelector(pub u16);

impl SegmentSelector {
    pub const fn new(index: u16, rpl: u8) -> Self {
        Self((index << 3) | (rpl as u16))
    }
}

pub const KERNEL_CODE_SEL: SegmentSelector = SegmentSelector::new(1, 0);
pub const KERNEL_DATA_SEL: SegmentSelector = SegmentSelector::new(2, 0);
pub const TSS_SEL: SegmentSelector = SegmentSelector::new(5, 0);

const _: () = assert!(KERNEL_CODE_SEL.0 as u64 == KERNEL_CS);
const _: () = assert!(KERNEL_DATA_SEL.0 as u64 == KERNEL_SS);

/// Índice (1-based, como a IDT espera) da stack IST do double fault.
pub const DOUBLE_FAULT_IST: u8 = 1;

const DOUBLE_FAULT_STACK_SIZE: usize = 16 * 1024;

// Bits do byte de acesso.
const ACC_PRESENT: u8 = 1 << 7;
const ACC_RING3: u8 = 3 << 5;
const ACC_SEGMENT: u8 = 1 << 4;
const ACC_EXEC: u8 = 1 << 3;
const ACC_RW: u8 = 1 << 1;
const ACC_TSS_AVAILABLE: u8 = 0x9;

// Nibble alto de flags (granularidade 4K, long mode, 32-bit default).
const FLAG_GRANULARITY: u8 = 1 << 7;
const FLAG_LONG: u8 = 1 << 5;
const FLAG_SIZE32: u8 = 1 << 6;

/// Descritor de 8 bytes, guardado já empacotado.
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
struct Descriptor(u64);

impl Descriptor {
    const NULL: Self = Self(0);

    /// Segmento flat (base 0, limite máximo).
    const fn flat(access: u8, flags: u8) -> Self {
        let limit_low = 0xFFFF_u64;
        let limit_high = 0xF_u64;
        Self(
            limit_low
                | ((access as u64) << 40)
                | (limit_high << 48)
                | (((flags & 0xF0) as u64) << 48),
        )
    }

    const fn kernel_code() -> Self {
        Self::flat(ACC_PRESENT | ACC_SEGMENT | ACC_EXEC | ACC_RW, FLAG_GRANULARITY | FLAG_LONG)
    }

    const fn kernel_data() -> Self {
        Self::flat(ACC_PRESENT | ACC_SEGMENT | ACC_RW, FLAG_GRANULARITY | FLAG_SIZE32)
    }

    const fn user_code() -> Self {
        Self::flat(
            ACC_PRESENT | ACC_RING3 | ACC_SEGMENT | ACC_EXEC | ACC_RW,
            FLAG_GRANULARITY | FLAG_LONG,
        )
    }

    const fn user_data() -> Self {
        Self::flat(ACC_PRESENT | ACC_RING3 | ACC_SEGMENT | ACC_RW, FLAG_GRANULARITY | FLAG_SIZE32)
    }

    /// Descritor de sistema do TSS: ocupa duas entradas (parte baixa, parte alta).
    fn tss(base: u64, limit: u32) -> [Self; 2] {
        let limit = limit as u64;
        let low = (limit & 0xFFFF)
            | ((base & 0xFF_FFFF) << 16)
            | (((ACC_PRESENT | ACC_TSS_AVAILABLE) as u64) << 40)
            | (((limit >> 16) & 0xF) << 48)
            | (((base >> 24) & 0xFF) << 56);
        [Self(low), Self(base >> 32)]
    }
}

/// Task State Segment (64-bit).
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct Tss {
    reserved0: u32,
    rsp: [u64; 3],
    reserved1: u64,
    ist: [u64; 7],
    reserved2: u64,
    reserved3: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        Self {
            reserved0: 0,
            rsp: [0; 3],
            reserved1: 0,
            ist: [0; 7],
            reserved2: 0,
            reserved3: 0,
            // Sem bitmap de I/O: qualquer `in`/`out` de ring 3 gera #GP.
            iomap_base: size_of::<Tss>() as u16,
        }
    }
}

const GDT_ENTRIES: usize = 7;

#[repr(C, align(16))]
struct Gdt([Descriptor; GDT_ENTRIES]);

static mut GDT: Gdt = Gdt([
    Descriptor::NULL,
    Descriptor::kernel_code(),
    Descriptor::kernel_data(),
    Descriptor::user_data(),
    Descriptor::user_code(),
    Descriptor::NULL,
    Descriptor::NULL,
]);

static mut TSS: Tss = Tss::new();

#[repr(C, align(16))]
struct IstStack([u8; DOUBLE_FAULT_STACK_SIZE]);

static mut DOUBLE_FAULT_STACK: IstStack = IstStack([0; DOUBLE_FAULT_STACK_SIZE]);

/// Operando de `lgdt`.
#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u64,
}

/// Preenche o TSS, carrega a GDT e recarrega CS/DS/ES/SS/TR.
///
/// # Safety
///
/// Uma única vez, no BSP, com interrupções desligadas.
pub unsafe fn init() {
    let tss = &mut *core::ptr::addr_of_mut!(TSS);
    let ist_top = core::ptr::addr_of!(DOUBLE_FAULT_STACK) as u64 + DOUBLE_FAULT_STACK_SIZE as u64;
    tss.ist[(DOUBLE_FAULT_IST - 1) as usize] = ist_top;

    let tss_base = core::ptr::addr_of!(TSS) as u64;
    let [low, high] = Descriptor::tss(tss_base, (size_of::<Tss>() - 1) as u32);
    let gdt = &mut *core::ptr::addr_of_mut!(GDT);
    gdt.0[TSS_SEL.0 as usize >> 3] = low;
    gdt.0[(TSS_SEL.0 as usize >> 3) + 1] = high;

    let pointer = GdtPointer {
        limit: (size_of::<Gdt>() - 1) as u16,
        base: core::ptr::addr_of!(GDT) as u64,
    };
    core::arch::asm!("lgdt [{}]", in(reg) &pointer, options(readonly, nostack, preserves_flags));

    // CS só muda com um far return.
    core::arch::asm!(
        "push {code:r}",
        "lea {tmp}, [rip + 2f]",
        "push {tmp}",
        "retfq",
        "2:",
        "mov ds, {data:e}",
        "mov es, {data:e}",
        "mov ss, {data:e}",
        "ltr {tss:x}",
        code = in(reg) KERNEL_CODE_SEL.0 as u64,
        tmp = out(reg) _,
        data = in(reg) KERNEL_DATA_SEL.0 as u32,
        tss = in(reg) TSS_SEL.0,
    );
}

/// Troca a stack usada na próxima entrada vinda de ring 3 (`TSS.rsp0`).
///
/// Usado pelo scheduler ao despachar uma thread de usuário.
pub fn set_kernel_stack(stack_top: usize) {
    // SAFETY: só a CPU corrente lê o TSS, e só ao trocar de privilégio.
    unsafe {
        let rsp0 = core::ptr::addr_of_mut!(TSS.rsp) as *mut u64;
        core::ptr::write_unaligned(rsp0, stack_top as u64);
    }
}
