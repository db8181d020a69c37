//! # Kernel Heap
//!
//! `Box`, `Vec` e `Arc` do kernel vêm de um `linked_list_allocator::LockedHeap` sobre uma
//! arena estática. A arena fica no `.bss` da imagem, então o heap existe antes do PMM
//! (cujas listas são `Vec`) e não consome frames do mapa de memória.
//!
//! Na plataforma hospedada o alocador global é o do hospedeiro e este módulo só guarda a
//! arena para quem quiser inspecioná-la.

use crate::mm::config::KERNEL_HEAP_SIZE;
use core::sync::atomic::{AtomicBool, Ordering};
use linked_list_allocator::LockedHeap;

#[repr(C, align(4096))]
struct Arena([u8; KERNEL_HEAP_SIZE]);

static mut ARENA: Arena = Arena([0; KERNEL_HEAP_SIZE]);

#[cfg_attr(target_os = "none", global_allocator)]
static ALLOCATOR: LockedHeap = LockedHeap::empty();

static READY: AtomicBool = AtomicBool::new(false);

/// Entrega a arena ao alocador. Chamado uma vez, logo depois do logging.
pub fn init() {
    if READY.swap(true, Ordering::AcqRel) {
        return;
    }
    // SAFETY: a arena só é tocada aqui, uma única vez (guardado por READY).
    unsafe {
        let start = core::ptr::addr_of_mut!(ARENA) as *mut u8;
        ALLOCATOR.lock().init(start, KERNEL_HEAP_SIZE);
    }
    crate::kinfo!("(Heap) Heap do kernel: bytes=", KERNEL_HEAP_SIZE as u64);
}

pub fn is_ready() -> bool {
    READY.load(Ordering::Acquire)
}

/// Bytes em uso no heap do kernel.
pub fn used() -> usize {
    ALLOCATOR.lock().used()
}

/// Bytes livres no heap do kernel.
pub fn free() -> usize {
    ALLOCATOR.lock().free()
}
