//! RAM simulada.
//!
//! Uma arena alinhada a página faz o papel da memória física: o endereço físico 0 é o
//! início da arena, e o offset do direct map é o endereço da arena. Assim `hhdm`,
//! page tables e frames funcionam exatamente como em bare metal.

use crate::core::handoff::{MemoryMapEntry, MemoryType};
use crate::mm::config::{HOSTED_RAM_SIZE, PAGE_SIZE};

/// Mapa de memória equivalente ao que um bootloader entregaria.
pub fn memory_map() -> [MemoryMapEntry; 1] {
    [MemoryMapEntry {
        base: 0,
        len: HOSTED_RAM_SIZE as u64,
        typ: MemoryType::Usable,
    }]
}

/// Aloca a arena e devolve seu endereço (offset do direct map).
#[cfg(test)]
pub fn allocate_arena() -> usize {
    let layout = match std::alloc::Layout::from_size_align(HOSTED_RAM_SIZE, PAGE_SIZE) {
        Ok(layout) => layout,
        Err(_) => panic!("layout da arena inválido"),
    };
    // SAFETY: layout não vazio; a arena vive até o fim do processo.
    let base = unsafe { std::alloc::alloc_zeroed(layout) };
    if base.is_null() {
        panic!("sem memória para a RAM simulada");
    }
    base as usize
}
