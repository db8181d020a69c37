//! # Memory Management Subsystem (MM)
//!
//! O módulo `mm` orquestra a percepção que o kernel tem da memória física e virtual.
//!
//! ## 🏗️ Arquitetura dos Módulos
//!
//! | Módulo     | Responsabilidade |
//! |------------|------------------|
//! | `pmm`      | Dono de toda a RAM: FreeList + AllocatedList com refcount. |
//! | `paging`   | Page tables de 4 níveis sobre `PteOps`, TLB e shootdown. |
//! | `aspace`   | Address spaces de usuário: VMAs (`Vmap`) e `PageMap`. |
//! | `fault`    | Resolução de page faults (zero-fill, COW, páginas de arquivo). |
//! | `mmap`     | Políticas de alocação: mmap/munmap/heap/vm_protect. |
//! | `usercopy` | Acesso a memória de usuário resolvendo faults em software. |
//! | `shm`      | Blocos de memória compartilhada entre address spaces. |
//! | `heap`     | Heap do kernel (`linked_list_allocator`) em bare metal. |
//! | `hhdm`     | Direct map: todo acesso do kernel a frames passa por aqui. |
//!
//! ---------------------------------------------------------------------
//! MODELO DE MEMÓRIA DO KERNEL
//! ---------------------------------------------------------------------
//!
//! ```text
//! Heap (arena estática)  ──▶ Vec/Box para as listas do PMM
//!  │
//!  ▼
//! PMM  ──▶ fornece frames físicos (page tables, páginas de usuário, cache)
//!  │
//!  ▼
//! Paging ──▶ raiz do kernel (metade alta compartilhada por todas as raízes)
//!  │
//!  ▼
//! AddressSpace/Vmap ──▶ faults, mmap, fork
//! ```
//!
//! ❗ As listas do PMM usam `Vec`: o heap precisa existir antes do PMM.
//! ❗ A ordem de inicialização NÃO é opcional.
//!
//! ---------------------------------------------------------------------
//! LOCKS
//! ---------------------------------------------------------------------
//!
//! - `pgd_lock` (lista de VMAs + page tables) antes de `page_map_lock` do mesmo
//!   address space.
//! - Dois address spaces: ordem crescente de endereço (`aspace::lock_pair`).
//! - Os locks do PMM são folhas: nada é adquirido com eles tomados.

pub mod aspace;
pub mod config;
pub mod error;
pub mod fault;
pub mod flags;
pub mod heap;
pub mod hhdm;
pub mod mmap;
pub mod paging;
pub mod pmm;
pub mod shm;
pub mod stat;
pub mod usercopy;

#[cfg(any(test, feature = "self_test"))]
pub mod test;

pub use aspace::{AddressSpace, Backing, ForkMode, PageSource, Vmap, VmapContent};
pub use error::{MmError, MmResult};
pub use flags::VmFlags;

/// Número de frame físico.
pub type Pfn = usize;

/// Sentinela para "nenhum frame".
pub const INVALID_PFN: Pfn = usize::MAX;

/// Inicializa PMM e page tables a partir do handoff.
///
/// O heap já deve estar pronto (ver `core::entry`).
pub fn init(boot_info: &crate::core::handoff::BootInfo) {
    crate::kinfo!("(MM) Inicializando subsistema de memória...");

    pmm::init(boot_info.memory_map());

    // Frames ocupados pelo initrd não podem ser entregues a ninguém.
    if boot_info.initrd_size > 0 {
        let start = boot_info.initrd_addr as usize / config::PAGE_SIZE;
        let npages = crate::klib::div_round_up(boot_info.initrd_size as usize, config::PAGE_SIZE);
        if pmm::allocate_at(start, npages).is_err() {
            crate::kdebug!("(MM) initrd fora da RAM utilizável: pfn=", start);
        }
    }

    let boot_root = if boot_info.boot_page_table != 0 {
        Some(boot_info.boot_page_table as Pfn)
    } else {
        None
    };
    paging::init(boot_root);
    fault::init_zero_page();

    crate::kinfo!("(MM) Subsistema de memória inicializado com sucesso!");
}
