//! # Page Fault Handler
//!
//! Ordem de resolução (endereço de usuário):
//!
//! 1. Sem VMA cobrindo o endereço: não resolvível.
//! 2. Acesso proibido pelas flags da VMA: não resolvível.
//! 3. Página ausente: zero-fill (anônima), página do inode (arquivo) ou página do bloco
//!    compartilhado.
//! 4. Escrita numa página presente somente leitura de VMA gravável: copy-on-write.
//! 5. Permissão que a VMA concede mas a PTE não tem (ganha via `vm_protect`): aplicada
//!    agora. Isso inclui o bit de usuário que um `vm_protect` sem acesso retirou.
//!
//! A presença é lida da própria page table, não do código de erro do hardware (no
//! RISC-V o `scause` não a informa).
//!
//! Um endereço abaixo de [`NULL_GUARD_LIMIT`] nunca é tratado antes da busca de VMA; ele
//! só aparece como dica no diagnóstico.

use crate::arch::trap::PageFaultInfo;
use crate::mm::aspace::{AddressSpace, Backing, ForkMode, Vmap};
use crate::mm::config::{NULL_GUARD_LIMIT, PAGE_SIZE, USER_SPACE_END};
use crate::mm::paging::{self, FrameRef};
use crate::mm::stat::{self, Counter};
use crate::arch::{Mmu, MmuOps};
use crate::mm::{hhdm, pmm, Pfn, VmFlags, INVALID_PFN};
use core::sync::atomic::{AtomicUsize, Ordering};

/// Motivo de um fault não resolvido.
pub type FaultError = &'static str;

static ZERO_PAGE: AtomicUsize = AtomicUsize::new(INVALID_PFN);

/// Página zero compartilhada: leituras de páginas anônimas nunca escritas.
///
/// Uma referência permanente a mantém viva.
pub fn init_zero_page() {
    if ZERO_PAGE.load(Ordering::Acquire) == INVALID_PFN {
        let pfn = pmm::allocate_zeroed();
        if ZERO_PAGE.compare_exchange(INVALID_PFN, pfn, Ordering::AcqRel, Ordering::Acquire).is_err() {
            pmm::unref_range(pfn, 1);
        }
    }
}

pub fn zero_page() -> Pfn {
    init_zero_page();
    ZERO_PAGE.load(Ordering::Acquire)
}

/// Tenta resolver um fault em `aspace`.
pub fn handle_fault(aspace: &AddressSpace, info: &PageFaultInfo) -> Result<(), FaultError> {
    if info.write && info.exec {
        return Err("escrita e execução ao mesmo tempo");
    }
    if info.vaddr >= USER_SPACE_END {
        return Err("endereço fora do espaço de usuário");
    }

    let page = info.vaddr & !(PAGE_SIZE - 1);
    let guard = aspace.lock();
    let root = guard.root();

    let Some(index) = guard.find(info.vaddr) else {
        return Err("page fault em área não mapeada");
    };
    let vmap = guard.get(index).clone();

    if info.exec && !vmap.flags.contains(VmFlags::EXEC) {
        return Err("page fault em vmap não executável");
    }
    if info.write && !vmap.flags.contains(VmFlags::WRITE) {
        return Err("page fault em vmap somente leitura");
    }
    if !info.write && !info.exec && !vmap.flags.contains(VmFlags::READ) {
        return Err("page fault em vmap sem leitura");
    }

    let result = match paging::translate(root, page) {
        None => fill_page(root, &vmap, page, info.write),
        Some((pfn, pte_flags)) => resolve_present(root, &vmap, page, pfn, pte_flags, info),
    };

    #[cfg(feature = "mm_trace")]
    if result.is_ok() {
        crate::ktrace!("(Fault) resolvido: ", page);
    }
    result
}

/// Página ausente: materializa a partir do backing.
fn fill_page(root: Pfn, vmap: &Vmap, page: usize, write: bool) -> Result<(), FaultError> {
    let index = vmap.page_index(page);

    match &vmap.backing {
        Backing::Anonymous => {
            if write || vmap.fork == ForkMode::Shared {
                let pfn = pmm::allocate_zeroed();
                paging::map_pages(root, page, pfn, 1, vmap.flags, FrameRef::Counted);
                pmm::unref_range(pfn, 1);
                stat::add(Counter::ZeroFills, 1);
                stat::add(Counter::UserPages, 1);
            } else {
                paging::map_pages(root, page, zero_page(), 1, vmap.flags - VmFlags::WRITE, FrameRef::Counted);
            }
            Ok(())
        }
        Backing::File { source, offset, len } => {
            if index * PAGE_SIZE >= *len {
                // Além do fim do arquivo: zeros privados.
                let pfn = pmm::allocate_zeroed();
                paging::map_pages(root, page, pfn, 1, vmap.flags, FrameRef::Counted);
                pmm::unref_range(pfn, 1);
                return Ok(());
            }
            let pgoff = offset / PAGE_SIZE + index;
            let backing = source.get_page(pgoff).map_err(|_| "backing não forneceu a página")?;

            match (vmap.fork, write) {
                (ForkMode::Private, true) => {
                    let copy = pmm::allocate(1);
                    hhdm::copy_frame(copy, backing);
                    zero_tail(copy, index, *len);
                    paging::map_pages(root, page, copy, 1, vmap.flags, FrameRef::Counted);
                    pmm::unref_range(copy, 1);
                    stat::add(Counter::CowCopies, 1);
                }
                (ForkMode::Private, false) if needs_tail_zeroing(index, *len) => {
                    let copy = pmm::allocate(1);
                    hhdm::copy_frame(copy, backing);
                    zero_tail(copy, index, *len);
                    paging::map_pages(root, page, copy, 1, vmap.flags - VmFlags::WRITE, FrameRef::Counted);
                    pmm::unref_range(copy, 1);
                }
                (ForkMode::Private, false) => {
                    paging::map_pages(root, page, backing, 1, vmap.flags - VmFlags::WRITE, FrameRef::Counted);
                }
                _ => {
                    if write {
                        source.mark_dirty(pgoff);
                    }
                    paging::map_pages(root, page, backing, 1, vmap.flags, FrameRef::Counted);
                }
            }
            Ok(())
        }
        Backing::Shared { block, first } => {
            let pfn = block.pfn_at(first + index).ok_or("página além do bloco compartilhado")?;
            paging::map_pages(root, page, pfn, 1, vmap.flags, FrameRef::Counted);
            Ok(())
        }
    }
}

fn needs_tail_zeroing(index: usize, len: usize) -> bool {
    let start = index * PAGE_SIZE;
    len > start && len - start < PAGE_SIZE
}

/// Zera a parte da página que fica além do fim do arquivo.
fn zero_tail(pfn: Pfn, index: usize, len: usize) {
    if needs_tail_zeroing(index, len) {
        let keep = len - index * PAGE_SIZE;
        // SAFETY: frame recém-alocado, ainda sem mapeamentos
        unsafe { hhdm::frame_bytes(pfn)[keep..].fill(0) };
    }
}

/// Página presente: COW ou permissão concedida tardiamente.
fn resolve_present(
    root: Pfn,
    vmap: &Vmap,
    page: usize,
    pfn: Pfn,
    pte_flags: VmFlags,
    info: &PageFaultInfo,
) -> Result<(), FaultError> {
    let mut pte_flags = pte_flags;
    if !pte_flags.contains(VmFlags::USER) {
        // Escondida por `vm_protect` sem acesso; a VMA já voltou a permitir.
        pte_flags |= VmFlags::USER;
        paging::flag_pages(root, page, 1, pte_flags);
    }

    if info.write && !pte_flags.contains(VmFlags::WRITE) {
        let shared = vmap.fork == ForkMode::Shared && !matches!(vmap.backing, Backing::Anonymous)
            || matches!(vmap.backing, Backing::Shared { .. });
        if shared || (pmm::refcount(pfn) == 1 && pfn != zero_page()) {
            // Único dono (o outro lado do fork já copiou ou saiu): basta liberar a escrita.
            paging::flag_pages(root, page, 1, vmap.flags);
        } else {
            let copy = pmm::allocate(1);
            hhdm::copy_frame(copy, pfn);
            paging::replace_mapping(root, page, copy, 1, vmap.flags);
            pmm::unref_range(copy, 1);
            stat::add(Counter::CowCopies, 1);
        }
        return Ok(());
    }

    if info.exec && !pte_flags.contains(VmFlags::EXEC) {
        paging::flag_pages(root, page, 1, pte_flags | VmFlags::EXEC);
        return Ok(());
    }

    if !info.write && !info.exec && !pte_flags.contains(VmFlags::READ) {
        paging::flag_pages(root, page, 1, pte_flags | VmFlags::READ);
        return Ok(());
    }

    // A PTE já permite o acesso: TLB desatualizada nesta CPU.
    crate::mm::paging::tlb::invalidate_local(page, 1);
    Ok(())
}

/// Fault vindo do hardware na thread corrente.
pub fn handle_current(info: &PageFaultInfo) -> Result<(), FaultError> {
    let Some(process) = crate::sched::current_process() else {
        return Err("page fault sem thread corrente");
    };
    let Some(aspace) = process.aspace() else {
        return Err("processo sem address space");
    };
    let result = handle_fault(&aspace, info);
    if let Err(reason) = result {
        report_unhandled(info, reason);
    }
    result
}

/// Diagnóstico de um fault não resolvido.
pub fn report_unhandled(info: &PageFaultInfo, reason: &str) {
    crate::kwarn!("(Fault) Page fault não tratado: ", str reason);
    crate::kwarn!("(Fault)   endereço=", info.vaddr);
    crate::kwarn!("(Fault)   IP=", info.ip);
    if info.write {
        crate::kwarn!("(Fault)   acesso de escrita");
    } else if info.exec {
        crate::kwarn!("(Fault)   acesso de execução");
    }
    if info.vaddr < NULL_GUARD_LIMIT {
        if info.write {
            crate::kwarn!("(Fault)   possível escrita em ponteiro NULL");
        } else if info.exec && info.vaddr == 0 {
            crate::kwarn!("(Fault)   tentativa de executar ponteiro NULL");
        } else {
            crate::kwarn!("(Fault)   possível deref de ponteiro NULL");
        }
    }
    if info.user && info.vaddr >= USER_SPACE_END {
        crate::kwarn!("(Fault)   deref de endereço do kernel");
    }
}

/// Fault do kernel: não há recuperação.
pub fn kernel_fault_panic(info: &PageFaultInfo) -> ! {
    crate::kerror!("(Fault) Page fault no kernel em ", info.vaddr);
    crate::kerror!("(Fault) IP=", info.ip);
    if info.vaddr < NULL_GUARD_LIMIT {
        crate::kerror!("(Fault) Provável deref de ponteiro NULL");
    }
    let root = Mmu::current_root();
    match paging::translate(root, info.vaddr) {
        Some((pfn, _)) => crate::kerror!("(Fault) Página presente: pfn=", pfn),
        None => crate::kerror!("(Fault) Página ausente na raiz ", root),
    }
    crate::sched::dump_current();
    panic!("page fault no kernel");
}
