//! Testes do subsistema de memória
//!
//! Os testes de PMM usam instâncias locais (`Pmm::new()`) com PFNs fictícios: as listas
//! nunca tocam o conteúdo dos frames. O resto usa o PMM global e address spaces
//! próprios de cada teste.

use crate::arch::trap::PageFaultInfo;
use crate::kcheck;
use crate::klib::test_framework::{run_test_suite, TestResult};
use crate::mm::aspace::{AddressSpace, PageSource};
use crate::mm::config::{PAGE_SIZE, USER_HEAP_BASE, USER_MMAP_BASE, USER_SPACE_END};
use crate::mm::mmap::{self, MmapFlags};
use crate::mm::pmm::{FrameKind, Pmm};
use crate::mm::shm::ShmBlock;
use crate::mm::usercopy::{copy_from_user, copy_to_user, read_user, write_user};
use crate::mm::{fault, hhdm, paging, pmm, MmResult, Pfn, VmFlags};
use alloc::sync::Arc;
use alloc::vec::Vec;

crate::kernel_test_suite! {
    pub MM_TESTS = [
        test_pmm_single_region_allocation,
        test_pmm_lists_disjoint,
        test_pmm_unref_across_nodes,
        test_pmm_allocated_nodes_merge,
        test_pmm_zero_pages,
        test_map_iterate_coalesces,
        test_live_mappings_hold_refs,
        test_anonymous_read_uses_zero_page,
        test_munmap_faults_every_page,
        test_munmap_splits_region,
        test_heap_growth,
        test_munmap_across_empty_heap,
        test_oversized_requests_fail,
        test_fork_cow_isolation,
        test_file_backed_fault,
        test_shared_block_visible_twice,
        test_vm_protect_drops_write,
        test_fault_outside_vmap,
        test_user_tables_only_small_leaves,
    ];
}

pub fn run_mm_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DE MEMÓRIA               ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("mm", MM_TESTS).1
}

const RW: VmFlags = VmFlags::READ.union(VmFlags::WRITE);

fn private() -> MmapFlags {
    MmapFlags::PRIVATE
}

fn write_fault(vaddr: usize) -> PageFaultInfo {
    PageFaultInfo { vaddr, present: false, write: true, user: true, exec: false, ip: 0 }
}

fn read_fault(vaddr: usize) -> PageFaultInfo {
    PageFaultInfo { vaddr, present: false, write: false, user: true, exec: false, ip: 0 }
}

fn test_pmm_single_region_allocation() -> TestResult {
    let pmm = Pmm::new();
    pmm.add_region(0x1000, 64, FrameKind::Free);
    let pfn = pmm.allocate(64);
    kcheck!(pfn == 0x1000, "região inteira devolvida");
    kcheck!(pmm.free_pages() == 0, "nada livre depois");
    pmm.unref_range(pfn, 64);
    kcheck!(pmm.free_pages() == 64, "região devolvida ao free list");
    let (free, allocated) = pmm.snapshot();
    kcheck!(free.len() == 1 && free[0].npages == 64, "faixa fundida de novo");
    kcheck!(allocated.is_empty(), "allocated list vazia");
    TestResult::Passed
}

fn test_pmm_lists_disjoint() -> TestResult {
    let pmm = Pmm::new();
    pmm.add_region(0x2000, 128, FrameKind::Free);
    pmm.add_region(0x3000, 16, FrameKind::Reserved);
    let a = pmm.allocate(10);
    let b = pmm.allocate(3);
    kcheck!(pmm.allocate_at(0x2000 + 100, 4).is_ok(), "allocate_at em faixa livre");
    kcheck!(pmm.allocate_at(0x3000, 1).is_err(), "allocate_at em faixa reservada");
    pmm.unref_range(a + 2, 2);

    let (free, allocated) = pmm.snapshot();
    for f in &free {
        for al in &allocated {
            kcheck!(!f.overlaps(al.start, al.npages), "free e allocated se sobrepõem", f.start as u64);
        }
    }
    kcheck!(pmm.refcount(b) == 1, "refcount inicial 1");
    kcheck!(pmm.refcount(a + 2) == 0, "frame liberado sem refcount");
    TestResult::Passed
}

fn test_pmm_unref_across_nodes() -> TestResult {
    let pmm = Pmm::new();
    pmm.add_region(0x4000, 32, FrameKind::Free);
    let a = pmm.allocate(8);
    let b = pmm.allocate(8);
    kcheck!(b == a + 8, "first-fit contíguo");

    // Uma faixa que cobre o fim de `a` e o começo de `b`.
    pmm.ref_range(a + 6, 4);
    kcheck!(pmm.refcount(a + 5) == 1, "prefixo intocado");
    kcheck!(pmm.refcount(a + 6) == 2 && pmm.refcount(b + 1) == 2, "interior com ref extra");
    kcheck!(pmm.refcount(b + 2) == 1, "sufixo intocado");

    pmm.unref_range(a, 16);
    kcheck!(pmm.refcount(a + 7) == 1 && pmm.refcount(b) == 1, "faixa do meio ainda viva");
    kcheck!(pmm.refcount(a) == 0, "prefixo liberado");
    pmm.unref_range(a + 6, 4);
    kcheck!(pmm.free_pages() == 32, "tudo livre no fim");
    TestResult::Passed
}

fn test_pmm_allocated_nodes_merge() -> TestResult {
    let pmm = Pmm::new();
    pmm.add_region(0x6000, 16, FrameKind::Free);
    let a = pmm.allocate(8);
    pmm.ref_range(a + 2, 2);
    pmm.ref_range(a + 5, 1);
    let (_, allocated) = pmm.snapshot();
    kcheck!(allocated.len() == 5, "recortes com refcounts diferentes", allocated.len());

    pmm.unref_range(a + 2, 2);
    pmm.unref_range(a + 5, 1);
    let (_, allocated) = pmm.snapshot();
    kcheck!(allocated.len() == 1 && allocated[0].npages == 8, "recortes fundidos de volta", allocated.len());
    kcheck!(pmm.refcount(a + 4) == 1, "refcount preservado");

    pmm.unref_range(a, 8);
    kcheck!(pmm.free_pages() == 16, "tudo livre");
    kcheck!(pmm.snapshot().1.is_empty(), "allocated list vazia");
    TestResult::Passed
}

fn test_pmm_zero_pages() -> TestResult {
    let pmm = Pmm::new();
    pmm.add_region(0x5000, 4, FrameKind::Free);
    kcheck!(pmm.allocate(0) == crate::mm::INVALID_PFN, "alocar zero páginas");
    kcheck!(pmm.try_allocate(5).is_none(), "sem faixa contígua suficiente");
    kcheck!(pmm.free_pages() == 4, "nada consumido");
    TestResult::Passed
}

fn test_map_iterate_coalesces() -> TestResult {
    let aspace = AddressSpace::new();
    let root = aspace.root();
    let base = 0x40_0000;
    let frames = pmm::allocate(4);
    paging::map_pages(root, base, frames, 4, RW | VmFlags::USER, paging::FrameRef::Counted);
    pmm::unref_range(frames, 4);

    let mut runs = Vec::new();
    paging::iterate(root, base, 6, |run| runs.push(run));
    kcheck!(runs.len() == 2, "uma sequência mapeada e uma ausente", runs.len() as u64);
    kcheck!(runs[0].npages == 4 && runs[0].pfn == Some(frames), "sequência mapeada");
    kcheck!(runs[1].npages == 2 && runs[1].pfn.is_none(), "sequência ausente");

    paging::unmap_pages(root, base, 4, paging::FrameRef::Counted);
    kcheck!(pmm::refcount(frames) == 0, "frames devolvidos no unmap");
    TestResult::Passed
}

fn test_live_mappings_hold_refs() -> TestResult {
    let aspace = AddressSpace::new();
    let Ok(p) = mmap::mmap_anonymous(&aspace, 0, 8, RW, private()) else {
        return TestResult::Failed;
    };
    for i in 0..8 {
        kcheck!(write_user(&aspace, p + i * PAGE_SIZE, &(i as u64)).is_ok(), "escrita");
    }
    let mut ok = true;
    paging::iterate(aspace.root(), p, 8, |run| {
        if let Some(pfn) = run.pfn {
            for k in 0..run.npages {
                ok &= pmm::refcount(pfn + k) >= 1;
            }
        }
    });
    kcheck!(ok, "mapeamento vivo sem referência");
    TestResult::Passed
}

fn test_anonymous_read_uses_zero_page() -> TestResult {
    let aspace = AddressSpace::new();
    let Ok(p) = mmap::mmap_anonymous(&aspace, 0, 2, RW, private()) else {
        return TestResult::Failed;
    };
    let value: MmResult<u64> = read_user(&aspace, p);
    kcheck!(value == Ok(0), "leitura anônima devolve zero");
    let mapped = paging::translate(aspace.root(), p);
    kcheck!(matches!(mapped, Some((pfn, _)) if pfn == fault::zero_page()), "página zero mapeada");
    kcheck!(matches!(mapped, Some((_, f)) if !f.contains(VmFlags::WRITE)), "página zero somente leitura");

    kcheck!(write_user(&aspace, p, &7u64).is_ok(), "escrita após leitura");
    let after = paging::translate(aspace.root(), p);
    kcheck!(matches!(after, Some((pfn, _)) if pfn != fault::zero_page()), "escrita ganhou frame próprio");
    kcheck!(read_user::<u64>(&aspace, p) == Ok(7), "valor escrito");
    TestResult::Passed
}

fn test_munmap_faults_every_page() -> TestResult {
    let aspace = AddressSpace::new();
    let Ok(p) = mmap::mmap_anonymous(&aspace, 0, 8, RW, private()) else {
        return TestResult::Failed;
    };
    kcheck!(write_user(&aspace, p, &42u64).is_ok(), "escrita inicial");
    for i in 0..8 {
        kcheck!(fault::handle_fault(&aspace, &write_fault(p + i * PAGE_SIZE)).is_ok(), "fault resolvido");
    }
    kcheck!(mmap::munmap(&aspace, p, 8).is_ok(), "munmap");
    for i in 0..8 {
        kcheck!(fault::handle_fault(&aspace, &read_fault(p + i * PAGE_SIZE)).is_err(), "página ainda acessível", i as u64);
    }
    kcheck!(read_user::<u64>(&aspace, p).is_err(), "leitura após munmap");
    kcheck!(aspace.claimed_pages() == 0, "page map liberado");
    TestResult::Passed
}

fn test_munmap_splits_region() -> TestResult {
    let aspace = AddressSpace::new();
    let Ok(p) = mmap::mmap_anonymous(&aspace, 0, 6, RW, private()) else {
        return TestResult::Failed;
    };
    for i in 0..6 {
        kcheck!(write_user(&aspace, p + i * PAGE_SIZE, &(i as u64 + 1)).is_ok(), "escrita");
    }
    kcheck!(mmap::munmap(&aspace, p + 2 * PAGE_SIZE, 2).is_ok(), "munmap do meio");
    kcheck!(aspace.lock().vmaps().len() == 2, "região dividida em duas");
    kcheck!(read_user::<u64>(&aspace, p + PAGE_SIZE) == Ok(2), "prefixo preservado");
    kcheck!(read_user::<u64>(&aspace, p + 4 * PAGE_SIZE) == Ok(5), "sufixo preservado");
    kcheck!(read_user::<u64>(&aspace, p + 2 * PAGE_SIZE).is_err(), "meio desmapeado");
    kcheck!(aspace.claimed_pages() == 4, "páginas reivindicadas");
    TestResult::Passed
}

fn test_heap_growth() -> TestResult {
    let aspace = AddressSpace::new();
    kcheck!(mmap::create_heap(&aspace, USER_HEAP_BASE).is_ok(), "heap criado");
    let Some((base, top)) = mmap::heap_bounds(&aspace) else {
        return TestResult::Failed;
    };
    kcheck!(base == top, "heap começa vazio");
    let Ok(new_top) = mmap::grow_heap(&aspace, 4) else {
        return TestResult::Failed;
    };
    kcheck!(new_top == top + 4 * PAGE_SIZE, "novo topo");
    kcheck!(write_user(&aspace, top + 3 * PAGE_SIZE, &0xABu8).is_ok(), "escrita no heap novo");
    kcheck!(write_user(&aspace, new_top, &0xABu8).is_err(), "escrita além do topo");
    kcheck!(mmap::set_heap_top(&aspace, top + PAGE_SIZE) == Ok(top + PAGE_SIZE), "heap encolhido");
    kcheck!(read_user::<u8>(&aspace, top + 3 * PAGE_SIZE).is_err(), "página encolhida sumiu");
    TestResult::Passed
}

fn test_munmap_across_empty_heap() -> TestResult {
    let aspace = AddressSpace::new();
    kcheck!(mmap::create_heap(&aspace, USER_HEAP_BASE).is_ok(), "heap criado");
    kcheck!(mmap::munmap(&aspace, USER_HEAP_BASE - PAGE_SIZE, 2).is_ok(), "munmap sobre a base do heap");
    kcheck!(
        mmap::heap_bounds(&aspace) == Some((USER_HEAP_BASE, USER_HEAP_BASE)),
        "heap vazio continua no lugar"
    );
    kcheck!(mmap::grow_heap(&aspace, 1) == Ok(USER_HEAP_BASE + PAGE_SIZE), "heap ainda cresce");
    TestResult::Passed
}

fn test_oversized_requests_fail() -> TestResult {
    let aspace = AddressSpace::new();
    kcheck!(mmap::create_heap(&aspace, USER_HEAP_BASE).is_ok(), "heap criado");
    kcheck!(mmap::grow_heap(&aspace, usize::MAX).is_err(), "crescimento absurdo do heap");
    kcheck!(mmap::grow_heap(&aspace, USER_SPACE_END / PAGE_SIZE).is_err(), "heap maior que o espaço de usuário");
    kcheck!(mmap::heap_bounds(&aspace) == Some((USER_HEAP_BASE, USER_HEAP_BASE)), "heap intacto");

    kcheck!(mmap::mmap_anonymous(&aspace, 0, usize::MAX / 2, RW, private()).is_err(), "mmap gigante");
    kcheck!(
        mmap::mmap_anonymous(&aspace, USER_HEAP_BASE, usize::MAX, RW, private() | MmapFlags::EXACT).is_err(),
        "mmap exato gigante"
    );
    kcheck!(mmap::munmap(&aspace, USER_HEAP_BASE, usize::MAX).is_err(), "munmap gigante");
    kcheck!(aspace.lock().vmaps().len() == 1, "só o heap continua");
    TestResult::Passed
}

fn test_fork_cow_isolation() -> TestResult {
    let parent = AddressSpace::new();
    let Ok(p) = mmap::mmap_anonymous(&parent, 0, 2, RW, private()) else {
        return TestResult::Failed;
    };
    kcheck!(write_user(&parent, p, &0xAAu8).is_ok(), "escrita do pai");
    let child = parent.fork();

    let (Some((pp, pf)), Some((cp, cf))) = (paging::translate(parent.root(), p), paging::translate(child.root(), p)) else {
        return TestResult::Failed;
    };
    kcheck!(pp == cp, "mesmo frame depois do fork");
    kcheck!(!pf.contains(VmFlags::WRITE) && !cf.contains(VmFlags::WRITE), "COW somente leitura");

    kcheck!(write_user(&child, p, &0xBBu8).is_ok(), "escrita do filho");
    kcheck!(read_user::<u8>(&parent, p) == Ok(0xAA), "pai vê 0xAA");
    kcheck!(read_user::<u8>(&child, p) == Ok(0xBB), "filho vê 0xBB");

    // O pai ficou sozinho com o frame original: a escrita não copia.
    kcheck!(write_user(&parent, p, &0xCCu8).is_ok(), "escrita do pai");
    kcheck!(paging::translate(parent.root(), p).map(|(f, _)| f) == Some(pp), "pai reaproveita o frame");
    kcheck!(read_user::<u8>(&child, p) == Ok(0xBB), "filho intocado");
    TestResult::Passed
}

struct PatternSource {
    pfn: Pfn,
}

impl PageSource for PatternSource {
    fn get_page(&self, pgoff: usize) -> MmResult<Pfn> {
        if pgoff == 0 {
            Ok(self.pfn)
        } else {
            Err(crate::mm::MmError::BackingFailed)
        }
    }
}

impl Drop for PatternSource {
    fn drop(&mut self) {
        pmm::unref_range(self.pfn, 1);
    }
}

fn test_file_backed_fault() -> TestResult {
    let pfn = pmm::allocate_zeroed();
    hhdm::write_frame(pfn, 0, b"mosaic");
    let source: Arc<dyn PageSource> = Arc::new(PatternSource { pfn });

    let aspace = AddressSpace::new();
    let Ok(p) = mmap::mmap_file(&aspace, 0, 2, RW, private(), source, 0, 6) else {
        return TestResult::Failed;
    };
    let mut buf = [0u8; 6];
    kcheck!(copy_from_user(&aspace, p, &mut buf).is_ok(), "leitura do arquivo");
    kcheck!(&buf == b"mosaic", "conteúdo do arquivo");

    kcheck!(copy_to_user(&aspace, p, b"M").is_ok(), "escrita privada");
    let mut original = [0u8; 1];
    hhdm::read_frame(pfn, 0, &mut original);
    kcheck!(original[0] == b'm', "página do arquivo intocada");
    kcheck!(read_user::<u8>(&aspace, p + PAGE_SIZE) == Ok(0), "além do arquivo lê zero");
    TestResult::Passed
}

fn test_shared_block_visible_twice() -> TestResult {
    let Ok(block) = ShmBlock::new(2 * PAGE_SIZE) else {
        return TestResult::Failed;
    };
    let a = AddressSpace::new();
    let b = AddressSpace::new();
    let (Ok(va), Ok(vb)) = (block.map_into(&a, 0), block.map_into(&b, 0)) else {
        return TestResult::Failed;
    };
    kcheck!(write_user(&a, va + PAGE_SIZE + 8, &0x1234u32).is_ok(), "escrita em A");
    kcheck!(read_user::<u32>(&b, vb + PAGE_SIZE + 8) == Ok(0x1234), "B enxerga a escrita");
    let mut raw = [0u8; 4];
    block.read(PAGE_SIZE + 8, &mut raw);
    kcheck!(u32::from_ne_bytes(raw) == 0x1234, "kernel enxerga a escrita");

    let child = a.fork();
    kcheck!(write_user(&child, va, &9u8).is_ok(), "escrita do filho");
    kcheck!(read_user::<u8>(&b, vb) == Ok(9), "compartilhado atravessa o fork");
    TestResult::Passed
}

fn test_vm_protect_drops_write() -> TestResult {
    let aspace = AddressSpace::new();
    let Ok(p) = mmap::mmap_anonymous(&aspace, 0, 4, RW, private()) else {
        return TestResult::Failed;
    };
    kcheck!(write_user(&aspace, p + PAGE_SIZE, &1u8).is_ok(), "escrita inicial");
    kcheck!(mmap::vm_protect(&aspace, p + PAGE_SIZE, 2, VmFlags::READ).is_ok(), "vm_protect");
    kcheck!(aspace.lock().vmaps().len() == 3, "região dividida em três");
    kcheck!(write_user(&aspace, p + PAGE_SIZE, &2u8).is_err(), "escrita negada");
    kcheck!(read_user::<u8>(&aspace, p + PAGE_SIZE) == Ok(1), "leitura mantida");
    kcheck!(write_user(&aspace, p, &3u8).is_ok(), "vizinha continua gravável");

    kcheck!(mmap::vm_protect(&aspace, p + PAGE_SIZE, 2, RW).is_ok(), "permissão devolvida");
    kcheck!(write_user(&aspace, p + PAGE_SIZE, &4u8).is_ok(), "escrita aplicada no fault");

    kcheck!(mmap::vm_protect(&aspace, p + PAGE_SIZE, 1, VmFlags::empty()).is_ok(), "vm_protect sem acesso");
    kcheck!(read_user::<u8>(&aspace, p + PAGE_SIZE).is_err(), "leitura negada sem acesso");
    kcheck!(write_user(&aspace, p + PAGE_SIZE, &5u8).is_err(), "escrita negada sem acesso");
    kcheck!(read_user::<u8>(&aspace, p + 2 * PAGE_SIZE).is_ok(), "página vizinha intacta");
    kcheck!(mmap::vm_protect(&aspace, p + PAGE_SIZE, 1, RW).is_ok(), "acesso devolvido");
    kcheck!(read_user::<u8>(&aspace, p + PAGE_SIZE) == Ok(4), "conteúdo preservado");
    kcheck!(write_user(&aspace, p + PAGE_SIZE, &6u8).is_ok(), "escrita volta depois do fault");
    kcheck!(mmap::vm_protect(&aspace, p, 8, RW).is_err(), "faixa parcialmente mapeada");
    TestResult::Passed
}

fn test_fault_outside_vmap() -> TestResult {
    let aspace = AddressSpace::new();
    kcheck!(fault::handle_fault(&aspace, &read_fault(0x10)).is_err(), "ponteiro nulo");
    kcheck!(fault::handle_fault(&aspace, &write_fault(0x7000_0000)).is_err(), "sem vmap");
    let Ok(p) = mmap::mmap_anonymous(&aspace, 0, 1, VmFlags::READ, private()) else {
        return TestResult::Failed;
    };
    kcheck!(fault::handle_fault(&aspace, &write_fault(p)).is_err(), "escrita em vmap somente leitura");
    let exec = PageFaultInfo { exec: true, ..read_fault(p) };
    kcheck!(fault::handle_fault(&aspace, &exec).is_err(), "execução em vmap sem EXEC");
    TestResult::Passed
}

fn test_user_tables_only_small_leaves() -> TestResult {
    let aspace = AddressSpace::new();
    // 4 MiB alinhados a 2 MiB, populados: candidatos naturais a página grande.
    let flags = private() | MmapFlags::POPULATE | MmapFlags::EXACT;
    let Ok(p) = mmap::mmap_anonymous(&aspace, USER_MMAP_BASE, 1024, RW, flags) else {
        return TestResult::Failed;
    };
    kcheck!(p == USER_MMAP_BASE, "mapeado no endereço pedido");
    kcheck!(write_user(&aspace, p + 1023 * PAGE_SIZE, &9u8).is_ok(), "última página acessível");
    kcheck!(paging::count_user_huge_leaves(aspace.root()) == 0, "só folhas de 4 KiB na metade de usuário");
    // O drop desmonta as tabelas com as páginas ainda mapeadas.
    drop(aspace);
    TestResult::Passed
}
