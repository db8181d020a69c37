//! # Page Tables
//!
//! Algoritmos de paginação escritos só sobre [`PteOps`]: o layout de bits de cada
//! arquitetura nunca aparece aqui.
//!
//! Hierarquia de 4 níveis (`Pml4 -> Pml3 -> Pml2 -> Pml1`). Tabelas intermediárias são
//! frames do PMM criados sob demanda e liberados quando ficam vazias (exceto as tabelas
//! `Pml3` da metade do kernel, compartilhadas por todas as raízes).
//!
//! ## Locks
//!
//! As funções recebem a raiz (`Pfn`) e assumem que o chamador segura o `pgd_lock` do
//! address space dono dela. A raiz do kernel tem seu próprio lock
//! ([`KERNEL_PGD_LOCK`]), usado por [`map_kernel_pages`] e [`unmap_kernel_pages`].
//!
//! ## Refcount
//!
//! Com [`FrameRef::Counted`] cada frame mapeado recebe uma referência no PMM e o unmap a
//! devolve. Quem alocou o frame para mapeá-lo solta a sua própria referência depois do
//! map (ver `mm::mmap`). Mapeamentos de firmware/MMIO usam [`FrameRef::Borrowed`].

pub mod tlb;

use crate::arch::{PageLevel, Pte, PteOps, PTE_ENTRIES};
use crate::mm::config::{KERNEL_PML4_START, PAGE_SIZE, USER_SPACE_END};
use crate::mm::{hhdm, pmm, MmError, MmResult, Pfn, VmFlags, INVALID_PFN};
use crate::sync::Spinlock;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicUsize, Ordering};
use volatile::VolatilePtr;

/// Política de referência dos frames de um mapeamento.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRef {
    /// Frames do PMM: map faz `ref`, unmap faz `unref`.
    Counted,
    /// Frames fora do controle de refcount (firmware, imagem do kernel, MMIO).
    Borrowed,
}

/// Uma sequência máxima de páginas com mesmo estado, flags e frames contíguos.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapRun {
    pub vaddr: usize,
    pub npages: usize,
    pub flags: VmFlags,
    /// Primeiro frame da sequência (`None` para páginas ausentes).
    pub pfn: Option<Pfn>,
}

// =============================================================================
// ACESSO ÀS ENTRADAS
// =============================================================================

fn entry_ptr(table: Pfn, index: usize) -> VolatilePtr<'static, u64> {
    debug_assert!(index < PTE_ENTRIES);
    let raw = hhdm::pfn_to_virt::<u64>(table).wrapping_add(index);
    // SAFETY: `table` é um frame de page table vivo acessível pelo direct map
    unsafe { VolatilePtr::new(NonNull::new_unchecked(raw)) }
}

#[inline]
pub fn read_entry(table: Pfn, index: usize) -> Pte {
    Pte::from_raw(entry_ptr(table, index).read())
}

#[inline]
fn write_entry(table: Pfn, index: usize, entry: Pte) {
    entry_ptr(table, index).write(entry.raw());
}

fn table_is_empty(table: Pfn) -> bool {
    (0..PTE_ENTRIES).all(|i| read_entry(table, i).raw() == 0)
}

fn is_user_address(vaddr: usize) -> bool {
    vaddr < USER_SPACE_END
}

/// Aloca uma tabela zerada.
fn new_table() -> Pfn {
    let pfn = pmm::allocate_zeroed();
    crate::mm::stat::add(crate::mm::stat::Counter::PageTables, 1);
    pfn
}

fn free_table(pfn: Pfn) {
    crate::mm::stat::sub(crate::mm::stat::Counter::PageTables, 1);
    pmm::unref_range(pfn, 1);
}

// =============================================================================
// WALK
// =============================================================================

#[derive(Clone, Copy, PartialEq, Eq)]
enum WalkMode {
    /// Só leitura; para em entradas ausentes ou huge.
    Lookup,
    /// Divide huge pages no caminho, mas não cria tabelas.
    Split,
    /// Divide e cria o que faltar.
    Create,
}

/// Caminho até uma tabela Pml1: `tables[level - 1]` é a tabela daquele nível.
#[derive(Clone, Copy)]
struct Path {
    tables: [Pfn; 4],
}

impl Path {
    fn table(&self, level: PageLevel) -> Pfn {
        self.tables[level as usize - 1]
    }
}

enum Walk {
    /// Chegou a uma tabela Pml1.
    Leaf(Path),
    /// Entrada ausente neste nível (cobre `level.pages_per_entry()` páginas).
    Absent(PageLevel),
    /// Folha grande neste nível (só em `WalkMode::Lookup`).
    Huge(PageLevel, Pte),
}

/// Converte a folha grande em uma tabela do nível de baixo com as mesmas permissões.
fn split_huge(table: Pfn, index: usize, level: PageLevel) -> Pfn {
    let entry = read_entry(table, index);
    let base = entry.huge_pfn(level);
    let flags = entry.flags(level);
    let Some(lower) = level.next() else {
        return INVALID_PFN;
    };
    let step = lower.pages_per_entry();

    let new = new_table();
    for i in 0..PTE_ENTRIES {
        let e = if lower == PageLevel::Pml1 {
            Pte::make_leaf(base + i, flags)
        } else {
            let mut e = Pte::empty();
            e.set_huge(lower, base + i * step, flags);
            e
        };
        write_entry(new, i, e);
    }
    write_entry(table, index, Pte::make_table(level, new));

    #[cfg(feature = "mm_trace")]
    crate::ktrace!("(VMM) Huge page dividida: pfn=", base);
    new
}

fn walk(root: Pfn, vaddr: usize, mode: WalkMode) -> Walk {
    let mut path = Path { tables: [INVALID_PFN; 4] };
    let mut table = root;
    let mut level = PageLevel::Pml4;

    loop {
        path.tables[level as usize - 1] = table;
        let Some(lower) = level.next() else {
            return Walk::Leaf(path);
        };

        let index = level.index(vaddr);
        let entry = read_entry(table, index);

        table = if !entry.present(level) {
            if mode != WalkMode::Create {
                return Walk::Absent(level);
            }
            let new = new_table();
            write_entry(table, index, Pte::make_table(level, new));
            new
        } else if entry.is_huge(level) {
            if mode == WalkMode::Lookup {
                return Walk::Huge(level, entry);
            }
            split_huge(table, index, level)
        } else {
            entry.pfn(level)
        };
        level = lower;
    }
}

/// Quantas páginas, a partir de `vaddr`, faltam para o fim da entrada de `level`.
fn pages_to_boundary(vaddr: usize, level: PageLevel) -> usize {
    let span = level.pages_per_entry();
    span - ((vaddr / PAGE_SIZE) % span)
}

/// Percorre `[vaddr, vaddr + npages)` em pedaços de uma tabela Pml1.
///
/// `f(path, first_index, count, chunk_vaddr)` é chamado para cada pedaço que existe;
/// trechos ausentes são pulados.
fn for_each_chunk(
    root: Pfn,
    vaddr: usize,
    npages: usize,
    mode: WalkMode,
    mut f: impl FnMut(&Path, usize, usize, usize),
) {
    let mut v = vaddr;
    let mut remaining = npages;
    while remaining > 0 {
        let step = match walk(root, v, mode) {
            Walk::Leaf(path) => {
                let idx = PageLevel::Pml1.index(v);
                let count = (PTE_ENTRIES - idx).min(remaining);
                f(&path, idx, count, v);
                count
            }
            Walk::Absent(level) | Walk::Huge(level, _) => pages_to_boundary(v, level).min(remaining),
        };
        remaining -= step;
        v = v.wrapping_add(step * PAGE_SIZE);
    }
}

/// Remove tabelas vazias do caminho, de baixo para cima.
fn prune(path: &Path, vaddr: usize) {
    let mut child_level = PageLevel::Pml1;
    while let Some(parent_level) = next_up(child_level) {
        let child = path.table(child_level);
        if !table_is_empty(child) {
            return;
        }
        // As Pml3 do kernel são compartilhadas entre todas as raízes.
        if parent_level == PageLevel::Pml4 && !is_user_address(vaddr) {
            return;
        }
        write_entry(path.table(parent_level), parent_level.index(vaddr), Pte::empty());
        free_table(child);
        child_level = parent_level;
    }
}

fn next_up(level: PageLevel) -> Option<PageLevel> {
    match level {
        PageLevel::Pml1 => Some(PageLevel::Pml2),
        PageLevel::Pml2 => Some(PageLevel::Pml3),
        PageLevel::Pml3 => Some(PageLevel::Pml4),
        PageLevel::Pml4 => None,
    }
}

fn is_global(vaddr: usize, flags: VmFlags) -> bool {
    flags.contains(VmFlags::GLOBAL) || !is_user_address(vaddr)
}

// =============================================================================
// OPERAÇÕES
// =============================================================================

/// Mapeia `npages` páginas a partir de `vaddr` nos frames `pfn..pfn + npages`.
///
/// Entradas já presentes são sobrescritas (o frame antigo não é liberado: use
/// [`replace_mapping`] para isso).
pub fn map_pages(root: Pfn, vaddr: usize, pfn: Pfn, npages: usize, flags: VmFlags, refs: FrameRef) {
    if npages == 0 {
        return;
    }
    debug_assert!(vaddr % PAGE_SIZE == 0, "map_pages: vaddr desalinhado");

    #[cfg(feature = "mm_trace")]
    {
        crate::ktrace!("(VMM) map vaddr=", vaddr);
        crate::ktrace!("(VMM)     pfn=", pfn);
    }

    if refs == FrameRef::Counted {
        pmm::ref_range(pfn, npages);
    }

    let mut next = pfn;
    for_each_chunk(root, vaddr, npages, WalkMode::Create, |path, idx, count, _| {
        let pml1 = path.table(PageLevel::Pml1);
        for i in 0..count {
            write_entry(pml1, idx + i, Pte::make_leaf(next + i, flags));
        }
        next += count;
    });

    tlb::invalidate(root, vaddr, npages, is_global(vaddr, flags));
}

/// Remove os mapeamentos de `[vaddr, vaddr + npages)` e libera tabelas que ficaram
/// vazias. Páginas ausentes são ignoradas.
pub fn unmap_pages(root: Pfn, vaddr: usize, npages: usize, refs: FrameRef) {
    if npages == 0 {
        return;
    }

    #[cfg(feature = "mm_trace")]
    crate::ktrace!("(VMM) unmap vaddr=", vaddr);

    let mut released: alloc::vec::Vec<(Pfn, usize)> = alloc::vec::Vec::new();
    let mut global = !is_user_address(vaddr);

    for_each_chunk(root, vaddr, npages, WalkMode::Split, |path, idx, count, chunk_vaddr| {
        let pml1 = path.table(PageLevel::Pml1);
        for i in 0..count {
            let entry = read_entry(pml1, idx + i);
            if !entry.present(PageLevel::Pml1) {
                continue;
            }
            global |= entry.flags(PageLevel::Pml1).contains(VmFlags::GLOBAL);
            let frame = entry.pfn(PageLevel::Pml1);
            match released.last_mut() {
                Some((start, n)) if *start + *n == frame => *n += 1,
                _ => released.push((frame, 1)),
            }
            write_entry(pml1, idx + i, Pte::empty());
        }
        prune(path, chunk_vaddr);
    });

    // A TLB precisa esquecer os frames antes que voltem ao PMM.
    tlb::invalidate(root, vaddr, npages, global);

    if refs == FrameRef::Counted {
        for (start, n) in released {
            pmm::unref_range(start, n);
        }
    }
}

/// Troca os frames de `[vaddr, vaddr + npages)` por `pfn..` com `flags`, soltando a
/// referência dos antigos. Usado na resolução de COW.
pub fn replace_mapping(root: Pfn, vaddr: usize, pfn: Pfn, npages: usize, flags: VmFlags) {
    if npages == 0 {
        return;
    }
    pmm::ref_range(pfn, npages);

    let mut old: alloc::vec::Vec<Pfn> = alloc::vec::Vec::new();
    let mut next = pfn;
    for_each_chunk(root, vaddr, npages, WalkMode::Create, |path, idx, count, _| {
        let pml1 = path.table(PageLevel::Pml1);
        for i in 0..count {
            let entry = read_entry(pml1, idx + i);
            if entry.present(PageLevel::Pml1) {
                let prev = entry.pfn(PageLevel::Pml1);
                if prev == next + i {
                    crate::kwarn!("(VMM) replace com o mesmo frame: pfn=", prev);
                } else {
                    old.push(prev);
                }
            }
            write_entry(pml1, idx + i, Pte::make_leaf(next + i, flags));
        }
        next += count;
    });

    tlb::invalidate(root, vaddr, npages, is_global(vaddr, flags));

    for prev in old {
        pmm::unref_range(prev, 1);
    }
}

/// Copia os mapeamentos presentes de `from[fvaddr..]` para `to[tvaddr..]`, dando uma
/// referência extra a cada frame. O chamador decide se rebaixa para somente leitura
/// (COW) depois.
pub fn copy_maps(from: Pfn, fvaddr: usize, to: Pfn, tvaddr: usize, npages: usize) {
    iterate(from, fvaddr, npages, |run| {
        if let Some(pfn) = run.pfn {
            let dst = tvaddr + (run.vaddr - fvaddr);
            map_pages(to, dst, pfn, run.npages, run.flags, FrameRef::Counted);
        }
    });
}

/// Aplica `update` às permissões de cada página presente, sem tocar nos frames.
pub fn update_flags(root: Pfn, vaddr: usize, npages: usize, update: impl Fn(VmFlags) -> VmFlags) {
    if npages == 0 {
        return;
    }
    let mut global = !is_user_address(vaddr);
    for_each_chunk(root, vaddr, npages, WalkMode::Split, |path, idx, count, _| {
        let pml1 = path.table(PageLevel::Pml1);
        for i in 0..count {
            let mut entry = read_entry(pml1, idx + i);
            if !entry.present(PageLevel::Pml1) {
                continue;
            }
            let old = entry.flags(PageLevel::Pml1);
            let new = update(old);
            // Sem nenhuma permissão a entrada deixaria de ser presente e perderia o frame.
            if new == old || new.access().is_empty() {
                continue;
            }
            global |= new.contains(VmFlags::GLOBAL);
            entry.set_flags(PageLevel::Pml1, new);
            write_entry(pml1, idx + i, entry);
        }
    });
    tlb::invalidate(root, vaddr, npages, global);
}

/// Define as permissões das páginas presentes da faixa.
pub fn flag_pages(root: Pfn, vaddr: usize, npages: usize, flags: VmFlags) {
    update_flags(root, vaddr, npages, |_| flags);
}

/// Frame e permissões da página que contém `vaddr`.
pub fn translate(root: Pfn, vaddr: usize) -> Option<(Pfn, VmFlags)> {
    match walk(root, vaddr, WalkMode::Lookup) {
        Walk::Leaf(path) => {
            let entry = read_entry(path.table(PageLevel::Pml1), PageLevel::Pml1.index(vaddr));
            if entry.present(PageLevel::Pml1) {
                Some((entry.pfn(PageLevel::Pml1), entry.flags(PageLevel::Pml1)))
            } else {
                None
            }
        }
        Walk::Huge(level, entry) => {
            let offset = (vaddr / PAGE_SIZE) % level.pages_per_entry();
            Some((entry.huge_pfn(level) + offset, entry.flags(level)))
        }
        Walk::Absent(_) => None,
    }
}

/// Endereço físico de `vaddr`.
pub fn virt_to_phys(root: Pfn, vaddr: usize) -> Option<usize> {
    translate(root, vaddr).map(|(pfn, _)| pfn * PAGE_SIZE + vaddr % PAGE_SIZE)
}

/// Chama `f` uma vez por sequência máxima de páginas com mesmo estado de presença,
/// mesmas flags e frames fisicamente contíguos.
pub fn iterate(root: Pfn, vaddr: usize, npages: usize, mut f: impl FnMut(MapRun)) {
    let mut run: Option<MapRun> = None;
    let mut emit = |page: MapRun, run: &mut Option<MapRun>| {
        if let Some(cur) = run.as_mut() {
            let contiguous = match (cur.pfn, page.pfn) {
                (Some(a), Some(b)) => a + cur.npages == b,
                (None, None) => true,
                _ => false,
            };
            if contiguous && cur.flags == page.flags && cur.vaddr + cur.npages * PAGE_SIZE == page.vaddr {
                cur.npages += page.npages;
                return;
            }
            f(*cur);
        }
        *run = Some(page);
    };

    let mut v = vaddr;
    let mut remaining = npages;
    while remaining > 0 {
        let step = match walk(root, v, WalkMode::Lookup) {
            Walk::Leaf(path) => {
                let pml1 = path.table(PageLevel::Pml1);
                let idx = PageLevel::Pml1.index(v);
                let count = (PTE_ENTRIES - idx).min(remaining);
                for i in 0..count {
                    let entry = read_entry(pml1, idx + i);
                    let page = if entry.present(PageLevel::Pml1) {
                        MapRun {
                            vaddr: v + i * PAGE_SIZE,
                            npages: 1,
                            flags: entry.flags(PageLevel::Pml1),
                            pfn: Some(entry.pfn(PageLevel::Pml1)),
                        }
                    } else {
                        MapRun { vaddr: v + i * PAGE_SIZE, npages: 1, flags: VmFlags::empty(), pfn: None }
                    };
                    emit(page, &mut run);
                }
                count
            }
            Walk::Huge(level, entry) => {
                let count = pages_to_boundary(v, level).min(remaining);
                let offset = (v / PAGE_SIZE) % level.pages_per_entry();
                emit(
                    MapRun { vaddr: v, npages: count, flags: entry.flags(level), pfn: Some(entry.huge_pfn(level) + offset) },
                    &mut run,
                );
                count
            }
            Walk::Absent(level) => {
                let count = pages_to_boundary(v, level).min(remaining);
                emit(MapRun { vaddr: v, npages: count, flags: VmFlags::empty(), pfn: None }, &mut run);
                count
            }
        };
        remaining -= step;
        v = v.wrapping_add(step * PAGE_SIZE);
    }

    if let Some(last) = run {
        f(last);
    }
}

// =============================================================================
// RAÍZES
// =============================================================================

static KERNEL_ROOT: AtomicUsize = AtomicUsize::new(INVALID_PFN);

/// Lock da raiz do kernel.
pub static KERNEL_PGD_LOCK: Spinlock<()> = Spinlock::new(());

pub fn kernel_root() -> Pfn {
    KERNEL_ROOT.load(Ordering::Acquire)
}

/// Prepara a raiz do kernel.
///
/// Em bare metal adota a raiz do bootloader (que já tem o direct map e a imagem do
/// kernel); na plataforma hospedada cria uma nova. Nos dois casos todas as entradas
/// da metade alta recebem uma tabela `Pml3`, para que as raízes de usuário possam
/// copiá-las uma única vez.
pub fn init(boot_root: Option<Pfn>) {
    let root = boot_root.unwrap_or_else(new_table);

    let _guard = KERNEL_PGD_LOCK.lock();
    let mut created = 0usize;
    for index in KERNEL_PML4_START..PTE_ENTRIES {
        if !read_entry(root, index).present(PageLevel::Pml4) {
            write_entry(root, index, Pte::make_table(PageLevel::Pml4, new_table()));
            created += 1;
        }
    }
    KERNEL_ROOT.store(root, Ordering::Release);

    crate::kinfo!("(VMM) Raiz do kernel: pfn=", root);
    crate::kdebug!("(VMM) Tabelas Pml3 do kernel criadas: ", created);
}

/// Mapeia páginas na metade do kernel (frames de firmware/MMIO ou do PMM).
pub fn map_kernel_pages(vaddr: usize, pfn: Pfn, npages: usize, flags: VmFlags, refs: FrameRef) -> MmResult<()> {
    if is_user_address(vaddr) {
        return Err(MmError::InvalidAddress);
    }
    let _guard = KERNEL_PGD_LOCK.lock();
    map_pages(kernel_root(), vaddr, pfn, npages, flags | VmFlags::GLOBAL, refs);
    Ok(())
}

pub fn unmap_kernel_pages(vaddr: usize, npages: usize, refs: FrameRef) -> MmResult<()> {
    if is_user_address(vaddr) {
        return Err(MmError::InvalidAddress);
    }
    let _guard = KERNEL_PGD_LOCK.lock();
    unmap_pages(kernel_root(), vaddr, npages, refs);
    Ok(())
}

/// Nova raiz de usuário: metade baixa vazia, metade alta compartilhada com o kernel.
pub fn create_user_root() -> Pfn {
    let root = new_table();
    let kernel = kernel_root();
    if kernel != INVALID_PFN {
        for index in KERNEL_PML4_START..PTE_ENTRIES {
            write_entry(root, index, read_entry(kernel, index));
        }
    }
    root
}

/// Libera a metade de usuário de `root` (tabelas e referências dos frames) e a raiz.
///
/// A raiz não pode estar ativa em nenhuma CPU.
pub fn destroy_user_root(root: Pfn) {
    for index in 0..KERNEL_PML4_START {
        let entry = read_entry(root, index);
        if entry.present(PageLevel::Pml4) {
            destroy_table(entry.pfn(PageLevel::Pml4), PageLevel::Pml3);
        }
    }
    free_table(root);
}

fn destroy_table(table: Pfn, level: PageLevel) {
    for index in 0..PTE_ENTRIES {
        let entry = read_entry(table, index);
        if !entry.present(level) {
            continue;
        }
        match level.next() {
            None => pmm::unref_range(entry.pfn(level), 1),
            Some(_) if entry.is_huge(level) => {
                // `map_pages` só instala folhas de 4 KiB; páginas grandes vêm do mapa
                // do kernel, que não pertence à metade de usuário.
                debug_assert!(false, "página grande numa tabela de usuário");
            }
            Some(lower) => destroy_table(entry.pfn(level), lower),
        }
    }
    free_table(table);
}

/// Ativa `root` nesta CPU.
pub fn switch_to(root: Pfn) {
    // SAFETY: toda raiz criada aqui carrega a metade do kernel
    unsafe { tlb::switch_root(root) };
}

/// Folhas grandes na metade de usuário de `root`.
#[cfg(any(test, feature = "self_test"))]
pub fn count_user_huge_leaves(root: Pfn) -> usize {
    fn count(table: Pfn, level: PageLevel) -> usize {
        let Some(lower) = level.next() else {
            return 0;
        };
        (0..PTE_ENTRIES)
            .map(|i| read_entry(table, i))
            .filter(|e| e.present(level))
            .map(|e| if e.is_huge(level) { 1 } else { count(e.pfn(level), lower) })
            .sum()
    }
    (0..KERNEL_PML4_START)
        .map(|i| read_entry(root, i))
        .filter(|e| e.present(PageLevel::Pml4))
        .map(|e| count(e.pfn(PageLevel::Pml4), PageLevel::Pml3))
        .sum()
}

#[cfg(any(test, feature = "self_test"))]
pub fn count_tables(root: Pfn) -> usize {
    fn count(table: Pfn, level: PageLevel) -> usize {
        let Some(lower) = level.next() else {
            return 1;
        };
        1 + (0..PTE_ENTRIES)
            .map(|i| read_entry(table, i))
            .filter(|e| e.present(level) && !e.is_huge(level))
            .map(|e| count(e.pfn(level), lower))
            .sum::<usize>()
    }
    // Só a metade de usuário pertence à raiz.
    1 + (0..KERNEL_PML4_START)
        .map(|i| read_entry(root, i))
        .filter(|e| e.present(PageLevel::Pml4))
        .map(|e| count(e.pfn(PageLevel::Pml4), PageLevel::Pml3))
        .sum::<usize>()
}
