//! # Políticas de Mapeamento
//!
//! Cola entre PMM e VMAs: `mmap` anônimo e de arquivo, `munmap`, heap de usuário,
//! stacks e `vm_protect`. Tudo roda com o `pgd_lock` do address space tomado.
//!
//! Regiões privadas são preenchidas sob demanda pelo fault handler. Regiões anônimas
//! compartilhadas (e `POPULATE`) recebem frames na hora, para que pai e filho de um
//! fork enxerguem os mesmos frames.

use crate::mm::aspace::{AddressSpace, AspaceGuard, Backing, ForkMode, PageSource, Vmap, VmapContent};
use crate::mm::config::{PAGE_SIZE, USER_SPACE_END, USER_SPACE_START};
use crate::mm::paging::{self, FrameRef};
use crate::mm::stat::{self, Counter};
use crate::mm::{pmm, MmError, MmResult, VmFlags};
use alloc::sync::Arc;
use bitflags::bitflags;

bitflags! {
    /// Flags de `mmap` vindas de userspace.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MmapFlags: u32 {
        /// Copy-on-write no fork.
        const PRIVATE  = 1 << 0;
        /// Mesmos frames no pai e no filho.
        const SHARED   = 1 << 1;
        /// O hint é obrigatório.
        const EXACT    = 1 << 2;
        /// Aloca os frames já no mmap.
        const POPULATE = 1 << 3;
    }
}

impl MmapFlags {
    fn fork_mode(self) -> MmResult<ForkMode> {
        match (self.contains(Self::PRIVATE), self.contains(Self::SHARED)) {
            (true, false) => Ok(ForkMode::Private),
            (false, true) => Ok(ForkMode::Shared),
            _ => Err(MmError::InvalidParameter),
        }
    }
}

/// Política W^X: escrita e execução nunca juntas.
pub fn check_wx(flags: VmFlags) -> MmResult<()> {
    if cfg!(feature = "wx_enforcement") && flags.contains(VmFlags::WRITE | VmFlags::EXEC) {
        crate::kwarn!("(VMM) Mapeamento W+X recusado");
        return Err(MmError::WxViolation);
    }
    Ok(())
}

fn check_user_range(vaddr: usize, npages: usize) -> MmResult<()> {
    if vaddr % PAGE_SIZE != 0 {
        return Err(MmError::InvalidAlignment);
    }
    if npages == 0 {
        return Err(MmError::InvalidSize);
    }
    let end = npages
        .checked_mul(PAGE_SIZE)
        .and_then(|size| vaddr.checked_add(size))
        .ok_or(MmError::InvalidSize)?;
    if vaddr < USER_SPACE_START || end > USER_SPACE_END {
        return Err(MmError::InvalidAddress);
    }
    Ok(())
}

/// Aloca e mapeia frames zerados para a região inteira.
fn populate(guard: &AspaceGuard<'_>, vmap: &Vmap) {
    for i in 0..vmap.npages {
        let pfn = pmm::allocate_zeroed();
        paging::map_pages(guard.root(), vmap.vaddr + i * PAGE_SIZE, pfn, 1, vmap.flags, FrameRef::Counted);
        pmm::unref_range(pfn, 1);
    }
    stat::add(Counter::UserPages, vmap.npages);
}

/// Mapeia `npages` anônimas. Devolve o endereço escolhido.
pub fn mmap_anonymous(
    aspace: &AddressSpace,
    hint: usize,
    npages: usize,
    flags: VmFlags,
    mflags: MmapFlags,
) -> MmResult<usize> {
    let fork = mflags.fork_mode()?;
    check_wx(flags)?;

    let mut guard = aspace.lock();
    let vaddr = guard.get_free_vaddr(npages, hint, mflags.contains(MmapFlags::EXACT))?;
    let vmap = Vmap::new(vaddr, npages, flags, VmapContent::Mmap, fork, Backing::Anonymous);

    if fork == ForkMode::Shared || mflags.contains(MmapFlags::POPULATE) {
        populate(&guard, &vmap);
    }
    guard.attach(vmap);

    crate::kdebug!("(VMM) mmap anônimo em ", vaddr);
    Ok(vaddr)
}

/// Mapeia `npages` de um arquivo a partir de `offset`; `len` bytes vêm do arquivo e o
/// resto da região lê zeros.
#[allow(clippy::too_many_arguments)]
pub fn mmap_file(
    aspace: &AddressSpace,
    hint: usize,
    npages: usize,
    flags: VmFlags,
    mflags: MmapFlags,
    source: Arc<dyn PageSource>,
    offset: usize,
    len: usize,
) -> MmResult<usize> {
    let fork = mflags.fork_mode()?;
    check_wx(flags)?;
    if offset % PAGE_SIZE != 0 {
        return Err(MmError::InvalidAlignment);
    }

    let mut guard = aspace.lock();
    let vaddr = guard.get_free_vaddr(npages, hint, mflags.contains(MmapFlags::EXACT))?;
    let len = len.min(npages * PAGE_SIZE);
    let vmap = Vmap::new(vaddr, npages, flags, VmapContent::File, fork, Backing::File { source, offset, len });
    guard.attach(vmap);

    crate::kdebug!("(VMM) mmap de arquivo em ", vaddr);
    Ok(vaddr)
}

/// Cria uma região exatamente em `vaddr` (loader ELF, stacks, blocos compartilhados).
pub fn map_region(
    aspace: &AddressSpace,
    vaddr: usize,
    npages: usize,
    flags: VmFlags,
    content: VmapContent,
    fork: ForkMode,
    backing: Backing,
) -> MmResult<()> {
    check_user_range(vaddr, npages)?;
    check_wx(flags)?;
    let mut guard = aspace.lock();
    guard.get_free_vaddr(npages, vaddr, true)?;
    let vmap = Vmap::new(vaddr, npages, flags, content, fork, backing);
    if fork == ForkMode::Shared && matches!(vmap.backing, Backing::Anonymous) {
        populate(&guard, &vmap);
    }
    guard.attach(vmap);
    Ok(())
}

/// Desfaz os mapeamentos de `[vaddr, vaddr + npages)`, dividindo as regiões nas bordas.
///
/// Páginas sem região são ignoradas.
pub fn munmap(aspace: &AddressSpace, vaddr: usize, npages: usize) -> MmResult<()> {
    check_user_range(vaddr, npages)?;
    let end = vaddr + npages * PAGE_SIZE;

    let mut guard = aspace.lock();
    let mut removed = 0;
    while let Some(&index) = guard.overlapping(vaddr, npages).first() {
        let vmap = guard.get(index);
        let start_page = vmap.page_index(vmap.vaddr.max(vaddr));
        let end_page = vmap.page_index(vmap.end().min(end) - 1) + 1;
        let middle = guard.split_for_range(index, start_page, end_page);
        removed += guard.get(middle).npages;
        guard.destroy(middle);
    }

    if removed > 0 {
        crate::kdebug!("(VMM) munmap: páginas=", removed as u64);
    }
    Ok(())
}

/// Altera as permissões de `[vaddr, vaddr + npages)`.
///
/// A faixa toda precisa estar mapeada. Permissões retiradas valem já nas PTEs (sem
/// nenhuma, a página fica só para o kernel); as concedidas entram pelo fault handler no
/// próximo acesso.
pub fn vm_protect(aspace: &AddressSpace, vaddr: usize, npages: usize, flags: VmFlags) -> MmResult<()> {
    check_user_range(vaddr, npages)?;
    check_wx(flags)?;
    let end = vaddr + npages * PAGE_SIZE;
    let access = flags.access();

    let mut guard = aspace.lock();
    let covered: usize = guard
        .overlapping(vaddr, npages)
        .into_iter()
        .map(|i| {
            let v = guard.get(i);
            (v.end().min(end) - v.vaddr.max(vaddr)) / PAGE_SIZE
        })
        .sum();
    if covered != npages {
        return Err(MmError::NotMapped);
    }

    let mut cursor = vaddr;
    while cursor < end {
        let Some(index) = guard.find(cursor) else {
            return Err(MmError::NotMapped);
        };
        let vmap = guard.get(index);
        let start_page = vmap.page_index(cursor);
        let end_page = vmap.page_index(vmap.end().min(end) - 1) + 1;
        let middle = guard.split_for_range(index, start_page, end_page);

        let region = guard.get_mut(middle);
        region.flags = (region.flags - VmFlags::READ - VmFlags::WRITE - VmFlags::EXEC) | access;
        let (start, count) = (region.vaddr, region.npages);
        paging::update_flags(guard.root(), start, count, |f| restrict_pte(f, access));
        cursor = start + count * PAGE_SIZE;
    }
    Ok(())
}

/// Permissões de uma PTE presente depois de `vm_protect(access)`.
///
/// Sem nenhum acesso a página continua presente (o frame não se perde), mas só para o
/// kernel: o acesso do usuário vira fault e a VMA o nega. O fault handler devolve o
/// bit de usuário quando a VMA voltar a permitir.
fn restrict_pte(pte: VmFlags, access: VmFlags) -> VmFlags {
    let kept = pte - VmFlags::READ - VmFlags::WRITE - VmFlags::EXEC;
    if access.is_empty() {
        (kept - VmFlags::USER) | VmFlags::READ
    } else {
        kept | (pte.access() & access)
    }
}

/// Cria a região de heap (vazia) em `base`.
pub fn create_heap(aspace: &AddressSpace, base: usize) -> MmResult<()> {
    check_user_range(base, 1)?;
    let mut guard = aspace.lock();
    if guard.find_content(VmapContent::Heap).is_some() {
        return Err(MmError::AlreadyMapped);
    }
    let flags = VmFlags::READ | VmFlags::WRITE;
    guard.attach(Vmap::new(base, 0, flags, VmapContent::Heap, ForkMode::Private, Backing::Anonymous));
    Ok(())
}

/// `(base, top)` do heap de usuário.
pub fn heap_bounds(aspace: &AddressSpace) -> Option<(usize, usize)> {
    let guard = aspace.lock();
    let index = guard.find_content(VmapContent::Heap)?;
    let heap = guard.get(index);
    Some((heap.vaddr, heap.end()))
}

/// Cresce o heap em `npages` (zero-fill sob demanda). Devolve o novo topo.
pub fn grow_heap(aspace: &AddressSpace, npages: usize) -> MmResult<usize> {
    let mut guard = aspace.lock();
    let index = guard.find_content(VmapContent::Heap).ok_or(MmError::NotMapped)?;
    if npages > 0 {
        guard.extend(index, npages)?;
    }
    Ok(guard.get(index).end())
}

/// Ajusta o topo do heap (para cima ou para baixo). Devolve o novo topo.
pub fn set_heap_top(aspace: &AddressSpace, top: usize) -> MmResult<usize> {
    let top = crate::klib::align_up(top, PAGE_SIZE);
    let mut guard = aspace.lock();
    let index = guard.find_content(VmapContent::Heap).ok_or(MmError::NotMapped)?;
    let heap = guard.get(index);
    let (base, end) = (heap.vaddr, heap.end());
    if top < base {
        return Err(MmError::InvalidAddress);
    }
    if top > end {
        guard.extend(index, (top - end) / PAGE_SIZE)?;
    } else if top < end {
        let drop_pages = (end - top) / PAGE_SIZE;
        guard.shrink(index, drop_pages);
        paging::unmap_pages(guard.root(), top, drop_pages, FrameRef::Counted);
    }
    Ok(top)
}

/// Mapeia uma stack de `npages` que termina em `top`. Com `guard_pages`, a página
/// logo abaixo vira uma região sem permissões. Devolve a base da stack.
pub fn map_stack(aspace: &AddressSpace, top: usize, npages: usize) -> MmResult<usize> {
    let base = npages
        .checked_mul(PAGE_SIZE)
        .and_then(|size| top.checked_sub(size))
        .ok_or(MmError::InvalidSize)?;
    check_user_range(base, npages)?;
    let mut guard = aspace.lock();
    let guard_page = cfg!(feature = "guard_pages") && base - PAGE_SIZE >= USER_SPACE_START;
    let reserve_base = if guard_page { base - PAGE_SIZE } else { base };
    guard.get_free_vaddr((top - reserve_base) / PAGE_SIZE, reserve_base, true)?;

    if guard_page {
        guard.attach(Vmap::new(base - PAGE_SIZE, 1, VmFlags::empty(), VmapContent::Stack, ForkMode::Private, Backing::Anonymous));
    }
    let flags = VmFlags::READ | VmFlags::WRITE;
    guard.attach(Vmap::new(base, npages, flags, VmapContent::Stack, ForkMode::Private, Backing::Anonymous));
    Ok(base)
}

/// Remove a stack que termina em `top` (e a guard page, se houver).
pub fn unmap_stack(aspace: &AddressSpace, top: usize, npages: usize) -> MmResult<()> {
    let base = top - npages * PAGE_SIZE;
    let guard_page = cfg!(feature = "guard_pages") && base - PAGE_SIZE >= USER_SPACE_START;
    if guard_page {
        munmap(aspace, base - PAGE_SIZE, npages + 1)
    } else {
        munmap(aspace, base, npages)
    }
}
