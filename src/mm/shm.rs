//! Blocos de memória compartilhada.
//!
//! Um `ShmBlock` é uma faixa contígua de frames zerados que pode ser mapeada em vários
//! address spaces ao mesmo tempo (política de fork `Shared`). O kernel a enxerga pelo
//! direct map; é a base dos ring buffers dos canais de IPC.
//!
//! O bloco guarda uma referência PMM própria; cada mapeamento soma a sua.

use crate::mm::aspace::{AddressSpace, Backing, ForkMode, Vmap, VmapContent};
use crate::mm::config::PAGE_SIZE;
use crate::mm::paging::{self, FrameRef};
use crate::mm::{hhdm, pmm, MmError, MmResult, Pfn, VmFlags};
use alloc::sync::Arc;
use core::ptr::NonNull;

pub struct ShmBlock {
    pfn: Pfn,
    npages: usize,
}

impl ShmBlock {
    /// Aloca um bloco com pelo menos `size` bytes.
    pub fn new(size: usize) -> MmResult<Arc<Self>> {
        let npages = crate::klib::div_round_up(size, PAGE_SIZE);
        if npages == 0 {
            return Err(MmError::InvalidSize);
        }
        let pfn = pmm::try_allocate(npages).ok_or(MmError::OutOfMemory)?;
        for i in 0..npages {
            hhdm::zero_frame(pfn + i);
        }
        Ok(Arc::new(Self { pfn, npages }))
    }

    pub fn npages(&self) -> usize {
        self.npages
    }

    pub fn size(&self) -> usize {
        self.npages * PAGE_SIZE
    }

    /// Frame da página `index` do bloco.
    pub fn pfn_at(&self, index: usize) -> Option<Pfn> {
        (index < self.npages).then_some(self.pfn + index)
    }

    /// Ponteiro do kernel para `offset` bytes dentro do bloco.
    ///
    /// Os frames são contíguos, então o direct map cobre o bloco inteiro de uma vez.
    pub fn kernel_ptr<T>(&self, offset: usize) -> Option<NonNull<T>> {
        if offset + core::mem::size_of::<T>() > self.size() || offset % core::mem::align_of::<T>() != 0 {
            return None;
        }
        let base = hhdm::pfn_to_virt::<u8>(self.pfn);
        // SAFETY: offset dentro do bloco (verificado acima).
        NonNull::new(unsafe { base.add(offset) } as *mut T)
    }

    pub fn read(&self, offset: usize, buf: &mut [u8]) {
        let mut done = 0;
        while done < buf.len() {
            let at = offset + done;
            let chunk = (PAGE_SIZE - at % PAGE_SIZE).min(buf.len() - done);
            hhdm::read_frame(self.pfn + at / PAGE_SIZE, at % PAGE_SIZE, &mut buf[done..done + chunk]);
            done += chunk;
        }
    }

    pub fn write(&self, offset: usize, buf: &[u8]) {
        let mut done = 0;
        while done < buf.len() {
            let at = offset + done;
            let chunk = (PAGE_SIZE - at % PAGE_SIZE).min(buf.len() - done);
            hhdm::write_frame(self.pfn + at / PAGE_SIZE, at % PAGE_SIZE, &buf[done..done + chunk]);
            done += chunk;
        }
    }

    /// Mapeia o bloco inteiro em `aspace` (leitura e escrita). Devolve o endereço.
    pub fn map_into(self: &Arc<Self>, aspace: &AddressSpace, hint: usize) -> MmResult<usize> {
        let mut guard = aspace.lock();
        let vaddr = guard.get_free_vaddr(self.npages, hint, false)?;
        let flags = VmFlags::READ | VmFlags::WRITE;
        let vmap = Vmap::new(
            vaddr,
            self.npages,
            flags,
            VmapContent::Shared,
            ForkMode::Shared,
            Backing::Shared { block: self.clone(), first: 0 },
        );
        paging::map_pages(guard.root(), vaddr, self.pfn, self.npages, vmap.flags, FrameRef::Counted);
        guard.attach(vmap);
        Ok(vaddr)
    }
}

impl Drop for ShmBlock {
    fn drop(&mut self) {
        pmm::unref_range(self.pfn, self.npages);
    }
}
