//! # Higher Half Direct Map (HHDM)
//!
//! Toda a RAM física é acessível em `offset + phys`. O offset vem do bootloader
//! (`BootInfo::hhdm_offset`) ou, na plataforma hospedada, do endereço da arena que
//! simula a RAM.
//!
//! Todo acesso do kernel a frames (page tables, cópias de COW, zero-fill, page cache)
//! passa por aqui.

use super::config::PAGE_SIZE;
use super::Pfn;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

static HHDM_INITIALIZED: AtomicBool = AtomicBool::new(false);
static HHDM_OFFSET: AtomicUsize = AtomicUsize::new(0);
static HHDM_MAPPED_SIZE: AtomicUsize = AtomicUsize::new(0);

/// Inicializa o HHDM com informações do bootloader
///
/// # Safety
///
/// `[offset, offset + size)` deve mapear a RAM física a partir do endereço 0.
pub unsafe fn init(offset: usize, size: usize) {
    HHDM_OFFSET.store(offset, Ordering::Release);
    HHDM_MAPPED_SIZE.store(size, Ordering::Release);
    HHDM_INITIALIZED.store(true, Ordering::Release);
}

#[inline]
pub fn is_initialized() -> bool {
    HHDM_INITIALIZED.load(Ordering::Acquire)
}

#[inline]
pub fn offset() -> usize {
    HHDM_OFFSET.load(Ordering::Relaxed)
}

#[inline]
pub fn mapped_size() -> usize {
    HHDM_MAPPED_SIZE.load(Ordering::Relaxed)
}

/// Converte endereço físico para virtual (HHDM)
#[inline(always)]
pub fn phys_to_virt<T>(phys: usize) -> *mut T {
    (offset() + phys) as *mut T
}

/// Endereço virtual do início do frame `pfn`.
#[inline(always)]
pub fn pfn_to_virt<T>(pfn: Pfn) -> *mut T {
    phys_to_virt(pfn * PAGE_SIZE)
}

/// Converte endereço virtual (HHDM) para físico
#[inline(always)]
pub fn virt_to_phys(virt: usize) -> usize {
    debug_assert!(virt >= offset(), "virt_to_phys: endereço abaixo do HHDM");
    virt - offset()
}

/// Visão de bytes de um frame.
///
/// # Safety
/// O frame deve pertencer ao chamador (alocado e sem aliasing mutável concorrente).
#[inline]
pub unsafe fn frame_bytes<'a>(pfn: Pfn) -> &'a mut [u8] {
    core::slice::from_raw_parts_mut(pfn_to_virt::<u8>(pfn), PAGE_SIZE)
}

/// Zera um frame físico.
pub fn zero_frame(pfn: Pfn) {
    // SAFETY: o chamador acabou de alocar o frame
    unsafe { core::ptr::write_bytes(pfn_to_virt::<u8>(pfn), 0, PAGE_SIZE) };
}

/// Copia o conteúdo de `src` para `dst` (frames inteiros).
pub fn copy_frame(dst: Pfn, src: Pfn) {
    // SAFETY: frames distintos, ambos vivos enquanto o chamador segura o pgd_lock
    unsafe {
        core::ptr::copy_nonoverlapping(pfn_to_virt::<u8>(src), pfn_to_virt::<u8>(dst), PAGE_SIZE)
    };
}

/// Lê `buf.len()` bytes do frame a partir de `offset`.
pub fn read_frame(pfn: Pfn, offset: usize, buf: &mut [u8]) {
    debug_assert!(offset + buf.len() <= PAGE_SIZE);
    // SAFETY: faixa dentro do frame
    unsafe {
        core::ptr::copy_nonoverlapping(
            pfn_to_virt::<u8>(pfn).add(offset),
            buf.as_mut_ptr(),
            buf.len(),
        )
    };
}

/// Escreve `buf` no frame a partir de `offset`.
pub fn write_frame(pfn: Pfn, offset: usize, buf: &[u8]) {
    debug_assert!(offset + buf.len() <= PAGE_SIZE);
    // SAFETY: faixa dentro do frame
    unsafe {
        core::ptr::copy_nonoverlapping(buf.as_ptr(), pfn_to_virt::<u8>(pfn).add(offset), buf.len())
    };
}
