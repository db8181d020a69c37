//! Acesso do kernel à memória de usuário.
//!
//! Nada aqui desreferencia ponteiros de usuário diretamente: cada página é traduzida na
//! page table do address space e lida pelo direct map. Se a página não está presente
//! (ou não permite escrita), o fault é resolvido em software exatamente como o MMU
//! faria; quando o MMU entregaria SIGSEGV, o resultado é `BadUserAddress` (EFAULT).
//!
//! Durante a cópia o frame fica com uma referência extra, então um `munmap`
//! concorrente não o devolve ao PMM no meio da operação.

use crate::arch::trap::PageFaultInfo;
use crate::mm::aspace::AddressSpace;
use crate::mm::config::{PAGE_SIZE, USER_SPACE_END};
use crate::mm::{fault, hhdm, paging, pmm, MmError, MmResult, Pfn, VmFlags};
use alloc::string::String;
use alloc::vec::Vec;

/// Tipos que podem ser copiados byte a byte de/para userspace.
///
/// # Safety
/// Todo padrão de bits precisa ser um valor válido do tipo, sem padding com
/// significado e sem ponteiros do kernel.
pub unsafe trait UserValue: Copy {}

unsafe impl UserValue for u8 {}
unsafe impl UserValue for u16 {}
unsafe impl UserValue for u32 {}
unsafe impl UserValue for u64 {}
unsafe impl UserValue for usize {}
unsafe impl UserValue for i32 {}
unsafe impl UserValue for i64 {}
unsafe impl UserValue for isize {}

/// Tentativas de tradução (a segunda depois de resolver o fault).
const ATTEMPTS: usize = 2;

/// Frame por trás de `vaddr`, com uma referência extra que o chamador devolve.
fn pin_user_page(aspace: &AddressSpace, vaddr: usize, write: bool) -> MmResult<Pfn> {
    if vaddr >= USER_SPACE_END {
        return Err(MmError::BadUserAddress);
    }
    let page = vaddr & !(PAGE_SIZE - 1);

    for _ in 0..ATTEMPTS {
        {
            let guard = aspace.lock();
            if let Some((pfn, flags)) = paging::translate(guard.root(), page) {
                let allowed = flags.contains(VmFlags::USER)
                    && flags.contains(VmFlags::READ)
                    && (!write || flags.contains(VmFlags::WRITE));
                if allowed {
                    pmm::ref_range(pfn, 1);
                    return Ok(pfn);
                }
            }
        }

        let info = PageFaultInfo { vaddr, present: false, write, user: true, exec: false, ip: 0 };
        fault::handle_fault(aspace, &info).map_err(|_| MmError::BadUserAddress)?;
    }
    Err(MmError::BadUserAddress)
}

/// Percorre `[addr, addr + len)` página a página.
fn for_each_user_chunk(
    aspace: &AddressSpace,
    addr: usize,
    len: usize,
    write: bool,
    mut f: impl FnMut(Pfn, usize, core::ops::Range<usize>),
) -> MmResult<()> {
    if addr.checked_add(len).map_or(true, |end| end > USER_SPACE_END) {
        return Err(MmError::BadUserAddress);
    }
    let mut done = 0;
    while done < len {
        let vaddr = addr + done;
        let offset = vaddr % PAGE_SIZE;
        let chunk = (PAGE_SIZE - offset).min(len - done);
        let pfn = pin_user_page(aspace, vaddr, write)?;
        f(pfn, offset, done..done + chunk);
        pmm::unref_range(pfn, 1);
        done += chunk;
    }
    Ok(())
}

pub fn copy_from_user(aspace: &AddressSpace, src: usize, buf: &mut [u8]) -> MmResult<()> {
    for_each_user_chunk(aspace, src, buf.len(), false, |pfn, offset, range| {
        hhdm::read_frame(pfn, offset, &mut buf[range]);
    })
}

pub fn copy_to_user(aspace: &AddressSpace, dst: usize, buf: &[u8]) -> MmResult<()> {
    for_each_user_chunk(aspace, dst, buf.len(), true, |pfn, offset, range| {
        hhdm::write_frame(pfn, offset, &buf[range]);
    })
}

pub fn read_user<T: UserValue>(aspace: &AddressSpace, addr: usize) -> MmResult<T> {
    let mut value = core::mem::MaybeUninit::<T>::uninit();
    // SAFETY: `UserValue` garante que qualquer sequência de bytes é um `T` válido.
    let bytes = unsafe { core::slice::from_raw_parts_mut(value.as_mut_ptr() as *mut u8, core::mem::size_of::<T>()) };
    copy_from_user(aspace, addr, bytes)?;
    // SAFETY: todos os bytes foram preenchidos acima.
    Ok(unsafe { value.assume_init() })
}

pub fn write_user<T: UserValue>(aspace: &AddressSpace, addr: usize, value: &T) -> MmResult<()> {
    // SAFETY: `UserValue` não tem bytes de padding com conteúdo do kernel.
    let bytes = unsafe { core::slice::from_raw_parts(value as *const T as *const u8, core::mem::size_of::<T>()) };
    copy_to_user(aspace, addr, bytes)
}

/// Lê uma string terminada em NUL com até `max` bytes.
pub fn read_user_string(aspace: &AddressSpace, addr: usize, max: usize) -> MmResult<String> {
    let mut bytes = Vec::new();
    let mut cursor = addr;
    loop {
        let offset = cursor % PAGE_SIZE;
        let mut chunk = [0u8; 256];
        let n = (PAGE_SIZE - offset).min(chunk.len());
        copy_from_user(aspace, cursor, &mut chunk[..n])?;
        if let Some(nul) = chunk[..n].iter().position(|&b| b == 0) {
            bytes.extend_from_slice(&chunk[..nul]);
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        if bytes.len() > max {
            return Err(MmError::InvalidSize);
        }
        cursor += n;
    }
    if bytes.len() > max {
        return Err(MmError::InvalidSize);
    }
    String::from_utf8(bytes).map_err(|_| MmError::InvalidParameter)
}

/// Lê um vetor de strings terminado em ponteiro nulo (argv/envp).
pub fn read_user_string_array(aspace: &AddressSpace, addr: usize, max_items: usize, max_len: usize) -> MmResult<Vec<String>> {
    let mut items = Vec::new();
    if addr == 0 {
        return Ok(items);
    }
    loop {
        let ptr: usize = read_user(aspace, addr + items.len() * core::mem::size_of::<usize>())?;
        if ptr == 0 {
            return Ok(items);
        }
        if items.len() == max_items {
            return Err(MmError::InvalidSize);
        }
        items.push(read_user_string(aspace, ptr, max_len)?);
    }
}
