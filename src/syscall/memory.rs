//! # Memory Syscalls
//!
//! mmap_anonymous, mmap_file, munmap, vm_protect, heap_control

use crate::fs::IoFlags;
use crate::mm::config::PAGE_SIZE;
use crate::mm::mmap::{self, MmapFlags};
use crate::mm::VmFlags;
use crate::sys::{Errno, SysResult};
use crate::syscall::abi::{user_aspace, SyscallArgs};
use crate::syscall::io::get_fd;
use crate::syscall::numbers::*;

// === WRAPPERS ===

pub fn sys_mmap_anonymous_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_mmap_anonymous(args.arg1, args.arg2, args.arg3, args.arg4)
}

pub fn sys_mmap_file_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_mmap_file(args.arg1, args.arg2, args.arg3, args.arg4, args.arg5, args.arg6)
}

pub fn sys_munmap_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_munmap(args.arg1, args.arg2)
}

pub fn sys_vm_protect_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vm_protect(args.arg1, args.arg2, args.arg3)
}

pub fn sys_heap_control_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_heap_control(args.arg1, args.arg2)
}

// === IMPLEMENTAÇÕES ===

fn mmap_flags(raw: usize) -> SysResult<MmapFlags> {
    let raw = u32::try_from(raw).map_err(|_| Errno::EINVAL)?;
    MmapFlags::from_bits(raw).ok_or(Errno::EINVAL)
}

/// Mapeia memória anônima (zero-fill sob demanda).
///
/// # Args
/// - hint: endereço desejado (0 = o kernel escolhe)
/// - npages: número de páginas
/// - prot: bits 0/1/2 = leitura/escrita/execução
/// - flags: `MmapFlags`
pub fn sys_mmap_anonymous(hint: usize, npages: usize, prot: usize, flags: usize) -> SysResult<usize> {
    if npages == 0 {
        return Err(Errno::EINVAL);
    }
    let aspace = user_aspace()?;
    Ok(mmap::mmap_anonymous(&aspace, hint, npages, VmFlags::from_prot(prot), mmap_flags(flags)?)?)
}

/// Mapeia um arquivo aberto a partir de `offset` (alinhado a página).
///
/// Escrita compartilhada exige um fd aberto para escrita.
pub fn sys_mmap_file(hint: usize, npages: usize, prot: usize, flags: usize, fd: usize, offset: usize) -> SysResult<usize> {
    if npages == 0 {
        return Err(Errno::EINVAL);
    }
    let mflags = mmap_flags(flags)?;
    let vmflags = VmFlags::from_prot(prot);
    let io = get_fd(fd)?;
    if !io.flags().contains(IoFlags::MMAP) {
        return Err(Errno::ENODEV);
    }
    let shared_write = mflags.contains(MmapFlags::SHARED) && vmflags.contains(VmFlags::WRITE);
    if shared_write && !io.flags().contains(IoFlags::WRITE) {
        return Err(Errno::EACCES);
    }
    let (source, size) = io.mmap_source().ok_or(Errno::ENODEV)?;
    let aspace = user_aspace()?;
    let len = size.saturating_sub(offset);
    Ok(mmap::mmap_file(&aspace, hint, npages, vmflags, mflags, source, offset, len)?)
}

pub fn sys_munmap(addr: usize, npages: usize) -> SysResult<usize> {
    if addr % PAGE_SIZE != 0 || npages == 0 {
        return Err(Errno::EINVAL);
    }
    let aspace = user_aspace()?;
    mmap::munmap(&aspace, addr, npages)?;
    Ok(0)
}

pub fn sys_vm_protect(addr: usize, npages: usize, prot: usize) -> SysResult<usize> {
    if addr % PAGE_SIZE != 0 || npages == 0 {
        return Err(Errno::EINVAL);
    }
    let aspace = user_aspace()?;
    mmap::vm_protect(&aspace, addr, npages, VmFlags::from_prot(prot))?;
    Ok(0)
}

/// Consulta e ajusta o heap de usuário.
///
/// `GROW_PAGES` e `SET_TOP` devolvem o novo topo.
pub fn sys_heap_control(op: usize, value: usize) -> SysResult<usize> {
    let aspace = user_aspace()?;
    let (base, top) = mmap::heap_bounds(&aspace).ok_or_else(|| {
        crate::kwarn!("(Syscall) heap_control sem heap no processo");
        Errno::ENOMEM
    })?;

    match op {
        HEAP_GET_BASE => Ok(base),
        HEAP_GET_TOP => Ok(top),
        HEAP_GET_SIZE => Ok(top - base),
        HEAP_SET_TOP => {
            if value % PAGE_SIZE != 0 {
                return Err(Errno::EINVAL);
            }
            Ok(mmap::set_heap_top(&aspace, value)?)
        }
        HEAP_GROW_PAGES => Ok(mmap::grow_heap(&aspace, value)?),
        _ => {
            crate::kwarn!("(Syscall) heap_control: operação desconhecida ", op as u64);
            Err(Errno::EINVAL)
        }
    }
}
