//! # Filesystem Syscalls
//!
//! Caminhos relativos partem do cwd do processo corrente.

use crate::fs::vfs::{self, DentryRef, FileStat, OpenFlags};
use crate::fs::userfs;
use crate::mm::config::PAGE_SIZE;
use crate::mm::usercopy::{copy_to_user, write_user};
use crate::sched::TaskError;
use crate::sys::{Errno, SysResult};
use crate::syscall::abi::{read_path, read_str, user_aspace, SyscallArgs, MAX_NAME};
use crate::syscall::io::{get_fd, install_fd};
use alloc::vec;

/// Maior bloco de registros devolvido por `vfs_list_dir`.
const LIST_CHUNK: usize = 4 * PAGE_SIZE;

// === WRAPPERS ===

pub fn sys_vfs_open_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_open(args.arg1, args.arg2)
}

pub fn sys_vfs_stat_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_stat(args.arg1, args.arg2)
}

pub fn sys_vfs_fstat_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_fstat(args.arg1, args.arg2)
}

pub fn sys_vfs_mount_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_mount(args.arg1, args.arg2, args.arg3)
}

pub fn sys_vfs_unmount_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_unmount(args.arg1)
}

pub fn sys_vfs_readlink_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_readlink(args.arg1, args.arg2, args.arg3)
}

pub fn sys_vfs_touch_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_touch(args.arg1)
}

pub fn sys_vfs_symlink_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_symlink(args.arg1, args.arg2)
}

pub fn sys_vfs_mkdir_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_mkdir(args.arg1)
}

pub fn sys_vfs_list_dir_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_list_dir(args.arg1, args.arg2, args.arg3)
}

pub fn sys_vfs_chdir_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_chdir(args.arg1)
}

pub fn sys_vfs_getcwd_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_getcwd(args.arg1, args.arg2)
}

pub fn sys_vfs_register_userfs_wrapper(args: &SyscallArgs) -> SysResult<usize> {
    sys_vfs_register_userfs(args.arg1, args.arg2)
}

// === IMPLEMENTAÇÕES ===

fn cwd() -> SysResult<Option<DentryRef>> {
    let process = crate::sched::current_process().ok_or(TaskError::NoCurrentThread)?;
    Ok(process.cwd())
}

pub fn sys_vfs_open(path_ptr: usize, flags: usize) -> SysResult<usize> {
    let path = read_path(path_ptr)?;
    let flags = u32::try_from(flags).ok().and_then(OpenFlags::from_bits).ok_or(Errno::EINVAL)?;
    let file = vfs::open(cwd()?.as_ref(), &path, flags)?;
    let fd = install_fd(file)?;
    crate::ktrace!("(Syscall) vfs_open fd=", fd as u64);
    Ok(fd)
}

/// `stat` sem seguir o último symlink.
pub fn sys_vfs_stat(path_ptr: usize, stat_ptr: usize) -> SysResult<usize> {
    let path = read_path(path_ptr)?;
    let stat = vfs::stat(cwd()?.as_ref(), &path)?;
    write_user::<FileStat>(&*user_aspace()?, stat_ptr, &stat)?;
    Ok(0)
}

pub fn sys_vfs_fstat(fd: usize, stat_ptr: usize) -> SysResult<usize> {
    let stat = get_fd(fd)?.stat()?;
    write_user::<FileStat>(&*user_aspace()?, stat_ptr, &stat)?;
    Ok(0)
}

/// `source` 0 vira `"none"`.
pub fn sys_vfs_mount(fs_ptr: usize, source_ptr: usize, target_ptr: usize) -> SysResult<usize> {
    let fs_name = read_str(fs_ptr, MAX_NAME)?;
    let source = match source_ptr {
        0 => alloc::string::String::from("none"),
        ptr => read_path(ptr)?,
    };
    let target = read_path(target_ptr)?;
    vfs::mount(cwd()?.as_ref(), &fs_name, &source, &target)?;
    crate::kinfo!("(Syscall) Montado em: ", str target.as_str());
    Ok(0)
}

pub fn sys_vfs_unmount(target_ptr: usize) -> SysResult<usize> {
    let target = read_path(target_ptr)?;
    vfs::unmount(cwd()?.as_ref(), &target)?;
    Ok(0)
}

/// Copia o alvo do symlink (sem NUL, truncado em `len`). Devolve os bytes copiados.
pub fn sys_vfs_readlink(path_ptr: usize, buf_ptr: usize, len: usize) -> SysResult<usize> {
    let path = read_path(path_ptr)?;
    let target = vfs::readlink(cwd()?.as_ref(), &path)?;
    let n = target.len().min(len);
    copy_to_user(&*user_aspace()?, buf_ptr, &target.as_bytes()[..n])?;
    Ok(n)
}

pub fn sys_vfs_touch(path_ptr: usize) -> SysResult<usize> {
    let path = read_path(path_ptr)?;
    vfs::touch(cwd()?.as_ref(), &path)?;
    Ok(0)
}

pub fn sys_vfs_symlink(path_ptr: usize, target_ptr: usize) -> SysResult<usize> {
    let path = read_path(path_ptr)?;
    let target = read_path(target_ptr)?;
    vfs::symlink(cwd()?.as_ref(), &path, &target)?;
    Ok(0)
}

pub fn sys_vfs_mkdir(path_ptr: usize) -> SysResult<usize> {
    let path = read_path(path_ptr)?;
    vfs::mkdir(cwd()?.as_ref(), &path)?;
    Ok(0)
}

/// Próximos registros do diretório aberto em `fd`. 0 no fim.
pub fn sys_vfs_list_dir(fd: usize, buf_ptr: usize, len: usize) -> SysResult<usize> {
    let io = get_fd(fd)?;
    let mut kbuf = vec![0u8; len.min(LIST_CHUNK)];
    let n = io.list_dir(&mut kbuf)?;
    copy_to_user(&*user_aspace()?, buf_ptr, &kbuf[..n])?;
    Ok(n)
}

pub fn sys_vfs_chdir(path_ptr: usize) -> SysResult<usize> {
    let path = read_path(path_ptr)?;
    let process = crate::sched::current_process().ok_or(TaskError::NoCurrentThread)?;
    let dir = vfs::chdir(process.cwd().as_ref(), &path)?;
    process.set_cwd(Some(dir));
    Ok(0)
}

/// Caminho do cwd com NUL. `ERANGE` se não couber em `len`.
pub fn sys_vfs_getcwd(buf_ptr: usize, len: usize) -> SysResult<usize> {
    let path = vfs::getcwd(cwd()?.as_ref())?;
    if path.len() + 1 > len {
        return Err(Errno::ERANGE);
    }
    let aspace = user_aspace()?;
    copy_to_user(&aspace, buf_ptr, path.as_bytes())?;
    write_user(&aspace, buf_ptr + path.len(), &0u8)?;
    Ok(path.len() + 1)
}

/// `fs_name` passa a ser servido pelo servidor IPC `server`.
pub fn sys_vfs_register_userfs(fs_ptr: usize, server_ptr: usize) -> SysResult<usize> {
    let fs_name = read_str(fs_ptr, MAX_NAME)?;
    let server = read_str(server_ptr, MAX_NAME)?;
    userfs::register(&fs_name, &server)?;
    Ok(0)
}
