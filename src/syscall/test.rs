//! Testes de syscalls
//!
//! Cada teste adota uma thread de um processo de usuário e chama o dispatcher
//! com um `TrapFrame` de mentira; os ponteiros apontam para memória mapeada no
//! address space do processo.

use super::abi::SyscallArgs;
use super::dispatch::handle;
use super::numbers::*;
use crate::arch::{Cpu, CpuOps, TrapFrame, UserContext};
use crate::fs::vfs::{FileStat, FileType, OpenFlags};
use crate::kcheck;
use crate::klib::test_framework::{run_test_suite, TestResult};
use crate::mm::config::{PAGE_SIZE, USER_HEAP_BASE, USER_STACK_TOP};
use crate::mm::mmap::{self, MmapFlags};
use crate::mm::usercopy::{copy_from_user, copy_to_user, read_user, write_user};
use crate::mm::{AddressSpace, VmFlags};
use crate::sched::signal::{Signal, UserSigAction, SIG_DFL};
use crate::sched::test::{adopt, finish, user_process};
use crate::sys::Errno;

crate::kernel_test_suite! {
    pub SYSCALL_TESTS = [
        test_unknown_syscall,
        test_process_identity,
        test_mmap_and_munmap,
        test_heap_control,
        test_pipe_through_user_buffers,
        test_fs_paths_and_cwd,
        test_sigaction_through_user_memory,
        test_ipc_server_fd,
        test_futex_mismatch,
        test_exec_failure_keeps_frame,
        test_system_checks,
    ];
}

pub fn run_syscall_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DE SYSCALL               ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("syscall", SYSCALL_TESTS).1
}

fn user_frame() -> TrapFrame {
    TrapFrame::new_user(0x40_0000, USER_STACK_TOP, 0, 0)
}

/// Executa a syscall e devolve o registrador de retorno.
fn call(num: usize, args: &[usize]) -> isize {
    let mut frame = user_frame();
    handle(&SyscallArgs::new(num, args), &mut frame).unwrap_or(isize::MIN)
}

fn err(e: Errno) -> isize {
    e.as_isize()
}

/// Página de rascunho mapeada no processo.
fn scratch(aspace: &AddressSpace, npages: usize) -> Option<usize> {
    let rw = VmFlags::READ | VmFlags::WRITE;
    mmap::mmap_anonymous(aspace, 0, npages, rw, MmapFlags::PRIVATE).ok()
}

/// Escreve `s` com NUL em `addr`.
fn put_str(aspace: &AddressSpace, addr: usize, s: &str) -> bool {
    copy_to_user(aspace, addr, s.as_bytes()).is_ok() && write_user(aspace, addr + s.len(), &0u8).is_ok()
}

fn test_unknown_syscall() -> TestResult {
    kcheck!(call(0xEE, &[]) == err(Errno::ENOSYS), "número sem handler");
    kcheck!(call(4096, &[]) == err(Errno::ENOSYS), "número fora da tabela");
    kcheck!(call(SYS_ARCH_SYSCALL, &[99]) == err(Errno::ENOSYS), "arch_syscall desconhecida");
    TestResult::Passed
}

fn test_process_identity() -> TestResult {
    let Ok(process) = user_process("sys-ident") else { return TestResult::Failed };
    let Ok(me) = adopt(&process) else { return TestResult::Failed };
    let pid = call(SYS_GET_PID, &[]);
    let ppid = call(SYS_GET_PARENT_PID, &[]);
    let tid = call(SYS_GET_TID, &[]);
    let expected_tid = me.thread.tid().0 as isize;
    drop(me);

    kcheck!(pid == process.pid().0 as isize, "get_pid");
    kcheck!(ppid == 0, "sem pai");
    kcheck!(tid == expected_tid, "get_tid");
    kcheck!(call(SYS_WAIT_FOR_PROCESS, &[usize::MAX]) == err(Errno::ESRCH), "pid fora da faixa");
    finish(&process);
    TestResult::Passed
}

fn test_mmap_and_munmap() -> TestResult {
    let Ok(process) = user_process("sys-mmap") else { return TestResult::Failed };
    let Some(aspace) = process.aspace() else { return TestResult::Failed };
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let addr = call(SYS_MMAP_ANONYMOUS, &[0, 2, 0b011, MmapFlags::PRIVATE.bits() as usize]);
    let zero_pages = call(SYS_MMAP_ANONYMOUS, &[0, 0, 0b011, MmapFlags::PRIVATE.bits() as usize]);
    let bad_flags = call(SYS_MMAP_ANONYMOUS, &[0, 1, 0b011, 1 << 20]);
    let write_ok = addr > 0 && write_user(&aspace, addr as usize + PAGE_SIZE, &0xABCDu64).is_ok();
    let protect = call(SYS_VM_PROTECT, &[addr as usize, 2, 0b001]);
    let write_after_protect = write_user(&aspace, addr as usize, &1u64).is_err();
    let misaligned = call(SYS_MUNMAP, &[addr as usize + 1, 1]);
    let unmapped = call(SYS_MUNMAP, &[addr as usize, 2]);
    drop(me);

    kcheck!(addr > 0 && addr as usize % PAGE_SIZE == 0, "endereço alinhado");
    kcheck!(zero_pages == err(Errno::EINVAL), "zero páginas");
    kcheck!(bad_flags == err(Errno::EINVAL), "flags desconhecidas");
    kcheck!(write_ok, "região gravável");
    kcheck!(protect == 0, "vm_protect");
    kcheck!(write_after_protect, "somente leitura depois do vm_protect");
    kcheck!(misaligned == err(Errno::EINVAL), "munmap desalinhado");
    kcheck!(unmapped == 0, "munmap");
    kcheck!(read_user::<u64>(&aspace, addr as usize).is_err(), "região removida");
    finish(&process);
    TestResult::Passed
}

fn test_heap_control() -> TestResult {
    let Ok(process) = user_process("sys-heap") else { return TestResult::Failed };
    let Some(aspace) = process.aspace() else { return TestResult::Failed };
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let no_heap = call(SYS_HEAP_CONTROL, &[HEAP_GET_BASE, 0]);
    let created = mmap::create_heap(&aspace, USER_HEAP_BASE).is_ok();
    let base = call(SYS_HEAP_CONTROL, &[HEAP_GET_BASE, 0]);
    let grown = call(SYS_HEAP_CONTROL, &[HEAP_GROW_PAGES, 3]);
    let size = call(SYS_HEAP_CONTROL, &[HEAP_GET_SIZE, 0]);
    let set = call(SYS_HEAP_CONTROL, &[HEAP_SET_TOP, USER_HEAP_BASE + PAGE_SIZE]);
    let top = call(SYS_HEAP_CONTROL, &[HEAP_GET_TOP, 0]);
    let unaligned = call(SYS_HEAP_CONTROL, &[HEAP_SET_TOP, USER_HEAP_BASE + 5]);
    let below = call(SYS_HEAP_CONTROL, &[HEAP_SET_TOP, USER_HEAP_BASE - PAGE_SIZE]);
    let unknown = call(SYS_HEAP_CONTROL, &[42, 0]);
    drop(me);

    kcheck!(no_heap == err(Errno::ENOMEM), "processo sem heap");
    kcheck!(created, "heap criado");
    kcheck!(base == USER_HEAP_BASE as isize, "GET_BASE");
    kcheck!(grown == (USER_HEAP_BASE + 3 * PAGE_SIZE) as isize, "GROW_PAGES devolve o topo novo");
    kcheck!(size == (3 * PAGE_SIZE) as isize, "GET_SIZE");
    kcheck!(set == (USER_HEAP_BASE + PAGE_SIZE) as isize, "SET_TOP encolhe");
    kcheck!(top == set, "GET_TOP acompanha");
    kcheck!(unaligned == err(Errno::EINVAL), "topo desalinhado");
    kcheck!(below < 0, "topo abaixo da base");
    kcheck!(unknown == err(Errno::EINVAL), "operação desconhecida");
    finish(&process);
    TestResult::Passed
}

fn test_pipe_through_user_buffers() -> TestResult {
    let Ok(process) = user_process("sys-pipe") else { return TestResult::Failed };
    let Some(aspace) = process.aspace() else { return TestResult::Failed };
    let Some(buf) = scratch(&aspace, 1) else { return TestResult::Failed };
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let created = call(SYS_PIPE, &[buf]);
    let rfd = read_user::<u32>(&aspace, buf).unwrap_or(u32::MAX) as usize;
    let wfd = read_user::<u32>(&aspace, buf + 4).unwrap_or(u32::MAX) as usize;
    let staged = copy_to_user(&aspace, buf + 64, b"hello").is_ok();
    let written = call(SYS_IO_WRITE, &[wfd, buf + 64, 5]);
    let read = call(SYS_IO_READ, &[rfd, buf + 128, 16]);
    let mut out = [0u8; 5];
    let copied = copy_from_user(&aspace, buf + 128, &mut out).is_ok();
    let wrong_way = call(SYS_IO_READ, &[wfd, buf + 128, 16]);
    let closed = call(SYS_IO_CLOSE, &[wfd]);
    let eof = call(SYS_IO_READ, &[rfd, buf + 128, 16]);
    let bad_close = call(SYS_IO_CLOSE, &[wfd]);
    let null_buf = call(SYS_IO_READ, &[rfd, 0, 16]);
    let _ = call(SYS_IO_CLOSE, &[rfd]);
    let fds_left = process.files.lock().count();
    drop(me);

    kcheck!(created == 0, "pipe criado");
    kcheck!(rfd != wfd && rfd < 256 && wfd < 256, "dois fds");
    kcheck!(staged, "dados no buffer do usuário");
    kcheck!(written == 5, "io_write");
    kcheck!(read == 5, "io_read");
    kcheck!(copied && &out == b"hello", "mesmos bytes do outro lado");
    kcheck!(wrong_way == err(Errno::EBADF), "leitura na ponta de escrita");
    kcheck!(closed == 0, "io_close");
    kcheck!(eof == 0, "fim de arquivo sem escritor");
    kcheck!(bad_close == err(Errno::EBADF), "fd já fechado");
    kcheck!(null_buf == err(Errno::EFAULT), "buffer nulo");
    kcheck!(fds_left == 0, "tabela vazia");
    finish(&process);
    TestResult::Passed
}

fn test_fs_paths_and_cwd() -> TestResult {
    let Ok(process) = user_process("sys-fs") else { return TestResult::Failed };
    let Some(aspace) = process.aspace() else { return TestResult::Failed };
    let Some(buf) = scratch(&aspace, 1) else { return TestResult::Failed };
    let (dir, file, link, target, out) = (buf, buf + 256, buf + 512, buf + 768, buf + 1024);
    let staged = put_str(&aspace, dir, "/tmp/sys_fs")
        && put_str(&aspace, file, "data")
        && put_str(&aspace, link, "alias")
        && put_str(&aspace, target, "data");
    if !staged {
        return TestResult::Failed;
    }
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let mkdir = call(SYS_VFS_MKDIR, &[dir]);
    let mkdir_again = call(SYS_VFS_MKDIR, &[dir]);
    let chdir = call(SYS_VFS_CHDIR, &[dir]);
    let touch = call(SYS_VFS_TOUCH, &[file]);
    let symlink = call(SYS_VFS_SYMLINK, &[link, target]);
    let cwd_len = call(SYS_VFS_GETCWD, &[out, 64]);
    let cwd = crate::mm::usercopy::read_user_string(&aspace, out, 64).unwrap_or_default();
    let small = call(SYS_VFS_GETCWD, &[out, 4]);
    let readlink = call(SYS_VFS_READLINK, &[link, out, 64]);
    let mut link_text = [0u8; 4];
    let link_ok = copy_from_user(&aspace, out, &mut link_text).is_ok();
    let stat_link = call(SYS_VFS_STAT, &[link, out]);
    let link_type = read_user::<FileStat>(&aspace, out).map(|s| s.ftype).unwrap_or(0);

    let rw = (OpenFlags::READ | OpenFlags::WRITE).bits() as usize;
    let fd = call(SYS_VFS_OPEN, &[file, rw]);
    let bad_open = call(SYS_VFS_OPEN, &[file, 1 << 20]);
    let staged_data = copy_to_user(&aspace, out, b"12345678").is_ok();
    let written = call(SYS_IO_WRITE, &[fd as usize, out, 8]);
    let fstat = call(SYS_VFS_FSTAT, &[fd as usize, out]);
    let size = read_user::<FileStat>(&aspace, out).map(|s| s.size).unwrap_or(0);
    let _ = call(SYS_IO_CLOSE, &[fd as usize]);
    let missing = call(SYS_VFS_STAT, &[0, out]);
    drop(me);

    kcheck!(mkdir == 0, "mkdir");
    kcheck!(mkdir_again == err(Errno::EEXIST), "mkdir repetido");
    kcheck!(chdir == 0, "chdir");
    kcheck!(touch == 0 && symlink == 0, "arquivo e symlink relativos ao cwd");
    kcheck!(cwd == "/tmp/sys_fs", "getcwd");
    kcheck!(cwd_len == cwd.len() as isize + 1, "getcwd conta o NUL");
    kcheck!(small == err(Errno::ERANGE), "buffer pequeno");
    kcheck!(readlink == 4 && link_ok && &link_text == b"data", "readlink");
    kcheck!(stat_link == 0 && link_type == FileType::Symlink.as_u32(), "stat não segue o symlink");
    kcheck!(fd >= 0, "vfs_open");
    kcheck!(bad_open == err(Errno::EINVAL), "flags desconhecidas");
    kcheck!(staged_data && written == 8, "escrita no arquivo");
    kcheck!(fstat == 0 && size == 8, "fstat vê o tamanho novo");
    kcheck!(missing == err(Errno::EFAULT), "caminho nulo");
    finish(&process);
    TestResult::Passed
}

fn test_sigaction_through_user_memory() -> TestResult {
    let Ok(process) = user_process("sys-sigaction") else { return TestResult::Failed };
    let Some(aspace) = process.aspace() else { return TestResult::Failed };
    let Some(buf) = scratch(&aspace, 1) else { return TestResult::Failed };
    let action = UserSigAction { handler: 0x40_1000, flags: 0, restorer: 0x40_2000, mask: 0 };
    if write_user(&aspace, buf, &action).is_err() {
        return TestResult::Failed;
    }
    let old = buf + 64;
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let usr1 = Signal::SIGUSR1.number() as usize;
    let install = call(SYS_SIGACTION, &[usr1, buf, old]);
    let first_old = read_user::<UserSigAction>(&aspace, old).map(|a| a.handler);
    let query = call(SYS_SIGACTION, &[usr1, 0, old]);
    let current = read_user::<UserSigAction>(&aspace, old).map(|a| (a.handler, a.restorer));
    let kill_handler = call(SYS_SIGACTION, &[Signal::SIGKILL.number() as usize, buf, 0]);
    let bad_ptr = call(SYS_SIGACTION, &[usr1, 0x10, 0]);
    drop(me);

    kcheck!(install == 0, "sigaction");
    kcheck!(first_old == Ok(SIG_DFL), "anterior era o padrão");
    kcheck!(query == 0 && current == Ok((0x40_1000, 0x40_2000)), "consulta devolve o handler");
    kcheck!(kill_handler == err(Errno::EINVAL), "SIGKILL não aceita handler");
    kcheck!(bad_ptr == err(Errno::EFAULT), "ação em endereço inválido");
    finish(&process);
    TestResult::Passed
}

fn test_ipc_server_fd() -> TestResult {
    let Ok(process) = user_process("sys-ipc") else { return TestResult::Failed };
    let Some(aspace) = process.aspace() else { return TestResult::Failed };
    let Some(buf) = scratch(&aspace, 1) else { return TestResult::Failed };
    if !put_str(&aspace, buf, "sys.test.server") {
        return TestResult::Failed;
    }
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let server = call(SYS_IPC_CREATE, &[buf, 4]);
    let duplicate = call(SYS_IPC_CREATE, &[buf, 4]);
    let pipe = call(SYS_PIPE, &[buf + 256]);
    let pipe_fd = read_user::<u32>(&aspace, buf + 256).unwrap_or(u32::MAX) as usize;
    let accept_on_pipe = call(SYS_IPC_ACCEPT, &[pipe_fd, 0]);
    let closed = call(SYS_IO_CLOSE, &[server as usize]);
    let recreated = call(SYS_IPC_CREATE, &[buf, 4]);
    let _ = call(SYS_IO_CLOSE, &[recreated as usize]);
    drop(me);

    kcheck!(server >= 0, "ipc_create devolve um fd");
    kcheck!(duplicate == err(Errno::EEXIST), "nome em uso");
    kcheck!(pipe == 0, "pipe");
    kcheck!(accept_on_pipe == err(Errno::EBADF), "accept em fd que não é servidor");
    kcheck!(closed == 0, "fechar o servidor");
    kcheck!(recreated >= 0, "nome liberado ao fechar o fd");
    finish(&process);
    TestResult::Passed
}

fn test_futex_mismatch() -> TestResult {
    let Ok(process) = user_process("sys-futex") else { return TestResult::Failed };
    let Some(aspace) = process.aspace() else { return TestResult::Failed };
    let Some(buf) = scratch(&aspace, 1) else { return TestResult::Failed };
    if write_user(&aspace, buf, &3u32).is_err() {
        return TestResult::Failed;
    }
    let Ok(me) = adopt(&process) else { return TestResult::Failed };
    let mismatch = call(SYS_FUTEX_WAIT, &[buf, 2]);
    let woken = call(SYS_FUTEX_WAKE, &[buf, 8]);
    let misaligned = call(SYS_FUTEX_WAIT, &[buf + 2, 3]);
    drop(me);

    kcheck!(mismatch == err(Errno::EAGAIN), "valor mudou antes de dormir");
    kcheck!(woken == 0, "ninguém esperando");
    kcheck!(misaligned == err(Errno::EINVAL), "endereço desalinhado");
    finish(&process);
    TestResult::Passed
}

fn test_exec_failure_keeps_frame() -> TestResult {
    let Ok(process) = user_process("sys-exec") else { return TestResult::Failed };
    let Some(aspace) = process.aspace() else { return TestResult::Failed };
    let Some(buf) = scratch(&aspace, 1) else { return TestResult::Failed };
    if !put_str(&aspace, buf, "/tmp/no-such-binary") {
        return TestResult::Failed;
    }
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let mut frame = user_frame();
    let result = handle(&SyscallArgs::new(SYS_EXEC, &[buf, 0, 0]), &mut frame);
    let spawn = call(SYS_SPAWN, &[buf, 0, 0]);
    let null_path = call(SYS_EXEC, &[0, 0, 0]);
    drop(me);

    kcheck!(result == Some(err(Errno::ENOENT)), "exec de arquivo inexistente");
    kcheck!(frame.ip() == 0x40_0000, "contexto intacto na falha");
    kcheck!(spawn == err(Errno::ENOENT), "spawn de arquivo inexistente");
    kcheck!(null_path == err(Errno::EFAULT), "caminho nulo");
    finish(&process);
    TestResult::Passed
}

fn test_system_checks() -> TestResult {
    kcheck!(call(SYS_POWEROFF, &[0, 0x1234]) == err(Errno::EINVAL), "poweroff sem magic");
    kcheck!(call(SYS_KILL, &[0, 15]) == err(Errno::EPERM), "kill no kernel");
    kcheck!(call(SYS_KILL, &[usize::MAX, 15]) == err(Errno::ESRCH), "pid fora da faixa");
    kcheck!(call(SYS_ARCH_SYSCALL, &[ARCH_CPU_ID]) == Cpu::current_id() as isize, "cpu corrente");
    TestResult::Passed
}
