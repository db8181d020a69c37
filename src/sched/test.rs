//! Testes de tarefas, scheduler e sinais
//!
//! Não há troca de contexto nos testes: a thread que executa o teste "adota" uma
//! thread do kernel como corrente ([`Adopted`]) e nada aqui bloqueia de verdade.

use crate::arch::{TrapFrame, UserContext};
use crate::fs::io::Io;
use crate::fs::vfs::{self, OpenFlags};
use crate::fs::FdTable;
use crate::kcheck;
use crate::klib::test_framework::{run_test_suite, TestResult};
use crate::mm::config::{PAGE_SIZE, USER_STACK_PAGES, USER_STACK_TOP};
use crate::mm::mmap::{self, MmapFlags};
use crate::mm::usercopy::{read_user, write_user};
use crate::mm::{AddressSpace, VmFlags};
use crate::sched::exec;
use crate::sched::core::{claim_for_run, enqueue_new, set_current, NaivePolicy, SchedulerPolicy};
use crate::sched::signal::{self, delivery, Disposition, SigActionFlags, Signal, SignalState};
use crate::sched::sync::{WaitCondition, WaitOutcome, Waitlist};
use crate::sched::task::{table, ExitStatus, Process, Thread, ThreadState};
use crate::sched::{TaskError, TaskResult};
use crate::sys::Pid;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

crate::kernel_test_suite! {
    pub SCHED_TESTS = [
        test_fork_copies_on_write,
        test_wait_collects_exit_code,
        test_sigkill_exit_code,
        test_exit_reparents_children,
        test_naive_policy_claims_once,
        test_blocked_thread_waits_for_condition,
        test_waitlist_wake_order,
        test_waitlist_close,
        test_pending_signal_not_duplicated,
        test_unblockable_signals,
        test_kill_permissions,
        test_sigaction_previous_disposition,
        test_handler_frame_and_sigreturn,
        test_default_terminate,
        test_restart_without_handler,
        test_create_and_join_thread,
        test_load_image_segments_and_stack,
        test_exec_replaces_image,
        test_load_image_rejects_garbage,
    ];
}

pub fn run_sched_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DO SCHEDULER             ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("sched", SCHED_TESTS).1
}

/// Thread de usuário que a CPU corrente finge estar executando.
pub(crate) struct Adopted {
    pub(crate) thread: Arc<Thread>,
    previous: Option<Arc<Thread>>,
}

impl Drop for Adopted {
    fn drop(&mut self) {
        self.thread.mark_dead(0);
        self.thread.release_cpu();
        set_current(self.previous.take());
    }
}

pub(crate) fn adopt(process: &Arc<Process>) -> TaskResult<Adopted> {
    let tid = table::allocate_tid().ok_or(TaskError::NoSuchThread)?;
    let frame = TrapFrame::new_user(0x40_0000, USER_STACK_TOP, 0, 0);
    let thread = Thread::new_user(tid, process.clone(), frame, None)?;
    enqueue_new(thread.clone());
    claim_for_run(&thread).ok_or(TaskError::NoSuchThread)?;
    let previous = set_current(Some(thread.clone()));
    Ok(Adopted { thread, previous })
}

/// Processo de usuário com address space próprio, filho de ninguém.
pub(crate) fn user_process(name: &str) -> TaskResult<Arc<Process>> {
    let pid = table::allocate_pid().ok_or(TaskError::NoSuchProcess)?;
    let process = Process::new(pid, None, name, Some(AddressSpace::new()), FdTable::new());
    table::insert_process(process.clone());
    Ok(process)
}

/// Termina e colhe `process`.
pub(crate) fn finish(process: &Arc<Process>) {
    crate::sched::process_exit(process, ExitStatus::Exited(0));
    let _ = crate::sched::wait_for_process(process.pid());
}

fn nothing(_arg: usize) {}

fn kernel_thread() -> Option<Arc<Thread>> {
    let kthreadd = table::process(Pid::KTHREADD)?;
    let thread = Thread::new_kernel(table::allocate_tid()?, kthreadd, nothing, 0).ok()?;
    thread.mark_created();
    Some(thread)
}

fn test_fork_copies_on_write() -> TestResult {
    let Ok(parent) = user_process("fork-parent") else { return TestResult::Failed };
    let Some(aspace) = parent.aspace() else { return TestResult::Failed };
    let rw = VmFlags::READ | VmFlags::WRITE;
    let Ok(vaddr) = mmap::mmap_anonymous(&aspace, 0, 2, rw, MmapFlags::PRIVATE) else { return TestResult::Failed };
    kcheck!(write_user(&aspace, vaddr, &0x1111u64).is_ok(), "escrita no pai");

    let Ok(me) = adopt(&parent) else { return TestResult::Failed };
    let mut frame = TrapFrame::new_user(0x40_0000, USER_STACK_TOP, 0, 0);
    frame.set_return(99);
    let forked = crate::sched::fork::fork_process(&parent, &me.thread, &frame);
    drop(me);
    let Ok((child, child_thread)) = forked else { return TestResult::Failed };

    kcheck!(child.pid() != parent.pid(), "pid novo");
    kcheck!(child.parent() == Some(parent.pid()), "pai registrado");
    kcheck!(child_thread.start_frame().map(|f| f.return_value()) == Some(0), "fork devolve 0 ao filho");

    let Some(child_aspace) = child.aspace() else { return TestResult::Failed };
    kcheck!(read_user::<u64>(&child_aspace, vaddr) == Ok(0x1111), "filho vê o conteúdo do pai");
    kcheck!(write_user(&child_aspace, vaddr, &0x2222u64).is_ok(), "escrita no filho");
    kcheck!(read_user::<u64>(&aspace, vaddr) == Ok(0x1111), "pai não vê a escrita do filho");
    kcheck!(read_user::<u64>(&child_aspace, vaddr) == Ok(0x2222), "filho vê a própria escrita");

    kcheck!(write_user(&aspace, vaddr + PAGE_SIZE, &7u64).is_ok(), "segunda página do pai");
    kcheck!(read_user::<u64>(&child_aspace, vaddr + PAGE_SIZE) == Ok(0), "página tocada depois do fork");

    finish(&child);
    finish(&parent);
    TestResult::Passed
}

fn test_wait_collects_exit_code() -> TestResult {
    let Ok(process) = user_process("exit-7") else { return TestResult::Failed };
    let pid = process.pid();
    crate::sched::process_exit(&process, ExitStatus::Exited(7));
    crate::sched::process_exit(&process, ExitStatus::Exited(9));

    kcheck!(crate::sched::wait_for_process(pid) == Ok(7), "primeiro status vence");
    kcheck!(crate::sched::wait_for_process(pid) == Err(TaskError::NoSuchProcess), "zumbi já colhido");
    kcheck!(table::process(pid).is_none(), "fora da tabela");
    kcheck!(process.aspace().is_none(), "address space liberado");
    TestResult::Passed
}

fn test_sigkill_exit_code() -> TestResult {
    let Ok(process) = user_process("killed") else { return TestResult::Failed };
    kcheck!(crate::sched::kill(process.pid(), Signal::SIGKILL.number() as usize).is_ok(), "kill aceito");
    kcheck!(process.has_exited(), "SIGKILL termina na hora");
    kcheck!(crate::sched::wait_for_process(process.pid()) == Ok(128 + 9), "status de sinal");
    TestResult::Passed
}

fn test_exit_reparents_children() -> TestResult {
    let Ok(parent) = user_process("orphan-parent") else { return TestResult::Failed };
    let Ok(me) = adopt(&parent) else { return TestResult::Failed };
    let frame = TrapFrame::new_user(0x40_0000, USER_STACK_TOP, 0, 0);
    let forked = crate::sched::fork::fork_process(&parent, &me.thread, &frame);
    drop(me);
    let Ok((child, _)) = forked else { return TestResult::Failed };

    crate::sched::process_exit(&parent, ExitStatus::Exited(3));
    kcheck!(child.parent() == Some(Pid::INIT), "órfão adotado pelo init");
    kcheck!(parent.waiters().is_closed(), "quem espera pelo pai acorda");
    kcheck!(me_is_dead(&parent), "threads do pai mortas");

    finish(&child);
    let _ = crate::sched::wait_for_process(parent.pid());
    TestResult::Passed
}

fn me_is_dead(process: &Process) -> bool {
    process.threads().iter().all(|t| t.is_dead())
}

fn test_naive_policy_claims_once() -> TestResult {
    let policy = NaivePolicy::new();
    let Some(threads) = (0..3).map(|_| kernel_thread()).collect::<Option<Vec<_>>>() else {
        return TestResult::Failed;
    };
    for thread in &threads {
        policy.enqueue(thread.clone());
    }

    let mut picked = Vec::new();
    for _ in 0..threads.len() {
        let Some(thread) = policy.pick_next() else { return TestResult::Failed };
        kcheck!(thread.state() == ThreadState::Running, "escolhida roda");
        kcheck!(thread.is_on_cpu(), "escolhida está reivindicada");
        picked.push(thread.tid());
    }
    picked.sort();
    picked.dedup();
    kcheck!(picked.len() == threads.len(), "todas escolhidas uma vez");
    kcheck!(policy.pick_next().is_none(), "thread em execução não é escolhida de novo");

    *threads[0].state_lock() = ThreadState::Ready;
    threads[0].release_cpu();
    let again = policy.pick_next();
    kcheck!(again.is_some_and(|t| Arc::ptr_eq(&t, &threads[0])), "pronta volta a ser escolhida");

    for thread in &threads {
        thread.mark_dead(0);
        thread.release_cpu();
        policy.remove(thread);
    }
    kcheck!(policy.len() == 0, "fila vazia");
    TestResult::Passed
}

fn test_blocked_thread_waits_for_condition() -> TestResult {
    let policy = NaivePolicy::new();
    let (Some(waiter), Some(target)) = (kernel_thread(), kernel_thread()) else {
        return TestResult::Failed;
    };
    waiter.set_wait(WaitCondition::ThreadDead(target.clone()));
    *waiter.state_lock() = ThreadState::Blocked;
    policy.enqueue(waiter.clone());

    kcheck!(policy.pick_next().is_none(), "condição falsa não roda");
    kcheck!(waiter.wait_name() == Some("thread-dead"), "condição anexada");

    target.mark_dead(0);
    let picked = policy.pick_next();
    kcheck!(picked.is_some_and(|t| Arc::ptr_eq(&t, &waiter)), "condição satisfeita roda");
    kcheck!(waiter.wait_name().is_none(), "condição removida ao rodar");

    waiter.mark_dead(0);
    waiter.release_cpu();
    TestResult::Passed
}

fn test_waitlist_wake_order() -> TestResult {
    let list = Waitlist::new();
    let (Some(a), Some(b)) = (kernel_thread(), kernel_thread()) else { return TestResult::Failed };
    kcheck!(list.append(&a) && list.append(&b), "enfileiradas");
    kcheck!(a.state() == ThreadState::Blocked, "append bloqueia");

    kcheck!(list.wake(1) == 1, "uma acordada");
    kcheck!(a.state() == ThreadState::Ready, "FIFO: a primeira sai");
    kcheck!(b.state() == ThreadState::Blocked, "a segunda continua");
    kcheck!(list.wake_all() == 1 && list.is_empty(), "resto acordado");

    a.mark_dead(0);
    b.mark_dead(0);
    kcheck!(!list.append(&a), "thread morta não entra");
    TestResult::Passed
}

fn test_waitlist_close() -> TestResult {
    let Ok(process) = user_process("waitlist") else { return TestResult::Failed };
    let list = Waitlist::new();
    let Some(sleeper) = kernel_thread() else { return TestResult::Failed };
    kcheck!(list.append(&sleeper), "enfileirada");
    list.close();
    kcheck!(sleeper.state() == ThreadState::Ready, "close acorda");
    kcheck!(!list.append(&sleeper), "lista fechada recusa");

    let Ok(me) = adopt(&process) else { return TestResult::Failed };
    let outcome = list.wait();
    drop(me);
    kcheck!(outcome == WaitOutcome::Closed, "wait numa lista fechada volta na hora");

    sleeper.mark_dead(0);
    finish(&process);
    TestResult::Passed
}

fn test_pending_signal_not_duplicated() -> TestResult {
    let mut state = SignalState::new();
    kcheck!(state.raise(Signal::SIGUSR1), "primeiro raise");
    kcheck!(!state.raise(Signal::SIGUSR1), "segundo raise não conta");
    state.raise(Signal::SIGTERM);
    kcheck!(state.take_next() == Some(Signal::SIGUSR1), "menor número primeiro");
    kcheck!(state.take_next() == Some(Signal::SIGTERM), "depois o próximo");
    kcheck!(state.take_next().is_none(), "uma entrega por raise");
    TestResult::Passed
}

fn test_unblockable_signals() -> TestResult {
    let mut state = SignalState::new();
    state.set_blocked(u64::MAX);
    kcheck!(state.blocked() & Signal::SIGKILL.bit() == 0, "SIGKILL não bloqueia");
    kcheck!(state.blocked() & Signal::SIGSTOP.bit() == 0, "SIGSTOP não bloqueia");
    state.raise(Signal::SIGUSR2);
    kcheck!(state.take_next().is_none(), "bloqueado fica pendente");
    state.set_blocked(0);
    kcheck!(state.take_next() == Some(Signal::SIGUSR2), "entregue ao desbloquear");
    TestResult::Passed
}

fn test_kill_permissions() -> TestResult {
    let Ok(process) = user_process("kill-target") else { return TestResult::Failed };
    kcheck!(crate::sched::kill(Pid::KERNEL, 15) == Err(TaskError::PermissionDenied), "kernel intocável");
    kcheck!(crate::sched::kill(Pid::KTHREADD, 9) == Err(TaskError::PermissionDenied), "kthreadd intocável");
    kcheck!(crate::sched::kill(process.pid(), 64) == Err(TaskError::InvalidSignal), "sinal fora da faixa");
    kcheck!(crate::sched::kill(Pid(40_000), 15) == Err(TaskError::NoSuchProcess), "pid inexistente");
    kcheck!(crate::sched::kill(process.pid(), 0).is_ok(), "sinal 0 testa existência");
    kcheck!(!process.has_exited(), "sinal 0 não entrega nada");
    finish(&process);
    TestResult::Passed
}

fn test_sigaction_previous_disposition() -> TestResult {
    let Ok(process) = user_process("sigaction") else { return TestResult::Failed };
    let Ok(me) = adopt(&process) else { return TestResult::Failed };
    let handler = Disposition::Handler { handler: 0x40_1000, mask: 0, flags: SigActionFlags::empty(), restorer: 0x40_2000 };

    let first = signal::sigaction(Signal::SIGUSR1.number() as usize, Some(handler));
    let second = signal::sigaction(Signal::SIGUSR1.number() as usize, Some(Disposition::Ignore));
    let kill = signal::sigaction(Signal::SIGKILL.number() as usize, Some(Disposition::Ignore));
    let query = signal::sigaction(Signal::SIGUSR1.number() as usize, None);
    drop(me);

    kcheck!(first == Ok(Disposition::Default), "padrão antes");
    kcheck!(second == Ok(handler), "devolve o handler anterior");
    kcheck!(kill == Err(TaskError::InvalidSignal), "SIGKILL não muda");
    kcheck!(query == Ok(Disposition::Ignore), "consulta sem troca");
    finish(&process);
    TestResult::Passed
}

fn test_handler_frame_and_sigreturn() -> TestResult {
    let Ok(process) = user_process("handler") else { return TestResult::Failed };
    let Some(aspace) = process.aspace() else { return TestResult::Failed };
    kcheck!(mmap::map_stack(&aspace, USER_STACK_TOP, USER_STACK_PAGES).is_ok(), "stack mapeada");
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let handler = Disposition::Handler {
        handler: 0x40_1000,
        mask: Signal::SIGUSR2.bit(),
        flags: SigActionFlags::RESTORER,
        restorer: 0x40_2000,
    };
    let _ = process.actions.lock().set(Signal::SIGUSR1, handler);
    me.thread.signals.lock().raise(Signal::SIGUSR1);

    let sp = USER_STACK_TOP - 256;
    let mut frame = TrapFrame::new_user(0x40_0000, sp, 0, 0);
    delivery::deliver_pending(&me.thread, &mut frame);

    let in_handler = frame.ip() == 0x40_1000;
    let signo = frame.syscall_arg(0);
    let frame_addr = frame.syscall_arg(2);
    let blocked = me.thread.signals.lock().blocked();

    // O restorer chama sigreturn com o sp no frame salvo.
    frame.set_sp(frame_addr);
    let restored = delivery::sigreturn(&mut frame);
    let blocked_after = me.thread.signals.lock().blocked();
    drop(me);

    kcheck!(in_handler, "ip no handler");
    kcheck!(signo == Signal::SIGUSR1.number() as usize, "número do sinal no primeiro argumento");
    kcheck!(frame_addr < sp - 128 && frame_addr % 16 == 0, "frame abaixo da red zone, alinhado");
    kcheck!(blocked & Signal::SIGUSR1.bit() != 0, "sinal bloqueado durante o handler");
    kcheck!(blocked & Signal::SIGUSR2.bit() != 0, "máscara do handler aplicada");
    kcheck!(restored.is_ok(), "sigreturn aceito");
    kcheck!(frame.ip() == 0x40_0000 && frame.sp() == sp, "contexto restaurado");
    kcheck!(blocked_after == 0, "máscara restaurada");
    finish(&process);
    TestResult::Passed
}

fn test_default_terminate() -> TestResult {
    let Ok(process) = user_process("sigterm") else { return TestResult::Failed };
    let Ok(me) = adopt(&process) else { return TestResult::Failed };
    signal::send(&process, Signal::SIGTERM);
    let mut frame = TrapFrame::new_user(0x40_0000, USER_STACK_TOP, 0, 0);
    delivery::deliver_pending(&me.thread, &mut frame);
    let dead = me.thread.is_dead();
    drop(me);

    kcheck!(dead, "thread morta pelo sinal");
    kcheck!(
        process.exit_status() == Some(ExitStatus::Signaled { signal: Signal::SIGTERM, core: false }),
        "status de sinal"
    );
    kcheck!(crate::sched::wait_for_process(process.pid()) == Ok(128 + 15), "código 128 + sinal");
    TestResult::Passed
}

fn test_restart_without_handler() -> TestResult {
    let Ok(process) = user_process("restart") else { return TestResult::Failed };
    let Ok(me) = adopt(&process) else { return TestResult::Failed };
    let mut frame = TrapFrame::new_user(0x40_0010, USER_STACK_TOP, 0, 0);
    me.thread.set_restart(5, 77);
    signal::send(&process, Signal::SIGCHLD);
    delivery::deliver_pending(&me.thread, &mut frame);
    let nr = frame.syscall_number();
    let arg0 = frame.syscall_arg(0);
    let alive = !me.thread.is_dead();
    drop(me);

    kcheck!(alive, "SIGCHLD ignorado por padrão");
    kcheck!(nr == 5 && arg0 == 77, "syscall reexecutada");
    finish(&process);
    TestResult::Passed
}

fn test_create_and_join_thread() -> TestResult {
    let Ok(process) = user_process("threads") else { return TestResult::Failed };
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let created = crate::sched::create_thread(0x40_1000, 42, 0);
    let Ok(tid) = created else { return TestResult::Failed };
    let worker = table::thread(tid);
    let stack = worker.as_ref().and_then(|t| t.user_stack());
    let arg = worker.as_ref().and_then(|t| t.start_frame()).map(|f| f.syscall_arg(0));
    if let Some(worker) = &worker {
        worker.mark_dead(5);
    }
    let joined = crate::sched::wait_for_thread(tid);
    let self_join = crate::sched::wait_for_thread(me.thread.tid());
    drop(me);

    kcheck!(worker.is_some(), "thread na tabela");
    kcheck!(stack.is_some_and(|s| s.top < USER_STACK_TOP), "stack própria abaixo da principal");
    kcheck!(arg == Some(42), "argumento no primeiro registrador");
    kcheck!(joined == Ok(5), "código da thread");
    kcheck!(self_join == Err(TaskError::NotChild), "não espera por si mesma");
    finish(&process);
    TestResult::Passed
}

// === exec ===

const ELF_VADDR: usize = 0x40_0000;
const ELF_CODE: [u8; 8] = [0x90, 0x90, 0x90, 0x90, 0xEB, 0xFE, 0x00, 0x00];

#[cfg(target_arch = "riscv64")]
const ELF_MACHINE: u16 = 243;
#[cfg(not(target_arch = "riscv64"))]
const ELF_MACHINE: u16 = 62;

/// ELF64 mínimo: um PT_LOAD RW cobrindo o arquivo inteiro e mais duas páginas de .bss.
fn tiny_elf() -> Vec<u8> {
    let ehsize = 64usize;
    let phentsize = 56usize;
    let entry = ELF_VADDR + ehsize + phentsize;
    let file_size = ehsize + phentsize + ELF_CODE.len();
    let mem_size = 2 * PAGE_SIZE + 0x100;

    let mut elf = Vec::with_capacity(file_size);
    elf.extend_from_slice(&[0x7F, b'E', b'L', b'F', 2, 1, 1, 0]);
    elf.extend_from_slice(&[0; 8]);
    elf.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    elf.extend_from_slice(&ELF_MACHINE.to_le_bytes());
    elf.extend_from_slice(&1u32.to_le_bytes());
    elf.extend_from_slice(&(entry as u64).to_le_bytes());
    elf.extend_from_slice(&(ehsize as u64).to_le_bytes()); // phoff
    elf.extend_from_slice(&0u64.to_le_bytes()); // shoff
    elf.extend_from_slice(&0u32.to_le_bytes());
    elf.extend_from_slice(&(ehsize as u16).to_le_bytes());
    elf.extend_from_slice(&(phentsize as u16).to_le_bytes());
    elf.extend_from_slice(&1u16.to_le_bytes()); // phnum
    elf.extend_from_slice(&64u16.to_le_bytes());
    elf.extend_from_slice(&0u16.to_le_bytes());
    elf.extend_from_slice(&0u16.to_le_bytes());

    elf.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
    elf.extend_from_slice(&6u32.to_le_bytes()); // R|W
    elf.extend_from_slice(&0u64.to_le_bytes()); // offset
    elf.extend_from_slice(&(ELF_VADDR as u64).to_le_bytes());
    elf.extend_from_slice(&(ELF_VADDR as u64).to_le_bytes());
    elf.extend_from_slice(&(file_size as u64).to_le_bytes());
    elf.extend_from_slice(&(mem_size as u64).to_le_bytes());
    elf.extend_from_slice(&(PAGE_SIZE as u64).to_le_bytes());

    elf.extend_from_slice(&ELF_CODE);
    elf
}

fn install_file(path: &str, data: &[u8]) -> bool {
    let _ = vfs::mkdir(None, "/tmp/sched_exec");
    let flags = OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE;
    match vfs::open(None, path, flags) {
        Ok(file) => file.write(data) == Ok(data.len()),
        Err(_) => false,
    }
}

fn test_load_image_segments_and_stack() -> TestResult {
    let path = "/tmp/sched_exec/tiny";
    kcheck!(install_file(path, &tiny_elf()), "executável gravado no tmpfs");

    let argv = alloc::vec![String::from("tiny"), String::from("-v")];
    let envp = alloc::vec![String::from("HOME=/")];
    let Ok(image) = exec::load_image(None, path, &argv, &envp) else { return TestResult::Failed };
    let aspace = &image.aspace;

    kcheck!(image.entry == ELF_VADDR + 120, "entrada do cabeçalho", image.entry);
    let mut code = [0u8; 8];
    kcheck!(crate::mm::usercopy::copy_from_user(aspace, image.entry, &mut code).is_ok(), "entrada mapeada");
    kcheck!(code == ELF_CODE, "código vem do arquivo");
    kcheck!(read_user::<u64>(aspace, ELF_VADDR + 2 * PAGE_SIZE) == Ok(0), ".bss zerado");
    kcheck!(write_user(aspace, ELF_VADDR + PAGE_SIZE, &7u64).is_ok(), ".bss gravável");

    let sp = image.stack.sp;
    kcheck!(sp % 16 == 0 && sp < USER_STACK_TOP, "sp alinhado abaixo do topo", sp);
    kcheck!(read_user::<usize>(aspace, sp) == Ok(2), "argc");
    let Ok(arg1) = read_user::<usize>(aspace, sp + 2 * core::mem::size_of::<usize>()) else {
        return TestResult::Failed;
    };
    let arg1 = crate::mm::usercopy::read_user_string(aspace, arg1, 16);
    kcheck!(arg1.as_deref() == Ok("-v"), "argv[1] na stack");
    kcheck!(read_user::<usize>(aspace, sp + 3 * core::mem::size_of::<usize>()) == Ok(0), "argv termina em NULL");
    TestResult::Passed
}

fn test_exec_replaces_image() -> TestResult {
    let path = "/tmp/sched_exec/replace";
    kcheck!(install_file(path, &tiny_elf()), "executável gravado no tmpfs");
    let Ok(process) = user_process("antes") else { return TestResult::Failed };
    let before = process.aspace();
    let Ok(me) = adopt(&process) else { return TestResult::Failed };

    let mut frame = TrapFrame::new_user(0x1234, USER_STACK_TOP, 0, 0);
    let argv = alloc::vec![String::from("replace")];
    let result = exec::exec(&mut frame, path, argv, Vec::new());
    let after = process.aspace();
    drop(me);

    kcheck!(result.is_ok(), "exec de um ELF válido");
    kcheck!(frame.ip() == ELF_VADDR + 120, "contexto aponta para a entrada", frame.ip());
    kcheck!(process.name() == "replace", "nome vira o basename");
    kcheck!(process.args().argv.len() == 1, "argv guardado no processo");
    let replaced = match (&before, &after) {
        (Some(a), Some(b)) => !Arc::ptr_eq(a, b),
        _ => false,
    };
    kcheck!(replaced, "address space novo");
    finish(&process);
    TestResult::Passed
}

fn test_load_image_rejects_garbage() -> TestResult {
    let path = "/tmp/sched_exec/garbage";
    kcheck!(install_file(path, b"#!/bin/sh\necho oi\n"), "arquivo gravado");
    let result = exec::load_image(None, path, &[], &[]).map(|_| ());
    kcheck!(result == Err(TaskError::BadExecutable), "texto não é ELF");

    let mut wrong_machine = tiny_elf();
    wrong_machine[18] = 0xFF;
    kcheck!(install_file(path, &wrong_machine), "arquivo regravado");
    let result = exec::load_image(None, path, &[], &[]).map(|_| ());
    kcheck!(result == Err(TaskError::BadExecutable), "máquina errada");

    let empty = "/tmp/sched_exec/empty";
    kcheck!(install_file(empty, &[]), "arquivo vazio");
    let result = exec::load_image(None, empty, &[], &[]).map(|_| ());
    kcheck!(result == Err(TaskError::BadExecutable), "arquivo vazio");
    TestResult::Passed
}
