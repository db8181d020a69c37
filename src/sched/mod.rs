//! # Tarefas e Escalonamento
//!
//! Processos, threads, o scheduler de cada CPU, sinais, `fork` e `exec`.
//!
//! ## Modelo
//! - Um [`Process`](task::Process) é dono do address space, dos descritores e das
//!   disposições de sinal. Threads compartilham tudo isso.
//! - Cada [`Thread`](task::Thread) tem stack de kernel própria e roda na CPU que a
//!   reivindicou; a política ativa (`scheduler=` na cmdline) só decide a ordem.
//! - Bloqueios passam sempre por [`WaitCondition`](sync::WaitCondition) ou
//!   [`Waitlist`](sync::Waitlist); o scheduler reavalia a condição antes de despachar.
//!
//! ## Ciclo de vida
//! `Creating → Created → Ready ⇄ Running → Blocked → ... → Dead`. Uma thread morta
//! só é colhida depois de sair da CPU pela última vez; o processo vira zumbi até
//! `wait_for_process` recolher o status.

pub mod config;
pub mod core;
pub mod error;
pub mod exec;
pub mod fork;
pub mod signal;
pub mod sync;
pub mod task;

#[cfg(any(test, feature = "self_test"))]
pub mod test;

pub use self::core::{online_cpus, reschedule_for_wait_condition, ticks, timer_tick, WakeReason};
pub use error::{TaskError, TaskResult};

use crate::arch::{TrapFrame, UserContext};
use crate::fs::FdTable;
use crate::mm::config::{USER_STACK_PAGES, USER_STACK_STRIDE, USER_STACK_TOP};
use crate::mm::{mmap, AddressSpace, MmError};
use crate::sched::signal::Signal;
use crate::sched::sync::WaitOutcome;
use crate::sched::task::{table, ExitStatus, KernelEntry, Process, Thread, UserStack};
use crate::sys::{Pid, Tid};
use alloc::sync::Arc;

/// Pilhas extras tentadas por `create_thread` antes de desistir.
const MAX_THREAD_STACKS: usize = 256;

/// Inicializa o scheduler: política, processos do kernel e a thread ociosa do BSP.
pub fn init(policy: &str) {
    self::core::init_policy(policy);

    let kernel = Process::new(Pid::KERNEL, None, "kernel", None, FdTable::new());
    let kthreadd = Process::new(Pid::KTHREADD, None, "kthreadd", None, FdTable::new());
    table::insert_process(kernel);
    table::insert_process(kthreadd);

    if let Err(e) = init_cpu() {
        crate::kerror!("(Sched) Falha ao criar a thread ociosa: ", str e.as_str());
    }
    crate::kinfo!("(Sched) Scheduler pronto");
}

/// Cria a thread ociosa da CPU corrente (BSP no boot, APs ao entrar no scheduler).
pub fn init_cpu() -> TaskResult<()> {
    let kernel = table::process(Pid::KERNEL).ok_or(TaskError::NoSuchProcess)?;
    let tid = table::allocate_tid().ok_or(TaskError::Memory(MmError::OutOfMemory))?;
    let idle = Thread::new_kernel(tid, kernel.clone(), self::core::idle_loop, 0)?;
    idle.mark_created();
    table::insert_thread(idle.clone());
    kernel.add_thread(idle.clone());
    self::core::CPUS.get().set_idle(idle);
    Ok(())
}

pub fn current() -> Option<Arc<Thread>> {
    self::core::current()
}

pub fn current_tid() -> Option<Tid> {
    current().map(|t| t.tid())
}

pub fn current_process() -> Option<Arc<Process>> {
    current().map(|t| t.process().clone())
}

/// Address space do processo corrente.
pub fn current_aspace() -> TaskResult<Arc<AddressSpace>> {
    current_process().and_then(|p| p.aspace()).ok_or(TaskError::NoCurrentThread)
}

/// Cede a CPU voluntariamente.
pub fn yield_now() {
    self::core::reschedule();
}

/// Loga a thread corrente (usado pelo panic).
pub fn dump_current() {
    match current() {
        Some(thread) => {
            let process = thread.process();
            crate::kerror!("(Sched) Thread corrente: tid=", thread.tid().0 as u64);
            crate::kerror!("(Sched) Processo: pid=", process.pid().0 as u64);
            crate::kerror!("(Sched) Nome: ", str process.name().as_str());
        }
        None => crate::kerror!("(Sched) Sem thread corrente"),
    }
}

/// Último passo antes de voltar ao modo usuário (fim de trap ou syscall).
///
/// Threads mortas saem da CPU aqui; sinais pendentes são entregues e o quantum
/// esgotado vira um `reschedule`.
pub fn return_to_user(frame: &mut TrapFrame) {
    loop {
        let Some(thread) = current() else { return };
        if thread.is_dead() {
            self::core::park_dead();
            return;
        }
        signal::delivery::deliver_pending(&thread, frame);
        if thread.is_dead() {
            continue;
        }
        if self::core::take_resched() {
            drop(thread);
            self::core::reschedule();
            continue;
        }
        return;
    }
}

/// Termina `process`: marca as threads mortas, fecha os descritores, reparenta os
/// filhos para o init e avisa quem espera.
///
/// Só a primeira chamada tem efeito; o status fica guardado até o pai colher.
pub fn process_exit(process: &Arc<Process>, status: ExitStatus) {
    if process.is_kernel() || !process.set_exit_status(status) {
        return;
    }
    let code = status.code();
    crate::kinfo!("(Sched) Processo terminou: pid=", process.pid().0 as u64);
    crate::kdebug!("(Sched) Código de saída: ", code as u64);

    let threads = process.threads().clone();
    for thread in &threads {
        thread.mark_dead(code);
    }
    drop(threads);

    let mut files = ::core::mem::take(&mut *process.files.lock());
    files.close_all();
    process.set_cwd(None);
    process.set_stopped(false);

    for child in table::children(process.pid()) {
        child.set_parent(Some(Pid::INIT));
        if child.has_exited() {
            if let Some(init) = table::process(Pid::INIT) {
                signal::send(&init, Signal::SIGCHLD);
            }
        }
    }

    if process.threads().is_empty() {
        drop(process.replace_aspace(None));
    }
    process.waiters().close();

    if let Some(parent) = process.parent().and_then(table::process) {
        signal::send(&parent, Signal::SIGCHLD);
    }
}

/// `exit`: termina o processo corrente inteiro.
pub fn exit_current(status: ExitStatus) {
    if let Some(process) = current_process() {
        process_exit(&process, status);
    }
    self::core::park_dead();
}

/// Termina só a thread corrente. A última thread viva leva o processo junto.
pub fn exit_current_thread(code: i32) {
    let Some(thread) = current() else { return };
    if !thread.mark_dead(code) {
        drop(thread);
        self::core::park_dead();
        return;
    }
    let process = thread.process().clone();
    crate::ktrace!("(Sched) Thread terminou: tid=", thread.tid().0 as u64);

    if process.live_threads() == 0 {
        process_exit(&process, ExitStatus::Exited(code));
    } else if let (Some(stack), Some(aspace)) = (thread.user_stack(), process.aspace()) {
        // A stack principal vive até o exec/exit; as de `create_thread` saem aqui.
        if stack.top != USER_STACK_TOP {
            if let Err(e) = mmap::unmap_stack(&aspace, stack.top, stack.npages) {
                crate::kwarn!("(Sched) Falha ao liberar stack de thread: ", str e.as_str());
            }
        }
    }
    drop(thread);
    self::core::park_dead();
}

/// Espera o processo `pid` terminar e o colhe. Devolve o código de saída.
///
/// Uma segunda espera pelo mesmo pid falha com `NoSuchProcess`.
pub fn wait_for_process(pid: Pid) -> TaskResult<i32> {
    let process = table::process(pid).ok_or(TaskError::NoSuchProcess)?;
    if process.is_kernel() || current_process().is_some_and(|me| me.pid() == pid) {
        return Err(TaskError::NotChild);
    }

    while !process.has_exited() {
        if process.waiters().wait() == WaitOutcome::Interrupted {
            return Err(TaskError::Interrupted);
        }
    }

    self::core::reap_dead();
    // Só um dos que esperam colhe o zumbi.
    table::remove_process(pid).ok_or(TaskError::NoSuchProcess)?;
    let status = process.exit_status().ok_or(TaskError::NoSuchProcess)?;
    crate::kdebug!("(Sched) Processo colhido: pid=", pid.0 as u64);
    Ok(status.code())
}

/// Nova thread no processo corrente começando em `entry(arg)`.
///
/// Com `stack_top == 0` o kernel mapeia uma stack abaixo da principal.
pub fn create_thread(entry: usize, arg: usize, stack_top: usize) -> TaskResult<Tid> {
    let process = current_process().ok_or(TaskError::NoCurrentThread)?;
    let aspace = process.aspace().ok_or(TaskError::NoCurrentThread)?;
    let stack = if stack_top == 0 { Some(allocate_thread_stack(&aspace)?) } else { None };
    let top = stack.map_or(stack_top, |s| s.top);

    let tid = table::allocate_tid().ok_or(TaskError::Memory(MmError::OutOfMemory))?;
    let frame = TrapFrame::new_user(entry, top & !0xF, arg, 0);
    let thread = match Thread::new_user(tid, process, frame, stack) {
        Ok(thread) => thread,
        Err(e) => {
            if let Some(stack) = stack {
                let _ = mmap::unmap_stack(&aspace, stack.top, stack.npages);
            }
            return Err(e);
        }
    };
    self::core::enqueue_new(thread);
    crate::kdebug!("(Sched) Thread criada: tid=", tid.0 as u64);
    Ok(tid)
}

fn allocate_thread_stack(aspace: &AddressSpace) -> TaskResult<UserStack> {
    for k in 1..=MAX_THREAD_STACKS {
        let top = USER_STACK_TOP - k * USER_STACK_STRIDE;
        match mmap::map_stack(aspace, top, USER_STACK_PAGES) {
            Ok(_) => return Ok(UserStack { top, npages: USER_STACK_PAGES }),
            Err(MmError::OutOfMemory) => return Err(MmError::OutOfMemory.into()),
            Err(_) => continue,
        }
    }
    Err(MmError::NoVirtualSpace.into())
}

/// Espera uma thread do próprio processo terminar. Devolve o código dela.
pub fn wait_for_thread(tid: Tid) -> TaskResult<i32> {
    let me = current().ok_or(TaskError::NoCurrentThread)?;
    let thread = table::thread(tid).ok_or(TaskError::NoSuchThread)?;
    if !Arc::ptr_eq(thread.process(), me.process()) {
        return Err(TaskError::NoSuchThread);
    }
    if Arc::ptr_eq(&thread, &me) {
        return Err(TaskError::NotChild);
    }
    drop(me);
    while !thread.is_dead() {
        if thread.exit_waiters().wait() == WaitOutcome::Interrupted {
            return Err(TaskError::Interrupted);
        }
    }
    Ok(thread.exit_code())
}

/// Thread de kernel sob o `kthreadd`.
pub fn spawn_kernel_thread(entry: KernelEntry, arg: usize) -> TaskResult<Tid> {
    let kthreadd = table::process(Pid::KTHREADD).ok_or(TaskError::NoSuchProcess)?;
    let tid = table::allocate_tid().ok_or(TaskError::Memory(MmError::OutOfMemory))?;
    let thread = Thread::new_kernel(tid, kthreadd, entry, arg)?;
    self::core::enqueue_new(thread);
    Ok(tid)
}

/// Envia `sig` ao processo `pid` (`kill`).
pub fn kill(pid: Pid, sig: usize) -> TaskResult<()> {
    signal::kill(pid, sig)
}
