//! Núcleo do scheduler: escolha, despacho, bloqueio e colheita.
//!
//! Cada CPU roda o loop de [`run`] na stack do scheduler. Threads nunca trocam de
//! stack diretamente entre si: saem sempre para a stack do scheduler
//! (`reschedule`), que escolhe a próxima pela política ativa.
//!
//! Na plataforma hospedada não existe troca de stack: a thread do hospedeiro que
//! bloqueia gira sobre a própria condição até ela ser satisfeita.

pub mod cpu;
pub mod policy;

pub use cpu::{online_cpus, CpuLocal, CPUS};
pub use policy::{NaivePolicy, SchedulerPolicy};

use crate::arch::{Cpu, CpuOps};
use crate::sched::sync::WaitCondition;
use crate::sched::task::{table, Thread, ThreadState};
use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU64, Ordering};
use spin::Once;

static POLICY: Once<Box<dyn SchedulerPolicy>> = Once::new();
static TICKS: AtomicU64 = AtomicU64::new(0);

/// Resultado de um bloqueio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// A condição foi satisfeita (ou a waitlist acordou a thread).
    Woken,
    /// Sinal pendente ou thread morta.
    Interrupted,
}

/// Escolhe a política pelo nome. Só a primeira escolha vale.
pub fn init_policy(name: &str) {
    let chosen = match policy::by_name(name) {
        Some(policy) => policy,
        None => {
            crate::kwarn!("(Sched) Política desconhecida, usando naive: ", str name);
            Box::new(NaivePolicy::new())
        }
    };
    let active = POLICY.call_once(|| chosen);
    crate::kinfo!("(Sched) Política de escalonamento: ", str active.name());
}

pub fn policy() -> &'static dyn SchedulerPolicy {
    POLICY.call_once(|| Box::new(NaivePolicy::new())).as_ref()
}

pub fn ticks() -> u64 {
    TICKS.load(Ordering::Relaxed)
}

pub fn current() -> Option<Arc<Thread>> {
    CPUS.get().current()
}

/// Troca a thread corrente desta CPU (boot e plataforma hospedada).
pub fn set_current(thread: Option<Arc<Thread>>) -> Option<Arc<Thread>> {
    CPUS.get().set_current(thread)
}

/// Torna a thread escolhível: entra na tabela, no processo e na política.
pub fn enqueue_new(thread: Arc<Thread>) {
    table::insert_thread(thread.clone());
    thread.process().add_thread(thread.clone());
    thread.mark_created();
    policy().enqueue(thread);
}

/// Transição para `Running`, se a thread pode rodar. `Some(interrompida)`.
///
/// Uma thread bloqueada só passa se a condição foi satisfeita ou se há sinal
/// pendente; a condição é removida nos dois casos. Uma thread morta que ainda tem
/// stack de kernel em uso roda de novo para desempilhar até `return_to_user`.
fn transition_to_running(thread: &Thread) -> Option<(bool, Option<WaitCondition>)> {
    let mut state = thread.state_lock();
    match *state {
        ThreadState::Created | ThreadState::Ready => {
            *state = ThreadState::Running;
            Some((false, None))
        }
        ThreadState::Blocked => {
            if thread.wait_satisfied() {
                *state = ThreadState::Running;
                Some((false, thread.take_wait()))
            } else if thread.has_deliverable_signal() {
                *state = ThreadState::Running;
                Some((true, thread.take_wait()))
            } else {
                None
            }
        }
        ThreadState::Dead if thread.needs_unwind() => Some((true, thread.take_wait())),
        _ => None,
    }
}

/// Reivindica `thread` para esta CPU e a coloca em `Running`.
pub(crate) fn claim_for_run(thread: &Thread) -> Option<()> {
    if !thread.claim_cpu() {
        return None;
    }
    match transition_to_running(thread) {
        Some((interrupted, wait)) => {
            drop(wait);
            if interrupted {
                thread.set_interrupted();
            }
            thread.reset_quantum();
            Some(())
        }
        None => {
            thread.release_cpu();
            None
        }
    }
}

/// Tick do timer: avança o relógio e consome o quantum da thread corrente.
pub fn timer_tick() {
    TICKS.fetch_add(1, Ordering::Relaxed);
    let cpu = CPUS.get();
    if let Some(thread) = cpu.current() {
        if thread.tick() {
            cpu.request_resched();
        }
    }
}

/// O quantum da thread corrente acabou?
pub fn take_resched() -> bool {
    CPUS.get().take_resched()
}

/// Cede a CPU. A thread corrente volta para `Ready` (se estava `Running`).
pub fn reschedule() {
    let Some(thread) = current() else {
        Cpu::relax();
        return;
    };
    {
        let mut state = thread.state_lock();
        if *state == ThreadState::Running {
            *state = ThreadState::Ready;
        }
    }
    switch_to_scheduler(thread);
}

/// Anexa `wc`, bloqueia e volta quando a condição for satisfeita.
pub fn reschedule_for_wait_condition(wc: WaitCondition) -> WakeReason {
    let Some(thread) = current() else {
        // Boot: sem thread para bloquear, espera ativa.
        while !wc.verify() {
            Cpu::relax();
        }
        return WakeReason::Woken;
    };
    thread.set_wait(wc);
    {
        let mut state = thread.state_lock();
        if *state == ThreadState::Dead {
            drop(state);
            drop(thread.take_wait());
            return WakeReason::Interrupted;
        }
        *state = ThreadState::Blocked;
    }
    block_current(&thread)
}

/// A thread corrente já está `Blocked` (waitlist ou condição): sai da CPU.
pub fn block_current(thread: &Arc<Thread>) -> WakeReason {
    let reason = block_platform(thread);
    if reason == WakeReason::Interrupted || thread.take_interrupted() {
        WakeReason::Interrupted
    } else {
        WakeReason::Woken
    }
}

#[cfg(target_os = "none")]
fn block_platform(thread: &Arc<Thread>) -> WakeReason {
    switch_to_scheduler(thread.clone());
    WakeReason::Woken
}

#[cfg(not(target_os = "none"))]
fn block_platform(thread: &Arc<Thread>) -> WakeReason {
    loop {
        if thread.state() == ThreadState::Dead {
            drop(thread.take_wait());
            return WakeReason::Interrupted;
        }
        if let Some((interrupted, wait)) = transition_to_running(thread) {
            drop(wait);
            return if interrupted { WakeReason::Interrupted } else { WakeReason::Woken };
        }
        Cpu::relax();
    }
}

/// Volta para a stack do scheduler; retorna quando a thread for escolhida de novo.
#[cfg(target_os = "none")]
fn switch_to_scheduler(thread: Arc<Thread>) {
    let were_enabled = Cpu::are_interrupts_enabled();
    Cpu::disable_interrupts();
    let slot = thread.saved_sp_slot();
    // A referência da CPU mantém a thread viva; a da stack some antes da troca.
    drop(thread);
    let cpu = CPUS.get();
    // SAFETY: `scheduler_sp` foi salvo no despacho desta thread.
    unsafe { crate::arch::platform::switch::switch_stack(slot, cpu.scheduler_sp()) };
    if were_enabled {
        Cpu::enable_interrupts();
    }
}

#[cfg(not(target_os = "none"))]
fn switch_to_scheduler(thread: Arc<Thread>) {
    Cpu::relax();
    let mut state = thread.state_lock();
    if *state == ThreadState::Ready {
        *state = ThreadState::Running;
    }
}

/// Sai da CPU pela última vez: a thread corrente está morta.
pub fn park_dead() {
    let Some(thread) = current() else { return };
    thread.park();
    crate::ktrace!("(Sched) Thread estacionada: tid=", thread.tid().0 as u64);
    switch_to_scheduler(thread);
    // Só volta na plataforma hospedada.
}

/// Entrada de toda thread de kernel (primeira execução).
pub extern "C" fn kernel_thread_start() -> ! {
    if let Some(thread) = current() {
        if let Some((entry, arg)) = thread.kernel_entry() {
            drop(thread);
            Cpu::enable_interrupts();
            entry(arg);
        }
    }
    crate::sched::exit_current_thread(0);
    loop {
        Cpu::halt();
    }
}

/// Colhe as threads mortas. Um processo morto sem threads perde o address space.
pub fn reap_dead() -> usize {
    let dead: Vec<Arc<Thread>> = policy().threads().into_iter().filter(|t| t.is_reapable()).collect();
    let count = dead.len();
    for thread in dead {
        policy().remove(&thread);
        table::remove_thread(thread.tid());
        drop(thread.take_wait());
        let process = thread.process().clone();
        if process.remove_thread(&thread) == 0 && process.has_exited() {
            let aspace = process.replace_aspace(None);
            crate::kdebug!("(Sched) Address space liberado: pid=", process.pid().0 as u64);
            drop(aspace);
        }
    }
    count
}

#[cfg(target_os = "none")]
fn dispatch(cpu: &CpuLocal, thread: Arc<Thread>) {
    use crate::arch::platform::switch;
    use crate::sched::task::SwitchFlags;

    let start = thread.take_start_frame();
    let flags = thread.switch_flags(start.is_some());
    match thread.process().aspace() {
        Some(aspace) => aspace.activate(),
        None => crate::mm::paging::switch_to(crate::mm::paging::kernel_root()),
    }
    cpu.set_current(Some(thread.clone()));
    cpu.count_switch();

    let slot = cpu.scheduler_sp_slot();
    // SAFETY: a thread foi reivindicada para esta CPU; sua stack de kernel é exclusiva.
    unsafe {
        match (flags, start) {
            (f, Some(frame)) if f.intersects(SwitchFlags::START_USER | SwitchFlags::START_KERNEL) => {
                switch::enter_frame(slot, thread.kstack_top(), &frame)
            }
            _ => {
                switch::prepare_resume(thread.kstack_top());
                switch::switch_stack(slot, thread.saved_sp());
            }
        }
    }

    cpu.set_current(None);
    thread.release_cpu();
}

/// Loop do scheduler desta CPU. Roda na stack de boot da CPU, que vira a stack do
/// scheduler.
#[cfg(target_os = "none")]
pub fn run() -> ! {
    let cpu = CPUS.get();
    cpu.set_online();
    crate::kinfo!("(Sched) CPU entrando no scheduler: ", Cpu::current_id() as u64);

    loop {
        Cpu::disable_interrupts();
        reap_dead();
        let next = policy()
            .pick_next()
            .or_else(|| cpu.idle().filter(|idle| claim_for_run(idle).is_some()));
        match next {
            Some(thread) => dispatch(cpu, thread),
            None => {
                Cpu::enable_interrupts();
                Cpu::halt();
            }
        }
    }
}

/// Corpo da thread ociosa de cada CPU.
pub fn idle_loop(_arg: usize) {
    loop {
        Cpu::enable_interrupts();
        Cpu::halt();
        reschedule();
    }
}
