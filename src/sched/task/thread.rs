//! Thread: unidade de execução escalonável.

use super::process::Process;
use super::state::{SwitchFlags, ThreadMode, ThreadState};
use crate::arch::TrapFrame;
use crate::mm::config::PAGE_SIZE;
use crate::mm::{hhdm, pmm, MmError, Pfn};
use crate::sched::config::{DEFAULT_QUANTUM, KERNEL_STACK_PAGES};
use crate::sched::signal::SignalState;
use crate::sched::sync::{WaitCondition, Waitlist};
use crate::sched::{TaskError, TaskResult};
use crate::sync::{Spinlock, SpinlockGuard};
use crate::sys::Tid;
use alloc::sync::Arc;
use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};

/// Stack de kernel de uma thread (frames contíguos vistos pelo direct map).
pub struct KernelStack {
    base: Pfn,
}

impl KernelStack {
    fn new() -> TaskResult<Self> {
        let base = pmm::try_allocate(KERNEL_STACK_PAGES).ok_or(TaskError::Memory(MmError::OutOfMemory))?;
        Ok(Self { base })
    }

    pub fn top(&self) -> usize {
        hhdm::pfn_to_virt::<u8>(self.base) as usize + KERNEL_STACK_PAGES * PAGE_SIZE
    }
}

impl Drop for KernelStack {
    fn drop(&mut self) {
        pmm::unref_range(self.base, KERNEL_STACK_PAGES);
    }
}

/// Stack de usuário mapeada para a thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserStack {
    pub top: usize,
    pub npages: usize,
}

/// Ponto de entrada de uma thread de kernel.
pub type KernelEntry = fn(usize);

/// Slot onde o sp de kernel é salvo quando a thread sai da CPU.
struct SavedSp(UnsafeCell<usize>);

// SAFETY: só a CPU que tem `on_cpu` da thread escreve no slot.
unsafe impl Sync for SavedSp {}

pub struct Thread {
    tid: Tid,
    process: Arc<Process>,
    mode: ThreadMode,
    state_lock: Spinlock<ThreadState>,
    wait: Spinlock<Option<WaitCondition>>,
    /// Saiu do bloqueio sem que a condição fosse satisfeita (sinal ou morte).
    interrupted: AtomicBool,
    /// Alguma CPU está executando (ou acabou de sair de) a stack desta thread.
    on_cpu: AtomicBool,
    /// Morta e fora da própria stack para sempre: pode ser colhida.
    parked: AtomicBool,
    kstack: KernelStack,
    saved_sp: SavedSp,
    /// Contexto da primeira execução (consumido no primeiro dispatch).
    start: Spinlock<Option<TrapFrame>>,
    kernel_entry: Option<(KernelEntry, usize)>,
    user_stack: Spinlock<Option<UserStack>>,
    pub signals: Spinlock<SignalState>,
    quantum: AtomicU64,
    exit_code: AtomicI32,
    exit_waiters: Waitlist,
    /// Syscall interrompida com ERESTARTSYS: (número, primeiro argumento).
    restart: Spinlock<Option<(usize, usize)>>,
}

impl Thread {
    fn build(tid: Tid, process: Arc<Process>, mode: ThreadMode, kernel_entry: Option<(KernelEntry, usize)>) -> TaskResult<Self> {
        Ok(Self {
            tid,
            process,
            mode,
            state_lock: Spinlock::new(ThreadState::Creating),
            wait: Spinlock::new(None),
            interrupted: AtomicBool::new(false),
            on_cpu: AtomicBool::new(false),
            parked: AtomicBool::new(false),
            kstack: KernelStack::new()?,
            saved_sp: SavedSp(UnsafeCell::new(0)),
            start: Spinlock::new(None),
            kernel_entry,
            user_stack: Spinlock::new(None),
            signals: Spinlock::new(SignalState::new()),
            quantum: AtomicU64::new(DEFAULT_QUANTUM),
            exit_code: AtomicI32::new(0),
            exit_waiters: Waitlist::new(),
            restart: Spinlock::new(None),
        })
    }

    /// Thread de usuário que começa em `frame`. Fica em `Creating` até `mark_created`.
    pub fn new_user(tid: Tid, process: Arc<Process>, frame: TrapFrame, stack: Option<UserStack>) -> TaskResult<Arc<Self>> {
        let thread = Self::build(tid, process, ThreadMode::User, None)?;
        *thread.start.lock() = Some(frame);
        *thread.user_stack.lock() = stack;
        Ok(Arc::new(thread))
    }

    /// Thread de kernel que executa `entry(arg)`.
    pub fn new_kernel(tid: Tid, process: Arc<Process>, entry: KernelEntry, arg: usize) -> TaskResult<Arc<Self>> {
        let thread = Self::build(tid, process, ThreadMode::Kernel, Some((entry, arg)))?;
        let sp = (thread.kstack.top() - core::mem::size_of::<TrapFrame>() - 64) & !0xF;
        let frame = TrapFrame::new_kernel(crate::sched::core::kernel_thread_start as usize, sp, 0);
        *thread.start.lock() = Some(frame);
        Ok(Arc::new(thread))
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn process(&self) -> &Arc<Process> {
        &self.process
    }

    pub fn mode(&self) -> ThreadMode {
        self.mode
    }

    pub fn state(&self) -> ThreadState {
        *self.state_lock.lock()
    }

    /// Toda transição de estado acontece com este lock tomado.
    pub fn state_lock(&self) -> SpinlockGuard<'_, ThreadState> {
        self.state_lock.lock()
    }

    /// Creating → Created: a thread passa a ser escolhível.
    pub fn mark_created(&self) {
        let mut state = self.state_lock.lock();
        if *state == ThreadState::Creating {
            *state = ThreadState::Created;
        }
    }

    /// Marca Dead (qualquer estado). Devolve `false` se já estava morta.
    pub fn mark_dead(&self, code: i32) -> bool {
        {
            let mut state = self.state_lock.lock();
            if *state == ThreadState::Dead {
                return false;
            }
            *state = ThreadState::Dead;
            self.exit_code.store(code, Ordering::Release);
        }
        self.exit_waiters.close();
        true
    }

    pub fn is_dead(&self) -> bool {
        self.state() == ThreadState::Dead
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::Acquire)
    }

    pub fn exit_waiters(&self) -> &Waitlist {
        &self.exit_waiters
    }

    pub(crate) fn set_wait(&self, wc: WaitCondition) {
        *self.wait.lock() = Some(wc);
    }

    /// Remove a condição de espera. O chamador a destrói fora do `state_lock`.
    pub(crate) fn take_wait(&self) -> Option<WaitCondition> {
        self.wait.lock().take()
    }

    pub(crate) fn wait_satisfied(&self) -> bool {
        self.wait.lock().as_ref().is_some_and(|wc| wc.verify())
    }

    pub fn wait_name(&self) -> Option<&'static str> {
        self.wait.lock().as_ref().map(|wc| wc.name())
    }

    pub(crate) fn set_interrupted(&self) {
        self.interrupted.store(true, Ordering::Release);
    }

    pub(crate) fn take_interrupted(&self) -> bool {
        self.interrupted.swap(false, Ordering::AcqRel)
    }

    /// Reivindica a thread para uma CPU.
    pub(crate) fn claim_cpu(&self) -> bool {
        self.on_cpu
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }

    pub(crate) fn release_cpu(&self) {
        self.on_cpu.store(false, Ordering::Release);
    }

    pub fn is_on_cpu(&self) -> bool {
        self.on_cpu.load(Ordering::Acquire)
    }

    pub(crate) fn park(&self) {
        self.parked.store(true, Ordering::Release);
    }

    /// Já executou alguma vez (o contexto inicial foi consumido).
    pub fn has_started(&self) -> bool {
        self.start.lock().is_none()
    }

    /// Morta com uma stack de kernel em uso: precisa voltar a rodar para desempilhar.
    pub(crate) fn needs_unwind(&self) -> bool {
        self.has_started() && !self.parked.load(Ordering::Acquire)
    }

    /// Pode sair das tabelas: morta, fora de qualquer CPU e sem stack pendente.
    pub fn is_reapable(&self) -> bool {
        self.state() == ThreadState::Dead && !self.is_on_cpu() && !self.needs_unwind()
    }

    pub fn kstack_top(&self) -> usize {
        self.kstack.top()
    }

    pub(crate) fn saved_sp_slot(&self) -> *mut usize {
        self.saved_sp.0.get()
    }

    pub(crate) fn saved_sp(&self) -> usize {
        // SAFETY: lido pela CPU que reivindicou a thread, depois da escrita de quem a soltou.
        unsafe { *self.saved_sp.0.get() }
    }

    /// Contexto inicial, se a thread ainda não executou.
    pub(crate) fn take_start_frame(&self) -> Option<TrapFrame> {
        self.start.lock().take()
    }

    /// Cópia do contexto inicial (fork de uma thread que ainda não rodou, testes).
    pub fn start_frame(&self) -> Option<TrapFrame> {
        self.start.lock().clone()
    }

    pub fn kernel_entry(&self) -> Option<(KernelEntry, usize)> {
        self.kernel_entry
    }

    pub(crate) fn switch_flags(&self, starting: bool) -> SwitchFlags {
        match (starting, self.mode) {
            (false, _) => SwitchFlags::RESUME,
            (true, ThreadMode::User) => SwitchFlags::START_USER,
            (true, ThreadMode::Kernel) => SwitchFlags::START_KERNEL,
        }
    }

    pub fn user_stack(&self) -> Option<UserStack> {
        *self.user_stack.lock()
    }

    pub(crate) fn set_user_stack(&self, stack: Option<UserStack>) {
        *self.user_stack.lock() = stack;
    }

    pub(crate) fn reset_quantum(&self) {
        self.quantum.store(DEFAULT_QUANTUM, Ordering::Relaxed);
    }

    /// Consome um tick. Devolve `true` quando o quantum acabou.
    pub(crate) fn tick(&self) -> bool {
        let left = self.quantum.load(Ordering::Relaxed);
        if left <= 1 {
            self.quantum.store(0, Ordering::Relaxed);
            true
        } else {
            self.quantum.store(left - 1, Ordering::Relaxed);
            false
        }
    }

    pub(crate) fn set_restart(&self, nr: usize, arg0: usize) {
        *self.restart.lock() = Some((nr, arg0));
    }

    pub(crate) fn take_restart(&self) -> Option<(usize, usize)> {
        self.restart.lock().take()
    }

    /// Existe sinal pendente não bloqueado?
    pub fn has_deliverable_signal(&self) -> bool {
        self.signals.lock().deliverable() != 0
    }
}

impl core::fmt::Debug for Thread {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid.0)
            .field("pid", &self.process.pid().0)
            .field("state", &self.state())
            .finish()
    }
}
