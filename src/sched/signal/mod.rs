//! # Sinais
//!
//! Disposições por processo (`SignalActions`), máscaras pendente/bloqueada por thread
//! (`SignalState`). Enviar um sinal só marca o bit pendente; a entrega acontece em
//! `delivery::deliver_pending`, chamada apenas no caminho de volta ao modo usuário.
//!
//! SIGKILL e SIGSTOP não podem ser capturados, ignorados nem bloqueados. SIGKILL
//! termina o processo na hora, sem esperar a volta ao usuário.

pub mod delivery;

pub use delivery::{deliver_pending, sigreturn, SignalFrame};

use crate::sched::config::NSIG;
use crate::sched::task::{table, ExitStatus, Process, Thread};
use crate::sched::{TaskError, TaskResult};
use crate::sys::Pid;
use alloc::sync::Arc;
use bitflags::bitflags;

/// Número de sinal válido (1..NSIG).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Signal(u8);

impl Signal {
    pub const SIGHUP: Signal = Signal(1);
    pub const SIGINT: Signal = Signal(2);
    pub const SIGQUIT: Signal = Signal(3);
    pub const SIGILL: Signal = Signal(4);
    pub const SIGTRAP: Signal = Signal(5);
    pub const SIGABRT: Signal = Signal(6);
    pub const SIGBUS: Signal = Signal(7);
    pub const SIGFPE: Signal = Signal(8);
    pub const SIGKILL: Signal = Signal(9);
    pub const SIGUSR1: Signal = Signal(10);
    pub const SIGSEGV: Signal = Signal(11);
    pub const SIGUSR2: Signal = Signal(12);
    pub const SIGPIPE: Signal = Signal(13);
    pub const SIGALRM: Signal = Signal(14);
    pub const SIGTERM: Signal = Signal(15);
    pub const SIGSTKFLT: Signal = Signal(16);
    pub const SIGCHLD: Signal = Signal(17);
    pub const SIGCONT: Signal = Signal(18);
    pub const SIGSTOP: Signal = Signal(19);
    pub const SIGTSTP: Signal = Signal(20);
    pub const SIGTTIN: Signal = Signal(21);
    pub const SIGTTOU: Signal = Signal(22);
    pub const SIGURG: Signal = Signal(23);
    pub const SIGXCPU: Signal = Signal(24);
    pub const SIGXFSZ: Signal = Signal(25);
    pub const SIGVTALRM: Signal = Signal(26);
    pub const SIGPROF: Signal = Signal(27);
    pub const SIGWINCH: Signal = Signal(28);
    pub const SIGIO: Signal = Signal(29);
    pub const SIGPWR: Signal = Signal(30);
    pub const SIGSYS: Signal = Signal(31);

    pub fn from_number(n: usize) -> Option<Signal> {
        (1..NSIG).contains(&n).then_some(Signal(n as u8))
    }

    pub const fn number(self) -> u32 {
        self.0 as u32
    }

    pub const fn bit(self) -> u64 {
        1u64 << self.0
    }

    /// SIGKILL/SIGSTOP: sem handler, sem bloqueio.
    pub const fn is_unblockable(self) -> bool {
        self.0 == Self::SIGKILL.0 || self.0 == Self::SIGSTOP.0
    }

    pub fn default_action(self) -> DefaultAction {
        match self {
            Self::SIGCHLD | Self::SIGURG | Self::SIGWINCH => DefaultAction::Ignore,
            Self::SIGSTOP | Self::SIGTSTP | Self::SIGTTIN | Self::SIGTTOU => DefaultAction::Stop,
            Self::SIGCONT => DefaultAction::Continue,
            Self::SIGILL | Self::SIGTRAP | Self::SIGABRT | Self::SIGBUS | Self::SIGFPE | Self::SIGSEGV
            | Self::SIGSYS | Self::SIGQUIT | Self::SIGXCPU | Self::SIGXFSZ => DefaultAction::CoreDump,
            _ => DefaultAction::Terminate,
        }
    }

    fn is_stop(self) -> bool {
        self.default_action() == DefaultAction::Stop
    }
}

/// Máscara que nunca pode ser bloqueada.
const UNBLOCKABLE: u64 = Signal::SIGKILL.bit() | Signal::SIGSTOP.bit();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultAction {
    Terminate,
    CoreDump,
    Ignore,
    Stop,
    Continue,
}

bitflags! {
    /// Flags de `sigaction` (valores do ABI Linux).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SigActionFlags: u64 {
        const SIGINFO   = 0x0000_0004;
        const RESTORER  = 0x0400_0000;
        const ONSTACK   = 0x0800_0000;
        const RESTART   = 0x1000_0000;
        const NODEFER   = 0x4000_0000;
        const RESETHAND = 0x8000_0000;
    }
}

/// Valores especiais de handler.
pub const SIG_DFL: usize = 0;
pub const SIG_IGN: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Default,
    Ignore,
    Handler {
        handler: usize,
        mask: u64,
        flags: SigActionFlags,
        restorer: usize,
    },
}

/// Estrutura de `sigaction` vista pelo usuário.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct UserSigAction {
    pub handler: usize,
    pub flags: u64,
    pub restorer: usize,
    pub mask: u64,
}

// SAFETY: só inteiros.
unsafe impl crate::mm::usercopy::UserValue for UserSigAction {}

impl From<UserSigAction> for Disposition {
    fn from(action: UserSigAction) -> Self {
        match action.handler {
            SIG_DFL => Disposition::Default,
            SIG_IGN => Disposition::Ignore,
            handler => Disposition::Handler {
                handler,
                mask: action.mask & !UNBLOCKABLE,
                flags: SigActionFlags::from_bits_truncate(action.flags),
                restorer: action.restorer,
            },
        }
    }
}

impl From<Disposition> for UserSigAction {
    fn from(disposition: Disposition) -> Self {
        match disposition {
            Disposition::Default => UserSigAction { handler: SIG_DFL, ..Default::default() },
            Disposition::Ignore => UserSigAction { handler: SIG_IGN, ..Default::default() },
            Disposition::Handler { handler, mask, flags, restorer } => {
                UserSigAction { handler, flags: flags.bits(), restorer, mask }
            }
        }
    }
}

/// Disposições de um processo.
#[derive(Debug, Clone)]
pub struct SignalActions {
    actions: [Disposition; NSIG],
}

impl SignalActions {
    pub const fn new() -> Self {
        Self { actions: [Disposition::Default; NSIG] }
    }

    pub fn get(&self, sig: Signal) -> Disposition {
        self.actions[sig.0 as usize]
    }

    /// Troca a disposição e devolve a anterior. SIGKILL/SIGSTOP recusam.
    pub fn set(&mut self, sig: Signal, disposition: Disposition) -> TaskResult<Disposition> {
        if sig.is_unblockable() && disposition != Disposition::Default {
            return Err(TaskError::InvalidSignal);
        }
        Ok(core::mem::replace(&mut self.actions[sig.0 as usize], disposition))
    }

    /// exec: handlers voltam ao padrão, ignorados continuam ignorados.
    pub fn reset_for_exec(&mut self) {
        for action in self.actions.iter_mut() {
            if matches!(action, Disposition::Handler { .. }) {
                *action = Disposition::Default;
            }
        }
    }
}

impl Default for SignalActions {
    fn default() -> Self {
        Self::new()
    }
}

/// Máscaras de uma thread.
#[derive(Debug, Clone, Default)]
pub struct SignalState {
    pending: u64,
    blocked: u64,
}

impl SignalState {
    pub const fn new() -> Self {
        Self { pending: 0, blocked: 0 }
    }

    pub fn pending(&self) -> u64 {
        self.pending
    }

    pub fn blocked(&self) -> u64 {
        self.blocked
    }

    pub fn set_blocked(&mut self, mask: u64) {
        self.blocked = mask & !UNBLOCKABLE & !1;
    }

    /// Marca pendente. Um sinal já pendente não é contado duas vezes.
    pub fn raise(&mut self, sig: Signal) -> bool {
        let new = self.pending & sig.bit() == 0;
        self.pending |= sig.bit();
        new
    }

    pub fn discard(&mut self, mask: u64) {
        self.pending &= !mask;
    }

    pub fn deliverable(&self) -> u64 {
        self.pending & !self.blocked
    }

    /// Retira o sinal entregável de menor número.
    pub fn take_next(&mut self) -> Option<Signal> {
        let ready = self.deliverable();
        if ready == 0 {
            return None;
        }
        let n = ready.trailing_zeros() as u8;
        self.pending &= !(1u64 << n);
        Some(Signal(n))
    }
}

/// Thread que recebe um sinal dirigido ao processo: a primeira viva que não o
/// bloqueia, senão a primeira viva.
fn target_thread(process: &Process, sig: Signal) -> Option<Arc<Thread>> {
    let threads = process.threads();
    let mut fallback = None;
    for thread in threads.iter().filter(|t| !t.is_dead()) {
        if thread.signals.lock().blocked() & sig.bit() == 0 {
            return Some(thread.clone());
        }
        fallback.get_or_insert_with(|| thread.clone());
    }
    fallback
}

/// Envia `sig` ao processo (sem checagem de permissão).
pub fn send(process: &Arc<Process>, sig: Signal) {
    if process.has_exited() {
        return;
    }
    crate::ktrace!("(Signal) Enviando sinal: ", sig.number() as u64);

    if sig == Signal::SIGKILL {
        crate::sched::process_exit(process, ExitStatus::Signaled { signal: sig, core: false });
        return;
    }

    let stop_mask = Signal::SIGSTOP.bit() | Signal::SIGTSTP.bit() | Signal::SIGTTIN.bit() | Signal::SIGTTOU.bit();
    if sig == Signal::SIGCONT {
        for thread in process.threads().iter() {
            thread.signals.lock().discard(stop_mask);
        }
        process.set_stopped(false);
    } else if sig.is_stop() {
        for thread in process.threads().iter() {
            thread.signals.lock().discard(Signal::SIGCONT.bit());
        }
    }

    if let Some(thread) = target_thread(process, sig) {
        thread.signals.lock().raise(sig);
    }
}

/// `kill(pid, sig)` vindo de userspace. `sig == 0` só testa a existência.
pub fn kill(pid: Pid, sig: usize) -> TaskResult<()> {
    if sig >= NSIG {
        return Err(TaskError::InvalidSignal);
    }
    let process = table::process(pid).ok_or(TaskError::NoSuchProcess)?;
    if pid.is_kernel() {
        return Err(TaskError::PermissionDenied);
    }
    let Some(sig) = Signal::from_number(sig) else {
        return Ok(());
    };
    if pid == Pid::INIT && sig == Signal::SIGKILL {
        return Err(TaskError::PermissionDenied);
    }
    send(&process, sig);
    Ok(())
}

/// Sinal síncrono para a thread corrente (fault, instrução ilegal).
///
/// Se estiver bloqueado ou ignorado, volta ao padrão: o processo não pode seguir
/// executando a instrução que falhou.
pub fn force_current(sig: Signal) {
    let Some(thread) = crate::sched::current() else {
        return;
    };
    let was_blocked = {
        let mut signals = thread.signals.lock();
        let was_blocked = signals.blocked() & sig.bit() != 0;
        let unblocked = signals.blocked() & !sig.bit();
        signals.set_blocked(unblocked);
        signals.raise(sig);
        was_blocked
    };
    let mut actions = thread.process().actions.lock();
    if was_blocked || actions.get(sig) == Disposition::Ignore {
        let _ = actions.set(sig, Disposition::Default);
    }
}

/// `sigaction`: instala `new` (se houver) e devolve a disposição anterior.
pub fn sigaction(sig: usize, new: Option<Disposition>) -> TaskResult<Disposition> {
    let sig = Signal::from_number(sig).ok_or(TaskError::InvalidSignal)?;
    let process = crate::sched::current_process().ok_or(TaskError::NoCurrentThread)?;
    let mut actions = process.actions.lock();
    match new {
        Some(disposition) => actions.set(sig, disposition),
        None => Ok(actions.get(sig)),
    }
}
