//! Processo: dono do address space, dos descritores e das disposições de sinal.

use super::thread::Thread;
use super::state::ThreadState;
use crate::fs::vfs::DentryRef;
use crate::fs::FdTable;
use crate::mm::AddressSpace;
use crate::sched::signal::{Signal, SignalActions};
use crate::sched::sync::Waitlist;
use crate::sync::{Spinlock, SpinlockGuard};
use crate::sys::{Gid, Pid, Uid};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicBool, Ordering};

/// Como o processo terminou.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled { signal: Signal, core: bool },
}

impl ExitStatus {
    /// Código entregue a quem espera: o valor de `exit`, ou 128 + sinal.
    pub fn code(self) -> i32 {
        match self {
            Self::Exited(code) => code,
            Self::Signaled { signal, .. } => 128 + signal.number() as i32,
        }
    }
}

/// argv/envp guardados do último exec.
#[derive(Debug, Clone, Default)]
pub struct ProcessArgs {
    pub argv: Vec<String>,
    pub envp: Vec<String>,
}

pub struct Process {
    pid: Pid,
    parent: Spinlock<Option<Pid>>,
    name: Spinlock<String>,
    uid: Uid,
    gid: Gid,
    aspace: Spinlock<Option<Arc<AddressSpace>>>,
    pub files: Spinlock<FdTable>,
    pub actions: Spinlock<SignalActions>,
    args: Spinlock<ProcessArgs>,
    cwd: Spinlock<Option<DentryRef>>,
    threads: Spinlock<Vec<Arc<Thread>>>,
    /// Quem espera o fim do processo (`wait_for_process`).
    waiters: Waitlist,
    exit: Spinlock<Option<ExitStatus>>,
    stopped: AtomicBool,
}

impl Process {
    pub fn new(pid: Pid, parent: Option<Pid>, name: &str, aspace: Option<Arc<AddressSpace>>, files: FdTable) -> Arc<Self> {
        Arc::new(Self {
            pid,
            parent: Spinlock::new(parent),
            name: Spinlock::new(String::from(name)),
            uid: Uid::ROOT,
            gid: Gid::ROOT,
            aspace: Spinlock::new(aspace),
            files: Spinlock::new(files),
            actions: Spinlock::new(SignalActions::new()),
            args: Spinlock::new(ProcessArgs::default()),
            cwd: Spinlock::new(None),
            threads: Spinlock::new(Vec::new()),
            waiters: Waitlist::new(),
            exit: Spinlock::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn parent(&self) -> Option<Pid> {
        *self.parent.lock()
    }

    pub(crate) fn set_parent(&self, parent: Option<Pid>) {
        *self.parent.lock() = parent;
    }

    pub fn name(&self) -> String {
        self.name.lock().clone()
    }

    pub fn set_name(&self, name: &str) {
        *self.name.lock() = String::from(name);
    }

    pub fn uid(&self) -> Uid {
        self.uid
    }

    pub fn gid(&self) -> Gid {
        self.gid
    }

    /// Address space de usuário (`None` para processos de kernel ou já destruído).
    pub fn aspace(&self) -> Option<Arc<AddressSpace>> {
        self.aspace.lock().clone()
    }

    /// Troca o address space e devolve o anterior.
    pub(crate) fn replace_aspace(&self, aspace: Option<Arc<AddressSpace>>) -> Option<Arc<AddressSpace>> {
        core::mem::replace(&mut *self.aspace.lock(), aspace)
    }

    pub fn args(&self) -> ProcessArgs {
        self.args.lock().clone()
    }

    pub(crate) fn set_args(&self, args: ProcessArgs) {
        *self.args.lock() = args;
    }

    pub fn cwd(&self) -> Option<DentryRef> {
        self.cwd.lock().clone()
    }

    /// Troca o diretório corrente; a referência antiga é solta.
    pub fn set_cwd(&self, cwd: Option<DentryRef>) {
        let old = core::mem::replace(&mut *self.cwd.lock(), cwd);
        drop(old);
    }

    pub fn threads(&self) -> SpinlockGuard<'_, Vec<Arc<Thread>>> {
        self.threads.lock()
    }

    pub(crate) fn add_thread(&self, thread: Arc<Thread>) {
        self.threads.lock().push(thread);
    }

    pub(crate) fn remove_thread(&self, thread: &Arc<Thread>) -> usize {
        let mut threads = self.threads.lock();
        threads.retain(|t| !Arc::ptr_eq(t, thread));
        threads.len()
    }

    /// Threads ainda não mortas.
    pub fn live_threads(&self) -> usize {
        self.threads.lock().iter().filter(|t| t.state() != ThreadState::Dead).count()
    }

    pub fn waiters(&self) -> &Waitlist {
        &self.waiters
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        *self.exit.lock()
    }

    pub fn has_exited(&self) -> bool {
        self.exit.lock().is_some()
    }

    /// Grava o status de saída. Só a primeira chamada vence.
    pub(crate) fn set_exit_status(&self, status: ExitStatus) -> bool {
        let mut exit = self.exit.lock();
        if exit.is_some() {
            return false;
        }
        *exit = Some(status);
        true
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub(crate) fn set_stopped(&self, stopped: bool) {
        self.stopped.store(stopped, Ordering::Release);
    }

    pub fn is_kernel(&self) -> bool {
        self.pid.is_kernel()
    }
}

impl core::fmt::Debug for Process {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid.0)
            .field("name", &*self.name.lock())
            .field("exited", &self.exit_status())
            .finish()
    }
}
