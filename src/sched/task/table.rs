//! Tabelas globais de processos e threads.
//!
//! Um processo continua na tabela depois de morrer (zumbi) até alguém colhê-lo com
//! `wait_for_process`. Threads saem da tabela quando o scheduler as colhe.

use super::{Process, Thread};
use crate::sched::config::{FIRST_DYNAMIC_PID, MAX_PID, MAX_TID};
use crate::sync::Spinlock;
use crate::sys::{Pid, Tid};
use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;

static PROCESSES: Spinlock<BTreeMap<Pid, Arc<Process>>> = Spinlock::new(BTreeMap::new());
static THREADS: Spinlock<BTreeMap<Tid, Arc<Thread>>> = Spinlock::new(BTreeMap::new());

static NEXT_PID: Spinlock<u32> = Spinlock::new(FIRST_DYNAMIC_PID);
static NEXT_TID: Spinlock<u32> = Spinlock::new(1);

/// Próximo pid livre, dando a volta em `MAX_PID`. `None` se a tabela está cheia.
pub fn allocate_pid() -> Option<Pid> {
    let table = PROCESSES.lock();
    let mut next = NEXT_PID.lock();
    for _ in FIRST_DYNAMIC_PID..MAX_PID {
        let candidate = Pid(*next);
        *next = if *next + 1 >= MAX_PID { FIRST_DYNAMIC_PID } else { *next + 1 };
        if !table.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    None
}

pub fn allocate_tid() -> Option<Tid> {
    let table = THREADS.lock();
    let mut next = NEXT_TID.lock();
    for _ in 1..MAX_TID {
        let candidate = Tid(*next);
        *next = if *next + 1 >= MAX_TID { 1 } else { *next + 1 };
        if !table.contains_key(&candidate) {
            return Some(candidate);
        }
    }
    None
}

pub fn insert_process(process: Arc<Process>) {
    PROCESSES.lock().insert(process.pid(), process);
}

pub fn remove_process(pid: Pid) -> Option<Arc<Process>> {
    PROCESSES.lock().remove(&pid)
}

pub fn process(pid: Pid) -> Option<Arc<Process>> {
    PROCESSES.lock().get(&pid).cloned()
}

/// Filhos diretos de `pid`.
pub fn children(pid: Pid) -> Vec<Arc<Process>> {
    PROCESSES.lock().values().filter(|p| p.parent() == Some(pid)).cloned().collect()
}

pub fn processes() -> Vec<Arc<Process>> {
    PROCESSES.lock().values().cloned().collect()
}

pub fn insert_thread(thread: Arc<Thread>) {
    THREADS.lock().insert(thread.tid(), thread);
}

pub fn remove_thread(tid: Tid) -> Option<Arc<Thread>> {
    THREADS.lock().remove(&tid)
}

pub fn thread(tid: Tid) -> Option<Arc<Thread>> {
    THREADS.lock().get(&tid).cloned()
}

pub fn thread_count() -> usize {
    THREADS.lock().len()
}
