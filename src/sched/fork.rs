//! fork: duplica o processo corrente.
//!
//! O address space é copiado com copy-on-write (`AddressSpace::fork`), os
//! descritores ganham uma referência a mais e a thread filha começa no mesmo
//! contexto da chamadora, com 0 no registrador de retorno.

use crate::arch::{TrapFrame, UserContext};
use crate::mm::MmError;
use crate::sched::core::enqueue_new;
use crate::sched::task::{table, Process, Thread};
use crate::sched::{TaskError, TaskResult};
use crate::sys::Pid;
use alloc::sync::Arc;

pub fn fork(frame: &TrapFrame) -> TaskResult<Pid> {
    let thread = crate::sched::current().ok_or(TaskError::NoCurrentThread)?;
    let (child, _) = fork_process(thread.process(), &thread, frame)?;
    Ok(child.pid())
}

/// Cria o filho de `parent` a partir de `thread` no contexto `frame`.
pub fn fork_process(parent: &Arc<Process>, thread: &Thread, frame: &TrapFrame) -> TaskResult<(Arc<Process>, Arc<Thread>)> {
    let aspace = parent.aspace().ok_or(TaskError::NoCurrentThread)?;
    let pid = table::allocate_pid().ok_or(TaskError::Memory(MmError::OutOfMemory))?;
    let tid = table::allocate_tid().ok_or(TaskError::Memory(MmError::OutOfMemory))?;

    let files = parent.files.lock().fork();
    let child = Process::new(pid, Some(parent.pid()), &parent.name(), Some(aspace.fork()), files);
    *child.actions.lock() = parent.actions.lock().clone();
    child.set_args(parent.args());
    child.set_cwd(parent.cwd());

    let mut context = *frame;
    context.set_return(0);
    let child_thread = Thread::new_user(tid, child.clone(), context, thread.user_stack())?;
    let blocked = thread.signals.lock().blocked();
    child_thread.signals.lock().set_blocked(blocked);

    table::insert_process(child.clone());
    enqueue_new(child_thread.clone());
    crate::kdebug!("(Sched) fork: pid filho=", pid.0 as u64);
    Ok((child, child_thread))
}
