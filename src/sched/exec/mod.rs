//! `exec` e `spawn`: carregam um executável do VFS num address space novo.
//!
//! O carregamento inteiro acontece antes do ponto sem volta: se qualquer passo
//! falhar, o processo chamador continua intacto.

pub mod elf;
pub mod stack;

use crate::arch::TrapFrame;
use crate::fs::vfs::{self, DentryRef};
use crate::fs::FdTable;
use crate::klib::align_up;
use crate::mm::config::{PAGE_SIZE, USER_STACK_TOP};
use crate::mm::{mmap, AddressSpace, MmError};
use crate::sched::config::{MAX_ARGS, MAX_ARG_LEN};
use crate::sched::core::enqueue_new;
use crate::sched::task::{table, Process, ProcessArgs, Thread, UserStack};
use crate::sched::{TaskError, TaskResult};
use crate::sys::Pid;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Imagem pronta para executar.
pub struct Image {
    pub aspace: Arc<AddressSpace>,
    pub entry: usize,
    pub stack: stack::InitialStack,
}

impl Image {
    pub fn entry_frame(&self) -> TrapFrame {
        self.stack.entry_frame(self.entry)
    }

    pub fn user_stack(&self) -> UserStack {
        self.stack.stack
    }
}

fn check_args(argv: &[String], envp: &[String]) -> TaskResult<()> {
    let too_long = argv.iter().chain(envp).any(|s| s.len() > MAX_ARG_LEN);
    if argv.len() > MAX_ARGS || envp.len() > MAX_ARGS || too_long {
        return Err(TaskError::Memory(MmError::InvalidSize));
    }
    Ok(())
}

/// Carrega `path` (relativo a `cwd`) num address space novo, com heap e stack.
pub fn load_image(cwd: Option<&DentryRef>, path: &str, argv: &[String], envp: &[String]) -> TaskResult<Image> {
    check_args(argv, envp)?;
    let inode = vfs::lookup_inode(cwd, path)?;
    let aspace = AddressSpace::new();
    let loaded = elf::load(&aspace, &inode)?;
    // Uma página livre entre o último segmento e o heap.
    mmap::create_heap(&aspace, align_up(loaded.end, PAGE_SIZE) + PAGE_SIZE)?;
    let stack = stack::build(&aspace, USER_STACK_TOP, argv, envp, &loaded)?;
    Ok(Image { aspace, entry: loaded.entry, stack })
}

fn basename(path: &str) -> &str {
    path.rsplit('/').find(|s| !s.is_empty()).unwrap_or(path)
}

/// Substitui a imagem do processo corrente. Em caso de sucesso `frame` passa a
/// apontar para a entrada do novo programa.
pub fn exec(frame: &mut TrapFrame, path: &str, argv: Vec<String>, envp: Vec<String>) -> TaskResult<()> {
    let thread = crate::sched::current().ok_or(TaskError::NoCurrentThread)?;
    let process = thread.process().clone();
    let image = load_image(process.cwd().as_ref(), path, &argv, &envp)?;

    // Ponto sem volta: as outras threads morrem e saem das CPUs antes da troca.
    let others: Vec<Arc<Thread>> = process
        .threads()
        .iter()
        .filter(|t| !Arc::ptr_eq(t, &thread))
        .cloned()
        .collect();
    for other in &others {
        other.mark_dead(0);
    }
    while others.iter().any(|t| t.is_on_cpu()) {
        crate::sched::core::reschedule();
    }

    image.aspace.activate();
    let old = process.replace_aspace(Some(image.aspace.clone()));
    drop(old);

    process.actions.lock().reset_for_exec();
    process.set_name(basename(path));
    process.set_args(ProcessArgs { argv, envp });
    thread.set_user_stack(Some(image.user_stack()));
    *frame = image.entry_frame();

    crate::kinfo!("(Exec) exec: ", str path);
    Ok(())
}

/// Cria um processo filho de `parent` executando `path`.
pub fn spawn_from(parent: Option<&Arc<Process>>, pid: Pid, path: &str, argv: Vec<String>, envp: Vec<String>, files: FdTable) -> TaskResult<Arc<Process>> {
    let cwd = parent.and_then(|p| p.cwd()).or_else(vfs::root);
    let image = load_image(cwd.as_ref(), path, &argv, &envp)?;
    let tid = table::allocate_tid().ok_or(TaskError::Memory(MmError::OutOfMemory))?;

    let process = Process::new(pid, parent.map(|p| p.pid()), basename(path), Some(image.aspace.clone()), files);
    process.set_cwd(cwd);
    process.set_args(ProcessArgs { argv, envp });
    let thread = Thread::new_user(tid, process.clone(), image.entry_frame(), Some(image.user_stack()))?;

    table::insert_process(process.clone());
    enqueue_new(thread);
    crate::kinfo!("(Exec) Processo criado: pid=", pid.0 as u64);
    Ok(process)
}

/// `spawn`: filho do processo corrente com uma cópia dos descritores.
pub fn spawn(path: &str, argv: Vec<String>, envp: Vec<String>) -> TaskResult<Pid> {
    let parent = crate::sched::current_process();
    let files = match &parent {
        Some(p) => p.files.lock().fork(),
        None => FdTable::with_console(),
    };
    let pid = table::allocate_pid().ok_or(TaskError::Memory(MmError::OutOfMemory))?;
    spawn_from(parent.as_ref(), pid, path, argv, envp, files).map(|p| p.pid())
}

/// Primeiro processo de usuário (pid 1), com o console em 0/1/2.
pub fn spawn_init(path: &str, cmdline: &str) -> TaskResult<Arc<Process>> {
    let argv = alloc::vec![String::from(path), String::from(cmdline)];
    spawn_from(None, Pid::INIT, path, argv, Vec::new(), FdTable::with_console())
}
