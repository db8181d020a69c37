//! # Syscall Dispatcher
//!
//! Table-based dispatcher para O(1) dispatch.

pub mod table;

use super::abi::SyscallArgs;
use crate::arch::{TrapFrame, UserContext};
use crate::sys::Errno;

pub use table::{SyscallHandler, SYSCALL_TABLE, TABLE_SIZE};

/// Entrada das syscalls, chamada por `arch::trap::handle`.
///
/// Extrai os argumentos do contexto, despacha e escreve o resultado no
/// registrador de retorno.
pub fn dispatch(frame: &mut TrapFrame) {
    let args = SyscallArgs::from_frame(frame);
    crate::ktrace!("(Syscall) num=", args.num as u64);

    if let Some(value) = handle(&args, frame) {
        frame.set_return(value);
    }
}

/// Executa a syscall `args.num`.
///
/// Devolve o valor do registrador de retorno (`-errno` nas falhas), ou `None`
/// quando o handler já reescreveu o contexto.
///
/// `ERESTARTSYS` nunca chega ao usuário: a thread guarda o pedido de reinício e
/// a entrega de sinais decide entre reexecutar a syscall e devolver `EINTR`.
pub fn handle(args: &SyscallArgs, frame: &mut TrapFrame) -> Option<isize> {
    let Some(handler) = SYSCALL_TABLE.get(args.num).copied().flatten() else {
        crate::kdebug!("(Syscall) Syscall desconhecida: ", args.num as u64);
        return Some(Errno::ENOSYS.as_isize());
    };

    let result = match handler {
        SyscallHandler::Plain(f) => f(args),
        SyscallHandler::Frame(f) => f(args, frame),
        SyscallHandler::NoReturn(f) => match f(args, frame) {
            Ok(()) => return None,
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(value) => Some(value as isize),
        Err(Errno::ERESTARTSYS) => {
            if let Some(thread) = crate::sched::current() {
                thread.set_restart(args.num, args.arg1);
            }
            Some(Errno::EINTR.as_isize())
        }
        Err(e) => {
            crate::ktrace!("(Syscall) Erro: ", str e.as_str());
            Some(e.as_isize())
        }
    }
}
