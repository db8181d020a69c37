//! Entrega de sinais na volta ao modo usuário.
//!
//! Um handler recebe um `SignalFrame` na stack de usuário com o contexto
//! interrompido e a máscara anterior. O restorer chama `sigreturn` com o sp
//! apontando para o frame (o `ret` do x86 já consumiu o endereço de retorno).

use super::{DefaultAction, Disposition, SigActionFlags, Signal};
use crate::arch::{TrapFrame, UserContext};
use crate::mm::usercopy::{self, UserValue};
use crate::mm::{MmError, MmResult};
use crate::sched::sync::WaitCondition;
use crate::sched::task::{ExitStatus, Process, Thread};
use crate::sched::{TaskError, TaskResult};
use crate::sys::Errno;
use alloc::sync::Arc;

/// Área abaixo do sp que o ABI reserva para a função interrompida.
const RED_ZONE: usize = 128;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SignalFrame {
    pub context: TrapFrame,
    pub mask: u64,
    pub signal: u64,
}

// SAFETY: só inteiros (o TrapFrame é um bloco de u64).
unsafe impl UserValue for SignalFrame {}

/// Entrega os sinais pendentes da thread corrente, até o primeiro handler.
///
/// Também decide o destino de uma syscall interrompida (`ERESTARTSYS`): reexecutada
/// se nenhum handler rodar ou se o handler tiver SA_RESTART, senão `EINTR`.
pub fn deliver_pending(thread: &Arc<Thread>, frame: &mut TrapFrame) {
    let mut restart = thread.take_restart();

    loop {
        if thread.is_dead() {
            return;
        }
        let Some(sig) = thread.signals.lock().take_next() else { break };
        let process = thread.process().clone();
        let disposition = process.actions.lock().get(sig);

        match disposition {
            Disposition::Ignore => continue,
            Disposition::Default => match sig.default_action() {
                DefaultAction::Ignore | DefaultAction::Continue => continue,
                DefaultAction::Terminate => {
                    terminate(&process, sig, false);
                    return;
                }
                DefaultAction::CoreDump => {
                    terminate(&process, sig, true);
                    return;
                }
                DefaultAction::Stop => stop(&process, sig),
            },
            Disposition::Handler { handler, mask, flags, restorer } => {
                if let Some((nr, arg0)) = restart.take() {
                    if flags.contains(SigActionFlags::RESTART) {
                        frame.rewind_syscall(nr, arg0);
                    } else {
                        frame.set_return(Errno::EINTR.as_isize());
                    }
                }
                if setup_frame(thread, frame, sig, handler, mask, flags, restorer).is_err() {
                    crate::kdebug!("(Signal) Stack de usuário inválida para o handler: ", sig.number() as u64);
                    terminate(&process, Signal::SIGSEGV, true);
                    return;
                }
                if flags.contains(SigActionFlags::RESETHAND) {
                    let _ = process.actions.lock().set(sig, Disposition::Default);
                }
                break;
            }
        }
    }

    if let Some((nr, arg0)) = restart {
        frame.rewind_syscall(nr, arg0);
    }
}

fn terminate(process: &Arc<Process>, sig: Signal, core: bool) {
    crate::kinfo!("(Signal) Processo terminado por sinal: pid=", process.pid().0 as u64);
    crate::sched::process_exit(process, ExitStatus::Signaled { signal: sig, core });
}

fn stop(process: &Arc<Process>, sig: Signal) {
    crate::kdebug!("(Signal) Processo parado: sinal=", sig.number() as u64);
    process.set_stopped(true);
    if let Some(parent) = process.parent().and_then(crate::sched::task::table::process) {
        super::send(&parent, Signal::SIGCHLD);
    }
    crate::sched::core::reschedule_for_wait_condition(WaitCondition::Continued(process.clone()));
}

#[allow(clippy::too_many_arguments)]
fn setup_frame(
    thread: &Thread,
    frame: &mut TrapFrame,
    sig: Signal,
    handler: usize,
    mask: u64,
    flags: SigActionFlags,
    restorer: usize,
) -> MmResult<()> {
    let aspace = thread.process().aspace().ok_or(MmError::BadUserAddress)?;
    let old_mask = thread.signals.lock().blocked();

    let saved = SignalFrame { context: *frame, mask: old_mask, signal: sig.number() as u64 };
    let frame_addr = frame
        .sp()
        .checked_sub(RED_ZONE + core::mem::size_of::<SignalFrame>())
        .ok_or(MmError::BadUserAddress)?
        & !0xF;
    usercopy::write_user(&aspace, frame_addr, &saved)?;

    let mut sp = frame_addr;
    if !frame.set_return_address(restorer) {
        sp -= core::mem::size_of::<usize>();
        usercopy::write_user(&aspace, sp, &restorer)?;
    }

    frame.set_ip(handler);
    frame.set_sp(sp);
    frame.set_call_arg(0, sig.number() as usize);
    frame.set_call_arg(1, 0);
    frame.set_call_arg(2, frame_addr);

    let mut new_mask = old_mask | mask;
    if !flags.contains(SigActionFlags::NODEFER) {
        new_mask |= sig.bit();
    }
    thread.signals.lock().set_blocked(new_mask);
    Ok(())
}

/// Restaura o contexto salvo pelo handler. O frame está no sp corrente.
pub fn sigreturn(frame: &mut TrapFrame) -> TaskResult<()> {
    let thread = crate::sched::current().ok_or(TaskError::NoCurrentThread)?;
    let aspace = thread.process().aspace().ok_or(TaskError::NoCurrentThread)?;
    let saved: SignalFrame = usercopy::read_user(&aspace, frame.sp())?;

    let mut context = saved.context;
    context.sanitize_user();
    *frame = context;
    thread.signals.lock().set_blocked(saved.mask);
    Ok(())
}
