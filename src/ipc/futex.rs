//! Fast Userspace Mutex
//!
//! Waiters ficam numa tabela chaveada por (address space, endereço virtual): a
//! mesma palavra mapeada em dois processos é, para o kernel, duas filas distintas.
//! A leitura da palavra e a entrada na fila acontecem sob o lock da tabela, então
//! um `wake` entre as duas não se perde.

use crate::mm::usercopy::read_user;
use crate::mm::AddressSpace;
use crate::sched::sync::{WaitOutcome, Waitlist};
use crate::sync::Spinlock;
use crate::sys::Errno;
use alloc::collections::BTreeMap;
use alloc::sync::Arc;

type FutexKey = (usize, usize);

static FUTEXES: Spinlock<BTreeMap<FutexKey, Arc<Waitlist>>> = Spinlock::new(BTreeMap::new());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutexError {
    /// A palavra não tinha o valor esperado.
    WouldBlock,
    /// Endereço desalinhado.
    InvalidAddress,
    /// Endereço não mapeado.
    Fault,
    Interrupted,
}

impl From<FutexError> for Errno {
    fn from(e: FutexError) -> Errno {
        match e {
            FutexError::WouldBlock => Errno::EAGAIN,
            FutexError::InvalidAddress => Errno::EINVAL,
            FutexError::Fault => Errno::EFAULT,
            FutexError::Interrupted => Errno::ERESTARTSYS,
        }
    }
}

fn key(aspace: &Arc<AddressSpace>, addr: usize) -> FutexKey {
    (Arc::as_ptr(aspace) as usize, addr)
}

/// Dorme enquanto `*addr == expected`.
pub fn wait(aspace: &Arc<AddressSpace>, addr: usize, expected: u32) -> Result<(), FutexError> {
    if addr % core::mem::align_of::<u32>() != 0 {
        return Err(FutexError::InvalidAddress);
    }
    let key = key(aspace, addr);
    let mut table = FUTEXES.lock();
    let current = read_user::<u32>(aspace, addr).map_err(|_| FutexError::Fault)?;
    if current != expected {
        return Err(FutexError::WouldBlock);
    }
    let waitlist = table.entry(key).or_insert_with(|| Arc::new(Waitlist::new())).clone();
    let outcome = waitlist.wait_locked(table);
    forget_if_idle(key);
    match outcome {
        WaitOutcome::Interrupted => Err(FutexError::Interrupted),
        WaitOutcome::Woken | WaitOutcome::Closed => Ok(()),
    }
}

/// Acorda até `n` threads esperando em `addr`. Devolve quantas acordaram.
pub fn wake(aspace: &Arc<AddressSpace>, addr: usize, n: usize) -> usize {
    let key = key(aspace, addr);
    let woken = match FUTEXES.lock().get(&key) {
        Some(waitlist) => waitlist.wake(n),
        None => 0,
    };
    forget_if_idle(key);
    woken
}

/// Remove a fila se ninguém mais a usa.
fn forget_if_idle(key: FutexKey) {
    let mut table = FUTEXES.lock();
    if table.get(&key).is_some_and(|w| w.is_empty() && Arc::strong_count(w) == 1) {
        table.remove(&key);
    }
}

/// Filas vivas (diagnóstico e testes).
pub fn active_keys() -> usize {
    FUTEXES.lock().len()
}
