//! # Syscall ABI
//!
//! Argumentos extraídos do `TrapFrame` e leitura de memória de usuário.
//!
//! Os registradores de cada arquitetura ficam atrás de `UserContext`:
//!
//! | Arquitetura | Número | Argumentos             | Retorno |
//! |-------------|--------|------------------------|---------|
//! | x86_64      | RAX    | RDI RSI RDX R10 R8 R9  | RAX     |
//! | riscv64     | A7     | A0 .. A5               | A0      |

use crate::arch::{TrapFrame, UserContext};
use crate::mm::usercopy;
use crate::mm::AddressSpace;
use crate::sched::config::{MAX_ARGS, MAX_ARG_LEN};
use crate::sys::{Errno, SysResult};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Máximo de argumentos suportados
pub const MAX_SYSCALL_ARGS: usize = 6;

/// Maior caminho aceito, com o NUL.
pub const MAX_PATH: usize = 4096;

/// Maior nome (filesystem, servidor IPC).
pub const MAX_NAME: usize = 256;

/// Argumentos de syscall extraídos do contexto
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyscallArgs {
    pub num: usize,
    pub arg1: usize,
    pub arg2: usize,
    pub arg3: usize,
    pub arg4: usize,
    pub arg5: usize,
    pub arg6: usize,
}

impl SyscallArgs {
    pub fn from_frame(frame: &TrapFrame) -> Self {
        Self {
            num: frame.syscall_number(),
            arg1: frame.syscall_arg(0),
            arg2: frame.syscall_arg(1),
            arg3: frame.syscall_arg(2),
            arg4: frame.syscall_arg(3),
            arg5: frame.syscall_arg(4),
            arg6: frame.syscall_arg(5),
        }
    }

    /// Argumentos vazios (para testes)
    pub const fn empty() -> Self {
        Self { num: 0, arg1: 0, arg2: 0, arg3: 0, arg4: 0, arg5: 0, arg6: 0 }
    }

    /// `num` com os argumentos dados; o resto fica 0.
    pub fn new(num: usize, args: &[usize]) -> Self {
        let mut raw = [0usize; MAX_SYSCALL_ARGS];
        for (slot, value) in raw.iter_mut().zip(args) {
            *slot = *value;
        }
        Self { num, arg1: raw[0], arg2: raw[1], arg3: raw[2], arg4: raw[3], arg5: raw[4], arg6: raw[5] }
    }
}

/// Address space do processo que fez a syscall.
pub fn user_aspace() -> SysResult<Arc<AddressSpace>> {
    Ok(crate::sched::current_aspace()?)
}

/// String terminada em NUL no espaço do usuário.
pub fn read_str(addr: usize, max: usize) -> SysResult<String> {
    if addr == 0 {
        return Err(Errno::EFAULT);
    }
    let aspace = user_aspace()?;
    Ok(usercopy::read_user_string(&aspace, addr, max)?)
}

pub fn read_path(addr: usize) -> SysResult<String> {
    let path = read_str(addr, MAX_PATH)?;
    if path.is_empty() {
        return Err(Errno::ENOENT);
    }
    Ok(path)
}

/// Vetor `argv`/`envp` terminado em ponteiro nulo. Ponteiro 0 = vetor vazio.
pub fn read_str_array(addr: usize) -> SysResult<Vec<String>> {
    if addr == 0 {
        return Ok(Vec::new());
    }
    let aspace = user_aspace()?;
    Ok(usercopy::read_user_string_array(&aspace, addr, MAX_ARGS, MAX_ARG_LEN)?)
}
