//! Stack inicial de um processo: argc, argv, envp e auxv (ABI System V).
//!
//! ```text
//! top ──▶ strings de argv/envp
//!         (alinhamento de 16)
//!         AT_NULL, ..., auxv
//!         NULL, envp[..]
//!         NULL, argv[..]
//! sp  ──▶ argc
//! ```

use super::elf::LoadedElf;
use crate::arch::TrapFrame;
use crate::arch::UserContext;
use crate::mm::config::{PAGE_SIZE, USER_STACK_PAGES};
use crate::mm::{mmap, usercopy, AddressSpace, MmError, MmResult};
use crate::sched::task::UserStack;
use alloc::string::String;
use alloc::vec::Vec;

pub const AT_NULL: usize = 0;
pub const AT_PHDR: usize = 3;
pub const AT_PHENT: usize = 4;
pub const AT_PHNUM: usize = 5;
pub const AT_PAGESZ: usize = 6;
pub const AT_ENTRY: usize = 9;

/// Fração máxima da stack ocupada por argumentos.
const MAX_ARGS_BYTES: usize = USER_STACK_PAGES * PAGE_SIZE / 4;

#[derive(Debug, Clone, Copy)]
pub struct InitialStack {
    pub stack: UserStack,
    pub sp: usize,
    pub argc: usize,
    pub argv: usize,
}

impl InitialStack {
    /// Contexto de entrada: `entry(argc, argv)` com sp apontando para argc.
    pub fn entry_frame(&self, entry: usize) -> TrapFrame {
        TrapFrame::new_user(entry, self.sp, self.argc, self.argv)
    }
}

fn word_bytes(words: &[usize]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_ne_bytes()).collect()
}

/// Mapeia a stack que termina em `top` e escreve os argumentos nela.
pub fn build(aspace: &AddressSpace, top: usize, argv: &[String], envp: &[String], image: &LoadedElf) -> MmResult<InitialStack> {
    let strings: usize = argv.iter().chain(envp).map(|s| s.len() + 1).sum();
    let words = 1 + argv.len() + 1 + envp.len() + 1 + 2 * 6;
    if strings + words * core::mem::size_of::<usize>() > MAX_ARGS_BYTES {
        return Err(MmError::InvalidSize);
    }

    mmap::map_stack(aspace, top, USER_STACK_PAGES)?;

    let mut sp = top;
    let mut push_str = |s: &str| -> MmResult<usize> {
        sp -= s.len() + 1;
        usercopy::copy_to_user(aspace, sp, s.as_bytes())?;
        usercopy::write_user(aspace, sp + s.len(), &0u8)?;
        Ok(sp)
    };
    let arg_ptrs = argv.iter().map(|s| push_str(s)).collect::<MmResult<Vec<usize>>>()?;
    let env_ptrs = envp.iter().map(|s| push_str(s)).collect::<MmResult<Vec<usize>>>()?;

    let mut table = Vec::with_capacity(words);
    table.push(argv.len());
    table.extend_from_slice(&arg_ptrs);
    table.push(0);
    table.extend_from_slice(&env_ptrs);
    table.push(0);
    for (key, value) in [
        (AT_PHDR, image.phdr),
        (AT_PHENT, image.phent),
        (AT_PHNUM, image.phnum),
        (AT_PAGESZ, PAGE_SIZE),
        (AT_ENTRY, image.entry),
        (AT_NULL, 0),
    ] {
        table.push(key);
        table.push(value);
    }

    let sp = (sp - table.len() * core::mem::size_of::<usize>()) & !0xF;
    usercopy::copy_to_user(aspace, sp, &word_bytes(&table))?;

    Ok(InitialStack {
        stack: UserStack { top, npages: USER_STACK_PAGES },
        sp,
        argc: argv.len(),
        argv: sp + core::mem::size_of::<usize>(),
    })
}
