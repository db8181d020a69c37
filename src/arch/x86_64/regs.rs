//! Frame de registradores salvo pelos stubs de trap (`trap.rs`).
//!
//! A ordem dos campos espelha EXATAMENTE a ordem de push do assembly: GPRs, vetor,
//! código de erro e o frame de hardware do `iretq`.

use crate::arch::traits::UserContext;

/// Seletores usados em frames novos (ver `gdt.rs`).
pub const KERNEL_CS: u64 = 0x08;
pub const KERNEL_SS: u64 = 0x10;
pub const USER_SS: u64 = 0x18 | 3;
pub const USER_CS: u64 = 0x20 | 3;

/// RFLAGS com IF=1 (e bit 1 reservado).
const RFLAGS_DEFAULT: u64 = 0x202;

/// Bits de RFLAGS que o usuário pode controlar (CF PF AF ZF SF TF DF OF AC).
const RFLAGS_USER_MASK: u64 = 0x40DD5;

/// Tamanho da instrução `int 0x88` (CD 88).
const INT_INSN_LEN: u64 = 2;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    pub r15: u64,
    pub r14: u64,
    pub r13: u64,
    pub r12: u64,
    pub r11: u64,
    pub r10: u64,
    pub r9: u64,
    pub r8: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub rbp: u64,
    pub rdx: u64,
    pub rcx: u64,
    pub rbx: u64,
    pub rax: u64,

    pub vector: u64,
    pub error_code: u64,

    // Frame de hardware
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

impl TrapFrame {
    /// Frame para uma thread de kernel que começa em `entry(arg)`.
    pub fn new_kernel(entry: usize, stack_top: usize, arg: usize) -> Self {
        TrapFrame {
            rip: entry as u64,
            rsp: stack_top as u64,
            rdi: arg as u64,
            cs: KERNEL_CS,
            ss: KERNEL_SS,
            rflags: RFLAGS_DEFAULT,
            ..Default::default()
        }
    }
}

impl UserContext for TrapFrame {
    fn new_user(entry: usize, stack_top: usize, arg0: usize, arg1: usize) -> Self {
        TrapFrame {
            rip: entry as u64,
            rsp: stack_top as u64,
            rdi: arg0 as u64,
            rsi: arg1 as u64,
            cs: USER_CS,
            ss: USER_SS,
            rflags: RFLAGS_DEFAULT,
            ..Default::default()
        }
    }

    fn ip(&self) -> usize {
        self.rip as usize
    }

    fn set_ip(&mut self, ip: usize) {
        self.rip = ip as u64;
    }

    fn sp(&self) -> usize {
        self.rsp as usize
    }

    fn set_sp(&mut self, sp: usize) {
        self.rsp = sp as u64;
    }

    fn syscall_number(&self) -> usize {
        self.rax as usize
    }

    /// ABI: rdi, rsi, rdx, r10, r8, r9.
    fn syscall_arg(&self, index: usize) -> usize {
        (match index {
            0 => self.rdi,
            1 => self.rsi,
            2 => self.rdx,
            3 => self.r10,
            4 => self.r8,
            5 => self.r9,
            _ => 0,
        }) as usize
    }

    fn set_return(&mut self, value: isize) {
        self.rax = value as u64;
    }

    fn return_value(&self) -> isize {
        self.rax as isize
    }

    /// SysV: rdi, rsi, rdx, rcx, r8, r9.
    fn set_call_arg(&mut self, index: usize, value: usize) {
        let v = value as u64;
        match index {
            0 => self.rdi = v,
            1 => self.rsi = v,
            2 => self.rdx = v,
            3 => self.rcx = v,
            4 => self.r8 = v,
            5 => self.r9 = v,
            _ => {}
        }
    }

    fn set_return_address(&mut self, _ra: usize) -> bool {
        false
    }

    fn rewind_syscall(&mut self, number: usize, _arg0: usize) {
        self.rax = number as u64;
        self.rip -= INT_INSN_LEN;
    }

    fn from_user(&self) -> bool {
        self.cs & 3 == 3
    }

    fn sanitize_user(&mut self) {
        self.cs = USER_CS;
        self.ss = USER_SS;
        self.rflags = (self.rflags & RFLAGS_USER_MASK) | RFLAGS_DEFAULT;
    }
}
