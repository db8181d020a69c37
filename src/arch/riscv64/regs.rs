//! Frame de registradores do RISC-V salvo por `trap.rs`.

use crate::arch::traits::UserContext;

/// sstatus.SPP: trap veio do modo supervisor.
pub const SSTATUS_SPP: u64 = 1 << 8;
/// sstatus.SPIE: interrupções habilitadas após `sret`.
pub const SSTATUS_SPIE: u64 = 1 << 5;

const REG_RA: usize = 1;
const REG_SP: usize = 2;
const REG_A0: usize = 10;
const REG_A7: usize = 17;

/// Tamanho de `ecall`.
const ECALL_LEN: u64 = 4;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct TrapFrame {
    /// x0..x31 (x0 nunca é restaurado).
    pub regs: [u64; 32],
    pub sepc: u64,
    pub sstatus: u64,
    pub scause: u64,
    pub stval: u64,
}

impl TrapFrame {
    pub fn new_kernel(entry: usize, stack_top: usize, arg: usize) -> Self {
        let mut frame = TrapFrame {
            sepc: entry as u64,
            sstatus: SSTATUS_SPP | SSTATUS_SPIE,
            ..Default::default()
        };
        frame.regs[REG_SP] = stack_top as u64;
        frame.regs[REG_A0] = arg as u64;
        frame
    }
}

impl UserContext for TrapFrame {
    fn new_user(entry: usize, stack_top: usize, arg0: usize, arg1: usize) -> Self {
        let mut frame = TrapFrame {
            sepc: entry as u64,
            sstatus: SSTATUS_SPIE,
            ..Default::default()
        };
        frame.regs[REG_SP] = stack_top as u64;
        frame.regs[REG_A0] = arg0 as u64;
        frame.regs[REG_A0 + 1] = arg1 as u64;
        frame
    }

    fn ip(&self) -> usize {
        self.sepc as usize
    }

    fn set_ip(&mut self, ip: usize) {
        self.sepc = ip as u64;
    }

    fn sp(&self) -> usize {
        self.regs[REG_SP] as usize
    }

    fn set_sp(&mut self, sp: usize) {
        self.regs[REG_SP] = sp as u64;
    }

    fn syscall_number(&self) -> usize {
        self.regs[REG_A7] as usize
    }

    /// ABI: a0..a5.
    fn syscall_arg(&self, index: usize) -> usize {
        if index < 6 {
            self.regs[REG_A0 + index] as usize
        } else {
            0
        }
    }

    fn set_return(&mut self, value: isize) {
        self.regs[REG_A0] = value as u64;
    }

    fn return_value(&self) -> isize {
        self.regs[REG_A0] as isize
    }

    fn set_call_arg(&mut self, index: usize, value: usize) {
        if index < 8 {
            self.regs[REG_A0 + index] = value as u64;
        }
    }

    fn set_return_address(&mut self, ra: usize) -> bool {
        self.regs[REG_RA] = ra as u64;
        true
    }

    fn rewind_syscall(&mut self, number: usize, arg0: usize) {
        self.regs[REG_A7] = number as u64;
        self.regs[REG_A0] = arg0 as u64;
        self.sepc -= ECALL_LEN;
    }

    fn from_user(&self) -> bool {
        self.sstatus & SSTATUS_SPP == 0
    }

    fn sanitize_user(&mut self) {
        self.sstatus = SSTATUS_SPIE;
    }
}
