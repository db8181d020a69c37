//! Console SBI legacy (extensões 0x01/0x02) para RISC-V bare metal.

const SBI_CONSOLE_PUTCHAR: usize = 0x01;
const SBI_CONSOLE_GETCHAR: usize = 0x02;

#[inline(always)]
fn sbi_call(which: usize, arg0: usize) -> isize {
    let ret: isize;
    unsafe {
        core::arch::asm!(
            "ecall",
            inlateout("a0") arg0 => ret,
            in("a7") which,
            options(nostack)
        );
    }
    ret
}

pub fn init() {}

#[inline(always)]
pub fn emit(byte: u8) {
    sbi_call(SBI_CONSOLE_PUTCHAR, byte as usize);
}

pub fn emit_bytes(bytes: &[u8]) {
    for &b in bytes {
        if b == b'\n' {
            emit(b'\r');
        }
        emit(b);
    }
}

pub fn try_read() -> Option<u8> {
    match sbi_call(SBI_CONSOLE_GETCHAR, 0) {
        -1 => None,
        c => Some(c as u8),
    }
}
