//! Handle de E/S sobre o registro de consoles (stdin/stdout/stderr do init).

use crate::drivers::console;
use crate::fs::io::{Io, IoFlags, IoKind};
use crate::fs::vfs::{FileStat, FileType, FsError, FsResult};
use core::any::Any;

pub struct ConsoleIo;

impl ConsoleIo {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for ConsoleIo {
    fn default() -> Self {
        Self::new()
    }
}

impl Io for ConsoleIo {
    fn kind(&self) -> IoKind {
        IoKind::Console
    }

    fn flags(&self) -> IoFlags {
        IoFlags::READ | IoFlags::WRITE | IoFlags::BLOCKING
    }

    /// Devolve o que já chegou; sem nada, cede a CPU até chegar ao menos um byte.
    fn read(&self, buf: &mut [u8]) -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let mut n = 0;
            while n < buf.len() {
                match console::read_byte() {
                    Some(byte) => {
                        buf[n] = byte;
                        n += 1;
                    }
                    None => break,
                }
            }
            if n > 0 {
                return Ok(n);
            }
            let Some(thread) = crate::sched::current() else { return Ok(0) };
            if thread.has_deliverable_signal() || thread.is_dead() {
                return Err(FsError::Interrupted);
            }
            drop(thread);
            crate::sched::yield_now();
        }
    }

    fn write(&self, buf: &[u8]) -> FsResult<usize> {
        console::write(buf);
        Ok(buf.len())
    }

    fn stat(&self) -> FsResult<FileStat> {
        Ok(FileStat { ftype: FileType::CharDevice.as_u32(), perm: 0o620, nlinks: 1, ..FileStat::default() })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
