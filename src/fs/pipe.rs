//! Pipes: buffer circular limitado com uma waitlist para cada ponta.
//!
//! Ler de um pipe vazio bloqueia até chegar dado ou a ponta de escrita fechar
//! (fim de arquivo). Escrever num pipe sem leitor falha com `BrokenPipe` e manda
//! SIGPIPE ao processo.

use crate::fs::io::{Io, IoFlags, IoKind};
use crate::fs::vfs::{FileStat, FileType, FsError, FsResult};
use crate::sched::signal::{self, Signal};
use crate::sched::sync::{WaitOutcome, Waitlist};
use crate::sync::Spinlock;
use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::any::Any;

/// Bytes em trânsito por pipe.
pub const PIPE_CAPACITY: usize = 16 * 1024;

struct PipeState {
    buf: VecDeque<u8>,
    reader_closed: bool,
    writer_closed: bool,
}

struct Pipe {
    state: Spinlock<PipeState>,
    readers: Waitlist,
    writers: Waitlist,
}

pub struct PipeReader {
    pipe: Arc<Pipe>,
}

pub struct PipeWriter {
    pipe: Arc<Pipe>,
}

/// Cria um pipe e devolve as duas pontas.
pub fn pipe() -> (Arc<PipeReader>, Arc<PipeWriter>) {
    let pipe = Arc::new(Pipe {
        state: Spinlock::new(PipeState { buf: VecDeque::new(), reader_closed: false, writer_closed: false }),
        readers: Waitlist::new(),
        writers: Waitlist::new(),
    });
    (Arc::new(PipeReader { pipe: pipe.clone() }), Arc::new(PipeWriter { pipe }))
}

fn fifo_stat(len: usize) -> FileStat {
    FileStat { size: len as u64, ftype: FileType::Fifo.as_u32(), perm: 0o600, nlinks: 1, ..FileStat::default() }
}

fn interrupted(outcome: WaitOutcome) -> bool {
    outcome == WaitOutcome::Interrupted
}

impl Io for PipeReader {
    fn kind(&self) -> IoKind {
        IoKind::Pipe
    }

    fn flags(&self) -> IoFlags {
        IoFlags::READ | IoFlags::BLOCKING
    }

    fn read(&self, buf: &mut [u8]) -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let mut state = self.pipe.state.lock();
            if !state.buf.is_empty() {
                let n = buf.len().min(state.buf.len());
                for (dst, src) in buf.iter_mut().zip(state.buf.drain(..n)) {
                    *dst = src;
                }
                drop(state);
                self.pipe.writers.wake_all();
                return Ok(n);
            }
            if state.writer_closed {
                return Ok(0);
            }
            if interrupted(self.pipe.readers.wait_locked(state)) {
                return Err(FsError::Interrupted);
            }
        }
    }

    fn stat(&self) -> FsResult<FileStat> {
        Ok(fifo_stat(self.pipe.state.lock().buf.len()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.pipe.state.lock().reader_closed = true;
        self.pipe.writers.wake_all();
    }
}

impl Io for PipeWriter {
    fn kind(&self) -> IoKind {
        IoKind::Pipe
    }

    fn flags(&self) -> IoFlags {
        IoFlags::WRITE | IoFlags::BLOCKING
    }

    /// Escreve o que couber; só bloqueia se o buffer está cheio.
    fn write(&self, buf: &[u8]) -> FsResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let mut state = self.pipe.state.lock();
            if state.reader_closed {
                drop(state);
                if let Some(process) = crate::sched::current_process() {
                    signal::send(&process, Signal::SIGPIPE);
                }
                return Err(FsError::BrokenPipe);
            }
            let room = PIPE_CAPACITY - state.buf.len();
            if room > 0 {
                let n = room.min(buf.len());
                state.buf.extend(&buf[..n]);
                drop(state);
                self.pipe.readers.wake_all();
                return Ok(n);
            }
            if interrupted(self.pipe.writers.wait_locked(state)) {
                return Err(FsError::Interrupted);
            }
        }
    }

    fn stat(&self) -> FsResult<FileStat> {
        Ok(fifo_stat(self.pipe.state.lock().buf.len()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Drop for PipeWriter {
    fn drop(&mut self) {
        self.pipe.state.lock().writer_closed = true;
        self.pipe.readers.wake_all();
    }
}
