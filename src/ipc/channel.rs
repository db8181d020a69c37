//! Canais de IPC: ring buffers sobre os blocos compartilhados e os handles de E/S.
//!
//! ```text
//! bloco: | head (u64) | tail (u64) | ... | dados (size - RING_HEADER) |
//! ```
//!
//! `head` e `tail` são contadores monotônicos de bytes consumidos e produzidos; o
//! processo mapeia o bloco e pode lê-los. Um cursor que estouraria `u64` só pode ter
//! sido forjado: o canal é dado como corrompido. O kernel acessa os cursores com
//! `volatile` e valida o par antes de cada operação.

use crate::fs::io::{Io, IoFlags, IoKind};
use crate::fs::vfs::{FileStat, FileType, FsError, FsResult};
use crate::ipc::shm::{self, IpcConnection, IpcServer};
use crate::ipc::{IpcError, IpcResult};
use crate::mm::config::PAGE_SIZE;
use crate::mm::shm::ShmBlock;
use crate::mm::{mmap, AddressSpace};
use crate::sched::sync::{WaitOutcome, Waitlist};
use crate::sync::Spinlock;
use alloc::sync::{Arc, Weak};
use core::any::Any;
use core::sync::atomic::{fence, Ordering};
use volatile::VolatilePtr;

/// Bytes reservados no começo de cada bloco para os cursores.
pub const RING_HEADER: usize = 64;

const HEAD_OFFSET: usize = 0;
const TAIL_OFFSET: usize = 8;

/// Um sentido do canal.
pub struct Ring {
    block: Arc<ShmBlock>,
    /// `true` depois que a conexão foi liberada.
    closed: Spinlock<bool>,
    waiters: Waitlist,
}

impl Ring {
    pub fn new(block: Arc<ShmBlock>) -> Self {
        Self { block, closed: Spinlock::new(false), waiters: Waitlist::new() }
    }

    pub fn block(&self) -> &Arc<ShmBlock> {
        &self.block
    }

    pub fn capacity(&self) -> usize {
        self.block.size() - RING_HEADER
    }

    fn cursor(&self, offset: usize) -> u64 {
        match self.block.kernel_ptr::<u64>(offset) {
            // SAFETY: o bloco vive enquanto `self` vive e o ponteiro está alinhado.
            Some(ptr) => unsafe { VolatilePtr::new(ptr) }.read(),
            None => 0,
        }
    }

    fn set_cursor(&self, offset: usize, value: u64) {
        if let Some(ptr) = self.block.kernel_ptr::<u64>(offset) {
            fence(Ordering::Release);
            // SAFETY: idem `cursor`.
            unsafe { VolatilePtr::new(ptr) }.write(value);
        }
    }

    /// `(head, tail, usados)`, ou `Corrupted` se o par não faz sentido.
    fn cursors(&self) -> IpcResult<(u64, u64, usize)> {
        let head = self.cursor(HEAD_OFFSET);
        let tail = self.cursor(TAIL_OFFSET);
        fence(Ordering::Acquire);
        let used = tail.checked_sub(head).ok_or(IpcError::Corrupted)? as usize;
        if used > self.capacity() {
            return Err(IpcError::Corrupted);
        }
        Ok((head, tail, used))
    }

    /// Bytes esperando leitura.
    pub fn used(&self) -> usize {
        self.cursors().map_or(0, |(_, _, used)| used)
    }

    fn copy_in(&self, pos: u64, buf: &[u8]) {
        let cap = self.capacity();
        let at = (pos % cap as u64) as usize;
        let first = buf.len().min(cap - at);
        self.block.write(RING_HEADER + at, &buf[..first]);
        if first < buf.len() {
            self.block.write(RING_HEADER, &buf[first..]);
        }
    }

    fn copy_out(&self, pos: u64, buf: &mut [u8]) {
        let cap = self.capacity();
        let at = (pos % cap as u64) as usize;
        let first = buf.len().min(cap - at);
        self.block.read(RING_HEADER + at, &mut buf[..first]);
        if first < buf.len() {
            self.block.read(RING_HEADER, &mut buf[first..]);
        }
    }

    /// Escreve o que couber; bloqueia só com o buffer cheio.
    pub fn write(&self, buf: &[u8]) -> IpcResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let closed = self.closed.lock();
            if *closed {
                return Err(IpcError::PeerClosed);
            }
            let (_, tail, used) = self.cursors()?;
            let room = self.capacity() - used;
            if room > 0 {
                let n = room.min(buf.len());
                let next = tail.checked_add(n as u64).ok_or(IpcError::Corrupted)?;
                self.copy_in(tail, &buf[..n]);
                self.set_cursor(TAIL_OFFSET, next);
                drop(closed);
                self.waiters.wake_all();
                return Ok(n);
            }
            if self.waiters.wait_locked(closed) == WaitOutcome::Interrupted {
                return Err(IpcError::Interrupted);
            }
        }
    }

    /// Lê o que houver; bloqueia com o buffer vazio. 0 depois do fechamento.
    pub fn read(&self, buf: &mut [u8]) -> IpcResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            let closed = self.closed.lock();
            let (head, _, used) = self.cursors()?;
            if used > 0 {
                let n = used.min(buf.len());
                let next = head.checked_add(n as u64).ok_or(IpcError::Corrupted)?;
                self.copy_out(head, &mut buf[..n]);
                self.set_cursor(HEAD_OFFSET, next);
                drop(closed);
                self.waiters.wake_all();
                return Ok(n);
            }
            if *closed {
                return Ok(0);
            }
            if self.waiters.wait_locked(closed) == WaitOutcome::Interrupted {
                return Err(IpcError::Interrupted);
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    pub(super) fn close(&self) {
        *self.closed.lock() = true;
        self.waiters.wake_all();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

/// Onde os dois blocos ficaram no address space do dono da ponta.
struct UserMapping {
    aspace: Weak<AddressSpace>,
    rx: usize,
    tx: usize,
    npages: usize,
}

/// Uma ponta de uma conexão estabelecida.
pub struct IpcEndpoint {
    conn: Arc<IpcConnection>,
    side: Side,
    rx: Arc<Ring>,
    tx: Arc<Ring>,
    mapping: Option<UserMapping>,
}

impl IpcEndpoint {
    /// Ponta de `conn` para `side`. Com `aspace`, os dois blocos são mapeados nele.
    pub fn new(conn: Arc<IpcConnection>, side: Side, aspace: Option<&Arc<AddressSpace>>) -> IpcResult<Self> {
        let (client, server) = match (conn.client_ring(), conn.server_ring()) {
            (Some(client), Some(server)) => (client, server),
            _ => return Err(IpcError::ConnectionRefused),
        };
        let (rx, tx) = match side {
            Side::Client => (server, client),
            Side::Server => (client, server),
        };
        let mapping = match aspace {
            Some(aspace) => Some(map_pair(aspace, &rx, &tx)?),
            None => None,
        };
        Ok(Self { conn, side, rx, tx, mapping })
    }

    pub fn connection(&self) -> &Arc<IpcConnection> {
        &self.conn
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Endereços de usuário `(leitura, escrita)` dos buffers, se mapeados.
    pub fn user_buffers(&self) -> Option<(usize, usize)> {
        self.mapping.as_ref().map(|m| (m.rx, m.tx))
    }

    pub fn send(&self, buf: &[u8]) -> IpcResult<usize> {
        self.tx.write(buf)
    }

    pub fn recv(&self, buf: &mut [u8]) -> IpcResult<usize> {
        self.rx.read(buf)
    }

    /// Escreve `buf` inteiro.
    pub fn send_all(&self, mut buf: &[u8]) -> IpcResult<()> {
        while !buf.is_empty() {
            let n = self.send(buf)?;
            buf = &buf[n..];
        }
        Ok(())
    }

    /// Lê exatamente `buf.len()` bytes; fim de canal no meio é `PeerClosed`.
    pub fn recv_exact(&self, buf: &mut [u8]) -> IpcResult<()> {
        let mut done = 0;
        while done < buf.len() {
            match self.recv(&mut buf[done..])? {
                0 => return Err(IpcError::PeerClosed),
                n => done += n,
            }
        }
        Ok(())
    }
}

fn map_pair(aspace: &Arc<AddressSpace>, rx: &Ring, tx: &Ring) -> IpcResult<UserMapping> {
    let npages = rx.block().npages();
    let rx_addr = rx.block().map_into(aspace, 0)?;
    let tx_addr = match tx.block().map_into(aspace, 0) {
        Ok(addr) => addr,
        Err(e) => {
            let _ = mmap::munmap(aspace, rx_addr, npages);
            return Err(e.into());
        }
    };
    Ok(UserMapping { aspace: Arc::downgrade(aspace), rx: rx_addr, tx: tx_addr, npages })
}

impl Drop for IpcEndpoint {
    fn drop(&mut self) {
        self.conn.close();
        if let Some(mapping) = self.mapping.take() {
            if let Some(aspace) = mapping.aspace.upgrade() {
                let _ = mmap::munmap(&aspace, mapping.rx, mapping.npages);
                let _ = mmap::munmap(&aspace, mapping.tx, mapping.npages);
            }
        }
    }
}

fn io_error(e: IpcError) -> FsError {
    match e {
        IpcError::PeerClosed => FsError::BrokenPipe,
        IpcError::Interrupted => FsError::Interrupted,
        IpcError::Memory(e) => FsError::Memory(e),
        _ => FsError::Io,
    }
}

impl Io for IpcEndpoint {
    fn kind(&self) -> IoKind {
        IoKind::IpcConnection
    }

    fn flags(&self) -> IoFlags {
        IoFlags::READ | IoFlags::WRITE | IoFlags::BLOCKING
    }

    fn read(&self, buf: &mut [u8]) -> FsResult<usize> {
        self.recv(buf).map_err(io_error)
    }

    fn write(&self, buf: &[u8]) -> FsResult<usize> {
        self.send(buf).map_err(io_error)
    }

    fn stat(&self) -> FsResult<FileStat> {
        Ok(FileStat {
            size: self.rx.used() as u64,
            ftype: FileType::Socket.as_u32(),
            perm: 0o600,
            nlinks: 1,
            ..FileStat::default()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Handle do servidor: só serve para `accept`. Fechá-lo desanuncia o nome.
pub struct IpcServerIo {
    server: Arc<IpcServer>,
}

impl IpcServerIo {
    pub fn server(&self) -> &Arc<IpcServer> {
        &self.server
    }
}

impl Drop for IpcServerIo {
    fn drop(&mut self) {
        shm::deannounce(&self.server);
    }
}

impl Io for IpcServerIo {
    fn kind(&self) -> IoKind {
        IoKind::IpcServer
    }

    fn flags(&self) -> IoFlags {
        IoFlags::empty()
    }

    fn stat(&self) -> FsResult<FileStat> {
        Ok(FileStat {
            size: self.server.pending_count() as u64,
            ftype: FileType::Socket.as_u32(),
            perm: 0o600,
            nlinks: 1,
            ..FileStat::default()
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `ipc_create`.
pub fn create_server(name: &str, max_pending: usize) -> IpcResult<Arc<IpcServerIo>> {
    Ok(Arc::new(IpcServerIo { server: shm::announce(name, max_pending)? }))
}

/// `ipc_accept`: a ponta é mapeada no processo corrente.
pub fn accept(server: &IpcServerIo) -> IpcResult<Arc<IpcEndpoint>> {
    let conn = shm::accept(&server.server)?;
    let aspace = crate::sched::current_process().and_then(|p| p.aspace());
    endpoint(conn, Side::Server, aspace.as_ref())
}

/// `ipc_connect`: a ponta é mapeada no processo corrente.
pub fn connect(name: &str, size: usize) -> IpcResult<Arc<IpcEndpoint>> {
    let conn = shm::connect(name, size)?;
    let aspace = crate::sched::current_process().and_then(|p| p.aspace());
    endpoint(conn, Side::Client, aspace.as_ref())
}

/// Conexão usada pelo próprio kernel (userfs): nada é mapeado.
pub fn connect_kernel(name: &str, size: usize) -> IpcResult<Arc<IpcEndpoint>> {
    let conn = shm::connect(name, size)?;
    endpoint(conn, Side::Client, None)
}

fn endpoint(conn: Arc<IpcConnection>, side: Side, aspace: Option<&Arc<AddressSpace>>) -> IpcResult<Arc<IpcEndpoint>> {
    match IpcEndpoint::new(conn.clone(), side, aspace) {
        Ok(endpoint) => Ok(Arc::new(endpoint)),
        Err(e) => {
            conn.close();
            Err(e)
        }
    }
}

/// Capacidade útil de um canal pedido com `size` bytes.
pub fn usable_capacity(size: usize) -> usize {
    crate::klib::align_up(size, PAGE_SIZE) - RING_HEADER
}
