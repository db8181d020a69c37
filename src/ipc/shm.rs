//! IPC-SHM: registro de servidores por nome e handshake das conexões.
//!
//! Cada conexão tem dois buffers compartilhados: um em que o cliente escreve e
//! outro em que o servidor escreve. O handshake:
//!
//! 1. o cliente aloca o buffer dele e entra na fila de pendentes (`Pending`);
//! 2. o servidor tira a conexão da fila e aloca o buffer dele;
//! 3. a conexão vira `Attached` e o cliente acorda.
//!
//! Se o servidor fecha antes do passo 3 a conexão vira `Free` e o cliente recebe
//! `ConnectionRefused`. Fechar qualquer ponta de uma conexão `Attached` também a
//! leva para `Free`.
//!
//! Os locks daqui são spinlocks: os predicados de [`WaitCondition`] são avaliados
//! pelo scheduler e não podem bloquear.

use crate::ipc::channel::Ring;
use crate::ipc::{IpcError, IpcResult};
use crate::mm::config::PAGE_SIZE;
use crate::mm::shm::ShmBlock;
use crate::sched::sync::WaitCondition;
use crate::sched::WakeReason;
use crate::sync::Spinlock;
use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Maior buffer aceito por direção.
pub const MAX_BUFFER_SIZE: usize = 1024 * 1024;

static SERVERS: Spinlock<BTreeMap<String, Arc<IpcServer>>> = Spinlock::new(BTreeMap::new());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Pending,
    Attached,
    Free,
}

pub struct IpcServer {
    name: String,
    max_pending: usize,
    state: Spinlock<ServerState>,
}

struct ServerState {
    pending: VecDeque<Arc<IpcConnection>>,
    closed: bool,
}

impl IpcServer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_pending(&self) -> usize {
        self.max_pending
    }

    pub fn has_pending(&self) -> bool {
        !self.state.lock().pending.is_empty()
    }

    pub fn pending_count(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Fecha o servidor e recusa as conexões pendentes.
    fn close(&self) {
        let pending: Vec<Arc<IpcConnection>> = {
            let mut state = self.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.pending.drain(..).collect()
        };
        for conn in pending {
            conn.close();
        }
    }

    fn remove_pending(&self, conn: &Arc<IpcConnection>) {
        self.state.lock().pending.retain(|c| !Arc::ptr_eq(c, conn));
    }
}

impl core::fmt::Debug for IpcServer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IpcServer").field("name", &self.name).field("max_pending", &self.max_pending).finish()
    }
}

pub struct IpcConnection {
    server_name: String,
    buffer_size: usize,
    inner: Spinlock<ConnInner>,
}

struct ConnInner {
    state: ConnState,
    /// Buffer em que o cliente escreve (o servidor lê).
    client_ring: Option<Arc<Ring>>,
    /// Buffer em que o servidor escreve (o cliente lê).
    server_ring: Option<Arc<Ring>>,
}

impl IpcConnection {
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Tamanho de cada buffer, já arredondado para páginas.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn state(&self) -> ConnState {
        self.inner.lock().state
    }

    /// O handshake terminou (aceita ou recusada).
    pub fn is_settled(&self) -> bool {
        self.state() != ConnState::Pending
    }

    pub fn client_ring(&self) -> Option<Arc<Ring>> {
        self.inner.lock().client_ring.clone()
    }

    pub fn server_ring(&self) -> Option<Arc<Ring>> {
        self.inner.lock().server_ring.clone()
    }

    /// Passa para `Free` e acorda quem espera nos dois buffers.
    pub fn close(&self) {
        let rings = {
            let mut inner = self.inner.lock();
            if inner.state == ConnState::Free {
                return;
            }
            inner.state = ConnState::Free;
            [inner.client_ring.clone(), inner.server_ring.clone()]
        };
        for ring in rings.into_iter().flatten() {
            ring.close();
        }
        crate::ktrace!("(IPC) Conexão liberada: ", str self.server_name.as_str());
    }
}

impl core::fmt::Debug for IpcConnection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IpcConnection")
            .field("server", &self.server_name)
            .field("buffer_size", &self.buffer_size)
            .field("state", &self.state())
            .finish()
    }
}

/// Anuncia `name`. Clientes esperando pelo nome acordam.
pub fn announce(name: &str, max_pending: usize) -> IpcResult<Arc<IpcServer>> {
    if name.is_empty() || max_pending == 0 {
        return Err(IpcError::InvalidArgument);
    }
    let mut servers = SERVERS.lock();
    if servers.contains_key(name) {
        crate::kwarn!("(IPC) Servidor já existe: ", str name);
        return Err(IpcError::NameInUse);
    }
    let server = Arc::new(IpcServer {
        name: String::from(name),
        max_pending,
        state: Spinlock::new(ServerState { pending: VecDeque::new(), closed: false }),
    });
    servers.insert(String::from(name), server.clone());
    drop(servers);
    crate::kdebug!("(IPC) Servidor anunciado: ", str name);
    Ok(server)
}

/// Tira `server` do registro e recusa as pendentes.
pub fn deannounce(server: &Arc<IpcServer>) {
    {
        let mut servers = SERVERS.lock();
        if servers.get(server.name()).is_some_and(|s| Arc::ptr_eq(s, server)) {
            servers.remove(server.name());
        }
    }
    server.close();
    crate::kdebug!("(IPC) Servidor removido: ", str server.name());
}

pub fn lookup(name: &str) -> Option<Arc<IpcServer>> {
    SERVERS.lock().get(name).cloned()
}

pub fn is_announced(name: &str) -> bool {
    SERVERS.lock().contains_key(name)
}

/// Nomes anunciados, em ordem.
pub fn server_names() -> Vec<String> {
    SERVERS.lock().keys().cloned().collect()
}

/// Espera até `name` ser anunciado.
pub fn wait_announced(name: &str) -> IpcResult<Arc<IpcServer>> {
    loop {
        if let Some(server) = lookup(name) {
            return Ok(server);
        }
        crate::ktrace!("(IPC) Esperando o servidor: ", str name);
        if crate::sched::reschedule_for_wait_condition(WaitCondition::IpcAnnounced(String::from(name)))
            == WakeReason::Interrupted
        {
            return Err(IpcError::Interrupted);
        }
    }
}

/// Passo 1: reserva uma vaga de pendente com o buffer do cliente já alocado.
pub fn request(server: &Arc<IpcServer>, size: usize) -> IpcResult<Arc<IpcConnection>> {
    if size == 0 || size > MAX_BUFFER_SIZE {
        return Err(IpcError::InvalidArgument);
    }
    let buffer_size = crate::klib::align_up(size, PAGE_SIZE);
    let ring = Arc::new(Ring::new(ShmBlock::new(buffer_size)?));
    let conn = Arc::new(IpcConnection {
        server_name: String::from(server.name()),
        buffer_size,
        inner: Spinlock::new(ConnInner { state: ConnState::Pending, client_ring: Some(ring), server_ring: None }),
    });

    let mut state = server.state.lock();
    if state.closed || state.pending.len() >= server.max_pending {
        crate::kwarn!("(IPC) Conexão recusada: ", str server.name());
        return Err(IpcError::ConnectionRefused);
    }
    state.pending.push_back(conn.clone());
    Ok(conn)
}

/// Espera o servidor aceitar `conn`.
pub fn wait_attached(server: &Arc<IpcServer>, conn: &Arc<IpcConnection>) -> IpcResult<()> {
    if crate::sched::reschedule_for_wait_condition(WaitCondition::IpcSettled(conn.clone()))
        == WakeReason::Interrupted
    {
        server.remove_pending(conn);
        // O servidor pode ter aceitado no meio do caminho.
        if conn.state() != ConnState::Attached {
            conn.close();
            return Err(IpcError::Interrupted);
        }
    }
    match conn.state() {
        ConnState::Attached => Ok(()),
        _ => Err(IpcError::ConnectionRefused),
    }
}

/// Lado do cliente completo: espera o nome, entra na fila e espera o aceite.
pub fn connect(name: &str, size: usize) -> IpcResult<Arc<IpcConnection>> {
    if name.is_empty() || size == 0 || size > MAX_BUFFER_SIZE {
        return Err(IpcError::InvalidArgument);
    }
    let server = wait_announced(name)?;
    let conn = request(&server, size)?;
    wait_attached(&server, &conn)?;
    crate::kdebug!("(IPC) Conectado a: ", str name);
    Ok(conn)
}

/// Passos 2 e 3 para a primeira pendente, se houver.
pub fn try_accept(server: &Arc<IpcServer>) -> IpcResult<Option<Arc<IpcConnection>>> {
    loop {
        let conn = {
            let mut state = server.state.lock();
            if state.closed {
                return Err(IpcError::Aborted);
            }
            match state.pending.pop_front() {
                Some(conn) => conn,
                None => return Ok(None),
            }
        };

        let block = match ShmBlock::new(conn.buffer_size) {
            Ok(block) => block,
            Err(e) => {
                conn.close();
                return Err(e.into());
            }
        };
        let mut inner = conn.inner.lock();
        // O cliente desistiu (sinal) enquanto estava na fila.
        if inner.state != ConnState::Pending {
            continue;
        }
        inner.server_ring = Some(Arc::new(Ring::new(block)));
        inner.state = ConnState::Attached;
        drop(inner);
        crate::kdebug!("(IPC) Conexão aceita em: ", str server.name());
        return Ok(Some(conn));
    }
}

/// Espera uma conexão pendente e a aceita.
pub fn accept(server: &Arc<IpcServer>) -> IpcResult<Arc<IpcConnection>> {
    loop {
        if let Some(conn) = try_accept(server)? {
            return Ok(conn);
        }
        if crate::sched::reschedule_for_wait_condition(WaitCondition::IpcPending(server.clone()))
            == WakeReason::Interrupted
        {
            return Err(IpcError::Interrupted);
        }
    }
}
