//! UserFS - filesystems servidos por processos.
//!
//! Cada `vfs_register_userfs(fs, servidor)` registra um filesystem cujas operações
//! de inode viram RPCs para o servidor IPC de mesmo nome: `mount`, `lookup`,
//! `readdir`, `readlink` e `getpage`. O servidor devolve os atributos do inode e
//! um cookie opaco que o kernel guarda e manda de volta nas operações seguintes.
//!
//! Os arquivos são somente leitura: páginas vêm do `getpage` para o page cache e
//! podem ser descartadas e pedidas de novo.

pub mod proto;

use self::proto::{InodeInfo, Op, Reply, Request};
use crate::fs::vfs::mount::{self, next_sb_id, Filesystem};
use crate::fs::vfs::{DirIterState, FileType, FsError, FsResult, Inode, InodeOps};
use crate::ipc::channel::{self, IpcEndpoint};
use crate::ipc::IpcError;
use crate::mm::config::PAGE_SIZE;
use crate::sync::Mutex;
use alloc::string::String;
use alloc::sync::Arc;

/// Tamanho de cada buffer do canal com o servidor.
const CHANNEL_SIZE: usize = 4 * PAGE_SIZE;

/// Meio que leva um pedido ao servidor e traz a resposta.
pub trait Transport: Send + Sync {
    fn call(&self, request: &Request) -> FsResult<Reply>;
}

/// Transporte sobre um canal IPC, conectado na primeira chamada.
pub struct IpcTransport {
    server: String,
    endpoint: Mutex<Option<Arc<IpcEndpoint>>>,
}

impl IpcTransport {
    pub fn new(server: &str) -> Self {
        Self { server: String::from(server), endpoint: Mutex::new(None) }
    }
}

fn transport_error(e: IpcError) -> FsError {
    match e {
        IpcError::Interrupted => FsError::Interrupted,
        IpcError::Memory(e) => FsError::Memory(e),
        _ => FsError::Io,
    }
}

impl Transport for IpcTransport {
    fn call(&self, request: &Request) -> FsResult<Reply> {
        let mut slot = self.endpoint.lock();
        let endpoint = match slot.as_ref() {
            Some(endpoint) => endpoint.clone(),
            None => {
                let endpoint = channel::connect_kernel(&self.server, CHANNEL_SIZE).map_err(|e| {
                    crate::kwarn!("(UserFS) Falha ao conectar em: ", str self.server.as_str());
                    transport_error(e)
                })?;
                *slot = Some(endpoint.clone());
                endpoint
            }
        };

        let result = endpoint
            .send_all(&request.encode())
            .map_err(transport_error)
            .and_then(|_| Reply::read_from(|buf| endpoint.recv_exact(buf).map_err(transport_error)));
        if result.is_err() {
            // Resposta pela metade: o canal está fora de sincronia.
            *slot = None;
        }
        result
    }
}

struct Shared {
    sb: u64,
    transport: Arc<dyn Transport>,
}

impl Shared {
    fn call(&self, request: Request) -> FsResult<Reply> {
        let reply = self.transport.call(&request)?;
        reply.check()?;
        Ok(reply)
    }

    fn make_inode(self: &Arc<Self>, cookie: u64, info: &InodeInfo) -> FsResult<Arc<Inode>> {
        let ftype = FileType::from_u32(info.ftype).ok_or(FsError::Io)?;
        let ops = UserInode { shared: self.clone(), cookie };
        let inode = Inode::new(self.sb, info.ino, ftype, info.perm, info.size as usize, ops);
        inode.set_owner(info.uid, info.gid);
        inode.set_nlink(info.nlinks.max(1));
        Ok(inode)
    }
}

struct UserInode {
    shared: Arc<Shared>,
    cookie: u64,
}

impl InodeOps for UserInode {
    fn lookup(&self, _dir: &Inode, name: &str) -> FsResult<Option<Arc<Inode>>> {
        let mut request = Request::new(Op::Lookup, self.cookie);
        request.name = String::from(name);
        match self.shared.call(request) {
            Ok(reply) => self.shared.make_inode(reply.cookie, &reply.info).map(Some),
            Err(FsError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn readdir(&self, _dir: &Inode, state: &mut DirIterState<'_>) -> FsResult<()> {
        let reply = self.shared.call(Request::new(Op::Readdir, self.cookie))?;
        for entry in proto::decode_dirents(&reply.payload)? {
            if !state.add(entry.ino, entry.ftype, &entry.name) {
                break;
            }
        }
        Ok(())
    }

    fn readlink(&self, _inode: &Inode) -> FsResult<String> {
        let reply = self.shared.call(Request::new(Op::Readlink, self.cookie))?;
        String::from_utf8(reply.payload).map_err(|_| FsError::Io)
    }

    fn fill_page(&self, _inode: &Inode, pgoff: usize, buf: &mut [u8]) -> FsResult<()> {
        let mut request = Request::new(Op::GetPage, self.cookie);
        request.arg = pgoff as u64;
        let reply = self.shared.call(request)?;
        let n = reply.payload.len().min(PAGE_SIZE).min(buf.len());
        buf[..n].copy_from_slice(&reply.payload[..n]);
        Ok(())
    }

    /// O servidor continua com o conteúdo; a página pode sair do cache.
    fn flush_page(&self, _inode: &Inode, _pgoff: usize, _data: &[u8]) -> FsResult<()> {
        Ok(())
    }
}

pub struct UserFs {
    name: String,
    transport: Arc<dyn Transport>,
}

impl UserFs {
    pub fn new(name: &str, transport: Arc<dyn Transport>) -> Self {
        Self { name: String::from(name), transport }
    }
}

impl Filesystem for UserFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn mount(&self, source: &str) -> FsResult<Arc<Inode>> {
        let shared = Arc::new(Shared { sb: next_sb_id(), transport: self.transport.clone() });
        let mut request = Request::new(Op::Mount, 0);
        request.name = String::from(source);
        let reply = shared.call(request)?;
        let root = shared.make_inode(reply.cookie, &reply.info)?;
        if !root.is_dir() {
            return Err(FsError::NotDirectory);
        }
        crate::kdebug!("(UserFS) Montado: ", str self.name.as_str());
        Ok(root)
    }
}

/// `vfs_register_userfs`: `fs_name` passa a ser servido pelo servidor IPC `server`.
pub fn register(fs_name: &str, server: &str) -> FsResult<()> {
    if fs_name.is_empty() || server.is_empty() {
        return Err(FsError::InvalidArgument);
    }
    let transport: Arc<dyn Transport> = Arc::new(IpcTransport::new(server));
    mount::register_filesystem(Arc::new(UserFs::new(fs_name, transport)))?;
    crate::kinfo!("(UserFS) Filesystem registrado: ", str fs_name);
    Ok(())
}
