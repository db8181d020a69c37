//! Dentry cache.
//!
//! Os dentries vivem numa arena global indexada (`DCACHE`); pai e filhos se
//! referenciam por índice. Um [`DentryRef`] é uma referência contada: `Clone` soma,
//! `Drop` subtrai. Um nó com contagem zero e sem filhos sai do pai e é liberado na
//! hora; o pai, se também estiver em zero e sem filhos, vai junto. O cache não
//! retém nada por conta própria: quem responde por um nome é sempre o filesystem.
//!
//! Nenhum `DentryRef` pode ser destruído com `DCACHE` tomado. Ordem de locks:
//! `MOUNTS` (mount.rs) antes de `DCACHE`.

use super::{FsError, FsResult, Inode};
use crate::sync::Spinlock;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Índice de um nó na arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DentryId(u32);

struct Node {
    name: String,
    parent: Option<DentryId>,
    inode: Option<Arc<Inode>>,
    children: Vec<DentryId>,
    refcount: usize,
    mountpoint: bool,
}

struct Arena {
    slots: Vec<Option<Node>>,
    free: Vec<u32>,
}

impl Arena {
    const fn new() -> Self {
        Self { slots: Vec::new(), free: Vec::new() }
    }

    fn node(&self, id: DentryId) -> &Node {
        match self.slots.get(id.0 as usize) {
            Some(Some(node)) => node,
            _ => panic!("dentry: índice {} não está vivo", id.0),
        }
    }

    fn node_mut(&mut self, id: DentryId) -> &mut Node {
        match self.slots.get_mut(id.0 as usize) {
            Some(Some(node)) => node,
            _ => panic!("dentry: índice {} não está vivo", id.0),
        }
    }

    fn insert(&mut self, node: Node) -> DentryId {
        match self.free.pop() {
            Some(index) => {
                self.slots[index as usize] = Some(node);
                DentryId(index)
            }
            None => {
                self.slots.push(Some(node));
                DentryId((self.slots.len() - 1) as u32)
            }
        }
    }

    fn find_child(&self, dir: DentryId, name: &str) -> Option<DentryId> {
        self.node(dir).children.iter().copied().find(|c| self.node(*c).name == name)
    }

    fn get(&mut self, id: DentryId) {
        self.node_mut(id).refcount += 1;
    }

    /// Solta uma referência e libera o que ficou órfão. Os inodes liberados voltam
    /// para o chamador destruí-los fora do lock.
    fn put(&mut self, id: DentryId, released: &mut Vec<Arc<Inode>>) {
        let node = self.node_mut(id);
        if node.refcount == 0 {
            panic!("dentry: refcount negativo em '{}'", node.name);
        }
        node.refcount -= 1;
        self.release_if_unused(id, released);
    }

    fn release_if_unused(&mut self, mut id: DentryId, released: &mut Vec<Arc<Inode>>) {
        loop {
            let node = self.node(id);
            if node.refcount > 0 || !node.children.is_empty() || node.mountpoint {
                return;
            }
            let Some(node) = self.slots[id.0 as usize].take() else { return };
            self.free.push(id.0);
            if let Some(inode) = node.inode {
                released.push(inode);
            }
            let Some(parent) = node.parent else { return };
            self.node_mut(parent).children.retain(|c| *c != id);
            id = parent;
        }
    }

    fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

static DCACHE: Spinlock<Arena> = Spinlock::new(Arena::new());

fn put_and_release(id: DentryId) {
    let mut released = Vec::new();
    DCACHE.lock().put(id, &mut released);
    drop(released);
}

/// Referência contada a um dentry.
pub struct DentryRef {
    id: DentryId,
}

impl DentryRef {
    /// Embrulha um id cuja referência já foi somada sob o lock.
    fn adopt(id: DentryId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> DentryId {
        self.id
    }

    /// Inode do dentry; `None` numa dentry negativa.
    pub fn inode(&self) -> Option<Arc<Inode>> {
        DCACHE.lock().node(self.id).inode.clone()
    }

    /// Inode de um dentry que precisa existir.
    pub fn positive(&self) -> FsResult<Arc<Inode>> {
        self.inode().ok_or(FsError::NotFound)
    }

    pub fn is_negative(&self) -> bool {
        DCACHE.lock().node(self.id).inode.is_none()
    }

    pub fn name(&self) -> String {
        DCACHE.lock().node(self.id).name.clone()
    }

    pub fn parent(&self) -> Option<DentryRef> {
        let mut cache = DCACHE.lock();
        let parent = cache.node(self.id).parent?;
        cache.get(parent);
        Some(DentryRef::adopt(parent))
    }

    pub fn is_mountpoint(&self) -> bool {
        DCACHE.lock().node(self.id).mountpoint
    }

    pub fn refcount(&self) -> usize {
        DCACHE.lock().node(self.id).refcount
    }

    pub fn has_children(&self) -> bool {
        !DCACHE.lock().node(self.id).children.is_empty()
    }

    /// Referências a todos os ancestrais, do pai até `stop` (exclusive), tomadas de
    /// uma vez sob o lock. Sem `stop`, sobe até a raiz da árvore.
    pub fn ref_up_to(&self, stop: Option<&DentryRef>) -> Vec<DentryRef> {
        let stop = stop.map(|s| s.id);
        let mut cache = DCACHE.lock();
        let mut pinned = Vec::new();
        let mut id = self.id;
        while let Some(parent) = cache.node(id).parent {
            if Some(parent) == stop {
                break;
            }
            cache.get(parent);
            pinned.push(DentryRef::adopt(parent));
            id = parent;
        }
        pinned
    }
}

impl Clone for DentryRef {
    fn clone(&self) -> Self {
        DCACHE.lock().get(self.id);
        Self { id: self.id }
    }
}

impl Drop for DentryRef {
    fn drop(&mut self) {
        put_and_release(self.id);
    }
}

impl PartialEq for DentryRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DentryRef {}

impl core::fmt::Debug for DentryRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Dentry({}, {:?})", self.id.0, self.name())
    }
}

/// Raiz de uma árvore nova (raiz de um filesystem montado).
pub fn new_root(inode: Arc<Inode>) -> DentryRef {
    let id = DCACHE.lock().insert(Node {
        name: String::from("/"),
        parent: None,
        inode: Some(inode),
        children: Vec::new(),
        refcount: 1,
        mountpoint: false,
    });
    DentryRef::adopt(id)
}

fn cached_child(dir: &DentryRef, name: &str) -> Option<DentryRef> {
    let mut cache = DCACHE.lock();
    let id = cache.find_child(dir.id, name)?;
    cache.get(id);
    Some(DentryRef::adopt(id))
}

/// Filho `name` de `dir`: do cache ou perguntando ao filesystem. Um nome
/// inexistente vira uma dentry negativa.
pub fn lookup_child(dir: &DentryRef, name: &str) -> FsResult<DentryRef> {
    if let Some(child) = cached_child(dir, name) {
        return Ok(child);
    }

    let dir_inode = dir.positive()?;
    // O filesystem pode bloquear (userfs): sem DCACHE aqui.
    let found = dir_inode.lookup(name)?;

    let mut cache = DCACHE.lock();
    if let Some(id) = cache.find_child(dir.id, name) {
        cache.get(id);
        drop(cache);
        return Ok(DentryRef::adopt(id));
    }
    let id = cache.insert(Node {
        name: String::from(name),
        parent: Some(dir.id),
        inode: found,
        children: Vec::new(),
        refcount: 1,
        mountpoint: false,
    });
    cache.node_mut(dir.id).children.push(id);
    drop(cache);
    crate::ktrace!("(Dentry) Nome cacheado: ", str name);
    Ok(DentryRef::adopt(id))
}

/// Torna positiva uma dentry negativa (depois de `create`/`symlink`).
pub fn attach(dentry: &DentryRef, inode: Arc<Inode>) -> FsResult<()> {
    let mut cache = DCACHE.lock();
    let node = cache.node_mut(dentry.id);
    if node.inode.is_some() {
        return Err(FsError::Exists);
    }
    node.inode = Some(inode);
    Ok(())
}

/// Filhos positivos cacheados (readdir de filesystems sem `readdir`).
pub fn cached_children(dir: &DentryRef) -> Vec<(String, Arc<Inode>)> {
    let cache = DCACHE.lock();
    cache
        .node(dir.id)
        .children
        .iter()
        .filter_map(|c| {
            let node = cache.node(*c);
            node.inode.clone().map(|inode| (node.name.clone(), inode))
        })
        .collect()
}

pub(super) fn set_mountpoint(dentry: &DentryRef, mountpoint: bool) {
    DCACHE.lock().node_mut(dentry.id).mountpoint = mountpoint;
}

/// A árvore sob `root` só é referenciada por `holders` referências ao próprio root?
pub(super) fn is_idle(root: DentryId, holders: usize) -> bool {
    let cache = DCACHE.lock();
    let node = cache.node(root);
    node.refcount <= holders && node.children.is_empty()
}

/// Caminho de `dentry` até a raiz da sua árvore (sem atravessar montagens).
pub fn path_in_tree(dentry: &DentryRef) -> (Vec<String>, DentryId) {
    let cache = DCACHE.lock();
    let mut names = Vec::new();
    let mut id = dentry.id;
    while let Some(parent) = cache.node(id).parent {
        names.push(cache.node(id).name.clone());
        id = parent;
    }
    names.reverse();
    (names, id)
}

/// Referência ao nó `id`, que o chamador sabe estar vivo.
pub(super) fn get_by_id(id: DentryId) -> DentryRef {
    DCACHE.lock().get(id);
    DentryRef::adopt(id)
}

/// Nós vivos na arena (diagnóstico e testes).
pub fn live_count() -> usize {
    DCACHE.lock().live()
}
