//! Testes de IPC
//!
//! Os handshakes aqui são feitos passo a passo (`request` → `try_accept`) para
//! não depender de duas threads: nada nesta suite bloqueia.

use crate::ipc::channel::{IpcEndpoint, Side, RING_HEADER};
use crate::ipc::shm::{self, ConnState};
use crate::ipc::{futex, IpcError};
use crate::kcheck;
use crate::klib::test_framework::{run_test_suite, TestResult};
use crate::mm::mmap::{self, MmapFlags};
use crate::mm::usercopy::{copy_from_user, read_user, write_user};
use crate::mm::{AddressSpace, VmFlags};
use alloc::sync::Arc;
use alloc::vec;

crate::kernel_test_suite! {
    pub IPC_TESTS = [
        test_echo_roundtrip,
        test_duplicate_name,
        test_pending_limit,
        test_close_refuses_pending,
        test_ring_wraps_around,
        test_ring_visible_through_user_mapping,
        test_ring_cursors_at_limit,
        test_futex_value_mismatch,
    ];
}

pub fn run_ipc_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DE IPC                   ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("ipc", IPC_TESTS).1
}

/// Conexão aceita entre `name` e um cliente, sem bloquear.
fn pair(name: &str, size: usize) -> Option<(Arc<shm::IpcServer>, IpcEndpoint, IpcEndpoint)> {
    let server = shm::announce(name, 2).ok()?;
    let conn = shm::request(&server, size).ok()?;
    let accepted = shm::try_accept(&server).ok()??;
    shm::wait_attached(&server, &conn).ok()?;
    let client = IpcEndpoint::new(conn, Side::Client, None).ok()?;
    let srv = IpcEndpoint::new(accepted, Side::Server, None).ok()?;
    Some((server, client, srv))
}

fn test_echo_roundtrip() -> TestResult {
    let Some((server, client, srv)) = pair("test.echo", 64) else { return TestResult::Failed };
    kcheck!(client.connection().state() == ConnState::Attached, "conexão estabelecida");
    kcheck!(Arc::ptr_eq(client.connection(), srv.connection()), "mesma conexão nas duas pontas");

    kcheck!(client.send(b"hi") == Ok(2), "cliente escreve");
    let mut buf = [0u8; 16];
    kcheck!(srv.recv(&mut buf) == Ok(2), "servidor lê");
    kcheck!(&buf[..2] == b"hi", "conteúdo do cliente");

    kcheck!(srv.send(b"HI") == Ok(2), "servidor responde");
    kcheck!(client.recv(&mut buf) == Ok(2), "cliente lê");
    kcheck!(&buf[..2] == b"HI", "conteúdo do servidor");

    let conn = client.connection().clone();
    drop(client);
    kcheck!(conn.state() == ConnState::Free, "fechar uma ponta libera a conexão");
    kcheck!(srv.recv(&mut buf) == Ok(0), "fim de canal para o servidor");
    kcheck!(srv.send(b"x") == Err(IpcError::PeerClosed), "escrita sem par");

    drop(srv);
    shm::deannounce(&server);
    kcheck!(!shm::is_announced("test.echo"), "nome liberado");
    TestResult::Passed
}

fn test_duplicate_name() -> TestResult {
    let Ok(server) = shm::announce("test.dup", 1) else { return TestResult::Failed };
    kcheck!(shm::announce("test.dup", 1).err() == Some(IpcError::NameInUse), "nome repetido");
    kcheck!(shm::announce("", 1).err() == Some(IpcError::InvalidArgument), "nome vazio");
    shm::deannounce(&server);
    let again = shm::announce("test.dup", 1);
    kcheck!(again.is_ok(), "nome reutilizável depois de fechar");
    if let Ok(server) = again {
        shm::deannounce(&server);
    }
    TestResult::Passed
}

fn test_pending_limit() -> TestResult {
    let Ok(server) = shm::announce("test.limit", 1) else { return TestResult::Failed };
    let first = shm::request(&server, 32);
    kcheck!(first.is_ok(), "primeira pendente aceita");
    kcheck!(shm::request(&server, 32).err() == Some(IpcError::ConnectionRefused), "fila cheia");
    kcheck!(shm::request(&server, 0).err() == Some(IpcError::InvalidArgument), "tamanho zero");
    kcheck!(server.pending_count() == 1, "uma pendente");
    shm::deannounce(&server);
    TestResult::Passed
}

fn test_close_refuses_pending() -> TestResult {
    let Ok(server) = shm::announce("test.refuse", 2) else { return TestResult::Failed };
    let Ok(conn) = shm::request(&server, 128) else { return TestResult::Failed };
    kcheck!(server.has_pending(), "pendente visível ao servidor");
    kcheck!(!conn.is_settled(), "handshake em aberto");

    shm::deannounce(&server);
    kcheck!(conn.state() == ConnState::Free, "pendente vira Free");
    kcheck!(shm::wait_attached(&server, &conn) == Err(IpcError::ConnectionRefused), "cliente recusado");
    kcheck!(shm::try_accept(&server).err() == Some(IpcError::Aborted), "accept em servidor fechado");
    kcheck!(IpcEndpoint::new(conn, Side::Client, None).is_err(), "sem buffer do servidor");
    TestResult::Passed
}

fn test_ring_wraps_around() -> TestResult {
    let Some((server, client, srv)) = pair("test.wrap", 1) else { return TestResult::Failed };
    let data: alloc::vec::Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
    let mut out = vec![0u8; 3000];

    for round in 0..3 {
        kcheck!(client.send_all(&data).is_ok(), "escrita completa", round as u64);
        kcheck!(srv.recv_exact(&mut out).is_ok(), "leitura completa", round as u64);
        kcheck!(out == data, "dados preservados na volta do buffer", round as u64);
    }

    let big = vec![7u8; 8192];
    let capacity = crate::mm::config::PAGE_SIZE - RING_HEADER;
    kcheck!(client.send(&big) == Ok(capacity), "escrita parcial até encher");

    drop(client);
    drop(srv);
    shm::deannounce(&server);
    TestResult::Passed
}

fn test_ring_visible_through_user_mapping() -> TestResult {
    let Some((server, client, srv)) = pair("test.map", 16) else { return TestResult::Failed };
    let Some(ring) = client.connection().client_ring() else { return TestResult::Failed };
    let aspace = AddressSpace::new();
    let Ok(addr) = ring.block().map_into(&aspace, 0) else { return TestResult::Failed };

    kcheck!(client.send(b"mapped").is_ok(), "escrita pelo kernel");
    kcheck!(read_user::<u64>(&aspace, addr + 8) == Ok(6), "tail visível ao processo");
    let mut text = [0u8; 6];
    kcheck!(copy_from_user(&aspace, addr + RING_HEADER, &mut text).is_ok(), "dados mapeados");
    kcheck!(&text == b"mapped", "mesmos bytes pelo mapeamento");

    // O processo consome pelo mapeamento; o kernel vê o buffer vazio.
    kcheck!(write_user(&aspace, addr, &6u64).is_ok(), "head escrito pelo processo");
    kcheck!(ring.used() == 0, "consumo visto pelo kernel");

    kcheck!(write_user(&aspace, addr, &100u64).is_ok(), "head depois do tail");
    let mut buf = [0u8; 4];
    kcheck!(srv.recv(&mut buf) == Err(IpcError::Corrupted), "cursores inconsistentes");

    kcheck!(mmap::munmap(&aspace, addr, ring.block().npages()).is_ok(), "desmapeado");
    drop(client);
    drop(srv);
    shm::deannounce(&server);
    TestResult::Passed
}

fn test_ring_cursors_at_limit() -> TestResult {
    let Some((server, client, srv)) = pair("test.limit", 16) else { return TestResult::Failed };
    let Some(ring) = client.connection().client_ring() else { return TestResult::Failed };
    let aspace = AddressSpace::new();
    let Ok(addr) = ring.block().map_into(&aspace, 0) else { return TestResult::Failed };

    kcheck!(write_user(&aspace, addr, &(u64::MAX - 2)).is_ok(), "head no limite");
    kcheck!(write_user(&aspace, addr + 8, &(u64::MAX - 2)).is_ok(), "tail no limite");
    kcheck!(client.send(&[1, 2, 3, 4, 5, 6, 7, 8]) == Err(IpcError::Corrupted), "tail estouraria");
    kcheck!(ring.used() == 0, "nada escrito");

    // Dois bytes "produzidos" pelo processo: a leitura para exatamente em u64::MAX.
    kcheck!(write_user(&aspace, addr + 8, &u64::MAX).is_ok(), "tail no máximo");
    let mut buf = [0u8; 4];
    kcheck!(srv.recv(&mut buf) == Ok(2), "leitura até o máximo");
    kcheck!(read_user::<u64>(&aspace, addr) == Ok(u64::MAX), "head no máximo");
    kcheck!(client.send(b"x") == Err(IpcError::Corrupted), "sem espaço de cursor");

    kcheck!(mmap::munmap(&aspace, addr, ring.block().npages()).is_ok(), "desmapeado");
    drop(client);
    drop(srv);
    shm::deannounce(&server);
    TestResult::Passed
}

fn test_futex_value_mismatch() -> TestResult {
    let aspace = AddressSpace::new();
    let rw = VmFlags::READ | VmFlags::WRITE;
    let Ok(addr) = mmap::mmap_anonymous(&aspace, 0, 1, rw, MmapFlags::PRIVATE) else { return TestResult::Failed };
    kcheck!(write_user(&aspace, addr, &5u32).is_ok(), "palavra inicial");

    kcheck!(futex::wait(&aspace, addr, 4) == Err(futex::FutexError::WouldBlock), "valor diferente não dorme");
    kcheck!(futex::wait(&aspace, addr + 1, 5) == Err(futex::FutexError::InvalidAddress), "desalinhado");
    kcheck!(futex::wait(&aspace, 0x10, 0) == Err(futex::FutexError::Fault), "endereço sem mapeamento");
    kcheck!(futex::wake(&aspace, addr, 1) == 0, "ninguém para acordar");
    TestResult::Passed
}
