//! Testes do Sistema de Arquivos
//!
//! Os testes rodam em paralelo sobre a mesma raiz global, então cada um trabalha
//! num diretório próprio em `/tmp`.

use crate::fs::cpiofs::CpioFs;
use crate::fs::io::Io;
use crate::fs::pipe::pipe;
use crate::fs::userfs::proto::{self, DirEntry, InodeInfo, Op, Reply, Request};
use crate::fs::userfs::{Transport, UserFs};
use crate::fs::vfs::inode::DIRENT_HEADER;
use crate::fs::vfs::mount::{self, Filesystem};
use crate::fs::vfs::{self, FileType, FsError, FsResult, OpenFlags, ResolveFlags};
use crate::fs::FdTable;
use crate::kcheck;
use crate::klib::test_framework::{run_test_suite, TestResult};
use crate::mm::config::PAGE_SIZE;
use crate::sys::Errno;
use alloc::format;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

crate::kernel_test_suite! {
    pub FS_TESTS = [
        test_cpio_readdir_and_readlink,
        test_lookup_identity_is_stable,
        test_dentry_ref_up_to,
        test_tmpfs_read_write_truncate,
        test_symlink_loop,
        test_mount_busy_while_open,
        test_getcwd_across_mounts,
        test_sysfs_bootargs,
        test_pipe_eof_and_broken_pipe,
        test_fdtable_lowest_free,
        test_userfs_tree,
        test_userfs_reply_errors,
    ];
}

pub fn run_fs_tests() -> usize {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     🧪 TESTES DE FILESYSTEM            ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
    run_test_suite("fs", FS_TESTS).1
}

fn cpio_record(out: &mut Vec<u8>, ino: u32, name: &str, mode: u32, data: &[u8]) {
    let header = format!(
        "070701{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}{:08x}",
        ino,
        mode,
        0,
        0,
        1,
        0,
        data.len(),
        0,
        0,
        0,
        0,
        name.len() + 1,
        0
    );
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out.extend_from_slice(data);
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

/// Initrd de teste: `./a`, `./dir/b` e o symlink `./dir/l -> ../a`.
fn sample_initrd() -> &'static [u8] {
    let mut out = Vec::new();
    cpio_record(&mut out, 1, ".", 0o040_755, &[]);
    cpio_record(&mut out, 2, "./a", 0o100_644, b"hello");
    cpio_record(&mut out, 3, "./dir/b", 0o100_600, b"bee");
    cpio_record(&mut out, 4, "./dir/l", 0o120_777, b"../a");
    cpio_record(&mut out, 0, "TRAILER!!!", 0, &[]);
    Vec::leak(out)
}

/// Nomes dos registros que `list_dir` escreveu em `buf`.
fn dirent_names(buf: &[u8]) -> Vec<String> {
    let mut names = Vec::new();
    let mut at = 0;
    while at + DIRENT_HEADER <= buf.len() {
        let reclen = u16::from_ne_bytes([buf[at + 8], buf[at + 9]]) as usize;
        let namelen = buf[at + 11] as usize;
        if reclen == 0 {
            break;
        }
        let name = &buf[at + DIRENT_HEADER..at + DIRENT_HEADER + namelen];
        names.push(String::from_utf8_lossy(name).into_owned());
        at += reclen;
    }
    names
}

fn list(path: &str) -> FsResult<Vec<String>> {
    let dir = vfs::open(None, path, OpenFlags::READ | OpenFlags::DIRECTORY)?;
    let mut names = Vec::new();
    loop {
        let mut buf = [0u8; 64];
        let n = dir.list_dir(&mut buf)?;
        if n == 0 {
            return Ok(names);
        }
        names.extend(dirent_names(&buf[..n]));
    }
}

fn read_all(path: &str) -> FsResult<Vec<u8>> {
    let file = vfs::open(None, path, OpenFlags::READ)?;
    let mut out = Vec::new();
    let mut buf = [0u8; 128];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            return Ok(out);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

fn test_cpio_readdir_and_readlink() -> TestResult {
    let target = "/tmp/fs_cpio";
    kcheck!(vfs::mkdir(None, target).is_ok(), "ponto de montagem criado");
    let Ok(mp) = vfs::lookup(None, target, ResolveFlags::EXPECT_DIR) else { return TestResult::Failed };
    let Ok(root) = CpioFs::new(sample_initrd()).mount("") else { return TestResult::Failed };
    kcheck!(mount::add_mount(Some(mp), root, "cpiofs", "test").is_ok(), "cpio montado");

    let names = list(target);
    kcheck!(names == Ok(vec![String::from("."), String::from(".."), String::from("a"), String::from("dir")]), "readdir da raiz");
    kcheck!(read_all("/tmp/fs_cpio/a").as_deref() == Ok(&b"hello"[..]), "conteúdo de a");
    kcheck!(read_all("/tmp/fs_cpio/dir/l").as_deref() == Ok(&b"hello"[..]), "symlink seguido");

    let link = vfs::readlink(None, "/tmp/fs_cpio/dir/l");
    kcheck!(link.as_deref() == Ok("../a"), "readlink devolve o alvo sem alteração");
    let stat = vfs::stat(None, "/tmp/fs_cpio/dir/l");
    kcheck!(stat.map(|s| s.size) == Ok(4), "tamanho do symlink é o do alvo");
    kcheck!(stat.map(|s| s.ftype) == Ok(FileType::Symlink.as_u32()), "stat não segue o symlink");

    kcheck!(vfs::touch(None, "/tmp/fs_cpio/novo") == Err(FsError::ReadOnly), "cpio é somente leitura");
    kcheck!(vfs::stat(None, "/tmp/fs_cpio/nada") == Err(FsError::NotFound), "entrada inexistente");

    kcheck!(vfs::unmount(None, target).is_ok(), "desmontado");
    kcheck!(list(target).map(|n| n.len()) == Ok(2), "ponto de montagem vazio de novo");
    TestResult::Passed
}

fn test_lookup_identity_is_stable() -> TestResult {
    kcheck!(vfs::mkdir(None, "/tmp/fs_ident").is_ok(), "diretório");
    kcheck!(vfs::touch(None, "/tmp/fs_ident/f").is_ok(), "arquivo");

    let Ok(first) = vfs::lookup_inode(None, "/tmp/fs_ident/f") else { return TestResult::Failed };
    let (sb, ino) = (first.sb(), first.ino());
    drop(first);
    let Ok(again) = vfs::lookup_inode(None, "/tmp/fs_ident//./f") else { return TestResult::Failed };
    kcheck!(again.sb() == sb && again.ino() == ino, "mesmo (sb, ino) depois de soltar a dentry");

    kcheck!(vfs::touch(None, "/tmp/fs_ident/f").is_ok(), "touch num arquivo existente");
    kcheck!(vfs::mkdir(None, "/tmp/fs_ident/f") == Err(FsError::Exists), "mkdir sobre arquivo");
    kcheck!(vfs::stat(None, "/tmp/fs_ident/f/x") == Err(FsError::NotDirectory), "arquivo no meio do caminho");
    TestResult::Passed
}

fn test_dentry_ref_up_to() -> TestResult {
    kcheck!(vfs::mkdir(None, "/tmp/fs_pin").is_ok(), "diretório");
    kcheck!(vfs::mkdir(None, "/tmp/fs_pin/a").is_ok(), "subdiretório");
    kcheck!(vfs::mkdir(None, "/tmp/fs_pin/a/b").is_ok(), "folha");

    let Ok(leaf) = vfs::lookup(None, "/tmp/fs_pin/a/b", ResolveFlags::empty()) else { return TestResult::Failed };
    let Ok(stop) = vfs::lookup(None, "/tmp/fs_pin", ResolveFlags::empty()) else { return TestResult::Failed };
    let Some(parent) = leaf.parent() else { return TestResult::Failed };
    let before = parent.refcount();

    let pinned = leaf.ref_up_to(Some(&stop));
    kcheck!(pinned.len() == 1, "só o ancestral abaixo do ponto de parada", pinned.len());
    kcheck!(pinned[0].name() == "a", "ancestral imediato");
    kcheck!(parent.refcount() == before + 1, "referência somada ao ancestral");
    drop(pinned);
    kcheck!(parent.refcount() == before, "referência devolvida");

    let all = leaf.ref_up_to(None);
    kcheck!(all.len() >= 3, "sem parada sobe até a raiz", all.len());
    kcheck!(all.iter().any(|d| *d == stop), "passa pelo diretório de parada");
    TestResult::Passed
}

fn test_tmpfs_read_write_truncate() -> TestResult {
    kcheck!(vfs::mkdir(None, "/tmp/fs_rw").is_ok(), "diretório");
    let flags = OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE;
    let Ok(file) = vfs::open(None, "/tmp/fs_rw/data", flags) else { return TestResult::Failed };

    kcheck!(file.write(b"hello world") == Ok(11), "escrita");
    file.set_offset(0);
    let mut buf = [0u8; 32];
    kcheck!(file.read(&mut buf) == Ok(11), "leitura do início");
    kcheck!(&buf[..11] == b"hello world", "conteúdo");

    // Escrita depois do fim deixa um buraco de zeros.
    file.set_offset(PAGE_SIZE + 10);
    kcheck!(file.write(b"x") == Ok(1), "escrita na segunda página");
    kcheck!(file.stat().map(|s| s.size) == Ok((PAGE_SIZE + 11) as u64), "tamanho estendido");
    file.set_offset(PAGE_SIZE);
    kcheck!(file.read(&mut buf[..11]) == Ok(11), "leitura no buraco");
    kcheck!(buf[..10].iter().all(|b| *b == 0) && buf[10] == b'x', "buraco lê zeros");

    let trunc = vfs::open(None, "/tmp/fs_rw/data", OpenFlags::WRITE | OpenFlags::TRUNCATE);
    kcheck!(trunc.is_ok(), "abrir com TRUNCATE");
    kcheck!(vfs::stat(None, "/tmp/fs_rw/data").map(|s| s.size) == Ok(0), "truncado");
    file.set_offset(0);
    kcheck!(file.read(&mut buf) == Ok(0), "fim de arquivo depois de truncar");

    let excl = OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::EXCLUSIVE;
    kcheck!(vfs::open(None, "/tmp/fs_rw/data", excl).err() == Some(FsError::Exists), "CREATE|EXCLUSIVE");
    kcheck!(vfs::open(None, "/tmp/fs_rw", OpenFlags::WRITE).err() == Some(FsError::IsDirectory), "diretório para escrita");
    TestResult::Passed
}

fn test_symlink_loop() -> TestResult {
    kcheck!(vfs::mkdir(None, "/tmp/fs_loop").is_ok(), "diretório");
    kcheck!(vfs::symlink(None, "/tmp/fs_loop/a", "b").is_ok(), "a -> b");
    kcheck!(vfs::symlink(None, "/tmp/fs_loop/b", "a").is_ok(), "b -> a");
    kcheck!(vfs::open(None, "/tmp/fs_loop/a", OpenFlags::READ).err() == Some(FsError::Loop), "ciclo de symlinks");

    kcheck!(vfs::touch(None, "/tmp/fs_loop/f").is_ok(), "alvo");
    kcheck!(vfs::symlink(None, "/tmp/fs_loop/abs", "/tmp/fs_loop/f").is_ok(), "symlink absoluto");
    let Ok(via_link) = vfs::lookup_inode(None, "/tmp/fs_loop/abs") else { return TestResult::Failed };
    let Ok(direct) = vfs::lookup_inode(None, "/tmp/fs_loop/f") else { return TestResult::Failed };
    kcheck!(via_link.same_identity(&direct), "symlink resolve para o alvo");
    kcheck!(vfs::symlink(None, "/tmp/fs_loop/abs", "x") == Err(FsError::Exists), "nome ocupado");
    TestResult::Passed
}

fn test_mount_busy_while_open() -> TestResult {
    let target = "/tmp/fs_busy";
    kcheck!(vfs::mkdir(None, target).is_ok(), "ponto de montagem");
    kcheck!(vfs::mount(None, "tmpfs", "none", target).is_ok(), "tmpfs montado");
    kcheck!(vfs::mount(None, "nenhum", "none", target) == Err(FsError::NotSupported), "filesystem desconhecido");

    let flags = OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE;
    let Ok(file) = vfs::open(None, "/tmp/fs_busy/f", flags) else { return TestResult::Failed };
    kcheck!(vfs::unmount(None, target) == Err(FsError::Busy), "arquivo aberto impede unmount");
    drop(file);
    kcheck!(vfs::unmount(None, target).is_ok(), "unmount depois de fechar");
    kcheck!(vfs::stat(None, "/tmp/fs_busy/f") == Err(FsError::NotFound), "conteúdo sumiu com a montagem");
    kcheck!(vfs::unmount(None, target) == Err(FsError::InvalidArgument), "nada montado");
    TestResult::Passed
}

fn test_getcwd_across_mounts() -> TestResult {
    kcheck!(vfs::mkdir(None, "/tmp/fs_cwd").is_ok(), "diretório");
    kcheck!(vfs::mount(None, "tmpfs", "none", "/tmp/fs_cwd").is_ok(), "montado");
    kcheck!(vfs::mkdir(None, "/tmp/fs_cwd/sub").is_ok(), "subdiretório na montagem");

    let Ok(cwd) = vfs::chdir(None, "/tmp/fs_cwd/sub") else { return TestResult::Failed };
    kcheck!(vfs::getcwd(Some(&cwd)).as_deref() == Ok("/tmp/fs_cwd/sub"), "getcwd atravessa a montagem");
    let Ok(up) = vfs::chdir(Some(&cwd), "../..") else { return TestResult::Failed };
    kcheck!(vfs::getcwd(Some(&up)).as_deref() == Ok("/tmp"), ".. sai da montagem");
    kcheck!(vfs::getcwd(None).as_deref() == Ok("/"), "raiz");
    kcheck!(vfs::chdir(Some(&cwd), "nada").err() == Some(FsError::NotFound), "chdir inexistente");

    kcheck!(vfs::unmount(None, "/tmp/fs_cwd") == Err(FsError::Busy), "cwd impede unmount");
    drop(up);
    drop(cwd);
    kcheck!(vfs::unmount(None, "/tmp/fs_cwd").is_ok(), "unmount");
    TestResult::Passed
}

fn test_sysfs_bootargs() -> TestResult {
    let expected = format!("{}\n", crate::core::cmdline::raw());
    let Ok(text) = read_all("/sys/kernel/bootargs") else { return TestResult::Failed };
    kcheck!(text == expected.as_bytes(), "bootargs é a linha de comando");

    let Ok(meminfo) = read_all("/sys/kernel/meminfo") else { return TestResult::Failed };
    let meminfo = String::from_utf8_lossy(&meminfo).into_owned();
    kcheck!(meminfo.contains("free_pages "), "meminfo tem as páginas livres");

    let names = list("/sys/kernel");
    kcheck!(names.map(|n| n.iter().any(|s| s == "bootargs")) == Ok(true), "bootargs listado");
    kcheck!(vfs::touch(None, "/sys/x") == Err(FsError::ReadOnly), "sysfs é somente leitura");
    TestResult::Passed
}

fn test_pipe_eof_and_broken_pipe() -> TestResult {
    let (reader, writer) = pipe();
    kcheck!(writer.write(b"abc") == Ok(3), "escrita");
    let mut buf = [0u8; 8];
    kcheck!(reader.read(&mut buf[..2]) == Ok(2), "leitura parcial");
    kcheck!(reader.read(&mut buf) == Ok(1), "resto");
    kcheck!(buf[0] == b'c', "ordem preservada");
    drop(writer);
    kcheck!(reader.read(&mut buf) == Ok(0), "fim de arquivo sem escritor");

    let (reader, writer) = pipe();
    drop(reader);
    kcheck!(writer.write(b"x") == Err(FsError::BrokenPipe), "escrita sem leitor");
    kcheck!(reader_less_stat(&*writer), "stat de pipe é fifo");
    TestResult::Passed
}

fn reader_less_stat(io: &dyn Io) -> bool {
    io.stat().map(|s| s.ftype) == Ok(FileType::Fifo.as_u32())
}

fn test_fdtable_lowest_free() -> TestResult {
    let mut table = FdTable::new();
    let (reader, writer) = pipe();
    kcheck!(table.install(reader) == Ok(0), "primeiro descritor");
    kcheck!(table.install(writer.clone()) == Ok(1), "segundo descritor");
    kcheck!(table.close(0).is_ok(), "fecha 0");
    kcheck!(table.install(writer) == Ok(0), "menor livre é reaproveitado");
    kcheck!(table.close(7).err() == Some(FsError::BadFd), "fd inexistente");
    let child = table.fork();
    kcheck!(child.count() == 2, "fork copia a tabela");
    table.close_all();
    kcheck!(table.count() == 0 && child.get(1).is_ok(), "tabelas independentes");
    TestResult::Passed
}

/// Servidor de userfs em memória: `/hello` (arquivo) e `/link -> hello`.
struct FakeServer;

impl FakeServer {
    fn info(ino: u64, ftype: FileType, size: u64) -> InodeInfo {
        InodeInfo { ino, size, ftype: ftype.as_u32(), perm: 0o444, uid: 0, gid: 0, nlinks: 1 }
    }
}

impl Transport for FakeServer {
    fn call(&self, request: &Request) -> FsResult<Reply> {
        let reply = match (request.op, request.cookie, request.name.as_str()) {
            (Op::Mount, _, "src") => Reply::ok(10, Self::info(1, FileType::Directory, 0), Vec::new()),
            (Op::Mount, _, _) => Reply::error(Errno::ENOENT),
            (Op::Lookup, 10, "hello") => Reply::ok(11, Self::info(2, FileType::Regular, 5), Vec::new()),
            (Op::Lookup, 10, "link") => Reply::ok(12, Self::info(3, FileType::Symlink, 5), Vec::new()),
            (Op::Lookup, _, _) => Reply::error(Errno::ENOENT),
            (Op::Readdir, 10, _) => {
                let entries = [
                    DirEntry { ino: 2, ftype: FileType::Regular, name: String::from("hello") },
                    DirEntry { ino: 3, ftype: FileType::Symlink, name: String::from("link") },
                ];
                Reply::ok(0, InodeInfo::default(), proto::encode_dirents(&entries))
            }
            (Op::Readlink, 12, _) => Reply::ok(0, InodeInfo::default(), Vec::from(&b"hello"[..])),
            (Op::GetPage, 11, _) if request.arg == 0 => Reply::ok(0, InodeInfo::default(), Vec::from(&b"world"[..])),
            _ => Reply::error(Errno::EINVAL),
        };
        // O caminho real passa pelos bytes do protocolo.
        let bytes = reply.encode();
        let mut at = 0;
        Reply::read_from(|buf| {
            buf.copy_from_slice(&bytes[at..at + buf.len()]);
            at += buf.len();
            Ok(())
        })
    }
}

fn test_userfs_tree() -> TestResult {
    let fs: Arc<dyn Filesystem> = Arc::new(UserFs::new("fs_test_ufs", Arc::new(FakeServer)));
    kcheck!(mount::register_filesystem(fs).is_ok(), "userfs registrado");
    kcheck!(vfs::mkdir(None, "/tmp/fs_ufs").is_ok(), "ponto de montagem");
    kcheck!(vfs::mount(None, "fs_test_ufs", "outro", "/tmp/fs_ufs") == Err(FsError::NotFound), "mount recusado pelo servidor");
    kcheck!(vfs::mount(None, "fs_test_ufs", "src", "/tmp/fs_ufs").is_ok(), "userfs montado");

    let names = list("/tmp/fs_ufs");
    kcheck!(names.map(|n| n.len() == 4 && n[2] == "hello" && n[3] == "link") == Ok(true), "readdir pelo servidor");
    kcheck!(read_all("/tmp/fs_ufs/hello").as_deref() == Ok(&b"world"[..]), "página vinda do servidor");
    kcheck!(vfs::readlink(None, "/tmp/fs_ufs/link").as_deref() == Ok("hello"), "readlink");
    kcheck!(read_all("/tmp/fs_ufs/link").as_deref() == Ok(&b"world"[..]), "symlink seguido no userfs");
    kcheck!(vfs::stat(None, "/tmp/fs_ufs/nada") == Err(FsError::NotFound), "ENOENT vira dentry negativa");
    kcheck!(vfs::touch(None, "/tmp/fs_ufs/novo") == Err(FsError::ReadOnly), "userfs somente leitura");

    kcheck!(vfs::unmount(None, "/tmp/fs_ufs").is_ok(), "desmontado");
    kcheck!(mount::unregister_filesystem("fs_test_ufs").is_some(), "registro removido");
    TestResult::Passed
}

fn test_userfs_reply_errors() -> TestResult {
    kcheck!(Reply::error(Errno::ENOENT).check() == Err(FsError::NotFound), "ENOENT");
    kcheck!(Reply::error(Errno::EROFS).check() == Err(FsError::ReadOnly), "EROFS");
    kcheck!(Reply::error(Errno::EPERM).check() == Err(FsError::Io), "erro sem tradução vira Io");

    let mut bytes = Reply::ok(1, InodeInfo::default(), Vec::new()).encode();
    bytes[0] ^= 0xff;
    let mut at = 0;
    let bad = Reply::read_from(|buf| {
        buf.copy_from_slice(&bytes[at..at + buf.len()]);
        at += buf.len();
        Ok(())
    });
    kcheck!(bad.err() == Some(FsError::Io), "magic inválido");

    let mut request = Request::new(Op::Lookup, 9);
    request.name = "x".repeat(proto::MAX_NAME + 1);
    let raw = request.encode();
    let mut at = 0;
    let parsed = Request::read_from(|buf| {
        let end = (at + buf.len()).min(raw.len());
        buf[..end - at].copy_from_slice(&raw[at..end]);
        at = end;
        Ok(())
    });
    kcheck!(parsed.err() == Some(FsError::NameTooLong), "nome longo demais no pedido");
    TestResult::Passed
}
