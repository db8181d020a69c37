//! # Syscall Numbers
//!
//! Numeração estável da ABI. Agrupada por faixa:
//!
//! | Faixa       | Categoria           |
//! |-------------|---------------------|
//! | 0x01 - 0x0F | Processos           |
//! | 0x10 - 0x1F | Threads             |
//! | 0x20 - 0x2F | Memória             |
//! | 0x30 - 0x3F | E/S                 |
//! | 0x40 - 0x4F | Filesystem          |
//! | 0x50 - 0x5F | Sincronização / IPC |
//! | 0x60 - 0x6F | Sinais              |
//! | 0xF0 - 0xFF | Sistema             |
//!
//! Strings são ponteiros para bytes terminados em NUL. Retorno não negativo é
//! sucesso; negativo é `-errno`.

// ============================================================================
// PROCESSOS (0x01 - 0x0F)
// ============================================================================

/// Args: (code). Não retorna.
pub const SYS_EXIT: usize = 0x01;

/// Retorno: pid do filho no pai, 0 no filho.
pub const SYS_FORK: usize = 0x02;

/// Args: (path, argv, envp). Não retorna em caso de sucesso.
pub const SYS_EXEC: usize = 0x03;

/// Args: (path, argv, envp). Retorno: pid.
pub const SYS_SPAWN: usize = 0x04;

/// Args: (pid). Retorno: código de saída.
pub const SYS_WAIT_FOR_PROCESS: usize = 0x05;

pub const SYS_GET_PID: usize = 0x06;
pub const SYS_GET_PARENT_PID: usize = 0x07;
pub const SYS_YIELD_CPU: usize = 0x08;

// ============================================================================
// THREADS (0x10 - 0x1F)
// ============================================================================

/// Args: (entry, arg, stack_top). `stack_top` 0 = o kernel aloca. Retorno: tid.
pub const SYS_CREATE_THREAD: usize = 0x10;
pub const SYS_GET_TID: usize = 0x11;
/// Args: (code). Não retorna.
pub const SYS_THREAD_EXIT: usize = 0x12;
/// Args: (tid). Retorno: código de saída da thread.
pub const SYS_WAIT_FOR_THREAD: usize = 0x13;

// ============================================================================
// MEMÓRIA (0x20 - 0x2F)
// ============================================================================

/// Args: (hint, npages, prot, flags). Retorno: endereço.
pub const SYS_MMAP_ANONYMOUS: usize = 0x20;
/// Args: (hint, npages, prot, flags, fd, offset). Retorno: endereço.
pub const SYS_MMAP_FILE: usize = 0x21;
/// Args: (addr, npages).
pub const SYS_MUNMAP: usize = 0x22;
/// Args: (addr, npages, prot).
pub const SYS_VM_PROTECT: usize = 0x23;
/// Args: (op, value). Ver `HEAP_*`.
pub const SYS_HEAP_CONTROL: usize = 0x24;

pub const HEAP_GET_BASE: usize = 0;
pub const HEAP_GET_TOP: usize = 1;
pub const HEAP_SET_TOP: usize = 2;
pub const HEAP_GET_SIZE: usize = 3;
pub const HEAP_GROW_PAGES: usize = 4;

// ============================================================================
// E/S (0x30 - 0x3F)
// ============================================================================

/// Args: (fd, buf, len). Retorno: bytes lidos (0 = fim).
pub const SYS_IO_READ: usize = 0x30;
/// Args: (fd, buf, len). Retorno: bytes escritos.
pub const SYS_IO_WRITE: usize = 0x31;
/// Args: (fd).
pub const SYS_IO_CLOSE: usize = 0x32;
/// Args: (fds_out). Escreve dois u32: leitura e escrita.
pub const SYS_PIPE: usize = 0x33;

// ============================================================================
// FILESYSTEM (0x40 - 0x4F)
// ============================================================================

/// Args: (path, flags). Retorno: fd.
pub const SYS_VFS_OPEN: usize = 0x40;
/// Args: (path, stat_out). Não segue o último symlink.
pub const SYS_VFS_STAT: usize = 0x41;
/// Args: (fd, stat_out).
pub const SYS_VFS_FSTAT: usize = 0x42;
/// Args: (fs_name, source, target).
pub const SYS_VFS_MOUNT: usize = 0x43;
/// Args: (target).
pub const SYS_VFS_UNMOUNT: usize = 0x44;
/// Args: (path, buf, len). Retorno: bytes copiados.
pub const SYS_VFS_READLINK: usize = 0x45;
/// Args: (path).
pub const SYS_VFS_TOUCH: usize = 0x46;
/// Args: (path, target).
pub const SYS_VFS_SYMLINK: usize = 0x47;
/// Args: (path).
pub const SYS_VFS_MKDIR: usize = 0x48;
/// Args: (fd, buf, len). Retorno: bytes de registros, 0 no fim.
pub const SYS_VFS_LIST_DIR: usize = 0x49;
/// Args: (path).
pub const SYS_VFS_CHDIR: usize = 0x4A;
/// Args: (buf, len). Retorno: tamanho com o NUL.
pub const SYS_VFS_GETCWD: usize = 0x4B;
/// Args: (fs_name, server_name).
pub const SYS_VFS_REGISTER_USERFS: usize = 0x4C;

// ============================================================================
// SINCRONIZAÇÃO / IPC (0x50 - 0x5F)
// ============================================================================

/// Args: (addr, expected).
pub const SYS_FUTEX_WAIT: usize = 0x50;
/// Args: (addr, count). Retorno: threads acordadas.
pub const SYS_FUTEX_WAKE: usize = 0x51;
/// Args: (name, max_pending). Retorno: fd do servidor.
pub const SYS_IPC_CREATE: usize = 0x52;
/// Args: (server_fd, buffers_out). Retorno: fd da conexão.
pub const SYS_IPC_ACCEPT: usize = 0x53;
/// Args: (name, size, buffers_out). Retorno: fd da conexão.
pub const SYS_IPC_CONNECT: usize = 0x54;

// ============================================================================
// SINAIS (0x60 - 0x6F)
// ============================================================================

/// Args: (sig, new_action, old_action). Ponteiros podem ser 0.
pub const SYS_SIGACTION: usize = 0x60;
/// Restaura o contexto salvo na entrega do sinal.
pub const SYS_SIGRETURN: usize = 0x61;
/// Args: (pid, sig).
pub const SYS_KILL: usize = 0x62;

// ============================================================================
// SISTEMA (0xF0 - 0xFF)
// ============================================================================

/// Args: (reboot, magic).
pub const SYS_POWEROFF: usize = 0xF0;
/// Args: (nr, a1, a2, a3, a4).
pub const SYS_ARCH_SYSCALL: usize = 0xF1;

/// `arch_syscall` 0: índice da CPU corrente.
pub const ARCH_CPU_ID: usize = 0;
