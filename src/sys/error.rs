//! # Standard Error Codes (Errno)
//!
//! Códigos de erro que cruzam a fronteira de syscall. Numeração POSIX/Linux; o
//! retorno em registrador é o valor negado (`as_isize`).
//!
//! Os subsistemas têm enums próprios (`MmError`, `FsError`, `IpcError`, `TaskError`)
//! que convertem para `Errno` com `From`.

use core::fmt;

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Errno {
    EPERM = 1,         // Operation not permitted
    ENOENT = 2,        // No such file or directory
    ESRCH = 3,         // No such process
    EINTR = 4,         // Interrupted system call
    EIO = 5,           // I/O error
    ENXIO = 6,         // No such device or address
    E2BIG = 7,         // Argument list too long
    ENOEXEC = 8,       // Exec format error
    EBADF = 9,         // Bad file number
    ECHILD = 10,       // No child processes
    EAGAIN = 11,       // Try again
    ENOMEM = 12,       // Out of memory
    EACCES = 13,       // Permission denied
    EFAULT = 14,       // Bad address
    EBUSY = 16,        // Device or resource busy
    EEXIST = 17,       // File exists
    EXDEV = 18,        // Cross-device link
    ENODEV = 19,       // No such device
    ENOTDIR = 20,      // Not a directory
    EISDIR = 21,       // Is a directory
    EINVAL = 22,       // Invalid argument
    ENFILE = 23,       // File table overflow
    EMFILE = 24,       // Too many open files
    ENOTTY = 25,       // Not a typewriter
    EFBIG = 27,        // File too large
    ENOSPC = 28,       // No space left on device
    ESPIPE = 29,       // Illegal seek
    EROFS = 30,        // Read-only file system
    EMLINK = 31,       // Too many links
    EPIPE = 32,        // Broken pipe
    ERANGE = 34,       // Math result not representable
    ENAMETOOLONG = 36, // File name too long
    ENOSYS = 38,       // Function not implemented
    ENOTEMPTY = 39,    // Directory not empty
    ELOOP = 40,        // Too many symbolic links encountered
    ECONNABORTED = 103, // Software caused connection abort
    ECONNRESET = 104,  // Connection reset by peer
    ENOTCONN = 107,    // Transport endpoint is not connected
    ECONNREFUSED = 111, // Connection refused

    /// Syscall interrompida por sinal; nunca chega ao userspace.
    ERESTARTSYS = 512,
}

impl Errno {
    pub fn as_usize(self) -> usize {
        self as usize
    }

    pub fn as_isize(self) -> isize {
        -(self as i32) as isize
    }

    /// Converte o valor negativo de retorno de syscall de volta em `Errno`.
    pub fn from_isize(value: isize) -> Option<Errno> {
        use Errno::*;
        const ALL: [Errno; 40] = [
            EPERM, ENOENT, ESRCH, EINTR, EIO, ENXIO, E2BIG, ENOEXEC, EBADF, ECHILD, EAGAIN,
            ENOMEM, EACCES, EFAULT, EBUSY, EEXIST, EXDEV, ENODEV, ENOTDIR, EISDIR, EINVAL,
            ENFILE, EMFILE, ENOTTY, EFBIG, ENOSPC, ESPIPE, EROFS, EMLINK, EPIPE, ERANGE,
            ENAMETOOLONG, ENOSYS, ENOTEMPTY, ELOOP, ECONNREFUSED, ENOTCONN, ECONNRESET, ECONNABORTED,
            ERESTARTSYS,
        ];
        ALL.iter().copied().find(|e| e.as_isize() == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Errno::EPERM => "operation not permitted",
            Errno::ENOENT => "no such file or directory",
            Errno::ESRCH => "no such process",
            Errno::EINTR => "interrupted system call",
            Errno::EIO => "i/o error",
            Errno::EBADF => "bad file descriptor",
            Errno::ECHILD => "no child processes",
            Errno::EAGAIN => "try again",
            Errno::ENOMEM => "out of memory",
            Errno::EFAULT => "bad address",
            Errno::EBUSY => "resource busy",
            Errno::EEXIST => "file exists",
            Errno::ENOTDIR => "not a directory",
            Errno::EISDIR => "is a directory",
            Errno::EINVAL => "invalid argument",
            Errno::ENOSYS => "function not implemented",
            Errno::EPIPE => "broken pipe",
            Errno::ELOOP => "too many symbolic links",
            Errno::ERESTARTSYS => "restart syscall",
            _ => "error",
        }
    }
}

impl fmt::Display for Errno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (errno {})", self.as_str(), *self as i32)
    }
}

/// Resultado de syscall.
pub type SysResult<T> = Result<T, Errno>;
