//! Identificadores expostos ao userspace.
//!
//! Todos são `u32` no ABI: as syscalls recebem e devolvem o valor cru.

use core::fmt;

macro_rules! abi_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for usize {
            fn from(id: $name) -> usize {
                id.0 as usize
            }
        }
    };
}

abi_id!(
    /// Process ID. Os primeiros são reservados pelo boot.
    Pid
);
abi_id!(
    /// Thread ID, único no sistema todo.
    Tid
);
abi_id!(Uid);
abi_id!(Gid);

impl Pid {
    /// Processo do kernel (dono das kthreads e das threads ociosas).
    pub const KERNEL: Pid = Pid(0);
    pub const INIT: Pid = Pid(1);
    /// kthreadd: não recebe sinais de userspace.
    pub const KTHREADD: Pid = Pid(2);

    /// Processos criados pelo próprio kernel no boot.
    pub const fn is_kernel(self) -> bool {
        self.0 == Self::KERNEL.0 || self.0 == Self::KTHREADD.0
    }
}

impl Uid {
    pub const ROOT: Uid = Uid(0);
}

impl Gid {
    pub const ROOT: Gid = Gid(0);
}
