//! Flags de mapeamento independentes de arquitetura.

use bitflags::bitflags;

bitflags! {
    /// Permissões de um VMA / PTE.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct VmFlags: u32 {
        const READ           = 1 << 0;
        const WRITE          = 1 << 1;
        const EXEC           = 1 << 2;
        const USER           = 1 << 3;
        const GLOBAL         = 1 << 4;
        const CACHE_DISABLED = 1 << 5;
        const WRITE_THROUGH  = 1 << 6;
    }
}

impl VmFlags {
    /// Flags usadas para tabelas intermediárias de usuário.
    pub const USER_TABLE: VmFlags = VmFlags::READ
        .union(VmFlags::WRITE)
        .union(VmFlags::EXEC)
        .union(VmFlags::USER);

    /// Flags usadas para tabelas intermediárias do kernel.
    pub const KERNEL_TABLE: VmFlags = VmFlags::READ.union(VmFlags::WRITE).union(VmFlags::EXEC);

    /// Converte proteção estilo POSIX (PROT_READ=1, WRITE=2, EXEC=4) em flags de usuário.
    pub fn from_prot(prot: usize) -> VmFlags {
        let mut flags = VmFlags::USER;
        if prot & 1 != 0 {
            flags |= VmFlags::READ;
        }
        if prot & 2 != 0 {
            flags |= VmFlags::READ | VmFlags::WRITE;
        }
        if prot & 4 != 0 {
            flags |= VmFlags::EXEC;
        }
        flags
    }

    /// Permissões de acesso (ignora USER/GLOBAL/cache).
    pub fn access(self) -> VmFlags {
        self & (VmFlags::READ | VmFlags::WRITE | VmFlags::EXEC)
    }
}
