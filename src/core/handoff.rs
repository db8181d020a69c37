//! Interface de Handoff (Bootloader -> Kernel).
//! Define a estrutura de dados (ABI) passada pelo bootloader ao kernel.
//!
//! # Industrial Standard
//! - Structs `#[repr(C)]` para garantia de layout.
//! - Tipos primitivos (`u64`, `u32`) para portabilidade.
//! - Magic Number para validação de versão.

/// Assinatura mágica esperada do Bootloader ("MOSAIC!!").
pub const BOOT_MAGIC: u64 = 0x4D4F_5341_4943_2121;

/// Estrutura de informações de boot.
/// Deve ser mantida em sincronia binária exata com o Bootloader.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BootInfo {
    /// Assinatura para validação (deve ser igual a BOOT_MAGIC).
    pub magic: u64,

    /// Versão do protocolo de boot.
    pub version: u32,

    /// Offset do direct map (HHDM): `virt = phys + hhdm_offset`.
    pub hhdm_offset: u64,

    /// Mapa de memória física.
    pub memory_map_addr: u64,
    pub memory_map_len: u64,

    /// Linha de comando (UTF-8, sem terminador).
    pub cmdline_addr: u64,
    pub cmdline_len: u64,

    /// Localização física do Kernel.
    pub kernel_phys_addr: u64,
    pub kernel_size: u64,

    /// Endereço físico do initrd CPIO (se carregado).
    pub initrd_addr: u64,
    pub initrd_size: u64,

    /// Raiz de page table ativa no momento do handoff (PFN).
    pub boot_page_table: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MemoryMapEntry {
    pub base: u64,
    pub len: u64,
    pub typ: MemoryType,
}

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryType {
    Usable = 1,
    Reserved = 2,
    AcpiReclaimable = 3,
    AcpiNvs = 4,
    BadMemory = 5,
    BootloaderReclaimable = 6,
    KernelAndModules = 7,
    Framebuffer = 8,
}

impl BootInfo {
    pub fn is_valid(&self) -> bool {
        self.magic == BOOT_MAGIC
    }

    /// Entradas do mapa de memória.
    ///
    /// O bootloader garante que o array vive até o fim do boot (memória reclaimable).
    pub fn memory_map(&self) -> &[MemoryMapEntry] {
        if self.memory_map_addr == 0 || self.memory_map_len == 0 {
            return &[];
        }
        // SAFETY: endereço e tamanho vêm do handoff validado por `is_valid`.
        unsafe {
            ::core::slice::from_raw_parts(
                self.memory_map_addr as *const MemoryMapEntry,
                self.memory_map_len as usize,
            )
        }
    }

    /// Linha de comando crua (string vazia se ausente ou inválida).
    pub fn cmdline(&self) -> &str {
        if self.cmdline_addr == 0 || self.cmdline_len == 0 {
            return "";
        }
        // SAFETY: região fornecida pelo bootloader, somente leitura.
        let bytes = unsafe {
            ::core::slice::from_raw_parts(self.cmdline_addr as *const u8, self.cmdline_len as usize)
        };
        ::core::str::from_utf8(bytes).unwrap_or("")
    }
}
