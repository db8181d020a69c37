//! Tipos de Erro do Subsistema de Memória
//!
//! Define erros estruturados para diagnóstico preciso de falhas em MM.

use crate::sys::Errno;

/// Erros do subsistema de memória
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MmError {
    /// Sem memória física disponível (OOM)
    OutOfMemory,
    /// Endereço não alinhado corretamente
    InvalidAlignment,
    /// Região já mapeada / já reivindicada
    AlreadyMapped,
    /// Região não mapeada
    NotMapped,
    /// Parâmetro inválido
    InvalidParameter,
    /// Violação de política W^X (Write XOR Execute)
    WxViolation,
    /// Endereço inválido (não canônico ou fora de range)
    InvalidAddress,
    /// Tamanho inválido (zero ou muito grande)
    InvalidSize,
    /// Sem espaço virtual livre do tamanho pedido
    NoVirtualSpace,
    /// Frame não está livre (allocate_at)
    FrameBusy,
    /// Acesso a memória de usuário não resolvível (copy_from/to_user)
    BadUserAddress,
    /// O backing (inode) não forneceu a página
    BackingFailed,
}

impl MmError {
    /// Retorna descrição legível do erro
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutOfMemory => "OOM: sem frames físicos disponíveis",
            Self::InvalidAlignment => "Endereço não alinhado",
            Self::AlreadyMapped => "Região já mapeada",
            Self::NotMapped => "Região não mapeada",
            Self::InvalidParameter => "Parâmetro inválido",
            Self::WxViolation => "Violação W^X: página RWX não permitida",
            Self::InvalidAddress => "Endereço inválido",
            Self::InvalidSize => "Tamanho inválido",
            Self::NoVirtualSpace => "Sem espaço virtual livre",
            Self::FrameBusy => "Frame físico ocupado",
            Self::BadUserAddress => "Endereço de usuário inválido",
            Self::BackingFailed => "Backing não forneceu a página",
        }
    }
}

impl core::fmt::Display for MmError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<MmError> for Errno {
    fn from(e: MmError) -> Errno {
        match e {
            MmError::OutOfMemory | MmError::NoVirtualSpace => Errno::ENOMEM,
            MmError::BadUserAddress => Errno::EFAULT,
            MmError::BackingFailed => Errno::EIO,
            MmError::AlreadyMapped => Errno::EEXIST,
            MmError::FrameBusy => Errno::EBUSY,
            _ => Errno::EINVAL,
        }
    }
}

/// Tipo Result específico para operações de memória
pub type MmResult<T> = Result<T, MmError>;
