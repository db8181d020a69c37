//! # Configuração do Módulo de Memória
//!
//! Constantes de tamanho e layout do espaço de endereçamento.

// =============================================================================
// CONSTANTES DE TAMANHO
// =============================================================================

/// Tamanho de uma página (4 KiB)
pub const PAGE_SIZE: usize = 4096;

/// Bits de offset dentro de uma página
pub const PAGE_SHIFT: usize = 12;

/// Máscara para alinhar endereços a página
pub const PAGE_MASK: usize = !(PAGE_SIZE - 1);

/// Tamanho de uma huge page de nível 2 (2 MiB)
pub const HUGE_PAGE_SIZE: usize = 2 * 1024 * 1024;

/// Memória abaixo deste limite é sempre Reserved (firmware, BIOS, trampolins).
pub const LOW_MEMORY_LIMIT: usize = 1024 * 1024;

// =============================================================================
// LAYOUT DE MEMÓRIA VIRTUAL (USUÁRIO)
// =============================================================================
//
// ```text
// 0x0000_0000_0000_0000  página nula (nunca mapeada)
// 0x0000_0000_0040_0000  imagens ELF (endereços do link)
// 0x0000_1000_0000_0000  heap inicial (quando o ELF não fixa outro lugar)
// 0x0000_2000_0000_0000  região de mmap (busca crescente)
// 0x0000_7FFF_FFFF_0000  topo da stack da thread principal
// 0x0000_8000_0000_0000  fim do espaço de usuário (metade baixa)
// ```

/// Primeiro endereço válido para mapeamentos de usuário.
pub const USER_SPACE_START: usize = 0x0000_0000_0001_0000;

/// Fim (exclusivo) do espaço de usuário.
pub const USER_SPACE_END: usize = 0x0000_8000_0000_0000;

/// Base padrão do heap de usuário.
pub const USER_HEAP_BASE: usize = 0x0000_1000_0000_0000;

/// Início da busca por regiões livres de mmap.
pub const USER_MMAP_BASE: usize = 0x0000_2000_0000_0000;

/// Topo da stack da thread principal.
pub const USER_STACK_TOP: usize = 0x0000_7FFF_FFFF_0000;

/// Páginas de stack de cada thread de usuário.
pub const USER_STACK_PAGES: usize = 32;

/// Distância entre stacks de threads adicionais.
pub const USER_STACK_STRIDE: usize = (USER_STACK_PAGES + 16) * PAGE_SIZE;

/// Páginas de stack de kernel por thread.
pub const KERNEL_STACK_PAGES: usize = 4;

/// Índice da primeira entrada do PML4 da metade do kernel.
pub const KERNEL_PML4_START: usize = 256;

/// Endereços abaixo disto numa falha sugerem deref de ponteiro nulo (só diagnóstico).
pub const NULL_GUARD_LIMIT: usize = 1024;

// =============================================================================
// HEAP DO KERNEL
// =============================================================================

/// Arena estática do heap do kernel (bare metal).
pub const KERNEL_HEAP_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// PLATAFORMA HOSPEDADA
// =============================================================================

/// RAM simulada da plataforma hospedada (inclui o 1 MiB baixo reservado).
pub const HOSTED_RAM_SIZE: usize = 128 * 1024 * 1024;
