//! # TLB Management e Shootdown
//!
//! Invalidação local (`invlpg` / `sfence.vma`) e remota via IPI.
//!
//! Cada CPU anuncia a raiz de page table que está usando (`note_active_root`). Uma
//! alteração numa raiz invalida a TLB local se a raiz estiver ativa aqui, e envia IPI
//! para as outras CPUs que a usam. Mapeamentos globais (kernel) vão para todas as
//! CPUs online. O remetente espera os ACKs num spin curto, limitado pelo número de
//! CPUs e por um timeout.
//!
//! Sem a feature `tlb_shootdown` só há invalidação local.

use crate::arch::{Cpu, CpuOps, IpiKind, Mmu, MmuOps};
use crate::mm::config::PAGE_SIZE;
use crate::mm::{Pfn, INVALID_PFN};
use crate::sched::config::MAX_CPUS;
use crate::sync::{PerCpu, Spinlock};
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Acima disto, flush completo em vez de página a página.
const FLUSH_ALL_THRESHOLD: usize = 32;

/// Timeout para aguardar ACKs de shootdown (em iterações do spin loop)
pub const SHOOTDOWN_TIMEOUT: u64 = 10_000_000;

/// Pedido de invalidação entregue a uma CPU.
struct Mailbox {
    root: AtomicUsize,
    vaddr: AtomicUsize,
    npages: AtomicUsize,
    pending: AtomicBool,
}

impl Mailbox {
    const fn new() -> Self {
        Self {
            root: AtomicUsize::new(INVALID_PFN),
            vaddr: AtomicUsize::new(0),
            npages: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
        }
    }
}

static MAILBOX: PerCpu<Mailbox> = PerCpu::new([const { Mailbox::new() }; MAX_CPUS]);

/// Raiz em uso por CPU.
static ACTIVE_ROOT: PerCpu<AtomicUsize> = PerCpu::new([const { AtomicUsize::new(INVALID_PFN) }; MAX_CPUS]);

/// Um shootdown por vez.
static SHOOTDOWN_LOCK: Spinlock<()> = Spinlock::new(());

/// Estatísticas de TLB para telemetria
pub struct TlbStats {
    pub local_invalidations: AtomicU64,
    pub full_flushes: AtomicU64,
    pub shootdowns: AtomicU64,
    pub shootdown_timeouts: AtomicU64,
}

impl TlbStats {
    pub const fn new() -> Self {
        Self {
            local_invalidations: AtomicU64::new(0),
            full_flushes: AtomicU64::new(0),
            shootdowns: AtomicU64::new(0),
            shootdown_timeouts: AtomicU64::new(0),
        }
    }
}

/// Estatísticas globais de TLB
pub static TLB_STATS: TlbStats = TlbStats::new();

/// Registra que esta CPU passou a usar `root`.
pub fn note_active_root(root: Pfn) {
    ACTIVE_ROOT.get().store(root, Ordering::Release);
}

pub fn active_root() -> Pfn {
    ACTIVE_ROOT.get().load(Ordering::Acquire)
}

/// Invalida uma faixa nesta CPU.
pub fn invalidate_local(vaddr: usize, npages: usize) {
    if npages > FLUSH_ALL_THRESHOLD {
        Mmu::flush_all();
        TLB_STATS.full_flushes.fetch_add(1, Ordering::Relaxed);
    } else {
        for i in 0..npages {
            Mmu::invalidate_page(vaddr + i * PAGE_SIZE);
        }
        TLB_STATS.local_invalidations.fetch_add(npages as u64, Ordering::Relaxed);
    }
}

/// Invalida `[vaddr, vaddr + npages)` de `root` onde quer que esteja ativa.
///
/// `global` força o envio a todas as CPUs online (mapeamentos do kernel).
pub fn invalidate(root: Pfn, vaddr: usize, npages: usize, global: bool) {
    if global || active_root() == root {
        invalidate_local(vaddr, npages);
    }

    #[cfg(feature = "tlb_shootdown")]
    shootdown(root, vaddr, npages, global);
}

#[cfg(feature = "tlb_shootdown")]
fn shootdown(root: Pfn, vaddr: usize, npages: usize, global: bool) {
    let me = Cpu::current_id();
    let mut targets = 0u64;
    for cpu in crate::sched::online_cpus() {
        if cpu == me {
            continue;
        }
        let their_root = ACTIVE_ROOT.get_for(cpu).load(Ordering::Acquire);
        if global || their_root == root {
            targets |= 1 << cpu;
        }
    }
    if targets == 0 {
        return;
    }

    let _guard = SHOOTDOWN_LOCK.lock();
    TLB_STATS.shootdowns.fetch_add(1, Ordering::Relaxed);

    for cpu in 0..MAX_CPUS {
        if targets & (1 << cpu) == 0 {
            continue;
        }
        let mb = MAILBOX.get_for(cpu);
        mb.root.store(if global { INVALID_PFN } else { root }, Ordering::Relaxed);
        mb.vaddr.store(vaddr, Ordering::Relaxed);
        mb.npages.store(npages, Ordering::Relaxed);
        mb.pending.store(true, Ordering::Release);
        if Cpu::send_ipi(cpu, IpiKind::TlbShootdown).is_err() {
            // Sem IPI a CPU alvo nunca responderia.
            mb.pending.store(false, Ordering::Release);
        }
    }

    let mut spins = 0u64;
    for cpu in 0..MAX_CPUS {
        if targets & (1 << cpu) == 0 {
            continue;
        }
        while MAILBOX.get_for(cpu).pending.load(Ordering::Acquire) {
            spins += 1;
            if spins > SHOOTDOWN_TIMEOUT {
                TLB_STATS.shootdown_timeouts.fetch_add(1, Ordering::Relaxed);
                crate::kwarn!("(TLB) Timeout aguardando ACK da CPU ", cpu);
                break;
            }
            Cpu::relax();
        }
    }
}

#[cfg(not(feature = "tlb_shootdown"))]
#[allow(dead_code)]
fn shootdown(_root: Pfn, _vaddr: usize, _npages: usize, _global: bool) {}

/// Processa o pedido pendente da CPU `cpu` e confirma.
pub fn acknowledge(cpu: usize) {
    let mb = MAILBOX.get_for(cpu);
    if !mb.pending.load(Ordering::Acquire) {
        return;
    }
    let root = mb.root.load(Ordering::Relaxed);
    let active = ACTIVE_ROOT.get_for(cpu).load(Ordering::Acquire);
    if root == INVALID_PFN || root == active {
        invalidate_local(mb.vaddr.load(Ordering::Relaxed), mb.npages.load(Ordering::Relaxed));
    }
    mb.pending.store(false, Ordering::Release);
}

/// Handler do IPI de shootdown.
pub fn handle_ipi() {
    acknowledge(Cpu::current_id());
}

/// Ativa `root` nesta CPU.
///
/// # Safety
/// `root` deve conter a metade do kernel.
pub unsafe fn switch_root(root: Pfn) {
    if active_root() != root {
        Mmu::switch_root(root);
        note_active_root(root);
    }
}
