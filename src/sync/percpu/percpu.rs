//! Dados por CPU.
//!
//! Em builds uniprocessador (`smp` desligado, bare metal) existe um único slot; caso
//! contrário o slot é escolhido pelo id da CPU corrente. Estado global mutável por
//! CPU só existe através deste wrapper.

use crate::arch::{Cpu, CpuOps};
use crate::sched::config::MAX_CPUS;

pub struct PerCpu<T> {
    slots: [T; MAX_CPUS],
}

impl<T> PerCpu<T> {
    pub const fn new(slots: [T; MAX_CPUS]) -> Self {
        Self { slots }
    }

    /// Slot da CPU corrente.
    ///
    /// O chamador não pode migrar de CPU enquanto usa a referência
    /// (interrupções desabilitadas ou thread presa à CPU).
    #[inline]
    pub fn get(&self) -> &T {
        &self.slots[Self::index(Cpu::current_id())]
    }

    /// Slot de uma CPU específica.
    #[inline]
    pub fn get_for(&self, cpu: usize) -> &T {
        &self.slots[Self::index(cpu)]
    }

    #[inline]
    fn index(cpu: usize) -> usize {
        if MAX_CPUS == 1 {
            0
        } else {
            cpu % MAX_CPUS
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.slots.iter()
    }
}
