mod percpu;

pub use percpu::PerCpu;
