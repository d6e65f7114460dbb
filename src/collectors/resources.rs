use super::{bytes_to_gb, round_to, DomainCollector};
use crate::context::RunContext;
use crate::host::{Host, MemoryStatus};
use crate::probe::FallbackChain;
use crate::snapshot::{Domain, Section, SectionBuilder};

pub struct ResourceCollector;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryUsage {
    pub total_gb: f64,
    pub free_gb: f64,
    pub used_gb: f64,
    /// None when the host reports no memory at all.
    pub used_pct: Option<f64>,
}

pub fn memory_usage(status: MemoryStatus) -> MemoryUsage {
    let used = status.total_bytes.saturating_sub(status.free_bytes);
    MemoryUsage {
        total_gb: bytes_to_gb(status.total_bytes),
        free_gb: bytes_to_gb(status.free_bytes),
        used_gb: bytes_to_gb(used),
        used_pct: (status.total_bytes > 0)
            .then(|| round_to(used as f64 / status.total_bytes as f64 * 100.0, 1)),
    }
}

impl DomainCollector for ResourceCollector {
    fn domain(&self) -> Domain {
        Domain::ResourceUtilization
    }

    fn collect(&self, host: &dyn Host, _ctx: &RunContext) -> Section {
        let mut section = SectionBuilder::new(Domain::ResourceUtilization);

        let cpu = FallbackChain::new("cpu_load_pct")
            .then("perf_counter", || host.cpu_load_counter())
            .then("point_sample", || host.cpu_load_sample());
        let load = section.resolve(&cpu);
        section.set_opt("cpu_load_pct", load.value.map(|v| round_to(v, 1)));
        section.set_opt("cpu_load_source", load.source_name);

        let usage = section
            .probe("memory_status", || host.memory_status())
            .map(memory_usage);
        section.set_opt("memory_total_gb", usage.map(|u| u.total_gb));
        section.set_opt("memory_free_gb", usage.map(|u| u.free_gb));
        section.set_opt("memory_used_gb", usage.map(|u| u.used_gb));
        section.set_opt("memory_used_pct", usage.and_then(|u| u.used_pct));

        section.finish()
    }
}
