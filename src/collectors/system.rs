use super::{bytes_to_gb, encode, DomainCollector};
use crate::context::RunContext;
use crate::host::Host;
use crate::snapshot::{Domain, Section, SectionBuilder};

/// OS identity, hardware model, CPU, GPUs and installed memory.
pub struct SystemCollector;

impl DomainCollector for SystemCollector {
    fn domain(&self) -> Domain {
        Domain::System
    }

    fn collect(&self, host: &dyn Host, _ctx: &RunContext) -> Section {
        let mut section = SectionBuilder::new(Domain::System);

        let os = section.probe("os_identity", || host.os_identity());
        section.set_opt("os", os.as_ref().map(encode));

        let hardware = section.probe("hardware_model", || host.hardware_model());
        section.set_opt("hardware", hardware.as_ref().map(encode));

        section.capture("cpu_model", "cpu_brand", || host.cpu_model());

        let gpus = section.probe("display_adapters", || host.gpus());
        section.set_opt("gpus", gpus.as_ref().map(encode));

        let memory = section.probe("memory_status", || host.memory_status());
        section.set_opt(
            "total_memory_gb",
            memory.map(|m| bytes_to_gb(m.total_bytes)),
        );

        section.finish()
    }
}
