use super::DomainCollector;
use crate::context::RunContext;
use crate::host::Host;
use crate::snapshot::{Domain, Section, SectionBuilder};

/// Active power scheme and processor power settings, kept as the raw text
/// the platform reports.
pub struct PowerProfileCollector;

impl DomainCollector for PowerProfileCollector {
    fn domain(&self) -> Domain {
        Domain::PowerProfile
    }

    fn collect(&self, host: &dyn Host, _ctx: &RunContext) -> Section {
        let mut section = SectionBuilder::new(Domain::PowerProfile);
        section.capture("active_scheme", "active_power_scheme", || {
            host.active_power_scheme().map(|s| s.trim().to_string())
        });
        section.capture("processor_power_settings", "processor_power_settings", || {
            host.processor_power_settings().map(|s| s.trim().to_string())
        });
        section.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::fake::FakeHost;
    use crate::snapshot::{SectionStatus, Value};
    use std::time::SystemTime;

    #[test]
    fn scheme_text_is_trimmed_and_settings_may_fail() {
        let mut host = FakeHost::healthy();
        host.power_scheme = Some("  Power Scheme GUID: abc (Balanced)\r\n".to_string());
        host.processor_settings = None;
        let ctx = RunContext::new(&Config::default(), SystemTime::now());

        let section = PowerProfileCollector.collect(&host, &ctx);
        assert_eq!(
            section.field("active_scheme"),
            Some(&Value::from("Power Scheme GUID: abc (Balanced)"))
        );
        assert_eq!(section.field("processor_power_settings"), Some(&Value::Null));
        assert_eq!(section.status, SectionStatus::Partial);
        assert_eq!(section.notes[0].source_name, "processor_power_settings");
    }
}
