use super::{round_to, DomainCollector};
use crate::context::RunContext;
use crate::host::Host;
use crate::probe::{FallbackChain, ProbeError};
use crate::snapshot::{Domain, Section, SectionBuilder, Value};
use serde_json::json;

pub struct ThermalCollector;

/// Platform thermal zones report tenths of a Kelvin.
pub fn tenths_kelvin_to_celsius(raw: f64) -> f64 {
    round_to(raw / 10.0 - 273.15, 1)
}

// A sensor source that answers with no fans is treated as a failed source.
fn require_fans(fans: Result<Vec<Value>, ProbeError>) -> Result<Vec<Value>, ProbeError> {
    let fans = fans?;
    if fans.is_empty() {
        return Err(ProbeError::Empty("fans"));
    }
    Ok(fans)
}

impl DomainCollector for ThermalCollector {
    fn domain(&self) -> Domain {
        Domain::Thermal
    }

    fn collect(&self, host: &dyn Host, _ctx: &RunContext) -> Section {
        let mut section = SectionBuilder::new(Domain::Thermal);

        let zones = section.probe("thermal_zones", || host.thermal_zones());
        section.set_opt(
            "thermal_zones",
            zones.map(|zones| {
                zones
                    .iter()
                    .map(|z| {
                        json!({
                            "name": z.name,
                            "raw": z.raw_tenths_kelvin,
                            "celsius": tenths_kelvin_to_celsius(z.raw_tenths_kelvin),
                        })
                    })
                    .collect::<Vec<_>>()
            }),
        );

        let fans = FallbackChain::new("fans")
            .then("vendor", || require_fans(host.vendor_fans()))
            .then("generic", || require_fans(host.generic_fans()));
        let fans = section.resolve(&fans);
        section.set("fans", fans.value.unwrap_or_default());
        section.set_opt("fan_source", fans.source_name);

        section.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::host::fake::FakeHost;
    use crate::host::ThermalZone;
    use crate::snapshot::{SectionStatus, Severity};
    use std::time::SystemTime;

    fn ctx() -> RunContext {
        RunContext::new(&Config::default(), SystemTime::now())
    }

    #[test]
    fn converts_tenths_of_kelvin() {
        assert!((tenths_kelvin_to_celsius(2881.0) - 14.95).abs() < 0.051);
        assert_eq!(tenths_kelvin_to_celsius(2981.5), 25.0);
        assert_eq!(tenths_kelvin_to_celsius(2731.5), 0.0);
    }

    #[test]
    fn zones_carry_raw_and_celsius() {
        let mut host = FakeHost::healthy();
        host.thermal_zones = Some(vec![ThermalZone {
            name: "TZ01".to_string(),
            raw_tenths_kelvin: 2881.0,
        }]);
        let section = ThermalCollector.collect(&host, &ctx());
        let zone = &section.fields["thermal_zones"][0];
        assert_eq!(zone["name"], "TZ01");
        assert_eq!(zone["raw"], 2881.0);
        let celsius = zone["celsius"].as_f64().expect("celsius");
        assert!((celsius - 14.95).abs() < 0.051);
        assert_eq!(section.field("fan_source"), Some(&Value::from("vendor")));
    }

    #[test]
    fn generic_fans_win_when_vendor_sensors_are_missing() {
        let mut host = FakeHost::healthy();
        host.vendor_fans = None;
        let section = ThermalCollector.collect(&host, &ctx());
        assert_eq!(section.field("fan_source"), Some(&Value::from("generic")));
        assert!(!section.fields["fans"]
            .as_array()
            .expect("fans list")
            .is_empty());
        assert_eq!(section.notes.len(), 1);
        assert_eq!(section.notes[0].source_name, "vendor");
    }

    #[test]
    fn empty_vendor_answer_falls_through() {
        let mut host = FakeHost::healthy();
        host.vendor_fans = Some(Vec::new());
        let section = ThermalCollector.collect(&host, &ctx());
        assert_eq!(section.field("fan_source"), Some(&Value::from("generic")));
    }

    #[test]
    fn no_fan_source_gives_empty_list_and_null_source() {
        let mut host = FakeHost::healthy();
        host.vendor_fans = None;
        host.generic_fans = Some(Vec::new());
        let section = ThermalCollector.collect(&host, &ctx());
        assert_eq!(section.field("fans"), Some(&Value::Array(Vec::new())));
        assert_eq!(section.field("fan_source"), Some(&Value::Null));
        let sources: Vec<&str> = section
            .notes
            .iter()
            .map(|n| n.source_name.as_str())
            .collect();
        assert_eq!(sources, vec!["vendor", "generic"]);
        assert!(section.notes.iter().all(|n| n.severity == Severity::Warning));
    }

    #[test]
    fn thermal_interface_failure_nulls_zones_only() {
        let mut host = FakeHost::healthy();
        host.thermal_zones = None;
        let section = ThermalCollector.collect(&host, &ctx());
        assert_eq!(section.field("thermal_zones"), Some(&Value::Null));
        assert_eq!(section.field("fan_source"), Some(&Value::from("vendor")));
    }

    #[test]
    fn nothing_answering_is_still_partial() {
        // `fans` is always a list, so the section never reaches Unavailable.
        let section = ThermalCollector.collect(&FakeHost::default(), &ctx());
        assert_eq!(section.field("thermal_zones"), Some(&Value::Null));
        assert_eq!(section.field("fan_source"), Some(&Value::Null));
        assert_eq!(section.field("fans"), Some(&Value::Array(Vec::new())));
        assert_eq!(section.status, SectionStatus::Partial);
        assert_eq!(section.warnings(), 3);
    }
}
