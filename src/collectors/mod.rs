pub mod events;
pub mod power;
pub mod resources;
pub mod services;
pub mod storage;
pub mod system;
pub mod thermal;

use crate::config::{Config, ConfigError};
use crate::context::RunContext;
use crate::host::Host;
use crate::snapshot::{Domain, Section, Value};
use serde::Serialize;
use std::sync::Arc;

/// Gathers one domain. `collect` must not fail: every probe failure ends up
/// as a diagnostic and a Null field in the returned section.
pub trait DomainCollector: Send + Sync {
    fn domain(&self) -> Domain;
    fn collect(&self, host: &dyn Host, ctx: &RunContext) -> Section;
}

/// Collectors for the configured domains, in configured order.
pub fn build(cfg: &Config) -> Result<Vec<Arc<dyn DomainCollector>>, ConfigError> {
    let mut out: Vec<Arc<dyn DomainCollector>> = Vec::with_capacity(cfg.domains.len());
    for domain in &cfg.domains {
        let collector: Arc<dyn DomainCollector> = match domain {
            Domain::System => Arc::new(system::SystemCollector),
            Domain::PowerProfile => Arc::new(power::PowerProfileCollector),
            Domain::ResourceUtilization => Arc::new(resources::ResourceCollector),
            Domain::Thermal => Arc::new(thermal::ThermalCollector),
            Domain::Storage => Arc::new(storage::StorageCollector),
            Domain::Services => Arc::new(
                services::ServiceCollector::from_config(&cfg.services)
                    .map_err(|err| ConfigError::Validation(err.to_string()))?,
            ),
            Domain::EventLog => Arc::new(events::EventLogCollector::new(
                cfg.events.channels.clone(),
            )),
        };
        out.push(collector);
    }
    Ok(out)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

pub(crate) fn bytes_to_gb(bytes: u64) -> f64 {
    round_to(bytes as f64 / 1024.0 / 1024.0 / 1024.0, 2)
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}
