mod command;
#[cfg(test)]
pub mod fake;
#[cfg(any(target_os = "linux", test))]
mod linux;
mod local;
#[cfg(any(target_os = "windows", test))]
mod windows;

pub use local::LocalHost;

use crate::probe::ProbeError;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OsIdentity {
    pub name: Option<String>,
    pub version: Option<String>,
    pub long_version: Option<String>,
    pub kernel: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HardwareModel {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuAdapter {
    pub name: String,
    pub driver_version: Option<String>,
    pub memory_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MemoryStatus {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

/// Raw reading in the platform thermal-zone unit (tenths of a Kelvin).
#[derive(Debug, Clone, PartialEq)]
pub struct ThermalZone {
    pub name: String,
    pub raw_tenths_kelvin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalDisk {
    pub id: String,
    pub name: Option<String>,
    pub bus_type: Option<String>,
    pub media_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub health_status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiskReliability {
    pub wear_pct: Option<f64>,
    pub media_errors: Option<u64>,
    pub temperature_c: Option<f64>,
    pub predicted_failure: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceEntry {
    pub name: String,
    pub display_name: String,
    pub status: String,
    pub start_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EventQuery<'a> {
    pub channel: &'a str,
    pub lookback: Duration,
    pub max_events: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventEntry {
    pub timestamp: String,
    pub level: String,
    pub event_id: u32,
    pub provider: String,
    pub message: String,
}

/// Read-only access to the facilities of the machine being inspected.
///
/// Every method is a single probe: it either answers or fails with a
/// [`ProbeError`]; nothing here may change system state.
pub trait Host: Send + Sync {
    fn host_name(&self) -> Result<String, ProbeError>;
    fn os_identity(&self) -> Result<OsIdentity, ProbeError>;
    fn hardware_model(&self) -> Result<HardwareModel, ProbeError>;
    fn cpu_model(&self) -> Result<String, ProbeError>;
    fn gpus(&self) -> Result<Vec<GpuAdapter>, ProbeError>;
    fn memory_status(&self) -> Result<MemoryStatus, ProbeError>;

    fn active_power_scheme(&self) -> Result<String, ProbeError>;
    fn processor_power_settings(&self) -> Result<String, ProbeError>;

    /// CPU load from the continuous performance-counter interface.
    fn cpu_load_counter(&self) -> Result<f64, ProbeError>;
    /// CPU load from two point samples taken a short interval apart.
    fn cpu_load_sample(&self) -> Result<f64, ProbeError>;

    fn thermal_zones(&self) -> Result<Vec<ThermalZone>, ProbeError>;
    /// Fan readings from a hardware-monitor sensor namespace.
    fn vendor_fans(&self) -> Result<Vec<Value>, ProbeError>;
    /// Fan readings from the platform's generic fan class.
    fn generic_fans(&self) -> Result<Vec<Value>, ProbeError>;

    fn physical_disks(&self) -> Result<Vec<PhysicalDisk>, ProbeError>;
    fn disk_reliability(&self, disk: &PhysicalDisk) -> Result<DiskReliability, ProbeError>;
    /// Raw text of the delete-notification (TRIM) behaviour query.
    fn delete_notify_status(&self) -> Result<String, ProbeError>;

    fn services(&self) -> Result<Vec<ServiceEntry>, ProbeError>;
    fn events(&self, query: &EventQuery<'_>) -> Result<Vec<EventEntry>, ProbeError>;
}
