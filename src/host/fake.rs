//! Scripted host for collector and assembler tests. Every `None` answers
//! with a probe failure.

use super::{
    DiskReliability, EventEntry, EventQuery, GpuAdapter, HardwareModel, Host, MemoryStatus,
    OsIdentity, PhysicalDisk, ServiceEntry, ThermalZone,
};
use crate::probe::ProbeError;
use serde_json::{json, Value};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct FakeHost {
    pub host_name: Option<String>,
    pub os: Option<OsIdentity>,
    pub hardware: Option<HardwareModel>,
    pub cpu_model: Option<String>,
    pub gpus: Option<Vec<GpuAdapter>>,
    pub memory: Option<MemoryStatus>,
    pub power_scheme: Option<String>,
    pub processor_settings: Option<String>,
    pub cpu_counter: Option<f64>,
    pub cpu_sample: Option<f64>,
    pub thermal_zones: Option<Vec<ThermalZone>>,
    pub vendor_fans: Option<Vec<Value>>,
    pub generic_fans: Option<Vec<Value>>,
    pub disks: Option<Vec<PhysicalDisk>>,
    /// Keyed by disk id; a missing id fails the reliability probe.
    pub reliability: HashMap<String, DiskReliability>,
    pub delete_notify: Option<String>,
    pub services: Option<Vec<ServiceEntry>>,
    /// Keyed by channel; a missing channel fails the query.
    pub events: HashMap<String, Vec<EventEntry>>,
}

fn missing<T>(what: &'static str) -> Result<T, ProbeError> {
    Err(ProbeError::Unsupported(what))
}

pub fn service(name: &str, display_name: &str, status: &str) -> ServiceEntry {
    ServiceEntry {
        name: name.to_string(),
        display_name: display_name.to_string(),
        status: status.to_string(),
        start_type: Some("Automatic".to_string()),
    }
}

pub fn event(channel: &str, event_id: u32) -> EventEntry {
    EventEntry {
        timestamp: "2026-10-15T06:00:00Z".to_string(),
        level: "Warning".to_string(),
        event_id,
        provider: format!("{channel}-Provider"),
        message: format!("event {event_id}"),
    }
}

impl FakeHost {
    /// A host on which every probe answers.
    pub fn healthy() -> Self {
        let disk = PhysicalDisk {
            id: "0".to_string(),
            name: Some("Samsung SSD 980 PRO".to_string()),
            bus_type: Some("NVMe".to_string()),
            media_type: Some("SSD".to_string()),
            size_bytes: Some(1_000_204_886_016),
            health_status: Some("Healthy".to_string()),
        };
        let mut reliability = HashMap::new();
        reliability.insert(
            disk.id.clone(),
            DiskReliability {
                wear_pct: Some(3.0),
                media_errors: Some(0),
                temperature_c: Some(38.0),
                predicted_failure: Some(false),
            },
        );
        let mut events = HashMap::new();
        events.insert("System".to_string(), vec![event("System", 41)]);
        events.insert(
            "Application".to_string(),
            vec![event("Application", 1000), event("Application", 1001)],
        );

        Self {
            host_name: Some("bench-01".to_string()),
            os: Some(OsIdentity {
                name: Some("Windows".to_string()),
                version: Some("11".to_string()),
                long_version: Some("Windows 11 Pro".to_string()),
                kernel: Some("26100".to_string()),
            }),
            hardware: Some(HardwareModel {
                manufacturer: Some("LENOVO".to_string()),
                model: Some("21HD".to_string()),
            }),
            cpu_model: Some("13th Gen Intel(R) Core(TM) i7-1365U".to_string()),
            gpus: Some(vec![GpuAdapter {
                name: "Intel(R) Iris(R) Xe Graphics".to_string(),
                driver_version: Some("31.0.101.4502".to_string()),
                memory_bytes: Some(2_147_483_648),
            }]),
            memory: Some(MemoryStatus {
                total_bytes: 16 * 1024 * 1024 * 1024,
                free_bytes: 4 * 1024 * 1024 * 1024,
            }),
            power_scheme: Some(
                "Power Scheme GUID: 381b4222-f694-41f0-9685-ff5bb260df2e  (Balanced)".to_string(),
            ),
            processor_settings: Some("Subgroup GUID: 54533251 (Processor power management)".to_string()),
            cpu_counter: Some(12.5),
            cpu_sample: Some(14.0),
            thermal_zones: Some(vec![ThermalZone {
                name: "ACPI\\ThermalZone\\TZ00_0".to_string(),
                raw_tenths_kelvin: 3032.0,
            }]),
            vendor_fans: Some(vec![json!({"name": "Fan #1", "kind": "rpm", "value": 2200.0})]),
            generic_fans: Some(vec![json!({"name": "Cooling Device", "device_id": "root\\0"})]),
            disks: Some(vec![disk]),
            reliability,
            delete_notify: Some("NTFS DisableDeleteNotify = 0  (Allows TRIM operations to be sent to the storage device)\r\nReFS DisableDeleteNotify = 0".to_string()),
            services: Some(vec![
                service("LenovoVantageService", "Lenovo Vantage Service", "Running"),
                service("WinDefend", "Microsoft Defender Antivirus Service", "Running"),
                service("OneSyncSvc_3f1a2", "Sync Host_3f1a2", "Running"),
                service("Spooler", "Print Spooler", "Running"),
            ]),
            events,
        }
    }
}

impl Host for FakeHost {
    fn host_name(&self) -> Result<String, ProbeError> {
        self.host_name.clone().map_or_else(|| missing("host name"), Ok)
    }

    fn os_identity(&self) -> Result<OsIdentity, ProbeError> {
        self.os.clone().map_or_else(|| missing("os identity"), Ok)
    }

    fn hardware_model(&self) -> Result<HardwareModel, ProbeError> {
        self.hardware.clone().map_or_else(|| missing("hardware model"), Ok)
    }

    fn cpu_model(&self) -> Result<String, ProbeError> {
        self.cpu_model.clone().map_or_else(|| missing("cpu model"), Ok)
    }

    fn gpus(&self) -> Result<Vec<GpuAdapter>, ProbeError> {
        self.gpus.clone().map_or_else(|| missing("gpus"), Ok)
    }

    fn memory_status(&self) -> Result<MemoryStatus, ProbeError> {
        self.memory.map_or_else(|| missing("memory status"), Ok)
    }

    fn active_power_scheme(&self) -> Result<String, ProbeError> {
        self.power_scheme.clone().map_or_else(|| missing("power scheme"), Ok)
    }

    fn processor_power_settings(&self) -> Result<String, ProbeError> {
        self.processor_settings
            .clone()
            .map_or_else(|| missing("processor settings"), Ok)
    }

    fn cpu_load_counter(&self) -> Result<f64, ProbeError> {
        self.cpu_counter.map_or_else(|| missing("performance counters"), Ok)
    }

    fn cpu_load_sample(&self) -> Result<f64, ProbeError> {
        self.cpu_sample.map_or_else(|| missing("cpu sample"), Ok)
    }

    fn thermal_zones(&self) -> Result<Vec<ThermalZone>, ProbeError> {
        self.thermal_zones
            .clone()
            .map_or_else(|| missing("thermal zones"), Ok)
    }

    fn vendor_fans(&self) -> Result<Vec<Value>, ProbeError> {
        self.vendor_fans.clone().map_or_else(|| missing("vendor fans"), Ok)
    }

    fn generic_fans(&self) -> Result<Vec<Value>, ProbeError> {
        self.generic_fans
            .clone()
            .map_or_else(|| missing("generic fans"), Ok)
    }

    fn physical_disks(&self) -> Result<Vec<PhysicalDisk>, ProbeError> {
        self.disks.clone().map_or_else(|| missing("physical disks"), Ok)
    }

    fn disk_reliability(&self, disk: &PhysicalDisk) -> Result<DiskReliability, ProbeError> {
        self.reliability
            .get(&disk.id)
            .cloned()
            .ok_or_else(|| ProbeError::Parse(format!("no counters for disk {}", disk.id)))
    }

    fn delete_notify_status(&self) -> Result<String, ProbeError> {
        self.delete_notify
            .clone()
            .map_or_else(|| missing("delete notify"), Ok)
    }

    fn services(&self) -> Result<Vec<ServiceEntry>, ProbeError> {
        self.services.clone().map_or_else(|| missing("services"), Ok)
    }

    fn events(&self, query: &EventQuery<'_>) -> Result<Vec<EventEntry>, ProbeError> {
        self.events
            .get(query.channel)
            .cloned()
            .ok_or_else(|| ProbeError::Command {
                program: "event query".to_string(),
                code: "1".to_string(),
                stderr: format!("channel {} is not readable", query.channel),
            })
    }
}
