use super::{
    DiskReliability, EventEntry, EventQuery, GpuAdapter, HardwareModel, Host, MemoryStatus,
    OsIdentity, PhysicalDisk, ServiceEntry, ThermalZone,
};
#[cfg(target_os = "linux")]
use super::linux;
#[cfg(target_os = "windows")]
use super::windows;
use crate::probe::ProbeError;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use sysinfo::{CpuExt, System, SystemExt};

const MIN_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

/// The machine this process runs on.
///
/// `sysinfo` answers the portable questions; the rest goes to PowerShell/CIM
/// on Windows and to sysfs/systemd on Linux.
#[derive(Debug, Clone)]
pub struct LocalHost {
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    root: PathBuf,
}

impl LocalHost {
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/"),
        }
    }
}

impl Default for LocalHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for LocalHost {
    fn host_name(&self) -> Result<String, ProbeError> {
        System::new()
            .host_name()
            .filter(|name| !name.trim().is_empty())
            .ok_or(ProbeError::Empty("host name"))
    }

    fn os_identity(&self) -> Result<OsIdentity, ProbeError> {
        let sys = System::new();
        let identity = OsIdentity {
            name: sys.name(),
            version: sys.os_version(),
            long_version: sys.long_os_version(),
            kernel: sys.kernel_version(),
        };
        if identity.name.is_none() && identity.version.is_none() {
            return Err(ProbeError::Empty("operating system identity"));
        }
        Ok(identity)
    }

    fn hardware_model(&self) -> Result<HardwareModel, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::hardware_model()
        }
        #[cfg(target_os = "linux")]
        {
            linux::hardware_model(&self.root)
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            Err(ProbeError::Unsupported("hardware model"))
        }
    }

    fn cpu_model(&self) -> Result<String, ProbeError> {
        let mut sys = System::new();
        sys.refresh_cpu();
        sys.cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .ok_or(ProbeError::Empty("CPU brand"))
    }

    fn gpus(&self) -> Result<Vec<GpuAdapter>, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::gpus()
        }
        #[cfg(target_os = "linux")]
        {
            linux::gpus(&self.root)
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            Err(ProbeError::Unsupported("display adapters"))
        }
    }

    fn memory_status(&self) -> Result<MemoryStatus, ProbeError> {
        let mut sys = System::new();
        sys.refresh_memory();
        Ok(MemoryStatus {
            total_bytes: sys.total_memory(),
            free_bytes: sys.available_memory(),
        })
    }

    fn active_power_scheme(&self) -> Result<String, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::active_power_scheme()
        }
        #[cfg(target_os = "linux")]
        {
            linux::active_power_scheme(&self.root)
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            Err(ProbeError::Unsupported("power scheme"))
        }
    }

    fn processor_power_settings(&self) -> Result<String, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::processor_power_settings()
        }
        #[cfg(target_os = "linux")]
        {
            linux::processor_power_settings(&self.root)
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            Err(ProbeError::Unsupported("processor power settings"))
        }
    }

    fn cpu_load_counter(&self) -> Result<f64, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::cpu_load_counter()
        }
        #[cfg(not(target_os = "windows"))]
        {
            Err(ProbeError::Unsupported("performance counters"))
        }
    }

    fn cpu_load_sample(&self) -> Result<f64, ProbeError> {
        let mut sys = System::new();
        sys.refresh_cpu();
        if sys.cpus().is_empty() {
            return Err(ProbeError::Empty("CPU load"));
        }
        std::thread::sleep(
            <System as SystemExt>::MINIMUM_CPU_UPDATE_INTERVAL.max(MIN_SAMPLE_INTERVAL),
        );
        sys.refresh_cpu();
        let usage = f64::from(sys.global_cpu_info().cpu_usage());
        if !usage.is_finite() {
            return Err(ProbeError::Parse(format!("CPU load sample {usage}")));
        }
        Ok(usage.clamp(0.0, 100.0))
    }

    fn thermal_zones(&self) -> Result<Vec<ThermalZone>, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::thermal_zones()
        }
        #[cfg(target_os = "linux")]
        {
            linux::thermal_zones(&self.root)
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            Err(ProbeError::Unsupported("thermal zones"))
        }
    }

    fn vendor_fans(&self) -> Result<Vec<Value>, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::vendor_fans()
        }
        #[cfg(not(target_os = "windows"))]
        {
            Err(ProbeError::Unsupported("hardware monitor sensors"))
        }
    }

    fn generic_fans(&self) -> Result<Vec<Value>, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::generic_fans()
        }
        #[cfg(target_os = "linux")]
        {
            linux::hwmon_fans(&self.root)
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            Err(ProbeError::Unsupported("fan sensors"))
        }
    }

    fn physical_disks(&self) -> Result<Vec<PhysicalDisk>, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::physical_disks()
        }
        #[cfg(target_os = "linux")]
        {
            linux::physical_disks(&self.root)
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            Err(ProbeError::Unsupported("physical disks"))
        }
    }

    fn disk_reliability(&self, disk: &PhysicalDisk) -> Result<DiskReliability, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::disk_reliability(disk)
        }
        #[cfg(not(target_os = "windows"))]
        {
            let _ = disk;
            Err(ProbeError::Unsupported("storage reliability counters"))
        }
    }

    fn delete_notify_status(&self) -> Result<String, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::delete_notify_status()
        }
        #[cfg(not(target_os = "windows"))]
        {
            Err(ProbeError::Unsupported("delete notification query"))
        }
    }

    fn services(&self) -> Result<Vec<ServiceEntry>, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::services()
        }
        #[cfg(target_os = "linux")]
        {
            linux::services()
        }
        #[cfg(not(any(target_os = "windows", target_os = "linux")))]
        {
            Err(ProbeError::Unsupported("service manager"))
        }
    }

    fn events(&self, query: &EventQuery<'_>) -> Result<Vec<EventEntry>, ProbeError> {
        #[cfg(target_os = "windows")]
        {
            windows::events(query)
        }
        #[cfg(not(target_os = "windows"))]
        {
            let _ = query;
            Err(ProbeError::Unsupported("event log"))
        }
    }
}
