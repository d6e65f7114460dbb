//! CIM, performance-counter and tool probes for Windows hosts.
//!
//! Every query goes through PowerShell with `ConvertTo-Json` so the parsing
//! side stays plain serde and can be tested anywhere.

use super::command::{bool_field, f64_field, json_rows, parse_f64_loose, str_field, u64_field};
#[cfg(target_os = "windows")]
use super::command::{run_powershell, run_tool};
use super::{
    DiskReliability, EventEntry, EventQuery, GpuAdapter, HardwareModel, PhysicalDisk,
    ServiceEntry, ThermalZone,
};
use crate::config::is_valid_channel_name;
use crate::probe::ProbeError;
use serde_json::{json, Value};

#[cfg(target_os = "windows")]
pub(super) fn hardware_model() -> Result<HardwareModel, ProbeError> {
    let text = run_powershell(
        "Get-CimInstance Win32_ComputerSystem | Select-Object -First 1 Manufacturer,Model | ConvertTo-Json -Compress",
    )?;
    parse_hardware_model(&text)
}

#[cfg(target_os = "windows")]
pub(super) fn gpus() -> Result<Vec<GpuAdapter>, ProbeError> {
    let text = run_powershell(
        "Get-CimInstance Win32_VideoController | Select-Object Name,DriverVersion,AdapterRAM | ConvertTo-Json -Compress",
    )?;
    parse_gpus(&text)
}

#[cfg(target_os = "windows")]
pub(super) fn cpu_load_counter() -> Result<f64, ProbeError> {
    let text = run_powershell(
        "(Get-Counter '\\Processor(_Total)\\% Processor Time' -SampleInterval 1 -MaxSamples 1).CounterSamples[0].CookedValue",
    )?;
    parse_counter_value(&text)
}

#[cfg(target_os = "windows")]
pub(super) fn active_power_scheme() -> Result<String, ProbeError> {
    non_blank(run_tool("powercfg", &["/getactivescheme"])?, "active power scheme")
}

#[cfg(target_os = "windows")]
pub(super) fn processor_power_settings() -> Result<String, ProbeError> {
    non_blank(
        run_tool("powercfg", &["/query", "SCHEME_CURRENT", "SUB_PROCESSOR"])?,
        "processor power settings",
    )
}

#[cfg(target_os = "windows")]
pub(super) fn thermal_zones() -> Result<Vec<ThermalZone>, ProbeError> {
    let text = run_powershell(
        "Get-CimInstance -Namespace root/wmi -ClassName MSAcpi_ThermalZoneTemperature | Select-Object InstanceName,CurrentTemperature | ConvertTo-Json -Compress",
    )?;
    parse_thermal_zones(&text)
}

#[cfg(target_os = "windows")]
pub(super) fn vendor_fans() -> Result<Vec<Value>, ProbeError> {
    let script = "$rows=$null; foreach($ns in @('root/LibreHardwareMonitor','root/OpenHardwareMonitor')){ try { $rows=Get-CimInstance -Namespace $ns -ClassName Sensor | Where-Object { $_.SensorType -eq 'Fan' -or $_.SensorType -eq 'Control' } } catch { continue }; if($rows){ break } }; if(-not $rows){ throw 'no hardware monitor fan sensors' }; $rows | Select-Object Name,SensorType,Value,Identifier,Parent | ConvertTo-Json -Compress";
    parse_vendor_fans(&run_powershell(script)?)
}

#[cfg(target_os = "windows")]
pub(super) fn generic_fans() -> Result<Vec<Value>, ProbeError> {
    let text = run_powershell(
        "Get-CimInstance Win32_Fan | Select-Object Name,DeviceID,DesiredSpeed,VariableSpeed,ActiveCooling,Status | ConvertTo-Json -Compress",
    )?;
    parse_generic_fans(&text)
}

#[cfg(target_os = "windows")]
pub(super) fn physical_disks() -> Result<Vec<PhysicalDisk>, ProbeError> {
    let text = run_powershell(
        "Get-PhysicalDisk | Select-Object DeviceId,FriendlyName,@{n='BusType';e={\"$($_.BusType)\"}},@{n='MediaType';e={\"$($_.MediaType)\"}},Size,@{n='HealthStatus';e={\"$($_.HealthStatus)\"}} | ConvertTo-Json -Compress",
    )?;
    parse_physical_disks(&text)
}

#[cfg(target_os = "windows")]
pub(super) fn disk_reliability(disk: &PhysicalDisk) -> Result<DiskReliability, ProbeError> {
    parse_reliability(&run_powershell(&reliability_script(&disk.id)?)?)
}

#[cfg(target_os = "windows")]
pub(super) fn delete_notify_status() -> Result<String, ProbeError> {
    non_blank(
        run_tool("fsutil", &["behavior", "query", "DisableDeleteNotify"])?,
        "delete notification status",
    )
}

#[cfg(target_os = "windows")]
pub(super) fn services() -> Result<Vec<ServiceEntry>, ProbeError> {
    // Some services deny status reads to non-admins; skip those rows.
    let text = run_powershell(
        "Get-Service -ErrorAction SilentlyContinue | Select-Object Name,DisplayName,@{n='Status';e={\"$($_.Status)\"}},@{n='StartType';e={\"$($_.StartType)\"}} | ConvertTo-Json -Compress",
    )?;
    parse_services(&text)
}

#[cfg(target_os = "windows")]
pub(super) fn events(query: &EventQuery<'_>) -> Result<Vec<EventEntry>, ProbeError> {
    parse_events(&run_powershell(&events_script(query)?)?)
}

#[cfg(target_os = "windows")]
fn non_blank(text: String, what: &'static str) -> Result<String, ProbeError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ProbeError::Empty(what));
    }
    Ok(trimmed.to_string())
}

pub(super) fn reliability_script(disk_id: &str) -> Result<String, ProbeError> {
    if disk_id.is_empty() || !disk_id.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProbeError::InvalidInput(format!("disk id '{disk_id}'")));
    }
    Ok(format!(
        "$d=Get-PhysicalDisk | Where-Object DeviceId -eq '{disk_id}' | Select-Object -First 1; if(-not $d){{ throw 'disk {disk_id} not found' }}; $r=$d | Get-StorageReliabilityCounter; $dd=Get-CimInstance Win32_DiskDrive -Filter 'Index={disk_id}' -ErrorAction SilentlyContinue | Select-Object -First 1; $p=@(Get-CimInstance -Namespace root/wmi -ClassName MSStorageDriver_FailurePredictStatus -ErrorAction SilentlyContinue | Select-Object InstanceName,PredictFailure); [pscustomobject]@{{ Wear=$r.Wear; ReadErrorsUncorrected=$r.ReadErrorsUncorrected; WriteErrorsUncorrected=$r.WriteErrorsUncorrected; Temperature=$r.Temperature; PnpDeviceId=$dd.PNPDeviceID; FailurePredict=$p }} | ConvertTo-Json -Compress -Depth 4"
    ))
}

pub(super) fn events_script(query: &EventQuery<'_>) -> Result<String, ProbeError> {
    if !is_valid_channel_name(query.channel) {
        return Err(ProbeError::InvalidInput(format!(
            "event channel '{}'",
            query.channel
        )));
    }
    let minutes = (query.lookback.as_secs() / 60).max(1);
    Ok(format!(
        "try {{ $e=Get-WinEvent -FilterHashtable @{{LogName='{channel}'; Level=2,3; StartTime=(Get-Date).AddMinutes(-{minutes})}} -MaxEvents {max} }} catch {{ if($_.FullyQualifiedErrorId -like 'NoMatchingEventsFound*'){{ '[]'; return }}; throw }}; $e | Select-Object @{{n='TimeCreated';e={{$_.TimeCreated.ToUniversalTime().ToString('o')}}}},LevelDisplayName,Id,ProviderName,Message | ConvertTo-Json -Compress",
        channel = query.channel,
        max = query.max_events,
    ))
}

pub(super) fn parse_hardware_model(text: &str) -> Result<HardwareModel, ProbeError> {
    let row = json_rows(text)?
        .into_iter()
        .next()
        .ok_or(ProbeError::Empty("computer system record"))?;
    Ok(HardwareModel {
        manufacturer: str_field(&row, "Manufacturer"),
        model: str_field(&row, "Model"),
    })
}

pub(super) fn parse_gpus(text: &str) -> Result<Vec<GpuAdapter>, ProbeError> {
    Ok(json_rows(text)?
        .iter()
        .filter_map(|row| {
            Some(GpuAdapter {
                name: str_field(row, "Name")?,
                driver_version: str_field(row, "DriverVersion"),
                memory_bytes: u64_field(row, "AdapterRAM").filter(|v| *v > 0),
            })
        })
        .collect())
}

pub(super) fn parse_counter_value(text: &str) -> Result<f64, ProbeError> {
    let line = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or(ProbeError::Empty("counter sample"))?;
    let value = parse_f64_loose(line)
        .filter(|v| v.is_finite())
        .ok_or_else(|| ProbeError::Parse(format!("counter sample '{line}'")))?;
    Ok(value.clamp(0.0, 100.0))
}

pub(super) fn parse_thermal_zones(text: &str) -> Result<Vec<ThermalZone>, ProbeError> {
    Ok(json_rows(text)?
        .iter()
        .filter_map(|row| {
            let raw = f64_field(row, "CurrentTemperature").filter(|v| *v > 0.0)?;
            Some(ThermalZone {
                name: str_field(row, "InstanceName").unwrap_or_else(|| "unknown".to_string()),
                raw_tenths_kelvin: raw,
            })
        })
        .collect())
}

pub(super) fn parse_vendor_fans(text: &str) -> Result<Vec<Value>, ProbeError> {
    Ok(json_rows(text)?
        .iter()
        .filter_map(|row| {
            let name = str_field(row, "Name")?;
            let kind = match str_field(row, "SensorType")?.to_ascii_lowercase().as_str() {
                "fan" => "rpm",
                "control" => "duty_pct",
                _ => return None,
            };
            Some(json!({
                "name": name,
                "kind": kind,
                "value": f64_field(row, "Value"),
                "identifier": str_field(row, "Identifier"),
                "parent": str_field(row, "Parent"),
            }))
        })
        .collect())
}

pub(super) fn parse_generic_fans(text: &str) -> Result<Vec<Value>, ProbeError> {
    Ok(json_rows(text)?
        .iter()
        .map(|row| {
            json!({
                "name": str_field(row, "Name"),
                "device_id": str_field(row, "DeviceID"),
                "desired_speed_rpm": u64_field(row, "DesiredSpeed"),
                "variable_speed": bool_field(row, "VariableSpeed"),
                "active_cooling": bool_field(row, "ActiveCooling"),
                "status": str_field(row, "Status"),
            })
        })
        .collect())
}

pub(super) fn parse_physical_disks(text: &str) -> Result<Vec<PhysicalDisk>, ProbeError> {
    Ok(json_rows(text)?
        .iter()
        .filter_map(|row| {
            Some(PhysicalDisk {
                id: str_field(row, "DeviceId")?,
                name: str_field(row, "FriendlyName"),
                bus_type: str_field(row, "BusType"),
                media_type: str_field(row, "MediaType"),
                size_bytes: u64_field(row, "Size"),
                health_status: str_field(row, "HealthStatus"),
            })
        })
        .collect())
}

pub(super) fn parse_reliability(text: &str) -> Result<DiskReliability, ProbeError> {
    let row = json_rows(text)?
        .into_iter()
        .next()
        .ok_or(ProbeError::Empty("reliability counters"))?;
    let read = u64_field(&row, "ReadErrorsUncorrected");
    let write = u64_field(&row, "WriteErrorsUncorrected");
    let media_errors = match (read, write) {
        (None, None) => None,
        (r, w) => Some(r.unwrap_or(0).saturating_add(w.unwrap_or(0))),
    };
    Ok(DiskReliability {
        wear_pct: f64_field(&row, "Wear"),
        media_errors,
        temperature_c: f64_field(&row, "Temperature").filter(|v| *v > 0.0),
        predicted_failure: predicted_failure_for(&row),
    })
}

/// SMART prediction rows are keyed by PnP instance name (`<PNPDeviceID>_N`)
/// and only exist for drives that report SMART, so they are matched by name
/// rather than position.
fn predicted_failure_for(row: &Value) -> Option<bool> {
    let device = str_field(row, "PnpDeviceId")?.to_ascii_uppercase();
    let candidates = match row.get("FailurePredict")? {
        Value::Array(items) => items.iter().collect::<Vec<_>>(),
        item @ Value::Object(_) => vec![item],
        _ => return None,
    };
    candidates.into_iter().find_map(|item| {
        let instance = str_field(item, "InstanceName")?.to_ascii_uppercase();
        let suffix = instance.strip_prefix(&device)?.strip_prefix('_')?;
        if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        bool_field(item, "PredictFailure")
    })
}

pub(super) fn parse_services(text: &str) -> Result<Vec<ServiceEntry>, ProbeError> {
    Ok(json_rows(text)?
        .iter()
        .filter_map(|row| {
            let name = str_field(row, "Name")?;
            Some(ServiceEntry {
                display_name: str_field(row, "DisplayName").unwrap_or_else(|| name.clone()),
                status: str_field(row, "Status").unwrap_or_else(|| "Unknown".to_string()),
                start_type: str_field(row, "StartType"),
                name,
            })
        })
        .collect())
}

pub(super) fn parse_events(text: &str) -> Result<Vec<EventEntry>, ProbeError> {
    Ok(json_rows(text)?
        .iter()
        .map(|row| EventEntry {
            timestamp: str_field(row, "TimeCreated").unwrap_or_default(),
            level: str_field(row, "LevelDisplayName").unwrap_or_default(),
            event_id: u64_field(row, "Id").map_or(0, |v| v.min(u32::MAX as u64) as u32),
            provider: str_field(row, "ProviderName").unwrap_or_default(),
            message: str_field(row, "Message").unwrap_or_default(),
        })
        .collect())
}
