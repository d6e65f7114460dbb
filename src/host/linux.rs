//! sysfs and systemd probes for Linux hosts.
//!
//! Paths are resolved under a root so tests can point at a temporary tree.

use super::command::run_tool;
use super::{GpuAdapter, HardwareModel, PhysicalDisk, ServiceEntry, ThermalZone};
use crate::probe::ProbeError;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use tracing::warn;

pub(super) fn hardware_model(root: &Path) -> Result<HardwareModel, ProbeError> {
    let dmi = root.join("sys/class/dmi/id");
    let model = HardwareModel {
        manufacturer: read_trimmed(&dmi.join("sys_vendor")),
        model: read_trimmed(&dmi.join("product_name")),
    };
    if model.manufacturer.is_none() && model.model.is_none() {
        return Err(ProbeError::Empty("DMI identity"));
    }
    Ok(model)
}

pub(super) fn gpus(root: &Path) -> Result<Vec<GpuAdapter>, ProbeError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root.join("sys/class/drm"))?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        // card0, card1 ...; connectors look like card0-HDMI-A-1.
        if !name.starts_with("card") || name.contains('-') {
            continue;
        }
        let device = entry.path().join("device");
        let Some(vendor) = read_trimmed(&device.join("vendor")) else {
            continue;
        };
        let product = read_trimmed(&device.join("device")).unwrap_or_default();
        let driver = fs::read_link(device.join("driver"))
            .ok()
            .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()));
        out.push(GpuAdapter {
            name: format!("{} {}", pci_vendor_name(&vendor), product),
            driver_version: driver,
            memory_bytes: None,
        });
    }
    if out.is_empty() {
        return Err(ProbeError::Empty("display adapters"));
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

fn pci_vendor_name(id: &str) -> &str {
    match id {
        "0x10de" => "NVIDIA",
        "0x1002" => "AMD",
        "0x8086" => "Intel",
        other => other,
    }
}

pub(super) fn active_power_scheme(root: &Path) -> Result<String, ProbeError> {
    read_trimmed(&root.join("sys/firmware/acpi/platform_profile"))
        .ok_or(ProbeError::Unsupported("ACPI platform profile"))
}

pub(super) fn processor_power_settings(root: &Path) -> Result<String, ProbeError> {
    let cpufreq = root.join("sys/devices/system/cpu/cpu0/cpufreq");
    let lines: Vec<String> = [
        "scaling_driver",
        "scaling_governor",
        "energy_performance_preference",
        "scaling_min_freq",
        "scaling_max_freq",
    ]
    .iter()
    .filter_map(|key| read_trimmed(&cpufreq.join(key)).map(|v| format!("{key}: {v}")))
    .collect();
    if lines.is_empty() {
        return Err(ProbeError::Unsupported("cpufreq"));
    }
    Ok(lines.join("\n"))
}

/// Kernel zones report millidegrees Celsius; convert to the tenths-of-Kelvin
/// unit every `ThermalZone` carries.
pub(super) fn thermal_zones(root: &Path) -> Result<Vec<ThermalZone>, ProbeError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root.join("sys/class/thermal"))?.flatten() {
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|v| v.to_str()) else {
            continue;
        };
        if !name.starts_with("thermal_zone") {
            continue;
        }
        let Some(milli) = read_trimmed(&path.join("temp")).and_then(|v| v.parse::<f64>().ok())
        else {
            continue;
        };
        let label = read_trimmed(&path.join("type")).unwrap_or_else(|| name.to_string());
        out.push(ThermalZone {
            name: format!("{name}:{label}"),
            raw_tenths_kelvin: milli / 100.0 + 2731.5,
        });
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(out)
}

pub(super) fn hwmon_fans(root: &Path) -> Result<Vec<Value>, ProbeError> {
    let mut out = Vec::new();
    for chip in fs::read_dir(root.join("sys/class/hwmon"))?.flatten() {
        let chip_path = chip.path();
        let chip_name = read_trimmed(&chip_path.join("name"))
            .unwrap_or_else(|| chip.file_name().to_string_lossy().to_string());
        let Ok(files) = fs::read_dir(&chip_path) else {
            continue;
        };
        for file in files.flatten() {
            let file_name = file.file_name().to_string_lossy().to_string();
            let Some(index) = file_name
                .strip_prefix("fan")
                .and_then(|rest| rest.strip_suffix("_input"))
            else {
                continue;
            };
            let Some(rpm) = read_trimmed(&file.path()).and_then(|v| v.parse::<u64>().ok()) else {
                continue;
            };
            let label = read_trimmed(&chip_path.join(format!("fan{index}_label")))
                .unwrap_or_else(|| format!("fan{index}"));
            out.push(json!({
                "name": label,
                "chip": chip_name,
                "rpm": rpm,
            }));
        }
    }
    out.sort_by(|a, b| {
        (a["chip"].as_str(), a["name"].as_str()).cmp(&(b["chip"].as_str(), b["name"].as_str()))
    });
    Ok(out)
}

pub(super) fn physical_disks(root: &Path) -> Result<Vec<PhysicalDisk>, ProbeError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(root.join("sys/block"))?.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if ["loop", "ram", "zram", "dm-", "md", "sr"]
            .iter()
            .any(|prefix| name.starts_with(prefix))
        {
            continue;
        }
        let path = entry.path();
        let sectors = read_trimmed(&path.join("size")).and_then(|v| v.parse::<u64>().ok());
        let rotational = read_trimmed(&path.join("queue/rotational"));
        out.push(PhysicalDisk {
            name: read_trimmed(&path.join("device/model")),
            bus_type: Some(bus_type_for(&name).to_string()),
            media_type: rotational.map(|r| media_type_for(&r).to_string()),
            // Block sizes in sysfs are always counted in 512-byte sectors.
            size_bytes: sectors.map(|s| s.saturating_mul(512)),
            health_status: read_trimmed(&path.join("device/state")),
            id: name,
        });
    }
    out.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(out)
}

fn media_type_for(rotational: &str) -> &'static str {
    if rotational == "1" {
        "HDD"
    } else {
        "SSD"
    }
}

fn bus_type_for(device: &str) -> &'static str {
    if device.starts_with("nvme") {
        "NVMe"
    } else if device.starts_with("mmcblk") {
        "MMC"
    } else if device.starts_with("vd") {
        "Virtio"
    } else if device.starts_with("sd") {
        "SCSI"
    } else {
        "Unknown"
    }
}

pub(super) fn services() -> Result<Vec<ServiceEntry>, ProbeError> {
    let units = run_tool(
        "systemctl",
        &[
            "list-units",
            "--type=service",
            "--all",
            "--no-legend",
            "--no-pager",
            "--plain",
        ],
    )?;
    let files = run_tool(
        "systemctl",
        &["list-unit-files", "--type=service", "--no-legend", "--no-pager"],
    );
    Ok(with_start_types(&units, files))
}

/// Start types are optional detail; a failed `list-unit-files` keeps the
/// unit list and leaves every `start_type` empty.
fn with_start_types(units: &str, unit_files: Result<String, ProbeError>) -> Vec<ServiceEntry> {
    match unit_files {
        Ok(files) => parse_systemctl_units(units, &files),
        Err(err) => {
            warn!(error = %err, "systemctl list-unit-files failed, start types unknown");
            parse_systemctl_units(units, "")
        }
    }
}

/// `list-units` lines: `UNIT LOAD ACTIVE SUB DESCRIPTION...`;
/// `list-unit-files` lines: `UNIT STATE [PRESET]`.
pub(super) fn parse_systemctl_units(units: &str, unit_files: &str) -> Vec<ServiceEntry> {
    let start_types: std::collections::HashMap<&str, &str> = unit_files
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            Some((parts.next()?, parts.next()?))
        })
        .collect();

    units
        .lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let unit = parts.next()?;
            let _load = parts.next()?;
            let _active = parts.next()?;
            let sub = parts.next()?;
            let description = parts.collect::<Vec<_>>().join(" ");
            let name = unit.strip_suffix(".service")?;
            Some(ServiceEntry {
                name: name.to_string(),
                display_name: if description.is_empty() {
                    name.to_string()
                } else {
                    description
                },
                status: sub.to_string(),
                start_type: start_types.get(unit).map(|s| s.to_string()),
            })
        })
        .collect()
}

fn read_trimmed(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
