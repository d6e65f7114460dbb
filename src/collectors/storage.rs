use super::{bytes_to_gb, encode, DomainCollector};
use crate::context::RunContext;
use crate::host::{Host, PhysicalDisk};
use crate::probe::ProbeError;
use crate::snapshot::{Diagnostic, Domain, Section, SectionBuilder, Value};
use regex::Regex;
use serde_json::json;

const TRIM_PATTERN: &str = r"DisableDeleteNotify\s*=\s*(\d+)";

/// Physical disks with best-effort reliability counters, plus the TRIM
/// (delete notification) setting.
pub struct StorageCollector;

/// `Some(true)` when the first `DisableDeleteNotify = N` line has N != 0.
pub fn parse_trim_disabled(raw: &str) -> Result<Option<bool>, ProbeError> {
    let re = Regex::new(TRIM_PATTERN)
        .map_err(|err| ProbeError::Parse(format!("trim pattern: {err}")))?;
    Ok(re
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u64>().ok())
        .map(|flag| flag != 0))
}

fn disk_record(disk: &PhysicalDisk, reliability: Value) -> Value {
    json!({
        "id": disk.id,
        "name": disk.name,
        "bus_type": disk.bus_type,
        "media_type": disk.media_type,
        "size_gb": disk.size_bytes.map(bytes_to_gb),
        "health_status": disk.health_status,
        "reliability": reliability,
    })
}

impl DomainCollector for StorageCollector {
    fn domain(&self) -> Domain {
        Domain::Storage
    }

    fn collect(&self, host: &dyn Host, _ctx: &RunContext) -> Section {
        let mut section = SectionBuilder::new(Domain::Storage);

        let disks = section.probe("physical_disks", || host.physical_disks());
        let records = disks.map(|disks| {
            disks
                .iter()
                .map(|disk| {
                    let source = format!("reliability[disk {}]", disk.id);
                    let reliability = section
                        .probe(&source, || host.disk_reliability(disk))
                        .map_or(Value::Null, |r| encode(&r));
                    disk_record(disk, reliability)
                })
                .collect::<Vec<_>>()
        });
        section.set_opt("disks", records);

        let raw = section.probe("delete_notify_query", || host.delete_notify_status());
        let trim_disabled = match &raw {
            Some(text) => match parse_trim_disabled(text) {
                Ok(Some(flag)) => Some(flag),
                Ok(None) => {
                    section.note(Diagnostic::info(
                        "delete_notify_query",
                        "no DisableDeleteNotify value in query output",
                    ));
                    None
                }
                Err(err) => {
                    section.note(Diagnostic::warning("delete_notify_query", err.to_string()));
                    None
                }
            },
            None => None,
        };
        section.set_opt("trim_disabled", trim_disabled);
        section.set_opt("trim_raw", raw);

        section.finish()
    }
}
