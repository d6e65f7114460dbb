use crate::probe::{FallbackChain, ProbeError, Resolved};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
pub use serde_json::{Map, Value};
use std::fmt;
use std::time::SystemTime;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    System,
    PowerProfile,
    ResourceUtilization,
    Thermal,
    Storage,
    Services,
    EventLog,
}

impl Domain {
    pub const ALL: [Domain; 7] = [
        Domain::System,
        Domain::PowerProfile,
        Domain::ResourceUtilization,
        Domain::Thermal,
        Domain::Storage,
        Domain::Services,
        Domain::EventLog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Domain::System => "system",
            Domain::PowerProfile => "power_profile",
            Domain::ResourceUtilization => "resource_utilization",
            Domain::Thermal => "thermal",
            Domain::Storage => "storage",
            Domain::Services => "services",
            Domain::EventLog => "event_log",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

/// A non-fatal failure recorded while building a section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub source_name: String,
    pub message: String,
    pub severity: Severity,
}

impl Diagnostic {
    pub fn warning(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
            severity: Severity::Warning,
        }
    }

    pub fn info(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            message: message.into(),
            severity: Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionStatus {
    Complete,
    Partial,
    Unavailable,
}

impl SectionStatus {
    fn derive(fields: &Map<String, Value>) -> Self {
        let nulls = fields.values().filter(|v| v.is_null()).count();
        if fields.is_empty() || nulls == fields.len() {
            SectionStatus::Unavailable
        } else if nulls > 0 {
            SectionStatus::Partial
        } else {
            SectionStatus::Complete
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub domain_name: Domain,
    pub status: SectionStatus,
    pub fields: Map<String, Value>,
    pub notes: Vec<Diagnostic>,
}

impl Section {
    /// Empty section for a domain that produced nothing at all.
    pub fn unavailable(domain: Domain, note: Diagnostic) -> Self {
        Self {
            domain_name: domain,
            status: SectionStatus::Unavailable,
            fields: Map::new(),
            notes: vec![note],
        }
    }

    pub fn warnings(&self) -> usize {
        self.notes
            .iter()
            .filter(|n| n.severity == Severity::Warning)
            .count()
    }
}

/// Accumulates fields and diagnostics for one domain. The status is derived
/// from the fields in [`SectionBuilder::finish`].
pub struct SectionBuilder {
    domain: Domain,
    fields: Map<String, Value>,
    notes: Vec<Diagnostic>,
}

impl SectionBuilder {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            fields: Map::new(),
            notes: Vec::new(),
        }
    }

    pub fn set(&mut self, field: &str, value: impl Into<Value>) {
        self.fields.insert(field.to_string(), value.into());
    }

    pub fn set_opt<V: Into<Value>>(&mut self, field: &str, value: Option<V>) {
        self.set(field, value.map_or(Value::Null, Into::into));
    }

    pub fn note(&mut self, note: Diagnostic) {
        self.notes.push(note);
    }

    /// Runs a single-source probe. A failure is downgraded to a warning.
    pub fn probe<T>(
        &mut self,
        source: &str,
        attempt: impl FnOnce() -> Result<T, ProbeError>,
    ) -> Option<T> {
        match attempt() {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(domain = %self.domain, source, error = %err, "probe failed");
                self.notes.push(Diagnostic::warning(source, err.to_string()));
                None
            }
        }
    }

    /// Direct probe whose value lands in `field`, or Null on failure.
    pub fn capture<T: Into<Value>>(
        &mut self,
        field: &str,
        source: &str,
        attempt: impl FnOnce() -> Result<T, ProbeError>,
    ) {
        let value = self.probe(source, attempt);
        self.set_opt(field, value);
    }

    pub fn resolve<T>(&mut self, chain: &FallbackChain<'_, T>) -> Resolved<T> {
        let mut resolved = chain.resolve();
        for note in &resolved.notes {
            warn!(
                domain = %self.domain,
                source = %note.source_name,
                error = %note.message,
                "fallback source failed"
            );
        }
        self.notes.append(&mut resolved.notes);
        resolved
    }

    pub fn finish(self) -> Section {
        Section {
            domain_name: self.domain,
            status: SectionStatus::derive(&self.fields),
            fields: self.fields,
            notes: self.notes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub tool_version: String,
    pub lookback_hours: u64,
    pub max_events_per_channel: usize,
    pub domain_timeout_secs: Option<u64>,
    pub parallel: bool,
    pub cancelled: bool,
    pub skipped_domains: Vec<Domain>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: SystemTime,
    pub host_id: String,
    pub run: RunMetadata,
    #[serde(serialize_with = "serialize_sections")]
    pub sections: Vec<Section>,
}

#[cfg(test)]
impl Snapshot {
    pub fn section(&self, domain: Domain) -> Option<&Section> {
        self.sections.iter().find(|s| s.domain_name == domain)
    }
}

#[cfg(test)]
impl Section {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

pub fn format_timestamp(ts: SystemTime) -> String {
    humantime::format_rfc3339_seconds(ts).to_string()
}

fn serialize_timestamp<S: Serializer>(ts: &SystemTime, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(*ts))
}

// Sections keep collection order, keyed by domain name.
#[allow(clippy::ptr_arg)]
fn serialize_sections<S: Serializer>(
    sections: &Vec<Section>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(sections.len()))?;
    for section in sections {
        map.serialize_entry(section.domain_name.as_str(), section)?;
    }
    map.end()
}
