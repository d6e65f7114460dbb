use crate::snapshot::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0} is not available on this platform")]
    Unsupported(&'static str),
    #[error("failed to launch {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {code}: {stderr}")]
    Command {
        program: String,
        code: String,
        stderr: String,
    },
    #[error("unexpected output: {0}")]
    Parse(String),
    #[error("no {0} reported")]
    Empty(&'static str),
    #[error("refusing to query with {0}")]
    InvalidInput(String),
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

/// One named attempt to read a single fact.
pub struct Probe<'a, T> {
    source_name: &'static str,
    attempt: Box<dyn Fn() -> Result<T, ProbeError> + 'a>,
}

/// Outcome of a single probe attempt, tagged with the probe that produced it.
pub struct ProbeResult<T> {
    pub source_name: &'static str,
    pub outcome: Result<T, ProbeError>,
}

impl<'a, T> Probe<'a, T> {
    pub fn new(
        source_name: &'static str,
        attempt: impl Fn() -> Result<T, ProbeError> + 'a,
    ) -> Self {
        Self {
            source_name,
            attempt: Box::new(attempt),
        }
    }

    pub fn attempt(&self) -> ProbeResult<T> {
        ProbeResult {
            source_name: self.source_name,
            outcome: (self.attempt)(),
        }
    }
}

/// Ordered probes for one logical field. Declaration order is preference
/// order: the first probe that succeeds wins.
pub struct FallbackChain<'a, T> {
    field: &'static str,
    probes: Vec<Probe<'a, T>>,
}

#[derive(Debug)]
pub struct Resolved<T> {
    pub value: Option<T>,
    pub source_name: Option<&'static str>,
    pub notes: Vec<Diagnostic>,
}

impl<'a, T> FallbackChain<'a, T> {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            probes: Vec::new(),
        }
    }

    pub fn then(
        mut self,
        source_name: &'static str,
        attempt: impl Fn() -> Result<T, ProbeError> + 'a,
    ) -> Self {
        self.probes.push(Probe::new(source_name, attempt));
        self
    }

    /// Each probe is attempted at most once per call.
    pub fn resolve(&self) -> Resolved<T> {
        let mut notes = Vec::new();
        for probe in &self.probes {
            let result = probe.attempt();
            match result.outcome {
                Ok(value) => {
                    return Resolved {
                        value: Some(value),
                        source_name: Some(result.source_name),
                        notes,
                    };
                }
                Err(err) => notes.push(Diagnostic::warning(
                    result.source_name,
                    format!("{}: {err}", self.field),
                )),
            }
        }

        Resolved {
            value: None,
            source_name: None,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::Severity;
    use std::cell::Cell;

    #[test]
    fn only_last_probe_succeeds() {
        let chain = FallbackChain::new("fans")
            .then("vendor", || Err(ProbeError::Unsupported("vendor fans")))
            .then("acpi", || Err(ProbeError::Empty("fan sensors")))
            .then("generic", || Ok(3_u32));

        let resolved = chain.resolve();
        assert_eq!(resolved.value, Some(3));
        assert_eq!(resolved.source_name, Some("generic"));
        assert_eq!(resolved.notes.len(), 2);
        assert!(resolved
            .notes
            .iter()
            .all(|n| n.severity == Severity::Warning));
        assert_eq!(resolved.notes[0].source_name, "vendor");
        assert_eq!(resolved.notes[1].source_name, "acpi");
        assert!(resolved.notes[0].message.starts_with("fans: "));
    }

    #[test]
    fn first_success_stops_the_chain() {
        let later_calls = Cell::new(0);
        let chain = FallbackChain::new("cpu_load_pct")
            .then("perf_counter", || Ok(12.5))
            .then("point_sample", || {
                later_calls.set(later_calls.get() + 1);
                Ok(99.0)
            });

        let resolved = chain.resolve();
        assert_eq!(resolved.value, Some(12.5));
        assert_eq!(resolved.source_name, Some("perf_counter"));
        assert!(resolved.notes.is_empty());
        assert_eq!(later_calls.get(), 0);
    }

    #[test]
    fn all_failing_probes_are_each_attempted_once() {
        let calls = Cell::new(0);
        let chain: FallbackChain<'_, f64> = FallbackChain::new("cpu_load_pct")
            .then("perf_counter", || {
                calls.set(calls.get() + 1);
                Err(ProbeError::Parse("garbage".to_string()))
            })
            .then("point_sample", || {
                calls.set(calls.get() + 1);
                Err(ProbeError::Unsupported("cpu sampling"))
            });

        let resolved = chain.resolve();
        assert!(resolved.value.is_none());
        assert!(resolved.source_name.is_none());
        assert_eq!(resolved.notes.len(), 2);
        assert_eq!(calls.get(), 2);
    }
}
