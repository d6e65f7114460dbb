use crate::collectors::DomainCollector;
use crate::context::RunContext;
use crate::host::Host;
use crate::report::TranscriptSink;
use crate::snapshot::{Diagnostic, RunMetadata, Section, Severity, Snapshot};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{info, warn};

const ASSEMBLER_SOURCE: &str = "assembler";
const UNKNOWN_HOST: &str = "unknown-host";

/// Runs the configured collectors against one host and merges their sections
/// into a snapshot.
pub struct Assembler {
    host: Arc<dyn Host>,
    collectors: Vec<Arc<dyn DomainCollector>>,
}

impl Assembler {
    pub fn new(host: Arc<dyn Host>, collectors: Vec<Arc<dyn DomainCollector>>) -> Self {
        Self { host, collectors }
    }

    /// Never fails: a domain that times out, panics or is skipped by
    /// cancellation still leaves the rest of the snapshot intact.
    pub async fn assemble(
        &self,
        ctx: Arc<RunContext>,
        cancel: &watch::Receiver<bool>,
        transcript: &mut dyn TranscriptSink,
    ) -> Snapshot {
        let host_id = self.host_id().await;
        info!(host = %host_id, domains = self.collectors.len(), parallel = ctx.parallel, "collection started");
        append(
            transcript,
            &format!(
                "collection started on {host_id}: {} domain(s), {}",
                self.collectors.len(),
                if ctx.parallel { "parallel" } else { "sequential" }
            ),
        );

        let mut sections = Vec::with_capacity(self.collectors.len());
        let mut skipped = Vec::new();

        if ctx.parallel {
            if *cancel.borrow() {
                skipped.extend(self.collectors.iter().map(|c| c.domain()));
            } else {
                let mut handles = Vec::with_capacity(self.collectors.len());
                for collector in &self.collectors {
                    append(transcript, &format!("domain {} started", collector.domain()));
                    let task = run_domain(self.host.clone(), collector.clone(), ctx.clone());
                    handles.push((collector.domain(), tokio::spawn(task)));
                }
                for (domain, handle) in handles {
                    let section = handle.await.unwrap_or_else(|err| {
                        Section::unavailable(
                            domain,
                            Diagnostic::warning(
                                ASSEMBLER_SOURCE,
                                format!("collector task failed: {err}"),
                            ),
                        )
                    });
                    record(transcript, &section);
                    sections.push(section);
                }
            }
        } else {
            for collector in &self.collectors {
                if *cancel.borrow() {
                    skipped.push(collector.domain());
                    continue;
                }
                append(transcript, &format!("domain {} started", collector.domain()));
                let section = run_domain(self.host.clone(), collector.clone(), ctx.clone()).await;
                record(transcript, &section);
                sections.push(section);
            }
        }

        let cancelled = !skipped.is_empty();
        if cancelled {
            let names: Vec<&str> = skipped.iter().map(|d| d.as_str()).collect();
            warn!(skipped = ?names, "collection cancelled");
            append(
                transcript,
                &format!("collection cancelled, skipped: {}", names.join(", ")),
            );
        }
        info!(collected = sections.len(), "collection finished");

        Snapshot {
            timestamp: ctx.started_at,
            host_id,
            run: RunMetadata {
                tool_version: env!("CARGO_PKG_VERSION").to_string(),
                lookback_hours: ctx.lookback_hours(),
                max_events_per_channel: ctx.max_events_per_channel,
                domain_timeout_secs: ctx.domain_timeout.map(|d| d.as_secs()),
                parallel: ctx.parallel,
                cancelled,
                skipped_domains: skipped,
            },
            sections,
        }
    }

    async fn host_id(&self) -> String {
        let host = self.host.clone();
        let name = match tokio::task::spawn_blocking(move || host.host_name()).await {
            Ok(result) => result.map_err(|err| err.to_string()),
            Err(err) => Err(err.to_string()),
        };
        name.unwrap_or_else(|error| {
            warn!(error = %error, "host name unavailable");
            UNKNOWN_HOST.to_string()
        })
    }
}

/// Runs one collector on a blocking worker under the per-domain budget. A
/// worker that overruns is abandoned; its result is discarded.
async fn run_domain(
    host: Arc<dyn Host>,
    collector: Arc<dyn DomainCollector>,
    ctx: Arc<RunContext>,
) -> Section {
    let domain = collector.domain();
    let budget = ctx.domain_timeout;
    let started = Instant::now();
    info!(domain = %domain, "domain started");

    let task = tokio::task::spawn_blocking(move || collector.collect(host.as_ref(), &ctx));
    let joined = match budget {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_elapsed) => {
                let limit = humantime::format_duration(limit);
                warn!(domain = %domain, timeout = %limit, "domain timed out");
                return Section::unavailable(
                    domain,
                    Diagnostic::warning(
                        ASSEMBLER_SOURCE,
                        format!("timed out: no result within {limit}"),
                    ),
                );
            }
        },
        None => task.await,
    };

    match joined {
        Ok(section) => {
            info!(
                domain = %domain,
                status = ?section.status,
                diagnostics = section.notes.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "domain finished"
            );
            section
        }
        Err(err) => {
            let message = if err.is_panic() {
                "collector panicked".to_string()
            } else {
                format!("collector task failed: {err}")
            };
            warn!(domain = %domain, error = %message, "domain failed");
            Section::unavailable(domain, Diagnostic::warning(ASSEMBLER_SOURCE, message))
        }
    }
}

fn record(transcript: &mut dyn TranscriptSink, section: &Section) {
    append(
        transcript,
        &format!(
            "domain {} finished: {:?}, {} diagnostic(s), {} warning(s)",
            section.domain_name,
            section.status,
            section.notes.len(),
            section.warnings()
        ),
    );
    for note in &section.notes {
        let level = match note.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        append(
            transcript,
            &format!(
                "  [{level}] {}/{}: {}",
                section.domain_name, note.source_name, note.message
            ),
        );
    }
}

// Transcript trouble is logged; the structured report still gets written.
fn append(transcript: &mut dyn TranscriptSink, line: &str) {
    if let Err(err) = transcript.append_text(line) {
        warn!(error = %err, "transcript write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors;
    use crate::config::Config;
    use crate::host::fake::FakeHost;
    use crate::snapshot::{Domain, SectionBuilder, SectionStatus};
    use std::time::{Duration, SystemTime};

    struct Scripted {
        domain: Domain,
        delay: Duration,
        panics: bool,
        cancel_after: Option<watch::Sender<bool>>,
    }

    impl Scripted {
        fn new(domain: Domain) -> Self {
            Self {
                domain,
                delay: Duration::ZERO,
                panics: false,
                cancel_after: None,
            }
        }
    }

    impl DomainCollector for Scripted {
        fn domain(&self) -> Domain {
            self.domain
        }

        fn collect(&self, _host: &dyn Host, _ctx: &RunContext) -> Section {
            std::thread::sleep(self.delay);
            if self.panics {
                panic!("probe exploded");
            }
            if let Some(tx) = &self.cancel_after {
                let _ = tx.send(true);
            }
            let mut section = SectionBuilder::new(self.domain);
            section.set("ok", true);
            section.finish()
        }
    }

    fn ctx(parallel: bool, timeout: Option<Duration>) -> Arc<RunContext> {
        let mut ctx = RunContext::new(&Config::default(), SystemTime::UNIX_EPOCH);
        ctx.parallel = parallel;
        ctx.domain_timeout = timeout;
        Arc::new(ctx)
    }

    fn domains(snapshot: &Snapshot) -> Vec<Domain> {
        snapshot.sections.iter().map(|s| s.domain_name).collect()
    }

    #[tokio::test]
    async fn sequential_run_keeps_configured_order() {
        let assembler = Assembler::new(
            Arc::new(FakeHost::healthy()),
            collectors::build(&Config::default()).expect("collectors"),
        );
        let (_tx, rx) = watch::channel(false);
        let mut transcript: Vec<String> = Vec::new();

        let snapshot = assembler.assemble(ctx(false, None), &rx, &mut transcript).await;
        assert_eq!(snapshot.host_id, "bench-01");
        assert_eq!(domains(&snapshot), Domain::ALL.to_vec());
        assert!(!snapshot.run.cancelled);
        assert_eq!(snapshot.timestamp, SystemTime::UNIX_EPOCH);
        assert!(transcript.iter().any(|l| l == "domain thermal started"));
        assert!(transcript
            .iter()
            .any(|l| l.starts_with("domain storage finished: Complete")));
    }

    #[tokio::test]
    async fn host_name_failure_uses_placeholder() {
        let assembler = Assembler::new(
            Arc::new(FakeHost::default()),
            vec![Arc::new(Scripted::new(Domain::System))],
        );
        let (_tx, rx) = watch::channel(false);
        let snapshot = assembler
            .assemble(ctx(false, None), &rx, &mut Vec::<String>::new())
            .await;
        assert_eq!(snapshot.host_id, "unknown-host");
    }

    #[tokio::test]
    async fn slow_domain_becomes_unavailable() {
        let mut slow = Scripted::new(Domain::Storage);
        slow.delay = Duration::from_millis(400);
        let assembler = Assembler::new(
            Arc::new(FakeHost::healthy()),
            vec![Arc::new(slow), Arc::new(Scripted::new(Domain::Services))],
        );
        let (_tx, rx) = watch::channel(false);

        let snapshot = assembler
            .assemble(
                ctx(false, Some(Duration::from_millis(50))),
                &rx,
                &mut Vec::<String>::new(),
            )
            .await;
        let storage = snapshot.section(Domain::Storage).expect("storage section");
        assert_eq!(storage.status, SectionStatus::Unavailable);
        assert!(storage.fields.is_empty());
        assert_eq!(storage.notes[0].source_name, "assembler");
        assert!(storage.notes[0].message.contains("timed out"));

        let services = snapshot.section(Domain::Services).expect("services section");
        assert_eq!(services.status, SectionStatus::Complete);
    }

    #[tokio::test]
    async fn panicking_collector_is_contained() {
        let mut broken = Scripted::new(Domain::Thermal);
        broken.panics = true;
        let assembler = Assembler::new(
            Arc::new(FakeHost::healthy()),
            vec![Arc::new(broken), Arc::new(Scripted::new(Domain::EventLog))],
        );
        let (_tx, rx) = watch::channel(false);

        let snapshot = assembler
            .assemble(ctx(false, None), &rx, &mut Vec::<String>::new())
            .await;
        let thermal = snapshot.section(Domain::Thermal).expect("thermal section");
        assert_eq!(thermal.status, SectionStatus::Unavailable);
        assert_eq!(thermal.notes[0].message, "collector panicked");
        assert_eq!(
            snapshot.section(Domain::EventLog).map(|s| s.status),
            Some(SectionStatus::Complete)
        );
    }

    #[tokio::test]
    async fn cancellation_before_start_skips_everything() {
        let assembler = Assembler::new(
            Arc::new(FakeHost::healthy()),
            vec![
                Arc::new(Scripted::new(Domain::System)),
                Arc::new(Scripted::new(Domain::Storage)),
            ],
        );
        let (_tx, rx) = watch::channel(true);

        for parallel in [false, true] {
            let snapshot = assembler
                .assemble(ctx(parallel, None), &rx, &mut Vec::<String>::new())
                .await;
            assert!(snapshot.sections.is_empty());
            assert!(snapshot.run.cancelled);
            assert_eq!(
                snapshot.run.skipped_domains,
                vec![Domain::System, Domain::Storage]
            );
        }
    }

    #[tokio::test]
    async fn cancellation_mid_run_keeps_collected_sections() {
        let (tx, rx) = watch::channel(false);
        let mut first = Scripted::new(Domain::System);
        first.cancel_after = Some(tx);
        let assembler = Assembler::new(
            Arc::new(FakeHost::healthy()),
            vec![
                Arc::new(first),
                Arc::new(Scripted::new(Domain::PowerProfile)),
                Arc::new(Scripted::new(Domain::Storage)),
            ],
        );
        let mut transcript: Vec<String> = Vec::new();

        let snapshot = assembler.assemble(ctx(false, None), &rx, &mut transcript).await;
        assert_eq!(domains(&snapshot), vec![Domain::System]);
        assert!(snapshot.run.cancelled);
        assert_eq!(
            snapshot.run.skipped_domains,
            vec![Domain::PowerProfile, Domain::Storage]
        );
        assert!(transcript
            .iter()
            .any(|l| l == "collection cancelled, skipped: power_profile, storage"));
    }

    #[tokio::test]
    async fn parallel_run_joins_in_configured_order() {
        let mut slow = Scripted::new(Domain::System);
        slow.delay = Duration::from_millis(150);
        let assembler = Assembler::new(
            Arc::new(FakeHost::healthy()),
            vec![
                Arc::new(slow),
                Arc::new(Scripted::new(Domain::Thermal)),
                Arc::new(Scripted::new(Domain::Services)),
            ],
        );
        let (_tx, rx) = watch::channel(false);

        let snapshot = assembler
            .assemble(ctx(true, Some(Duration::from_secs(5))), &rx, &mut Vec::<String>::new())
            .await;
        assert_eq!(
            domains(&snapshot),
            vec![Domain::System, Domain::Thermal, Domain::Services]
        );
        assert!(snapshot.run.parallel);
        assert_eq!(snapshot.run.domain_timeout_secs, Some(5));
    }
}
