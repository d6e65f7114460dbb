use crate::config::Config;
use crate::snapshot::format_timestamp;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// Everything one run needs to know, fixed before the first collector starts.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub started_at: SystemTime,
    pub output_dir: PathBuf,
    pub domain_timeout: Option<Duration>,
    pub event_lookback: Duration,
    pub max_events_per_channel: usize,
    pub parallel: bool,
}

impl RunContext {
    pub fn new(cfg: &Config, started_at: SystemTime) -> Self {
        Self {
            started_at,
            output_dir: cfg.output_dir.clone(),
            domain_timeout: (cfg.domain_timeout_secs > 0)
                .then(|| Duration::from_secs(cfg.domain_timeout_secs)),
            event_lookback: Duration::from_secs(cfg.events.lookback_hours * 3600),
            max_events_per_channel: cfg.events.max_per_channel,
            parallel: cfg.parallel,
        }
    }

    /// `snapshot_20261015T093000Z`; lexical order matches time order.
    pub fn report_stem(&self) -> String {
        let compact: String = format_timestamp(self.started_at)
            .chars()
            .filter(|c| *c != '-' && *c != ':')
            .collect();
        format!("snapshot_{compact}")
    }

    pub fn lookback_hours(&self) -> u64 {
        self.event_lookback.as_secs() / 3600
    }
}
