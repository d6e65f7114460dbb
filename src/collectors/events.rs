use super::{encode, DomainCollector};
use crate::context::RunContext;
use crate::host::{EventQuery, Host};
use crate::snapshot::{Domain, Section, SectionBuilder};
use tracing::debug;

/// Recent warning and error events, one field per channel.
pub struct EventLogCollector {
    channels: Vec<String>,
}

impl EventLogCollector {
    pub fn new(channels: Vec<String>) -> Self {
        Self { channels }
    }
}

impl DomainCollector for EventLogCollector {
    fn domain(&self) -> Domain {
        Domain::EventLog
    }

    fn collect(&self, host: &dyn Host, ctx: &RunContext) -> Section {
        let mut section = SectionBuilder::new(Domain::EventLog);

        for channel in &self.channels {
            let query = EventQuery {
                channel: channel.as_str(),
                lookback: ctx.event_lookback,
                max_events: ctx.max_events_per_channel,
            };
            let source = format!("event_query[{channel}]");
            let events = section.probe(&source, || host.events(&query)).map(|mut events| {
                events.truncate(ctx.max_events_per_channel);
                events
            });
            if let Some(events) = &events {
                debug!(channel = %channel, count = events.len(), "event channel read");
            }
            section.set_opt(channel, events.as_ref().map(encode));
        }

        section.finish()
    }
}
