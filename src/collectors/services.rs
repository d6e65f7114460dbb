use super::{encode, DomainCollector};
use crate::config::ServicesConfig;
use crate::context::RunContext;
use crate::host::{Host, ServiceEntry};
use crate::snapshot::{Domain, Section, SectionBuilder};
use regex::Regex;

/// Shell-style service pattern: `*` matches any run, `?` one character,
/// case-insensitive, anchored at both ends.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    re: Regex,
}

impl GlobPattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        let mut source = String::with_capacity(pattern.len() + 8);
        source.push_str("(?i)^");
        for ch in pattern.chars() {
            match ch {
                '*' => source.push_str(".*"),
                '?' => source.push('.'),
                other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
            }
        }
        source.push('$');
        Ok(Self {
            re: Regex::new(&source)?,
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.re.is_match(text)
    }
}

/// Vendor/hardware management services by exact name, plus sync and
/// security services by pattern.
pub struct ServiceCollector {
    vendor_watch: Vec<String>,
    sync_security: Vec<GlobPattern>,
}

impl ServiceCollector {
    pub fn new(vendor_watch: Vec<String>, sync_security: Vec<GlobPattern>) -> Self {
        Self {
            vendor_watch,
            sync_security,
        }
    }

    pub fn from_config(cfg: &ServicesConfig) -> Result<Self, regex::Error> {
        let patterns = cfg
            .sync_security_patterns
            .iter()
            .map(|p| GlobPattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(cfg.vendor_watch.clone(), patterns))
    }

    /// Watch-list order; names absent from the host are skipped.
    fn vendor_services<'a>(&self, services: &'a [ServiceEntry]) -> Vec<&'a ServiceEntry> {
        self.vendor_watch
            .iter()
            .filter_map(|wanted| {
                services
                    .iter()
                    .find(|s| s.name.eq_ignore_ascii_case(wanted))
            })
            .collect()
    }

    /// Sorted by name, each service at most once.
    fn sync_security_services<'a>(&self, services: &'a [ServiceEntry]) -> Vec<&'a ServiceEntry> {
        let mut matched: Vec<&ServiceEntry> = services
            .iter()
            .filter(|s| {
                self.sync_security
                    .iter()
                    .any(|p| p.matches(&s.name) || p.matches(&s.display_name))
            })
            .collect();
        matched.sort_by(|a, b| {
            a.name
                .to_ascii_lowercase()
                .cmp(&b.name.to_ascii_lowercase())
                .then_with(|| a.name.cmp(&b.name))
        });
        matched.dedup_by(|a, b| a.name.eq_ignore_ascii_case(&b.name));
        matched
    }
}

impl DomainCollector for ServiceCollector {
    fn domain(&self) -> Domain {
        Domain::Services
    }

    fn collect(&self, host: &dyn Host, _ctx: &RunContext) -> Section {
        let mut section = SectionBuilder::new(Domain::Services);

        let services = section.probe("service_enumeration", || host.services());
        section.set_opt(
            "vendor_services",
            services
                .as_deref()
                .map(|all| encode(&self.vendor_services(all))),
        );
        section.set_opt(
            "sync_security_services",
            services
                .as_deref()
                .map(|all| encode(&self.sync_security_services(all))),
        );

        section.finish()
    }
}
