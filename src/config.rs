use crate::snapshot::Domain;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "./hostsnap.yaml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_domain_timeout_secs")]
    pub domain_timeout_secs: u64,
    #[serde(default)]
    pub parallel: bool,
    #[serde(default = "default_domains")]
    pub domains: Vec<Domain>,
    #[serde(default)]
    pub events: EventsConfig,
    #[serde(default)]
    pub services: ServicesConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EventsConfig {
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: u64,
    #[serde(default = "default_max_per_channel")]
    pub max_per_channel: usize,
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesConfig {
    #[serde(default = "default_vendor_watch")]
    pub vendor_watch: Vec<String>,
    #[serde(default = "default_sync_security_patterns")]
    pub sync_security_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            domain_timeout_secs: default_domain_timeout_secs(),
            parallel: false,
            domains: default_domains(),
            events: EventsConfig::default(),
            services: ServicesConfig::default(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            lookback_hours: default_lookback_hours(),
            max_per_channel: default_max_per_channel(),
            channels: default_channels(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            vendor_watch: default_vendor_watch(),
            sync_security_patterns: default_sync_security_patterns(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Explicit path, else `./hostsnap.yaml` when present, else defaults.
    pub fn resolve(explicit: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }
        if Path::new(DEFAULT_CONFIG_PATH).is_file() {
            return Self::load_from_file(DEFAULT_CONFIG_PATH);
        }
        Ok(Self::default())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output_dir must not be empty".to_string(),
            ));
        }
        if self.domains.is_empty() {
            return Err(ConfigError::Validation(
                "domains must list at least one domain".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for domain in &self.domains {
            if !seen.insert(*domain) {
                return Err(ConfigError::Validation(format!(
                    "domain '{domain}' is listed more than once"
                )));
            }
        }

        validate_events(&self.events)?;
        validate_services(&self.services)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_events(cfg: &EventsConfig) -> Result<(), ConfigError> {
    if cfg.lookback_hours < 1 {
        return Err(ConfigError::Validation(
            "events.lookback_hours must be >= 1".to_string(),
        ));
    }
    if cfg.max_per_channel < 1 {
        return Err(ConfigError::Validation(
            "events.max_per_channel must be >= 1".to_string(),
        ));
    }
    if cfg.channels.is_empty() {
        return Err(ConfigError::Validation(
            "events.channels must not be empty".to_string(),
        ));
    }
    let mut names = HashSet::new();
    for channel in &cfg.channels {
        if !is_valid_channel_name(channel) {
            return Err(ConfigError::Validation(format!(
                "events.channels entry '{channel}' may only contain letters, digits, spaces, '-', '_' and '/'"
            )));
        }
        if !names.insert(channel.to_ascii_lowercase()) {
            return Err(ConfigError::Validation(format!(
                "event channel '{channel}' must be unique"
            )));
        }
    }
    Ok(())
}

fn validate_services(cfg: &ServicesConfig) -> Result<(), ConfigError> {
    if cfg.vendor_watch.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "services.vendor_watch entries must not be empty".to_string(),
        ));
    }
    if cfg.sync_security_patterns.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "services.sync_security_patterns entries must not be empty".to_string(),
        ));
    }
    Ok(())
}

pub fn is_valid_channel_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_' | '/'))
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}

const fn default_domain_timeout_secs() -> u64 {
    120
}

fn default_domains() -> Vec<Domain> {
    Domain::ALL.to_vec()
}

const fn default_lookback_hours() -> u64 {
    24
}

const fn default_max_per_channel() -> usize {
    200
}

fn default_channels() -> Vec<String> {
    vec!["System".to_string(), "Application".to_string()]
}

fn default_vendor_watch() -> Vec<String> {
    [
        "LenovoVantageService",
        "ImControllerService",
        "DellClientManagementService",
        "HPAppHelperCap",
        "HpTouchpointAnalyticsService",
        "ArmouryCrateService",
        "AsusAppService",
        "NVDisplay.ContainerLocalSystem",
        "AMD External Events Utility",
        "igfxCUIService2.0.0.0",
        "RtkAudioUniversalService",
        "Intel(R) Dynamic Tuning Technology Telemetry Service",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_sync_security_patterns() -> Vec<String> {
    [
        "OneSyncSvc*",
        "OneDrive*",
        "*Dropbox*",
        "GoogleDrive*",
        "WinDefend",
        "Sense",
        "SecurityHealthService",
        "wscsvc",
        "mpssvc",
        "WdNisSvc",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        cfg.validate().expect("default config must validate");
        assert_eq!(cfg.events.lookback_hours, 24);
        assert_eq!(cfg.events.max_per_channel, 200);
        assert_eq!(cfg.domains.len(), Domain::ALL.len());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let cfg: Config = serde_yaml::from_str(
            "parallel: true\nevents:\n  lookback_hours: 6\ndomains: [thermal, system]\n",
        )
        .expect("parse yaml");
        cfg.validate().expect("valid");
        assert!(cfg.parallel);
        assert_eq!(cfg.events.lookback_hours, 6);
        assert_eq!(cfg.events.max_per_channel, 200);
        assert_eq!(cfg.domains, vec![Domain::Thermal, Domain::System]);
        assert_eq!(cfg.domain_timeout_secs, 120);
    }

    #[test]
    fn example_config_parses() {
        let cfg: Config = serde_yaml::from_str(Config::example_yaml()).expect("parse example");
        cfg.validate().expect("example must validate");
    }

    #[test]
    fn rejects_duplicate_domains_and_bad_channels() {
        let mut cfg = Config::default();
        cfg.domains = vec![Domain::System, Domain::System];
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        let mut cfg = Config::default();
        cfg.events.channels = vec!["System'; Remove-Item".to_string()];
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));

        let mut cfg = Config::default();
        cfg.events.max_per_channel = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn channel_names_allow_provider_paths() {
        assert!(is_valid_channel_name("Microsoft-Windows-Kernel-Power/Thermal-Operational"));
        assert!(!is_valid_channel_name("   "));
        assert!(!is_valid_channel_name("Sys$tem"));
    }
}
