// src/config.rs
//! Application configuration.
//!
//! Lookup order:
//! 1) `$STREAM_NOTIFIER_CONFIG`
//! 2) `config/stream_notifier.toml`
//! 3) `config/stream_notifier.json`
//! 4) built-in defaults
//!
//! Notifier credentials are not part of this file; they come from the
//! environment (see `notify::NotifierMux::from_env`).

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigurationError;
use crate::poll::PollSettings;
use crate::scheduler::{ExistingPolicy, ScheduleConfig};

pub const ENV_CONFIG_PATH: &str = "STREAM_NOTIFIER_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub schedule: ScheduleSection,
    pub poll: PollSection,
    pub fetcher: FetcherConfig,
    pub storage: StorageSection,
    pub network: NetworkSection,
    pub http: HttpSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScheduleSection {
    pub minimum_interval_secs: u64,
    pub requires_network: bool,
    /// "keep" | "replace"
    pub existing_policy: String,
}

impl Default for ScheduleSection {
    fn default() -> Self {
        Self {
            minimum_interval_secs: 30 * 60,
            requires_network: true,
            existing_policy: "keep".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollSection {
    pub max_seen_per_entity: usize,
    pub max_concurrent: usize,
    pub run_deadline_secs: Option<u64>,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            max_seen_per_entity: 500,
            max_concurrent: 4,
            run_deadline_secs: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FetcherKind {
    #[default]
    Atom,
    Piped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FetcherConfig {
    pub kind: FetcherKind,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            kind: FetcherKind::Atom,
            base_url: "https://www.youtube.com".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSection {
    pub ledger_dir: PathBuf,
    pub subscriptions_path: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            ledger_dir: PathBuf::from("state/ledger"),
            subscriptions_path: PathBuf::from("config/subscriptions.toml"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkSection {
    pub probe_addr: String,
    pub probe_timeout_ms: u64,
    pub recheck_secs: u64,
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            probe_addr: "1.1.1.1:443".to_string(),
            probe_timeout_ms: 1500,
            recheck_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpSection {
    /// e.g. "127.0.0.1:9184"; no status server when unset.
    pub metrics_addr: Option<String>,
}

impl AppConfig {
    /// Load from an explicit path. Supports TOML or JSON.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_config(&content, &ext)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using the env var and file fallbacks; defaults when nothing exists.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        for candidate in ["config/stream_notifier.toml", "config/stream_notifier.json"] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from(&pb);
            }
        }
        Ok(Self::default())
    }

    /// Check every section; the first problem wins.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.schedule_config()?;
        self.poll_settings()?;
        if self.fetcher.timeout_secs == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "fetcher.timeout_secs",
                reason: "must be at least 1".into(),
            });
        }
        if self.fetcher.base_url.trim().is_empty() {
            return Err(ConfigurationError::InvalidValue {
                field: "fetcher.base_url",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    pub fn schedule_config(&self) -> Result<ScheduleConfig, ConfigurationError> {
        let policy: ExistingPolicy = self.schedule.existing_policy.parse()?;
        let cfg = ScheduleConfig {
            minimum_interval: Duration::from_secs(self.schedule.minimum_interval_secs),
            requires_network: self.schedule.requires_network,
            existing_policy: policy,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn poll_settings(&self) -> Result<PollSettings, ConfigurationError> {
        let p = &self.poll;
        if p.max_seen_per_entity == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "poll.max_seen_per_entity",
                reason: "must be at least 1".into(),
            });
        }
        if p.max_concurrent == 0 {
            return Err(ConfigurationError::InvalidValue {
                field: "poll.max_concurrent",
                reason: "must be at least 1".into(),
            });
        }
        Ok(PollSettings {
            max_seen_per_entity: p.max_seen_per_entity,
            max_concurrent: p.max_concurrent,
            run_deadline: p.run_deadline_secs.map(Duration::from_secs),
        })
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    match hint_ext {
        "json" => serde_json::from_str(s).context("parsing json config"),
        "toml" => toml::from_str(s).context("parsing toml config"),
        _ => toml::from_str(s)
            .or_else(|_| serde_json::from_str(s))
            .map_err(|_| anyhow!("unsupported config format")),
    }
}
