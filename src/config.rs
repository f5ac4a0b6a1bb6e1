// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::history::{RetentionPolicy, DEFAULT_RETENTION_DAYS, MAX_RETENTION_DAYS};

pub const ENV_CONFIG_PATH: &str = "TENDER_WATCH_CONFIG";
pub const ENV_WEBHOOK_URL: &str = "TENDER_WATCH_WEBHOOK_URL";
pub const DEFAULT_CONFIG_TOML: &str = "config/tender_watch.toml";
pub const DEFAULT_CONFIG_JSON: &str = "config/tender_watch.json";

fn default_db_path() -> PathBuf {
    PathBuf::from("state/history.db")
}
fn default_retention_days() -> i64 {
    DEFAULT_RETENTION_DAYS
}
fn default_poll_interval_secs() -> u64 {
    300
}
fn default_clean_interval_secs() -> u64 {
    3600
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tender_codes: Vec<String>,
    /// Owner of the history entries written by this watcher.
    #[serde(default)]
    pub user_id: i64,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_clean_interval_secs")]
    pub clean_interval_secs: u64,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub webhook_url: Option<String>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            keywords: Vec::new(),
            tender_codes: Vec::new(),
            user_id: 0,
            db_path: default_db_path(),
            retention_days: default_retention_days(),
            poll_interval_secs: default_poll_interval_secs(),
            clean_interval_secs: default_clean_interval_secs(),
            source_url: None,
            webhook_url: None,
        }
    }
}

impl WatchConfig {
    pub fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::days(self.retention_days)
    }

    // trim, drop empties, dedup; intervals of 0 fall back to defaults;
    // retention is capped at MAX_RETENTION_DAYS
    fn sanitized(mut self) -> Self {
        self.keywords = clean_list(self.keywords);
        self.tender_codes = clean_list(self.tender_codes);
        if self.poll_interval_secs == 0 {
            self.poll_interval_secs = default_poll_interval_secs();
        }
        if self.clean_interval_secs == 0 {
            self.clean_interval_secs = default_clean_interval_secs();
        }
        if self.retention_days <= 0 {
            self.retention_days = default_retention_days();
        }
        self.retention_days = self.retention_days.min(MAX_RETENTION_DAYS);
        self.source_url = self.source_url.filter(|s| !s.trim().is_empty());
        self.webhook_url = self.webhook_url.filter(|s| !s.trim().is_empty());
        self
    }

    fn apply_env(mut self) -> Self {
        if let Ok(url) = std::env::var(ENV_WEBHOOK_URL) {
            if !url.trim().is_empty() {
                self.webhook_url = Some(url);
            }
        }
        self
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<WatchConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading watch config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing watch config {}", path.display()))?;
    Ok(cfg.apply_env())
}

/// Load config using env var + fallbacks:
/// 1) $TENDER_WATCH_CONFIG
/// 2) config/tender_watch.toml
/// 3) config/tender_watch.json
pub fn load_config_default() -> Result<WatchConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    for candidate in [DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_JSON] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_config_from(&p);
        }
    }
    Ok(WatchConfig::default().apply_env())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<WatchConfig> {
    let cfg = match hint_ext {
        "json" => serde_json::from_str::<WatchConfig>(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| toml::from_str::<WatchConfig>(s).map_err(anyhow::Error::from)),
        _ => toml::from_str::<WatchConfig>(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| serde_json::from_str::<WatchConfig>(s).map_err(anyhow::Error::from)),
    };
    cfg.map(WatchConfig::sanitized)
        .map_err(|e| anyhow!("unsupported watch config format: {e}"))
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    use std::collections::BTreeSet;
    let mut set = BTreeSet::new();
    for it in items {
        let t = it.trim();
        if !t.is_empty() {
            set.insert(t.to_string());
        }
    }
    set.into_iter().collect()
}
