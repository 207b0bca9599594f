// src/config.rs
use anyhow::{anyhow, bail, Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::extract::ExtractionStrategy;
use crate::source::{default_sources, Source};

pub const ENV_CONFIG_PATH: &str = "NRB_WATCH_CONFIG";
pub const DEFAULT_TOML_PATH: &str = "config/watch.toml";
pub const DEFAULT_JSON_PATH: &str = "config/watch.json";

static ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("source id regex must compile"));

fn default_state_dir() -> PathBuf {
    PathBuf::from("state")
}
/// Earlier deployments kept `last_seen_*.txt` in the working directory.
fn default_legacy_state_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_http_timeout_secs() -> u64 {
    30
}
fn default_smtp_host() -> String {
    "smtp.gmail.com".to_string()
}
fn default_smtp_port() -> u16 {
    465
}
fn default_smtp_timeout_secs() -> u64 {
    30
}

/// SMTP endpoint. Credentials never live here; see `notify::email::EmailConfig`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default = "default_smtp_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: default_smtp_host(),
            port: default_smtp_port(),
            timeout_secs: default_smtp_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchConfig {
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    /// Read-only fallback for keys not yet present in `state_dir`.
    #[serde(default = "default_legacy_state_dir")]
    pub legacy_state_dir: PathBuf,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Prometheus textfile written at the end of a run, if set.
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
    #[serde(default)]
    pub smtp: SmtpSettings,
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
            legacy_state_dir: default_legacy_state_dir(),
            http_timeout_secs: default_http_timeout_secs(),
            metrics_textfile: None,
            smtp: SmtpSettings::default(),
            sources: default_sources(),
        }
    }
}

impl WatchConfig {
    /// Reject configurations the engine cannot run safely.
    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("no sources configured");
        }
        if self.http_timeout_secs == 0 || self.smtp.timeout_secs == 0 {
            bail!("timeouts must be at least one second");
        }
        let mut seen = HashSet::new();
        for s in &self.sources {
            if !ID_RE.is_match(&s.id) {
                bail!("source id {:?} must match {}", s.id, ID_RE.as_str());
            }
            if !seen.insert(s.id.as_str()) {
                bail!("duplicate source id {:?}", s.id);
            }
            if s.locator.trim().is_empty() {
                bail!("source {:?} has an empty locator", s.id);
            }
            if let ExtractionStrategy::BottommostPatternMatch { must_contain_all } = &s.strategy {
                if must_contain_all.is_empty() || must_contain_all.iter().any(|f| f.trim().is_empty()) {
                    bail!("source {:?}: must_contain_all needs non-blank fragments", s.id);
                }
            }
        }
        Ok(())
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<WatchConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config using env var + fallbacks:
/// 1) $NRB_WATCH_CONFIG
/// 2) config/watch.toml
/// 3) config/watch.json
/// 4) built-in NRB sources
pub fn load_config_default() -> Result<WatchConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
    }
    for candidate in [DEFAULT_TOML_PATH, DEFAULT_JSON_PATH] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_config_from(&p);
        }
    }
    tracing::debug!("no config file found, using built-in sources");
    Ok(WatchConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<WatchConfig> {
    match hint_ext {
        "json" => Ok(serde_json::from_str(s)?),
        "toml" => Ok(toml::from_str(s)?),
        // No usable extension: JSON always opens with a brace, TOML never does.
        _ if s.trim_start().starts_with('{') => Ok(serde_json::from_str(s)?),
        _ => Ok(toml::from_str(s)?),
    }
}
