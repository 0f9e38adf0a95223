// src/config/dashboard.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::aggregate::sources::default_sources;
use crate::aggregate::types::Source;

pub const DEFAULT_CONFIG_PATH: &str = "config/dashboard.toml";

pub const ENV_CONFIG_PATH: &str = "DASHBOARD_CONFIG_PATH";
pub const ENV_UPSTREAM_URL: &str = "DASHBOARD_UPSTREAM_URL";
pub const ENV_BEHAVIOR_URL: &str = "DASHBOARD_BEHAVIOR_URL";
pub const ENV_PROVIDER_TIMEOUT_MS: &str = "DASHBOARD_PROVIDER_TIMEOUT_MS";

fn default_provider_timeout_ms() -> u64 {
    10_000
}
fn default_behavior_queue_capacity() -> usize {
    256
}
fn default_behavior_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// API gateway in front of the category services. Unset = offline demo data.
    #[serde(default)]
    pub upstream_base_url: Option<String>,
    /// Behavior logging endpoint base; falls back to `upstream_base_url`.
    #[serde(default)]
    pub behavior_base_url: Option<String>,
    #[serde(default = "default_provider_timeout_ms")]
    pub provider_timeout_ms: u64,
    /// 0 disables periodic refresh.
    #[serde(default)]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_behavior_queue_capacity")]
    pub behavior_queue_capacity: usize,
    #[serde(default = "default_behavior_timeout_ms")]
    pub behavior_timeout_ms: u64,
    /// Replaces the built-in registry when non-empty.
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            upstream_base_url: None,
            behavior_base_url: None,
            provider_timeout_ms: default_provider_timeout_ms(),
            refresh_interval_secs: 0,
            behavior_queue_capacity: default_behavior_queue_capacity(),
            behavior_timeout_ms: default_behavior_timeout_ms(),
            sources: Vec::new(),
        }
    }
}

impl DashboardConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading dashboard config from {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn parse(s: &str) -> Result<Self> {
        let mut cfg: DashboardConfig = toml::from_str(s)?;
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load using env var + fallbacks, then apply env overrides:
    /// 1) $DASHBOARD_CONFIG_PATH (must exist)
    /// 2) config/dashboard.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        let mut cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else {
            let pb = PathBuf::from(DEFAULT_CONFIG_PATH);
            if pb.exists() {
                Self::load_from_file(&pb)?
            } else {
                Self::default()
            }
        };
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(url) = non_empty_env(ENV_UPSTREAM_URL) {
            self.upstream_base_url = Some(url);
        }
        if let Some(url) = non_empty_env(ENV_BEHAVIOR_URL) {
            self.behavior_base_url = Some(url);
        }
        if let Some(ms) = non_empty_env(ENV_PROVIDER_TIMEOUT_MS).and_then(|v| v.parse().ok()) {
            self.provider_timeout_ms = ms;
        }
        self.sanitize();
    }

    fn sanitize(&mut self) {
        if self.provider_timeout_ms == 0 {
            self.provider_timeout_ms = default_provider_timeout_ms();
        }
        if self.behavior_timeout_ms == 0 {
            self.behavior_timeout_ms = default_behavior_timeout_ms();
        }
        if self.behavior_queue_capacity == 0 {
            self.behavior_queue_capacity = default_behavior_queue_capacity();
        }
        for url in [&mut self.upstream_base_url, &mut self.behavior_base_url] {
            if url.as_deref().is_some_and(|u| u.trim().is_empty()) {
                *url = None;
            }
        }
    }

    pub fn sources(&self) -> Vec<Source> {
        if self.sources.is_empty() {
            default_sources()
        } else {
            self.sources.clone()
        }
    }

    pub fn behavior_url(&self) -> Option<&str> {
        self.behavior_base_url
            .as_deref()
            .or(self.upstream_base_url.as_deref())
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_millis(self.provider_timeout_ms)
    }

    pub fn behavior_timeout(&self) -> Duration {
        Duration::from_millis(self.behavior_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
