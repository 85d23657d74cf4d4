//! Runtime configuration.
//!
//! Defaults, overlaid by `<data_dir>/config.json` when present, overlaid by
//! `CHANCE_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, WorkError};

/// Name of the optional config file inside the data directory.
pub const CONFIG_FILE: &str = "config.json";

/// Longest accepted statistics window.
pub const MAX_STATS_WINDOW_DAYS: i64 = 36_500;

/// What to do with stored breakpoints when detection runs again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointPolicy {
    /// Keep every detection as its own record
    #[default]
    Append,
    /// Replace the action's earlier breakpoints
    Upsert,
}

impl std::str::FromStr for BreakpointPolicy {
    type Err = WorkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "append" => Ok(BreakpointPolicy::Append),
            "upsert" => Ok(BreakpointPolicy::Upsert),
            other => Err(WorkError::Config(format!("unknown breakpoint policy '{}'", other))),
        }
    }
}

/// Configuration for the application layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkConfig {
    /// Where the JSON store lives
    pub data_dir: PathBuf,
    /// Default number of next steps returned
    pub mes_limit: usize,
    /// Hide next steps below this priority
    pub mes_min_priority: Option<i32>,
    /// Lifetime of cached next-step lists
    pub cache_ttl_secs: u64,
    /// Replace or accumulate breakpoints
    pub breakpoint_policy: BreakpointPolicy,
    /// Decomposition attempts before giving up
    pub retry_attempts: u32,
    /// Pause between decomposition attempts
    pub retry_delay_ms: u64,
    /// Window for summary statistics
    pub stats_window_days: i64,
    /// Failures before an action is reported as parasitic
    pub parasitic_min_failures: usize,
}

impl Default for WorkConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".chance"),
            mes_limit: 5,
            mes_min_priority: None,
            cache_ttl_secs: 300,
            breakpoint_policy: BreakpointPolicy::Append,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            stats_window_days: 7,
            parasitic_min_failures: chance_progress::PARASITIC_MIN_FAILURES,
        }
    }
}

impl WorkConfig {
    /// Load configuration for a data directory.
    pub async fn load(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let path = data_dir.join(CONFIG_FILE);

        let mut config = match tokio::fs::read_to_string(&path).await {
            Ok(json) => serde_json::from_str::<WorkConfig>(&json)
                .map_err(|e| WorkError::Config(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => WorkConfig::default(),
            Err(e) => return Err(WorkError::Config(format!("{}: {}", path.display(), e))),
        };
        config.data_dir = data_dir.to_path_buf();

        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Overlay values from `CHANCE_*` variables provided by `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("CHANCE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("CHANCE_MES_LIMIT") {
            self.mes_limit = parse_env("CHANCE_MES_LIMIT", &v)?;
        }
        if let Some(v) = lookup("CHANCE_MES_MIN_PRIORITY") {
            self.mes_min_priority = Some(parse_env("CHANCE_MES_MIN_PRIORITY", &v)?);
        }
        if let Some(v) = lookup("CHANCE_CACHE_TTL_SECS") {
            self.cache_ttl_secs = parse_env("CHANCE_CACHE_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("CHANCE_BREAKPOINT_POLICY") {
            self.breakpoint_policy = v.parse()?;
        }
        if let Some(v) = lookup("CHANCE_RETRY_ATTEMPTS") {
            self.retry_attempts = parse_env("CHANCE_RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("CHANCE_RETRY_DELAY_MS") {
            self.retry_delay_ms = parse_env("CHANCE_RETRY_DELAY_MS", &v)?;
        }
        if let Some(v) = lookup("CHANCE_STATS_WINDOW_DAYS") {
            self.stats_window_days = parse_env("CHANCE_STATS_WINDOW_DAYS", &v)?;
        }
        if let Some(v) = lookup("CHANCE_PARASITIC_MIN_FAILURES") {
            self.parasitic_min_failures = parse_env("CHANCE_PARASITIC_MIN_FAILURES", &v)?;
        }
        self.validate()
    }

    /// Reject values the application layer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(0..=MAX_STATS_WINDOW_DAYS).contains(&self.stats_window_days) {
            return Err(WorkError::Config(format!(
                "stats_window_days must be between 0 and {}, got {}",
                MAX_STATS_WINDOW_DAYS, self.stats_window_days
            )));
        }
        Ok(())
    }

    /// Cache lifetime as a duration.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Retry pause as a duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Statistics window. Out-of-range values saturate.
    pub fn stats_window(&self) -> chrono::Duration {
        chrono::Duration::try_days(self.stats_window_days).unwrap_or(chrono::Duration::MAX)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| WorkError::Config(format!("{}='{}' is not a valid value", key, value)))
}
