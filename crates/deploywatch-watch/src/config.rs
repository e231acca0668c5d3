//! deploywatch.toml configuration parser.
//!
//! ```toml
//! [watch]
//! poll_interval = "3s"
//! timeout = "7m"
//!
//! [cluster]
//! namespace = "default"
//!
//! [[workloads]]
//! name = "web"
//! tolerance = "dynamic"
//! ```

use std::path::Path;
use std::time::Duration;

use deploywatch_rollout::tolerance::deserialize_setting;
use deploywatch_rollout::RolloutTolerance;
use serde::Deserialize;

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchConfig {
    #[serde(default)]
    pub watch: WatchSection,
    #[serde(default)]
    pub cluster: ClusterSection,
    #[serde(default)]
    pub workloads: Vec<WorkloadEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub poll_interval: String,
    /// How long a replica-set may take before it is considered timed out.
    pub timeout: String,
    pub max_backoff: String,
    /// Consecutive transport errors tolerated before the watch gives up.
    pub max_transport_failures: u32,
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            poll_interval: "3s".to_string(),
            timeout: "7m".to_string(),
            max_backoff: "60s".to_string(),
            max_transport_failures: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// kubectl binary to run.
    pub kubectl: String,
    pub namespace: Option<String>,
    pub context: Option<String>,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            kubectl: "kubectl".to_string(),
            namespace: None,
            context: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkloadEntry {
    pub name: String,
    /// `strict` (default), `dynamic`, or a replica count.
    #[serde(default, deserialize_with = "deserialize_setting")]
    pub tolerance: Option<RolloutTolerance>,
    /// Overrides `[cluster].namespace` for this workload.
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Parsed timing settings for one watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSettings {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub max_backoff: Duration,
    pub max_transport_failures: u32,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(7 * 60),
            max_backoff: Duration::from_secs(60),
            max_transport_failures: 10,
        }
    }
}

impl WatchConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Parse the `[watch]` durations.
    pub fn settings(&self) -> ConfigResult<WatchSettings> {
        let w = &self.watch;
        Ok(WatchSettings {
            poll_interval: duration_field("poll_interval", &w.poll_interval)?,
            timeout: duration_field("timeout", &w.timeout)?,
            max_backoff: duration_field("max_backoff", &w.max_backoff)?,
            max_transport_failures: w.max_transport_failures,
        })
    }
}

fn duration_field(field: &'static str, value: &str) -> ConfigResult<Duration> {
    parse_duration(value).ok_or_else(|| ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
    })
}

/// Parse durations like `500ms`, `3s`, `7m`, `1h`.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.trim().parse::<u64>().ok().map(Duration::from_millis);
    }
    let (digits, scale) = if let Some(secs) = s.strip_suffix('s') {
        (secs, 1)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, 60)
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, 3600)
    } else {
        return None;
    };
    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(scale))
        .map(Duration::from_secs)
}
