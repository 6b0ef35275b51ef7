//! Monitoring settings and configuration document loading

use crate::{MonitorError, Result};
use serde::de::DeserializeOwned;
use serde::{Serialize, Deserialize};
use std::path::Path;
use std::time::Duration;

/// What a tick does when its first crossing lies in an ignored range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoredCrossingPolicy {
    /// Record the ignored bin and stop scanning the interval for this tick
    #[default]
    FirstCrossing,
    /// Prefer the strongest non-ignored crossing; record an ignored
    /// bin only when nothing else crosses
    SkipIgnored,
}

/// Monitoring engine configuration
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Samples per bin while building the baseline
    pub tune_samples: u32,
    /// Samples per bin for each monitoring scan
    pub monitor_samples: u32,
    /// Margin above baseline (dB) that counts as a crossing
    pub sensitivity: f64,
    /// Scans averaged per interval per tick
    pub integration: u32,
    /// Ticks per cycle before the baseline is rebuilt
    pub tuning_period: u32,
    pub ignored_policy: IgnoredCrossingPolicy,
    /// Pause after each interval within a tick
    pub interval_pause: Duration,
    /// Pause after each tick
    pub tick_pause: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            tune_samples: 200,
            monitor_samples: 20,
            sensitivity: 10.0,
            integration: 1,
            tuning_period: 20,
            ignored_policy: IgnoredCrossingPolicy::FirstCrossing,
            interval_pause: Duration::from_millis(250),
            tick_pause: Duration::from_millis(250),
        }
    }
}

impl MonitorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.tune_samples == 0 || self.monitor_samples == 0 {
            return Err(MonitorError::Config("sample counts must be positive".to_string()));
        }
        if self.integration == 0 {
            return Err(MonitorError::Config("integration must be at least 1".to_string()));
        }
        if self.tuning_period == 0 {
            return Err(MonitorError::Config("tuning_period must be at least 1".to_string()));
        }
        if !self.sensitivity.is_finite() {
            return Err(MonitorError::Config("sensitivity must be a finite number".to_string()));
        }
        Ok(())
    }
}

/// Read a TOML or JSON document, picked by file extension (TOML by default)
pub fn read_document<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))?;

    let is_json = path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        serde_json::from_str(&content)
            .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))
    } else {
        toml::from_str(&content)
            .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))
    }
}
