// Application Configuration

use anyhow::Result;
use rfwatch_hal::{Interval, SweepConfig, SweepOutput};
use rfwatch_monitor::grid::{build_intervals, IncludedRange};
use rfwatch_monitor::ignore::{IgnoreList, IgnoredRangeSpec};
use rfwatch_monitor::settings::{read_document, IgnoredCrossingPolicy, MonitorSettings};
use rfwatch_monitor::MonitorError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Ranges to monitor (MHz edges, Hz bin width)
    #[serde(default)]
    pub included_frequencies: Vec<IncludedRange>,

    /// Known emitters (Hz), re-read every tick
    #[serde(default)]
    pub ignored_frequencies: Vec<IgnoredRangeSpec>,

    /// LNA gain (dB)
    #[serde(default = "default_gain")]
    pub lna_gain: u32,

    /// VGA gain (dB)
    #[serde(default = "default_gain")]
    pub vga_gain: u32,

    /// RF amplifier, 0 or 1
    #[serde(default)]
    pub rx_amp: u8,

    /// Antenna bias tee, 0 or 1
    #[serde(default)]
    pub bias_tee: u8,

    #[serde(default = "default_tune_samples")]
    pub tune_number_of_samples: u32,

    #[serde(default = "default_monitor_samples")]
    pub monitor_number_of_samples: u32,

    /// Detection margin above baseline (dB)
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,

    /// Scans averaged per interval per tick
    #[serde(default = "default_integration")]
    pub integration: u32,

    /// Ticks between baseline rebuilds
    #[serde(default = "default_tuning_period")]
    pub tuning_period: u32,

    /// Retune the KrakenSDR to each detection
    #[serde(default)]
    pub update_krakensdr: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub krakensdr_config_file_path: Option<PathBuf>,

    /// Event logs and charts
    #[serde(default = "default_graphs_dir")]
    pub graphs_dir_path: PathBuf,

    #[serde(default = "default_sweep_command")]
    pub sweep_command: String,

    #[serde(default)]
    pub sweep_output: SweepOutput,

    #[serde(default)]
    pub ignored_crossing_policy: IgnoredCrossingPolicy,

    #[serde(default = "default_pause_ms")]
    pub interval_pause_ms: u64,

    #[serde(default = "default_pause_ms")]
    pub tick_pause_ms: u64,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Path to config file (for reference)
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_gain() -> u32 { 16 }
fn default_tune_samples() -> u32 { 200 }
fn default_monitor_samples() -> u32 { 20 }
fn default_sensitivity() -> f64 { 10.0 }
fn default_integration() -> u32 { 1 }
fn default_tuning_period() -> u32 { 20 }
fn default_graphs_dir() -> PathBuf { PathBuf::from("./graphs") }
fn default_sweep_command() -> String { "hackrf_sweep".to_string() }
fn default_pause_ms() -> u64 { 250 }
fn default_retry_attempts() -> u32 { 3 }
fn default_retry_delay() -> u64 { 10 }

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            included_frequencies: Vec::new(),
            ignored_frequencies: Vec::new(),
            lna_gain: default_gain(),
            vga_gain: default_gain(),
            rx_amp: 0,
            bias_tee: 0,
            tune_number_of_samples: default_tune_samples(),
            monitor_number_of_samples: default_monitor_samples(),
            sensitivity: default_sensitivity(),
            integration: default_integration(),
            tuning_period: default_tuning_period(),
            update_krakensdr: false,
            krakensdr_config_file_path: None,
            graphs_dir_path: default_graphs_dir(),
            sweep_command: default_sweep_command(),
            sweep_output: SweepOutput::default(),
            ignored_crossing_policy: IgnoredCrossingPolicy::default(),
            interval_pause_ms: default_pause_ms(),
            tick_pause_ms: default_pause_ms(),
            retry_attempts: default_retry_attempts(),
            retry_delay_secs: default_retry_delay(),
            config_path: PathBuf::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from standard paths
    pub fn load() -> Result<Self> {
        let config_paths = [
            PathBuf::from("./config.toml"),
            PathBuf::from("./config.json"),
            PathBuf::from("/etc/rfwatch/config.toml"),
        ];

        for path in &config_paths {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        anyhow::bail!("No configuration file found (tried ./config.toml, ./config.json, /etc/rfwatch/config.toml)")
    }

    /// Load and validate configuration from specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config: AppConfig = read_document(path)?;
        config.config_path = path.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> rfwatch_monitor::Result<()> {
        if self.included_frequencies.is_empty() {
            return Err(MonitorError::Config("included_frequencies is empty".to_string()));
        }

        for range in &self.included_frequencies {
            range.validate()?;
        }

        if self.update_krakensdr && self.krakensdr_config_file_path.is_none() {
            return Err(MonitorError::Config(
                "update_krakensdr requires krakensdr_config_file_path".to_string()));
        }
        if self.retry_attempts == 0 {
            return Err(MonitorError::Config("retry_attempts must be at least 1".to_string()));
        }

        IgnoreList::from_specs(&self.ignored_frequencies)?;
        self.monitor_settings().validate()
    }

    pub fn intervals(&self) -> Vec<Interval> {
        build_intervals(&self.included_frequencies)
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            command: self.sweep_command.clone(),
            lna_gain: self.lna_gain,
            vga_gain: self.vga_gain,
            rx_amp: self.rx_amp != 0,
            bias_tee: self.bias_tee != 0,
            output: self.sweep_output,
            attempts: self.retry_attempts,
            retry_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn monitor_settings(&self) -> MonitorSettings {
        MonitorSettings {
            tune_samples: self.tune_number_of_samples,
            monitor_samples: self.monitor_number_of_samples,
            sensitivity: self.sensitivity,
            integration: self.integration,
            tuning_period: self.tuning_period,
            ignored_policy: self.ignored_crossing_policy,
            interval_pause: Duration::from_millis(self.interval_pause_ms),
            tick_pause: Duration::from_millis(self.tick_pause_ms),
        }
    }

    /// KrakenSDR settings file, when retuning is enabled
    pub fn retune_target(&self) -> Option<&Path> {
        if self.update_krakensdr {
            self.krakensdr_config_file_path.as_deref()
        } else {
            None
        }
    }
}

/// Sample configuration printed by `rfwatch-cli config`
pub const EXAMPLE_CONFIG: &str = r#"# rfwatch Configuration File
#
# TOML or JSON (by file extension). Pass with `rfwatch -c <file>`.

# Directory for event logs and charts
graphs_dir_path = "./graphs"

# Receiver gains (dB) and switches (0 or 1)
lna_gain = 16
vga_gain = 16
rx_amp = 0
bias_tee = 0

# Samples per bin for the baseline and for each monitoring scan
tune_number_of_samples = 200
monitor_number_of_samples = 20

# Margin above baseline that counts as a detection (dB)
sensitivity = 10.0

# Scans averaged per interval per tick
integration = 1

# Ticks before the baseline is rebuilt
tuning_period = 20

# What to do when the first crossing is ignored: first_crossing | skip_ignored
ignored_crossing_policy = "first_crossing"

# Sweep tool
sweep_command = "hackrf_sweep"
sweep_output = "raw"
retry_attempts = 3
retry_delay_secs = 10

# Pauses (ms)
interval_pause_ms = 250
tick_pause_ms = 250

# Point a KrakenSDR at every detection
update_krakensdr = false
# krakensdr_config_file_path = "/home/krakenrf/krakensdr_doa/_share/settings.json"

# Ranges to monitor: start/end in MHz, width in Hz
[[included_frequencies]]
start = 400
end = 470
width = 500000

[[included_frequencies.excluded_frequencies]]
start = 420
end = 430

[[included_frequencies]]
start = 860
end = 870
width = 250000

# Known emitters, in Hz: either start/end or center/span
[[ignored_frequencies]]
start = 433050000
end = 434790000

[[ignored_frequencies]]
center = 868300000
span = 150000
"#;
