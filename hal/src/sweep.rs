//! Sweep tool interface for rfwatch HAL
//! Runs `hackrf_sweep` over an interval and turns its output into a power profile

use crate::{parse, HalError, Interval, PowerProfile};
use serde::{Serialize, Deserialize};
use std::process::Command;
use std::time::{Duration, Instant};

/// Capability to measure one interval
pub trait SweepTool {
    /// Sweep `interval` with `samples` samples per bin
    fn sweep(&self, interval: &Interval, samples: u32) -> Result<PowerProfile, HalError>;
}

/// Shape of the sweep tool's standard output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutput {
    /// CSV rows of `date, time, hz_low, hz_high, bin_width, samples, dB...`
    #[default]
    Raw,
    /// One flat comma-separated list of dB values, one per bin
    Integrated,
}

/// Sweep device configuration
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub command: String,
    pub lna_gain: u32,   // dB
    pub vga_gain: u32,   // dB
    pub rx_amp: bool,
    pub bias_tee: bool,
    pub output: SweepOutput,
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            command: "hackrf_sweep".to_string(),
            lna_gain: 16,
            vga_gain: 16,
            rx_amp: false,
            bias_tee: false,
            output: SweepOutput::Raw,
            attempts: 3,
            retry_delay: Duration::from_secs(10),
        }
    }
}

/// HackRF One driven through `hackrf_sweep`
pub struct HackRfSweep {
    config: SweepConfig,
}

impl HackRfSweep {
    pub fn new(config: SweepConfig) -> Self {
        Self { config }
    }

    /// Command-line arguments for one sweep
    pub fn command_args(&self, interval: &Interval, samples: u32) -> Vec<String> {
        vec![
            "-l".to_string(), self.config.lna_gain.to_string(),
            "-g".to_string(), self.config.vga_gain.to_string(),
            "-a".to_string(), u8::from(self.config.rx_amp).to_string(),
            "-p".to_string(), u8::from(self.config.bias_tee).to_string(),
            "-N".to_string(), samples.to_string(),
            "-f".to_string(), format!("{}:{}", interval.start_mhz(), interval.end_mhz()),
            "-w".to_string(), interval.width.to_string(),
        ]
    }

    /// Run the tool once and return its standard output
    fn run_once(&self, args: &[String]) -> Result<String, HalError> {
        let output = Command::new(&self.config.command)
            .args(args)
            .output()
            .map_err(|e| {
                tracing::error!("Failed to launch \"{}\": {}", self.config.command, e);
                HalError::IoError(e)
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::error!("Failed to get data from {}: {}", self.config.command, stderr);
            return Err(HalError::CommandFailed(format!("{} exited with {}: {}",
                self.config.command, output.status, stderr)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl SweepTool for HackRfSweep {
    fn sweep(&self, interval: &Interval, samples: u32) -> Result<PowerProfile, HalError> {
        if interval.is_empty() || interval.width == 0 {
            return Err(HalError::InvalidConfig(format!("cannot sweep interval {}", interval)));
        }

        let args = self.command_args(interval, samples);
        tracing::info!("Running command \"{} {}\"", self.config.command, args.join(" "));

        let started = Instant::now();
        let output = retry(self.config.attempts, self.config.retry_delay, |_| self.run_once(&args))?;
        tracing::debug!("{}: {:.2}s", self.config.command, started.elapsed().as_secs_f64());

        match self.config.output {
            SweepOutput::Integrated => parse::parse_integrated(&output, interval),
            SweepOutput::Raw => Ok(parse::parse_raw(&output, interval)),
        }
    }
}

/// Run `op` up to `attempts` times, sleeping `delay` between attempts.
///
/// The closure receives the 1-based attempt number. When every attempt
/// fails, the last error is surfaced as [`HalError::SweepFailure`].
pub fn retry<T, F>(attempts: u32, delay: Duration, mut op: F) -> Result<T, HalError>
where
    F: FnMut(u32) -> Result<T, HalError>,
{
    let attempts = attempts.max(1);
    let mut last = String::new();

    for attempt in 1..=attempts {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!("Sweep attempt {}/{} failed: {}", attempt, attempts, e);
                last = e.to_string();
                if attempt < attempts && !delay.is_zero() {
                    std::thread::sleep(delay);
                }
            }
        }
    }

    Err(HalError::SweepFailure { attempts, reason: last })
}
