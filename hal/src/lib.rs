//! rfwatch Hardware Abstraction Layer
//!
//! Wraps the external radio tools used by the rfwatch spectrum monitor.
//!
//! # Modules
//!
//! - [`sweep`] - `hackrf_sweep` invocation with retries
//! - [`parse`] - sweep output parsing and per-bin averaging
//! - [`kraken`] - KrakenSDR center frequency side-channel
//!
//! # Example
//!
//! ```rust,no_run
//! use rfwatch_hal::{HackRfSweep, Interval, SweepConfig, SweepTool};
//!
//! let sweeper = HackRfSweep::new(SweepConfig::default());
//! let interval = Interval::from_mhz(88, 108, 500_000);
//! let profile = sweeper.sweep(&interval, 20).unwrap();
//!
//! for (frequency, power) in profile.iter() {
//!     println!("{} Hz: {:.2} dB", frequency, power);
//! }
//! ```

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};

pub mod sweep;
pub mod parse;
pub mod kraken;

// Re-exports for convenience
pub use sweep::{HackRfSweep, SweepConfig, SweepOutput, SweepTool, retry};
pub use parse::{parse_integrated, parse_raw};
pub use kraken::{KrakenRetuner, Retuner};

/// Hertz per megahertz
pub const HZ_PER_MHZ: u64 = 1_000_000;

/// HAL Error types
#[derive(Debug, thiserror::Error)]
pub enum HalError {
    #[error("Sweep failed after {attempts} attempts: {reason}")]
    SweepFailure { attempts: u32, reason: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Retune failed: {0}")]
    Retune(String),
}

/// Contiguous sub-band swept as one unit at a fixed bin width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    /// Lower edge (Hz)
    pub start: u64,
    /// Upper edge (Hz)
    pub end: u64,
    /// Bin width (Hz)
    pub width: u64,
}

impl Interval {
    pub fn new(start: u64, end: u64, width: u64) -> Self {
        Self { start, end, width }
    }

    /// Build an interval from MHz edges and a Hz bin width
    pub fn from_mhz(start_mhz: u64, end_mhz: u64, width: u64) -> Self {
        Self::new(start_mhz * HZ_PER_MHZ, end_mhz * HZ_PER_MHZ, width)
    }

    pub fn start_mhz(&self) -> u64 {
        self.start / HZ_PER_MHZ
    }

    pub fn end_mhz(&self) -> u64 {
        self.end / HZ_PER_MHZ
    }

    pub fn span(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn contains(&self, frequency: u64) -> bool {
        self.start <= frequency && frequency <= self.end
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{} MHz @ {} Hz", self.start_mhz(), self.end_mhz(), self.width)
    }
}

/// Measured power per bin-center frequency, iterated in ascending order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PowerProfile {
    bins: BTreeMap<u64, f64>,
}

impl PowerProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, frequency: u64, power: f64) {
        self.bins.insert(frequency, power);
    }

    pub fn get(&self, frequency: u64) -> Option<f64> {
        self.bins.get(&frequency).copied()
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Bins in ascending frequency order
    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.bins.iter().map(|(&f, &p)| (f, p))
    }

    pub fn frequencies(&self) -> impl Iterator<Item = u64> + '_ {
        self.bins.keys().copied()
    }
}

impl FromIterator<(u64, f64)> for PowerProfile {
    fn from_iter<I: IntoIterator<Item = (u64, f64)>>(iter: I) -> Self {
        Self { bins: iter.into_iter().collect() }
    }
}

/// Running sum/count per bin, averaged on completion
#[derive(Debug, Clone, Default)]
pub struct BinAccumulator {
    sums: BTreeMap<u64, (f64, u32)>,
}

impl BinAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, frequency: u64, power: f64) {
        let entry = self.sums.entry(frequency).or_insert((0.0, 0));
        entry.0 += power;
        entry.1 += 1;
    }

    pub fn add_profile(&mut self, profile: &PowerProfile) {
        for (frequency, power) in profile.iter() {
            self.add(frequency, power);
        }
    }

    /// Arithmetic mean per bin
    pub fn finish(self) -> PowerProfile {
        self.sums
            .into_iter()
            .map(|(frequency, (sum, count))| (frequency, sum / count as f64))
            .collect()
    }
}
