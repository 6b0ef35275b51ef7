//! rfwatch Spectrum Monitoring Library
//!
//! Builds a per-bin power baseline over a set of frequency intervals and
//! flags bins whose power rises above it by a configured margin.

pub mod grid;
pub mod ignore;
pub mod settings;
pub mod baseline;
pub mod detect;
pub mod engine;
pub mod recording;
pub mod chart;

use chrono::{DateTime, Local, TimeZone};
use rfwatch_hal::HalError;
use serde::{Serialize, Deserialize};

/// Detection record, one CSV line in the event log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionEvent {
    /// Unix timestamp (seconds)
    pub timestamp: i64,
    /// Local wall clock time, `HH:MM:SS`
    pub local_time: String,
    /// Bin-center frequency (Hz)
    pub frequency: u64,
    /// Whether the frequency fell in an ignored range
    pub ignored: bool,
}

impl DetectionEvent {
    pub fn new(frequency: u64, ignored: bool) -> Self {
        Self::at(Local::now(), frequency, ignored)
    }

    pub fn at<Tz: TimeZone>(time: DateTime<Tz>, frequency: u64, ignored: bool) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        Self {
            timestamp: time.timestamp(),
            local_time: time.format("%H:%M:%S").to_string(),
            frequency,
            ignored,
        }
    }

    /// `unix_timestamp,HH:MM:SS,frequency_hz,ignored_flag`
    pub fn to_csv_line(&self) -> String {
        format!("{},{},{},{}", self.timestamp, self.local_time, self.frequency, u8::from(self.ignored))
    }

    /// Parse one event log line. Fractional timestamps are floored.
    pub fn from_csv_line(line: &str) -> Result<Self> {
        let fields: Vec<&str> = line.trim().split(',').map(str::trim).collect();
        if fields.len() != 4 {
            return Err(MonitorError::Recording(format!("Expected 4 fields, got {}: {:?}", fields.len(), line)));
        }

        let timestamp = fields[0].parse::<f64>()
            .map_err(|e| MonitorError::Recording(format!("Bad timestamp {:?}: {}", fields[0], e)))?
            .floor() as i64;
        let frequency = fields[2].parse::<u64>()
            .map_err(|e| MonitorError::Recording(format!("Bad frequency {:?}: {}", fields[2], e)))?;
        let ignored = match fields[3] {
            "0" => false,
            "1" => true,
            other => return Err(MonitorError::Recording(format!("Bad ignored flag {:?}", other))),
        };

        Ok(Self {
            timestamp,
            local_time: fields[1].to_string(),
            frequency,
            ignored,
        })
    }
}

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("HAL error: {0}")]
    Hal(#[from] HalError),

    #[error("Frequency {frequency} Hz not found in baseline")]
    BinMismatch { frequency: u64 },

    #[error("Sweep of {start}-{end} Hz produced no bins")]
    EmptyProfile { start: u64, end: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Recording error: {0}")]
    Recording(String),

    #[error("Chart error: {0}")]
    Chart(String),
}

pub type Result<T> = std::result::Result<T, MonitorError>;
