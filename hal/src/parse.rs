//! Sweep output parsing
//!
//! `hackrf_sweep` writes one CSV row per hop:
//! `date, time, hz_low, hz_high, hz_bin_width, num_samples, dB, dB, ...`.
//! Rows overlap, so the same bin center can be reported more than once per
//! sweep; those readings are averaged.

use crate::{BinAccumulator, HalError, Interval, PowerProfile};

/// Column holding the lower edge of a row
const HZ_LOW_COLUMN: usize = 2;
/// First power sample column
const FIRST_SAMPLE_COLUMN: usize = 6;

/// Parse row-oriented raw sweep output.
///
/// Sample `n` (1-based) of a row sits at `hz_low + width * n - width / 2`.
/// Bins outside the interval are dropped. Malformed rows are skipped.
pub fn parse_raw(output: &str, interval: &Interval) -> PowerProfile {
    let mut acc = BinAccumulator::new();
    let width = interval.width as f64;

    for (line_no, line) in output.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() <= FIRST_SAMPLE_COLUMN {
            tracing::warn!("Skipping short sweep row {}: {:?}", line_no + 1, line);
            continue;
        }

        let hz_low = match fields[HZ_LOW_COLUMN].parse::<f64>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!("Skipping sweep row {} with bad hz_low {:?}", line_no + 1, fields[HZ_LOW_COLUMN]);
                continue;
            }
        };

        let samples: Result<Vec<f64>, _> = fields[FIRST_SAMPLE_COLUMN..]
            .iter()
            .filter(|v| !v.is_empty())
            .map(|v| v.parse::<f64>())
            .collect();

        let samples = match samples {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!("Skipping sweep row {}: {}", line_no + 1, e);
                continue;
            }
        };

        for (index, power) in samples.into_iter().enumerate() {
            let center = hz_low + width * (index + 1) as f64 - width / 2.0;
            if center < 0.0 {
                continue;
            }
            let frequency = center as u64;
            if interval.contains(frequency) {
                acc.add(frequency, power);
            }
        }
    }

    acc.finish()
}

/// Parse a flat comma-separated list of per-bin powers.
///
/// Values are assigned to `start, start + width, start + 2 * width, ...`.
pub fn parse_integrated(output: &str, interval: &Interval) -> Result<PowerProfile, HalError> {
    let mut profile = PowerProfile::new();
    let mut frequency = interval.start;

    for value in output.split(',').map(str::trim).filter(|v| !v.is_empty()) {
        let power = value.parse::<f64>()
            .map_err(|e| HalError::Parse(format!("Bad power value {:?}: {}", value, e)))?;
        profile.insert(frequency, power);
        frequency += interval.width;
    }

    Ok(profile)
}
