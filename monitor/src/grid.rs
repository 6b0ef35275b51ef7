//! Frequency Grid
//!
//! Splits the configured included ranges into the intervals that get swept.

use crate::{MonitorError, Result};
use rfwatch_hal::Interval;
use serde::{Serialize, Deserialize};

/// Sub-range carved out of an included range (MHz)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedRange {
    pub start: u64,
    pub end: u64,
}

/// Range to monitor (edges in MHz, bin width in Hz)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludedRange {
    pub start: u64,
    pub end: u64,
    pub width: u64,
    /// Must be non-overlapping and sorted by `start`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_frequencies: Vec<ExcludedRange>,
}

impl IncludedRange {
    /// Intervals covering this range minus its exclusions
    pub fn intervals(&self) -> Vec<Interval> {
        let mut intervals = Vec::with_capacity(self.excluded_frequencies.len() + 1);
        let mut cursor = self.start;

        for excluded in &self.excluded_frequencies {
            if cursor >= self.end {
                break;
            }
            push_non_empty(&mut intervals, cursor, excluded.start.min(self.end), self.width);
            cursor = cursor.max(excluded.end);
        }
        push_non_empty(&mut intervals, cursor, self.end, self.width);

        intervals
    }

    /// Reject empty ranges and exclusions that are outside the range,
    /// empty, overlapping or unsorted
    pub fn validate(&self) -> Result<()> {
        if self.start >= self.end {
            return Err(MonitorError::Config(format!(
                "included range {}-{} MHz must have start < end", self.start, self.end)));
        }
        if self.width == 0 {
            return Err(MonitorError::Config(format!(
                "included range {}-{} MHz has zero bin width", self.start, self.end)));
        }

        let mut previous_end = self.start;
        for excluded in &self.excluded_frequencies {
            if excluded.start >= excluded.end {
                return Err(MonitorError::Config(format!(
                    "excluded range {}-{} MHz must have start < end", excluded.start, excluded.end)));
            }
            if excluded.start < self.start || excluded.end > self.end {
                return Err(MonitorError::Config(format!(
                    "excluded range {}-{} MHz lies outside {}-{} MHz",
                    excluded.start, excluded.end, self.start, self.end)));
            }
            if excluded.start < previous_end {
                return Err(MonitorError::Config(format!(
                    "excluded range {}-{} MHz overlaps or precedes the previous one",
                    excluded.start, excluded.end)));
            }
            previous_end = excluded.end;
        }

        Ok(())
    }
}

fn push_non_empty(intervals: &mut Vec<Interval>, start: u64, end: u64, width: u64) {
    if start < end {
        intervals.push(Interval::from_mhz(start, end, width));
    }
}

/// Intervals for every included range, in configuration order
pub fn build_intervals(included: &[IncludedRange]) -> Vec<Interval> {
    included.iter().flat_map(IncludedRange::intervals).collect()
}
