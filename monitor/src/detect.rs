//! Anomaly Detection
//!
//! Compares an integrated monitoring profile against the baseline and picks
//! at most one bin per interval per tick.

use crate::ignore::IgnoreList;
use crate::settings::IgnoredCrossingPolicy;
use rfwatch_hal::{BinAccumulator, PowerProfile};

/// Average repeated scans per bin
pub fn integrate(scans: &[PowerProfile]) -> PowerProfile {
    let mut acc = BinAccumulator::new();
    for scan in scans {
        acc.add_profile(scan);
    }
    acc.finish()
}

/// Bin whose power rose above baseline by at least the sensitivity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossing {
    pub frequency: u64,
    pub current: f64,
    pub baseline: f64,
    pub ignored: bool,
}

impl Crossing {
    /// Rise above baseline (dB)
    pub fn offset(&self) -> f64 {
        self.current - self.baseline
    }
}

/// Result of comparing one interval for one tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comparison {
    /// Selected crossing, if any
    pub detection: Option<Crossing>,
    /// Monitored bins with no baseline entry
    pub mismatched: Vec<u64>,
}

/// Compare `current` against `baseline` and select the bin to report
pub fn compare(
    baseline: &PowerProfile,
    current: &PowerProfile,
    sensitivity: f64,
    ignores: &IgnoreList,
    policy: IgnoredCrossingPolicy,
) -> Comparison {
    let mut mismatched = Vec::new();
    let mut crossings = Vec::new();

    for (frequency, power) in current.iter() {
        let Some(reference) = baseline.get(frequency) else {
            mismatched.push(frequency);
            continue;
        };

        if power >= reference + sensitivity {
            crossings.push(Crossing {
                frequency,
                current: power,
                baseline: reference,
                ignored: ignores.is_ignored(frequency),
            });
        }
    }

    let detection = match policy {
        IgnoredCrossingPolicy::FirstCrossing => match crossings.first() {
            Some(first) if first.ignored => Some(*first),
            Some(_) => strongest(&crossings),
            None => None,
        },
        IgnoredCrossingPolicy::SkipIgnored => {
            strongest(&crossings).or_else(|| crossings.first().copied())
        }
    };

    Comparison { detection, mismatched }
}

/// Largest non-ignored offset; the lowest frequency wins ties
fn strongest(crossings: &[Crossing]) -> Option<Crossing> {
    let mut best: Option<Crossing> = None;
    for crossing in crossings.iter().filter(|c| !c.ignored) {
        match best {
            Some(b) if crossing.offset() <= b.offset() => {}
            _ => best = Some(*crossing),
        }
    }
    best
}
