//! Ignored frequency ranges
//!
//! Crossings inside an ignored range are logged but never acted on.
//! The list lives in the configuration document and is re-read through
//! [`IgnoreSource::refresh`] so it can be edited while the monitor runs.

use crate::settings::read_document;
use crate::{MonitorError, Result};
use serde::{Serialize, Deserialize};
use std::path::PathBuf;

/// Ignored range as written in configuration (Hz)
///
/// Either `start`/`end` or `center`/`span`; `start`/`end` win when both are given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IgnoredRangeSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span: Option<f64>,
}

impl IgnoredRangeSpec {
    pub fn normalize(&self) -> Result<IgnoredRange> {
        match (self.start, self.end, self.center, self.span) {
            (Some(start), Some(end), _, _) => Ok(IgnoredRange { start, end }),
            (_, _, Some(center), Some(span)) => Ok(IgnoredRange {
                start: center - span,
                end: center + span,
            }),
            _ => Err(MonitorError::Config(format!(
                "ignored frequency needs start/end or center/span: {:?}", self
            ))),
        }
    }
}

/// Inclusive ignored range (Hz)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IgnoredRange {
    pub start: f64,
    pub end: f64,
}

impl IgnoredRange {
    pub fn contains(&self, frequency: f64) -> bool {
        self.start <= frequency && frequency <= self.end
    }
}

/// Immutable snapshot of the ignored ranges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IgnoreList {
    ranges: Vec<IgnoredRange>,
}

impl IgnoreList {
    pub fn new(ranges: Vec<IgnoredRange>) -> Self {
        Self { ranges }
    }

    pub fn from_specs(specs: &[IgnoredRangeSpec]) -> Result<Self> {
        let ranges = specs.iter()
            .map(IgnoredRangeSpec::normalize)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ranges })
    }

    /// Linear scan; lists are expected to stay short
    pub fn contains(&self, frequency: f64) -> bool {
        self.ranges.iter().any(|r| r.contains(frequency))
    }

    pub fn is_ignored(&self, frequency: u64) -> bool {
        self.contains(frequency as f64)
    }

    pub fn ranges(&self) -> &[IgnoredRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// Where the ignore list comes from
pub trait IgnoreSource {
    /// Load a fresh snapshot
    fn refresh(&self) -> Result<IgnoreList>;
}

impl IgnoreSource for IgnoreList {
    fn refresh(&self) -> Result<IgnoreList> {
        Ok(self.clone())
    }
}

#[derive(Debug, Default, Deserialize)]
struct IgnoreDocument {
    #[serde(default)]
    ignored_frequencies: Vec<IgnoredRangeSpec>,
}

/// Re-reads `ignored_frequencies` from a configuration document
pub struct ConfigFileIgnores {
    path: PathBuf,
}

impl ConfigFileIgnores {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IgnoreSource for ConfigFileIgnores {
    fn refresh(&self) -> Result<IgnoreList> {
        let document: IgnoreDocument = read_document(&self.path)?;
        let list = IgnoreList::from_specs(&document.ignored_frequencies)?;
        tracing::debug!("Loaded {} ignored ranges from {}", list.len(), self.path.display());
        Ok(list)
    }
}
