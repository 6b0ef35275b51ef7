//! KrakenSDR retuning for rfwatch HAL
//! Points a secondary receiver at a detected frequency through its JSON settings file

use crate::{HalError, HZ_PER_MHZ};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Smallest center frequency change (MHz) worth writing
pub const RETUNE_TOLERANCE_MHZ: f64 = 0.1;

/// Receiver that can be pointed at a frequency
pub trait Retuner {
    /// Retune to `frequency` (Hz). Returns `false` when already tuned there.
    fn retune(&self, frequency: u64) -> Result<bool, HalError>;
}

/// KrakenSDR DAQ settings file with a `center_freq` field in MHz
pub struct KrakenRetuner {
    config_path: PathBuf,
}

impl KrakenRetuner {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self { config_path: config_path.into() }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    fn read_settings(&self) -> Result<Value, HalError> {
        let content = std::fs::read_to_string(&self.config_path)?;
        serde_json::from_str(&content)
            .map_err(|e| HalError::Retune(format!("{}: {}", self.config_path.display(), e)))
    }

    fn write_settings(&self, settings: &Value) -> Result<(), HalError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        settings.serialize(&mut ser)
            .map_err(|e| HalError::Retune(e.to_string()))?;
        std::fs::write(&self.config_path, buf)?;
        Ok(())
    }
}

/// Read `center_freq` as MHz, accepting numbers and numeric strings
fn center_freq(settings: &Value) -> Result<f64, HalError> {
    match settings.get("center_freq") {
        Some(Value::Number(n)) => n.as_f64()
            .ok_or_else(|| HalError::Retune("center_freq is not a finite number".to_string())),
        Some(Value::String(s)) => s.trim().parse::<f64>()
            .map_err(|e| HalError::Retune(format!("center_freq {:?}: {}", s, e))),
        Some(other) => Err(HalError::Retune(format!("center_freq has unexpected type: {}", other))),
        None => Err(HalError::Retune("center_freq missing".to_string())),
    }
}

impl Retuner for KrakenRetuner {
    fn retune(&self, frequency: u64) -> Result<bool, HalError> {
        let target = frequency as f64 / HZ_PER_MHZ as f64;
        let mut settings = self.read_settings()?;
        let current = center_freq(&settings)?;

        if (current - target).abs() <= RETUNE_TOLERANCE_MHZ {
            tracing::debug!("KrakenSDR already at {:.3} MHz", current);
            return Ok(false);
        }

        let Some(object) = settings.as_object_mut() else {
            return Err(HalError::Retune("settings file is not a JSON object".to_string()));
        };
        object.insert("center_freq".to_string(), Value::from(target));
        self.write_settings(&settings)?;

        tracing::info!("KrakenSDR retuned {:.3} MHz -> {:.3} MHz", current, target);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn settings_file(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("kraken_settings.json");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn retune_rewrites_center_freq_and_keeps_other_fields() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir, r#"{"center_freq": 433.0, "uniform_gain": 15.7}"#);

        let retuner = KrakenRetuner::new(&path);
        assert!(retuner.retune(446_500_000).unwrap());

        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["center_freq"].as_f64(), Some(446.5));
        assert_eq!(written["uniform_gain"].as_f64(), Some(15.7));
    }

    #[test]
    fn retune_within_tolerance_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let body = r#"{"center_freq": "433.05"}"#;
        let path = settings_file(&dir, body);

        let retuner = KrakenRetuner::new(&path);
        assert!(!retuner.retune(433_000_000).unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), body);
    }

    #[test]
    fn retune_without_center_freq_fails() {
        let dir = TempDir::new().unwrap();
        let path = settings_file(&dir, r#"{"uniform_gain": 15.7}"#);
        assert!(matches!(KrakenRetuner::new(&path).retune(433_000_000), Err(HalError::Retune(_))));
    }

    #[test]
    fn retune_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let retuner = KrakenRetuner::new(dir.path().join("absent.json"));
        assert!(matches!(retuner.retune(433_000_000), Err(HalError::IoError(_))));
    }
}
