//! Event Recording
//!
//! Append-only CSV event log plus the directory layout shared with the
//! chart renderer:
//!
//! ```text
//! <graphs_dir>/<yy_mm_dd>/measurements.csv
//! <graphs_dir>/<yy_mm_dd>/measurements.svg
//! <graphs_dir>/<yy_mm_dd>/measurements/<HH_MM_SS>-tune-<start>-<end>.svg
//! <graphs_dir>/<yy_mm_dd>/measurements/<HH_MM_SS>-<MHz>_<kHz>_<Hz>.svg
//! ```

use crate::{DetectionEvent, MonitorError, Result};
use chrono::{DateTime, TimeZone};
use rfwatch_hal::Interval;
use std::fs::{File, OpenOptions, create_dir_all};
use std::io::{Write, BufWriter, BufReader, BufRead};
use std::path::{Path, PathBuf};

pub const EVENT_LOG_FILE: &str = "measurements.csv";
pub const TIMELINE_FILE: &str = "measurements.svg";
pub const CHARTS_DIR: &str = "measurements";

/// Directory name for a day, e.g. `24_03_01`
pub fn day_dir_name<Tz: TimeZone>(time: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    time.format("%y_%m_%d").to_string()
}

/// Baseline chart file name, e.g. `14_05_09-tune-88-108.svg`
pub fn tune_chart_name<Tz: TimeZone>(time: &DateTime<Tz>, interval: &Interval) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}-tune-{}-{}.svg", time.format("%H_%M_%S"), interval.start_mhz(), interval.end_mhz())
}

/// Detection chart file name, e.g. `14_05_09-433_920_000.svg`
pub fn detection_chart_name(time_of_day: &str, frequency: u64) -> String {
    format!("{}-{:03}_{:03}_{:03}.svg",
        time_of_day.replace(':', "_"),
        frequency / 1_000_000,
        frequency % 1_000_000 / 1_000,
        frequency % 1_000)
}

/// Event recorder for one graphs directory
pub struct EventRecorder {
    base_path: PathBuf,
    day_path: Option<PathBuf>,
    writer: Option<BufWriter<File>>,
    event_count: usize,
}

impl EventRecorder {
    /// Create new recorder
    pub fn new(base_path: &Path) -> Result<Self> {
        create_dir_all(base_path)
            .map_err(|e| MonitorError::Recording(format!("Failed to create directory: {}", e)))?;

        Ok(Self {
            base_path: base_path.to_path_buf(),
            day_path: None,
            writer: None,
            event_count: 0,
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Open the day directory for a new cycle and its event log
    pub fn start_cycle<Tz: TimeZone>(&mut self, time: &DateTime<Tz>) -> Result<PathBuf>
    where
        Tz::Offset: std::fmt::Display,
    {
        let day_path = self.base_path.join(day_dir_name(time));

        create_dir_all(day_path.join(CHARTS_DIR))
            .map_err(|e| MonitorError::Recording(format!("Failed to create day dir: {}", e)))?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(day_path.join(EVENT_LOG_FILE))
            .map_err(|e| MonitorError::Recording(format!("Failed to open event log: {}", e)))?;

        if let Some(ref mut writer) = self.writer {
            writer.flush().ok();
        }
        self.writer = Some(BufWriter::new(file));
        self.day_path = Some(day_path.clone());

        tracing::debug!("Recording to {}", day_path.display());

        Ok(day_path)
    }

    /// Day directory of the current cycle
    pub fn day_path(&self) -> Option<&Path> {
        self.day_path.as_deref()
    }

    /// Chart directory of the current cycle
    pub fn charts_path(&self) -> Option<PathBuf> {
        self.day_path.as_ref().map(|p| p.join(CHARTS_DIR))
    }

    /// Append a detection to the event log
    pub fn record_event(&mut self, event: &DetectionEvent) -> Result<()> {
        let Some(ref mut writer) = self.writer else {
            return Err(MonitorError::Recording("No cycle started".to_string()));
        };

        writeln!(writer, "{}", event.to_csv_line())
            .map_err(|e| MonitorError::Recording(format!("Write error: {}", e)))?;

        writer.flush()
            .map_err(|e| MonitorError::Recording(format!("Flush error: {}", e)))?;

        self.event_count += 1;
        Ok(())
    }

    /// Events written by this recorder
    pub fn event_count(&self) -> usize {
        self.event_count
    }

    /// List day directories holding an event log, newest first
    pub fn list_days(&self) -> Result<Vec<String>> {
        let mut days = Vec::new();

        for entry in std::fs::read_dir(&self.base_path)
            .map_err(|e| MonitorError::Recording(format!("Read dir error: {}", e)))?
        {
            let entry = entry.map_err(|e| MonitorError::Recording(format!("Entry error: {}", e)))?;
            let path = entry.path();

            if path.is_dir() && path.join(EVENT_LOG_FILE).exists() {
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    days.push(name.to_string());
                }
            }
        }

        // yy_mm_dd sorts chronologically
        days.sort_by(|a, b| b.cmp(a));

        Ok(days)
    }

    /// Load events from a day's log, skipping unreadable lines
    pub fn load_events(&self, day: &str) -> Result<Vec<DetectionEvent>> {
        load_event_log(&self.base_path.join(day).join(EVENT_LOG_FILE))
    }
}

/// Read an event log file
pub fn load_event_log(path: &Path) -> Result<Vec<DetectionEvent>> {
    let file = File::open(path)
        .map_err(|e| MonitorError::Recording(format!("Open error: {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    let mut events = Vec::new();

    for line in reader.lines() {
        let line = line.map_err(|e| MonitorError::Recording(format!("Read error: {}", e)))?;
        if line.trim().is_empty() {
            continue;
        }

        match DetectionEvent::from_csv_line(&line) {
            Ok(event) => events.push(event),
            Err(e) => tracing::warn!("Skipping event log line {:?}: {}", line, e),
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap()
    }

    #[test]
    fn chart_names_match_layout() {
        let time = at(14, 5, 9);
        assert_eq!(day_dir_name(&time), "24_03_01");
        assert_eq!(tune_chart_name(&time, &Interval::from_mhz(88, 108, 500_000)), "14_05_09-tune-88-108.svg");
        assert_eq!(detection_chart_name("14:05:09", 433_920_125), "14_05_09-433_920_125.svg");
        assert_eq!(detection_chart_name("09:00:00", 88_500_000), "09_00_00-088_500_000.svg");
    }

    #[test]
    fn events_are_appended_across_cycles() {
        let dir = TempDir::new().unwrap();
        let mut recorder = EventRecorder::new(dir.path()).unwrap();

        let day = recorder.start_cycle(&at(10, 0, 0)).unwrap();
        assert!(day.join(CHARTS_DIR).is_dir());

        let first = DetectionEvent::at(at(10, 0, 1), 100_000_000, false);
        recorder.record_event(&first).unwrap();

        recorder.start_cycle(&at(11, 0, 0)).unwrap();
        let second = DetectionEvent::at(at(11, 0, 1), 200_000_000, true);
        recorder.record_event(&second).unwrap();

        assert_eq!(recorder.event_count(), 2);
        assert_eq!(recorder.load_events("24_03_01").unwrap(), vec![first, second]);
        assert_eq!(recorder.list_days().unwrap(), vec!["24_03_01".to_string()]);
    }

    #[test]
    fn recording_before_a_cycle_fails() {
        let dir = TempDir::new().unwrap();
        let mut recorder = EventRecorder::new(dir.path()).unwrap();
        let event = DetectionEvent::at(at(10, 0, 1), 100_000_000, false);
        assert!(matches!(recorder.record_event(&event), Err(MonitorError::Recording(_))));
    }

    #[test]
    fn partial_lines_are_skipped_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(EVENT_LOG_FILE);
        std::fs::write(&path, "1709301909,14:05:09,100000000,0\n1709301910,14:0").unwrap();

        let events = load_event_log(&path).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].frequency, 100_000_000);
    }
}
