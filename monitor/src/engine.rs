//! Monitoring Engine
//!
//! Drives the tune-then-monitor cycle:
//!
//! 1. **Tune**: sweep every interval once at the tune sample count and keep
//!    the result as the cycle's baseline.
//! 2. **Monitor**: for `tuning_period` ticks, re-sweep each interval
//!    `integration` times, average the scans and compare the result with
//!    the baseline. At most one detection is recorded per interval per tick.
//!
//! Everything runs on the calling thread, one sweep at a time.

use crate::baseline::{measure, Baseline};
use crate::chart::{ChartRenderer, IntervalChart};
use crate::detect::{compare, integrate, Crossing};
use crate::ignore::{IgnoreList, IgnoreSource};
use crate::recording::{detection_chart_name, tune_chart_name, EventRecorder};
use crate::settings::MonitorSettings;
use crate::{DetectionEvent, MonitorError, Result};
use chrono::{DateTime, Local};
use rfwatch_hal::{Interval, PowerProfile, Retuner, SweepTool};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// State owned by one tune-then-monitor cycle
#[derive(Debug, Clone)]
pub struct Cycle {
    pub started: DateTime<Local>,
    pub baseline: Baseline,
}

/// Outcome of one monitoring pass over all intervals
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    pub events: Vec<DetectionEvent>,
    /// Intervals whose sweep failed this tick
    pub skipped: Vec<Interval>,
    /// Monitored bins missing from the baseline
    pub mismatched: usize,
}

/// Outcome of one full cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub active_intervals: usize,
    pub ticks: u32,
    pub events: usize,
}

/// Spectrum monitoring engine
pub struct MonitorEngine {
    intervals: Vec<Interval>,
    settings: MonitorSettings,
    sweeper: Box<dyn SweepTool>,
    ignore_source: Box<dyn IgnoreSource>,
    renderer: Box<dyn ChartRenderer>,
    retuner: Option<Box<dyn Retuner>>,
    recorder: EventRecorder,
    ignores: IgnoreList,
}

impl MonitorEngine {
    /// Create engine. Fails on invalid settings or an unreadable ignore list.
    pub fn new(
        intervals: Vec<Interval>,
        settings: MonitorSettings,
        sweeper: Box<dyn SweepTool>,
        ignore_source: Box<dyn IgnoreSource>,
        renderer: Box<dyn ChartRenderer>,
        recorder: EventRecorder,
    ) -> Result<Self> {
        settings.validate()?;
        if intervals.is_empty() {
            return Err(MonitorError::Config("no intervals to monitor".to_string()));
        }
        if let Some(bad) = intervals.iter().find(|i| i.is_empty() || i.width == 0) {
            return Err(MonitorError::Config(format!("invalid interval {}", bad)));
        }

        let ignores = ignore_source.refresh()?;

        Ok(Self {
            intervals,
            settings,
            sweeper,
            ignore_source,
            renderer,
            retuner: None,
            recorder,
            ignores,
        })
    }

    /// Retune a secondary receiver to every non-ignored detection
    pub fn with_retuner(mut self, retuner: Box<dyn Retuner>) -> Self {
        self.retuner = Some(retuner);
        self
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    pub fn recorder(&self) -> &EventRecorder {
        &self.recorder
    }

    /// Run cycles until `stop` is set
    pub fn run(&mut self, stop: &AtomicBool) -> Result<()> {
        while !stop.load(Ordering::Relaxed) {
            let report = self.run_cycle(stop)?;
            tracing::info!("Cycle complete: {} ticks over {} intervals, {} detections",
                report.ticks, report.active_intervals, report.events);
        }
        Ok(())
    }

    /// Tune, then monitor for `tuning_period` ticks
    pub fn run_cycle(&mut self, stop: &AtomicBool) -> Result<CycleReport> {
        let cycle = self.tune()?;
        let mut report = CycleReport {
            active_intervals: cycle.baseline.active(),
            ..Default::default()
        };

        for _ in 0..self.settings.tuning_period {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            let tick = self.tick(&cycle, stop);
            report.ticks += 1;
            report.events += tick.events.len();
            pause(self.settings.tick_pause);
        }

        Ok(report)
    }

    /// Build the cycle baseline and render one reference chart per interval
    pub fn tune(&mut self) -> Result<Cycle> {
        tracing::info!("Tuning to the radio frequencies.");

        let baseline = Baseline::build(self.sweeper.as_ref(), &self.intervals, self.settings.tune_samples);
        let started = Local::now();
        self.recorder.start_cycle(&started)?;
        let ignores = self.refresh_ignores();

        if let Some(dir) = self.recorder.charts_path() {
            for (index, interval) in self.intervals.iter().enumerate() {
                let Some(profile) = baseline.get(index) else { continue };

                let chart = IntervalChart {
                    interval,
                    baseline: profile,
                    current: None,
                    selected: None,
                    ignores: &ignores,
                };
                let path = dir.join(tune_chart_name(&started, interval));
                if let Err(e) = self.renderer.render_interval(&path, &chart) {
                    tracing::error!("Failed to render baseline chart for {}: {}", interval, e);
                }
            }
        }

        tracing::info!("Baseline ready for {}/{} intervals", baseline.active(), baseline.len());
        Ok(Cycle { started, baseline })
    }

    /// One monitoring pass over every interval with a baseline
    pub fn tick(&mut self, cycle: &Cycle, stop: &AtomicBool) -> TickReport {
        tracing::info!("Monitoring the radio frequencies.");
        let started = Instant::now();
        let ignores = self.refresh_ignores();
        let mut report = TickReport::default();

        for index in 0..self.intervals.len() {
            if stop.load(Ordering::Relaxed) {
                break;
            }

            let interval = self.intervals[index];
            let Some(baseline) = cycle.baseline.get(index) else { continue };

            let current = match self.integrate_interval(&interval) {
                Ok(current) => current,
                Err(e) => {
                    tracing::error!("Skipping {} this tick: {}", interval, e);
                    report.skipped.push(interval);
                    pause(self.settings.interval_pause);
                    continue;
                }
            };

            let comparison = compare(
                baseline,
                &current,
                self.settings.sensitivity,
                &ignores,
                self.settings.ignored_policy,
            );

            for &frequency in &comparison.mismatched {
                tracing::error!("{}", MonitorError::BinMismatch { frequency });
            }
            report.mismatched += comparison.mismatched.len();

            if let Some(crossing) = comparison.detection {
                let event = self.handle_detection(&interval, baseline, &current, &crossing, &ignores);
                report.events.push(event);
            }

            pause(self.settings.interval_pause);
        }

        tracing::debug!("Tick: {:.2}s", started.elapsed().as_secs_f64());
        report
    }

    /// Average `integration` monitoring scans of one interval
    pub fn integrate_interval(&self, interval: &Interval) -> Result<PowerProfile> {
        let scans = (0..self.settings.integration)
            .map(|_| measure(self.sweeper.as_ref(), interval, self.settings.monitor_samples))
            .collect::<Result<Vec<_>>>()?;
        Ok(integrate(&scans))
    }

    fn handle_detection(
        &mut self,
        interval: &Interval,
        baseline: &PowerProfile,
        current: &PowerProfile,
        crossing: &Crossing,
        ignores: &IgnoreList,
    ) -> DetectionEvent {
        let event = DetectionEvent::new(crossing.frequency, crossing.ignored);

        if crossing.ignored {
            tracing::info!(
                frequency = crossing.frequency,
                "Ignored crossing at {} Hz ({:+.2} dB)",
                crossing.frequency,
                crossing.offset()
            );
        } else {
            tracing::warn!(
                frequency = crossing.frequency,
                offset = crossing.offset(),
                "{} Hz  ::  {:.2} dB >= {:.2} dB + {:.2} dB",
                crossing.frequency,
                crossing.current,
                crossing.baseline,
                self.settings.sensitivity
            );

            if let Some(dir) = self.recorder.charts_path() {
                let chart = IntervalChart {
                    interval,
                    baseline,
                    current: Some(current),
                    selected: Some(crossing.frequency),
                    ignores,
                };
                let path = dir.join(detection_chart_name(&event.local_time, crossing.frequency));
                if let Err(e) = self.renderer.render_interval(&path, &chart) {
                    tracing::error!("Failed to render detection chart: {}", e);
                }
            }

            if let Some(retuner) = &self.retuner {
                match retuner.retune(crossing.frequency) {
                    Ok(true) => tracing::info!("Retuned receiver to {} Hz", crossing.frequency),
                    Ok(false) => tracing::debug!("Receiver already near {} Hz", crossing.frequency),
                    Err(e) => tracing::error!("Failed to retune receiver: {}", e),
                }
            }
        }

        if let Err(e) = self.recorder.record_event(&event) {
            tracing::error!("Failed to record detection: {}", e);
        }

        event
    }

    /// Fresh ignore list, or the previous one if it can no longer be read
    fn refresh_ignores(&mut self) -> IgnoreList {
        match self.ignore_source.refresh() {
            Ok(list) => self.ignores = list,
            Err(e) => tracing::error!("Keeping previous ignore list: {}", e),
        }
        self.ignores.clone()
    }
}

fn pause(duration: Duration) {
    if !duration.is_zero() {
        std::thread::sleep(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baseline::tests::{failure, profile, ScriptedSweep};
    use crate::ignore::IgnoredRange;
    use crate::recording::load_event_log;
    use crate::recording::EVENT_LOG_FILE;
    use crate::settings::IgnoredCrossingPolicy;
    use rfwatch_hal::HalError;
    use std::cell::RefCell;
    use std::path::Path;
    use std::rc::Rc;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq)]
    struct ChartCall {
        file_name: String,
        selected: Option<u64>,
        with_current: bool,
    }

    #[derive(Clone, Default)]
    struct ChartLog(Rc<RefCell<Vec<ChartCall>>>);

    impl ChartRenderer for ChartLog {
        fn render_interval(&self, path: &Path, chart: &IntervalChart<'_>) -> Result<()> {
            self.0.borrow_mut().push(ChartCall {
                file_name: path.file_name().unwrap().to_string_lossy().into_owned(),
                selected: chart.selected,
                with_current: chart.current.is_some(),
            });
            Ok(())
        }

        fn render_timeline(&self, _: &Path, _: &[DetectionEvent], _: &IgnoreList) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct RetuneLog(Rc<RefCell<Vec<u64>>>);

    impl Retuner for RetuneLog {
        fn retune(&self, frequency: u64) -> std::result::Result<bool, HalError> {
            self.0.borrow_mut().push(frequency);
            Ok(true)
        }
    }

    struct Harness {
        _dir: TempDir,
        engine: MonitorEngine,
        sweep: ScriptedSweep,
        charts: ChartLog,
        retunes: RetuneLog,
    }

    fn settings() -> MonitorSettings {
        MonitorSettings {
            sensitivity: 10.0,
            integration: 1,
            tuning_period: 2,
            interval_pause: Duration::ZERO,
            tick_pause: Duration::ZERO,
            ..Default::default()
        }
    }

    fn harness(
        intervals: Vec<Interval>,
        settings: MonitorSettings,
        ignores: IgnoreList,
        script: Vec<std::result::Result<PowerProfile, HalError>>,
    ) -> Harness {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let dir = TempDir::new().unwrap();
        let sweep = ScriptedSweep::new(script);
        let charts = ChartLog::default();
        let retunes = RetuneLog::default();

        let engine = MonitorEngine::new(
            intervals,
            settings,
            Box::new(sweep.clone()),
            Box::new(ignores),
            Box::new(charts.clone()),
            EventRecorder::new(dir.path()).unwrap(),
        )
        .unwrap()
        .with_retuner(Box::new(retunes.clone()));

        Harness { _dir: dir, engine, sweep, charts, retunes }
    }

    fn one_interval() -> Vec<Interval> {
        vec![Interval::from_mhz(100, 101, 250_000)]
    }

    fn logged_events(engine: &MonitorEngine) -> Vec<DetectionEvent> {
        let day = engine.recorder().day_path().unwrap().join(EVENT_LOG_FILE);
        load_event_log(&day).unwrap()
    }

    #[test]
    fn detection_is_recorded_charted_and_retuned() {
        let baseline = profile(&[(100_125_000, -80.0), (100_375_000, -80.0), (100_625_000, -80.0)]);
        let current = profile(&[(100_125_000, -68.0), (100_375_000, -65.0), (100_625_000, -79.0)]);
        let mut h = harness(one_interval(), settings(), IgnoreList::default(),
            vec![Ok(baseline), Ok(current)]);

        let stop = AtomicBool::new(false);
        let cycle = h.engine.tune().unwrap();
        let report = h.engine.tick(&cycle, &stop);

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].frequency, 100_375_000);
        assert!(!report.events[0].ignored);

        let charts = h.charts.0.borrow();
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].selected, None);
        assert!(!charts[0].with_current);
        assert!(charts[0].file_name.ends_with("-tune-100-101.svg"));
        assert_eq!(charts[1].selected, Some(100_375_000));
        assert!(charts[1].with_current);
        assert!(charts[1].file_name.ends_with("-100_375_000.svg"));

        assert_eq!(*h.retunes.0.borrow(), vec![100_375_000]);
        assert_eq!(logged_events(&h.engine), report.events);
    }

    #[test]
    fn ignored_detection_is_logged_without_side_effects() {
        let baseline = profile(&[(100_125_000, -80.0), (100_375_000, -80.0)]);
        let current = profile(&[(100_125_000, -60.0), (100_375_000, -50.0)]);
        let ignores = IgnoreList::new(vec![IgnoredRange { start: 100_000_000.0, end: 100_200_000.0 }]);
        let mut h = harness(one_interval(), settings(), ignores, vec![Ok(baseline), Ok(current)]);

        let cycle = h.engine.tune().unwrap();
        let report = h.engine.tick(&cycle, &AtomicBool::new(false));

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].frequency, 100_125_000);
        assert!(report.events[0].ignored);
        assert_eq!(h.charts.0.borrow().len(), 1); // baseline chart only
        assert!(h.retunes.0.borrow().is_empty());
        assert_eq!(logged_events(&h.engine).len(), 1);
    }

    #[test]
    fn skip_ignored_policy_reaches_the_real_anomaly() {
        let baseline = profile(&[(100_125_000, -80.0), (100_375_000, -80.0)]);
        let current = profile(&[(100_125_000, -60.0), (100_375_000, -50.0)]);
        let ignores = IgnoreList::new(vec![IgnoredRange { start: 100_000_000.0, end: 100_200_000.0 }]);
        let settings = MonitorSettings { ignored_policy: IgnoredCrossingPolicy::SkipIgnored, ..settings() };
        let mut h = harness(one_interval(), settings, ignores, vec![Ok(baseline), Ok(current)]);

        let cycle = h.engine.tune().unwrap();
        let report = h.engine.tick(&cycle, &AtomicBool::new(false));

        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].frequency, 100_375_000);
        assert_eq!(*h.retunes.0.borrow(), vec![100_375_000]);
    }

    #[test]
    fn integration_averages_monitoring_scans() {
        let baseline = profile(&[(100_125_000, -80.0)]);
        let settings = MonitorSettings { integration: 3, monitor_samples: 7, ..settings() };
        // -75, -65, -70: mean -70 crosses at exactly 10 dB; a cumulative sum would not
        let mut h = harness(one_interval(), settings, IgnoreList::default(), vec![
            Ok(baseline),
            Ok(profile(&[(100_125_000, -75.0)])),
            Ok(profile(&[(100_125_000, -65.0)])),
            Ok(profile(&[(100_125_000, -70.0)])),
        ]);

        let cycle = h.engine.tune().unwrap();
        let report = h.engine.tick(&cycle, &AtomicBool::new(false));
        assert_eq!(report.events.len(), 1);

        let calls = h.sweep.calls.borrow();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].1, 200);
        assert!(calls[1..].iter().all(|&(_, samples)| samples == 7));
    }

    #[test]
    fn failed_interval_is_skipped_and_others_continue() {
        let intervals = vec![Interval::from_mhz(100, 101, 250_000), Interval::from_mhz(200, 201, 250_000)];
        let mut h = harness(intervals, settings(), IgnoreList::default(), vec![
            Ok(profile(&[(100_125_000, -80.0)])),
            Ok(profile(&[(200_125_000, -80.0)])),
            Err(failure()),
            Ok(profile(&[(200_125_000, -40.0)])),
        ]);

        let cycle = h.engine.tune().unwrap();
        let report = h.engine.tick(&cycle, &AtomicBool::new(false));

        assert_eq!(report.skipped, vec![Interval::from_mhz(100, 101, 250_000)]);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].frequency, 200_125_000);
    }

    #[test]
    fn bins_missing_from_baseline_are_counted() {
        let mut h = harness(one_interval(), settings(), IgnoreList::default(), vec![
            Ok(profile(&[(100_125_000, -80.0)])),
            Ok(profile(&[(100_125_000, -80.0), (100_375_000, -10.0)])),
        ]);

        let cycle = h.engine.tune().unwrap();
        let report = h.engine.tick(&cycle, &AtomicBool::new(false));
        assert_eq!(report.mismatched, 1);
        assert!(report.events.is_empty());
    }

    #[test]
    fn cycle_tunes_once_then_ticks_tuning_period_times() {
        let quiet = || Ok(profile(&[(100_125_000, -80.0)]));
        let mut h = harness(one_interval(), settings(), IgnoreList::default(),
            vec![quiet(), quiet(), quiet()]);

        let report = h.engine.run_cycle(&AtomicBool::new(false)).unwrap();
        assert_eq!(report.ticks, 2);
        assert_eq!(report.active_intervals, 1);
        assert_eq!(report.events, 0);
        assert_eq!(h.sweep.calls.borrow().len(), 3);
        assert!(h.sweep.results.borrow().is_empty());
    }

    #[test]
    fn stop_flag_ends_the_cycle_early() {
        let mut h = harness(one_interval(), settings(), IgnoreList::default(),
            vec![Ok(profile(&[(100_125_000, -80.0)]))]);

        let report = h.engine.run_cycle(&AtomicBool::new(true)).unwrap();
        assert_eq!(report.ticks, 0);
        assert_eq!(h.sweep.calls.borrow().len(), 1);
    }

    #[test]
    fn engine_rejects_bad_configuration() {
        let dir = TempDir::new().unwrap();
        let build = |intervals: Vec<Interval>, settings: MonitorSettings| {
            MonitorEngine::new(
                intervals,
                settings,
                Box::new(ScriptedSweep::default()),
                Box::new(IgnoreList::default()),
                Box::new(ChartLog::default()),
                EventRecorder::new(dir.path()).unwrap(),
            )
        };

        assert!(matches!(build(vec![], settings()), Err(MonitorError::Config(_))));
        assert!(matches!(
            build(one_interval(), MonitorSettings { tuning_period: 0, ..settings() }),
            Err(MonitorError::Config(_))
        ));
        assert!(matches!(
            build(vec![Interval::new(5, 5, 1)], settings()),
            Err(MonitorError::Config(_))
        ));
    }
}
