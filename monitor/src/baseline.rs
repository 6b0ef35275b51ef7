//! Baseline construction
//!
//! One high-sample sweep per interval at the start of every cycle.

use crate::{MonitorError, Result};
use rfwatch_hal::{Interval, PowerProfile, SweepTool};

/// Sweep one interval, treating an empty result as a configuration fault
pub fn measure<S: SweepTool + ?Sized>(tool: &S, interval: &Interval, samples: u32) -> Result<PowerProfile> {
    let profile = tool.sweep(interval, samples)?;
    if profile.is_empty() {
        return Err(MonitorError::EmptyProfile { start: interval.start, end: interval.end });
    }
    Ok(profile)
}

/// Reference profiles for one cycle, indexed like the interval list
#[derive(Debug, Clone, Default)]
pub struct Baseline {
    profiles: Vec<Option<PowerProfile>>,
}

impl Baseline {
    /// Tune every interval. Intervals whose sweep fails stay disabled
    /// until the next cycle.
    pub fn build<S: SweepTool + ?Sized>(tool: &S, intervals: &[Interval], samples: u32) -> Self {
        let profiles = intervals.iter()
            .map(|interval| match measure(tool, interval, samples) {
                Ok(profile) => {
                    tracing::debug!("Baseline for {}: {} bins", interval, profile.len());
                    Some(profile)
                }
                Err(e @ MonitorError::EmptyProfile { .. }) => {
                    tracing::error!("Interval {} disabled, check its width: {}", interval, e);
                    None
                }
                Err(e) => {
                    tracing::error!("Interval {} disabled for this cycle: {}", interval, e);
                    None
                }
            })
            .collect();

        Self { profiles }
    }

    pub fn get(&self, index: usize) -> Option<&PowerProfile> {
        self.profiles.get(index).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Number of intervals with a usable baseline
    pub fn active(&self) -> usize {
        self.profiles.iter().filter(|p| p.is_some()).count()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rfwatch_hal::HalError;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// Replays queued sweep results and records requested sample counts.
    /// Clones share the same script.
    #[derive(Clone, Default)]
    pub(crate) struct ScriptedSweep {
        pub results: Rc<RefCell<VecDeque<std::result::Result<PowerProfile, HalError>>>>,
        pub calls: Rc<RefCell<Vec<(Interval, u32)>>>,
    }

    impl ScriptedSweep {
        pub fn new(results: Vec<std::result::Result<PowerProfile, HalError>>) -> Self {
            Self {
                results: Rc::new(RefCell::new(results.into())),
                calls: Rc::default(),
            }
        }
    }

    impl SweepTool for ScriptedSweep {
        fn sweep(&self, interval: &Interval, samples: u32) -> std::result::Result<PowerProfile, HalError> {
            self.calls.borrow_mut().push((*interval, samples));
            self.results.borrow_mut().pop_front()
                .unwrap_or_else(|| Err(HalError::CommandFailed("script exhausted".to_string())))
        }
    }

    pub(crate) fn profile(bins: &[(u64, f64)]) -> PowerProfile {
        bins.iter().copied().collect()
    }

    pub(crate) fn failure() -> HalError {
        HalError::SweepFailure { attempts: 3, reason: "exit status 1".to_string() }
    }

    #[test]
    fn baseline_uses_tune_sample_count_per_interval() {
        let intervals = vec![Interval::from_mhz(88, 108, 500_000), Interval::from_mhz(400, 450, 500_000)];
        let tool = ScriptedSweep::new(vec![
            Ok(profile(&[(88_250_000, -80.0)])),
            Ok(profile(&[(400_250_000, -75.0)])),
        ]);

        let baseline = Baseline::build(&tool, &intervals, 200);
        assert_eq!(baseline.len(), 2);
        assert_eq!(baseline.active(), 2);
        assert_eq!(baseline.get(1).unwrap().get(400_250_000), Some(-75.0));

        let calls = tool.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert!(calls.iter().all(|&(_, samples)| samples == 200));
    }

    #[test]
    fn failed_or_empty_sweeps_disable_only_their_interval() {
        let intervals = vec![
            Interval::from_mhz(88, 108, 500_000),
            Interval::from_mhz(400, 450, 500_000),
            Interval::from_mhz(860, 870, 500_000),
        ];
        let tool = ScriptedSweep::new(vec![
            Err(failure()),
            Ok(PowerProfile::new()),
            Ok(profile(&[(860_250_000, -90.0)])),
        ]);

        let baseline = Baseline::build(&tool, &intervals, 200);
        assert!(baseline.get(0).is_none());
        assert!(baseline.get(1).is_none());
        assert!(baseline.get(2).is_some());
        assert_eq!(baseline.active(), 1);
    }

    #[test]
    fn empty_profile_is_reported_as_fault() {
        let tool = ScriptedSweep::new(vec![Ok(PowerProfile::new())]);
        let interval = Interval::from_mhz(100, 101, 2_000_000);
        assert!(matches!(
            measure(&tool, &interval, 20),
            Err(MonitorError::EmptyProfile { start: 100_000_000, end: 101_000_000 })
        ));
    }

    #[test]
    fn sweep_failure_is_propagated() {
        let tool = ScriptedSweep::new(vec![Err(failure())]);
        let result = measure(&tool, &Interval::from_mhz(100, 110, 500_000), 20);
        assert!(matches!(result, Err(MonitorError::Hal(HalError::SweepFailure { .. }))));
    }
}
