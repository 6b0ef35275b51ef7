//! Chart rendering
//!
//! SVG charts of interval profiles and of the detection timeline.

use crate::ignore::IgnoreList;
use crate::{DetectionEvent, MonitorError, Result};
use chrono::{Local, TimeZone};
use plotters::prelude::*;
use rfwatch_hal::{Interval, PowerProfile, HZ_PER_MHZ};
use std::path::Path;

const GREY: RGBColor = RGBColor(128, 128, 128);
const TUNED: RGBColor = RGBColor(31, 119, 180);
const MONITORED: RGBColor = RGBColor(255, 127, 14);
const RETUNE_BAND_HZ: f64 = 500_000.0;
const MIN_DB: f64 = -100.0;
const MAX_DB: f64 = 0.0;

/// Data for one interval chart
pub struct IntervalChart<'a> {
    pub interval: &'a Interval,
    pub baseline: &'a PowerProfile,
    /// Integrated monitoring profile; absent for baseline-only charts
    pub current: Option<&'a PowerProfile>,
    /// Frequency that triggered the chart
    pub selected: Option<u64>,
    pub ignores: &'a IgnoreList,
}

/// Turns profiles and events into image files
pub trait ChartRenderer {
    fn render_interval(&self, path: &Path, chart: &IntervalChart<'_>) -> Result<()>;

    fn render_timeline(&self, path: &Path, events: &[DetectionEvent], ignores: &IgnoreList) -> Result<()>;
}

fn chart_err<E: std::fmt::Display>(e: E) -> MonitorError {
    MonitorError::Chart(e.to_string())
}

fn mhz(frequency: f64) -> f64 {
    frequency / HZ_PER_MHZ as f64
}

/// Pad a range that would otherwise be empty or degenerate
fn padded(min: f64, max: f64, fraction: f64) -> (f64, f64) {
    if max - min < f64::EPSILON {
        return (min - 1.0, max + 1.0);
    }
    let margin = (max - min) * fraction;
    (min - margin, max + margin)
}

/// `plotters` SVG renderer
#[derive(Debug, Clone)]
pub struct SvgChartRenderer {
    pub size: (u32, u32),
}

impl Default for SvgChartRenderer {
    fn default() -> Self {
        Self { size: (1280, 720) }
    }
}

impl ChartRenderer for SvgChartRenderer {
    fn render_interval(&self, path: &Path, chart: &IntervalChart<'_>) -> Result<()> {
        let interval = chart.interval;
        let (x_min, x_max) = (interval.start as f64, interval.end as f64);

        let root = SVGBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut builder = ChartBuilder::on(&root);
        builder
            .margin(15)
            .x_label_area_size(35)
            .y_label_area_size(45);
        if let Some(frequency) = chart.selected {
            builder.caption(format!("Frequency {:.3} MHz", mhz(frequency as f64)), ("sans-serif", 20));
        }

        let mut plot = builder
            .build_cartesian_2d(mhz(x_min)..mhz(x_max), MIN_DB..MAX_DB)
            .map_err(chart_err)?;

        plot.configure_mesh()
            .x_desc("MHz")
            .y_desc("dB")
            .light_line_style(&GREY.mix(0.15))
            .draw()
            .map_err(chart_err)?;

        for range in chart.ignores.ranges() {
            let start = range.start.max(x_min);
            let end = range.end.min(x_max);
            if start > end {
                continue;
            }
            plot.draw_series(std::iter::once(Rectangle::new(
                [(mhz(start), MIN_DB), (mhz(end), MAX_DB)],
                GREY.mix(0.33).filled(),
            ))).map_err(chart_err)?;
        }

        if let Some(frequency) = chart.selected {
            let f = frequency as f64;
            plot.draw_series(std::iter::once(Rectangle::new(
                [(mhz((f - RETUNE_BAND_HZ).max(x_min)), MIN_DB), (mhz((f + RETUNE_BAND_HZ).min(x_max)), MAX_DB)],
                GREEN.mix(0.2).filled(),
            ))).map_err(chart_err)?;
            plot.draw_series(LineSeries::new(
                vec![(mhz(f), MIN_DB), (mhz(f), MAX_DB)],
                BLACK.stroke_width(1),
            )).map_err(chart_err)?;
        }

        let points = |profile: &PowerProfile| -> Vec<(f64, f64)> {
            profile.iter()
                .map(|(f, p)| (mhz(f as f64), p.clamp(MIN_DB, MAX_DB)))
                .collect()
        };

        plot.draw_series(LineSeries::new(points(chart.baseline), TUNED.stroke_width(1)))
            .map_err(chart_err)?
            .label("Tuned signal")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &TUNED));

        if let Some(current) = chart.current {
            plot.draw_series(LineSeries::new(points(current), MONITORED.stroke_width(1)))
                .map_err(chart_err)?
                .label("Monitored signal")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &MONITORED));
        }

        plot.configure_series_labels()
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(chart_err)?;

        root.present().map_err(chart_err)?;
        tracing::info!("Generated file {}", path.display());
        Ok(())
    }

    fn render_timeline(&self, path: &Path, events: &[DetectionEvent], ignores: &IgnoreList) -> Result<()> {
        if events.is_empty() {
            return Err(MonitorError::Chart("No events to plot".to_string()));
        }

        let (f_min, f_max) = events.iter()
            .map(|e| mhz(e.frequency as f64))
            .fold((f64::MAX, f64::MIN), |(lo, hi), f| (lo.min(f), hi.max(f)));
        let (t_min, t_max) = events.iter()
            .map(|e| timeline_y(e.timestamp))
            .fold((f64::MAX, f64::MIN), |(lo, hi), t| (lo.min(t), hi.max(t)));

        let (x_lo, x_hi) = padded(f_min, f_max, 0.025);
        let (y_lo, y_hi) = padded(t_min, t_max, 0.025);

        let root = SVGBackend::new(path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;

        let mut plot = ChartBuilder::on(&root)
            .margin(15)
            .x_label_area_size(35)
            .y_label_area_size(70)
            .build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)
            .map_err(chart_err)?;

        plot.configure_mesh()
            .x_desc("MHz")
            .y_label_formatter(&|y| {
                Local.timestamp_opt(-*y as i64, 0)
                    .single()
                    .map(|dt| dt.format("%H:%M:%S").to_string())
                    .unwrap_or_default()
            })
            .light_line_style(&GREY.mix(0.15))
            .draw()
            .map_err(chart_err)?;

        for frequency in distinct_frequencies(events) {
            let x = mhz(frequency as f64);
            plot.draw_series(dashes(y_lo, y_hi).map(|(a, b)| {
                PathElement::new(vec![(x, a), (x, b)], GREY.mix(0.5).stroke_width(1))
            })).map_err(chart_err)?;
        }

        // ignore flags are re-evaluated against the current list
        plot.draw_series(events.iter().map(|e| {
            let color = if ignores.is_ignored(e.frequency) { GREY } else { RED };
            Circle::new((mhz(e.frequency as f64), timeline_y(e.timestamp)), 3, color.filled())
        })).map_err(chart_err)?;

        root.present().map_err(chart_err)?;
        tracing::info!("Generated file {}", path.display());
        Ok(())
    }
}

/// Timeline y coordinate; negated so the newest events sit at the bottom
fn timeline_y(timestamp: i64) -> f64 {
    -(timestamp as f64)
}

/// Each detected frequency once, ascending
fn distinct_frequencies(events: &[DetectionEvent]) -> Vec<u64> {
    let mut frequencies: Vec<u64> = events.iter().map(|e| e.frequency).collect();
    frequencies.sort_unstable();
    frequencies.dedup();
    frequencies
}

/// Dash segments covering `lo..hi`
fn dashes(lo: f64, hi: f64) -> impl Iterator<Item = (f64, f64)> {
    const SEGMENTS: usize = 40;
    let step = (hi - lo) / SEGMENTS as f64;
    (0..SEGMENTS).step_by(2).map(move |i| (lo + step * i as f64, lo + step * (i + 1) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore::IgnoredRange;
    use tempfile::TempDir;

    fn profile(bins: &[(u64, f64)]) -> PowerProfile {
        bins.iter().copied().collect()
    }

    #[test]
    fn interval_chart_is_written_as_svg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chart.svg");
        let interval = Interval::from_mhz(100, 102, 500_000);
        let baseline = profile(&[(100_250_000, -80.0), (100_750_000, -78.0), (101_250_000, -82.0)]);
        let current = profile(&[(100_250_000, -79.0), (100_750_000, -50.0), (101_250_000, -81.0)]);
        let ignores = IgnoreList::new(vec![IgnoredRange { start: 101_000_000.0, end: 101_500_000.0 }]);

        SvgChartRenderer::default().render_interval(&path, &IntervalChart {
            interval: &interval,
            baseline: &baseline,
            current: Some(&current),
            selected: Some(100_750_000),
            ignores: &ignores,
        }).unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Frequency 100.750 MHz"));
    }

    #[test]
    fn timeline_handles_a_single_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("timeline.svg");
        let events = vec![DetectionEvent {
            timestamp: 1_709_301_909,
            local_time: "14:05:09".to_string(),
            frequency: 433_920_000,
            ignored: false,
        }];

        SvgChartRenderer::default().render_timeline(&path, &events, &IgnoreList::default()).unwrap();
        assert!(std::fs::read_to_string(&path).unwrap().contains("<svg"));
    }

    #[test]
    fn timeline_puts_newest_events_lowest() {
        assert!(timeline_y(1_709_301_910) < timeline_y(1_709_301_909));
    }

    #[test]
    fn timeline_guides_one_per_frequency() {
        let event = |timestamp, frequency| DetectionEvent {
            timestamp,
            local_time: String::new(),
            frequency,
            ignored: false,
        };
        let events = vec![event(3, 433_920_000), event(1, 100_000_000), event(2, 433_920_000)];
        assert_eq!(distinct_frequencies(&events), vec![100_000_000, 433_920_000]);

        let segments: Vec<_> = dashes(0.0, 40.0).collect();
        assert_eq!(segments.len(), 20);
        assert_eq!(segments[0], (0.0, 1.0));
        assert_eq!(segments[1], (2.0, 3.0));
    }

    #[test]
    fn empty_timeline_is_an_error() {
        let dir = TempDir::new().unwrap();
        let result = SvgChartRenderer::default()
            .render_timeline(&dir.path().join("t.svg"), &[], &IgnoreList::default());
        assert!(matches!(result, Err(MonitorError::Chart(_))));
    }
}
