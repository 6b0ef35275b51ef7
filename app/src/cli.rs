//! rfwatch CLI Tool
//!
//! Command-line interface for inspecting the scan grid and recorded detections.

use anyhow::Result;
use clap::{Parser, Subcommand};
use rfwatch_monitor::chart::{ChartRenderer, SvgChartRenderer};
use rfwatch_monitor::ignore::{IgnoreList, IgnoredRange};
use rfwatch_monitor::recording::{EventRecorder, TIMELINE_FILE};
use rfwatch_monitor::DetectionEvent;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod config;

use config::{AppConfig, EXAMPLE_CONFIG};

#[derive(Parser)]
#[command(name = "rfwatch-cli")]
#[command(author = "rfwatch Team")]
#[command(version = "0.1.0")]
#[command(about = "rfwatch Spectrum Monitor CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Graphs directory
    #[arg(short, long, default_value = "./graphs")]
    graphs_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the intervals a configuration sweeps
    Intervals {
        /// Configuration file
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show recorded detections
    Events {
        /// Day directory (yy_mm_dd), latest by default
        #[arg(short, long)]
        date: Option<String>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Render the detection timeline
    Timeline {
        /// Day directory (yy_mm_dd), latest by default
        #[arg(short, long)]
        date: Option<String>,

        /// Configuration whose ignore list colors the events
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep re-rendering every N seconds
        #[arg(short, long, value_name = "SECONDS", num_args = 0..=1, default_missing_value = "5")]
        watch: Option<u64>,
    },

    /// Generate sample configuration
    Config {
        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Intervals { config } => {
            show_intervals(&config)?;
        }

        Commands::Events { date, format } => {
            show_events(&cli.graphs_dir, date, &format)?;
        }

        Commands::Timeline { date, config, output, watch: None } => {
            render_timeline(&cli.graphs_dir, date, config, output)?;
        }

        Commands::Timeline { date, config, output, watch: Some(every) } => {
            watch_timeline(&cli.graphs_dir, date, config, output, Duration::from_secs(every.max(1)))?;
        }

        Commands::Config { output } => {
            generate_config(output)?;
        }
    }

    Ok(())
}

fn show_intervals(config_path: &Path) -> Result<()> {
    let config = AppConfig::load_from(config_path)?;
    let intervals = config.intervals();

    if intervals.is_empty() {
        println!("Every included range is fully excluded.");
        return Ok(());
    }

    println!("╭───────────────────────────────────────────────────────────────╮");
    println!("│                         Scan Grid                             │");
    println!("├──────┬──────────────┬──────────────┬──────────────┬───────────┤");
    println!("│ #    │ Start (MHz)  │ End (MHz)    │ Width (Hz)   │ Bins      │");
    println!("├──────┼──────────────┼──────────────┼──────────────┼───────────┤");

    for (index, interval) in intervals.iter().enumerate() {
        println!("│ {:<4} │ {:>12} │ {:>12} │ {:>12} │ {:>9} │",
            index,
            interval.start_mhz(),
            interval.end_mhz(),
            interval.width,
            interval.span() / interval.width);
    }

    println!("╰──────┴──────────────┴──────────────┴──────────────┴───────────╯");
    println!("\nTotal intervals: {}", intervals.len());

    Ok(())
}

/// Requested day, or the most recent one on disk
fn resolve_day(recorder: &EventRecorder, date: Option<String>) -> Result<String> {
    match date {
        Some(day) => Ok(day),
        None => recorder.list_days()?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No event logs found in {:?}", recorder.base_path())),
    }
}

fn show_events(graphs_dir: &Path, date: Option<String>, format: &str) -> Result<()> {
    let recorder = EventRecorder::new(graphs_dir)?;
    let day = resolve_day(&recorder, date)?;
    let events = recorder.load_events(&day)?;

    if events.is_empty() {
        println!("No events recorded on {}.", day);
        return Ok(());
    }

    match format {
        "json" => {
            let json = serde_json::to_string_pretty(&events)?;
            println!("{}", json);
        }
        _ => {
            println!("╭──────────────────────────────────────────────────────────────╮");
            println!("│                      Detections {:8}                     │", day);
            println!("├────────────┬──────────────┬──────────────────────┬───────────┤");
            println!("│ Time       │ Timestamp    │ Frequency (MHz)      │ Ignored   │");
            println!("├────────────┼──────────────┼──────────────────────┼───────────┤");

            for event in &events {
                println!("│ {:10} │ {:>12} │ {:>20.6} │ {:>9} │",
                    event.local_time,
                    event.timestamp,
                    event.frequency as f64 / 1e6,
                    if event.ignored { "yes" } else { "no" });
            }

            println!("╰────────────┴──────────────┴──────────────────────┴───────────╯");
            let ignored = events.iter().filter(|e| e.ignored).count();
            println!("\nTotal events: {} ({} ignored)", events.len(), ignored);
        }
    }

    Ok(())
}

/// Ignore list built from the recorded flags, one point range per ignored event
fn recorded_ignores(events: &[DetectionEvent]) -> IgnoreList {
    IgnoreList::new(events.iter()
        .filter(|e| e.ignored)
        .map(|e| IgnoredRange { start: e.frequency as f64, end: e.frequency as f64 })
        .collect())
}

fn render_timeline(graphs_dir: &Path, date: Option<String>, config: Option<PathBuf>,
                   output: Option<PathBuf>) -> Result<()> {
    let recorder = EventRecorder::new(graphs_dir)?;
    let day = resolve_day(&recorder, date)?;
    let events = recorder.load_events(&day)?;

    let ignores = match config {
        Some(path) => {
            let config = AppConfig::load_from(&path)?;
            IgnoreList::from_specs(&config.ignored_frequencies)?
        }
        None => recorded_ignores(&events),
    };

    let output = output.unwrap_or_else(|| graphs_dir.join(&day).join(TIMELINE_FILE));
    SvgChartRenderer::default().render_timeline(&output, &events, &ignores)?;
    println!("Timeline of {} events written to: {:?}", events.len(), output);

    Ok(())
}

/// Re-render until the process is killed. Failed renders are reported and retried.
fn watch_timeline(graphs_dir: &Path, date: Option<String>, config: Option<PathBuf>,
                  output: Option<PathBuf>, every: Duration) -> Result<()> {
    println!("Rendering the timeline every {}s, Ctrl+C to stop", every.as_secs());

    loop {
        if let Err(e) = render_timeline(graphs_dir, date.clone(), config.clone(), output.clone()) {
            eprintln!("Timeline not rendered: {}", e);
        }
        std::thread::sleep(every);
    }
}

fn generate_config(output: Option<PathBuf>) -> Result<()> {
    if let Some(path) = output {
        std::fs::write(&path, EXAMPLE_CONFIG)?;
        println!("Configuration written to: {:?}", path);
    } else {
        println!("{}", EXAMPLE_CONFIG);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn event(second: u32, frequency: u64, ignored: bool) -> DetectionEvent {
        DetectionEvent::at(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, second).unwrap(), frequency, ignored)
    }

    #[test]
    fn recorded_flags_become_point_ranges() {
        let events = vec![event(0, 100_000_000, false), event(1, 433_920_000, true)];
        let ignores = recorded_ignores(&events);
        assert_eq!(ignores.len(), 1);
        assert!(ignores.is_ignored(433_920_000));
        assert!(!ignores.is_ignored(100_000_000));
    }

    #[test]
    fn latest_day_is_used_by_default() {
        let dir = TempDir::new().unwrap();
        let mut recorder = EventRecorder::new(dir.path()).unwrap();
        recorder.start_cycle(&Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()).unwrap();
        recorder.start_cycle(&Utc.with_ymd_and_hms(2024, 3, 2, 10, 0, 0).unwrap()).unwrap();

        assert_eq!(resolve_day(&recorder, None).unwrap(), "24_03_02");
        assert_eq!(resolve_day(&recorder, Some("24_03_01".to_string())).unwrap(), "24_03_01");
    }

    #[test]
    fn timeline_is_written_next_to_the_event_log() {
        let dir = TempDir::new().unwrap();
        let mut recorder = EventRecorder::new(dir.path()).unwrap();
        recorder.start_cycle(&Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()).unwrap();
        recorder.record_event(&event(1, 100_000_000, false)).unwrap();
        recorder.record_event(&event(2, 433_920_000, true)).unwrap();

        render_timeline(dir.path(), None, None, None).unwrap();
        assert!(dir.path().join("24_03_01").join(TIMELINE_FILE).is_file());
    }

    #[test]
    fn watch_flag_defaults_to_five_seconds() {
        let parse = |args: &[&str]| match Cli::try_parse_from(args).unwrap().command {
            Commands::Timeline { watch, .. } => watch,
            _ => panic!("expected timeline"),
        };

        assert_eq!(parse(&["rfwatch-cli", "timeline"]), None);
        assert_eq!(parse(&["rfwatch-cli", "timeline", "--watch"]), Some(5));
        assert_eq!(parse(&["rfwatch-cli", "timeline", "--watch", "30"]), Some(30));
    }

    #[test]
    fn missing_event_logs_are_reported() {
        let dir = TempDir::new().unwrap();
        assert!(show_events(dir.path(), None, "table").is_err());
    }
}
