//! rfwatch Spectrum Monitor
//!
//! Main application entry point for the rfwatch system.

use anyhow::Result;
use clap::Parser;
use rfwatch_hal::{HackRfSweep, KrakenRetuner};
use rfwatch_monitor::{
    chart::SvgChartRenderer,
    engine::MonitorEngine,
    ignore::ConfigFileIgnores,
    recording::EventRecorder,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

mod config;

use config::AppConfig;

#[derive(Parser)]
#[command(name = "rfwatch")]
#[command(author = "rfwatch Team")]
#[command(version = "0.1.0")]
#[command(about = "Radio spectrum anomaly monitor", long_about = None)]
struct Args {
    /// Configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Also append logs to this file
    #[arg(short, long)]
    log_file: Option<PathBuf>,
}

/// How long a forced shutdown waits for the sweep thread
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(args.log_file.as_deref())?;

    tracing::info!("╔══════════════════════════════════════════╗");
    tracing::info!("║        rfwatch Spectrum Monitor          ║");
    tracing::info!("║            Version 0.1.0                 ║");
    tracing::info!("╚══════════════════════════════════════════╝");

    // Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    tracing::info!("Configuration loaded from {:?}", config.config_path);

    print_system_status(&config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(supervise(config));
    shutdown_runtime(runtime);

    tracing::info!("rfwatch shutdown complete");
    result
}

/// Run the monitor until it fails or Ctrl+C is pressed
async fn supervise(config: AppConfig) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let monitor_stop = stop.clone();
    let mut monitor = tokio::task::spawn_blocking(move || run_monitor(config, &monitor_stop));

    tracing::info!("Press Ctrl+C to stop");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
            stop.store(true, Ordering::Relaxed);
        }
        result = &mut monitor => {
            return result?;
        }
    }

    tracing::info!("Shutting down after the current sweep (Ctrl+C again to force)...");

    tokio::select! {
        result = &mut monitor => result??,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Forced shutdown, abandoning the running sweep");
        }
    }

    Ok(())
}

/// Drop the runtime without waiting for a sweep still blocking its thread
fn shutdown_runtime(runtime: tokio::runtime::Runtime) {
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
}

/// Build the engine on the blocking thread and run it until `stop` is set
fn run_monitor(config: AppConfig, stop: &AtomicBool) -> Result<()> {
    let intervals = config.intervals();
    tracing::info!("Scan grid: {} intervals", intervals.len());
    for interval in &intervals {
        tracing::debug!("  {}", interval);
    }

    let recorder = EventRecorder::new(&config.graphs_dir_path)?;

    let mut engine = MonitorEngine::new(
        intervals,
        config.monitor_settings(),
        Box::new(HackRfSweep::new(config.sweep_config())),
        Box::new(ConfigFileIgnores::new(config.config_path.clone())),
        Box::new(SvgChartRenderer::default()),
        recorder,
    )?;

    if let Some(path) = config.retune_target() {
        tracing::info!("KrakenSDR retuning enabled via {}", path.display());
        engine = engine.with_retuner(Box::new(KrakenRetuner::new(path)));
    }

    tracing::info!("rfwatch is now monitoring the spectrum...");
    engine.run(stop)?;

    tracing::info!("Monitoring stopped: {} detections recorded", engine.recorder().event_count());
    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,rfwatch=debug,rfwatch_hal=debug,rfwatch_monitor=debug"));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false))
        .with(file_layer)
        .init();

    Ok(())
}

fn print_system_status(config: &AppConfig) {
    tracing::info!("╭──────────────── Configuration ───────────────╮");
    tracing::info!("│ Included ranges: {:>27} │", config.included_frequencies.len());
    tracing::info!("│ Ignored ranges: {:>28} │", config.ignored_frequencies.len());
    tracing::info!("│ Gains (LNA/VGA): {:>23} dB │", format!("{}/{}", config.lna_gain, config.vga_gain));
    tracing::info!("│ Samples (tune/monitor): {:>20} │",
        format!("{}/{}", config.tune_number_of_samples, config.monitor_number_of_samples));
    tracing::info!("│ Sensitivity: {:>27.1} dB │", config.sensitivity);
    tracing::info!("│ Integration: {:>31} │", config.integration);
    tracing::info!("│ Tuning period: {:>23} ticks │", config.tuning_period);
    tracing::info!("│ Ignored crossings: {:>25} │", format!("{:?}", config.ignored_crossing_policy));
    tracing::info!("│ Graphs: {:>36} │", config.graphs_dir_path.display().to_string());
    tracing::info!("╰──────────────────────────────────────────────╯");
}
