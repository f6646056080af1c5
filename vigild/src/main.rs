//! Vigil - host health monitoring daemon.
//!
//! Samples CPU, memory, storage and battery, reduces each stream to a health
//! state through a rule chain, and writes readings, transitions, injected
//! faults and rule violations to a JSONL event log. A fault profile can
//! inject sensor misbehaviour on a timeline to exercise detection and
//! recovery.

#![forbid(unsafe_code)]

mod config;
mod event_log;
mod fault_profile;
mod monitor;
mod schedule;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use config::{DaemonConfig, EnvParser};
use event_log::EventLog;
use fault_profile::FaultProfile;
use monitor::{Monitor, build_engine, host_sensors};
use schedule::FaultSchedule;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use vigil_common::{LogConfig, init_logging};

#[derive(Parser)]
#[command(name = "vigild")]
#[command(author, version, about = "Vigil daemon - host health monitoring with fault injection")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the host until interrupted
    Run(RunArgs),

    /// Validate a fault profile and list its entries
    CheckProfile {
        /// Path to the fault profile (JSON)
        path: PathBuf,
    },

    /// Read every sensor once and print the readings
    Sample {
        /// Output format (json or pretty)
        #[arg(long, default_value = "json")]
        format: OutputFormat,

        /// Window for the CPU busy fraction, in milliseconds
        #[arg(long, default_value_t = 200)]
        sample_ms: u64,
    },
}

#[derive(Args)]
struct RunArgs {
    /// Configuration file (TOML)
    #[arg(short, long, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Fault profile to replay (JSON)
    #[arg(short, long, env = "VIGIL_FAULT_PROFILE")]
    fault: Option<PathBuf>,

    /// Event log path (JSONL, appended)
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Usage fraction above which a sensor is degraded
    #[arg(long)]
    threshold: Option<f64>,

    /// Main loop period, e.g. 500ms
    #[arg(long, value_parser = humantime::parse_duration)]
    tick: Option<Duration>,

    /// Do not mirror events to stdout
    #[arg(long)]
    quiet: bool,
}

#[derive(ValueEnum, Clone, Copy)]
enum OutputFormat {
    Json,
    Pretty,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env("info").with_stderr();
    if cli.verbose {
        log_config = log_config.with_level("debug");
    }
    let _logging_guards = init_logging(&log_config)?;

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::CheckProfile { path } => check_profile(&path),
        Commands::Sample { format, sample_ms } => sample(format, sample_ms).await,
    }
}

fn resolve_config(args: &RunArgs) -> Result<DaemonConfig> {
    let mut config =
        DaemonConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    config.apply_env(&mut EnvParser::new())?;

    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(tick) = args.tick {
        config.tick = tick;
    }
    if let Some(log) = &args.log {
        config.event_log = log.clone();
    }
    if args.quiet {
        config.stdout_events = false;
    }

    config.validate()?;
    Ok(config)
}

async fn run(args: RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;

    let profile = match &args.fault {
        Some(path) => FaultProfile::load(path)
            .with_context(|| format!("failed to load fault profile {}", path.display()))?,
        None => FaultProfile::default(),
    };

    let mut events = EventLog::new()
        .with_file(&config.event_log)
        .with_context(|| format!("failed to open event log {}", config.event_log.display()))?;
    if config.stdout_events {
        events = events.with_stdout();
    }

    info!(
        tick_ms = config.tick.as_millis() as u64,
        threshold = config.threshold,
        event_log = %config.event_log.display(),
        faults = profile.len(),
        "Starting Vigil daemon"
    );

    let mut monitor = Monitor::new(
        host_sensors(&config),
        build_engine(&config),
        FaultSchedule::new(profile.entries),
        events,
    );

    let started = Instant::now();
    let mut ticker = tokio::time::interval(config.tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => {
                let now = Instant::now();
                monitor.cycle(now, now.duration_since(started)).await;
            }
        }
    }

    let engine = monitor.engine();
    for (sensor, state) in engine.sensor_states() {
        info!(sensor, %state, "Final sensor state");
    }
    info!(
        aggregate = %engine.aggregate_state(),
        transitions = engine.recent_transitions().len(),
        "Vigil daemon stopped"
    );
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

fn check_profile(path: &std::path::Path) -> Result<()> {
    let profile = FaultProfile::load(path)
        .with_context(|| format!("invalid fault profile {}", path.display()))?;

    if profile.is_empty() {
        println!("{}: no faults", path.display());
        return Ok(());
    }

    println!("{}: {} fault(s)", path.display(), profile.len());
    for (idx, entry) in profile.entries.iter().enumerate() {
        let clears = match entry.duration {
            Some(d) => format!("clears after {}", humantime::format_duration(d)),
            None => "until shutdown".to_string(),
        };
        println!(
            "  #{idx} {:<10} {:<16} at +{} ({clears})",
            entry.sensor_id,
            entry.fault.kind().as_str(),
            humantime::format_duration(entry.trigger_after),
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct SampleRow<'a> {
    sensor: &'a str,
    value: f64,
    valid: bool,
}

async fn sample(format: OutputFormat, sample_ms: u64) -> Result<()> {
    let mut sensors = host_sensors(&DaemonConfig::default());

    // The first CPU read measures since boot; the second covers the window.
    sensors.read_all();
    tokio::time::sleep(Duration::from_millis(sample_ms)).await;
    let readings = sensors.read_all();

    let rows: Vec<SampleRow<'_>> = readings
        .iter()
        .map(|r| SampleRow {
            sensor: &r.sensor_id,
            value: r.value,
            valid: r.valid,
        })
        .collect();

    let output = match format {
        OutputFormat::Json => serde_json::to_string(&rows)?,
        OutputFormat::Pretty => serde_json::to_string_pretty(&rows)?,
    };
    println!("{output}");
    Ok(())
}
