//! Stepwatch Harness
//!
//! Drives an in-process target through the event request protocol and
//! reports which scenarios verified.

mod config;
mod scenarios;
mod shutdown;

use clap::Parser;
use config::ConfigLoader;
use scenarios::ScenarioSelection;
use shutdown::spawn_cancel_on_signal;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use stepwatch_core::verifier::TestLog;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Stepwatch - event request, filter and correlation harness
#[derive(Parser, Debug)]
#[command(name = "stepwatch-harness")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file. Built-in defaults apply when omitted.
    #[arg(short, long, env = "STEPWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the wait timeout, in seconds
    #[arg(short, long)]
    wait_time: Option<u64>,

    /// Scenario to run
    #[arg(short, long, value_enum, default_value_t = ScenarioSelection::All)]
    scenario: ScenarioSelection,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting stepwatch-harness v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = ConfigLoader::new(
        args.config.as_ref(),
        args.wait_time.map(Duration::from_secs),
    );
    let settings = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    match config_loader.config_path() {
        Some(path) => tracing::info!("Configuration loaded from {:?}", path),
        None => tracing::info!("No configuration file given, using defaults"),
    }

    // Ctrl-C resolves any pending wait as cancelled
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let signal_done = spawn_cancel_on_signal(cancel_tx);

    let mut log = TestLog::new();
    let mut targets_clean = true;

    for &scenario in args.scenario.scenarios() {
        if *cancel_rx.borrow() {
            tracing::warn!(%scenario, "Run cancelled, skipping scenario");
            log.fail(scenario.name(), "cancelled before start");
            continue;
        }

        tracing::info!(%scenario, "Running scenario");
        match scenario.run(&settings, cancel_rx.clone(), &mut log).await {
            Ok(report) if report.success => {}
            Ok(report) => {
                tracing::error!(
                    %scenario,
                    workers_joined = report.workers_joined,
                    "A target worker failed to join cleanly"
                );
                targets_clean = false;
            }
            Err(e) => {
                tracing::error!(%scenario, "Scenario aborted: {}", e);
                log.fail(scenario.name(), e.to_string());
            }
        }
    }

    signal_done.notify_one();

    println!("{}", log.to_json()?);

    if log.passed() && targets_clean {
        tracing::info!("All scenarios passed");
        Ok(ExitCode::SUCCESS)
    } else {
        let failures = log.failures().count();
        tracing::error!(failures, targets_clean, "Run failed");
        Ok(ExitCode::FAILURE)
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
///
/// Logs go to stderr; stdout carries only the JSON summary.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
