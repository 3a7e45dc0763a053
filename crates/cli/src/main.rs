//! `jobwatch` -- command-line client for the remote job service.
//!
//! Starts and stops generation/upload runs and streams their status log
//! to stdout until every tracked job is idle.  Diagnostics go to stderr
//! through `tracing`.
//!
//! # Environment variables
//!
//! | Variable                        | Default                  | Description                         |
//! |---------------------------------|--------------------------|-------------------------------------|
//! | `JOBWATCH_API_URL`              | `http://localhost:8000`  | Base URL of the job service         |
//! | `JOBWATCH_POLL_INTERVAL_MS`     | `2000`                   | Milliseconds between status polls   |
//! | `JOBWATCH_MAX_LOG_ENTRIES`      | `100`                    | Entries kept per job log            |
//! | `JOBWATCH_REQUEST_TIMEOUT_SECS` | `30`                     | Per-request HTTP timeout            |
//! | `JOBWATCH_SETTINGS_PATH`        | `jobwatch-settings.json` | Settings forwarded on `start`       |

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use jobwatch_core::{JobKind, SettingsStore};
use jobwatch_engine::{ControllerConfig, JobEvent, JobTracker};
use jobwatch_remote::{JobService, JobServiceApi};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::CliConfig;

#[derive(Debug, Parser)]
#[command(name = "jobwatch", version, about = "Start, stop and follow remote jobs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Follow any runs already in progress until they finish.
    Watch,
    /// Start a run and follow it (`generation` or `upload`).
    Start { kind: JobKind },
    /// Request that a running job stop and follow it until it does.
    Stop { kind: JobKind },
    /// Inspect or replace the settings sent with `start`.
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    Show,
    /// Replace the stored settings with a JSON document.
    Set { json: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobwatch=info,jobwatch_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = CliConfig::from_env()?;

    match cli.command {
        Command::Settings { action } => run_settings(&config, action),
        command => run_jobs(&config, command).await,
    }
}

fn run_settings(config: &CliConfig, action: SettingsAction) -> anyhow::Result<()> {
    let store = SettingsStore::new(&config.settings_path);

    match action {
        SettingsAction::Show => {
            let settings = store.load()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsAction::Set { json } => {
            let settings: serde_json::Value =
                serde_json::from_str(&json).context("Settings must be valid JSON")?;
            store.save(&settings)?;
            tracing::info!(path = %store.path().display(), "Settings saved");
        }
    }
    Ok(())
}

async fn run_jobs(config: &CliConfig, command: Command) -> anyhow::Result<()> {
    tracing::info!(
        api_url = %config.api_url,
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        "Connecting to job service",
    );

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to build HTTP client")?;
    let service: Arc<dyn JobService> = Arc::new(JobServiceApi::with_client(client, &config.api_url));
    let tracker = JobTracker::new(
        service,
        ControllerConfig {
            poll_interval: config.poll_interval,
            max_entries: config.max_log_entries,
        },
    );

    let printers: Vec<JoinHandle<()>> = tracker
        .controllers()
        .map(|controller| tokio::spawn(print_events(controller.subscribe())))
        .collect();

    tracker.attach_all().await;

    match command {
        Command::Start { kind } => {
            let settings = load_settings(config);
            if let Err(e) = tracker.controller(kind).start(&settings).await {
                tracing::warn!(job = %kind, error = %e, "Start request failed");
            }
        }
        Command::Stop { kind } => {
            if let Err(e) = tracker.controller(kind).stop().await {
                tracing::warn!(job = %kind, error = %e, "Stop request failed");
            }
        }
        Command::Watch | Command::Settings { .. } => {}
    }

    wait_until_idle(&tracker, config.poll_interval).await;
    tracker.shutdown().await;

    let mut summary = Vec::new();
    for controller in tracker.controllers() {
        summary.push((controller.kind(), controller.snapshot().await));
    }

    // Dropping the tracker closes the event channels; each printer exits
    // once it has written everything still buffered.
    drop(tracker);
    for printer in printers {
        if let Err(e) = printer.await {
            tracing::warn!(error = %e, "Event printer failed");
        }
    }

    for (kind, snapshot) in summary {
        println!(
            "{}: {} ({})",
            kind, snapshot.current_message, snapshot.current_level
        );
    }
    Ok(())
}

/// Settings are best effort on start: an unreadable file falls back to
/// an empty object so the run can still be launched.
fn load_settings(config: &CliConfig) -> serde_json::Value {
    let store = SettingsStore::new(&config.settings_path);
    match store.load() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load settings, starting with defaults");
            serde_json::json!({})
        }
    }
}

async fn wait_until_idle(tracker: &JobTracker, check_every: Duration) {
    let mut ticker = tokio::time::interval(check_every);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, detaching from jobs");
                break;
            }
            _ = ticker.tick() => {
                if !tracker.any_active().await {
                    break;
                }
            }
        }
    }
}

async fn print_events(mut rx: tokio::sync::broadcast::Receiver<JobEvent>) {
    loop {
        match rx.recv().await {
            Ok(JobEvent::LogAppended { job, entry }) => {
                println!(
                    "{} [{}] {:<8} {}",
                    entry.timestamp.format("%H:%M:%S%.3f"),
                    job,
                    entry.severity.as_str(),
                    entry.message
                );
            }
            Ok(JobEvent::Finished { job, with_errors }) => {
                tracing::debug!(job = %job, with_errors, "Job finished");
            }
            Ok(JobEvent::RunningChanged { .. }) => {}
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event stream lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
