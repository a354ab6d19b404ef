//! # Bagwatch
//!
//! Live telemetry viewer for blood bag cold-chain monitoring.
//!
//! This application polls the monitoring backend, keeps the selected bag's
//! detail and history current, and logs the canonical QR payload for it.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use bagwatch::config::{Config, LoggingConfig};
use bagwatch::payload::PayloadEncoder;
use bagwatch::source::HttpSource;
use bagwatch::sync::{PollingController, SyncStore, TokioScheduler};
use bagwatch::view::{Detail, DashboardView, QrPayload};

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// File name prefix for daily log files
const LOG_FILE_PREFIX: &str = "bagwatch.log";

/// Main entry point for Bagwatch
///
/// # Usage
///
/// ```bash
/// bagwatch [CONFIG_PATH] [BAG_ID]
/// ```
///
/// `BAG_ID` selects a bag up front; otherwise the first bag of the first
/// snapshot is selected. While running, each line typed on stdin selects
/// the bag with that id. Ctrl+C stops polling and exits.
///
/// # Errors
///
/// Returns error if:
/// - The configuration file exists but is invalid
/// - The backend base URL cannot be parsed
/// - The polling task panicked
#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let initial_selection = args.next();

    let (config, from_file) = load_config(&config_path)?;
    let _log_guard = init_tracing(&config.logging)?;

    info!("Bagwatch v{} starting...", env!("CARGO_PKG_VERSION"));
    if from_file {
        info!("Loaded configuration from {}", config_path);
    } else {
        warn!("No configuration at {}, using defaults", config_path);
    }

    let source = HttpSource::from_config(&config.backend)?;
    info!("Polling backend at {}", config.backend.base_url);

    let mut store = SyncStore::with_encoder(PayloadEncoder::new(config.payload.max_bytes));
    if let Some(id) = initial_selection {
        store.set_selection(id);
    }

    let poller = PollingController::new(source, &config.polling).start(&TokioScheduler, store);
    let mut updates = poller.subscribe();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    info!("Type a bag id and press Enter to select it");
    info!("Press Ctrl+C to exit");

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    error!("Polling task ended unexpectedly");
                    break;
                }
                let store = Arc::clone(&updates.borrow_and_update());
                report(&DashboardView::from_store(&store));
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        let id = line.trim();
                        if !id.is_empty() {
                            poller.set_selection(id);
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        stdin_open = false;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    let store = poller.stop().await?;
    let units = store.current_snapshot().map_or(0, |s| s.len());
    info!("Bagwatch stopped ({} units in last snapshot)", units);

    Ok(())
}

/// Load configuration from `path`, falling back to defaults if the file
/// does not exist.
///
/// Returns the configuration and whether it came from the file.
fn load_config(path: &str) -> Result<(Config, bool)> {
    if !Path::new(path).exists() {
        return Ok((Config::default(), false));
    }
    let config = Config::load(path).with_context(|| format!("Invalid configuration in {}", path))?;
    Ok((config, true))
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. With a log
/// directory configured, output goes to a daily rolling file instead of
/// stdout; the returned guard must be held until exit.
fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(format!("{},reqwest=warn,hyper=warn", config.level))
    };

    if config.log_dir.is_empty() {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
        return Ok(None);
    }

    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Cannot create log directory {}", config.log_dir))?;
    let appender = tracing_appender::rolling::daily(&config.log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .init();

    Ok(Some(guard))
}

/// Log a one-screen summary of the dashboard
fn report(view: &DashboardView) {
    let server_time = view
        .server_time
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());
    info!(
        "{} units, sampled every {}s, server time {}",
        view.unit_count, view.sample_interval_s, server_time
    );

    match &view.detail {
        Detail::NoData => info!("No data yet"),
        Detail::Unselected => info!("No bag selected"),
        Detail::NotFound(id) => warn!("Selected bag {} is not in the latest snapshot", id),
        Detail::Found(detail) => {
            let unit = &detail.unit;
            info!(
                "{} [{}] health {}, {} history points, {} charts",
                unit.id,
                unit.status_class().as_str(),
                unit.predicted_health_index
                    .map(|h| format!("{:.4}", h))
                    .unwrap_or_else(|| "-".to_string()),
                detail.history_points,
                detail.charts.len()
            );
            match &detail.qr {
                Some(QrPayload::Ready(payload)) => info!("QR payload: {}", payload),
                Some(QrPayload::TooLarge { len, limit }) => {
                    error!("QR payload too large: {} bytes, limit {}", len, limit)
                }
                None => {}
            }
        }
    }
}
