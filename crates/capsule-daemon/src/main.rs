//! capsuled - capsule service host.
//!
//! Opens the `SQLite` capsule store and runs the expiration sweeper until
//! SIGINT/SIGTERM. The transport/API layer embeds
//! `capsule_core::CapsuleService` over the same store; this process owns
//! persistence and the background expiry schedule.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use capsule_daemon::config::CapsuledConfig;
use capsule_daemon::store::SqliteCapsuleStore;
use capsule_daemon::sweeper::{Sweeper, SweeperConfig};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// capsuled - time-capsule store and expiration sweeper
#[derive(Parser, Debug)]
#[command(name = "capsuled")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the capsule database (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Sweep interval, e.g. "1h" or "30s" (overrides config)
    #[arg(long, value_parser = humantime::parse_duration)]
    sweep_interval: Option<Duration>,

    /// Log level filter (e.g. "info", "capsule_daemon=debug")
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append logs to this file instead of stdout
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    if let Some(log_file) = &args.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .context("failed to open log file")?;
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(file)
                    .with_ansi(false),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let mut config = match &args.config {
        Some(path) => CapsuledConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => CapsuledConfig::default(),
    };
    if let Some(db) = args.db {
        config.store.path = db;
    }
    if let Some(interval) = args.sweep_interval {
        config.sweeper.interval = interval;
    }

    info!(
        db = %config.store.path.display(),
        sweep_interval = ?config.sweeper.interval,
        retention = ?config.sweeper.retention,
        "starting capsuled"
    );

    let store = Arc::new(
        SqliteCapsuleStore::open(&config.store.path).with_context(|| {
            format!(
                "failed to open capsule store at {}",
                config.store.path.display()
            )
        })?,
    );

    let sweeper_config = SweeperConfig::from(config.sweeper);
    let sweeper =
        Sweeper::new(Arc::clone(&store), sweeper_config).context("invalid sweeper config")?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweeper_handle = sweeper.spawn(shutdown_rx);

    wait_for_shutdown_signal().await;

    info!("shutdown requested, stopping sweeper");
    let _ = shutdown_tx.send(true);
    if let Err(e) = sweeper_handle.await {
        warn!(error = %e, "sweeper task did not shut down cleanly");
    }

    info!("capsuled stopped");
    Ok(())
}

/// Blocks until SIGINT or SIGTERM arrives.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler, relying on ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c");
    }
}
