//! Listing Watch CLI
//!
//! Local execution entry point.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use listing_watch::{
    error::Result,
    models::Config,
    pipeline::{CycleRunner, Scheduler, StatusBoard, StopHandle},
    services::{DiscordNotifier, HttpFetcher},
    storage::LocalStorage,
};

/// Listing Watch - new-entry notifier for listing pages
#[derive(Parser, Debug)]
#[command(
    name = "listing-watch",
    version,
    about = "Watch listing pages and announce new entries to a webhook"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "listing-watch.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Serve the status endpoint while running (overrides `server.enabled`)
    #[arg(long)]
    serve: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check all sources now, then again on every interval until interrupted
    Run,

    /// Check all sources once and exit
    Once,

    /// Validate the configuration file
    Validate,

    /// Show stored snapshot info per source
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Load, override from the environment and validate. Any error is fatal.
fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load(path)?;
    config.apply_env()?;
    config.validate()?;
    Ok(config)
}

fn build_scheduler(config: &Config, storage: &LocalStorage) -> Result<Scheduler> {
    let fetcher = Arc::new(HttpFetcher::new(&config.http)?);
    let notifier = Arc::new(DiscordNotifier::new(&config.notify)?);
    let runner = CycleRunner::new(fetcher, notifier, Arc::new(storage.clone()));
    Scheduler::new(config, runner)
}

/// Stop the scheduler on SIGINT or SIGTERM.
fn spawn_signal_handler(stop: StopHandle) {
    tokio::spawn(async move {
        wait_for_signal().await;
        log::info!("Shutdown requested, finishing current pass");
        stop.stop();
    });
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("Cannot listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Start the status endpoint if enabled. It shuts down with the scheduler.
#[cfg(feature = "server")]
fn spawn_server(
    enabled: bool,
    config: &Arc<Config>,
    status: Arc<StatusBoard>,
    storage: &LocalStorage,
    stop: StopHandle,
) -> Option<tokio::task::JoinHandle<()>> {
    use listing_watch::server::{self, AppState};

    if !enabled {
        return None;
    }
    let state = AppState::new(Arc::clone(config), status, storage.clone());
    let port = config.server.port;
    Some(tokio::spawn(async move {
        if let Err(e) = server::serve(port, state, async move { stop.stopped().await }).await {
            log::error!("Status server failed: {}", e);
        }
    }))
}

#[cfg(not(feature = "server"))]
fn spawn_server(
    enabled: bool,
    _config: &Arc<Config>,
    _status: Arc<StatusBoard>,
    _storage: &LocalStorage,
    _stop: StopHandle,
) -> Option<tokio::task::JoinHandle<()>> {
    if enabled {
        log::warn!("Built without the `server` feature; status endpoint disabled");
    }
    None
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration in {}: {}", cli.config.display(), e);
            return Err(e);
        }
    };
    log::info!(
        "Loaded {} sources from {}",
        config.sources.len(),
        cli.config.display()
    );

    let storage = LocalStorage::new(&config.monitor.storage_dir);

    match cli.command {
        Command::Run => {
            storage.ensure_root().await?;
            let config = Arc::new(config);
            let status = Arc::new(StatusBoard::new());
            let scheduler = build_scheduler(&config, &storage)?.with_status(Arc::clone(&status));
            spawn_signal_handler(scheduler.stop_handle());

            let server = spawn_server(
                cli.serve || config.server.enabled,
                &config,
                Arc::clone(&status),
                &storage,
                scheduler.stop_handle(),
            );

            scheduler.start().await;

            if let Some(server) = server {
                let _ = server.await;
            }
        }

        Command::Once => {
            storage.ensure_root().await?;
            let scheduler = build_scheduler(&config, &storage)?;
            // A signal during the pass is honored after it completes.
            spawn_signal_handler(scheduler.stop_handle());
            let summary = scheduler.run_pass().await;
            if summary.failed > 0 {
                log::warn!("{} of {} sources failed", summary.failed, summary.sources);
            }
        }

        Command::Validate => {
            log::info!("✓ Config OK");
            for source in &config.sources {
                log::info!(
                    "  {} [{}] -> {}",
                    source.name,
                    source.extractor.family(),
                    source.storage_file_name()
                );
            }
        }

        Command::Info => {
            log::info!("Storage directory: {}", storage.root().display());
            for source in &config.sources {
                match storage.read_snapshot(source).await {
                    Ok(Some(snapshot)) => log::info!(
                        "{}: {} records, last updated {}",
                        source.name,
                        snapshot.len(),
                        snapshot
                            .timestamp
                            .map(|t| t.to_rfc3339())
                            .unwrap_or_else(|| "unknown".into())
                    ),
                    Ok(None) => log::info!("{}: no snapshot yet", source.name),
                    Err(e) => log::warn!("{}: {}", source.name, e),
                }
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
