//! Emulators.wtf compare service
//!
//! Serves the compare list of the device catalog over HTTP and an
//! interactive REPL, persisted to durable storage.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emuwtf_compare::api::{self, ApiState};
use emuwtf_compare::cli;
use emuwtf_compare::compare::{CompareOptions, CompareStore};
use emuwtf_compare::config::AppConfig;
use emuwtf_compare::paths::AppPaths;
use emuwtf_compare::storage::open_storage;

/// Emulators.wtf compare list service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults to the application data directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// API port, overrides the configuration
    #[arg(short, long)]
    port: Option<u16>,

    /// Do not start the HTTP API
    #[arg(long)]
    no_api: bool,

    /// Start the interactive REPL
    #[arg(long)]
    repl: bool,

    /// Print the stored compare list and exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let paths = AppPaths::detect();
    paths
        .ensure_directories()
        .context("Failed to create application directories")?;

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = init_logging(&args.log_level, &paths)?;

    info!("Starting Emulators.wtf compare service v{}...", env!("CARGO_PKG_VERSION"));
    info!(
        "Data directory: {} ({})",
        paths.base_dir().display(),
        if paths.is_portable { "portable" } else { "installed" }
    );

    let config_path = args.config.clone().unwrap_or_else(|| paths.config.clone());
    info!("Configuration file: {}", config_path.display());
    let config = AppConfig::load_or_default(&config_path).await?;

    let storage = open_storage(&config.storage, &paths.sled_db_path())?;

    let api_store = CompareStore::new(storage.clone(), CompareOptions::from_config("api", &config));
    let initial = api_store.initialize();
    info!("Compare list loaded: {} device(s)", initial.len());

    if args.list {
        cli::print_selection(&api_store);
        return Ok(());
    }

    let mut sync_tasks = vec![api_store.spawn_storage_sync()?];

    let mut server = if config.api.enabled && !args.no_api {
        let port = args.port.unwrap_or(config.api.port);
        let state = Arc::new(ApiState::new(api_store.clone()));
        Some(tokio::spawn(api::start_server(state, port)))
    } else {
        info!("HTTP API disabled");
        None
    };

    let mut repl = if args.repl {
        let store = CompareStore::new(storage.clone(), CompareOptions::from_config("repl", &config));
        store.initialize();
        sync_tasks.push(store.spawn_storage_sync()?);
        Some(tokio::task::spawn_blocking(move || cli::run_repl(store)))
    } else {
        None
    };

    if server.is_none() && repl.is_none() {
        warn!("Nothing to run: API disabled and REPL not requested");
        return Ok(());
    }

    tokio::select! {
        _ = shutdown_signal() => {}
        result = wait_for(server.as_mut()) => {
            if let Err(e) = result {
                error!("API server stopped: {:#}", e);
            }
        }
        result = wait_for(repl.as_mut()) => {
            match result {
                Ok(()) => info!("REPL closed"),
                Err(e) => warn!("REPL stopped: {:#}", e),
            }
        }
    }

    // Cleanup
    info!("Shutting down...");
    if let Some(server) = server {
        server.abort();
    }
    for task in sync_tasks {
        task.abort();
    }

    info!("Compare service shutdown complete");
    Ok(())
}

/// Await an optional task; never resolves for `None`
async fn wait_for(task: Option<&mut JoinHandle<Result<()>>>) -> Result<()> {
    match task {
        Some(handle) => handle.await.context("Task panicked")?,
        None => std::future::pending().await,
    }
}

fn init_logging(level: &str, paths: &AppPaths) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, "emuwtf-compare.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false),
        )
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for CTRL+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
