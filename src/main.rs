//! LedgerKV - A Single-Writer In-Memory Key-Value Server
//!
//! This is the main entry point for the LedgerKV server.
//! It restores the store from the append-only log, starts the executor and
//! accepts connections until Ctrl+C.

use anyhow::Context;
use clap::Parser;
use ledgerkv::commands::CommandRegistry;
use ledgerkv::config::Config;
use ledgerkv::connection::ConnectionStats;
use ledgerkv::executor::{restore_from_archive, ArchiveWriter, Executor, ExecutorConfig};
use ledgerkv::server::accept_loop;
use ledgerkv::storage::{Clock, InMemoryStore, Store, SystemClock};
use std::path::Path;
use std::sync::Arc;
use tokio::fs::{File, OpenOptions};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn print_banner(config: &Config) {
    println!(
        r#"
   _            _                 _  ____   __
  | |    ___  __| | __ _  ___ _ __| |/ /\ \ / /
  | |   / _ \/ _` |/ _` |/ _ \ '__| ' /  \ V /
  | |__|  __/ (_| | (_| |  __/ |  | . \   | |
  |_____\___|\__,_|\__, |\___|_|  |_|\_\  |_|
                   |___/

LedgerKV v{} - Single-Writer In-Memory Key-Value Server
──────────────────────────────────────────────────────────────
Server starting on {}
Append-only log: {}

Use Ctrl+C to shutdown gracefully.
"#,
        ledgerkv::VERSION,
        config.bind_address(),
        if config.aof {
            config.aof_path.display().to_string()
        } else {
            "disabled".to_string()
        }
    );
}

/// Replays the log at `path` into `store`, if there is one.
async fn restore(
    path: &Path,
    store: &mut InMemoryStore,
    registry: &CommandRegistry,
) -> anyhow::Result<()> {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "No append-only log yet, starting empty");
            return Ok(());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to open {}", path.display()));
        }
    };

    let replayed = restore_from_archive(&mut file, store, registry)
        .await
        .with_context(|| format!("failed to restore from {}", path.display()))?;
    info!(
        path = %path.display(),
        commands = replayed,
        keys = store.size(),
        "Store restored from append-only log"
    );
    Ok(())
}

async fn open_archive(config: &Config) -> anyhow::Result<ArchiveWriter> {
    if !config.aof {
        return Ok(Box::new(tokio::io::sink()));
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.aof_path)
        .await
        .with_context(|| format!("failed to open {} for append", config.aof_path.display()))?;
    Ok(Box::new(file))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Set up logging; RUST_LOG takes precedence over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner(&config);

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let registry = Arc::new(CommandRegistry::new(Arc::clone(&clock)));
    let mut store = InMemoryStore::new(clock);

    if config.aof {
        restore(&config.aof_path, &mut store, &registry).await?;
    }

    let archive = open_archive(&config).await?;
    let executor = Executor::start(store, archive, ExecutorConfig::default());

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!("Listening on {}", config.bind_address());

    tokio::select! {
        _ = accept_loop(listener, registry, executor.handle(), stats) => {}
        result = signal::ctrl_c() => match result {
            Ok(()) => info!("Shutdown signal received, stopping server..."),
            Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, stopping server..."),
        },
    }

    executor.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
