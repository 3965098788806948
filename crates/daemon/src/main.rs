// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `jobsd`: a thin process that wires a [`oj_storage::MongoJobStore`] to an
//! [`oj_core::Supervisor`] and runs it until signaled to stop.
//!
//! This binary does not register job handlers itself — handler wiring is an
//! embedding concern (see [`oj_core::HandlerRegistry`]). `jobsd` owns the
//! store connection, the worker pool, and graceful shutdown, and leaves
//! "what a job named `foo` actually does" to whoever embeds it.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod config;
mod error;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::Config;
use error::DaemonError;
use oj_core::{EventBus, HandlerRegistry, Supervisor, SupervisorConfig, SystemClock};
use oj_storage::MongoJobStore;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jobsd", about = "Odd Jobs distributed scheduler daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker pool until interrupted (Ctrl-C / SIGINT).
    Run {
        /// Number of workers to run; overrides WORKER_COUNT.
        #[arg(long)]
        worker_count: Option<usize>,
        /// Poll interval in milliseconds; overrides POLL_INTERVAL_MS.
        #[arg(long)]
        poll_interval_ms: Option<i64>,
        /// Initial lock duration in milliseconds; overrides LOCK_TIMEOUT_MS.
        #[arg(long)]
        lock_timeout_ms: Option<i64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run { worker_count, poll_interval_ms, lock_timeout_ms } => {
            run(worker_count, poll_interval_ms, lock_timeout_ms).await
        }
    }
}

async fn run(
    worker_count: Option<usize>,
    poll_interval_ms: Option<i64>,
    lock_timeout_ms: Option<i64>,
) -> anyhow::Result<()> {
    let mut config = Config::load().context("loading configuration")?;
    if let Some(n) = worker_count {
        config.worker_count = n;
    }
    if let Some(ms) = poll_interval_ms {
        config.poll_interval_ms = ms;
    }
    if let Some(ms) = lock_timeout_ms {
        config.lock_timeout_ms = ms;
    }

    let store = Arc::new(connect_store(&config).await?);
    let events = Arc::new(EventBus::new());
    let handlers = HandlerRegistry::new();

    let mut supervisor_config = SupervisorConfig::new("jobsd", config.worker_count);
    supervisor_config.poll_interval = chrono::Duration::milliseconds(config.poll_interval_ms);
    supervisor_config.lock_timeout = chrono::Duration::milliseconds(config.lock_timeout_ms);
    supervisor_config.default_timezone = config.default_timezone.clone();

    let supervisor = Supervisor::new(store, handlers, events, SystemClock, supervisor_config);

    supervisor.start().await.map_err(DaemonError::from).context("starting supervisor")?;
    tracing::info!(worker_count = config.worker_count, "jobsd running, waiting for Ctrl-C");

    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    tracing::info!("shutdown signal received, stopping gracefully");

    supervisor.stop(oj_core::StopOptions::default()).await;
    Ok(())
}

async fn connect_store(config: &Config) -> Result<MongoJobStore, DaemonError> {
    let client = mongodb::Client::with_uri_str(&config.mongodb_uri)
        .await
        .map_err(|source| DaemonError::MongoConnect { uri: config.mongodb_uri.clone(), source })?;
    let db = client.database(&config.mongodb_database);
    MongoJobStore::new(&db, &config.jobs_collection).await.map_err(DaemonError::from)
}
