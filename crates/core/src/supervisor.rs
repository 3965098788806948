// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrates a pool of [`crate::worker::Worker`]s against one
//! [`crate::store::JobStore`].
//!
//! `start()` runs startup stale-lock recovery once and fans out N workers;
//! `stop()` signals every worker's poll loop to exit and, if asked to be
//! graceful, races the drain against a bounded timeout rather than forcing
//! handler termination — the ownership-verified `mark_completed` is the
//! backstop that keeps an orphaned handler from corrupting state after the
//! timeout elapses.

use crate::clock::Clock;
use crate::event::{Event, EventBus};
use crate::handler::HandlerRegistry;
use crate::store::JobStore;
use crate::worker::{Worker, WorkerConfig, WorkerId};
use chrono::Duration;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

/// Configuration for a pool of workers sharing one store.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Identifier prefix; worker `i` is named `"<supervisor_id>-w<i>"`.
    pub supervisor_id: String,
    /// Number of workers to run (`N >= 1`).
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub lock_timeout: Duration,
    pub default_timezone: Option<String>,
}

impl SupervisorConfig {
    pub fn new(supervisor_id: impl Into<String>, worker_count: usize) -> Self {
        Self {
            supervisor_id: supervisor_id.into(),
            worker_count: worker_count.max(1),
            poll_interval: Duration::milliseconds(1000),
            lock_timeout: Duration::seconds(30),
            default_timezone: None,
        }
    }

    fn worker_config(&self, index: usize) -> WorkerConfig {
        let mut config = WorkerConfig::new(WorkerId::new(format!("{}-w{}", self.supervisor_id, index)));
        config.poll_interval = self.poll_interval;
        config.lock_timeout = self.lock_timeout;
        config.default_timezone = self.default_timezone.clone();
        config
    }
}

struct RunningWorker {
    shutdown: Arc<AtomicBool>,
    handle: tokio::task::JoinHandle<()>,
}

/// Default graceful-stop drain timeout.
const DEFAULT_STOP_TIMEOUT: StdDuration = StdDuration::from_secs(30);

/// Options for [`Supervisor::stop`].
#[derive(Debug, Clone, Copy)]
pub struct StopOptions {
    /// Await each worker's current iteration up to `timeout` before
    /// returning. If `false`, signals shutdown and returns immediately.
    pub graceful: bool,
    pub timeout: StdDuration,
}

impl Default for StopOptions {
    fn default() -> Self {
        Self { graceful: true, timeout: DEFAULT_STOP_TIMEOUT }
    }
}

/// Runs N workers against a shared store.
pub struct Supervisor<S, C> {
    store: Arc<S>,
    handlers: HandlerRegistry,
    events: Arc<EventBus>,
    clock: C,
    config: SupervisorConfig,
    started: AtomicBool,
    stopped: AtomicBool,
    workers: parking_lot::Mutex<Vec<RunningWorker>>,
}

impl<S, C> Supervisor<S, C>
where
    S: JobStore + 'static,
    C: Clock,
{
    pub fn new(store: Arc<S>, handlers: HandlerRegistry, events: Arc<EventBus>, clock: C, config: SupervisorConfig) -> Self {
        Self {
            store,
            handlers,
            events,
            clock,
            config,
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            workers: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Idempotent: only the first call performs startup recovery and spawns
    /// workers. Subsequent calls are no-ops.
    pub async fn start(&self) -> Result<(), crate::error::StoreError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.events.emit(Event::SchedulerStart { supervisor_id: self.config.supervisor_id.clone() });

        let now = self.clock.now();
        let recovered = self.store.recover_stale_jobs(now, self.config.lock_timeout).await?;
        if recovered > 0 {
            tracing::info!(supervisor_id = %self.config.supervisor_id, recovered, "recovered stale locks on startup");
        }

        let mut workers = self.workers.lock();
        for i in 0..self.config.worker_count {
            let worker = Worker::new(
                self.store.clone(),
                self.handlers.clone(),
                self.events.clone(),
                self.clock.clone(),
                self.config.worker_config(i),
            );
            let shutdown = worker.shutdown_handle();
            let handle = tokio::spawn(async move { worker.run().await });
            workers.push(RunningWorker { shutdown, handle });
        }

        Ok(())
    }

    /// Idempotent: only the first call signals shutdown; subsequent calls
    /// are no-ops. With `graceful`, awaits every worker up to `timeout`; on
    /// timeout, returns without error and leaves the orphaned handlers to
    /// finish or lose ownership on their own.
    pub async fn stop(&self, options: StopOptions) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut workers = std::mem::take(&mut *self.workers.lock());
        for worker in &workers {
            worker.shutdown.store(true, Ordering::SeqCst);
        }

        if options.graceful {
            let handles: Vec<_> = workers.drain(..).map(|w| w.handle).collect();
            let join_all = join_workers(handles);
            if tokio::time::timeout(options.timeout, join_all).await.is_err() {
                tracing::warn!(
                    supervisor_id = %self.config.supervisor_id,
                    timeout_ms = options.timeout.as_millis() as u64,
                    "graceful stop timed out; outstanding handlers will finish or lose ownership",
                );
            }
        } else {
            for worker in &workers {
                worker.handle.abort();
            }
        }

        self.events.emit(Event::SchedulerStop { supervisor_id: self.config.supervisor_id.clone() });
    }
}

/// Awaits every worker handle; a handle errors only if its task panicked,
/// which we don't re-surface here (the panic is already logged by the
/// default tokio panic hook).
async fn join_workers(handles: Vec<tokio::task::JoinHandle<()>>) {
    for handle in handles {
        let _ = handle.await;
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
