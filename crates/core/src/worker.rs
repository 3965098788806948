// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity and the acquire-execute-finalize control loop.
//!
//! A [`Worker`] drives one logical worker identity against a shared
//! [`crate::store::JobStore`]: poll for an eligible job, race a renewing
//! heartbeat against the user handler, and finalize through
//! [`crate::repeat`]/[`crate::retry`]. Two workers never share in-process
//! state; every cross-worker guarantee is enforced by the store's atomic
//! operations and ownership checks (see [`crate::error::StoreError`]).

use crate::clock::Clock;
use crate::error::{HandlerError, StoreError};
use crate::event::{Event, EventBus};
use crate::handler::HandlerRegistry;
use crate::job::Job;
use crate::repeat;
use crate::retry::{self, RetryDecision};
use crate::store::{JobStore, LockParams};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Unique identifier for a worker instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl WorkerId {
    /// Create a new WorkerId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this WorkerId.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WorkerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for WorkerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for WorkerId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for WorkerId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for WorkerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Errors that can terminate a single execute-phase iteration. None of
/// these are fatal to the worker loop: every variant is logged, turned
/// into a [`crate::event::Event::WorkerError`], and the loop continues.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error("no handler registered for job name {0:?}")]
    NoHandler(String),
    #[error("cron plan failed: {0}")]
    Plan(#[from] crate::repeat::PlanError),
}

/// Per-worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Globally unique identifier for this worker instance.
    pub worker_id: WorkerId,
    /// Delay between poll attempts when nothing was eligible.
    pub poll_interval: Duration,
    /// Initial lock duration granted on acquisition.
    pub lock_timeout: Duration,
    /// Timezone used to evaluate cron expressions that don't specify their
    /// own, falling back to `"UTC"` if also unset.
    pub default_timezone: Option<String>,
}

impl WorkerConfig {
    pub fn new(worker_id: impl Into<WorkerId>) -> Self {
        Self {
            worker_id: worker_id.into(),
            poll_interval: Duration::milliseconds(1000),
            lock_timeout: Duration::seconds(30),
            default_timezone: None,
        }
    }

    /// The heartbeat interval: `max(50ms, lock_timeout / 2)`.
    fn heartbeat_interval(&self) -> Duration {
        (self.lock_timeout / 2).max(Duration::milliseconds(50))
    }
}

/// Drives the acquire-execute-finalize pipeline for one worker identity.
pub struct Worker<S, C> {
    store: Arc<S>,
    handlers: HandlerRegistry,
    events: Arc<EventBus>,
    clock: C,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl<S, C> Worker<S, C>
where
    S: JobStore + 'static,
    C: Clock,
{
    pub fn new(
        store: Arc<S>,
        handlers: HandlerRegistry,
        events: Arc<EventBus>,
        clock: C,
        config: WorkerConfig,
    ) -> Self {
        Self { store, handlers, events, clock, config, shutdown: Arc::new(AtomicBool::new(false)) }
    }

    pub fn worker_id(&self) -> &WorkerId {
        &self.config.worker_id
    }

    /// Signal handle used by a [`crate::supervisor::Supervisor`] to stop
    /// this worker's poll loop cooperatively.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Run the poll loop until shutdown is signaled.
    ///
    /// Checks the shutdown flag before and after `find_and_lock_next` so a
    /// supervisor's `stop()` call is observed promptly even while a job is
    /// mid-acquisition; the idle sleep is similarly interruptible.
    pub async fn run(&self) {
        self.events.emit(Event::WorkerStart { worker_id: self.config.worker_id.clone() });

        while !self.shutdown.load(Ordering::SeqCst) {
            let now = self.clock.now();
            let params = LockParams { now, lock_timeout: self.config.lock_timeout };

            match self.store.find_and_lock_next(&self.config.worker_id, params).await {
                Ok(Some(job)) => {
                    // A shutdown signaled after acquisition still lets this
                    // job finish; a supervisor's graceful stop races the
                    // whole execute phase against its own timeout instead.
                    self.events.emit(Event::JobStart {
                        job_id: job.id,
                        worker_id: self.config.worker_id.clone(),
                        name: job.name.clone(),
                    });
                    self.execute(job).await;
                }
                Ok(None) => {
                    self.sleep_interruptible(self.config.poll_interval).await;
                }
                Err(err) => {
                    self.events.emit(Event::WorkerError {
                        worker_id: self.config.worker_id.clone(),
                        job_id: None,
                        message: format!("find_and_lock_next failed: {err}"),
                    });
                    self.sleep_interruptible(self.config.poll_interval).await;
                }
            }
        }

        self.events.emit(Event::WorkerStop { worker_id: self.config.worker_id.clone() });
    }

    async fn sleep_interruptible(&self, duration: Duration) {
        let std_duration = duration.to_std().unwrap_or(std::time::Duration::from_millis(0));
        let shutdown = self.shutdown.clone();
        tokio::select! {
            _ = tokio::time::sleep(std_duration) => {}
            _ = wait_for_flag(shutdown) => {}
        }
    }

    /// The execute phase for one acquired job: heartbeat, run the handler,
    /// then finalize (complete, retry, or fail) under the lock.
    async fn execute(&self, job: Job) {
        let token = CancellationToken::new();
        let heartbeat = self.spawn_heartbeat(job.id, token.clone());
        let _guard = CancelOnDrop(token);

        let outcome = self.execute_inner(job).await;
        if let Err(err) = outcome {
            tracing::warn!(worker_id = %self.config.worker_id, error = %err, "execute phase error");
        }

        heartbeat.abort();
    }

    fn spawn_heartbeat(
        &self,
        job_id: crate::job::JobId,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.store.clone();
        let worker_id = self.config.worker_id.clone();
        let events = self.events.clone();
        let clock = self.clock.clone();
        let interval = self.config.lock_timeout;
        let heartbeat_interval = self.config.heartbeat_interval();

        tokio::spawn(async move {
            loop {
                let sleep = tokio::time::sleep(
                    heartbeat_interval.to_std().unwrap_or(std::time::Duration::from_millis(50)),
                );
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = sleep => {}
                }

                let now = clock.now();
                match store.renew_lock(job_id, &worker_id, now, interval).await {
                    Ok(_) => {}
                    Err(err) => {
                        events.emit(Event::WorkerError {
                            worker_id: worker_id.clone(),
                            job_id: Some(job_id),
                            message: format!("Heartbeat failed: {err}"),
                        });
                        return;
                    }
                }
            }
        })
    }

    async fn execute_inner(&self, acquired: Job) -> Result<(), WorkerError> {
        let now = self.clock.now();

        // b. Pre-flight ownership/state check.
        let job = match self.store.find_by_id(acquired.id).await? {
            None => return Ok(()), // silent abort
            Some(job) => job,
        };

        if job.status == crate::job::JobStatus::Cancelled {
            self.events.emit(Event::JobComplete { job_id: job.id, worker_id: self.config.worker_id.clone() });
            return Ok(());
        }

        if job.locked_by.as_deref() != Some(self.config.worker_id.as_str())
            || job.status != crate::job::JobStatus::Running
        {
            self.events.emit(Event::WorkerError {
                worker_id: self.config.worker_id.clone(),
                job_id: Some(job.id),
                message: "lock stolen or job no longer running".to_string(),
            });
            return Ok(());
        }

        let mut job = job;

        // c. Cron pre-scheduling.
        if let Some(repeat_spec @ crate::job::RepeatSpec::Cron { .. }) = job.repeat.clone() {
            let mut base = job.next_run_at;
            loop {
                base = repeat::next_run_at(&repeat_spec, base, self.config.default_timezone.as_deref())?;
                if base > now {
                    break;
                }
            }
            job = self.store.reschedule(job.id, base, None, now).await?;
        }

        // d. Invoke the handler.
        let handler = self
            .handlers
            .get(&job.name)
            .ok_or_else(|| WorkerError::NoHandler(job.name.clone()))?;
        let result: Result<(), HandlerError> = handler(job.clone()).await;

        match result {
            Ok(()) => self.on_success(&job).await?,
            Err(err) => self.on_failure(&job, err).await?,
        }

        self.events.emit(Event::JobComplete { job_id: job.id, worker_id: self.config.worker_id.clone() });
        Ok(())
    }

    async fn on_success(&self, job: &Job) -> Result<(), WorkerError> {
        let now = self.clock.now();
        if let Some(repeat_spec @ crate::job::RepeatSpec::Every { .. }) = &job.repeat {
            let next = repeat::next_run_at(repeat_spec, now, self.config.default_timezone.as_deref())?;
            self.store.reschedule(job.id, next, None, now).await?;
            return Ok(());
        }

        if job.repeat.is_none() {
            match self.store.mark_completed(job.id, &self.config.worker_id, now).await {
                Ok(_) => {
                    self.events.emit(Event::JobSuccess { job_id: job.id, worker_id: self.config.worker_id.clone() });
                }
                Err(err) if err.is_ownership() => {
                    self.events.emit(Event::WorkerError {
                        worker_id: self.config.worker_id.clone(),
                        job_id: Some(job.id),
                        message: format!("mark_completed lost ownership: {err}"),
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }
        // A cron repeat was already rescheduled in the pre-flight step (c);
        // nothing further to commit on success.
        Ok(())
    }

    async fn on_failure(&self, job: &Job, error: HandlerError) -> Result<(), WorkerError> {
        let now = self.clock.now();
        let attempts = job.attempts + 1;

        match retry::evaluate(job.retry.as_ref(), attempts) {
            RetryDecision::Retry { delay } => {
                let next_run_at = now + delay;
                self.store.reschedule(job.id, next_run_at, Some(attempts), now).await?;
                self.events.emit(Event::JobRetry {
                    job_id: job.id,
                    worker_id: self.config.worker_id.clone(),
                    attempts,
                    next_run_at,
                });
            }
            RetryDecision::Exhausted => {
                self.store.update_attempts(job.id, attempts, now).await?;
                match self.store.mark_failed(job.id, &self.config.worker_id, error.0.clone(), now).await {
                    Ok(_) => {}
                    Err(err) if err.is_ownership() => {
                        self.events.emit(Event::WorkerError {
                            worker_id: self.config.worker_id.clone(),
                            job_id: Some(job.id),
                            message: format!("mark_failed lost ownership: {err}"),
                        });
                        return Ok(());
                    }
                    Err(err) => return Err(err.into()),
                }
                self.events.emit(Event::JobFail {
                    job_id: job.id,
                    worker_id: self.config.worker_id.clone(),
                    error: error.0,
                });
            }
        }
        Ok(())
    }
}

/// Cancels the heartbeat token when the execute phase exits by any path,
/// success, handler error, or panic alike.
struct CancelOnDrop(CancellationToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

async fn wait_for_flag(flag: Arc<AtomicBool>) {
    loop {
        if flag.load(Ordering::SeqCst) {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
