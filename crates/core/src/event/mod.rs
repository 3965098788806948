// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fire-and-forget lifecycle notifications.
//!
//! A single typed `Event` enum covers every lifecycle notification the
//! scheduler emits; `#[serde(tag = "type")]` gives each variant a
//! `{"type": "...", ...}` wire shape, and [`Event::name`] returns that same
//! tag as a dispatch key. See [`dispatch`] for the fan-out that keeps a
//! misbehaving listener from ever reaching the core.

mod dispatch;

pub use dispatch::EventBus;

use crate::job::JobId;
use crate::worker::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A listener subscribed to an [`EventBus`].
///
/// Implementations must not block the core for long; the bus does not
/// impose a timeout, so staying responsive is the listener's own
/// responsibility.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &Event) -> Result<(), crate::error::ListenerError>;
}

/// Lifecycle events emitted by the scheduler, a worker, or a job.
///
/// Serializes as `{"type": "scheduler:start", ...fields}`; unknown type tags
/// deserialize to [`Event::Custom`] for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "scheduler:start")]
    SchedulerStart { supervisor_id: String },

    #[serde(rename = "scheduler:stop")]
    SchedulerStop { supervisor_id: String },

    #[serde(rename = "scheduler:error")]
    SchedulerError { message: String },

    #[serde(rename = "worker:start")]
    WorkerStart { worker_id: WorkerId },

    #[serde(rename = "worker:stop")]
    WorkerStop { worker_id: WorkerId },

    #[serde(rename = "worker:error")]
    WorkerError {
        worker_id: WorkerId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        job_id: Option<JobId>,
        message: String,
    },

    #[serde(rename = "job:created")]
    JobCreated { job_id: JobId, name: String },

    #[serde(rename = "job:start")]
    JobStart {
        job_id: JobId,
        worker_id: WorkerId,
        name: String,
    },

    #[serde(rename = "job:success")]
    JobSuccess { job_id: JobId, worker_id: WorkerId },

    #[serde(rename = "job:fail")]
    JobFail {
        job_id: JobId,
        worker_id: WorkerId,
        error: String,
    },

    #[serde(rename = "job:retry")]
    JobRetry {
        job_id: JobId,
        worker_id: WorkerId,
        attempts: u32,
        next_run_at: DateTime<Utc>,
    },

    #[serde(rename = "job:complete")]
    JobComplete { job_id: JobId, worker_id: WorkerId },

    #[serde(rename = "job:cancel")]
    JobCancel { job_id: JobId },

    /// Catch-all for unknown event types (extensibility).
    #[serde(other, skip_serializing)]
    Custom,
}

impl Event {
    /// The wire name used as the `type` tag, and as the dispatch key a
    /// listener would switch on.
    pub fn name(&self) -> &'static str {
        match self {
            Event::SchedulerStart { .. } => "scheduler:start",
            Event::SchedulerStop { .. } => "scheduler:stop",
            Event::SchedulerError { .. } => "scheduler:error",
            Event::WorkerStart { .. } => "worker:start",
            Event::WorkerStop { .. } => "worker:stop",
            Event::WorkerError { .. } => "worker:error",
            Event::JobCreated { .. } => "job:created",
            Event::JobStart { .. } => "job:start",
            Event::JobSuccess { .. } => "job:success",
            Event::JobFail { .. } => "job:fail",
            Event::JobRetry { .. } => "job:retry",
            Event::JobComplete { .. } => "job:complete",
            Event::JobCancel { .. } => "job:cancel",
            Event::Custom => "custom",
        }
    }

    pub fn job_id(&self) -> Option<JobId> {
        match self {
            Event::JobCreated { job_id, .. }
            | Event::JobStart { job_id, .. }
            | Event::JobSuccess { job_id, .. }
            | Event::JobFail { job_id, .. }
            | Event::JobRetry { job_id, .. }
            | Event::JobComplete { job_id, .. }
            | Event::JobCancel { job_id, .. } => Some(*job_id),
            Event::WorkerError { job_id, .. } => *job_id,
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
