// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The durable job record and its lifecycle types.
//!
//! A [`Job`] is the single entity the store persists. Every field here is
//! named to match the store document layout 1:1 so a bit-compatible
//! alternate store implementation only needs to agree on these names.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

crate::define_uuid_id! {
    /// Unique identifier for a job record.
    pub struct JobId;
}

/// Lifecycle status of a job.
///
/// `Running ⇔ locked_by.is_some() ∧ lock_until.is_some()` is an invariant
/// every [`crate::job::Job`] must uphold; the store enforces it by only ever
/// setting/clearing the lock fields in lockstep with this field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

crate::simple_display! {
    JobStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

impl JobStatus {
    /// True for states a job does not leave on its own (absent a `reschedule`).
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// How long to wait before the next retry attempt.
///
/// Stored as data rather than a closure: the document store must be able to
/// persist and reload it, so `Backoff` is an exponential formula rather than
/// an arbitrary function pointer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryDelay {
    Fixed { ms: i64 },
    Exponential { base_ms: i64, factor: f64, max_ms: i64 },
}

impl RetryDelay {
    /// Delay before the attempt numbered `attempt` (1-based, the attempt that
    /// just failed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = match self {
            RetryDelay::Fixed { ms } => *ms,
            RetryDelay::Exponential { base_ms, factor, max_ms } => {
                let exponent = attempt.saturating_sub(1) as i32;
                let computed = (*base_ms as f64) * factor.powi(exponent);
                computed.min(*max_ms as f64).max(0.0) as i64
            }
        };
        Duration::milliseconds(ms.max(0))
    }
}

/// Retry configuration attached to a job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetrySpec {
    pub max_attempts: u32,
    pub delay: RetryDelay,
}

impl RetrySpec {
    pub fn fixed(max_attempts: u32, delay_ms: i64) -> Self {
        Self { max_attempts, delay: RetryDelay::Fixed { ms: delay_ms } }
    }

    pub fn exponential(max_attempts: u32, base_ms: i64, factor: f64, max_ms: i64) -> Self {
        Self {
            max_attempts,
            delay: RetryDelay::Exponential { base_ms, factor, max_ms },
        }
    }
}

/// Repeat configuration attached to a job. `Cron` and `Every` are mutually
/// exclusive at the `JobSpec` validation boundary (see [`crate::jobspec`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RepeatSpec {
    Cron { expression: String, timezone: Option<String> },
    Every { ms: i64 },
}

/// The durable job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub data: serde_json::Value,
    pub status: JobStatus,
    pub next_run_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_scheduled_at: Option<DateTime<Utc>>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub lock_until: Option<DateTime<Utc>>,
    pub lock_version: u64,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub retry: Option<RetrySpec>,
    pub repeat: Option<RepeatSpec>,
    pub dedupe_key: Option<String>,
    pub priority: i32,
    pub concurrency: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// True if the job record currently upholds the running/lock invariant.
    pub fn lock_invariant_holds(&self) -> bool {
        match self.status {
            JobStatus::Running => self.locked_by.is_some() && self.lock_until.is_some(),
            _ => self.locked_by.is_none() && self.lock_until.is_none() && self.locked_at.is_none(),
        }
    }

    /// Eligible for acquisition at `now`: due, and either free or staffed by
    /// an expired lock. Mirrors the store's `findAndLockNext` filter so the
    /// in-memory and document-store implementations can share this as a
    /// single source of truth for "what counts as eligible."
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        if self.next_run_at > now {
            return false;
        }
        match self.status {
            JobStatus::Pending => true,
            JobStatus::Running => self.lock_until.map(|until| until <= now).unwrap_or(false),
            _ => false,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
crate::builder! {
    pub struct JobBuilder => Job {
        into {
            name: String = "test-job",
        }
        set {
            data: serde_json::Value = serde_json::Value::Null,
            status: JobStatus = JobStatus::Pending,
            lock_version: u64 = 0,
            attempts: u32 = 0,
            priority: i32 = 5,
            next_run_at: DateTime<Utc> = Utc::now(),
        }
        option {
            last_run_at: DateTime<Utc> = None,
            last_scheduled_at: DateTime<Utc> = None,
            locked_at: DateTime<Utc> = None,
            locked_by: String = None,
            lock_until: DateTime<Utc> = None,
            last_error: String = None,
            retry: RetrySpec = None,
            repeat: RepeatSpec = None,
            dedupe_key: String = None,
            concurrency: u32 = None,
        }
        computed {
            id: JobId = JobId::new(),
            created_at: DateTime<Utc> = Utc::now(),
            updated_at: DateTime<Utc> = Utc::now(),
        }
    }
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
