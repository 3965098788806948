// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Submission-boundary validation.
//!
//! A [`JobRequest`] is the loosely-typed shape a submission layer (HTTP,
//! CLI, another service) would hand the core. [`JobSpec`] is what
//! `JobStore::create` actually wants: validated, and with `repeat`
//! collapsed to the mutually-exclusive enum the core operates on
//! internally. Validating here means `JobStore::create` never has to.

use crate::job::{Job, JobId, JobStatus, RepeatSpec, RetrySpec};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw submission payload, as it would arrive over the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobRequest {
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub run_at: Option<DateTime<Utc>>,
    pub retry: Option<RetrySpec>,
    pub repeat_cron: Option<String>,
    pub repeat_every_ms: Option<i64>,
    pub repeat_timezone: Option<String>,
    pub dedupe_key: Option<String>,
    pub priority: Option<i32>,
    pub concurrency: Option<u32>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("job name must not be empty")]
    EmptyName,
    #[error("repeat.cron and repeat.every are mutually exclusive")]
    ConflictingRepeat,
    #[error("priority must be an integer in [1, 10], got {0}")]
    PriorityOutOfRange(i32),
    #[error("concurrency must be at least 1, got {0}")]
    ConcurrencyOutOfRange(u32),
}

/// A validated, ready-to-persist job description.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub data: serde_json::Value,
    pub next_run_at: DateTime<Utc>,
    pub retry: Option<RetrySpec>,
    pub repeat: Option<RepeatSpec>,
    pub dedupe_key: Option<String>,
    pub priority: i32,
    pub concurrency: Option<u32>,
}

impl JobSpec {
    /// Materialize a fresh [`Job`] record as `JobStore::create` would: a
    /// new identifier, `pending`, zeroed attempts and lock version.
    pub fn into_job(self, now: DateTime<Utc>) -> Job {
        Job {
            id: JobId::new(),
            name: self.name,
            data: self.data,
            status: JobStatus::Pending,
            next_run_at: self.next_run_at,
            last_run_at: None,
            last_scheduled_at: None,
            locked_at: None,
            locked_by: None,
            lock_until: None,
            lock_version: 0,
            attempts: 0,
            last_error: None,
            retry: self.retry,
            repeat: self.repeat,
            dedupe_key: self.dedupe_key,
            priority: self.priority,
            concurrency: self.concurrency,
            created_at: now,
            updated_at: now,
        }
    }
}

impl TryFrom<JobRequest> for JobSpec {
    type Error = ValidationError;

    fn try_from(req: JobRequest) -> Result<Self, Self::Error> {
        if req.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }

        let priority = req.priority.unwrap_or(5);
        if !(1..=10).contains(&priority) {
            return Err(ValidationError::PriorityOutOfRange(priority));
        }

        if let Some(concurrency) = req.concurrency {
            if concurrency < 1 {
                return Err(ValidationError::ConcurrencyOutOfRange(concurrency));
            }
        }

        let repeat = match (req.repeat_cron, req.repeat_every_ms) {
            (Some(_), Some(_)) => return Err(ValidationError::ConflictingRepeat),
            (Some(expression), None) => Some(RepeatSpec::Cron { expression, timezone: req.repeat_timezone }),
            (None, Some(ms)) => Some(RepeatSpec::Every { ms }),
            (None, None) => None,
        };

        Ok(JobSpec {
            name: req.name,
            data: req.data,
            next_run_at: req.run_at.unwrap_or_else(Utc::now),
            retry: req.retry,
            repeat,
            dedupe_key: req.dedupe_key,
            priority,
            concurrency: req.concurrency,
        })
    }
}

#[cfg(test)]
#[path = "jobspec_tests.rs"]
mod tests;
