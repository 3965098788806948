// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the store/worker boundary.
//!
//! Every distinct failure a [`crate::store::JobStore`] can produce gets its
//! own variant rather than a stringly-typed classification, so a `match` on
//! [`StoreError`] in the worker loop is exhaustive and a new variant is a
//! compile error at every call site until handled.

use crate::job::JobId;
use crate::worker::WorkerId;
use thiserror::Error;

/// Errors a [`crate::store::JobStore`] implementation can produce.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing transport failed (network, driver, serialization).
    /// No job state was mutated.
    #[error("storage backend failure")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// `renew_lock` found no record matching `locked_by = worker_id AND
    /// status = running`: the lock was reclaimed out from under the caller.
    #[error("lock lost for job {job_id}: renew did not match an owned running record")]
    LockLost { job_id: JobId },

    /// `mark_completed` / `mark_failed` found no record matching the
    /// ownership guard. A new owner has already finalized this job.
    #[error("ownership check failed for job {job_id}: not held by worker {worker_id}")]
    Ownership { job_id: JobId, worker_id: WorkerId },

    /// The record does not exist (already deleted, or a bad ID was passed).
    #[error("job {0} not found")]
    NotFound(JobId),
}

impl StoreError {
    /// Wrap an infrastructure-level failure (driver error, I/O, etc).
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }

    pub fn is_lock_lost(&self) -> bool {
        matches!(self, Self::LockLost { .. })
    }

    pub fn is_ownership(&self) -> bool {
        matches!(self, Self::Ownership { .. })
    }
}

/// Error surfaced by a user-registered job handler. Never fatal to the
/// worker: it only drives the retry-or-fail decision.
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Error raised inside an [`crate::event::EventListener`]. Caught at the
/// [`crate::event::EventBus`] boundary and converted into a
/// `scheduler:error` event; never propagates into the core.
#[derive(Debug, Error, Clone)]
#[error("{0}")]
pub struct ListenerError(pub String);

impl ListenerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Errors loading a [`crate::config`]-style configuration from environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnv(&'static str),
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}
