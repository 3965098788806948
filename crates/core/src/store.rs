// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The [`JobStore`] trait: every concurrency-critical operation the core
//! performs against durable job records.
//!
//! This crate defines the contract only. `oj-storage` provides two
//! implementations: an in-process variant for tests (`InMemoryJobStore`) and
//! a document-store-backed variant (`MongoJobStore`). Both must satisfy the
//! same atomicity and ownership guarantees described on each method below.

use crate::error::StoreError;
use crate::job::{Job, JobId};
use crate::worker::WorkerId;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

/// Parameters for an acquisition attempt.
#[derive(Debug, Clone, Copy)]
pub struct LockParams {
    pub now: DateTime<Utc>,
    pub lock_timeout: Duration,
}

/// A store encapsulating all concurrency-critical persistence for jobs.
///
/// Every mutating method here touches exactly one record and must be
/// linearizable against other mutations of that record; `find_and_lock_next`
/// is additionally required to be atomic across the whole record set (no two
/// concurrent callers may ever observe the same job as successfully locked).
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert `job`. If `job.dedupe_key` is set and an existing record
    /// shares it, returns the existing record unchanged (idempotent).
    async fn create(&self, job: Job) -> Result<Job, StoreError>;

    /// Atomic-per-record insert of a batch. Dedupe semantics apply per
    /// record, same as [`JobStore::create`].
    async fn create_bulk(&self, jobs: Vec<Job>) -> Result<Vec<Job>, StoreError>;

    /// Select at most one eligible job and atomically transition it to
    /// `running`. Returns `None` if nothing is eligible (or every eligible
    /// candidate is blocked by its `concurrency` cap).
    async fn find_and_lock_next(
        &self,
        worker_id: &WorkerId,
        params: LockParams,
    ) -> Result<Option<Job>, StoreError>;

    /// Conditional update: matches only when `locked_by = worker_id AND
    /// status = running`. On match, extends `lock_until` and bumps
    /// `lock_version`. On no-match, fails with `StoreError::LockLost`.
    async fn renew_lock(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
        lock_timeout: Duration,
    ) -> Result<Job, StoreError>;

    /// Conditional: matches only when `locked_by = worker_id AND status =
    /// running`. On no-match, fails with `StoreError::Ownership`.
    async fn mark_completed(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError>;

    /// Conditional on the same ownership guard as [`JobStore::mark_completed`]
    /// (see DESIGN.md for the rationale).
    async fn mark_failed(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError>;

    /// Unconditional write: `status <- pending`, `next_run_at <- next_run_at`,
    /// lock cleared, `last_scheduled_at <- next_run_at`. `attempts`, when
    /// given, is authoritative; otherwise the store increments the stored
    /// value by one.
    async fn reschedule(
        &self,
        job_id: JobId,
        next_run_at: DateTime<Utc>,
        attempts: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError>;

    /// For every record whose lock has expired (`lock_until <= now`, or no
    /// `lock_until` but `locked_at <= now - lock_timeout`), reset to
    /// `pending` and clear lock fields. Returns the count affected.
    /// Idempotent: a second call with the same `now` affects zero records.
    async fn recover_stale_jobs(
        &self,
        now: DateTime<Utc>,
        lock_timeout: Duration,
    ) -> Result<u64, StoreError>;

    /// Sets `status <- cancelled` and clears the lock, regardless of current
    /// state.
    async fn cancel(&self, job_id: JobId, now: DateTime<Utc>) -> Result<Job, StoreError>;

    async fn find_by_id(&self, job_id: JobId) -> Result<Option<Job>, StoreError>;

    /// All jobs, optionally filtered to a single `name`.
    async fn find_all(&self, name: Option<&str>) -> Result<Vec<Job>, StoreError>;

    /// Unconditional `attempts` write, used by the worker immediately before
    /// `mark_failed` so the persisted attempt count reflects the failed
    /// attempt even if `mark_failed`'s ownership guard rejects.
    async fn update_attempts(
        &self,
        job_id: JobId,
        attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError>;

    /// Count of jobs named `name` currently `running`.
    async fn count_running(&self, name: &str) -> Result<u64, StoreError>;
}
