// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A minimal in-process [`crate::store::JobStore`] used only by this
//! crate's own unit tests for [`crate::worker`] and [`crate::supervisor`].
//!
//! `oj-storage`'s `InMemoryJobStore` is the real, spec-complete
//! implementation (concurrency-cap bounded retry, dedupe, etc) exercised by
//! the workspace-root integration tests; it can't be a dev-dependency here
//! without a crate cycle, since it depends on `oj-core`. This mock only
//! needs to support the acquire/renew/finalize paths the worker loop
//! actually drives.

use crate::error::StoreError;
use crate::job::{Job, JobId, JobStatus};
use crate::store::{JobStore, LockParams};
use crate::worker::WorkerId;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct TestStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl TestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.lock().insert(job.id, job);
    }

    pub fn get(&self, id: JobId) -> Option<Job> {
        self.jobs.lock().get(&id).cloned()
    }
}

#[async_trait]
impl JobStore for TestStore {
    async fn create(&self, job: Job) -> Result<Job, StoreError> {
        self.jobs.lock().insert(job.id, job.clone());
        Ok(job)
    }

    async fn create_bulk(&self, jobs: Vec<Job>) -> Result<Vec<Job>, StoreError> {
        let mut guard = self.jobs.lock();
        for job in &jobs {
            guard.insert(job.id, job.clone());
        }
        Ok(jobs)
    }

    async fn find_and_lock_next(
        &self,
        worker_id: &WorkerId,
        params: LockParams,
    ) -> Result<Option<Job>, StoreError> {
        let mut guard = self.jobs.lock();
        let mut candidates: Vec<_> =
            guard.values().filter(|job| job.is_eligible(params.now)).map(|job| job.id).collect();
        candidates.sort_by_key(|id| {
            let job = &guard[id];
            (job.priority, job.next_run_at)
        });

        let chosen = candidates.into_iter().next();
        match chosen {
            None => Ok(None),
            Some(id) => {
                let job = guard.get_mut(&id).expect("candidate exists");
                job.status = JobStatus::Running;
                job.locked_by = Some(worker_id.as_str().to_string());
                job.locked_at = Some(params.now);
                job.lock_until = Some(params.now + params.lock_timeout);
                job.last_run_at = Some(params.now);
                job.lock_version += 1;
                job.updated_at = params.now;
                Ok(Some(job.clone()))
            }
        }
    }

    async fn renew_lock(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
        lock_timeout: Duration,
    ) -> Result<Job, StoreError> {
        let mut guard = self.jobs.lock();
        let job = guard.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;
        if job.locked_by.as_deref() != Some(worker_id.as_str()) || job.status != JobStatus::Running {
            return Err(StoreError::LockLost { job_id });
        }
        job.locked_at = Some(now);
        job.lock_until = Some(now + lock_timeout);
        job.lock_version += 1;
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn mark_completed(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let mut guard = self.jobs.lock();
        let job = guard.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;
        if job.locked_by.as_deref() != Some(worker_id.as_str()) || job.status != JobStatus::Running {
            return Err(StoreError::Ownership { job_id, worker_id: worker_id.clone() });
        }
        job.status = JobStatus::Completed;
        job.locked_by = None;
        job.locked_at = None;
        job.lock_until = None;
        job.lock_version += 1;
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn mark_failed(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let mut guard = self.jobs.lock();
        let job = guard.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;
        if job.locked_by.as_deref() != Some(worker_id.as_str()) || job.status != JobStatus::Running {
            return Err(StoreError::Ownership { job_id, worker_id: worker_id.clone() });
        }
        job.status = JobStatus::Failed;
        job.last_error = Some(error);
        job.locked_by = None;
        job.locked_at = None;
        job.lock_until = None;
        job.lock_version += 1;
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn reschedule(
        &self,
        job_id: JobId,
        next_run_at: DateTime<Utc>,
        attempts: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let mut guard = self.jobs.lock();
        let job = guard.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;
        job.status = JobStatus::Pending;
        job.next_run_at = next_run_at;
        job.attempts = attempts.unwrap_or(job.attempts + 1);
        job.locked_by = None;
        job.locked_at = None;
        job.lock_until = None;
        job.last_scheduled_at = Some(next_run_at);
        job.lock_version += 1;
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn recover_stale_jobs(&self, now: DateTime<Utc>, lock_timeout: Duration) -> Result<u64, StoreError> {
        let mut guard = self.jobs.lock();
        let mut recovered = 0;
        for job in guard.values_mut() {
            let stale = match (job.lock_until, job.locked_at) {
                (Some(until), _) => until <= now,
                (None, Some(locked_at)) => locked_at <= now - lock_timeout,
                (None, None) => false,
            };
            if job.status == JobStatus::Running && stale {
                job.status = JobStatus::Pending;
                job.locked_by = None;
                job.locked_at = None;
                job.lock_until = None;
                job.lock_version += 1;
                job.updated_at = now;
                recovered += 1;
            }
        }
        Ok(recovered)
    }

    async fn cancel(&self, job_id: JobId, now: DateTime<Utc>) -> Result<Job, StoreError> {
        let mut guard = self.jobs.lock();
        let job = guard.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;
        job.status = JobStatus::Cancelled;
        job.locked_by = None;
        job.locked_at = None;
        job.lock_until = None;
        job.lock_version += 1;
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn find_by_id(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.jobs.lock().get(&job_id).cloned())
    }

    async fn find_all(&self, name: Option<&str>) -> Result<Vec<Job>, StoreError> {
        Ok(self
            .jobs
            .lock()
            .values()
            .filter(|job| name.map(|n| job.name == n).unwrap_or(true))
            .cloned()
            .collect())
    }

    async fn update_attempts(&self, job_id: JobId, attempts: u32, now: DateTime<Utc>) -> Result<Job, StoreError> {
        let mut guard = self.jobs.lock();
        let job = guard.get_mut(&job_id).ok_or(StoreError::NotFound(job_id))?;
        job.attempts = attempts;
        job.updated_at = now;
        Ok(job.clone())
    }

    async fn count_running(&self, name: &str) -> Result<u64, StoreError> {
        Ok(self.jobs.lock().values().filter(|j| j.name == name && j.status == JobStatus::Running).count() as u64)
    }
}
