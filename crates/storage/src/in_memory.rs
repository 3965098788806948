// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-local [`oj_core::JobStore`] backed by a `parking_lot::Mutex` over
//! a `HashMap`. No `.await` point is ever held across the critical section,
//! so a blocking mutex is the right tool here rather than `tokio::sync`.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oj_core::{Job, JobId, JobStatus, JobStore, LockParams, StoreError, WorkerId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Bound on how many distinct job names a single acquisition attempt will
/// skip over due to a blown concurrency cap before giving up.
const MAX_CONCURRENCY_SKIPS: usize = 20;

/// An in-memory [`JobStore`], suitable for tests and single-process
/// deployments that don't need a shared store across hosts.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_by_dedupe_key(guard: &HashMap<JobId, Job>, key: &str) -> Option<Job> {
        guard.values().find(|job| job.dedupe_key.as_deref() == Some(key)).cloned()
    }

    fn insert_one(guard: &mut HashMap<JobId, Job>, job: Job) -> Job {
        if let Some(key) = job.dedupe_key.clone() {
            if let Some(existing) = Self::find_by_dedupe_key(guard, &key) {
                return existing;
            }
        }
        guard.insert(job.id, job.clone());
        job
    }

    fn running_count_excluding(guard: &HashMap<JobId, Job>, name: &str, excluding: JobId) -> u32 {
        guard
            .values()
            .filter(|job| job.id != excluding && job.name == name && job.status == JobStatus::Running)
            .count() as u32
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: Job) -> Result<Job, StoreError> {
        let mut guard = self.jobs.lock();
        Ok(Self::insert_one(&mut guard, job))
    }

    async fn create_bulk(&self, jobs: Vec<Job>) -> Result<Vec<Job>, StoreError> {
        let mut guard = self.jobs.lock();
        Ok(jobs.into_iter().map(|job| Self::insert_one(&mut guard, job)).collect())
    }

    async fn find_and_lock_next(
        &self,
        worker_id: &WorkerId,
        params: LockParams,
    ) -> Result<Option<Job>, StoreError> {
        let mut guard = self.jobs.lock();

        let mut candidates: Vec<JobId> =
            guard.values().filter(|job| job.is_eligible(params.now)).map(|job| job.id).collect();
        candidates.sort_by_key(|id| {
            let job = &guard[id];
            (job.priority, job.next_run_at)
        });

        let mut skipped_names = HashSet::new();

        for candidate_id in candidates {
            let (name, concurrency) = {
                let job = &guard[&candidate_id];
                (job.name.clone(), job.concurrency)
            };

            if let Some(cap) = concurrency {
                if skipped_names.len() >= MAX_CONCURRENCY_SKIPS {
                    break;
                }
                let running = Self::running_count_excluding(&guard, &name, candidate_id);
                if running >= cap {
                    skipped_names.insert(name);
                    continue;
                }
            }

            let Some(job) = guard.get_mut(&candidate_id) else { continue };
            job.status = JobStatus::Running;
            job.locked_by = Some(worker_id.as_str().to_string());
            job.locked_at = Some(params.now);
            job.lock_until = Some(params.now + params.lock_timeout);
            job.last_run_at = Some(params.now);
            job.lock_version += 1;
            job.updated_at = params.now;

            if let Some(cap) = concurrency {
                let running = Self::running_count_excluding(&guard, &name, candidate_id) + 1;
                if running > cap {
                    // Lost the race against a concurrent acquisition under
                    // the same name; revert and keep searching.
                    let Some(job) = guard.get_mut(&candidate_id) else { continue };
                    job.status = JobStatus::Pending;
                    job.locked_by = None;
                    job.locked_at = None;
                    job.lock_until = None;
                    job.last_run_at = None;
                    job.lock_version += 1;
                    skipped_names.insert(name);
                    continue;
                }
            }

            return Ok(Some(guard[&candidate_id].clone()));
        }

        Ok(None)
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
        let mut recovered = 0u64;
        for job in guard.values_mut() {
            if job.status != JobStatus::Running {
                continue;
            }
            let stale = match job.lock_until {
                Some(until) => until <= now,
                None => job.locked_at.map(|at| at <= now - lock_timeout).unwrap_or(false),
            };
            if stale {
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
        Ok(self
            .jobs
            .lock()
            .values()
            .filter(|job| job.name == name && job.status == JobStatus::Running)
            .count() as u64)
    }
}

#[cfg(test)]
#[path = "in_memory_tests.rs"]
mod tests;
