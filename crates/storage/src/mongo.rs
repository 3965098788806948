// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mongo-backed [`oj_core::JobStore`]. `find_and_lock_next` leans on
//! `find_one_and_update`'s atomic find-and-modify semantics; every other
//! conditional mutation is a filter-matched `update_one` whose zero-match
//! case maps to the ownership/lock-lost errors in
//! [`oj_core::error::StoreError`].

use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Duration, Utc};
use mongodb::options::{FindOneAndUpdateOptions, IndexOptions, ReturnDocument};
use mongodb::{Collection, Database, IndexModel};
use oj_core::{Job, JobId, JobStatus, JobStore, LockParams, StoreError, WorkerId};

/// Bound on how many distinct job names a single acquisition attempt will
/// skip over due to a blown concurrency cap before giving up.
const MAX_CONCURRENCY_SKIPS: usize = 20;

/// A [`JobStore`] backed by a single Mongo collection of [`Job`] documents.
pub struct MongoJobStore {
    collection: Collection<Job>,
}

impl MongoJobStore {
    /// Opens `collection_name` in `db` and creates the indexes acquisition
    /// and dedupe lookups rely on. Index creation is background and
    /// idempotent, so this is safe to call on every process startup.
    pub async fn new(db: &Database, collection_name: &str) -> Result<Self, StoreError> {
        let collection = db.collection::<Job>(collection_name);
        Self::create_indexes(&collection).await?;
        Ok(Self { collection })
    }

    async fn create_indexes(collection: &Collection<Job>) -> Result<(), StoreError> {
        let poll_index = IndexModel::builder()
            .keys(doc! { "status": 1, "priority": 1, "next_run_at": 1 })
            .build();
        let dedupe_index = IndexModel::builder()
            .keys(doc! { "dedupe_key": 1 })
            .options(IndexOptions::builder().unique(true).sparse(true).build())
            .build();
        let lock_index = IndexModel::builder()
            .keys(doc! { "lock_until": 1 })
            .options(IndexOptions::builder().sparse(true).build())
            .build();
        let concurrency_index =
            IndexModel::builder().keys(doc! { "name": 1, "status": 1 }).build();

        collection
            .create_indexes(vec![poll_index, dedupe_index, lock_index, concurrency_index])
            .await
            .map_err(StoreError::storage)?;
        Ok(())
    }

    fn bson_now(now: DateTime<Utc>) -> bson::DateTime {
        bson::DateTime::from_chrono(now)
    }

    async fn revert_to_pending(&self, job_id: JobId) -> Result<(), StoreError> {
        self.collection
            .update_one(
                doc! { "id": job_id.to_string() },
                doc! { "$set": { "status": "pending", "locked_by": bson::Bson::Null, "locked_at": bson::Bson::Null, "lock_until": bson::Bson::Null, "last_run_at": bson::Bson::Null }, "$inc": { "lock_version": 1 } },
            )
            .await
            .map_err(StoreError::storage)?;
        Ok(())
    }

    async fn running_count_excluding(&self, name: &str, excluding: JobId) -> Result<u64, StoreError> {
        self.collection
            .count_documents(doc! {
                "name": name,
                "status": "running",
                "id": { "$ne": excluding.to_string() },
            })
            .await
            .map_err(StoreError::storage)
    }
}

fn eligibility_filter(now: DateTime<Utc>) -> Document {
    let now = MongoJobStore::bson_now(now);
    doc! {
        "next_run_at": { "$lte": now },
        "$or": [
            { "status": "pending" },
            { "status": "running", "lock_until": { "$lte": now } },
        ],
    }
}

#[async_trait]
impl JobStore for MongoJobStore {
    async fn create(&self, job: Job) -> Result<Job, StoreError> {
        if let Some(key) = &job.dedupe_key {
            if let Some(existing) = self
                .collection
                .find_one(doc! { "dedupe_key": key })
                .await
                .map_err(StoreError::storage)?
            {
                return Ok(existing);
            }
        }
        self.collection.insert_one(&job).await.map_err(StoreError::storage)?;
        Ok(job)
    }

    async fn create_bulk(&self, jobs: Vec<Job>) -> Result<Vec<Job>, StoreError> {
        let mut inserted = Vec::with_capacity(jobs.len());
        for job in jobs {
            inserted.push(self.create(job).await?);
        }
        Ok(inserted)
    }

    async fn find_and_lock_next(
        &self,
        worker_id: &WorkerId,
        params: LockParams,
    ) -> Result<Option<Job>, StoreError> {
        let lock_until = Self::bson_now(params.now + params.lock_timeout);
        let now_bson = Self::bson_now(params.now);
        let update = doc! {
            "$set": {
                "status": "running",
                "locked_by": worker_id.as_str(),
                "locked_at": now_bson,
                "lock_until": lock_until,
                "last_run_at": now_bson,
            },
            "$inc": { "lock_version": 1 },
        };
        let options = FindOneAndUpdateOptions::builder()
            .sort(doc! { "priority": 1, "next_run_at": 1 })
            .return_document(ReturnDocument::After)
            .build();

        let mut excluded_names: Vec<String> = Vec::new();
        for _ in 0..=MAX_CONCURRENCY_SKIPS {
            let mut filter = eligibility_filter(params.now);
            if !excluded_names.is_empty() {
                filter.insert("name", doc! { "$nin": excluded_names.clone() });
            }

            let acquired = self
                .collection
                .find_one_and_update(filter, update.clone())
                .with_options(options.clone())
                .await
                .map_err(StoreError::storage)?;

            let Some(job) = acquired else {
                return Ok(None);
            };

            let Some(cap) = job.concurrency else {
                return Ok(Some(job));
            };

            let running = self.running_count_excluding(&job.name, job.id).await? + 1;
            if running <= cap as u64 {
                return Ok(Some(job));
            }

            self.revert_to_pending(job.id).await?;
            excluded_names.push(job.name);
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
        let filter = doc! {
            "id": job_id.to_string(),
            "locked_by": worker_id.as_str(),
            "status": "running",
        };
        let update = doc! {
            "$set": {
                "locked_at": Self::bson_now(now),
                "lock_until": Self::bson_now(now + lock_timeout),
            },
            "$inc": { "lock_version": 1 },
        };
        let options = FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();
        self.collection
            .find_one_and_update(filter, update)
            .with_options(options)
            .await
            .map_err(StoreError::storage)?
            .ok_or(StoreError::LockLost { job_id })
    }

    async fn mark_completed(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let filter = doc! {
            "id": job_id.to_string(),
            "locked_by": worker_id.as_str(),
            "status": "running",
        };
        let update = doc! {
            "$set": {
                "status": "completed",
                "locked_by": bson::Bson::Null,
                "locked_at": bson::Bson::Null,
                "lock_until": bson::Bson::Null,
                "updated_at": Self::bson_now(now),
            },
            "$inc": { "lock_version": 1 },
        };
        let options = FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();
        self.collection
            .find_one_and_update(filter, update)
            .with_options(options)
            .await
            .map_err(StoreError::storage)?
            .ok_or_else(|| StoreError::Ownership { job_id, worker_id: worker_id.clone() })
    }

    async fn mark_failed(
        &self,
        job_id: JobId,
        worker_id: &WorkerId,
        error: String,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let filter = doc! {
            "id": job_id.to_string(),
            "locked_by": worker_id.as_str(),
            "status": "running",
        };
        let update = doc! {
            "$set": {
                "status": "failed",
                "last_error": error,
                "locked_by": bson::Bson::Null,
                "locked_at": bson::Bson::Null,
                "lock_until": bson::Bson::Null,
                "updated_at": Self::bson_now(now),
            },
            "$inc": { "lock_version": 1 },
        };
        let options = FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();
        self.collection
            .find_one_and_update(filter, update)
            .with_options(options)
            .await
            .map_err(StoreError::storage)?
            .ok_or_else(|| StoreError::Ownership { job_id, worker_id: worker_id.clone() })
    }

    async fn reschedule(
        &self,
        job_id: JobId,
        next_run_at: DateTime<Utc>,
        attempts: Option<u32>,
        now: DateTime<Utc>,
    ) -> Result<Job, StoreError> {
        let mut set = doc! {
            "status": "pending",
            "next_run_at": Self::bson_now(next_run_at),
            "last_scheduled_at": Self::bson_now(next_run_at),
            "locked_by": bson::Bson::Null,
            "locked_at": bson::Bson::Null,
            "lock_until": bson::Bson::Null,
            "updated_at": Self::bson_now(now),
        };
        let mut update = doc! { "$set": set.clone(), "$inc": { "lock_version": 1 } };
        if let Some(attempts) = attempts {
            set.insert("attempts", attempts as i64);
            update = doc! { "$set": set, "$inc": { "lock_version": 1 } };
        } else {
            update.insert("$inc", doc! { "lock_version": 1, "attempts": 1 });
        }

        let options = FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();
        self.collection
            .find_one_and_update(doc! { "id": job_id.to_string() }, update)
            .with_options(options)
            .await
            .map_err(StoreError::storage)?
            .ok_or(StoreError::NotFound(job_id))
    }

    async fn recover_stale_jobs(&self, now: DateTime<Utc>, lock_timeout: Duration) -> Result<u64, StoreError> {
        let now_bson = Self::bson_now(now);
        let stale_cutoff = Self::bson_now(now - lock_timeout);
        let filter = doc! {
            "status": "running",
            "$or": [
                { "lock_until": { "$lte": now_bson } },
                { "lock_until": bson::Bson::Null, "locked_at": { "$lte": stale_cutoff } },
            ],
        };
        let update = doc! {
            "$set": {
                "status": "pending",
                "locked_by": bson::Bson::Null,
                "locked_at": bson::Bson::Null,
                "lock_until": bson::Bson::Null,
                "updated_at": now_bson,
            },
            "$inc": { "lock_version": 1 },
        };
        let result = self.collection.update_many(filter, update).await.map_err(StoreError::storage)?;
        Ok(result.modified_count)
    }

    async fn cancel(&self, job_id: JobId, now: DateTime<Utc>) -> Result<Job, StoreError> {
        let update = doc! {
            "$set": {
                "status": "cancelled",
                "locked_by": bson::Bson::Null,
                "locked_at": bson::Bson::Null,
                "lock_until": bson::Bson::Null,
                "updated_at": Self::bson_now(now),
            },
            "$inc": { "lock_version": 1 },
        };
        let options = FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();
        self.collection
            .find_one_and_update(doc! { "id": job_id.to_string() }, update)
            .with_options(options)
            .await
            .map_err(StoreError::storage)?
            .ok_or(StoreError::NotFound(job_id))
    }

    async fn find_by_id(&self, job_id: JobId) -> Result<Option<Job>, StoreError> {
        self.collection
            .find_one(doc! { "id": job_id.to_string() })
            .await
            .map_err(StoreError::storage)
    }

    async fn find_all(&self, name: Option<&str>) -> Result<Vec<Job>, StoreError> {
        let filter = match name {
            Some(name) => doc! { "name": name },
            None => doc! {},
        };
        let mut cursor = self.collection.find(filter).await.map_err(StoreError::storage)?;
        let mut jobs = Vec::new();
        while cursor.advance().await.map_err(StoreError::storage)? {
            jobs.push(cursor.deserialize_current().map_err(StoreError::storage)?);
        }
        Ok(jobs)
    }

    async fn update_attempts(&self, job_id: JobId, attempts: u32, now: DateTime<Utc>) -> Result<Job, StoreError> {
        let update = doc! {
            "$set": { "attempts": attempts as i64, "updated_at": Self::bson_now(now) },
        };
        let options = FindOneAndUpdateOptions::builder().return_document(ReturnDocument::After).build();
        self.collection
            .find_one_and_update(doc! { "id": job_id.to_string() }, update)
            .with_options(options)
            .await
            .map_err(StoreError::storage)?
            .ok_or(StoreError::NotFound(job_id))
    }

    async fn count_running(&self, name: &str) -> Result<u64, StoreError> {
        self.collection
            .count_documents(doc! { "name": name, "status": "running" })
            .await
            .map_err(StoreError::storage)
    }
}
