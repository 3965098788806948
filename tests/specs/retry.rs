// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;
use oj_core::{
    Job, JobBuilder, JobStatus, RetrySpec, StopOptions, Supervisor, SupervisorConfig, SystemClock,
};
use oj_storage::InMemoryJobStore;
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn fast_config(id: &str) -> SupervisorConfig {
    let mut config = SupervisorConfig::new(id, 1);
    config.poll_interval = chrono::Duration::milliseconds(15);
    config.lock_timeout = chrono::Duration::seconds(5);
    config
}

/// A job that always fails exhausts its configured retry budget and lands
/// in `failed`, having retried exactly `max_attempts - 1` times.
#[tokio::test]
async fn retries_exhaust_then_job_fails() {
    let store = Arc::new(InMemoryJobStore::new());
    let (events, recorder) = events_with_recorder();
    let handlers = handlers_with("always-fails", failing_handler("handler blew up"));

    let job = JobBuilder::default()
        .name("always-fails")
        .retry(RetrySpec::fixed(3, 20))
        .build();
    let job_id = store.create(job).await.unwrap().id;

    let supervisor = Supervisor::new(store.clone(), handlers, events, SystemClock, fast_config("retry-spec"));
    supervisor.start().await.unwrap();

    assert!(wait_for(SPEC_WAIT_MAX_MS, || recorder.count("job:fail") >= 1).await, "job never reached job:fail");
    supervisor.stop(StopOptions { graceful: true, timeout: StdDuration::from_millis(500) }).await;

    assert_eq!(recorder.count("job:retry"), 2);
    assert_eq!(recorder.count("job:fail"), 1);

    let job = store.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.attempts, 3);
    assert_eq!(job.last_error.as_deref(), Some("handler blew up"));
}

/// A job that fails once and then succeeds completes with `attempts == 1`
/// recorded against it and never reaches `job:fail`.
#[tokio::test]
async fn a_single_retry_followed_by_success_completes_the_job() {
    let store = Arc::new(InMemoryJobStore::new());
    let (events, recorder) = events_with_recorder();

    let attempt = std::sync::atomic::AtomicUsize::new(0);
    let handler: oj_core::Handler = Arc::new(move |_job: Job| {
        let n = attempt.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Box::pin(async move {
            if n == 0 {
                Err(oj_core::HandlerError::new("first attempt fails"))
            } else {
                Ok(())
            }
        })
    });
    let handlers = handlers_with("flaky", handler);

    let job = JobBuilder::default()
        .name("flaky")
        .retry(RetrySpec::fixed(5, 15))
        .build();
    let job_id = store.create(job).await.unwrap().id;

    let supervisor = Supervisor::new(store.clone(), handlers, events, SystemClock, fast_config("flaky-spec"));
    supervisor.start().await.unwrap();

    assert!(wait_for(SPEC_WAIT_MAX_MS, || recorder.count("job:success") >= 1).await);
    supervisor.stop(StopOptions { graceful: true, timeout: StdDuration::from_millis(500) }).await;

    assert_eq!(recorder.count("job:retry"), 1);
    assert_eq!(recorder.count("job:fail"), 0);

    let job = store.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.attempts, 1);
}
