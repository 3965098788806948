// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;
use oj_core::{JobBuilder, StopOptions, Supervisor, SupervisorConfig, SystemClock};
use oj_storage::InMemoryJobStore;
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn fast_config(id: &str, worker_count: usize) -> SupervisorConfig {
    let mut config = SupervisorConfig::new(id, worker_count);
    config.poll_interval = chrono::Duration::milliseconds(10);
    config.lock_timeout = chrono::Duration::seconds(5);
    config
}

/// Starting a pool of workers against an empty store emits one
/// `worker:start` per configured worker and no job activity, and a graceful
/// stop emits a matching `worker:stop` for each before `scheduler:stop`.
#[tokio::test]
async fn start_and_graceful_stop_emit_one_worker_event_pair_per_worker() {
    let store = Arc::new(InMemoryJobStore::new());
    let (events, recorder) = events_with_recorder();
    let handlers = handlers_with("unused", ok_handler());

    let supervisor = Supervisor::new(store, handlers, events, SystemClock, fast_config("lifecycle-spec", 3));
    supervisor.start().await.unwrap();

    assert!(wait_for(SPEC_WAIT_MAX_MS, || recorder.count("worker:start") == 3).await);
    supervisor.stop(StopOptions { graceful: true, timeout: StdDuration::from_millis(1_000) }).await;

    assert_eq!(recorder.count("worker:start"), 3);
    assert_eq!(recorder.count("worker:stop"), 3);
    let names = recorder.names();
    assert_eq!(names.last().map(String::as_str), Some("scheduler:stop"));
}

/// A non-graceful stop aborts workers immediately: an in-flight handler
/// never gets to finish, and the job is left running/locked rather than
/// completed, because the worker task was aborted out from under it.
#[tokio::test]
async fn non_graceful_stop_abandons_an_in_flight_job() {
    let store = Arc::new(InMemoryJobStore::new());
    let (events, recorder) = events_with_recorder();
    let (handler, _count) = counting_slow_handler(StdDuration::from_secs(10));
    let handlers = handlers_with("slow", handler);

    let job = JobBuilder::default().name("slow").build();
    let job_id = store.create(job).await.unwrap().id;

    let supervisor = Supervisor::new(store.clone(), handlers, events, SystemClock, fast_config("abort-spec", 1));
    supervisor.start().await.unwrap();

    assert!(wait_for(SPEC_WAIT_MAX_MS, || recorder.count("job:start") >= 1).await, "job never started");
    supervisor.stop(StopOptions { graceful: false, timeout: StdDuration::from_millis(50) }).await;

    assert_eq!(recorder.count("job:success"), 0);
    let job = store.find_by_id(job_id).await.unwrap().unwrap();
    assert_eq!(job.status, oj_core::JobStatus::Running);
}
