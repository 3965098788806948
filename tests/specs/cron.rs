// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::prelude::*;
use oj_core::{JobBuilder, RepeatSpec, StopOptions, Supervisor, SupervisorConfig, SystemClock};
use oj_storage::InMemoryJobStore;
use std::sync::Arc;
use std::time::Duration as StdDuration;

fn fast_config(id: &str) -> SupervisorConfig {
    let mut config = SupervisorConfig::new(id, 1);
    config.poll_interval = chrono::Duration::milliseconds(10);
    config.lock_timeout = chrono::Duration::seconds(5);
    config
}

/// A cron repeat reschedules itself from its own previous slot rather than
/// from completion time, so a handler that takes noticeably less time than
/// the cron period does not accumulate drift across runs.
#[tokio::test]
async fn cron_repeat_does_not_drift_across_runs() {
    let store = Arc::new(InMemoryJobStore::new());
    let (events, recorder) = events_with_recorder();
    let (handler, timestamps) = timestamping_handler(StdDuration::from_millis(60));
    let handlers = handlers_with("tick", handler);

    let job = JobBuilder::default()
        .name("tick")
        .repeat(RepeatSpec::Cron { expression: "* * * * * *".to_string(), timezone: None })
        .build();
    store.create(job).await.unwrap();

    let supervisor = Supervisor::new(store.clone(), handlers, events, SystemClock, fast_config("cron-spec"));
    supervisor.start().await.unwrap();

    assert!(wait_for(3_500, || recorder.count("job:complete") >= 3).await);
    supervisor.stop(StopOptions { graceful: true, timeout: StdDuration::from_millis(500) }).await;

    let seen = timestamps.lock().await.clone();
    assert!(seen.len() >= 3, "expected at least 3 ticks, saw {}", seen.len());

    for pair in seen.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(
            gap >= StdDuration::from_millis(800) && gap <= StdDuration::from_millis(1300),
            "cron gap {gap:?} drifted away from the 1s period"
        );
    }
}

/// A cron job whose handler runs longer than its own period never catches
/// up on missed slots: it re-arms to the next future slot instead of
/// queueing every slot it slept through.
#[tokio::test]
async fn cron_repeat_skips_missed_slots_instead_of_backlogging() {
    let store = Arc::new(InMemoryJobStore::new());
    let (events, recorder) = events_with_recorder();
    let (handler, count) = counting_slow_handler(StdDuration::from_millis(2_200));
    let handlers = handlers_with("slow-tick", handler);

    let job = JobBuilder::default()
        .name("slow-tick")
        .repeat(RepeatSpec::Cron { expression: "* * * * * *".to_string(), timezone: None })
        .build();
    store.create(job).await.unwrap();

    let supervisor = Supervisor::new(store.clone(), handlers, events, SystemClock, fast_config("cron-skip-spec"));
    supervisor.start().await.unwrap();

    tokio::time::sleep(StdDuration::from_millis(4_800)).await;
    supervisor.stop(StopOptions { graceful: true, timeout: StdDuration::from_millis(500) }).await;

    // ~4.8s of wall time against a handler that takes 2.2s: had every missed
    // second-tick been queued this would be well over a dozen runs instead
    // of roughly two.
    let runs = count.load(std::sync::atomic::Ordering::SeqCst);
    assert!(runs >= 1 && runs <= 3, "expected missed slots to be skipped, saw {runs} runs");
    assert_eq!(recorder.count("job:complete"), runs);
}
