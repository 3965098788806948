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

/// Unlike a cron repeat, a fixed-interval repeat reschedules from
/// completion time, so a handler that takes real time to run adds that
/// time on top of the nominal period: successive runs drift later by
/// roughly the handler's own duration.
#[tokio::test]
async fn interval_repeat_drifts_by_handler_duration() {
    let store = Arc::new(InMemoryJobStore::new());
    let (events, recorder) = events_with_recorder();
    let (handler, timestamps) = timestamping_handler(StdDuration::from_millis(180));
    let handlers = handlers_with("poll-feed", handler);

    let job = JobBuilder::default()
        .name("poll-feed")
        .repeat(RepeatSpec::Every { ms: 200 })
        .build();
    store.create(job).await.unwrap();

    let supervisor = Supervisor::new(store.clone(), handlers, events, SystemClock, fast_config("interval-spec"));
    supervisor.start().await.unwrap();

    assert!(wait_for(3_500, || recorder.count("job:complete") >= 3).await);
    supervisor.stop(StopOptions { graceful: true, timeout: StdDuration::from_millis(500) }).await;

    let seen = timestamps.lock().await.clone();
    assert!(seen.len() >= 3, "expected at least 3 runs, saw {}", seen.len());

    for pair in seen.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        // Nominal period is 200ms; the handler itself takes ~180ms, so each
        // gap should land near 380ms rather than snapping back to 200ms.
        assert!(
            gap >= StdDuration::from_millis(340),
            "expected drift past the nominal 200ms period, saw gap {gap:?}"
        );
    }
}
