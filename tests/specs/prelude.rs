// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared scaffolding for the workspace-level end-to-end specs: an event
//! recorder, a couple of canned handlers, and a `wait_for` poll helper for
//! the scenarios that must observe real wall-clock timing (cron/interval
//! drift) rather than a `FakeClock`.

#![allow(dead_code)]

use oj_core::{Event, EventBus, EventListener, Handler, HandlerError, HandlerRegistry, Job, ListenerError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Generous upper bound most of these specs poll against; keeps CI from
/// hanging if a scenario regresses instead of failing fast.
pub const SPEC_WAIT_MAX_MS: u64 = 5_000;

/// Poll `predicate` every 10ms until it returns `true` or `max_ms` elapses.
pub async fn wait_for<F>(max_ms: u64, mut predicate: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_millis(max_ms);
    loop {
        if predicate() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// An [`EventListener`] that records every event's wire name, in order.
pub struct RecordingListener {
    seen: std::sync::Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { seen: std::sync::Mutex::new(Vec::new()) })
    }

    pub fn names(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| n.as_str() == name).count()
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, event: &Event) -> Result<(), ListenerError> {
        self.seen.lock().unwrap().push(event.name().to_string());
        Ok(())
    }
}

/// Fresh event bus with a [`RecordingListener`] already attached.
pub fn events_with_recorder() -> (Arc<EventBus>, Arc<RecordingListener>) {
    let bus = Arc::new(EventBus::new());
    let recorder = RecordingListener::new();
    bus.subscribe(recorder.clone());
    (bus, recorder)
}

/// A handler that always succeeds.
pub fn ok_handler() -> Handler {
    Arc::new(|_job: Job| Box::pin(async move { Ok(()) }))
}

/// A handler that always fails with `message`.
pub fn failing_handler(message: &'static str) -> Handler {
    Arc::new(move |_job: Job| Box::pin(async move { Err(HandlerError::new(message)) }))
}

/// A handler that counts invocations and sleeps `delay` before returning
/// success, used by the cron/interval drift specs.
pub fn counting_slow_handler(delay: Duration) -> (Handler, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counted = count.clone();
    let handler: Handler = Arc::new(move |_job: Job| {
        let count = counted.clone();
        Box::pin(async move {
            count.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(())
        })
    });
    (handler, count)
}

/// Records the `Instant` of every invocation, used by the drift specs to
/// measure the gap between successive executions.
pub fn timestamping_handler(delay: Duration) -> (Handler, Arc<Mutex<Vec<tokio::time::Instant>>>) {
    let timestamps = Arc::new(Mutex::new(Vec::new()));
    let recorded = timestamps.clone();
    let handler: Handler = Arc::new(move |_job: Job| {
        let timestamps = recorded.clone();
        Box::pin(async move {
            timestamps.lock().await.push(tokio::time::Instant::now());
            tokio::time::sleep(delay).await;
            Ok(())
        })
    });
    (handler, timestamps)
}

pub fn handlers_with(name: &str, handler: Handler) -> HandlerRegistry {
    let registry = HandlerRegistry::new();
    registry.register(name, handler);
    registry
}
