// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fan-out to subscribed listeners with per-listener fault isolation.

use super::{Event, EventListener};
use parking_lot::RwLock;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Fans an [`Event`] out to every subscribed [`EventListener`].
///
/// A listener that returns `Err` or panics never reaches the core: its
/// failure is logged and re-emitted as `scheduler:error` to the remaining
/// listeners. The bus holds no lock while invoking listeners, so a listener
/// may itself call [`EventBus::emit`] (e.g. in response to `job:fail`)
/// without deadlocking.
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn EventListener>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn EventListener>) {
        self.listeners.write().push(listener);
    }

    /// Emit `event` to every listener, never propagating a listener failure.
    pub fn emit(&self, event: Event) {
        tracing::debug!(kind = event.name(), job_id = ?event.job_id(), "event");
        self.dispatch(&event);
    }

    fn dispatch(&self, event: &Event) {
        let listeners: Vec<_> = self.listeners.read().clone();
        for listener in &listeners {
            if let Err(message) = invoke(listener, event) {
                tracing::warn!(%message, kind = event.name(), "listener failed");
                self.emit_scheduler_error(message);
            }
        }
    }

    fn emit_scheduler_error(&self, message: String) {
        // Deliver once to avoid recursing forever if a listener always
        // fails on scheduler:error itself.
        let listeners: Vec<_> = self.listeners.read().clone();
        let error_event = Event::SchedulerError { message };
        for listener in &listeners {
            let _ = invoke(listener, &error_event);
        }
    }
}

fn invoke(listener: &Arc<dyn EventListener>, event: &Event) -> Result<(), String> {
    match std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_event(event))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(err.0),
        Err(_) => Err("listener panicked".to_string()),
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
