// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job handler registration.
//!
//! A handler is an async closure over a [`Job`]; handlers are registered
//! dynamically by job `name` in a [`HandlerRegistry`] rather than bound to a
//! type at compile time, so embedding code can wire up job kinds at
//! startup.

use crate::error::HandlerError;
use crate::job::Job;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A handler's return future, boxed so [`Handler`] stays `Clone + Send +
/// Sync + 'static` without generics leaking into the worker loop.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), HandlerError>> + Send>>;

/// A registered job handler: receives a snapshot of the job record at
/// acquisition time, may perform arbitrary I/O, and signals failure by
/// resolving to `Err`.
pub type Handler = Arc<dyn Fn(Job) -> HandlerFuture + Send + Sync>;

/// Maps job `name` to the handler that executes it.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<parking_lot::RwLock<HashMap<String, Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the handler for `name`.
    pub fn register(&self, name: impl Into<String>, handler: Handler) {
        self.handlers.write().insert(name.into(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Handler> {
        self.handlers.read().get(name).cloned()
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
