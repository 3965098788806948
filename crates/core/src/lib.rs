// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! oj-core: the scheduling core of the Odd Jobs (oj) distributed job
//! scheduler — job records, the [`store::JobStore`] contract, repeat and
//! retry planning, the worker control loop, and the supervisor that runs a
//! pool of workers against a store.
//!
//! Persistence implementations (in-memory and Mongo-backed) live in
//! `oj-storage`; this crate only depends on the [`store::JobStore`] trait.

pub mod macros;

pub mod clock;
pub mod error;
pub mod event;
pub mod handler;
pub mod id;
pub mod job;
pub mod jobspec;
pub mod repeat;
pub mod retry;
pub mod store;
pub mod supervisor;
#[cfg(test)]
pub(crate) mod test_support;
pub mod worker;

pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{ConfigError, HandlerError, ListenerError, StoreError};
pub use event::{Event, EventBus, EventListener};
pub use handler::{Handler, HandlerFuture, HandlerRegistry};
#[cfg(any(test, feature = "test-support"))]
pub use job::JobBuilder;
pub use job::{Job, JobId, JobStatus, RepeatSpec, RetryDelay, RetrySpec};
pub use jobspec::{JobRequest, JobSpec, ValidationError};
pub use repeat::PlanError;
pub use retry::RetryDecision;
pub use store::{JobStore, LockParams};
pub use supervisor::{StopOptions, Supervisor, SupervisorConfig};
pub use worker::{Worker, WorkerConfig, WorkerError, WorkerId};
