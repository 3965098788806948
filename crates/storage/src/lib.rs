// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! oj-storage: the two [`oj_core::JobStore`] implementations the scheduler
//! ships with — [`InMemoryJobStore`] for tests and single-process use, and
//! [`MongoJobStore`] for a shared deployment. Both satisfy the same
//! eligibility, ownership, and concurrency-cap contracts; see
//! `oj_core::store` for the contract itself.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod in_memory;
pub mod mongo;

pub use in_memory::InMemoryJobStore;
pub use mongo::MongoJobStore;
