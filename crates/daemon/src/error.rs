// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup-time errors for the `jobsd` binary. Only errors raised while
//! constructing the store or starting the supervisor surface to the caller;
//! everything past `Supervisor::start()` is handled inside the core and only
//! ever observed through events or logs.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] oj_core::ConfigError),

    #[error("failed to connect to MongoDB at {uri}: {source}")]
    MongoConnect { uri: String, #[source] source: mongodb::error::Error },

    #[error("failed to initialize job store: {0}")]
    Store(#[from] oj_core::StoreError),
}
