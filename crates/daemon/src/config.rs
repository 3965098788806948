// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-sourced configuration for the `jobsd` binary.
//!
//! Every field has a documented default and is overridable by a single
//! environment variable; there is no config-file layer.

use oj_core::ConfigError;

const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
const DEFAULT_MONGODB_DATABASE: &str = "oddjobs";
const DEFAULT_POLL_INTERVAL_MS: i64 = 1000;
const DEFAULT_LOCK_TIMEOUT_MS: i64 = 30_000;
const DEFAULT_WORKER_COUNT: usize = 4;

/// Process-wide configuration for a `jobsd` instance.
#[derive(Debug, Clone)]
pub struct Config {
    pub mongodb_uri: String,
    pub mongodb_database: String,
    pub jobs_collection: String,
    pub poll_interval_ms: i64,
    pub lock_timeout_ms: i64,
    pub worker_count: usize,
    pub default_timezone: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// documented defaults for anything unset.
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            mongodb_uri: env_or("MONGODB_URI", DEFAULT_MONGODB_URI),
            mongodb_database: env_or("MONGODB_DATABASE", DEFAULT_MONGODB_DATABASE),
            jobs_collection: env_or("MONGODB_JOBS_COLLECTION", "jobs"),
            poll_interval_ms: env_parsed("POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS)?,
            lock_timeout_ms: env_parsed("LOCK_TIMEOUT_MS", DEFAULT_LOCK_TIMEOUT_MS)?,
            worker_count: env_parsed("WORKER_COUNT", DEFAULT_WORKER_COUNT as i64)?.max(1) as usize,
            default_timezone: std::env::var("DEFAULT_TIMEZONE").ok(),
        })
    }
}

fn env_or(key: &'static str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Err(_) => Ok(default),
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.clone(),
            reason: "expected an integer".to_string(),
        }),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
