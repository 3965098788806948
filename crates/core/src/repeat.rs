// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pure next-run-instant computation for repeating jobs.
//!
//! Cron expressions are evaluated in an IANA timezone via `chrono-tz`, which
//! keeps DST transitions correct without the caller having to reason about
//! offsets. Interval repeats are a plain addition with a floor to prevent a
//! misconfigured `every: 0` from busy-looping the worker.

use crate::job::RepeatSpec;
use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;
use thiserror::Error;

/// The shortest interval a fixed-interval repeat may use.
const MIN_INTERVAL: Duration = Duration::milliseconds(100);

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("invalid cron expression {expression:?}: {source}")]
    InvalidCron { expression: String, #[source] source: cron::error::Error },
    #[error("unknown IANA timezone {0:?}")]
    InvalidTimezone(String),
    #[error("cron schedule has no occurrence after the given base instant")]
    NoUpcomingOccurrence,
}

/// Compute the next eligible run instant strictly after `base`.
///
/// For `Every`, this is simply `base + max(every, 100ms)`. For `Cron`, this
/// is the first schedule slot strictly after `base`, evaluated in
/// `spec`'s own timezone, falling back to `default_timezone`, falling back
/// to UTC. Callers wanting to skip multiple missed slots must call this
/// repeatedly, feeding each result back in as `base` (see the worker's
/// cron pre-scheduling loop).
pub fn next_run_at(
    spec: &RepeatSpec,
    base: DateTime<Utc>,
    default_timezone: Option<&str>,
) -> Result<DateTime<Utc>, PlanError> {
    match spec {
        RepeatSpec::Every { ms } => {
            let interval = Duration::milliseconds(*ms).max(MIN_INTERVAL);
            Ok(base + interval)
        }
        RepeatSpec::Cron { expression, timezone } => {
            let tz_name = timezone.as_deref().or(default_timezone).unwrap_or("UTC");
            let tz: Tz = Tz::from_str(tz_name)
                .map_err(|_| PlanError::InvalidTimezone(tz_name.to_string()))?;
            let normalized = normalize_cron_expression(expression);
            let schedule = Schedule::from_str(&normalized).map_err(|source| PlanError::InvalidCron {
                expression: expression.clone(),
                source,
            })?;
            let base_in_tz = base.with_timezone(&tz);
            schedule
                .after(&base_in_tz)
                .next()
                .map(|next| next.with_timezone(&Utc))
                .ok_or(PlanError::NoUpcomingOccurrence)
        }
    }
}

/// The `cron` crate's `Schedule::from_str` only accepts 6-field expressions
/// (leading seconds); the dialect this scheduler exposes to callers is the
/// standard 5-field form with an optional 6-field extension (§6). A
/// 5-field expression is widened to 6 fields by prepending a `0` seconds
/// field, so `"*/5 * * * *"` behaves exactly like `"0 */5 * * * *"`.
fn normalize_cron_expression(expression: &str) -> std::borrow::Cow<'_, str> {
    match expression.split_whitespace().count() {
        5 => std::borrow::Cow::Owned(format!("0 {expression}")),
        _ => std::borrow::Cow::Borrowed(expression),
    }
}

#[cfg(test)]
#[path = "repeat_tests.rs"]
mod tests;
