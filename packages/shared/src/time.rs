//! Wall-clock helpers behind a small trait so tests can pin time.

use chrono::{DateTime, SecondsFormat, Utc};

/// Source of "now" as Unix milliseconds (UTC).
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Reads the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        unix_millis()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    fixed_millis: i64,
}

impl FixedClock {
    pub fn new(fixed_millis: i64) -> Self {
        Self { fixed_millis }
    }
}

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.fixed_millis
    }
}

/// Current Unix timestamp in milliseconds (UTC).
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Render Unix milliseconds as RFC 3339 (UTC, millisecond precision).
///
/// Out-of-range values fall back to the raw number so callers can log them
/// without a fallible path.
pub fn millis_to_rfc3339(timestamp_millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(timestamp_millis) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => timestamp_millis.to_string(),
    }
}
