//! Time helpers for epoch-second quote timestamps.

use chrono::{DateTime, TimeZone, Utc};

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert seconds since the Unix epoch into a timestamp.
pub fn from_unix(secs: i64) -> Option<Timestamp> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Seconds elapsed since `secs`; negative when `secs` lies in the future.
pub fn age_seconds(secs: i64) -> i64 {
    now().timestamp() - secs
}
