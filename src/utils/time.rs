//! Timestamp parsing helpers.

use anyhow::{Context, Result};
use chrono::{NaiveDateTime, NaiveTime};

/// Parse the `time=` field of an audit line. Fractional seconds are
/// optional in older sftp-server builds.
pub fn parse_log_timestamp(ts: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(ts, "%Y-%m-%d %H:%M:%S%.f")
        .with_context(|| format!("Failed to parse log timestamp '{ts}'"))
}

/// Parse a 24-hour clock window bound such as `00:05:00`.
pub fn parse_window_time(ts: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(ts, "%H:%M:%S")
        .with_context(|| format!("Failed to parse window time '{ts}' (expected HH:MM:SS)"))
}
