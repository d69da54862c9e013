//! Timestamp utilities

use chrono::{DateTime, Local, Utc};

/// Date format used in templates and filenames
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Time format used in templates
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds since the Unix epoch
pub fn unix_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Convert milliseconds to duration
pub fn millis_to_duration(millis: u64) -> std::time::Duration {
    std::time::Duration::from_millis(millis)
}

/// Local calendar date of `at`, e.g. `2024-05-01`
pub fn format_date(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(DATE_FORMAT).to_string()
}

/// Local wall-clock time of `at`, e.g. `14:03:59`
pub fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format(TIME_FORMAT).to_string()
}

/// Time-of-day safe for filenames, e.g. `14-03-59`
pub fn format_time_for_filename(at: DateTime<Utc>) -> String {
    format_time(at).replace(':', "-")
}
