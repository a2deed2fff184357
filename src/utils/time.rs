//! Time helpers.

use chrono::{DateTime, Local, SecondsFormat, Utc};

/// Layout the search API expects for window bounds.
pub const SEARCH_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn format_local(ts: &DateTime<Local>) -> String {
    ts.format(SEARCH_TIME_FORMAT).to_string()
}

pub fn now_timestamp_string() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
