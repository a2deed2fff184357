//! Utility modules
//!
//! Provides time formatting and per-run log suppression helpers.

pub mod log_rate_limiter;
pub mod time;

pub use log_rate_limiter::LogRateLimiter;
pub use time::{format_local, now_timestamp_string};
