//! Message timestamps.
//!
//! The original source defines a custom `std::chrono`-compatible clock
//! (`MessageClock`) storing microseconds since the Unix epoch as a `u64`,
//! plus a `seconds(time_point)` conversion to `f64`. Rust's `std::time` has
//! no equivalent extension point for a custom `Clock`, and none is needed
//! internally, so the port represents a timestamp as a plain `u64`
//! microsecond count (see `SPEC_FULL.md` §9).
use std::time::{SystemTime, UNIX_EPOCH};

/// Microseconds since the Unix epoch.
pub type TimestampUs = u64;

/// The current time as a [`TimestampUs`].
pub fn now() -> TimestampUs {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before Unix epoch")
        .as_micros() as u64
}

/// Converts a [`TimestampUs`] to fractional seconds since the epoch, the
/// representation the numerical equations (state/output/threshold
/// equations, UKF, Monte-Carlo) operate on.
pub fn as_seconds(ts: TimestampUs) -> f64 {
    ts as f64 / 1_000_000.0
}

/// Converts fractional seconds since the epoch back to a [`TimestampUs`].
pub fn from_seconds(seconds: f64) -> TimestampUs {
    (seconds * 1_000_000.0).round() as u64
}
