//! Timestamp helpers. Frame timestamps are nanoseconds.

pub const NS_PER_US: i64 = 1_000;
pub const NS_PER_MS: i64 = 1_000_000;

/// Nanoseconds to whole milliseconds, truncating toward zero.
pub fn ns_to_ms(ns: i64) -> i64 {
    ns / NS_PER_MS
}

/// Whole milliseconds between two timestamps.
pub fn timestamp_diff_ms(first: i64, last: i64) -> i64 {
    ns_to_ms(last.saturating_sub(first))
}

/// Time of `ts` relative to `origin` in milliseconds, at microsecond precision.
pub fn elapsed_ms(ts: i64, origin: i64) -> f64 {
    (ts.saturating_sub(origin) / NS_PER_US) as f64 / 1000.0
}
