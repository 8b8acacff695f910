//! Helper functions for cell value conversion
//!
//! Two renderings exist for temporal values: the display form used in
//! delimited text and spreadsheets (`2024-01-02 03:04:05+00:00`) and the
//! ISO-8601 form used in JSON (`2024-01-02T03:04:05Z`).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Timelike};

/// Convert a timezone-aware timestamp to its display string
///
/// Fractional seconds are printed only when non-zero.
pub fn timestamp_to_display(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.f%:z").to_string()
}

/// Convert a naive timestamp to its display string
pub fn naive_timestamp_to_display(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()
}

/// Convert a timezone-aware timestamp to an ISO 8601 string
///
/// Sub-second precision is truncated to milliseconds and a zero offset is
/// written as `Z`.
pub fn timestamp_to_iso_string(dt: &DateTime<FixedOffset>) -> String {
    let mut out = naive_timestamp_to_iso_string(&dt.naive_local());
    if dt.offset().local_minus_utc() == 0 {
        out.push('Z');
    } else {
        out.push_str(&dt.format("%:z").to_string());
    }
    out
}

/// Convert a naive timestamp to an ISO 8601 string without offset
pub fn naive_timestamp_to_iso_string(dt: &NaiveDateTime) -> String {
    let mut out = dt.format("%Y-%m-%dT%H:%M:%S").to_string();
    let millis = dt.nanosecond() / 1_000_000;
    if dt.nanosecond() != 0 {
        out.push_str(&format!(".{millis:03}"));
    }
    out
}

/// Convert a date to `YYYY-MM-DD`
pub fn date_to_iso_string(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Render a nested value as compact JSON
pub fn json_to_compact_string(value: &serde_json::Value) -> String {
    value.to_string()
}
