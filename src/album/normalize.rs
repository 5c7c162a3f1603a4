//! Pure field-normalization helpers shared by the loader and the sync engine.

use chrono::{TimeZone, Utc};
use plist::Value;

/// Seconds between the UNIX epoch (1970-01-01) and the Apple epoch
/// (2001-01-01), the origin iPhoto timer intervals are measured from.
pub const UNIX_EPOCH_ADJUSTMENT: i64 = 978_307_200;

/// Sentinel emitted for absent timestamps so date columns never hold NULL.
pub const ZERO_TIMESTAMP: &str = "0000-00-00 00:00:00";

/// Convert an Apple timer interval to UNIX epoch seconds.
///
/// Timer intervals carry fractional seconds; those are dropped by flooring.
/// Pre-2001 dates are stored as negative intervals and convert cleanly.
pub fn epoch_convert(timer: f64) -> i64 {
    (UNIX_EPOCH_ADJUSTMENT as f64 + timer).floor() as i64
}

/// Coerce any of iPhoto's boolean encodings to a real bool.
///
/// Only the literal string `"YES"`, boolean `true`, and integer `1` are
/// truthy. Anything else — including an absent value — degrades to `false`
/// without raising.
pub fn coerce_boolean(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Boolean(b)) => *b,
        Some(Value::String(s)) => s == "YES",
        Some(Value::Integer(n)) => n.as_signed() == Some(1),
        _ => false,
    }
}

/// Format epoch seconds as `"YYYY-MM-DD HH:MM:SS"` (UTC).
///
/// An absent timestamp yields [`ZERO_TIMESTAMP`] rather than an error;
/// generic quoting at the store boundary rules out SQL date functions, so
/// the string form is computed here.
pub fn format_timestamp(epoch: Option<i64>) -> String {
    match epoch.and_then(|secs| Utc.timestamp_opt(secs, 0).single()) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => ZERO_TIMESTAMP.to_string(),
    }
}

/// Read an integer field, accepting the string-encoded form iPhoto uses
/// for id lists and dictionary keys.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(n) => n.as_signed(),
        Value::Real(f) => Some(*f as i64),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Read a float field, accepting integer and string encodings.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Real(f) => Some(*f),
        Value::Integer(n) => n.as_signed().map(|v| v as f64),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Read a string field.
pub fn as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}
