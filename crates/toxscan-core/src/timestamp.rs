//! Epoch timestamp normalization
//!
//! Converts epoch seconds into a `YYYY-MM-DD` UTC date. Invalid input never
//! fails the caller: [`normalize`] substitutes [`INVALID_DATE`].

use chrono::DateTime;
use serde_json::Value;
use tracing::warn;

/// Sentinel returned for timestamps that cannot be represented as a date
pub const INVALID_DATE: &str = "Invalid Date";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Reasons an epoch value cannot be turned into a date
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TimestampError {
    #[error("timestamp is not a finite number: {0}")]
    NotFinite(f64),

    #[error("timestamp {0} is outside the representable date range")]
    OutOfRange(f64),

    #[error("timestamp is not numeric: {0}")]
    NonNumeric(String),
}

/// Convert epoch seconds to a UTC calendar date
pub fn try_normalize(epoch_seconds: f64) -> Result<String, TimestampError> {
    if !epoch_seconds.is_finite() {
        return Err(TimestampError::NotFinite(epoch_seconds));
    }

    let secs = epoch_seconds.floor();
    // i64::MAX as f64 rounds up to 2^63, so the upper bound is exclusive.
    if secs < i64::MIN as f64 || secs >= i64::MAX as f64 {
        return Err(TimestampError::OutOfRange(epoch_seconds));
    }

    let nanos = ((epoch_seconds - secs) * 1e9).min(999_999_999.0) as u32;
    DateTime::from_timestamp(secs as i64, nanos)
        .map(|dt| dt.format(DATE_FORMAT).to_string())
        .ok_or(TimestampError::OutOfRange(epoch_seconds))
}

/// Convert epoch seconds to a UTC calendar date, or [`INVALID_DATE`]
pub fn normalize(epoch_seconds: f64) -> String {
    try_normalize(epoch_seconds).unwrap_or_else(|e| {
        warn!(error = %e, "Invalid date value");
        INVALID_DATE.to_string()
    })
}

/// Normalize a timestamp read from a stored document.
///
/// A missing value is treated as epoch 0. Numbers and numeric strings are
/// converted, anything else yields [`INVALID_DATE`].
pub fn normalize_value(value: Option<&Value>) -> String {
    let epoch = match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| TimestampError::NonNumeric(n.to_string())),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| TimestampError::NonNumeric(s.clone())),
        Some(other) => Err(TimestampError::NonNumeric(other.to_string())),
    };

    match epoch {
        Ok(secs) => normalize(secs),
        Err(e) => {
            warn!(error = %e, "Invalid date value");
            INVALID_DATE.to_string()
        }
    }
}
