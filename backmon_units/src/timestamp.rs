//! Epoch timestamp normalization.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::{Error, Result};

/// Name of the synthetic client-side capture timestamp column, attached to
/// rows that carry no domain timestamp of their own.
pub const CAPTURE_TIME_KEY: &str = "backmonCaptureTimestampS";

/// Anything at or above this magnitude is assumed to be in ms (or finer)
/// precision and is scaled down. A legitimately large far-future
/// second-precision timestamp would be misinterpreted; the threshold is
/// kept as-is for wire compatibility.
const MS_MAGNITUDE_LIMIT: f64 = 99_999_999_999.0;

/// The current wall-clock time as epoch seconds.
pub fn now_epoch_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Converts a timestamp in any epoch precision into epoch seconds.
///
/// Accepts integers, floats and numeric strings. Sub-second precisions are
/// detected by magnitude, not by a declared unit: the value is divided by
/// 1000 until it drops below the ms threshold.
pub fn to_epoch_secs(value: &Value) -> Result<i64> {
    let mut ts: f64 = match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if (i as f64) < MS_MAGNITUDE_LIMIT {
                    return Ok(i);
                }
                i as f64
            } else {
                n.as_f64()
                    .ok_or_else(|| Error::UnsupportedTimestampType(value.clone()))?
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if let Ok(i) = trimmed.parse::<i64>() {
                i as f64
            } else if let Ok(f) = trimmed.parse::<f64>() {
                f
            } else {
                return Err(Error::UnsupportedTimestampType(value.clone()));
            }
        }
        _ => return Err(Error::UnsupportedTimestampType(value.clone())),
    };

    while ts >= MS_MAGNITUDE_LIMIT {
        ts /= 1000.0;
    }

    Ok(ts as i64)
}
