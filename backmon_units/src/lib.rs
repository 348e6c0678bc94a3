//! Leaf value-parsing utilities shared across the backmon workspace:
//! human-formatted size/duration strings, InfluxDB duration literals and
//! epoch timestamp normalization.

mod duration;
mod timestamp;
mod units;

pub use duration::{check_time_literal, transform_time_literal};
pub use timestamp::{now_epoch_secs, to_epoch_secs, CAPTURE_TIME_KEY};
pub use units::{parse_unit, parse_unit_delim};

/// Primary error type for unit and literal parsing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unrecognized unit `{unit}` in `{input}`")]
    UnrecognizedUnit { unit: String, input: String },

    #[error("value `{0}` is not numeric")]
    NotNumeric(String),

    #[error("`{0}` is not a valid duration literal")]
    InvalidDuration(String),

    #[error("unsupported timestamp type: {0}")]
    UnsupportedTimestampType(serde_json::Value),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
