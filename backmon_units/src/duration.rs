//! InfluxDB duration literal validation and canonicalization.
//!
//! The server reports retention policy durations in `{h}h{m}m{s}s` form, so
//! declared durations are canonicalized to the same shape to make the
//! reconciler's equality check meaningful.

use std::sync::OnceLock;

use regex::Regex;

use crate::units::parse_unit;
use crate::{Error, Result};

fn literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+(?:[uµsmhdw]|ns|ms))+$").expect("valid regex"))
}

fn strict_literal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+[smhdw])+$").expect("valid regex"))
}

fn part_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+)([a-z]+)").expect("valid regex"))
}

/// Whether `value` is a well-formed InfluxDB time literal, including the
/// sub-second units accepted in RESAMPLE clauses.
pub fn check_time_literal(value: &str) -> bool {
    literal_re().is_match(value)
}

/// Canonicalizes a duration literal of the form `(\d+[smhdw])+` into
/// `{h}h{m}m{s}s`. The case-insensitive literal `"INF"` maps to `"0s"`
/// (no purge). Anything else fails with [`Error::InvalidDuration`].
///
/// Idempotent: the canonical form is itself a valid input.
pub fn transform_time_literal(value: &str) -> Result<String> {
    if !strict_literal_re().is_match(value) {
        if value.eq_ignore_ascii_case("inf") {
            return Ok("0s".to_string());
        }
        return Err(Error::InvalidDuration(value.to_string()));
    }

    let mut total_secs: i64 = 0;
    for caps in part_re().captures_iter(value) {
        total_secs += parse_unit(&caps[1], Some(&caps[2]))?.unwrap_or(0);
    }

    // zero canonicalizes to the server's spelling for "keep forever"
    if total_secs == 0 {
        return Ok("0s".to_string());
    }

    let hours = total_secs / 3600;
    let mins = (total_secs % 3600) / 60;
    let secs = total_secs % 60;
    Ok(format!("{hours}h{mins}m{secs}s"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_check() {
        assert!(check_time_literal("90d"));
        assert!(check_time_literal("1h30m"));
        assert!(check_time_literal("500ms"));
        assert!(!check_time_literal("90"));
        assert!(!check_time_literal("d90"));
        assert!(!check_time_literal(""));
    }

    #[test]
    fn canonical_form() {
        assert_eq!(transform_time_literal("90d").unwrap(), "2160h0m0s");
        assert_eq!(transform_time_literal("1h30m").unwrap(), "1h30m0s");
        assert_eq!(transform_time_literal("56w").unwrap(), "9408h0m0s");
        assert_eq!(transform_time_literal("61s").unwrap(), "0h1m1s");
    }

    #[test]
    fn inf_is_zero_seconds() {
        assert_eq!(transform_time_literal("INF").unwrap(), "0s");
        assert_eq!(transform_time_literal("inf").unwrap(), "0s");
        assert_eq!(transform_time_literal("0s").unwrap(), "0s");
    }

    #[test]
    fn canonicalization_is_idempotent() {
        for literal in ["90d", "14d", "28w", "1h30m", "7d"] {
            let once = transform_time_literal(literal).unwrap();
            let twice = transform_time_literal(&once).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn rejects_bare_numbers_and_unknown_units() {
        assert!(matches!(
            transform_time_literal("90"),
            Err(Error::InvalidDuration(_))
        ));
        assert!(matches!(
            transform_time_literal("10y"),
            Err(Error::InvalidDuration(_))
        ));
        // sub-second units pass the loose check but not the strict one
        assert!(matches!(
            transform_time_literal("500ms"),
            Err(Error::InvalidDuration(_))
        ));
    }
}
