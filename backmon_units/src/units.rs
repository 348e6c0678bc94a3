//! Parsing of human-formatted size and duration values ("10GiB",
//! "1h 30m", "5 GB") into their base unit (bytes or seconds).

use std::sync::OnceLock;

use regex::Regex;

use crate::{Error, Result};

fn pair_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(-?\d+(?:\.\d+)?)([a-zA-Z]+)?").expect("valid regex"))
}

fn leading_unit_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\D+)").expect("valid regex"))
}

fn int_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+$").expect("valid regex"))
}

fn float_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+\.\d+$").expect("valid regex"))
}

/// Multiplier to the base unit (bytes or seconds), looked up by the
/// lowercased unit name. `no type` is the implicit unit of bare numbers.
fn multiplier(unit: &str) -> Option<f64> {
    let m = match unit {
        "no type" => 1.0,

        // data, assumed bytes rather than bits
        "b" => 1.0,
        "k" | "kib" => (1u64 << 10) as f64,
        "kb" => 1e3,
        "mib" => (1u64 << 20) as f64,
        "mb" => 1e6,
        "g" | "gib" => (1u64 << 30) as f64,
        "gb" => 1e9,
        "t" | "tib" => (1u64 << 40) as f64,
        "tb" => 1e12,

        // time
        "second(s)" | "second" | "s" => 1.0,
        "min(s)" | "m" => 60.0,
        "hour(s)" | "h" => 3600.0,
        "d" => 86_400.0,
        "w" => 604_800.0,

        _ => return None,
    };
    Some(m)
}

fn parse_number(value: &str) -> Result<f64> {
    if int_re().is_match(value) {
        value
            .parse::<i64>()
            .map(|i| i as f64)
            .map_err(|_| Error::NotNumeric(value.to_string()))
    } else if float_re().is_match(value) {
        value
            .parse::<f64>()
            .map_err(|_| Error::NotNumeric(value.to_string()))
    } else {
        Err(Error::NotNumeric(value.to_string()))
    }
}

fn lookup_multiplier(unit: &str, input: &str) -> Result<f64> {
    multiplier(&unit.to_lowercase()).ok_or_else(|| Error::UnrecognizedUnit {
        unit: unit.to_string(),
        input: input.to_string(),
    })
}

/// Parses a human-formatted value into its base unit, splitting on a single
/// space. See [`parse_unit_delim`].
pub fn parse_unit(data: &str, given_unit: Option<&str>) -> Result<Option<i64>> {
    parse_unit_delim(data, given_unit, " ")
}

/// Parses a human-formatted value into its base unit (bytes or seconds).
///
/// The input is split on `delimiter`; each token is either one or more
/// `<number><unit>` segments ("10GiB", "1h30m"), a bare number followed by
/// a separate unit token ("10 GB"), or a bare number (multiplier 1).
/// Segments and tokens accumulate by summation, and the result is rounded
/// to the nearest integer.
///
/// Empty input and the literal `"null"` yield `Ok(None)`. Specify
/// `given_unit` only when the unit is not part of the data itself.
pub fn parse_unit_delim(
    data: &str,
    given_unit: Option<&str>,
    delimiter: &str,
) -> Result<Option<i64>> {
    if data.is_empty() || data == "null" {
        return Ok(None);
    }

    let parts: Vec<&str> = data.split(delimiter).map(|part| part.trim()).collect();

    let mut i = 0;
    let mut total = 0.0_f64;

    while i < parts.len() {
        let token = parts[i];
        i += 1;

        if let Some(given) = given_unit {
            total += parse_number(token)? * lookup_multiplier(given, data)?;
            continue;
        }

        if int_re().is_match(token) || float_re().is_match(token) {
            // bare number; the unit may follow as its own token
            let mut unit = "no type".to_string();
            if let Some(next) = parts.get(i) {
                if let Some(caps) = leading_unit_re().captures(next) {
                    unit = caps[1].to_string();
                    i += 1;
                }
            }
            total += parse_number(token)? * lookup_multiplier(&unit, data)?;
            continue;
        }

        // one or more embedded number/unit segments ("10GiB", "1h30m")
        let mut matched = 0;
        for caps in pair_re().captures_iter(token) {
            let number = parse_number(&caps[1])?;
            let unit = caps.get(2).map_or("no type", |m| m.as_str());
            total += number * lookup_multiplier(unit, data)?;
            matched += caps.get(0).map_or(0, |m| m.as_str().len());
        }
        if matched != token.len() {
            return Err(Error::NotNumeric(token.to_string()));
        }
    }

    Ok(Some(total.round() as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_numbers_pass_through() {
        assert_eq!(parse_unit("42", None).unwrap(), Some(42));
        assert_eq!(parse_unit("13.37", None).unwrap(), Some(13));
    }

    #[test]
    fn empty_and_null_are_none() {
        assert_eq!(parse_unit("", None).unwrap(), None);
        assert_eq!(parse_unit("null", None).unwrap(), None);
    }

    #[test]
    fn binary_and_decimal_sizes() {
        assert_eq!(parse_unit("10GiB", None).unwrap(), Some(10 * (1 << 30)));
        assert_eq!(parse_unit("10GB", None).unwrap(), Some(10_000_000_000));
        assert_eq!(parse_unit("3k", None).unwrap(), Some(3 * 1024));
        assert_eq!(parse_unit("1.5kb", None).unwrap(), Some(1500));
    }

    #[test]
    fn detached_unit_token() {
        assert_eq!(parse_unit("10 GB", None).unwrap(), Some(10_000_000_000));
        assert_eq!(parse_unit("5 s", None).unwrap(), Some(5));
    }

    #[test]
    fn compound_tokens_accumulate() {
        assert_eq!(parse_unit("1h 30m", None).unwrap(), Some(5400));
        assert_eq!(parse_unit("1h30m", None).unwrap(), Some(5400));
        // pre-split compound literals sum token by token
        assert_eq!(
            parse_unit_delim("1:30", Some("m"), ":").unwrap(),
            Some(31 * 60)
        );
    }

    #[test]
    fn given_unit_applies_to_every_token() {
        assert_eq!(parse_unit("90", Some("s")).unwrap(), Some(90));
        assert_eq!(parse_unit("2", Some("GiB")).unwrap(), Some(2 * (1 << 30)));
    }

    #[test]
    fn unknown_unit_fails() {
        let err = parse_unit("5xyz", None).unwrap_err();
        assert!(matches!(err, Error::UnrecognizedUnit { .. }));
    }

    #[test]
    fn non_numeric_value_fails() {
        let err = parse_unit("abc GB", None).unwrap_err();
        assert!(matches!(err, Error::NotNumeric(_)));
    }
}
