//! Line-protocol escaping.
//!
//! Measurement names, tag keys/values and field keys each have their own set
//! of delimiter characters that must be backslash-escaped before hitting the
//! wire. Escaping is idempotent: a delimiter already preceded by an odd
//! number of backslashes is left alone, so re-encoding a value never
//! double-escapes it.

/// Delimiters of tag keys, tag values and field keys.
pub const COMMA_EQ_SPACE: [char; 3] = [',', '=', ' '];

/// Delimiters of measurement names.
pub const COMMA_SPACE: [char; 2] = [',', ' '];

/// Delimiter of quoted field string values.
pub const DOUBLE_QUOTE: [char; 1] = ['"'];

/// Backslash-escapes every unescaped occurrence of the given delimiters.
pub fn escape(value: &str, delimiters: &[char]) -> String {
    let mut out = String::with_capacity(value.len());
    let mut backslashes = 0usize;
    for c in value.chars() {
        if c == '\\' {
            backslashes += 1;
            out.push(c);
            continue;
        }
        if backslashes % 2 == 0 && delimiters.contains(&c) {
            out.push('\\');
        }
        out.push(c);
        backslashes = 0;
    }
    out
}
