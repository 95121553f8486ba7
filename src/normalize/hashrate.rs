//! Hashrate strings with SI unit suffixes (`"2.5M"`, `"370u"`, `"1e3"`).

use super::decimal::{canonical_integer, is_bare_integer, Decimal};

/// Maps a unit suffix to its power of ten.
fn unit_exponent(unit: char) -> Option<i32> {
    match unit {
        'Z' => Some(21),
        'E' => Some(18),
        'P' => Some(15),
        'T' => Some(12),
        'G' => Some(9),
        'M' => Some(6),
        'k' | 'K' => Some(3),
        'm' => Some(-3),
        'u' | 'µ' => Some(-6),
        _ => None,
    }
}

/// Splits a trailing unit suffix off, returning the mantissa and its power
/// of ten (zero when unsuffixed).
fn split_unit(value: &str) -> (&str, i32) {
    match value.chars().last() {
        Some(unit) => match unit_exponent(unit) {
            Some(exponent) => (&value[..value.len() - unit.len_utf8()], exponent),
            None => (value, 0),
        },
        None => (value, 0),
    }
}

/// Parses a hashrate into H/s. Unparsable or non-finite input yields `0.0`.
pub fn parse_hashrate(value: &str) -> f64 {
    let trimmed = value.trim();
    let (mantissa, exponent) = split_unit(trimmed);
    let parsed = match mantissa.trim().parse::<f64>() {
        Ok(parsed) => parsed * 10f64.powi(exponent),
        Err(_) => return 0.0,
    };
    if parsed.is_finite() {
        parsed
    } else {
        0.0
    }
}

/// Parses a hashrate into an exact integer string of H/s.
///
/// Bare integers are returned as-is (minus leading zeros) without touching
/// floating point. Everything else is expanded with decimal arithmetic and
/// floored; values below one, negatives and unparsable input yield `"0"`.
pub fn hashrate_to_integer(value: &str) -> String {
    let trimmed = value.trim();
    if is_bare_integer(trimmed) {
        return canonical_integer(trimmed);
    }

    let (mantissa, exponent) = split_unit(trimmed);
    Decimal::parse(mantissa)
        .and_then(|decimal| decimal.shifted(exponent))
        .filter(|decimal| !decimal.is_negative())
        .and_then(|decimal| decimal.truncated())
        .unwrap_or_else(|| "0".to_owned())
}
