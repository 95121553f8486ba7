//! Exact decimal-string arithmetic for counters that must not pass through
//! `f64`. A parsed value is `digits × 10^exponent`; shifting by a power of ten
//! and truncating to an integer are both string operations, so precision is
//! never lost regardless of magnitude.

/// Exponents above this are treated as unparsable to bound allocations.
const MAX_EXPONENT: i64 = 4_096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Decimal {
    negative: bool,
    digits: String,
    exponent: i64,
}

impl Decimal {
    /// Parses `[+-]digits[.digits][e[+-]digits]`.
    pub(crate) fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        let (negative, unsigned) = match trimmed.as_bytes().first() {
            Some(b'-') => (true, &trimmed[1..]),
            Some(b'+') => (false, &trimmed[1..]),
            _ => (false, trimmed),
        };

        let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
            Some(idx) => (
                &unsigned[..idx],
                unsigned[idx + 1..].parse::<i64>().ok()?,
            ),
            None => (unsigned, 0),
        };

        let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if !int_part.bytes().all(|b| b.is_ascii_digit())
            || !frac_part.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }

        let exponent = exponent.checked_sub(i64::try_from(frac_part.len()).ok()?)?;
        let mut digits = String::with_capacity(int_part.len() + frac_part.len());
        digits.push_str(int_part);
        digits.push_str(frac_part);
        let digits = digits.trim_start_matches('0').to_owned();

        Some(Self {
            negative: negative && !digits.is_empty(),
            digits,
            exponent,
        })
    }

    pub(crate) fn is_negative(&self) -> bool {
        self.negative
    }

    pub(crate) fn shifted(mut self, power_of_ten: i32) -> Option<Self> {
        self.exponent = self.exponent.checked_add(i64::from(power_of_ten))?;
        Some(self)
    }

    /// Integer part, truncated toward zero, as canonical decimal text.
    pub(crate) fn truncated(&self) -> Option<String> {
        if self.digits.is_empty() {
            return Some("0".to_owned());
        }

        let integer = if self.exponent >= 0 {
            if self.exponent > MAX_EXPONENT {
                return None;
            }
            let mut text = self.digits.clone();
            text.extend(std::iter::repeat('0').take(self.exponent as usize));
            text
        } else {
            let dropped = usize::try_from(self.exponent.unsigned_abs()).ok()?;
            if dropped >= self.digits.len() {
                return Some("0".to_owned());
            }
            self.digits[..self.digits.len() - dropped].to_owned()
        };

        let integer = integer.trim_start_matches('0');
        if integer.is_empty() {
            Some("0".to_owned())
        } else if self.negative {
            Some(format!("-{integer}"))
        } else {
            Some(integer.to_owned())
        }
    }
}

/// Converts a float-like counter to an integer string, dropping the fractional
/// part. Unparsable input yields `"0"`.
pub fn integer_from_float_like(value: &str) -> String {
    Decimal::parse(value)
        .and_then(|decimal| decimal.truncated())
        .unwrap_or_else(|| "0".to_owned())
}

/// Returns true when `value` is a non-empty run of ASCII digits.
pub(crate) fn is_bare_integer(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
}

/// Strips leading zeros from a bare integer, keeping a single `0`.
pub(crate) fn canonical_integer(value: &str) -> String {
    let trimmed = value.trim_start_matches('0');
    if trimmed.is_empty() {
        "0".to_owned()
    } else {
        trimmed.to_owned()
    }
}
