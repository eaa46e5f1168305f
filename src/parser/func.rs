//! Parsing utility functions.

use crate::error::ParseError;

/// Mantissas of up to this many digits are exactly representable as an [`f64`].
const MAX_FAST_DIGITS: usize = 15;

/// Exact powers of ten for the fast path.
const POWERS_OF_TEN: [f64; MAX_FAST_DIGITS + 1] = [
    1e0, 1e1, 1e2, 1e3, 1e4, 1e5, 1e6, 1e7, 1e8, 1e9, 1e10, 1e11, 1e12, 1e13, 1e14, 1e15,
];

/// An unsafe conversion from a guaranteed ASCII encoded digit to a digit.
pub fn u8_to_digit(byte: u8) -> u8 {
    byte & 15
}

/// A lossy conversion of a key or record into text.
pub fn bytes_to_string(bytes: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(bytes)
}

/// Parse a plain decimal such as `-12.3` without going through [`str::parse`].
///
/// Returns [`None`] for anything else, including exponents, a leading `+` and mantissas
/// longer than [`MAX_FAST_DIGITS`]. Both operands of the final division are exact, so the
/// result is the correctly rounded value, identical to what [`str::parse`] returns.
pub fn parse_decimal(bytes: &[u8]) -> Option<f64> {
    let (negative, body) = match bytes.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, bytes),
    };

    let mut mantissa: u64 = 0;
    let mut digits = 0;
    let mut fraction: Option<usize> = None;

    for &byte in body {
        match byte {
            b'0'..=b'9' => {
                mantissa = mantissa * 10 + u8_to_digit(byte) as u64;
                digits += 1;
                if let Some(count) = fraction.as_mut() {
                    *count += 1;
                }
            }
            b'.' if fraction.is_none() => fraction = Some(0),
            _ => return None,
        }

        if digits > MAX_FAST_DIGITS {
            return None;
        }
    }

    if digits == 0 {
        return None;
    }

    let value = mantissa as f64 / POWERS_OF_TEN[fraction.unwrap_or(0)];

    Some(if negative { -value } else { value })
}

/// Parse the numeric part of a record.
///
/// Non-finite values are rejected, since they would poison the min/max of their key.
pub fn parse_value(bytes: &[u8]) -> Result<f64, ParseError> {
    parse_decimal(bytes)
        .or_else(|| {
            std::str::from_utf8(bytes)
                .ok()
                .and_then(|text| text.parse::<f64>().ok())
        })
        .filter(|value| value.is_finite())
        .ok_or(ParseError::InvalidNumber)
}
