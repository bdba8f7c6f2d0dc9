//! Combines decoded digits into one numeric reading.

use super::decoder::DecodedDigit;

/// Substituted when any digit fails to decode. Indistinguishable from a
/// genuine zero; callers that care track the fallback separately.
pub const FALLBACK_READING: f64 = 0.0;

/// Builds the reading, or `None` when any digit is unrecognized or the
/// numeral does not parse.
///
/// The first `integer_digit_count` digits form the integer part, the rest
/// the fraction: `[2, 0, 4]` with 2 integer digits reads `20.4`.
pub fn try_assemble(digits: &[DecodedDigit], integer_digit_count: usize) -> Option<f64> {
    if digits.is_empty() || integer_digit_count > digits.len() {
        return None;
    }

    let mut numeral = String::with_capacity(digits.len() + 2);
    for (i, digit) in digits.iter().enumerate() {
        if i == integer_digit_count {
            if i == 0 {
                numeral.push('0');
            }
            numeral.push('.');
        }
        let d = digit.value()?;
        numeral.push(char::from_digit(d as u32, 10)?);
    }

    numeral.parse::<f64>().ok()
}

/// Like [`try_assemble`] but substitutes [`FALLBACK_READING`].
pub fn assemble(digits: &[DecodedDigit], integer_digit_count: usize) -> f64 {
    try_assemble(digits, integer_digit_count).unwrap_or(FALLBACK_READING)
}
