//! Localised price parsing.

use super::NormalizeError;

/// Parse a localised price such as `"1.234,56 EUR"` into a whole number.
///
/// Everything after the first whitespace (the currency or unit token) is
/// discarded, then thousands (`.`) and decimal (`,`) separators are removed
/// and the remaining digits are read as an integer. The result keeps the
/// source's historical convention of folding cents into the integer.
///
/// # Examples
/// ```
/// use procura_core::parse_price;
///
/// assert_eq!(parse_price("1.234,56 EUR")?, 123_456);
/// assert_eq!(parse_price("50 EUR")?, 50);
/// assert!(parse_price("n/a").is_err());
/// # Ok::<(), procura_core::NormalizeError>(())
/// ```
pub fn parse_price(raw: &str) -> Result<i64, NormalizeError> {
    let amount = raw.split_whitespace().next().unwrap_or_default();
    let digits: String = amount.chars().filter(|ch| !matches!(ch, '.' | ',')).collect();
    if digits.is_empty() {
        return Err(invalid(raw));
    }
    digits.parse().map_err(|_| invalid(raw))
}

fn invalid(raw: &str) -> NormalizeError {
    NormalizeError::InvalidPrice {
        value: raw.to_owned(),
    }
}
