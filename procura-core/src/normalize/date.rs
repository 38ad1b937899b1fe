//! Optional `day-month-year` dates.

use chrono::NaiveDate;

use super::NormalizeError;

/// Format of dates published by the remote source.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Parse an optional `day-month-year` date.
///
/// Absent or blank input is `Ok(None)`: unsigned contracts carry no signing
/// date. Non-empty text that does not parse is an error.
///
/// # Examples
/// ```
/// use chrono::NaiveDate;
/// use procura_core::parse_date;
///
/// assert_eq!(parse_date(Some("05-03-2014"))?, NaiveDate::from_ymd_opt(2014, 3, 5));
/// assert_eq!(parse_date(Some(""))?, None);
/// assert_eq!(parse_date(None)?, None);
/// assert!(parse_date(Some("2014-03-05")).is_err());
/// # Ok::<(), procura_core::NormalizeError>(())
/// ```
pub fn parse_date(raw: Option<&str>) -> Result<Option<NaiveDate>, NormalizeError> {
    let Some(text) = raw.map(str::trim).filter(|text| !text.is_empty()) else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map(Some)
        .map_err(|source| NormalizeError::InvalidDate {
            value: text.to_owned(),
            source,
        })
}
