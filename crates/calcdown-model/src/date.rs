//! ISO date helpers.
//!
//! Dates are calendar dates without a time zone (`NaiveDate`); datetimes are instants in UTC.
//! Strings without an offset are interpreted as UTC.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DateError {
    #[error("Invalid date (expected YYYY-MM-DD): {0}")]
    Format(String),
    #[error("Invalid calendar date: {0}")]
    Calendar(String),
    #[error("Invalid datetime")]
    DateTime(String),
    #[error("format: dangling %")]
    DanglingPercent,
    #[error("format: unsupported token: %{0}")]
    UnsupportedToken(char),
}

/// Parses a strict `YYYY-MM-DD` date, rejecting impossible calendar dates such as `2024-02-30`.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, DateError> {
    let bytes = value.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shape_ok {
        return Err(DateError::Format(value.to_string()));
    }
    let field = |range: std::ops::Range<usize>| value[range].parse::<u32>().unwrap_or(0);
    let year = field(0..4) as i32;
    NaiveDate::from_ymd_opt(year, field(5..7), field(8..10))
        .ok_or_else(|| DateError::Calendar(value.to_string()))
}

#[must_use]
pub fn format_iso_date(date: NaiveDate) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        date.month(),
        date.day()
    )
}

/// Parses an instant.
///
/// Accepts RFC 3339 (`2024-01-02T03:04:05Z`, `...+02:00`), a naive `YYYY-MM-DDTHH:MM[:SS[.fff]]`
/// (taken as UTC) or a bare date (UTC midnight).
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, DateError> {
    let text = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Ok(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, pattern) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = parse_iso_date(text) {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(DateError::DateTime(value.to_string()))
}

/// Formats an instant as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
#[must_use]
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Adds (or subtracts) whole months, clamping the day to the end of the target month.
///
/// Returns `None` when the result falls outside the representable range.
#[must_use]
pub fn add_months(date: NaiveDate, months: i64) -> Option<NaiveDate> {
    let magnitude = u32::try_from(months.unsigned_abs()).ok()?;
    if months >= 0 {
        date.checked_add_months(Months::new(magnitude))
    } else {
        date.checked_sub_months(Months::new(magnitude))
    }
}

/// Formats `date` with a template supporting `%Y`, `%m`, `%d` and `%%`.
pub fn format_date(date: NaiveDate, template: &str) -> Result<String, DateError> {
    let mut out = String::with_capacity(template.len() + 4);
    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            None => return Err(DateError::DanglingPercent),
            Some('%') => out.push('%'),
            Some('Y') => out.push_str(&format!("{:04}", date.year())),
            Some('m') => out.push_str(&format!("{:02}", date.month())),
            Some('d') => out.push_str(&format!("{:02}", date.day())),
            Some(other) => return Err(DateError::UnsupportedToken(other)),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_iso_date("2024-02-29"), Ok(ymd(2024, 2, 29)));
        assert_eq!(
            parse_iso_date("2023-02-29"),
            Err(DateError::Calendar("2023-02-29".into()))
        );
        assert_eq!(
            parse_iso_date("2024-2-01"),
            Err(DateError::Format("2024-2-01".into()))
        );
        assert!(parse_iso_date("2024-13-01").is_err());
        assert!(parse_iso_date(" 2024-01-01").is_err());
    }

    #[test]
    fn formats_iso_dates() {
        assert_eq!(format_iso_date(ymd(987, 3, 4)), "0987-03-04");
    }

    #[test]
    fn parses_datetimes() {
        let expected = ymd(2024, 1, 2).and_hms_opt(3, 4, 5).unwrap().and_utc();
        assert_eq!(parse_datetime("2024-01-02T03:04:05Z"), Ok(expected));
        assert_eq!(parse_datetime("2024-01-02T05:04:05+02:00"), Ok(expected));
        assert_eq!(parse_datetime("2024-01-02T03:04:05"), Ok(expected));
        assert_eq!(
            format_datetime(parse_datetime("2024-01-02").unwrap()),
            "2024-01-02T00:00:00.000Z"
        );
        assert!(parse_datetime("yesterday").is_err());
    }

    #[test]
    fn add_months_clamps_to_month_end() {
        assert_eq!(add_months(ymd(2024, 1, 31), 1), Some(ymd(2024, 2, 29)));
        assert_eq!(add_months(ymd(2024, 3, 31), -1), Some(ymd(2024, 2, 29)));
        assert_eq!(add_months(ymd(2024, 11, 15), 14), Some(ymd(2026, 1, 15)));
    }

    #[test]
    fn formats_templates() {
        let date = ymd(2024, 7, 4);
        assert_eq!(format_date(date, "%d/%m/%Y (100%%)").unwrap(), "04/07/2024 (100%)");
        assert_eq!(format_date(date, "%Y-%"), Err(DateError::DanglingPercent));
        assert_eq!(format_date(date, "%H"), Err(DateError::UnsupportedToken('H')));
    }
}
