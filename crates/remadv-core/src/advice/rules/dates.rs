//! Day-first date parsing and caller-controlled date rendering.

use std::fmt::Write;

use chrono::NaiveDate;

use crate::error::{AdviceError, ConfigError};

// Two-digit-year formats come first: `%Y` happily accepts a two-digit
// token as a literal year, so trying it first would turn `24` into year 24.
const DAY_FIRST_FORMATS: &[&str] = &[
    "%d.%m.%y",
    "%d.%m.%Y",
    "%d/%m/%y",
    "%d/%m/%Y",
    "%d-%m-%y",
    "%d-%m-%Y",
];

/// Parse a day-first date token such as `05.03.2024` or `1.3.24`.
pub fn parse_day_first(val: &str) -> Result<NaiveDate, AdviceError> {
    DAY_FIRST_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(val, fmt).ok())
        .ok_or_else(|| AdviceError::InvalidDate(val.to_string()))
}

/// Render a date with the caller-supplied strftime-style format string.
///
/// An invalid specifier surfaces as a configuration error instead of a panic
/// inside the formatting machinery.
pub fn format_date(date: NaiveDate, format: &str) -> Result<String, ConfigError> {
    let mut out = String::new();
    write!(out, "{}", date.format(format))
        .map_err(|_| ConfigError::InvalidDateFormat(format.to_string()))?;
    Ok(out)
}
