//! Positional field extraction for fixed-column document layouts.
//!
//! Amounts on an item line are not delimited; they occupy fixed character
//! columns of one document template. The layout is encoded as a declarative
//! table of named column spans so that a template change is a data edit. A
//! token ending outside every span is a hard failure by design: dropping it
//! silently would mask layout drift.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::AdviceError;

lazy_static! {
    /// A decimal amount token with a `,` decimal separator.
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(r"\S+,\S+").unwrap();
}

/// A named column span, matched against the end offset of an amount token.
#[derive(Debug, Clone, Copy)]
pub struct ColumnSpan {
    /// Slot the token is assigned to.
    pub slot: &'static str,
    /// Smallest accepted token end offset.
    pub min_end: usize,
    /// Largest accepted token end offset.
    pub max_end: usize,
}

impl ColumnSpan {
    pub const fn new(slot: &'static str, min_end: usize, max_end: usize) -> Self {
        Self { slot, min_end, max_end }
    }
}

/// Classify every amount token on `line` into a named slot by the column
/// where the token ends.
///
/// When a slot matches more than once the last token wins. A token outside
/// all spans fails the whole line.
pub fn classify_by_column<'a>(
    line: &'a str,
    spans: &[ColumnSpan],
) -> Result<HashMap<&'static str, &'a str>, AdviceError> {
    let mut slots = HashMap::new();

    for mat in AMOUNT_TOKEN.find_iter(line) {
        let end = mat.end();
        let span = spans
            .iter()
            .find(|s| end >= s.min_end && end <= s.max_end)
            .ok_or(AdviceError::AmountOutOfColumns { end })?;
        slots.insert(span.slot, mat.as_str());
    }

    Ok(slots)
}

/// Find the first amount token within the half-open column range
/// `[start, end)` of `line`.
///
/// Returns `None` when the line is shorter than the range or no token falls
/// inside it.
pub fn find_in_span(line: &str, start: usize, end: usize) -> Option<&str> {
    let end = end.min(line.len());
    let window = line.get(start..end)?;
    AMOUNT_TOKEN.find(window).map(|m| m.as_str())
}
