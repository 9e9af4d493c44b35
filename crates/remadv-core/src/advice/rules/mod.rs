//! Shared extraction rules used by the customer parsers.

pub mod amounts;
pub mod columns;
pub mod dates;

pub use amounts::{parse_advice_amount, parse_amount_column};
pub use columns::{AMOUNT_TOKEN, ColumnSpan, classify_by_column, find_in_span};
pub use dates::{format_date, parse_day_first};
