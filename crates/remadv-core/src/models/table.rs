//! Tabular output model for extracted accounting items.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// A single cell of the accounting item table.
///
/// The concrete type of each column is customer-specific; `Missing` stands
/// for values that are not applicable to the active classification branch
/// (rendered as an empty string and serialized as `null`).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Missing,
    Bool(bool),
    UInt(u64),
    Decimal(Decimal),
    Date(NaiveDate),
    Text(String),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => Ok(()),
            CellValue::Bool(v) => write!(f, "{}", v),
            CellValue::UInt(v) => write!(f, "{}", v),
            CellValue::Decimal(v) => write!(f, "{}", v),
            CellValue::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            CellValue::Text(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}

/// An ordered table of extracted accounting items.
///
/// Column order is exactly the caller-supplied output layout; rows keep the
/// order established by the final sort of the producing parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemTable {
    fields: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl ItemTable {
    /// Create an empty table with the given column layout.
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
        }
    }

    /// Append a row. The row length must equal the number of fields.
    pub fn push_row(&mut self, row: Vec<CellValue>) {
        debug_assert_eq!(row.len(), self.fields.len());
        self.rows.push(row);
    }

    /// Column names, in output order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// All rows, in output order.
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, field), if both exist.
    pub fn get(&self, row: usize, field: &str) -> Option<&CellValue> {
        let idx = self.fields.iter().position(|f| f == field)?;
        self.rows.get(row)?.get(idx)
    }

    /// All cells of one column, in row order.
    pub fn column(&self, field: &str) -> Option<Vec<&CellValue>> {
        let idx = self.fields.iter().position(|f| f == field)?;
        Some(self.rows.iter().filter_map(|r| r.get(idx)).collect())
    }
}
