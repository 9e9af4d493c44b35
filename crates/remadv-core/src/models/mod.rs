//! Data models for extracted remittance advice data.

pub mod config;
pub mod table;

pub use config::{AccountingMap, BranchMap, IlnMap};
pub use table::{CellValue, ItemTable};
