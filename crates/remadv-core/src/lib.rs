//! Core library for remittance advice processing.
//!
//! This crate provides:
//! - Customer detection from converted payment advice text
//! - Per-customer parsers (OBI Germany, Markant Germany) turning raw text
//!   into typed accounting items
//! - Amount, date and fixed-column positional extraction rules
//! - Accounting map and item table models
//!
//! The engine is purely synchronous and free of I/O. Every parse call takes
//! all of its inputs as arguments and owns no shared mutable state, so
//! different documents can be processed concurrently without coordination.

pub mod advice;
pub mod error;
pub mod models;

pub use advice::{
    AdviceParser, Customer, Journal, MarkantParser, ObiParser, ParsedAdvice, identify_customer,
    parse,
};
pub use error::{AdviceError, ConfigError, ParsingError, RemadvError, Result};
pub use models::{AccountingMap, BranchMap, CellValue, IlnMap, ItemTable};
