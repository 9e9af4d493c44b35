//! Remittance advice parsing.
//!
//! The module identifies the customer who issued a payment advice from the
//! document text and dispatches to the matching customer parser. There is no
//! fallback: a document without a known customer marker is rejected.

pub mod markant;
pub mod obi;
pub mod rules;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use crate::error::{RemadvError, Result};
use crate::models::{AccountingMap, ItemTable};

pub use markant::{DocTypeTable, Journal, MarkantParser, TaxCodeTable};
pub use obi::ObiParser;

/// Customers whose payment advices are supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Customer {
    /// OBI Germany.
    ObiDe,
    /// Markant Germany.
    MarkantDe,
}

impl Customer {
    /// Stable tag used in configuration files and log output.
    pub fn tag(&self) -> &'static str {
        match self {
            Customer::ObiDe => "OBI_DE",
            Customer::MarkantDe => "MARKANT_DE",
        }
    }
}

/// The extraction result for one remittance advice document.
///
/// Constructed once per document by a customer parser and handed to the
/// report-generation side; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedAdvice {
    /// Accounting items, sorted and projected onto the caller layout.
    pub items: ItemTable,
    /// Document number of the remittance advice.
    pub remittance_number: String,
    /// Document date rendered with the caller-supplied format.
    pub remittance_date: String,
    /// Journal tag of the advice (Markant only, empty otherwise).
    pub remittance_type: String,
    /// Local-language name of the advice (Markant only, empty otherwise).
    pub remittance_name: String,
    /// Supplier listing number in the customer's accounting (OBI only).
    pub supplier_id: String,
}

/// Common contract of the customer parsers.
///
/// Parsers are stateless between invocations and free of I/O; one parser
/// value can process any number of documents, concurrently if desired.
pub trait AdviceParser {
    /// Parse the text extracted from a PDF payment advice.
    ///
    /// `fields` defines the order of columns in the resulting item table and
    /// `date_format` controls the rendering of the document date.
    fn parse(
        &self,
        text: &str,
        accounting_map: &AccountingMap,
        threshold: Decimal,
        fields: &[String],
        date_format: &str,
    ) -> Result<ParsedAdvice>;
}

/// Identify the customer who issued a payment advice from the document text.
///
/// The first matching marker wins; text without any marker is rejected with
/// [`RemadvError::UnrecognizedCustomer`].
pub fn identify_customer(text: &str) -> Result<Customer> {
    if text.contains("Markant ") || text.contains("MARKANT ") {
        Ok(Customer::MarkantDe)
    } else if text.contains(" OBI ") {
        Ok(Customer::ObiDe)
    } else {
        Err(RemadvError::UnrecognizedCustomer)
    }
}

/// Identify the customer and run the matching parser.
pub fn parse(
    text: &str,
    accounting_map: &AccountingMap,
    threshold: Decimal,
    fields: &[String],
    date_format: &str,
) -> Result<ParsedAdvice> {
    let customer = identify_customer(text)?;
    info!("customer identified: {}", customer.tag());

    match customer {
        Customer::ObiDe => {
            ObiParser::new().parse(text, accounting_map, threshold, fields, date_format)
        }
        Customer::MarkantDe => {
            MarkantParser::new().parse(text, accounting_map, threshold, fields, date_format)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_markant() {
        assert_eq!(
            identify_customer("Markant Handels- und Service GmbH").unwrap(),
            Customer::MarkantDe
        );
        assert_eq!(
            identify_customer("MARKANT AG Zahlungsavis").unwrap(),
            Customer::MarkantDe
        );
    }

    #[test]
    fn test_identify_obi() {
        assert_eq!(
            identify_customer("   OBI GmbH & Co. Deutschland KG").unwrap(),
            Customer::ObiDe
        );
    }

    #[test]
    fn test_identify_requires_bounded_obi_token() {
        // "OBI" glued to other text is not a marker.
        assert!(matches!(
            identify_customer("TOBIAS Baumarkt"),
            Err(RemadvError::UnrecognizedCustomer)
        ));
    }

    #[test]
    fn test_identify_unknown() {
        assert!(matches!(
            identify_customer("Edeka Zentrale Zahlungsavis"),
            Err(RemadvError::UnrecognizedCustomer)
        ));
    }
}
