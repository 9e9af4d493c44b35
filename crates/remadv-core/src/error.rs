//! Error types for the remadv-core library.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::advice::Customer;
use crate::advice::markant::Journal;

/// Main error type for the remadv library.
#[derive(Error, Debug)]
pub enum RemadvError {
    /// The document text matches no known customer marker.
    /// The document may not be a payment advice at all.
    #[error("could not detect the customer name from the document data")]
    UnrecognizedCustomer,

    /// A customer parser failed to extract data from the document.
    #[error("parsing error: {0}")]
    Parsing(#[from] ParsingError),

    /// Invalid processing configuration.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Umbrella error returned by the customer parsers.
///
/// The message presented to callers is uniform; the low-level cause is
/// retained as the error source for logging and tests.
#[derive(Error, Debug)]
#[error("could not extract data from the document")]
pub struct ParsingError {
    #[from]
    source: AdviceError,
}

impl ParsingError {
    /// The underlying extraction failure.
    pub fn cause(&self) -> &AdviceError {
        &self.source
    }
}

/// Low-level extraction failures inside a customer parser.
#[derive(Error, Debug)]
pub enum AdviceError {
    /// The document text is empty.
    #[error("cannot parse an empty document")]
    EmptyText,

    /// A required header anchor did not match.
    #[error("{0} not found")]
    MissingHeader(&'static str),

    /// No journal-name marker was found in a Markant document.
    #[error("failed to detect the journal type")]
    UnknownJournal,

    /// The journal is recognized but carries no parseable item layout.
    #[error("unsupported journal: {0:?}")]
    UnsupportedJournal(Journal),

    /// Item segmentation produced no segments.
    #[error("no accounting items found in the document")]
    NoItems,

    /// An item segment did not match the expected field pattern.
    #[error("an item segment did not match the expected field pattern")]
    ItemMismatch,

    /// A segment contains no currency-unit marker.
    #[error("an item segment contains no EUR marker")]
    MissingCurrencyMarker,

    /// A dual-amount-line item appeared in a journal that forbids them.
    #[error("multiline items are not allowed in this type of remittance advice")]
    MultilineItemNotAllowed,

    /// A numeric token failed decimal conversion.
    #[error("invalid amount format: {0:?}")]
    AmountFormat(String),

    /// An amount column that must carry values is empty.
    #[error("the amount field {0:?} contains no values")]
    EmptyAmountColumn(&'static str),

    /// An amount token ended outside every known column span.
    #[error("amount token ending at column {end} lies outside all known column spans")]
    AmountOutOfColumns { end: usize },

    /// A required positional amount slot was not populated.
    #[error("required amount slot {0:?} is missing")]
    MissingAmountSlot(&'static str),

    /// A date token could not be parsed day-first.
    #[error("invalid date: {0:?}")]
    InvalidDate(String),

    /// An identifier column failed integer conversion.
    #[error("invalid number for {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// The accounting map does not cover a key present in the items.
    #[error("no account mapped for key {key:?}")]
    AccountNotFound { key: String },

    /// A computed column sum disagrees with the document-stated total.
    #[error("{total} mismatch: document states {stated}, items sum to {computed}")]
    TotalsMismatch {
        total: &'static str,
        stated: Decimal,
        computed: Decimal,
    },
}

/// Configuration-shape errors. Fatal and non-recoverable within the engine.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The accounting map carries no entries.
    #[error("the accounting map cannot be empty")]
    EmptyAccountingMap,

    /// The write-off threshold must be a positive amount.
    #[error("threshold cannot be negative or zero: {0}")]
    NonPositiveThreshold(Decimal),

    /// The accounting map variant does not fit the identified customer.
    #[error("accounting map shape does not match customer {0:?}")]
    MapShapeMismatch(Customer),

    /// A layout field is outside the parser's column vocabulary.
    #[error("unknown output field: {0:?}")]
    UnknownField(String),

    /// The document date could not be rendered with the supplied format.
    #[error("invalid date format string: {0:?}")]
    InvalidDateFormat(String),
}

impl From<AdviceError> for RemadvError {
    fn from(err: AdviceError) -> Self {
        RemadvError::Parsing(ParsingError::from(err))
    }
}

/// Result type for the remadv library.
pub type Result<T> = std::result::Result<T, RemadvError>;
