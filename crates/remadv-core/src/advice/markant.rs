//! Parser for payment (remittance) advices issued by Markant.
//!
//! The current version supports the German layout of the documents only.
//! An advice belongs to exactly one journal; the journal selects the cleanup,
//! segmentation and item patterns that apply.

use std::collections::HashSet;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{AdviceError, ConfigError, Result};
use crate::models::{AccountingMap, CellValue, IlnMap, ItemTable};

use super::rules::{
    ColumnSpan, classify_by_column, find_in_span, format_date, parse_advice_amount,
    parse_day_first,
};
use super::{AdviceParser, Customer, ParsedAdvice};

const VAT_CODE_FRANCE_INTRACOMMUNITY: &str = "C3";
const VAT_CODE_FRANCE_OUTPUT_20_PERCENT: &str = "C6";
const VAT_CODE_GERMANY_DOMESTIC_19_PERCENT: &str = "AB";
const VAT_CODE_GERMANY_DOMESTIC_16_PERCENT: &str = "AA";

/// Columns the Markant parser can produce, across all journals.
const MARKANT_COLUMNS: &[&str] = &[
    "ILN",
    "Document_Number",
    "Original_Document",
    "Document_Date",
    "Document_Type",
    "Archive_Number",
    "Gross_Amount",
    "Tax_Rate",
    "Markant_SB_Condition",
    "Customer_SB_Condition",
    "Discount",
    "DL_Condition",
    "Net_Amount",
    "Debitor",
    "Case_ID",
    "Search_Key",
    "Tax_Code",
    "Overpayment",
    "On_Account_Text",
    "Gross_Amount_(ABS)",
];

/// Markant payment advice journals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Journal {
    /// Journal 10 - Rechnungen/Gutschriften.
    Invoicing,
    /// Journal 20 - Belastungen/Rückbelastungen.
    Other,
    /// Journal 22 - sonstige Leistungen.
    Services,
    /// Journal 30 - Korrekturen.
    Corrections,
}

impl Journal {
    /// Detect the journal of an advice from its text.
    fn detect(text: &str) -> std::result::Result<Journal, AdviceError> {
        if text.contains("Rechnungen/Gutschriften") {
            Ok(Journal::Invoicing)
        } else if text.contains("Belastungen/Rückbelast") {
            Ok(Journal::Other)
        } else if text.contains("Korrekturen") {
            Ok(Journal::Corrections)
        } else if text.contains("sonstige Leistungen") {
            Ok(Journal::Services)
        } else {
            Err(AdviceError::UnknownJournal)
        }
    }

    /// Stable tag used in the extraction output.
    pub fn tag(&self) -> &'static str {
        match self {
            Journal::Invoicing => "invoicing",
            Journal::Other => "other",
            Journal::Services => "services",
            Journal::Corrections => "corrections",
        }
    }

    /// Local-language name of the advice as printed on the document.
    fn local_name(&self) -> &'static str {
        match self {
            Journal::Invoicing => "Rechnungen",
            Journal::Other => "Belastungen",
            Journal::Services | Journal::Corrections => "",
        }
    }
}

lazy_static! {
    static ref ADVICE_NUMBER: Regex = Regex::new(r"Nummer :\s+(?P<num>\d{8}) ").unwrap();
    static ref ADVICE_DATE: Regex = Regex::new(r"Datum\s+:\s+(?P<date>\S.*)").unwrap();
    static ref SUPPLIER_NUMBER: Regex = Regex::new(r"KTO: (?P<supplier>\d{8})").unwrap();
    static ref SUMMARY_LINE: Regex = Regex::new(r"Gesamtsumme\s+auf\s+Journal.*").unwrap();

    // Journal 10/30 segments run from one item marker to its EUR terminator.
    static ref SEGMENT_TO_EUR: Regex = Regex::new(r"(?s)GLN-RA.*?EUR").unwrap();
    // Journal 20 segments are sliced from one item marker to the next.
    static ref SEGMENT_START: Regex = Regex::new(r"(?m)^\s+GLN-RA").unwrap();

    static ref ITEM_INVOICING: Regex = Regex::new(
        r"GLN-LA:\s+(?P<iln>\d+).*\n+\s+(?P<doc>\S+)\s+(?P<dat>\d+\S+)\s+(?P<typ>\S+)\s+(?P<arch>\d+).*\n+(?P<amt>(\s+[0-9.,-]*)*)"
    )
    .unwrap();
    static ref ITEM_OTHER: Regex = Regex::new(
        r"GLN-LA:\s+(?P<iln>\d+).*?(?P<org>\S+)\n\s+(?P<doc>\S*?)\s+(?P<dat>\d+\S+)\s+(?P<typ>\S+)\s+(?P<arch>\d+).*\n(?P<amt>(\s+[0-9.,-]*)*)"
    )
    .unwrap();
    static ref ITEM_OTHER_DUAL: Regex = Regex::new(
        r"GLN-LA:\s+(?P<iln>\d+).*?(?P<org>\S+)\n\s+(?P<doc>\S*?)\s+(?P<dat>\d+\S+)\s+(?P<typ>\S+)\s+(?P<arch>\d+).*\n(?P<amt>(\s+[0-9.,-]*)*)EUR\n(?P<amt2>(\s+[0-9.,-]*)*)"
    )
    .unwrap();

    // Boilerplate lines stripped before segmentation.
    static ref SUBTOTALS_LINE: Regex = Regex::new(r"(?m)^\s+Summenwerte.*\n").unwrap();
    static ref SUBTOTALS_BLOCK: Regex = Regex::new(r"(?ms)^\s+Summenwerte.*").unwrap();
    static ref PAGE_HEADER: Regex = Regex::new(r"(?ms)^\s+Seite.*?brutto$").unwrap();
    static ref PAGE_HEADER_RELI: Regex = Regex::new(r"(?ms)^\s+Seite.*?ReLi.*?\n").unwrap();
    static ref GRAND_TOTAL_BLOCK: Regex = Regex::new(r"(?ms)^\s+Gesamtsumme.*").unwrap();
    static ref RELI_LINE: Regex = Regex::new(r"(?m)^\s+ReLi.*").unwrap();
    static ref GULI_LINE: Regex = Regex::new(r"(?m)^\s+GuLi.*").unwrap();
    static ref BLANK_RUN_3: Regex = Regex::new(r"\n{3,}").unwrap();
    static ref BLANK_RUN_2: Regex = Regex::new(r"\n{2,}").unwrap();
}

const SLOT_GROSS: &str = "gross_amount";
const SLOT_TAX: &str = "tax_rate";
const SLOT_MARKANT: &str = "markant_amount";
const SLOT_CUSTOMER: &str = "customer_amount";
const SLOT_DISCOUNT: &str = "discount";
const SLOT_DL: &str = "dl_condition";
const SLOT_NET: &str = "net_amount";

// End-offset spans of the amount slots on an item amount line. The spans
// encode the column layout of the current Markant document template; a token
// outside every span fails the item.
const ITEM_AMOUNT_SPANS: &[ColumnSpan] = &[
    ColumnSpan::new(SLOT_GROSS, 0, 69),
    ColumnSpan::new(SLOT_TAX, 77, 78),
    ColumnSpan::new(SLOT_MARKANT, 94, 96),
    ColumnSpan::new(SLOT_CUSTOMER, 121, 123),
    ColumnSpan::new(SLOT_DISCOUNT, 148, 150),
    ColumnSpan::new(SLOT_DL, 172, 174),
    ColumnSpan::new(SLOT_NET, 196, 197),
];

// Column ranges of the six totals on the summary line.
const SUMMARY_GROSS: (usize, usize) = (53, 67);
const SUMMARY_MARKANT: (usize, usize) = (82, 94);
const SUMMARY_CUSTOMER: (usize, usize) = (109, 120);
const SUMMARY_DISCOUNT: (usize, usize) = (136, 147);
const SUMMARY_DL: (usize, usize) = (160, 171);
const SUMMARY_NET: (usize, usize) = (182, 195);

/// Tax-rate to tax-code mapping, held by the parser as an immutable value
/// object.
///
/// The default table mixes German and French codes as found in the
/// production configuration; preserved verbatim pending business-owner
/// confirmation.
#[derive(Debug, Clone)]
pub struct TaxCodeTable {
    entries: Vec<(Decimal, &'static str)>,
}

impl Default for TaxCodeTable {
    fn default() -> Self {
        Self {
            entries: vec![
                (Decimal::from(20), VAT_CODE_FRANCE_OUTPUT_20_PERCENT),
                (Decimal::from(19), VAT_CODE_GERMANY_DOMESTIC_19_PERCENT),
                (Decimal::from(16), VAT_CODE_GERMANY_DOMESTIC_16_PERCENT),
                (Decimal::ZERO, VAT_CODE_FRANCE_INTRACOMMUNITY),
            ],
        }
    }
}

impl TaxCodeTable {
    /// Tax code for a rate stated in percent (e.g. `19.00`).
    pub fn code_for(&self, rate: Decimal) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(r, _)| *r == rate)
            .map(|(_, code)| *code)
    }
}

/// Document-type code to classification label mapping.
#[derive(Debug, Clone)]
pub struct DocTypeTable {
    entries: Vec<(&'static str, &'static str)>,
}

impl Default for DocTypeTable {
    fn default() -> Self {
        Self {
            entries: vec![
                ("RG", "Invoice"),
                ("Bela", "Debit"),
                ("RbelD", "Credit"),
                ("WKZ-B", "Debit"),
                ("WKZ-G", "Credit"),
                ("RetBe", "Debit"),
                ("RetRb", "Credit"),
            ],
        }
    }
}

impl DocTypeTable {
    /// Classification label for a document-type code; unmapped codes keep
    /// their raw value.
    pub fn label_for(&self, code: &str) -> Option<&'static str> {
        self.entries
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, label)| *label)
    }
}

/// Amounts of one item line, keyed by their positional slot.
#[derive(Debug, Clone)]
struct LineAmounts {
    gross_amount: String,
    tax_rate: String,
    markant_amount: String,
    customer_amount: String,
    discount: String,
    dl_condition: String,
    net_amount: String,
}

/// Extract the amounts of a given item line based on their pre-defined
/// column positions.
///
/// The gross amount, tax rate and net amount are mandatory; the condition
/// slots default to zero when their columns are blank.
fn extract_line_amounts(line: &str) -> std::result::Result<LineAmounts, AdviceError> {
    let slots = classify_by_column(line, ITEM_AMOUNT_SPANS)?;

    let required = |slot: &'static str| -> std::result::Result<String, AdviceError> {
        slots
            .get(slot)
            .map(|v| v.to_string())
            .ok_or(AdviceError::MissingAmountSlot(slot))
    };
    let optional = |slot: &'static str| slots.get(slot).map_or("0.00".to_string(), |v| v.to_string());

    Ok(LineAmounts {
        gross_amount: required(SLOT_GROSS)?,
        tax_rate: required(SLOT_TAX)?,
        net_amount: required(SLOT_NET)?,
        markant_amount: optional(SLOT_MARKANT),
        customer_amount: optional(SLOT_CUSTOMER),
        discount: optional(SLOT_DISCOUNT),
        dl_condition: optional(SLOT_DL),
    })
}

/// The number of the original document, taken from the `Ursprungsbeleg`
/// token after its `/` separator.
fn original_document(org: &str, journal: Journal) -> String {
    if journal != Journal::Other {
        return String::new();
    }

    match org.find('/') {
        Some(idx) => org[idx + 1..].to_string(),
        None => org.to_string(),
    }
}

#[derive(Debug, Clone)]
struct RawItem {
    iln: String,
    document_number: String,
    original_document: String,
    document_date: String,
    document_type: String,
    archive_number: String,
    amounts: LineAmounts,
}

#[derive(Debug, Clone)]
struct MarkantItem {
    iln: u64,
    document_number: String,
    document_number_value: Option<u64>,
    original_document: String,
    document_date: NaiveDate,
    document_type: String,
    archive_number: u64,
    gross_amount: Decimal,
    tax_rate: Decimal,
    markant_sb_condition: Decimal,
    customer_sb_condition: Decimal,
    discount: Decimal,
    dl_condition: Decimal,
    net_amount: Decimal,
    debitor: u64,
    search_key: String,
    tax_code: String,
    overpayment: Option<bool>,
    gross_amount_abs: Decimal,
}

fn coerce_item(raw: RawItem, journal: Journal) -> std::result::Result<MarkantItem, AdviceError> {
    let iln = raw.iln.parse::<u64>().map_err(|_| AdviceError::InvalidNumber {
        field: "ILN",
        value: raw.iln.clone(),
    })?;

    let archive_number =
        raw.archive_number
            .parse::<u64>()
            .map_err(|_| AdviceError::InvalidNumber {
                field: "Archive_Number",
                value: raw.archive_number.clone(),
            })?;

    // Invoicing journal document numbers are numeric.
    let document_number_value = if journal == Journal::Invoicing {
        Some(raw.document_number.parse::<u64>().map_err(|_| {
            AdviceError::InvalidNumber {
                field: "Document_Number",
                value: raw.document_number.clone(),
            }
        })?)
    } else {
        None
    };

    Ok(MarkantItem {
        iln,
        document_number: raw.document_number,
        document_number_value,
        original_document: raw.original_document,
        document_date: parse_day_first(&raw.document_date)?,
        document_type: raw.document_type,
        archive_number,
        gross_amount: parse_advice_amount(&raw.amounts.gross_amount)?,
        tax_rate: parse_advice_amount(&raw.amounts.tax_rate)?,
        markant_sb_condition: parse_advice_amount(&raw.amounts.markant_amount)?,
        customer_sb_condition: parse_advice_amount(&raw.amounts.customer_amount)?,
        discount: parse_advice_amount(&raw.amounts.discount)?,
        dl_condition: parse_advice_amount(&raw.amounts.dl_condition)?,
        net_amount: parse_advice_amount(&raw.amounts.net_amount)?,
        debitor: 0,
        search_key: String::new(),
        tax_code: String::new(),
        overpayment: None,
        gross_amount_abs: Decimal::ZERO,
    })
}

/// Document-level totals taken from the `Gesamtsumme` summary line.
#[derive(Debug, Clone, Default, PartialEq)]
struct SummaryTotals {
    gross_amount: Decimal,
    markant_gross: Decimal,
    customer_gross: Decimal,
    discount: Decimal,
    dl_condition: Decimal,
    net_amount: Decimal,
}

fn extract_summary(line: &str) -> std::result::Result<SummaryTotals, AdviceError> {
    let total = |span: (usize, usize)| -> std::result::Result<Decimal, AdviceError> {
        match find_in_span(line, span.0, span.1) {
            Some(token) => parse_advice_amount(token),
            None => Ok(Decimal::ZERO),
        }
    };

    Ok(SummaryTotals {
        gross_amount: total(SUMMARY_GROSS)?,
        markant_gross: total(SUMMARY_MARKANT)?,
        customer_gross: total(SUMMARY_CUSTOMER)?,
        discount: total(SUMMARY_DISCOUNT)?,
        dl_condition: total(SUMMARY_DL)?,
        net_amount: total(SUMMARY_NET)?,
    })
}

#[derive(Debug)]
struct MarkantHeader {
    advice_number: String,
    advice_date: NaiveDate,
    supplier_id: String,
    totals: SummaryTotals,
}

fn extract_header(text: &str) -> std::result::Result<MarkantHeader, AdviceError> {
    let caps = ADVICE_NUMBER
        .captures(text)
        .ok_or(AdviceError::MissingHeader("remittance advice number"))?;
    let advice_number = caps["num"].to_string();

    let caps = ADVICE_DATE
        .captures(text)
        .ok_or(AdviceError::MissingHeader("remittance advice date"))?;
    let advice_date = parse_day_first(&caps["date"].replace(' ', ""))?;

    let caps = SUPPLIER_NUMBER
        .captures(text)
        .ok_or(AdviceError::MissingHeader("supplier number"))?;
    let supplier_id = caps["supplier"].to_string();

    let summary_line = SUMMARY_LINE
        .find(text)
        .ok_or(AdviceError::MissingHeader("summary totals line"))?;
    let totals = extract_summary(summary_line.as_str())?;

    Ok(MarkantHeader {
        advice_number,
        advice_date,
        supplier_id,
        totals,
    })
}

/// Remove irrelevant strings from the advice text.
///
/// Must run after header extraction (it destroys the header anchors) and
/// before segmentation (boilerplate pollutes segment boundaries).
fn clean_text(text: &str, journal: Journal) -> std::result::Result<String, AdviceError> {
    let cleaned = match journal {
        Journal::Invoicing | Journal::Corrections => {
            let a = SUBTOTALS_LINE.replace_all(text, "");
            let b = PAGE_HEADER.replace_all(&a, "");
            let c = PAGE_HEADER_RELI.replace_all(&b, "");
            let d = GRAND_TOTAL_BLOCK.replace_all(&c, "");
            let e = RELI_LINE.replace_all(&d, "");
            let f = GULI_LINE.replace_all(&e, "");
            BLANK_RUN_3.replace_all(&f, "\n").into_owned()
        }
        Journal::Other => {
            let a = SUBTOTALS_BLOCK.replace_all(text, "");
            let b = PAGE_HEADER.replace_all(&a, "");
            BLANK_RUN_2.replace_all(&b, "\n").into_owned()
        }
        Journal::Services => {
            return Err(AdviceError::UnsupportedJournal(Journal::Services));
        }
    };

    Ok(cleaned)
}

/// Split the cleaned text into item segments.
fn segment(cleaned: &str, journal: Journal) -> std::result::Result<Vec<&str>, AdviceError> {
    let segments: Vec<&str> = match journal {
        Journal::Invoicing | Journal::Corrections => SEGMENT_TO_EUR
            .find_iter(cleaned)
            .map(|m| m.as_str())
            .collect(),
        Journal::Other => {
            let starts: Vec<usize> = SEGMENT_START
                .find_iter(cleaned)
                .map(|m| m.start())
                .collect();
            starts
                .iter()
                .enumerate()
                .map(|(i, &start)| {
                    let end = starts.get(i + 1).copied().unwrap_or(cleaned.len());
                    &cleaned[start..end]
                })
                .collect()
        }
        Journal::Services => {
            return Err(AdviceError::UnsupportedJournal(Journal::Services));
        }
    };

    if segments.is_empty() {
        return Err(AdviceError::NoItems);
    }

    Ok(segments)
}

fn parse_single_segment(
    segment: &str,
    journal: Journal,
) -> std::result::Result<RawItem, AdviceError> {
    let pattern: &Regex = match journal {
        Journal::Other => &ITEM_OTHER,
        _ => &ITEM_INVOICING,
    };

    let caps = pattern.captures(segment).ok_or(AdviceError::ItemMismatch)?;
    let amounts = extract_line_amounts(&caps["amt"])?;
    let org = caps.name("org").map(|m| m.as_str()).unwrap_or("");

    Ok(RawItem {
        iln: caps["iln"].to_string(),
        document_number: caps["doc"].to_string(),
        original_document: original_document(org, journal),
        document_date: caps["dat"].to_string(),
        document_type: caps["typ"].to_string(),
        archive_number: caps["arch"].to_string(),
        amounts,
    })
}

/// A dual-amount-line segment is one logical item producing two rows that
/// share the identifying fields but carry distinct amount sets.
fn parse_dual_segment(
    segment: &str,
    journal: Journal,
) -> std::result::Result<(RawItem, RawItem), AdviceError> {
    let caps = ITEM_OTHER_DUAL
        .captures(segment)
        .ok_or(AdviceError::ItemMismatch)?;

    let org = caps.name("org").map(|m| m.as_str()).unwrap_or("");
    let shared = RawItem {
        iln: caps["iln"].to_string(),
        document_number: caps["doc"].to_string(),
        original_document: original_document(org, journal),
        document_date: caps["dat"].to_string(),
        document_type: caps["typ"].to_string(),
        archive_number: caps["arch"].to_string(),
        amounts: extract_line_amounts(&caps["amt"])?,
    };

    let second = RawItem {
        amounts: extract_line_amounts(&caps["amt2"])?,
        ..shared.clone()
    };

    Ok((shared, second))
}

/// Parser for Markant Germany payment advices.
#[derive(Debug, Default)]
pub struct MarkantParser {
    tax_codes: TaxCodeTable,
    doc_types: DocTypeTable,
}

impl MarkantParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the tax-rate to tax-code table.
    pub fn with_tax_codes(mut self, table: TaxCodeTable) -> Self {
        self.tax_codes = table;
        self
    }

    /// Replace the document-type code table.
    pub fn with_doc_types(mut self, table: DocTypeTable) -> Self {
        self.doc_types = table;
        self
    }

    fn extract_items(
        &self,
        cleaned: &str,
        journal: Journal,
    ) -> std::result::Result<Vec<MarkantItem>, AdviceError> {
        let segments = segment(cleaned, journal)?;

        let mut single = Vec::new();
        let mut dual = Vec::new();

        for seg in segments {
            match seg.matches("EUR").count() {
                0 => return Err(AdviceError::MissingCurrencyMarker),
                1 => single.push(seg),
                _ => dual.push(seg),
            }
        }

        if journal == Journal::Invoicing && !dual.is_empty() {
            return Err(AdviceError::MultilineItemNotAllowed);
        }

        // The corrections journal has no structured item lines to parse;
        // only the document metadata is extracted.
        if journal == Journal::Corrections {
            return Ok(Vec::new());
        }

        let mut items = Vec::new();

        for seg in single {
            let raw = parse_single_segment(seg, journal)?;
            items.push(coerce_item(raw, journal)?);
        }

        for seg in dual {
            let (first, second) = parse_dual_segment(seg, journal)?;
            items.push(coerce_item(first, journal)?);
            items.push(coerce_item(second, journal)?);
        }

        Ok(items)
    }

    fn validate_totals(
        items: &[MarkantItem],
        totals: &SummaryTotals,
    ) -> std::result::Result<(), AdviceError> {
        let checks: [(&'static str, Decimal, Decimal); 6] = [
            (
                "total gross amount",
                totals.gross_amount,
                items.iter().map(|i| i.gross_amount).sum(),
            ),
            (
                "total Markant SB condition",
                totals.markant_gross,
                items.iter().map(|i| i.markant_sb_condition).sum(),
            ),
            (
                "total customer SB condition",
                totals.customer_gross,
                items.iter().map(|i| i.customer_sb_condition).sum(),
            ),
            (
                "total discount",
                totals.discount,
                items.iter().map(|i| i.discount).sum(),
            ),
            (
                "total DL condition",
                totals.dl_condition,
                items.iter().map(|i| i.dl_condition).sum(),
            ),
            (
                "total net amount",
                totals.net_amount,
                items.iter().map(|i| i.net_amount).sum(),
            ),
        ];

        for (total, stated, computed) in checks {
            if stated != computed.round_dp(2) {
                return Err(AdviceError::TotalsMismatch {
                    total,
                    stated,
                    computed: computed.round_dp(2),
                });
            }
        }

        Ok(())
    }

    fn enrich(
        &self,
        items: &mut [MarkantItem],
        journal: Journal,
        accounting_map: &IlnMap,
        threshold: Decimal,
    ) -> std::result::Result<(), AdviceError> {
        for item in items.iter_mut() {
            // The conditions are stated positive on the advice but represent
            // deductions.
            item.markant_sb_condition = -item.markant_sb_condition;
            item.customer_sb_condition = -item.customer_sb_condition;
            item.discount = -item.discount;
            item.dl_condition = -item.dl_condition;

            item.debitor = *accounting_map
                .get(&item.iln)
                .ok_or_else(|| AdviceError::AccountNotFound {
                    key: item.iln.to_string(),
                })?;

            item.search_key = format!("*{}*", item.archive_number);
            item.tax_code = match self.tax_codes.code_for(item.tax_rate) {
                Some(code) => code.to_string(),
                None => {
                    warn!("Could not assign a tax code to the tax rate: {}!", item.tax_rate);
                    String::new()
                }
            };

            if let Some(label) = self.doc_types.label_for(&item.document_type) {
                item.document_type = label.to_string();
            }
        }

        if journal == Journal::Invoicing {
            let mut seen = HashSet::new();
            for item in items.iter_mut() {
                item.overpayment = Some(!seen.insert(item.document_number.clone()));
                item.search_key = format!("*{}*", item.document_number);
            }
        }

        if journal == Journal::Other {
            for item in items.iter_mut() {
                if item.document_type == "Debit"
                    && item.gross_amount > -threshold
                    && item.gross_amount < Decimal::ZERO
                {
                    item.document_type = "WriteOff".to_string();
                }
            }
        }

        for item in items.iter_mut() {
            item.gross_amount_abs = item.gross_amount.abs();
        }

        Ok(())
    }
}

fn cell(item: &MarkantItem, field: &str) -> CellValue {
    match field {
        "ILN" => CellValue::UInt(item.iln),
        "Document_Number" => match item.document_number_value {
            Some(num) => CellValue::UInt(num),
            None => CellValue::Text(item.document_number.clone()),
        },
        "Original_Document" => CellValue::Text(item.original_document.clone()),
        "Document_Date" => CellValue::Date(item.document_date),
        "Document_Type" => CellValue::Text(item.document_type.clone()),
        "Archive_Number" => CellValue::UInt(item.archive_number),
        "Gross_Amount" => CellValue::Decimal(item.gross_amount),
        "Tax_Rate" => CellValue::Decimal(item.tax_rate),
        "Markant_SB_Condition" => CellValue::Decimal(item.markant_sb_condition),
        "Customer_SB_Condition" => CellValue::Decimal(item.customer_sb_condition),
        "Discount" => CellValue::Decimal(item.discount),
        "DL_Condition" => CellValue::Decimal(item.dl_condition),
        "Net_Amount" => CellValue::Decimal(item.net_amount),
        "Debitor" => CellValue::UInt(item.debitor),
        "Case_ID" => CellValue::Missing,
        "Search_Key" => CellValue::Text(item.search_key.clone()),
        "Tax_Code" => CellValue::Text(item.tax_code.clone()),
        "Overpayment" => item
            .overpayment
            .map(CellValue::Bool)
            .unwrap_or(CellValue::Missing),
        "On_Account_Text" => CellValue::Missing,
        "Gross_Amount_(ABS)" => CellValue::Decimal(item.gross_amount_abs),
        _ => CellValue::Missing,
    }
}

impl AdviceParser for MarkantParser {
    fn parse(
        &self,
        text: &str,
        accounting_map: &AccountingMap,
        threshold: Decimal,
        fields: &[String],
        date_format: &str,
    ) -> Result<ParsedAdvice> {
        let AccountingMap::Iln(iln_map) = accounting_map else {
            return Err(ConfigError::MapShapeMismatch(Customer::MarkantDe).into());
        };

        if iln_map.is_empty() {
            return Err(ConfigError::EmptyAccountingMap.into());
        }

        if threshold <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveThreshold(threshold).into());
        }

        if let Some(unknown) = fields
            .iter()
            .find(|f| !MARKANT_COLUMNS.contains(&f.as_str()))
        {
            return Err(ConfigError::UnknownField(unknown.clone()).into());
        }

        if text.is_empty() {
            return Err(AdviceError::EmptyText.into());
        }

        let journal = Journal::detect(text)?;
        if journal == Journal::Services {
            return Err(AdviceError::UnsupportedJournal(journal).into());
        }

        let header = extract_header(text)?;
        debug!(
            "Parsing Markant payment advice {} for supplier {} ({})",
            header.advice_number,
            header.supplier_id,
            journal.tag()
        );

        let cleaned = clean_text(text, journal)?;
        let mut items = self.extract_items(&cleaned, journal)?;

        // The calculated totals must agree with the totals stated on the
        // advice. The corrections journal extracts no items, so there is
        // nothing to reconcile.
        if journal != Journal::Corrections {
            Self::validate_totals(&items, &header.totals)?;
        }

        self.enrich(&mut items, journal, iln_map, threshold)?;

        items.sort_by(|a, b| {
            a.document_type
                .cmp(&b.document_type)
                .then_with(|| a.tax_code.cmp(&b.tax_code))
                .then_with(|| a.gross_amount_abs.cmp(&b.gross_amount_abs))
        });

        let mut layout: Vec<String> = fields.to_vec();
        if journal == Journal::Invoicing {
            layout.retain(|f| f != "Gross_Amount_(ABS)" && f != "On_Account_Text");
        }

        let mut table = ItemTable::new(layout.clone());
        for item in &items {
            table.push_row(layout.iter().map(|f| cell(item, f)).collect());
        }

        Ok(ParsedAdvice {
            items: table,
            remittance_number: header.advice_number,
            remittance_date: format_date(header.advice_date, date_format)?,
            remittance_type: journal.tag().to_string(),
            remittance_name: journal.local_name().to_string(),
            supplier_id: String::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// Write `token` into `line` so that it ends at column `end`.
    fn put(line: &mut Vec<u8>, end: usize, token: &str) {
        if line.len() < end {
            line.resize(end, b' ');
        }
        line[end - token.len()..end].copy_from_slice(token.as_bytes());
    }

    fn amount_line(slots: &[(usize, &str)]) -> String {
        let mut line = Vec::new();
        for (end, token) in slots {
            put(&mut line, *end, token);
        }
        String::from_utf8(line).unwrap()
    }

    #[test]
    fn test_detect_journal() {
        assert_eq!(
            Journal::detect("Journal 10 Rechnungen/Gutschriften").unwrap(),
            Journal::Invoicing
        );
        assert_eq!(
            Journal::detect("Journal 20 Belastungen/Rückbelastungen").unwrap(),
            Journal::Other
        );
        assert_eq!(
            Journal::detect("Journal 30 Korrekturen").unwrap(),
            Journal::Corrections
        );
        assert_eq!(
            Journal::detect("Journal 22 sonstige Leistungen").unwrap(),
            Journal::Services
        );
        assert!(matches!(
            Journal::detect("Zahlungsavis").unwrap_err(),
            AdviceError::UnknownJournal
        ));
    }

    #[test]
    fn test_tax_code_table() {
        let table = TaxCodeTable::default();
        assert_eq!(table.code_for(dec("20.00")), Some("C6"));
        assert_eq!(table.code_for(dec("19.00")), Some("AB"));
        assert_eq!(table.code_for(dec("16.00")), Some("AA"));
        assert_eq!(table.code_for(dec("0.00")), Some("C3"));
        assert_eq!(table.code_for(dec("7.00")), None);
    }

    #[test]
    fn test_doc_type_table() {
        let table = DocTypeTable::default();
        assert_eq!(table.label_for("RG"), Some("Invoice"));
        assert_eq!(table.label_for("Bela"), Some("Debit"));
        assert_eq!(table.label_for("RetRb"), Some("Credit"));
        assert_eq!(table.label_for("XYZ"), None);
    }

    #[test]
    fn test_original_document() {
        assert_eq!(original_document("RE/987654", Journal::Other), "987654");
        assert_eq!(original_document("987654", Journal::Other), "987654");
        assert_eq!(original_document("RE/987654", Journal::Invoicing), "");
    }

    #[test]
    fn test_extract_line_amounts() {
        let line = amount_line(&[(66, "119,00"), (78, "19,00"), (197, "100,00")]);
        let amounts = extract_line_amounts(&line).unwrap();

        assert_eq!(amounts.gross_amount, "119,00");
        assert_eq!(amounts.tax_rate, "19,00");
        assert_eq!(amounts.net_amount, "100,00");
        assert_eq!(amounts.markant_amount, "0.00");
        assert_eq!(amounts.discount, "0.00");
    }

    #[test]
    fn test_extract_line_amounts_missing_required_slot() {
        let line = amount_line(&[(66, "119,00"), (197, "100,00")]);
        let err = extract_line_amounts(&line).unwrap_err();
        assert!(matches!(err, AdviceError::MissingAmountSlot(SLOT_TAX)));
    }

    #[test]
    fn test_extract_line_amounts_stray_token() {
        // Ends at column 73, in the gap between gross and tax rate.
        let line = amount_line(&[(73, "119,00")]);
        let err = extract_line_amounts(&line).unwrap_err();
        assert!(matches!(err, AdviceError::AmountOutOfColumns { end: 73 }));
    }

    #[test]
    fn test_extract_summary() {
        let mut line = Vec::new();
        line.extend_from_slice(b"Gesamtsumme auf Journal 10");
        put(&mut line, 66, "119,00");
        put(&mut line, 194, "100,00");
        let line = String::from_utf8(line).unwrap();

        let totals = extract_summary(&line).unwrap();
        assert_eq!(totals.gross_amount, dec("119.00"));
        assert_eq!(totals.net_amount, dec("100.00"));
        assert_eq!(totals.markant_gross, Decimal::ZERO);
        assert_eq!(totals.discount, Decimal::ZERO);
    }

    #[test]
    fn test_clean_text_invoicing() {
        let text = "  GLN-RA: 1\n   Summenwerte 10,00\n  GLN-RA: 2\n\n\n\n  ReLi 4711\n";
        let cleaned = clean_text(text, Journal::Invoicing).unwrap();
        assert!(!cleaned.contains("Summenwerte"));
        assert!(!cleaned.contains("ReLi"));
        assert!(!cleaned.contains("\n\n\n"));
    }

    #[test]
    fn test_clean_text_other_cuts_summary_block() {
        let text = "  GLN-RA: 1\n  Summenwerte\n  Gesamtsumme auf Journal 20\ntrailer";
        let cleaned = clean_text(text, Journal::Other).unwrap();
        assert!(cleaned.contains("GLN-RA"));
        assert!(!cleaned.contains("Gesamtsumme"));
        assert!(!cleaned.contains("trailer"));
    }

    #[test]
    fn test_services_journal_unsupported() {
        let err = clean_text("whatever", Journal::Services).unwrap_err();
        assert!(matches!(
            err,
            AdviceError::UnsupportedJournal(Journal::Services)
        ));
    }
}
