//! Parser for payment (remittance) advices issued by OBI.
//!
//! The current version supports the German layout of the documents only.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{AdviceError, ConfigError, Result};
use crate::models::{AccountingMap, BranchMap, CellValue, ItemTable};

use super::rules::{format_date, parse_advice_amount, parse_amount_column, parse_day_first};
use super::{AdviceParser, Customer, ParsedAdvice};

const VAT_CODE_FRANCE_INTRACOMMUNITY: &str = "C3";
const VAT_CODE_GERMANY_NO_TAX_PROCEDURE: &str = "A0";
const HEAD_OFFICE_BUSINESS_UNIT: &str = "850";
const TRANSPORT_COSTS_BUSINESS_UNIT: &str = "875";
const BONUS_BUSINESS_UNIT: &str = "950";

const PENALTY_PREFIXES: &[&str] = &["DE", "PE"];

/// Columns the OBI parser can produce.
const OBI_COLUMNS: &[&str] = &[
    "Branch_Number",
    "Gross_Amount",
    "Deduction",
    "Net_Amount",
    "Document_Number",
    "Note",
    "Case_ID",
    "On_Account_Text",
    "Tax_Code",
    "Discount",
    "Provision_Discount",
    "Debitor",
    "Document_Type",
    "GL_Account",
    "Gross_Amount_(ABS)",
];

lazy_static! {
    static ref ADVICE_NUMBER: Regex =
        Regex::new(r"Überweisung Nr\. (?P<num>\d{8}) ").unwrap();
    static ref ADVICE_DATE: Regex =
        Regex::new(r"Datum (?P<date>\d{2}\.\d{2}\.\d{4}) ").unwrap();
    static ref SUPPLIER_NUMBER: Regex =
        Regex::new(r"Ihre Kto-Nr bei uns (?P<supplier>\d{4})").unwrap();
    static ref TOTAL_AMOUNTS: Regex =
        Regex::new(r"Gesamt-Summe:\s+(?P<ded>\S+)\s+(?P<net>\S+)").unwrap();

    // One accounting item: branch and amounts on the EUR line, the document
    // number on the line after the following blank line, then an optional
    // note line starting at column zero.
    static ref ITEM_LINE: Regex =
        Regex::new(r"(\d*).*EUR\s+(\d\S+)\s+(\S+)\s+(\S+)\n\n(\S+).*\n+(\S.*)?").unwrap();

    static ref CREDIT_INVOICE_NUMBER: Regex = Regex::new(r"^41\d{7}").unwrap();
}

/// Accounting classification of one OBI item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ObiDocType {
    Debit,
    WriteOffPenalty,
    WriteOffOthers,
    Credit,
    CreditInvoice,
}

impl ObiDocType {
    fn as_str(&self) -> &'static str {
        match self {
            ObiDocType::Debit => "Debit",
            ObiDocType::WriteOffPenalty => "WriteOff Penalty",
            ObiDocType::WriteOffOthers => "WriteOff Others",
            ObiDocType::Credit => "Credit",
            ObiDocType::CreditInvoice => "Credit/Invoice",
        }
    }
}

/// Classify an accounting item by its gross amount and document number.
fn item_type(gross_amount: Decimal, doc_num: &str, threshold: Decimal) -> ObiDocType {
    if gross_amount <= -threshold {
        ObiDocType::Debit
    } else if gross_amount < Decimal::ZERO {
        if PENALTY_PREFIXES.iter().any(|p| doc_num.starts_with(p)) {
            ObiDocType::WriteOffPenalty
        } else {
            ObiDocType::WriteOffOthers
        }
    } else if !CREDIT_INVOICE_NUMBER.is_match(doc_num) {
        ObiDocType::Credit
    } else {
        ObiDocType::CreditInvoice
    }
}

/// GL account for write-off items. Other document types post to the debitor
/// account and carry no GL account.
fn gl_account(doc_type: ObiDocType) -> Option<u32> {
    match doc_type {
        ObiDocType::WriteOffPenalty => Some(66010030), // penalties
        ObiDocType::WriteOffOthers => Some(66791580),  // delivery, price difference, return, bonus
        _ => None,
    }
}

#[derive(Debug)]
struct ObiHeader {
    advice_number: String,
    advice_date: NaiveDate,
    supplier_id: String,
    total_net_amount: Decimal,
    total_deductions: Decimal,
}

fn extract_header(text: &str) -> std::result::Result<ObiHeader, AdviceError> {
    let caps = ADVICE_NUMBER
        .captures(text)
        .ok_or(AdviceError::MissingHeader("payment advice number"))?;
    let advice_number = caps["num"].to_string();

    let caps = ADVICE_DATE
        .captures(text)
        .ok_or(AdviceError::MissingHeader("payment advice date"))?;
    let advice_date = parse_day_first(&caps["date"])?;

    let caps = SUPPLIER_NUMBER
        .captures(text)
        .ok_or(AdviceError::MissingHeader("supplier number"))?;
    let supplier_id = caps["supplier"].to_string();

    let caps = TOTAL_AMOUNTS
        .captures(text)
        .ok_or(AdviceError::MissingHeader("total amounts"))?;
    let total_deductions = parse_advice_amount(&caps["ded"])?;
    let total_net_amount = parse_advice_amount(&caps["net"])?;

    Ok(ObiHeader {
        advice_number,
        advice_date,
        supplier_id,
        total_net_amount,
        total_deductions,
    })
}

#[derive(Debug, Clone)]
struct ObiItem {
    branch_number: u16,
    gross_amount: Decimal,
    deduction: Decimal,
    net_amount: Decimal,
    document_number: String,
    note: String,
    case_id: Option<String>,
    on_account_text: Option<String>,
    tax_code: &'static str,
    discount: Decimal,
    provision_discount: Decimal,
    debitor: u64,
    document_type: ObiDocType,
    gl_account: Option<u32>,
    gross_amount_abs: Decimal,
}

fn cell(item: &ObiItem, field: &str) -> CellValue {
    match field {
        "Branch_Number" => CellValue::UInt(item.branch_number as u64),
        "Gross_Amount" => CellValue::Decimal(item.gross_amount),
        "Deduction" => CellValue::Decimal(item.deduction),
        "Net_Amount" => CellValue::Decimal(item.net_amount),
        "Document_Number" => CellValue::Text(item.document_number.clone()),
        "Note" => CellValue::Text(item.note.clone()),
        "Case_ID" => item
            .case_id
            .clone()
            .map(CellValue::Text)
            .unwrap_or(CellValue::Missing),
        "On_Account_Text" => item
            .on_account_text
            .clone()
            .map(CellValue::Text)
            .unwrap_or(CellValue::Missing),
        "Tax_Code" => CellValue::Text(item.tax_code.to_string()),
        "Discount" => CellValue::Decimal(item.discount),
        "Provision_Discount" => CellValue::Decimal(item.provision_discount),
        "Debitor" => CellValue::UInt(item.debitor),
        "Document_Type" => CellValue::Text(item.document_type.as_str().to_string()),
        "GL_Account" => item
            .gl_account
            .map(|a| CellValue::UInt(a as u64))
            .unwrap_or(CellValue::Missing),
        "Gross_Amount_(ABS)" => CellValue::Decimal(item.gross_amount_abs),
        _ => CellValue::Missing,
    }
}

/// Parser for OBI Germany payment advices.
#[derive(Debug, Default)]
pub struct ObiParser;

impl ObiParser {
    pub fn new() -> Self {
        Self
    }

    fn extract_items(
        &self,
        text: &str,
        header: &ObiHeader,
        accounting_map: &BranchMap,
        threshold: Decimal,
    ) -> std::result::Result<Vec<ObiItem>, AdviceError> {
        let mut branches = Vec::new();
        let mut gross = Vec::new();
        let mut deductions = Vec::new();
        let mut nets = Vec::new();
        let mut doc_numbers = Vec::new();
        let mut notes = Vec::new();

        for caps in ITEM_LINE.captures_iter(text) {
            branches.push(caps[1].to_string());
            gross.push(caps[2].to_string());
            deductions.push(caps[3].to_string());
            nets.push(caps[4].to_string());
            doc_numbers.push(caps[5].to_string());
            notes.push(caps.get(6).map(|m| m.as_str().to_string()).unwrap_or_default());
        }

        if branches.is_empty() {
            return Err(AdviceError::NoItems);
        }

        let gross = parse_amount_column(&gross, "Gross_Amount")?;
        let deductions = parse_amount_column(&deductions, "Deduction")?;
        let nets = parse_amount_column(&nets, "Net_Amount")?;

        let branch_accounts = accounting_map
            .get(&header.supplier_id)
            .ok_or_else(|| AdviceError::AccountNotFound {
                key: header.supplier_id.clone(),
            })?;

        let mut items = Vec::with_capacity(branches.len());

        for i in 0..branches.len() {
            // When the branch number is not stated, the item belongs to the
            // head office.
            let branch = if branches[i].is_empty() {
                HEAD_OFFICE_BUSINESS_UNIT.to_string()
            } else {
                branches[i].clone()
            };

            let debitor = *branch_accounts.get(&branch).ok_or_else(|| {
                AdviceError::AccountNotFound {
                    key: format!("{}/{}", header.supplier_id, branch),
                }
            })?;

            let deduction = deductions[i];
            let tax_code = if branch == HEAD_OFFICE_BUSINESS_UNIT || branch == BONUS_BUSINESS_UNIT
            {
                "check"
            } else if deduction.is_zero() {
                VAT_CODE_GERMANY_NO_TAX_PROCEDURE
            } else {
                VAT_CODE_FRANCE_INTRACOMMUNITY
            };

            let document_number = doc_numbers[i].clone();
            let mut document_type = item_type(gross[i], &document_number, threshold);
            let mut case_id = None;
            let mut on_account_text = None;

            // Transport cost items are always debits posted on account.
            if branch == TRANSPORT_COSTS_BUSINESS_UNIT {
                case_id = Some("NA".to_string());
                document_type = ObiDocType::Debit;
                on_account_text = Some(format!("{} Fracht", document_number));
            }

            let branch_number =
                branch
                    .parse::<u16>()
                    .map_err(|_| AdviceError::InvalidNumber {
                        field: "Branch_Number",
                        value: branch.clone(),
                    })?;

            items.push(ObiItem {
                branch_number,
                gross_amount: gross[i],
                deduction,
                net_amount: nets[i],
                document_number,
                note: notes[i].clone(),
                case_id,
                on_account_text,
                tax_code,
                discount: deduction / Decimal::from(5) * Decimal::from(3),
                provision_discount: deduction / Decimal::from(5) * Decimal::from(2),
                debitor,
                document_type,
                gl_account: None,
                gross_amount_abs: Decimal::ZERO,
            });
        }

        for item in &mut items {
            item.gl_account = gl_account(item.document_type);
            item.gross_amount_abs = item.gross_amount.abs();
        }

        Ok(items)
    }
}

impl AdviceParser for ObiParser {
    fn parse(
        &self,
        text: &str,
        accounting_map: &AccountingMap,
        threshold: Decimal,
        fields: &[String],
        date_format: &str,
    ) -> Result<ParsedAdvice> {
        let AccountingMap::Branch(branch_map) = accounting_map else {
            return Err(ConfigError::MapShapeMismatch(Customer::ObiDe).into());
        };

        if branch_map.is_empty() {
            return Err(ConfigError::EmptyAccountingMap.into());
        }

        if threshold <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveThreshold(threshold).into());
        }

        if let Some(unknown) = fields.iter().find(|f| !OBI_COLUMNS.contains(&f.as_str())) {
            return Err(ConfigError::UnknownField(unknown.clone()).into());
        }

        if text.is_empty() {
            return Err(AdviceError::EmptyText.into());
        }

        let header = extract_header(text)?;
        debug!(
            "Parsing OBI payment advice {} for supplier {}",
            header.advice_number, header.supplier_id
        );

        let mut items = self.extract_items(text, &header, branch_map, threshold)?;

        // The calculated totals must agree with the totals stated on the
        // advice; a mismatch means item extraction missed or mis-sliced data.
        let calc_net: Decimal = items.iter().map(|i| i.net_amount).sum();
        let calc_deductions: Decimal = items.iter().map(|i| i.deduction).sum();

        if calc_net.round_dp(2) != header.total_net_amount {
            return Err(AdviceError::TotalsMismatch {
                total: "total net amount",
                stated: header.total_net_amount,
                computed: calc_net.round_dp(2),
            }
            .into());
        }

        if calc_deductions.round_dp(2) != header.total_deductions {
            return Err(AdviceError::TotalsMismatch {
                total: "total deductions",
                stated: header.total_deductions,
                computed: calc_deductions.round_dp(2),
            }
            .into());
        }

        items.sort_by(|a, b| {
            a.document_type
                .as_str()
                .cmp(b.document_type.as_str())
                .then_with(|| a.tax_code.cmp(b.tax_code))
                .then_with(|| a.gross_amount_abs.cmp(&b.gross_amount_abs))
        });

        let mut table = ItemTable::new(fields.to_vec());
        for item in &items {
            table.push_row(fields.iter().map(|f| cell(item, f)).collect());
        }

        Ok(ParsedAdvice {
            items: table,
            remittance_number: header.advice_number,
            remittance_date: format_date(header.advice_date, date_format)?,
            remittance_type: String::new(),
            remittance_name: String::new(),
            supplier_id: header.supplier_id,
        })
    }
}
