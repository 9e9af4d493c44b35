//! End-to-end tests for the OBI payment advice parser.

use std::collections::HashMap;
use std::str::FromStr;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use remadv_core::advice::{AdviceParser, ObiParser, parse};
use remadv_core::error::{AdviceError, ConfigError, RemadvError};
use remadv_core::models::{AccountingMap, CellValue};

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn layout() -> Vec<String> {
    [
        "Debitor",
        "Branch_Number",
        "Document_Number",
        "Document_Type",
        "Case_ID",
        "On_Account_Text",
        "Tax_Code",
        "Gross_Amount",
        "Deduction",
        "Discount",
        "Provision_Discount",
        "Net_Amount",
        "GL_Account",
        "Gross_Amount_(ABS)",
        "Note",
    ]
    .iter()
    .map(|f| f.to_string())
    .collect()
}

fn accounting_map() -> AccountingMap {
    let mut branches = HashMap::new();
    branches.insert("850".to_string(), 66600123u64);
    branches.insert("875".to_string(), 66600321u64);

    let mut map = HashMap::new();
    map.insert("1001".to_string(), branches);
    AccountingMap::Branch(map)
}

/// A single write-off item with a blank branch number.
fn single_item_advice() -> String {
    [
        "   OBI GmbH & Co. Deutschland KG",
        " Überweisung Nr. 00012345 Datum 05.03.2024 Seite 1",
        " Ihre Kto-Nr bei uns 1001",
        "",
        " EUR  50,00-  0,00  50,00-",
        "",
        "123456 Lieferung",
        "",
        " Gesamt-Summe:  0,00  50,00-",
        "",
    ]
    .join("\n")
}

/// Three items: a bonus debit, a transport cost debit and a credited invoice.
fn multi_item_advice() -> String {
    [
        "   OBI GmbH & Co. Deutschland KG",
        " Überweisung Nr. 00098765 Datum 12.11.2024 Seite 1",
        " Ihre Kto-Nr bei uns 1001",
        "",
        "850 Markt Koeln EUR  250,00-  0,00  250,00-",
        "",
        "41234567 Rechnung",
        "Bonus Q1",
        "",
        "875 Frachtstelle EUR  20,00-  0,00  20,00-",
        "",
        "TR1001 Transport",
        "Frachtkosten",
        "",
        " EUR  120,00  5,00  115,00",
        "",
        "41239999 Gutschrift",
        "",
        " Gesamt-Summe:  5,00  155,00-",
        "",
    ]
    .join("\n")
}

#[test]
fn single_write_off_item() {
    let result = parse(
        &single_item_advice(),
        &accounting_map(),
        dec("100.00"),
        &layout(),
        "%d.%m.%Y",
    )
    .unwrap();

    assert_eq!(result.remittance_number, "00012345");
    assert_eq!(result.remittance_date, "05.03.2024");
    assert_eq!(result.remittance_type, "");
    assert_eq!(result.remittance_name, "");
    assert_eq!(result.supplier_id, "1001");

    let items = &result.items;
    assert_eq!(items.fields(), layout().as_slice());
    assert_eq!(items.len(), 1);

    // A blank branch defaults to the head office.
    assert_eq!(items.get(0, "Branch_Number"), Some(&CellValue::UInt(850)));
    assert_eq!(
        items.get(0, "Document_Type"),
        Some(&CellValue::Text("WriteOff Others".to_string()))
    );
    assert_eq!(items.get(0, "GL_Account"), Some(&CellValue::UInt(66791580)));
    assert_eq!(items.get(0, "Debitor"), Some(&CellValue::UInt(66600123)));
    assert_eq!(
        items.get(0, "Gross_Amount"),
        Some(&CellValue::Decimal(dec("-50.00")))
    );
    assert_eq!(
        items.get(0, "Tax_Code"),
        Some(&CellValue::Text("check".to_string()))
    );
    assert_eq!(items.get(0, "Case_ID"), Some(&CellValue::Missing));
    assert_eq!(items.get(0, "Note"), Some(&CellValue::Text(String::new())));
}

#[test]
fn multi_item_advice_sorted_and_enriched() {
    let result = parse(
        &multi_item_advice(),
        &accounting_map(),
        dec("100.00"),
        &layout(),
        "%d.%m.%Y",
    )
    .unwrap();

    let items = &result.items;
    assert_eq!(items.len(), 3);

    // Sorted by document type, tax code, then absolute gross amount.
    assert_eq!(
        items.column("Document_Type").unwrap(),
        vec![
            &CellValue::Text("Credit/Invoice".to_string()),
            &CellValue::Text("Debit".to_string()),
            &CellValue::Text("Debit".to_string()),
        ]
    );
    assert_eq!(
        items.column("Tax_Code").unwrap(),
        vec![
            &CellValue::Text("check".to_string()),
            &CellValue::Text("A0".to_string()),
            &CellValue::Text("check".to_string()),
        ]
    );

    // Credited invoice: deduction split into discount and provision parts.
    assert_eq!(
        items.get(0, "Document_Number"),
        Some(&CellValue::Text("41239999".to_string()))
    );
    assert_eq!(items.get(0, "Discount"), Some(&CellValue::Decimal(dec("3.00"))));
    assert_eq!(
        items.get(0, "Provision_Discount"),
        Some(&CellValue::Decimal(dec("2.00")))
    );

    // Transport cost item forced to a debit posted on account.
    assert_eq!(
        items.get(1, "Document_Number"),
        Some(&CellValue::Text("TR1001".to_string()))
    );
    assert_eq!(
        items.get(1, "Case_ID"),
        Some(&CellValue::Text("NA".to_string()))
    );
    assert_eq!(
        items.get(1, "On_Account_Text"),
        Some(&CellValue::Text("TR1001 Fracht".to_string()))
    );
    assert_eq!(items.get(1, "GL_Account"), Some(&CellValue::Missing));
    assert_eq!(items.get(1, "Debitor"), Some(&CellValue::UInt(66600321)));

    // Bonus debit keeps its note line.
    assert_eq!(
        items.get(2, "Note"),
        Some(&CellValue::Text("Bonus Q1".to_string()))
    );
    assert_eq!(
        items.get(2, "Gross_Amount_(ABS)"),
        Some(&CellValue::Decimal(dec("250.00")))
    );
}

#[test]
fn parsing_is_idempotent() {
    let map = accounting_map();
    let first = parse(&multi_item_advice(), &map, dec("100.00"), &layout(), "%d.%m.%Y").unwrap();
    let second = parse(&multi_item_advice(), &map, dec("100.00"), &layout(), "%d.%m.%Y").unwrap();
    assert_eq!(first, second);
}

#[test]
fn totals_mismatch_is_fatal() {
    let tampered = multi_item_advice().replace("Gesamt-Summe:  5,00", "Gesamt-Summe:  6,00");

    let err = parse(&tampered, &accounting_map(), dec("100.00"), &layout(), "%d.%m.%Y")
        .unwrap_err();

    match err {
        RemadvError::Parsing(parsing) => assert!(matches!(
            parsing.cause(),
            AdviceError::TotalsMismatch {
                total: "total deductions",
                ..
            }
        )),
        other => panic!("expected a parsing error, got {other:?}"),
    }
}

#[test]
fn unresolved_branch_is_fatal() {
    let mut branches = HashMap::new();
    branches.insert("850".to_string(), 66600123u64);
    let mut map = HashMap::new();
    map.insert("1001".to_string(), branches);

    let err = parse(
        &multi_item_advice(),
        &AccountingMap::Branch(map),
        dec("100.00"),
        &layout(),
        "%d.%m.%Y",
    )
    .unwrap_err();

    match err {
        RemadvError::Parsing(parsing) => assert!(matches!(
            parsing.cause(),
            AdviceError::AccountNotFound { .. }
        )),
        other => panic!("expected a parsing error, got {other:?}"),
    }
}

#[test]
fn empty_text_is_rejected() {
    let err = ObiParser::new()
        .parse("", &accounting_map(), dec("100.00"), &layout(), "%d.%m.%Y")
        .unwrap_err();

    match err {
        RemadvError::Parsing(parsing) => {
            assert!(matches!(parsing.cause(), AdviceError::EmptyText))
        }
        other => panic!("expected a parsing error, got {other:?}"),
    }
}

#[test]
fn unknown_output_field_is_rejected() {
    let mut fields = layout();
    fields.push("Bogus_Column".to_string());

    let err = parse(
        &single_item_advice(),
        &accounting_map(),
        dec("100.00"),
        &fields,
        "%d.%m.%Y",
    )
    .unwrap_err();

    assert!(matches!(
        err,
        RemadvError::Config(ConfigError::UnknownField(_))
    ));
}

#[test]
fn map_shape_mismatch_is_rejected() {
    let iln_map = AccountingMap::Iln(HashMap::from([(4399901234567u64, 1000123u64)]));

    let err = parse(
        &single_item_advice(),
        &iln_map,
        dec("100.00"),
        &layout(),
        "%d.%m.%Y",
    )
    .unwrap_err();

    assert!(matches!(
        err,
        RemadvError::Config(ConfigError::MapShapeMismatch(_))
    ));
}

#[test]
fn non_positive_threshold_is_rejected() {
    let err = parse(
        &single_item_advice(),
        &accounting_map(),
        dec("0.00"),
        &layout(),
        "%d.%m.%Y",
    )
    .unwrap_err();

    assert!(matches!(
        err,
        RemadvError::Config(ConfigError::NonPositiveThreshold(_))
    ));
}

#[test]
fn unrecognized_customer_is_rejected() {
    let err = parse(
        "Edeka Zentrale Zahlungsavis",
        &accounting_map(),
        dec("100.00"),
        &layout(),
        "%d.%m.%Y",
    )
    .unwrap_err();

    assert!(matches!(err, RemadvError::UnrecognizedCustomer));
}
