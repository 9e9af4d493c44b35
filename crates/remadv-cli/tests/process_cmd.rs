//! Command-level tests for the process subcommand.

use std::fs;

use assert_cmd::Command;
use predicates::str::contains;

fn advice_text() -> String {
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

const RULES: &str = r#"{
    "OBI_DE": {
        "accounting_map": "obi_de",
        "threshold": "100.00",
        "layout": [
            "Debitor",
            "Branch_Number",
            "Document_Number",
            "Document_Type",
            "Tax_Code",
            "Gross_Amount",
            "Deduction",
            "Net_Amount",
            "GL_Account"
        ],
        "date_format": "%d.%m.%Y"
    }
}"#;

#[test]
fn process_converted_text_to_json() {
    let dir = tempfile::tempdir().unwrap();

    fs::write(
        dir.path().join("obi_de.json"),
        r#"{"1001": {"850": 66600123}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("rules.json"), RULES).unwrap();
    fs::write(dir.path().join("advice.txt"), advice_text()).unwrap();

    Command::cargo_bin("remadv")
        .unwrap()
        .arg("process")
        .arg(dir.path().join("advice.txt"))
        .arg("--rules")
        .arg(dir.path().join("rules.json"))
        .assert()
        .success()
        .stdout(contains("\"remittance_number\": \"00012345\""))
        .stdout(contains("WriteOff Others"));
}

#[test]
fn process_renders_csv() {
    let dir = tempfile::tempdir().unwrap();

    fs::write(
        dir.path().join("obi_de.json"),
        r#"{"1001": {"850": 66600123}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("rules.json"), RULES).unwrap();
    fs::write(dir.path().join("advice.txt"), advice_text()).unwrap();

    Command::cargo_bin("remadv")
        .unwrap()
        .arg("process")
        .arg(dir.path().join("advice.txt"))
        .arg("--rules")
        .arg(dir.path().join("rules.json"))
        .arg("--format")
        .arg("csv")
        .assert()
        .success()
        .stdout(contains("Debitor,Branch_Number,Document_Number"))
        .stdout(contains("66600123,850,123456,WriteOff Others"));
}

#[test]
fn unknown_customer_fails() {
    let dir = tempfile::tempdir().unwrap();

    fs::write(
        dir.path().join("obi_de.json"),
        r#"{"1001": {"850": 66600123}}"#,
    )
    .unwrap();
    fs::write(dir.path().join("rules.json"), RULES).unwrap();
    fs::write(dir.path().join("advice.txt"), "Edeka Zentrale Zahlungsavis").unwrap();

    Command::cargo_bin("remadv")
        .unwrap()
        .arg("process")
        .arg(dir.path().join("advice.txt"))
        .arg("--rules")
        .arg(dir.path().join("rules.json"))
        .assert()
        .failure()
        .stderr(contains("could not detect the customer name"));
}
