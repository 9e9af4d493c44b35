//! Customer processing rules and accounting map loading.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, bail};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use remadv_core::models::AccountingMap;

/// Processing rules for one customer, as stored in the rules file.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRules {
    /// Accounting map file name, resolved against the maps directory.
    pub accounting_map: String,

    /// Amount limit below which items are written off.
    pub threshold: Decimal,

    /// Order of columns in the processed data.
    pub layout: Vec<String>,

    /// Output format of the document date.
    pub date_format: String,

    /// Conversion options passed to the PDF text extractor.
    #[serde(default)]
    pub conversion_options: Option<String>,
}

/// Rules plus the resolved accounting map for one customer.
#[derive(Debug, Clone)]
pub struct CustomerProfile {
    pub rules: CustomerRules,
    pub map: AccountingMap,
}

/// Load the customer processing rules and resolve their accounting maps.
///
/// The rules file is a JSON document keyed by customer tag; each entry names
/// its accounting map file, looked up in `maps_dir` (a `.json` suffix is
/// appended when missing).
pub fn load_processing_rules(
    rules_path: &Path,
    maps_dir: &Path,
) -> anyhow::Result<HashMap<String, CustomerProfile>> {
    info!("Loading customer processing rules ...");

    let content = fs::read_to_string(rules_path)
        .with_context(|| format!("cannot read rules file: {}", rules_path.display()))?;
    let rules: HashMap<String, CustomerRules> = serde_json::from_str(&content)
        .with_context(|| format!("invalid rules file: {}", rules_path.display()))?;

    let mut profiles = HashMap::new();

    for (customer, rules) in rules {
        let mut map_name = rules.accounting_map.clone();
        if !map_name.ends_with(".json") {
            map_name.push_str(".json");
        }

        let map_path = maps_dir.join(&map_name);
        let map_content = fs::read_to_string(&map_path)
            .with_context(|| format!("cannot read accounting map: {}", map_path.display()))?;
        let map: AccountingMap =
            serde_json::from_str(map_content.trim_start_matches('\u{feff}'))
                .with_context(|| format!("invalid accounting map: {}", map_path.display()))?;

        if map.is_empty() {
            bail!("accounting map is empty: {}", map_path.display());
        }

        profiles.insert(customer, CustomerProfile { rules, map });
    }

    info!("Processing rules loaded.");
    Ok(profiles)
}
