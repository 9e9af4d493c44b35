//! Configuration value objects injected into the customer parsers.

use std::collections::HashMap;

use serde::Deserialize;

/// Maps OBI branch numbers to customer accounts, keyed by supplier number.
pub type BranchMap = HashMap<String, HashMap<String, u64>>;

/// Maps Markant ILN numbers to customer accounts.
pub type IlnMap = HashMap<u64, u64>;

/// A read-only mapping from customer-specific keys to ledger accounts,
/// loaded from a per-customer JSON file.
///
/// The two customers use different key shapes, so the variant must match the
/// customer the document was identified as; the orchestrator rejects a
/// mismatch before parsing starts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AccountingMap {
    /// `{ILN: debitor}` (Markant).
    Iln(IlnMap),
    /// `{supplier: {branch: debitor}}` (OBI).
    Branch(BranchMap),
}

impl AccountingMap {
    /// Whether the map carries no entries at all.
    pub fn is_empty(&self) -> bool {
        match self {
            AccountingMap::Iln(map) => map.is_empty(),
            AccountingMap::Branch(map) => map.is_empty(),
        }
    }
}
