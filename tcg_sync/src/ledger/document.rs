//! JSON shape of the persisted ledger document.
//!
//! ```json
//! { "name": "...", "format": "...",
//!   "cards": [ { "id": "sv1-50", "qty": 2, "price": 1.5,
//!                "variants": { "normal": { "qty": 2, "price": 1.5 } } } ] }
//! ```
//!
//! Only `variants` is authoritative. Top-level `qty`/`price` mirror the
//! `normal` variant for older readers.

use super::aggregate::merge;
use super::model::Ledger;
use super::normalize::{normalize_entry, QuantityMode};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tcg_common::{Price, VariantKey};

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    name: String,
    #[serde(default)]
    format: String,
    #[serde(default)]
    cards: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct StoredDocument<'a> {
    name: &'a str,
    format: &'a str,
    cards: Vec<StoredCard<'a>>,
}

#[derive(Debug, Serialize)]
struct StoredCard<'a> {
    id: &'a str,
    qty: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<Price>,
    variants: BTreeMap<VariantKey, StoredVariant>,
}

#[derive(Debug, Serialize)]
struct StoredVariant {
    qty: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<Price>,
}

/// Decode a ledger document, normalizing every card entry.
pub fn decode(json: &str) -> Result<Ledger, LedgerError> {
    let raw: RawDocument =
        serde_json::from_str(json).map_err(|e| LedgerError::Validation(e.to_string()))?;

    let total = raw.cards.len();
    let entries: Vec<_> = raw
        .cards
        .iter()
        .filter_map(|card| normalize_entry(card, QuantityMode::NonNegative))
        .collect();
    if entries.len() < total {
        log::debug!(
            "Ignored {} ledger entries without usable id or variants",
            total - entries.len()
        );
    }

    Ok(Ledger {
        name: raw.name,
        format: raw.format,
        cards: merge(entries, Vec::new()),
    })
}

/// Encode a ledger into its canonical document form.
pub fn encode(ledger: &Ledger) -> Result<String, LedgerError> {
    let cards = ledger
        .entries()
        .map(|entry| StoredCard {
            id: &entry.id,
            qty: entry.quantity(VariantKey::Normal),
            price: entry.price(VariantKey::Normal),
            variants: entry
                .variants
                .iter()
                .map(|(key, record)| {
                    (
                        *key,
                        StoredVariant {
                            qty: record.quantity,
                            price: record.price,
                        },
                    )
                })
                .collect(),
        })
        .collect();

    let doc = StoredDocument {
        name: &ledger.name,
        format: &ledger.format,
        cards,
    };
    serde_json::to_string_pretty(&doc).map_err(|e| LedgerError::Validation(e.to_string()))
}
