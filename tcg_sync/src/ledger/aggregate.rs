//! Variant aggregation: merges a ledger with signed deltas.
//!
//! Merging is additive per (card, variant), floored at zero after each delta
//! in order, and keeps the base price unless a delta supplies one. The result
//! is always pruned: empty variant records and empty cards are dropped.

use super::model::{CardEntry, VariantRecord};
use super::normalize::{normalize_entry, QuantityMode};
use serde_json::Value;
use std::collections::BTreeMap;
use tcg_common::VariantKey;

/// Merge typed base entries with typed deltas.
///
/// Base quantities below zero count as zero. Deltas apply in order with a
/// running floor: removing more copies than exist stops at zero, and later
/// additions count from there. Delta prices override in order, so the last
/// delta that carries a price wins.
pub fn merge<B, D>(base: B, deltas: D) -> BTreeMap<String, CardEntry>
where
    B: IntoIterator<Item = CardEntry>,
    D: IntoIterator<Item = CardEntry>,
{
    let mut acc: BTreeMap<String, BTreeMap<VariantKey, VariantRecord>> = BTreeMap::new();

    for entry in base {
        let variants = acc.entry(entry.id).or_default();
        for (key, record) in entry.variants {
            let slot = variants.entry(key).or_default();
            slot.quantity += record.quantity.max(0);
            if record.price.is_some() {
                slot.price = record.price;
            }
        }
    }

    for delta in deltas {
        let variants = acc.entry(delta.id).or_default();
        for (key, record) in delta.variants {
            let slot = variants.entry(key).or_default();
            // Running floor: no delta takes a slot below zero
            slot.quantity = (slot.quantity + record.quantity).max(0);
            if record.price.is_some() {
                slot.price = record.price;
            }
        }
    }

    acc.into_iter()
        .filter_map(|(id, variants)| {
            let mut entry = CardEntry { id, variants };
            entry.prune();
            (!entry.is_empty()).then(|| (entry.id.clone(), entry))
        })
        .collect()
}

/// Merge raw JSON entries, normalizing field aliases first.
///
/// Entries that normalize to nothing (no id, no usable variants) are ignored.
pub fn aggregate<'a, B, D>(base: B, deltas: D) -> BTreeMap<String, CardEntry>
where
    B: IntoIterator<Item = &'a Value>,
    D: IntoIterator<Item = &'a Value>,
{
    let base: Vec<CardEntry> = base
        .into_iter()
        .filter_map(|raw| normalize_entry(raw, QuantityMode::NonNegative))
        .collect();
    let deltas: Vec<CardEntry> = deltas
        .into_iter()
        .filter_map(|raw| normalize_entry(raw, QuantityMode::Signed))
        .collect();
    log::debug!("Aggregating {} base entries with {} deltas", base.len(), deltas.len());
    merge(base, deltas)
}

#[cfg(test)]
#[path = "aggregate_tests.rs"]
mod tests;
