//! Ingestion adapter for loosely shaped card entries.
//!
//! Ledger documents and buffer payloads have been written by several tools
//! over time, so one logical field may appear under different names. Each
//! field has a prioritized alias list; the first alias present wins.

use super::model::{CardEntry, VariantRecord};
use serde_json::{Map, Value};
use tcg_common::{Price, VariantKey};

pub const ID_ALIASES: &[&str] = &["id", "cardId", "card_id", "cardID", "card"];
pub const QUANTITY_ALIASES: &[&str] = &["qty", "quantity", "count", "amount"];
pub const PRICE_ALIASES: &[&str] = &["price", "value", "cost"];
pub const VARIANTS_ALIASES: &[&str] = &["variants", "finishes"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityMode {
    /// Ledger contents: negative quantities are treated as zero
    NonNegative,
    /// Buffer deltas: negative quantities are decrements
    Signed,
}

fn first_alias<'a>(obj: &'a Map<String, Value>, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

fn read_id(obj: &Map<String, Value>) -> Option<String> {
    let id = match first_alias(obj, ID_ALIASES)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

fn read_quantity(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn read_price(value: &Value) -> Option<Price> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().map(Price::from_f64),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(Price::parse(s)),
        _ => None,
    };
    match parsed {
        Some(Ok(price)) => Some(price),
        Some(Err(e)) => {
            log::debug!("Ignoring unusable price {}: {}", value, e);
            None
        }
        None => None,
    }
}

fn read_record(value: &Value, mode: QuantityMode) -> Option<VariantRecord> {
    let (quantity, price) = match value {
        Value::Object(obj) => (
            first_alias(obj, QUANTITY_ALIASES).and_then(read_quantity),
            first_alias(obj, PRICE_ALIASES).and_then(read_price),
        ),
        other => (read_quantity(other), None),
    };
    let mut quantity = quantity.unwrap_or(0);
    if mode == QuantityMode::NonNegative {
        quantity = quantity.max(0);
    }
    let record = VariantRecord::new(quantity, price);
    record.is_retained().then_some(record)
}

/// Pick the source value for `key` from a variants object: the canonical wire
/// name first, then any other spelling that parses to the same key.
fn variant_source(variants: &Map<String, Value>, key: VariantKey) -> Option<&Value> {
    variants.get(key.as_str()).or_else(|| {
        variants
            .iter()
            .find(|(name, _)| VariantKey::parse(name) == Some(key))
            .map(|(_, v)| v)
    })
}

/// Normalize one raw entry into a [`CardEntry`].
///
/// Returns `None` when the entry has no usable id or no retained variant.
/// The `variants` object is authoritative; top-level quantity and price are
/// only read (as the `normal` variant) when no variants object exists.
pub fn normalize_entry(raw: &Value, mode: QuantityMode) -> Option<CardEntry> {
    let obj = raw.as_object()?;
    let mut entry = CardEntry::new(read_id(obj)?);

    match first_alias(obj, VARIANTS_ALIASES) {
        Some(Value::Object(variants)) => {
            for key in VariantKey::ALL {
                if let Some(record) = variant_source(variants, key).and_then(|v| read_record(v, mode))
                {
                    entry.variants.insert(key, record);
                }
            }
        }
        Some(other) => {
            log::debug!("Entry {} has a non-object variants field: {}", entry.id, other);
        }
        None => {
            if let Some(record) = read_record(raw, mode) {
                entry.variants.insert(VariantKey::Normal, record);
            }
        }
    }

    (!entry.is_empty()).then_some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_id_aliases_in_priority_order() {
        let raw = json!({"card_id": "sv1-2", "cardId": "sv1-1", "qty": 1});
        let entry = normalize_entry(&raw, QuantityMode::Signed).unwrap();
        assert_eq!(entry.id, "sv1-1");

        let raw = json!({"card": "sv1-3", "count": "2"});
        let entry = normalize_entry(&raw, QuantityMode::Signed).unwrap();
        assert_eq!(entry.id, "sv1-3");
        assert_eq!(entry.quantity(VariantKey::Normal), 2);
    }

    #[test]
    fn variants_object_is_authoritative() {
        let raw = json!({
            "id": "sv1-50",
            "qty": 9,
            "price": 4.0,
            "variants": {"foil": {"quantity": 2, "price": "1,25"}, "reverse_foil": 1}
        });
        let entry = normalize_entry(&raw, QuantityMode::NonNegative).unwrap();
        assert_eq!(entry.quantity(VariantKey::Normal), 0);
        assert_eq!(entry.quantity(VariantKey::Foil), 2);
        assert_eq!(entry.price(VariantKey::Foil), Some(Price::from_cents(125)));
        assert_eq!(entry.quantity(VariantKey::ReverseFoil), 1);
    }

    #[test]
    fn canonical_variant_name_beats_alias() {
        let raw = json!({"id": "a-1", "variants": {"reverse": 5, "reverseFoil": 2}});
        let entry = normalize_entry(&raw, QuantityMode::Signed).unwrap();
        assert_eq!(entry.quantity(VariantKey::ReverseFoil), 2);
    }

    #[test]
    fn base_mode_drops_negative_quantities() {
        let raw = json!({"id": "a-1", "variants": {"normal": {"qty": -4}}});
        assert!(normalize_entry(&raw, QuantityMode::NonNegative).is_none());

        let raw = json!({"id": "a-1", "variants": {"normal": {"qty": -4, "price": 1}}});
        let entry = normalize_entry(&raw, QuantityMode::NonNegative).unwrap();
        assert_eq!(entry.quantity(VariantKey::Normal), 0);
        assert_eq!(entry.price(VariantKey::Normal), Some(Price::from_cents(100)));
    }

    #[test]
    fn signed_mode_keeps_decrements() {
        let raw = json!({"id": "a-1", "variants": {"normal": {"qty": -4}}});
        let entry = normalize_entry(&raw, QuantityMode::Signed).unwrap();
        assert_eq!(entry.quantity(VariantKey::Normal), -4);
    }

    #[test]
    fn ignores_entries_without_id_or_variants() {
        assert!(normalize_entry(&json!({"qty": 3}), QuantityMode::Signed).is_none());
        assert!(normalize_entry(&json!({"id": "  ", "qty": 3}), QuantityMode::Signed).is_none());
        assert!(normalize_entry(&json!({"id": "a-1"}), QuantityMode::Signed).is_none());
        assert!(normalize_entry(&json!("a-1"), QuantityMode::Signed).is_none());
    }

    #[test]
    fn unknown_variant_keys_and_bad_prices_are_skipped() {
        let raw = json!({"id": "a-1", "variants": {"etched": 3, "normal": {"qty": 1, "price": "n/a"}}});
        let entry = normalize_entry(&raw, QuantityMode::Signed).unwrap();
        assert_eq!(entry.variants.len(), 1);
        assert_eq!(entry.price(VariantKey::Normal), None);
    }
}
