//! Pending edits that have not been merged into the ledger yet.

use super::model::{CardEntry, VariantRecord};
use std::collections::BTreeMap;
use tcg_common::{Price, VariantKey};

/// Largest signed adjustment a single buffer cell may hold
pub const MAX_DELTA: i64 = 999;
/// Smallest signed adjustment a single buffer cell may hold
pub const MIN_DELTA: i64 = -999;

/// Signed per-(card, variant) adjustments, each clamped to
/// [`MIN_DELTA`]..=[`MAX_DELTA`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaBuffer {
    entries: BTreeMap<String, CardEntry>,
}

impl DeltaBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str, key: VariantKey) -> i64 {
        self.entries.get(id).map(|e| e.quantity(key)).unwrap_or(0)
    }

    /// How much more can be added to this cell before hitting [`MAX_DELTA`]
    pub fn headroom(&self, id: &str, key: VariantKey) -> i64 {
        MAX_DELTA - self.get(id, key)
    }

    /// Adjust a cell by `quantity`, returning the amount actually applied
    /// after clamping.
    pub fn add(&mut self, id: &str, key: VariantKey, quantity: i64) -> i64 {
        let current = self.get(id, key);
        let target = (current + quantity).clamp(MIN_DELTA, MAX_DELTA);
        self.cell(id, key).quantity = target;
        target - current
    }

    /// Set a cell to an absolute value, clamped to the valid range
    pub fn set(&mut self, id: &str, key: VariantKey, quantity: i64) {
        self.cell(id, key).quantity = quantity.clamp(MIN_DELTA, MAX_DELTA);
    }

    /// Record a price override for the next merge
    pub fn set_price(&mut self, id: &str, key: VariantKey, price: Price) {
        self.cell(id, key).price = Some(price);
    }

    fn cell(&mut self, id: &str, key: VariantKey) -> &mut VariantRecord {
        self.entries
            .entry(id.to_string())
            .or_insert_with(|| CardEntry::new(id))
            .variants
            .entry(key)
            .or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(|e| !e.variants.values().any(|v| v.is_retained()))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drain the buffer into delta entries for the aggregation engine
    pub fn into_deltas(self) -> Vec<CardEntry> {
        self.entries
            .into_values()
            .filter_map(|mut e| {
                e.prune();
                (!e.is_empty()).then_some(e)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_saturates_at_maximum() {
        let mut buffer = DeltaBuffer::new();
        assert_eq!(buffer.add("sv1-50", VariantKey::Normal, 999), 999);
        assert_eq!(buffer.add("sv1-50", VariantKey::Normal, 999), 0);
        assert_eq!(buffer.get("sv1-50", VariantKey::Normal), 999);
        assert_eq!(buffer.headroom("sv1-50", VariantKey::Normal), 0);
    }

    #[test]
    fn add_applies_partial_amount() {
        let mut buffer = DeltaBuffer::new();
        buffer.set("sv1-50", VariantKey::Foil, 995);
        assert_eq!(buffer.add("sv1-50", VariantKey::Foil, 10), 4);
    }

    #[test]
    fn add_saturates_at_minimum() {
        let mut buffer = DeltaBuffer::new();
        assert_eq!(buffer.add("sv1-50", VariantKey::Normal, -1500), -999);
        assert_eq!(buffer.add("sv1-50", VariantKey::Normal, 1), 1);
    }

    #[test]
    fn into_deltas_drops_neutral_cells() {
        let mut buffer = DeltaBuffer::new();
        buffer.add("a-1", VariantKey::Normal, 2);
        buffer.add("a-1", VariantKey::Normal, -2);
        buffer.set_price("b-1", VariantKey::Foil, Price::from_cents(99));
        assert!(!buffer.is_empty());
        let deltas = buffer.into_deltas();
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].id, "b-1");
    }
}
