use std::collections::BTreeMap;
use tcg_common::{Price, VariantKey};

/// Quantity and price tracked for one finish of one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VariantRecord {
    pub quantity: i64,
    pub price: Option<Price>,
}

impl VariantRecord {
    pub fn new(quantity: i64, price: Option<Price>) -> Self {
        Self { quantity, price }
    }

    /// A record is kept while it still carries a quantity or a price
    pub fn is_retained(&self) -> bool {
        self.quantity != 0 || self.price.is_some()
    }
}

/// All tracked variants of one card.
///
/// `variants` is a `BTreeMap` keyed by [`VariantKey`], so iteration always
/// follows the fixed priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardEntry {
    pub id: String,
    pub variants: BTreeMap<VariantKey, VariantRecord>,
}

impl CardEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            variants: BTreeMap::new(),
        }
    }

    /// Builder-style helper, mostly for tests and bulk deltas
    pub fn with_variant(mut self, key: VariantKey, quantity: i64, price: Option<Price>) -> Self {
        self.variants.insert(key, VariantRecord::new(quantity, price));
        self
    }

    pub fn quantity(&self, key: VariantKey) -> i64 {
        self.variants.get(&key).map(|v| v.quantity).unwrap_or(0)
    }

    pub fn price(&self, key: VariantKey) -> Option<Price> {
        self.variants.get(&key).and_then(|v| v.price)
    }

    /// Sum of all positive variant quantities
    pub fn total_quantity(&self) -> i64 {
        self.variants.values().map(|v| v.quantity.max(0)).sum()
    }

    /// Variants with a positive quantity, in priority order
    pub fn active_variants(&self) -> Vec<(VariantKey, VariantRecord)> {
        self.variants
            .iter()
            .filter(|(_, v)| v.quantity > 0)
            .map(|(k, v)| (*k, *v))
            .collect()
    }

    /// The variant that represents this card when only one can be shown:
    /// the first one in stock, otherwise the first one present.
    pub fn primary_variant(&self) -> Option<VariantKey> {
        self.variants
            .iter()
            .find(|(_, v)| v.quantity > 0)
            .or_else(|| self.variants.iter().next())
            .map(|(k, _)| *k)
    }

    /// Drop variants that carry neither quantity nor price
    pub fn prune(&mut self) {
        self.variants.retain(|_, v| v.is_retained());
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

/// The canonical inventory document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ledger {
    pub name: String,
    pub format: String,
    pub cards: BTreeMap<String, CardEntry>,
}

impl Ledger {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            cards: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&CardEntry> {
        self.cards.get(id)
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CardEntry> {
        self.cards.values()
    }

    pub fn total_quantity(&self) -> i64 {
        self.cards.values().map(CardEntry::total_quantity).sum()
    }

    /// Merge signed deltas into this ledger
    pub fn apply<D>(&mut self, deltas: D)
    where
        D: IntoIterator<Item = CardEntry>,
    {
        let base = std::mem::take(&mut self.cards);
        self.cards = super::aggregate::merge(base.into_values(), deltas);
    }

    /// Remove an entry outright (explicit delete)
    pub fn remove(&mut self, id: &str) -> Option<CardEntry> {
        self.cards.remove(id)
    }
}
