//! Set code alias table
//!
//! Deck lists reference sets by canonical id (`sv1`), online code (`SVI`) or
//! printed abbreviation, with inconsistent casing, spaces and hyphens. The
//! table maps every normalized spelling to the canonical set id.

use std::collections::HashMap;
use tcg_common::SetInfo;

#[derive(Debug, Clone, Default)]
pub struct SetAliasTable {
    map: HashMap<String, String>,
}

/// Uppercase, uppercase without spaces, uppercase without hyphens
fn code_variants(code: &str) -> Vec<String> {
    let upper = code.trim().to_uppercase();
    let mut variants = vec![upper.clone()];
    for v in [upper.replace(' ', ""), upper.replace('-', "")] {
        if !variants.contains(&v) {
            variants.push(v);
        }
    }
    variants.retain(|v| !v.is_empty());
    variants
}

impl SetAliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from set metadata. Canonical ids are registered before alternate
    /// codes, so an alternate code never shadows another set's id.
    pub fn from_sets(sets: &[SetInfo]) -> Self {
        let mut table = Self::new();
        for set in sets {
            table.insert(&set.id, &set.id);
        }
        for set in sets {
            for code in set.alt_codes() {
                table.insert(code, &set.id);
            }
        }
        log::debug!("Set alias table: {} spellings for {} sets", table.len(), sets.len());
        table
    }

    /// Build from explicit alias -> set id pairs
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut table = Self::new();
        for (alias, set_id) in pairs {
            table.insert(alias, set_id);
        }
        table
    }

    /// Register every normalized spelling of `alias`; existing entries win
    pub fn insert(&mut self, alias: &str, set_id: &str) {
        for variant in code_variants(alias) {
            self.map.entry(variant).or_insert_with(|| set_id.to_string());
        }
    }

    pub fn resolve(&self, token: &str) -> Option<&str> {
        code_variants(token)
            .iter()
            .find_map(|v| self.map.get(v))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
