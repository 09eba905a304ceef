use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four finish variants a card can be stocked in.
///
/// The declaration order is the priority order used when a single variant has
/// to represent a card (normal first, stamped last).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariantKey {
    Normal,
    Foil,
    ReverseFoil,
    Stamped,
}

impl VariantKey {
    /// All variants in priority order
    pub const ALL: [VariantKey; 4] = [
        VariantKey::Normal,
        VariantKey::Foil,
        VariantKey::ReverseFoil,
        VariantKey::Stamped,
    ];

    /// Returns the wire name used in ledger documents (e.g., "reverseFoil")
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKey::Normal => "normal",
            VariantKey::Foil => "foil",
            VariantKey::ReverseFoil => "reverseFoil",
            VariantKey::Stamped => "stamped",
        }
    }

    /// Returns the human readable label (e.g., "Reverse Foil")
    pub fn label(&self) -> &'static str {
        match self {
            VariantKey::Normal => "Normal",
            VariantKey::Foil => "Foil",
            VariantKey::ReverseFoil => "Reverse Foil",
            VariantKey::Stamped => "Stamped",
        }
    }

    /// Parse a variant key, accepting the wire name, the label and a few
    /// spellings found in hand-written documents.
    pub fn parse(s: &str) -> Option<Self> {
        let folded: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match folded.as_str() {
            "normal" | "regular" | "nonfoil" => Some(VariantKey::Normal),
            "foil" | "holo" | "holofoil" => Some(VariantKey::Foil),
            "reversefoil" | "reverse" | "reverseholo" | "reverseholofoil" => {
                Some(VariantKey::ReverseFoil)
            }
            "stamped" | "stamp" => Some(VariantKey::Stamped),
            _ => None,
        }
    }
}

impl fmt::Display for VariantKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
