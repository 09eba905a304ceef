//! Card and set metadata records as found in the card dataset JSON files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CardInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub supertype: Option<String>,
    #[serde(default)]
    pub subtypes: Vec<String>,
    #[serde(default)]
    pub hp: Option<String>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub evolves_from: Option<String>,
    #[serde(default)]
    pub abilities: Vec<Ability>,
    #[serde(default)]
    pub attacks: Vec<Attack>,
    #[serde(default)]
    pub weaknesses: Vec<TypeModifier>,
    #[serde(default)]
    pub resistances: Vec<TypeModifier>,
    #[serde(default)]
    pub converted_retreat_cost: Option<u32>,
    #[serde(default)]
    pub rules: Vec<String>,
    pub number: String,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub rarity: Option<String>,
    #[serde(default)]
    pub flavor_text: Option<String>,
    /// Format name -> legality (e.g., "standard" -> "Legal")
    #[serde(default)]
    pub legalities: BTreeMap<String, String>,
    #[serde(default)]
    pub images: Option<CardImages>,
    /// Owning set; filled in by the index when the dataset omits it
    #[serde(default)]
    pub set_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct Ability {
    pub name: String,
    #[serde(default)]
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Attack {
    pub name: String,
    #[serde(default)]
    pub cost: Vec<String>,
    #[serde(default)]
    pub damage: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct TypeModifier {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct CardImages {
    pub small: Option<String>,
    pub large: Option<String>,
}

impl CardInfo {
    /// Get the best available image URL (large, then small)
    pub fn image_url(&self) -> Option<&str> {
        let images = self.images.as_ref()?;
        images.large.as_deref().or(images.small.as_deref())
    }

    pub fn is_pokemon(&self) -> bool {
        self.supertype
            .as_deref()
            .map(|s| fold_supertype(s) == "pokemon")
            .unwrap_or(false)
    }

    pub fn is_trainer(&self) -> bool {
        self.supertype
            .as_deref()
            .map(|s| fold_supertype(s) == "trainer")
            .unwrap_or(false)
    }
}

fn fold_supertype(s: &str) -> String {
    s.trim().to_lowercase().replace('é', "e")
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SetInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub series: Option<String>,
    #[serde(default)]
    pub printed_total: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
    /// Code used by the online game's deck exports (e.g., "SVI")
    #[serde(default)]
    pub ptcgo_code: Option<String>,
    /// Printed abbreviation, when it differs from the online code
    #[serde(default)]
    pub abbreviation: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
}

impl SetInfo {
    /// Alternate codes by which this set may be referenced, in preference order
    pub fn alt_codes(&self) -> impl Iterator<Item = &str> {
        self.ptcgo_code
            .as_deref()
            .into_iter()
            .chain(self.abbreviation.as_deref())
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}
