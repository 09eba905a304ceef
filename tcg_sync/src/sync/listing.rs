//! Product listing text and categories derived from card metadata.

use crate::card_index::CardIndex;
use tcg_common::{split_card_id, CardInfo, SetInfo};

/// Listing fields for one card, before catalog ids are resolved
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Listing {
    pub display_name: String,
    pub description: String,
    pub category_paths: Vec<Vec<String>>,
    pub image_url: Option<String>,
}

impl Listing {
    /// Listing for a card with no metadata: the raw id and nothing else
    pub fn bare(card_id: &str) -> Self {
        Self {
            display_name: card_id.to_string(),
            ..Default::default()
        }
    }
}

/// Build the listing for `card_id`; `None` when the index does not know it
pub fn build_listing<I: CardIndex + ?Sized>(card_id: &str, index: &I) -> Option<Listing> {
    let card = index.lookup_by_id(card_id)?;
    let set = card
        .set_id
        .as_deref()
        .or_else(|| split_card_id(card_id).map(|p| p.set_id))
        .and_then(|set_id| index.set_metadata(set_id));

    Some(Listing {
        display_name: display_name(card, set),
        description: description(card),
        category_paths: category_paths(card),
        image_url: card.image_url().map(str::to_string),
    })
}

/// `"<name> <CODE> <number>"`, using the set's online code when it has one
pub fn display_name(card: &CardInfo, set: Option<&SetInfo>) -> String {
    let code = set
        .and_then(|s| s.alt_codes().next().map(str::to_string).or(Some(s.id.clone())))
        .or_else(|| card.set_id.clone())
        .or_else(|| split_card_id(&card.id).map(|p| p.set_id.to_string()))
        .map(|c| c.to_uppercase());

    let mut parts = vec![card.name.trim().to_string()];
    parts.extend(code);
    if !card.number.trim().is_empty() {
        parts.push(card.number.trim().to_string());
    }
    parts.retain(|p| !p.is_empty());
    if parts.is_empty() {
        card.id.clone()
    } else {
        parts.join(" ")
    }
}

/// Plain-text description; every section is omitted when its data is absent
pub fn description(card: &CardInfo) -> String {
    let mut sections: Vec<String> = Vec::new();

    if let Some(flavor) = card.flavor_text.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        sections.push(flavor.to_string());
    }

    let mut stats: Vec<String> = Vec::new();
    if let Some(hp) = &card.hp {
        stats.push(format!("HP {}", hp));
    }
    if !card.types.is_empty() {
        stats.push(format!("Type: {}", card.types.join(", ")));
    }
    if let Some(from) = &card.evolves_from {
        stats.push(format!("Evolves from {}", from));
    }
    for weakness in &card.weaknesses {
        stats.push(format!("Weakness: {} {}", weakness.kind, weakness.value));
    }
    for resistance in &card.resistances {
        stats.push(format!("Resistance: {} {}", resistance.kind, resistance.value));
    }
    if let Some(retreat) = card.converted_retreat_cost {
        stats.push(format!("Retreat cost: {}", retreat));
    }
    if let Some(rarity) = &card.rarity {
        stats.push(format!("Rarity: {}", rarity));
    }
    if !stats.is_empty() {
        sections.push(stats.join("\n"));
    }

    for ability in &card.abilities {
        let kind = ability.kind.as_deref().unwrap_or("Ability");
        sections.push(format!("{}: {}\n{}", kind, ability.name, ability.text).trim_end().to_string());
    }

    if !card.attacks.is_empty() {
        let lines: Vec<String> = card
            .attacks
            .iter()
            .map(|attack| {
                let mut line = format!("- {}", attack.name);
                if !attack.cost.is_empty() {
                    line.push_str(&format!(" [{}]", attack.cost.join(", ")));
                }
                if let Some(damage) = attack.damage.as_deref().filter(|d| !d.is_empty()) {
                    line.push_str(&format!(" {}", damage));
                }
                if let Some(text) = attack.text.as_deref().filter(|t| !t.is_empty()) {
                    line.push_str(&format!(": {}", text));
                }
                line
            })
            .collect();
        sections.push(format!("Attacks:\n{}", lines.join("\n")));
    }

    if !card.rules.is_empty() {
        sections.push(card.rules.join("\n"));
    }

    if !card.legalities.is_empty() {
        let lines: Vec<String> = card
            .legalities
            .iter()
            .map(|(format, legality)| format!("{}: {}", capitalize(format), legality))
            .collect();
        sections.push(format!("Legalities:\n{}", lines.join("\n")));
    }

    sections.join("\n\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Category paths from root to leaf. Pokémon share one branch, trainers get
/// one path per subtype, anything else files under its supertype.
pub fn category_paths(card: &CardInfo) -> Vec<Vec<String>> {
    if card.is_pokemon() {
        return vec![vec!["Pokemon".to_string()]];
    }
    if card.is_trainer() {
        if card.subtypes.is_empty() {
            return vec![vec!["Trainer".to_string()]];
        }
        return card
            .subtypes
            .iter()
            .map(|subtype| vec!["Trainer".to_string(), subtype.clone()])
            .collect();
    }
    match card.supertype.as_deref().map(str::trim) {
        Some(supertype) if !supertype.is_empty() => vec![vec![supertype.to_string()]],
        _ => Vec::new(),
    }
}
