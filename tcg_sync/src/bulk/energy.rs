//! Name-based resolution for basic energy lines.
//!
//! Deck exports write basic energies as `Basic {R} Energy` while datasets name
//! them `Fire Energy` or `Basic Fire Energy`, so these lines are matched by
//! name within the target set. When no name matches exactly, cards are ranked
//! by a token similarity score; there is no confidence threshold.

use crate::card_index::keys::{name_key, name_tokens};
use crate::card_index::CardIndex;
use lazy_static::lazy_static;
use regex::Regex;
use tcg_common::CardInfo;

/// Type letter -> basic energy type name
pub const BASIC_ENERGY: [(char, &str); 8] = [
    ('D', "Darkness"),
    ('M', "Metal"),
    ('L', "Lightning"),
    ('G', "Grass"),
    ('F', "Fighting"),
    ('W', "Water"),
    ('R', "Fire"),
    ('P', "Psychic"),
];

lazy_static! {
    static ref BRACED_TYPE: Regex = Regex::new(r"\{([A-Za-z])\}").expect("valid type token pattern");
}

/// Whether a parsed name goes through the energy/name path
pub fn is_energy_name(name: &str) -> bool {
    name.to_lowercase().contains("energy") || BRACED_TYPE.is_match(name)
}

fn energy_type(name: &str) -> Option<(char, &'static str)> {
    if let Some(caps) = BRACED_TYPE.captures(name) {
        let letter = caps[1].chars().next()?.to_ascii_uppercase();
        return BASIC_ENERGY.iter().copied().find(|(l, _)| *l == letter);
    }
    let tokens = name_tokens(name);
    BASIC_ENERGY
        .iter()
        .copied()
        .find(|(_, type_name)| tokens.contains(&type_name.to_lowercase()))
}

/// Candidate names to search for, most specific first, without duplicates
pub fn search_names(name: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |candidate: String| {
        let candidate = candidate.split_whitespace().collect::<Vec<_>>().join(" ");
        if !candidate.is_empty() && !names.iter().any(|n| name_key(n) == name_key(&candidate)) {
            names.push(candidate);
        }
    };

    if let Some((letter, type_name)) = energy_type(name) {
        push(format!("Basic {{{letter}}} Energy"));
        push(format!("Basic {type_name} Energy"));
        push(format!("{type_name} Energy"));
    }
    push(name.to_string());
    push(BRACED_TYPE.replace_all(name, " ").into_owned());
    names
}

/// Lower is better: 0 exact, 1 card name contains the search name, 2 search
/// name contains the card name, otherwise `10 + 5 x missing + extra` tokens.
/// `None` when the names share no token.
pub fn similarity(card_name: &str, search_name: &str) -> Option<u32> {
    let card_key = name_key(card_name);
    let search_key = name_key(search_name);
    if card_key == search_key {
        return Some(0);
    }
    if card_key.contains(&search_key) {
        return Some(1);
    }
    if search_key.contains(&card_key) {
        return Some(2);
    }

    let card_tokens = name_tokens(card_name);
    let search_tokens = name_tokens(search_name);
    if card_tokens.intersection(&search_tokens).next().is_none() {
        return None;
    }
    let missing = search_tokens.difference(&card_tokens).count() as u32;
    let extra = card_tokens.difference(&search_tokens).count() as u32;
    Some(10 + 5 * missing + extra)
}

/// Resolve a card by name within one set: exact name lookups for every
/// candidate first, then the best similarity score (earliest card wins ties).
pub fn resolve_by_name<'a, I>(index: &'a I, set_id: &str, name: &str) -> Option<&'a CardInfo>
where
    I: CardIndex + ?Sized,
{
    let candidates = search_names(name);
    if let Some(card) = candidates
        .iter()
        .find_map(|candidate| index.lookup_by_set_and_name(set_id, candidate))
    {
        return Some(card);
    }

    let mut best: Option<(u32, &CardInfo)> = None;
    for card in index.cards_in_set(set_id) {
        for candidate in &candidates {
            let Some(score) = similarity(&card.name, candidate) else {
                continue;
            };
            if score == 0 {
                return Some(card);
            }
            if best.map_or(true, |(best_score, _)| score < best_score) {
                best = Some((score, card));
            }
        }
    }

    if let Some((score, card)) = best {
        log::debug!("Fuzzy matched {:?} to {} ({}) with score {}", name, card.name, card.id, score);
    }
    best.map(|(_, card)| card)
}
