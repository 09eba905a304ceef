//! In-memory card index with precomputed lookup maps.
//!
//! All maps are built in one pass when the index is constructed and rebuilt
//! wholesale by [`MemoryCardIndex::reload`]; they are never patched in place.

use super::keys::{name_key, number_variants};
use super::CardIndex;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use tcg_common::{split_card_id, CardInfo, SetInfo};

#[derive(Debug, Default)]
pub struct MemoryCardIndex {
    sets: Vec<SetInfo>,
    /// Lowercased set id -> position in `sets`
    set_pos: HashMap<String, usize>,
    /// Cards per set, parallel to `sets`
    cards: Vec<Vec<CardInfo>>,
    by_id: HashMap<String, (usize, usize)>,
    /// Per set: number variant -> card position (first registration wins)
    by_number: Vec<HashMap<String, usize>>,
    /// Per set: name key -> card position (first registration wins)
    by_name: Vec<HashMap<String, usize>>,
}

impl MemoryCardIndex {
    pub fn new(sets: Vec<SetInfo>, cards: Vec<CardInfo>) -> Self {
        let mut index = Self::default();
        index.reload(sets, cards);
        index
    }

    /// Replace all metadata and rebuild every lookup map
    pub fn reload(&mut self, sets: Vec<SetInfo>, cards: Vec<CardInfo>) {
        *self = Self::default();

        for set in sets {
            let key = set.id.to_lowercase();
            if self.set_pos.contains_key(&key) {
                log::warn!("Duplicate set id in dataset: {}", set.id);
                continue;
            }
            self.push_set(set);
        }

        let mut orphans = 0usize;
        for mut card in cards {
            let Some(set_id) = card
                .set_id
                .clone()
                .or_else(|| split_card_id(&card.id).map(|p| p.set_id.to_string()))
            else {
                orphans += 1;
                continue;
            };

            let pos = match self.set_pos.get(&set_id.to_lowercase()) {
                Some(pos) => *pos,
                None => self.push_set(SetInfo {
                    id: set_id.clone(),
                    name: set_id.clone(),
                    ..Default::default()
                }),
            };
            card.set_id = Some(self.sets[pos].id.clone());
            self.push_card(pos, card);
        }

        if orphans > 0 {
            log::warn!("Skipped {} cards without a resolvable set", orphans);
        }
        log::info!(
            "Card index built: {} sets, {} cards",
            self.sets.len(),
            self.by_id.len()
        );
    }

    fn push_set(&mut self, set: SetInfo) -> usize {
        let pos = self.sets.len();
        self.set_pos.insert(set.id.to_lowercase(), pos);
        self.sets.push(set);
        self.cards.push(Vec::new());
        self.by_number.push(HashMap::new());
        self.by_name.push(HashMap::new());
        pos
    }

    fn push_card(&mut self, set_pos: usize, card: CardInfo) {
        let card_pos = self.cards[set_pos].len();
        if self.by_id.contains_key(&card.id) {
            log::warn!("Duplicate card id in dataset: {}", card.id);
            return;
        }
        self.by_id.insert(card.id.clone(), (set_pos, card_pos));
        for variant in number_variants(&card.number) {
            self.by_number[set_pos].entry(variant).or_insert(card_pos);
        }
        self.by_name[set_pos]
            .entry(name_key(&card.name))
            .or_insert(card_pos);
        self.cards[set_pos].push(card);
    }

    fn pos(&self, set_id: &str) -> Option<usize> {
        self.set_pos.get(&set_id.to_lowercase()).copied()
    }

    /// Load a dataset laid out as a sets array file plus one card array
    /// file per set (`<cards_dir>/<set id>.json`).
    pub fn from_dataset(sets_file: &Path, cards_dir: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(sets_file)
            .map_err(|e| Error::Dataset(format!("{}: {}", sets_file.display(), e)))?;
        let sets: Vec<SetInfo> = serde_json::from_str(&content)
            .map_err(|e| Error::Dataset(format!("{}: {}", sets_file.display(), e)))?;

        let mut cards = Vec::new();
        for set in &sets {
            let path = cards_dir.join(format!("{}.json", set.id));
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("No card file for set {} ({}): {}", set.id, path.display(), e);
                    continue;
                }
            };
            let mut set_cards: Vec<CardInfo> = serde_json::from_str(&content)
                .map_err(|e| Error::Dataset(format!("{}: {}", path.display(), e)))?;
            for card in &mut set_cards {
                card.set_id.get_or_insert_with(|| set.id.clone());
            }
            cards.extend(set_cards);
        }

        Ok(Self::new(sets, cards))
    }

    pub fn card_count(&self) -> usize {
        self.by_id.len()
    }
}

impl CardIndex for MemoryCardIndex {
    fn lookup_by_id(&self, id: &str) -> Option<&CardInfo> {
        let (set_pos, card_pos) = self.by_id.get(id.trim())?;
        self.cards[*set_pos].get(*card_pos)
    }

    fn lookup_by_set_and_number(&self, set_id: &str, number: &str) -> Option<&CardInfo> {
        let pos = self.pos(set_id)?;
        number_variants(number)
            .iter()
            .find_map(|variant| self.by_number[pos].get(variant))
            .and_then(|card_pos| self.cards[pos].get(*card_pos))
    }

    fn lookup_by_set_and_name(&self, set_id: &str, name: &str) -> Option<&CardInfo> {
        let pos = self.pos(set_id)?;
        let card_pos = self.by_name[pos].get(&name_key(name))?;
        self.cards[pos].get(*card_pos)
    }

    fn list_set_metadata(&self) -> &[SetInfo] {
        &self.sets
    }

    fn set_metadata(&self, set_id: &str) -> Option<&SetInfo> {
        self.pos(set_id).map(|pos| &self.sets[pos])
    }

    fn cards_in_set(&self, set_id: &str) -> &[CardInfo] {
        match self.pos(set_id) {
            Some(pos) => &self.cards[pos],
            None => &[],
        }
    }
}
