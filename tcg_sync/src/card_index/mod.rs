//! Read-only card and set metadata lookups

pub mod keys;
mod memory;

pub use memory::MemoryCardIndex;

use tcg_common::{CardInfo, SetInfo};

/// Card/set metadata source consulted by bulk resolution and catalog sync.
pub trait CardIndex {
    fn lookup_by_id(&self, id: &str) -> Option<&CardInfo>;

    /// Look up by canonical set id and collector number; number spelling
    /// variants (`"050"`, `"50"`) resolve to the same card.
    fn lookup_by_set_and_number(&self, set_id: &str, number: &str) -> Option<&CardInfo>;

    /// Exact name lookup within a set, insensitive to case, diacritics and
    /// repeated whitespace.
    fn lookup_by_set_and_name(&self, set_id: &str, name: &str) -> Option<&CardInfo>;

    fn list_set_metadata(&self) -> &[SetInfo];

    fn set_metadata(&self, set_id: &str) -> Option<&SetInfo>;

    /// All cards of a set in dataset order
    fn cards_in_set(&self, set_id: &str) -> &[CardInfo];
}
