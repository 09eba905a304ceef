/// A card identifier split into its set and collector number parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardIdParts<'a> {
    pub set_id: &'a str,
    pub number: &'a str,
}

/// Split a card identifier such as `"sv1-50"` into set and number.
///
/// Identifiers without a separator (`"SWSH001"`) are split after the leading
/// letters. Returns `None` when either half would be empty.
pub fn split_card_id(id: &str) -> Option<CardIdParts<'_>> {
    let id = id.trim();
    if let Some((set_id, number)) = id.rsplit_once('-') {
        if set_id.is_empty() || number.is_empty() {
            return None;
        }
        return Some(CardIdParts { set_id, number });
    }

    let split = id
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphabetic())
        .map(|(i, _)| i)?;
    let (set_id, number) = id.split_at(split);
    if set_id.is_empty() || number.is_empty() {
        return None;
    }
    Some(CardIdParts { set_id, number })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_last_hyphen() {
        let parts = split_card_id("sv1-50").unwrap();
        assert_eq!(parts.set_id, "sv1");
        assert_eq!(parts.number, "50");

        let parts = split_card_id("swsh12pt5gg-GG01").unwrap();
        assert_eq!(parts.set_id, "swsh12pt5gg");
        assert_eq!(parts.number, "GG01");
    }

    #[test]
    fn splits_letters_from_digits() {
        let parts = split_card_id("SWSH001").unwrap();
        assert_eq!(parts.set_id, "SWSH");
        assert_eq!(parts.number, "001");
    }

    #[test]
    fn rejects_degenerate_ids() {
        assert!(split_card_id("").is_none());
        assert!(split_card_id("-12").is_none());
        assert!(split_card_id("sv1-").is_none());
        assert!(split_card_id("promo").is_none());
        assert!(split_card_id("123").is_none());
    }
}
