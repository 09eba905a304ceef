//! Lookup-key normalization shared by index building and lookups.

use std::collections::BTreeSet;

/// Fold common Latin diacritics to their base letter ("Pokémon" -> "Pokemon")
pub fn fold_diacritics(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => 'a',
            'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => 'A',
            'ç' => 'c',
            'Ç' => 'C',
            'è' | 'é' | 'ê' | 'ë' => 'e',
            'È' | 'É' | 'Ê' | 'Ë' => 'E',
            'ì' | 'í' | 'î' | 'ï' => 'i',
            'Ì' | 'Í' | 'Î' | 'Ï' => 'I',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => 'o',
            'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => 'O',
            'ù' | 'ú' | 'û' | 'ü' => 'u',
            'Ù' | 'Ú' | 'Û' | 'Ü' => 'U',
            'ý' | 'ÿ' => 'y',
            'Ý' => 'Y',
            '’' => '\'',
            other => other,
        })
        .collect()
}

/// Case-, diacritic- and whitespace-insensitive name key
pub fn name_key(name: &str) -> String {
    fold_diacritics(name)
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Alphanumeric tokens of a name key, used for similarity scoring
pub fn name_tokens(name: &str) -> BTreeSet<String> {
    name_key(name)
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// All spellings under which a collector number may be looked up.
///
/// The raw (uppercased) form comes first, followed by the integer-trimmed
/// form and the 2- and 3-digit zero-padded forms: `"050a"` yields `050A`,
/// `50A`. Letter prefixes (`TG05`) are kept in every variant.
pub fn number_variants(number: &str) -> Vec<String> {
    let raw = number.trim().to_uppercase();
    let mut out: Vec<String> = Vec::new();
    push_unique(&mut out, raw.clone());

    let prefix: String = raw.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    let rest = &raw[prefix.len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let suffix = &rest[digits.len()..];
    if digits.is_empty() || !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
        return out;
    }

    let trimmed = digits.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };

    push_unique(&mut out, format!("{prefix}{trimmed}{suffix}"));
    for width in [2usize, 3] {
        push_unique(&mut out, format!("{prefix}{trimmed:0>width$}{suffix}"));
    }
    out
}

fn push_unique(out: &mut Vec<String>, s: String) {
    if !s.is_empty() && !out.contains(&s) {
        out.push(s);
    }
}
