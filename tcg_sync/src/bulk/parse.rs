//! Grammar for one bulk line: `<qty> <name tokens...> <setCode> <number>`

use crate::error::ParseError;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref SET_CODE_JUNK: Regex = Regex::new(r"[^0-9A-Za-z-]").expect("valid set code pattern");
    static ref NUMBER_JUNK: Regex = Regex::new(r"[^0-9A-Za-z]").expect("valid number pattern");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLine {
    pub quantity: i64,
    pub name: String,
    pub set_code: String,
    pub number: String,
}

/// Parse one non-blank line.
///
/// The last two tokens are the set code and the collector number; everything
/// between the quantity and those two is the card name.
pub fn parse_line(line: &str) -> Result<ParsedLine, ParseError> {
    let mut tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return Err(ParseError::MissingTokens);
    }

    let qty_token = tokens.remove(0);
    let quantity = match qty_token.parse::<i64>() {
        Ok(q) if q > 0 && qty_token.chars().all(|c| c.is_ascii_digit()) => q,
        _ => return Err(ParseError::InvalidQuantity(qty_token.to_string())),
    };

    let number = tokens.pop().ok_or(ParseError::MissingTokens)?;
    let set_code = tokens.pop().ok_or(ParseError::MissingTokens)?;

    let set_code = SET_CODE_JUNK.replace_all(set_code, "").into_owned();
    if set_code.is_empty() {
        return Err(ParseError::EmptySetCode);
    }
    let number = NUMBER_JUNK.replace_all(number, "").into_owned();
    if number.is_empty() {
        return Err(ParseError::EmptyNumber);
    }

    Ok(ParsedLine {
        quantity,
        name: tokens.join(" "),
        set_code,
        number,
    })
}
