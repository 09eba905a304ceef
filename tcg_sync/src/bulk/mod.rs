//! Bulk text import: turns deck-list style lines into ledger deltas.
//!
//! Each line is parsed and resolved on its own; a failing line never blocks
//! the others. Direct set + number lookups are exact; only energy lines fall
//! back to name matching.

pub mod aliases;
pub mod energy;
pub mod parse;

pub use aliases::SetAliasTable;
pub use parse::{parse_line, ParsedLine};

use crate::card_index::CardIndex;
use crate::error::{Error, LineError, ResolutionError};
use std::io::Read;
use crate::ledger::DeltaBuffer;
use tcg_common::{CardInfo, VariantKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineResult {
    Success {
        line_no: usize,
        quantity: i64,
        card_id: String,
    },
    Failure {
        line_no: usize,
        error: LineError,
    },
}

impl LineResult {
    pub fn line_no(&self) -> usize {
        match self {
            LineResult::Success { line_no, .. } | LineResult::Failure { line_no, .. } => *line_no,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, LineResult::Success { .. })
    }
}

/// Resolves bulk lines against a card index and a set alias table.
pub struct BulkResolver<'a, I: CardIndex + ?Sized> {
    index: &'a I,
    aliases: SetAliasTable,
}

impl<'a, I: CardIndex + ?Sized> BulkResolver<'a, I> {
    /// Build the alias table from the index's set metadata
    pub fn new(index: &'a I) -> Self {
        let aliases = SetAliasTable::from_sets(index.list_set_metadata());
        Self { index, aliases }
    }

    pub fn with_aliases(index: &'a I, aliases: SetAliasTable) -> Self {
        Self { index, aliases }
    }

    pub fn index(&self) -> &'a I {
        self.index
    }

    /// Resolve one parsed line to a card
    pub fn resolve(&self, parsed: &ParsedLine) -> Result<&'a CardInfo, ResolutionError> {
        let set_id = self
            .aliases
            .resolve(&parsed.set_code)
            .ok_or_else(|| ResolutionError::UnknownSetCode(parsed.set_code.clone()))?;

        if let Some(card) = self.index.lookup_by_set_and_number(set_id, &parsed.number) {
            return Ok(card);
        }
        if energy::is_energy_name(&parsed.name) {
            if let Some(card) = energy::resolve_by_name(self.index, set_id, &parsed.name) {
                return Ok(card);
            }
        }
        Err(ResolutionError::CardNotFound {
            set_id: set_id.to_string(),
            number: parsed.number.clone(),
        })
    }

    fn resolve_line(&self, line: &str) -> Result<(i64, &'a CardInfo), LineError> {
        let parsed = parse_line(line)?;
        let card = self.resolve(&parsed)?;
        Ok((parsed.quantity, card))
    }

    /// Resolve every non-blank line; line numbers are 1-based positions in
    /// the original text.
    pub fn resolve_lines(&self, text: &str) -> Vec<LineResult> {
        text.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                let line_no = i + 1;
                match self.resolve_line(line) {
                    Ok((quantity, card)) => LineResult::Success {
                        line_no,
                        quantity,
                        card_id: card.id.clone(),
                    },
                    Err(error) => {
                        log::debug!("Bulk line {} failed ({}): {}", line_no, line.trim(), error);
                        LineResult::Failure { line_no, error }
                    }
                }
            })
            .collect()
    }
}

/// Resolve bulk text with an alias table built from the index
pub fn resolve_lines<I: CardIndex + ?Sized>(text: &str, index: &I) -> Vec<LineResult> {
    BulkResolver::new(index).resolve_lines(text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkAdded {
    pub line_no: usize,
    pub card_id: String,
    pub name: String,
    pub requested: i64,
    pub applied: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkReport {
    pub added: Vec<BulkAdded>,
    pub failures: Vec<(usize, LineError)>,
}

impl BulkReport {
    pub fn total_applied(&self) -> i64 {
        self.added.iter().map(|a| a.applied).sum()
    }

    /// One-line summary: total added, the first few names, failure count
    pub fn summary(&self) -> String {
        const SHOWN: usize = 3;
        let mut out = format!("Added {} cards", self.total_applied());
        if !self.added.is_empty() {
            let names: Vec<String> = self
                .added
                .iter()
                .take(SHOWN)
                .map(|a| format!("{} x{}", a.name, a.applied))
                .collect();
            out.push_str(&format!(": {}", names.join(", ")));
            if self.added.len() > SHOWN {
                out.push_str(&format!(" and {} more", self.added.len() - SHOWN));
            }
        }
        if !self.failures.is_empty() {
            out.push_str(&format!(" ({} lines failed)", self.failures.len()));
        }
        out
    }
}

/// Read bulk text from a file path, or from stdin when `source` is `-`
pub fn read_input(source: &str) -> crate::Result<String> {
    let input_error = |e| Error::Input {
        source_name: source.to_string(),
        source: e,
    };
    if source == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .map_err(input_error)?;
        Ok(text)
    } else {
        std::fs::read_to_string(source).map_err(input_error)
    }
}

/// Resolve bulk text and add each success to the buffer as a `normal` delta.
///
/// The applied amount is capped by the buffer's headroom; a line whose card
/// has no headroom left is reported as [`ResolutionError::AlreadyAtMaximum`].
pub fn import_bulk<I: CardIndex + ?Sized>(
    resolver: &BulkResolver<'_, I>,
    text: &str,
    buffer: &mut DeltaBuffer,
) -> BulkReport {
    let mut report = BulkReport::default();

    for result in resolver.resolve_lines(text) {
        match result {
            LineResult::Success {
                line_no,
                quantity,
                card_id,
            } => {
                let headroom = buffer.headroom(&card_id, VariantKey::Normal);
                if headroom <= 0 {
                    report.failures.push((
                        line_no,
                        ResolutionError::AlreadyAtMaximum(card_id).into(),
                    ));
                    continue;
                }
                let applied = buffer.add(&card_id, VariantKey::Normal, quantity.min(headroom));
                if applied < quantity {
                    log::warn!(
                        "Line {}: only {} of {} copies of {} fit in the buffer",
                        line_no,
                        applied,
                        quantity,
                        card_id
                    );
                }
                let name = resolver
                    .index()
                    .lookup_by_id(&card_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| card_id.clone());
                report.added.push(BulkAdded {
                    line_no,
                    card_id,
                    name,
                    requested: quantity,
                    applied,
                });
            }
            LineResult::Failure { line_no, error } => report.failures.push((line_no, error)),
        }
    }

    log::info!(
        "Bulk import: {} lines added ({} cards), {} failed",
        report.added.len(),
        report.total_applied(),
        report.failures.len()
    );
    report
}

#[cfg(test)]
#[path = "bulk_tests.rs"]
mod tests;
