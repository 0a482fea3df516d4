//! Equation canonicalization.
//!
//! Deliberately weak: only incidental formatting differences are removed.
//! Two equations that mean the same thing but are written differently keep
//! different canonical forms.

use crate::model::{EquationRecord, ExtractedEquation};

/// Canonicalize an equation string.
///
/// Replaces the superscript-two character with `^2`, then removes every
/// whitespace character.
pub fn normalize(raw: &str) -> String {
    raw.replace('\u{00B2}', "^2")
        .chars()
        .filter(|&c| !is_space(c))
        .collect()
}

/// Unicode whitespace plus the information separators U+001C..=U+001F.
fn is_space(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{1C}'..='\u{1F}')
}

/// Normalize a batch of extracted equations, keeping the original text in
/// `raw_equation`.
pub fn process_extractions(extractions: Vec<ExtractedEquation>) -> Vec<EquationRecord> {
    extractions
        .into_iter()
        .map(|e| EquationRecord {
            equation: normalize(&e.equation),
            raw_equation: e.equation,
            description: e.description,
        })
        .collect()
}
