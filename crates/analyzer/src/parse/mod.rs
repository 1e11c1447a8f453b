//! Ordered fallback chain for turning backend text into structured fields.
//!
//! Each stage is a pure function that either produces a result or declines.
//! Stages run in order and the first result wins.

pub(crate) mod heuristic;
mod strict;
mod tolerant;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Which stage of the chain produced a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParserStage {
    Strict,
    Tolerant,
    Heuristic,
    /// No stage accepted the response (or there was no response)
    None,
}

impl ParserStage {
    /// Anything past the strict stage counts as degraded
    pub const fn is_degraded(self) -> bool {
        !matches!(self, Self::Strict)
    }
}

impl fmt::Display for ParserStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Strict => "strict",
            Self::Tolerant => "tolerant",
            Self::Heuristic => "heuristic",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

/// Fields extracted from one response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedAnalysis {
    pub description: String,
    pub classes: Vec<String>,
    pub functions: Vec<String>,
    pub dependencies: Vec<String>,
}

impl ParsedAnalysis {
    pub fn is_empty(&self) -> bool {
        self.description.is_empty()
            && self.classes.is_empty()
            && self.functions.is_empty()
            && self.dependencies.is_empty()
    }
}

type ParseFn = fn(&str) -> Option<ParsedAnalysis>;

const CHAIN: &[(ParserStage, ParseFn)] = &[
    (ParserStage::Strict, strict::parse),
    (ParserStage::Tolerant, tolerant::parse),
    (ParserStage::Heuristic, heuristic::parse),
];

/// Run the chain. Returns `None` only when every stage declined.
pub fn parse_response(text: &str) -> Option<(ParserStage, ParsedAnalysis)> {
    if text.trim().is_empty() {
        return None;
    }
    CHAIN.iter().find_map(|(stage, parse)| {
        let parsed = parse(text)?;
        log::debug!("Response accepted by {stage} parser");
        Some((*stage, parsed))
    })
}

/// Clean a single extracted item: trims whitespace, quotes, backticks, bold
/// markers and list bullets. Returns `None` for placeholders.
pub(crate) fn clean_item(raw: &str) -> Option<String> {
    let mut item = raw.replace("**", "");
    item = item
        .trim()
        .trim_start_matches(['-', '*', '•'])
        .trim()
        .trim_matches(['"', '\'', '`'])
        .trim()
        .trim_end_matches(',')
        .trim()
        .to_string();

    let lowered = item.to_ascii_lowercase();
    if item.is_empty() || matches!(lowered.as_str(), "none" | "n/a" | "null" | "[]") {
        None
    } else {
        Some(item)
    }
}

/// Order-preserving de-duplication
pub(crate) fn dedup_in_order(items: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

pub(crate) fn clean_description(raw: &str) -> String {
    raw.replace("**", "").trim().to_string()
}
