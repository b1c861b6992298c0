//! Region name canonicalization.
//!
//! Raw state names arrive as free text with inconsistent case, spacing,
//! conjunctions and historical spellings. Every raw value is mapped onto a
//! fixed vocabulary of 36 states and union territories, or rejected.
//! Everything here is pure data and functions; nothing touches I/O.

mod vocabulary;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

pub use vocabulary::{CANONICAL_STATES, CORRECTIONS, CORRECTIONS_VERSION};

/// Maximum number of distinct unknown names remembered for diagnostics
const UNKNOWN_SAMPLE_LIMIT: usize = 20;

/// A state or union territory name drawn from [`CANONICAL_STATES`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalState(&'static str);

impl CanonicalState {
    /// Look up an exact canonical spelling
    #[must_use]
    pub fn from_canonical(name: &str) -> Option<Self> {
        CANONICAL_STATES
            .iter()
            .copied()
            .find(|s| *s == name)
            .map(Self)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for CanonicalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl Serialize for CanonicalState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0)
    }
}

/// Outcome of canonicalizing one raw value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonicalization {
    /// Mapped onto the vocabulary; `corrected` when the substitution table fired
    Canonical {
        state: CanonicalState,
        corrected: bool,
    },
    /// Empty or purely numeric after cleaning
    Garbage,
    /// Cleaned text that matches no canonical name
    Unknown(String),
}

/// Trim, collapse internal whitespace runs and title-case each word
#[must_use]
pub fn clean_text(raw: &str) -> String {
    raw.split_whitespace()
        .map(title_case_word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn title_case_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn is_garbage(cleaned: &str) -> bool {
    cleaned.is_empty() || cleaned.chars().all(|c| c.is_ascii_digit() || c.is_whitespace())
}

/// Classify a raw state value against the vocabulary
#[must_use]
pub fn classify(raw: &str) -> Canonicalization {
    let cleaned = clean_text(&raw.replace('&', " and "));
    if is_garbage(&cleaned) {
        return Canonicalization::Garbage;
    }

    let (candidate, corrected) = CORRECTIONS
        .iter()
        .find(|(from, _)| *from == cleaned)
        .map_or((cleaned.as_str(), false), |(_, to)| (*to, true));

    match CanonicalState::from_canonical(candidate) {
        Some(state) => Canonicalization::Canonical { state, corrected },
        None => Canonicalization::Unknown(cleaned),
    }
}

/// Map a raw state value to its canonical name, or `None` when it must be dropped
#[must_use]
pub fn canonicalize(raw: &str) -> Option<CanonicalState> {
    match classify(raw) {
        Canonicalization::Canonical { state, .. } => Some(state),
        Canonicalization::Garbage | Canonicalization::Unknown(_) => None,
    }
}

/// Counts of what canonicalization did to one dataset
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalizationStats {
    /// Rows kept with a canonical state
    pub kept: usize,
    /// Kept rows whose name needed the substitution table
    pub corrected: usize,
    /// Rows dropped because the state was empty or numeric
    pub dropped_garbage: usize,
    /// Rows dropped because the state matched no canonical name
    pub dropped_unknown: usize,
    /// A bounded sample of the unknown names seen
    pub unknown_samples: BTreeSet<String>,
}

impl CanonicalizationStats {
    /// Record one classification and return the state to keep, if any
    pub fn record(&mut self, outcome: Canonicalization) -> Option<CanonicalState> {
        match outcome {
            Canonicalization::Canonical { state, corrected } => {
                self.kept += 1;
                if corrected {
                    self.corrected += 1;
                }
                Some(state)
            }
            Canonicalization::Garbage => {
                self.dropped_garbage += 1;
                None
            }
            Canonicalization::Unknown(name) => {
                self.dropped_unknown += 1;
                if self.unknown_samples.len() < UNKNOWN_SAMPLE_LIMIT {
                    self.unknown_samples.insert(name);
                }
                None
            }
        }
    }

    #[must_use]
    pub const fn dropped(&self) -> usize {
        self.dropped_garbage + self.dropped_unknown
    }
}

/// Difference between the states observed in a run and the vocabulary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VocabularyReport {
    /// Canonical names never observed
    pub missing: Vec<&'static str>,
    /// Observed names outside the vocabulary
    pub unexpected: Vec<String>,
}

impl VocabularyReport {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty()
    }
}

/// Compare an observed set of state names with the canonical vocabulary
#[must_use]
pub fn validate_observed_states<'a>(
    observed: impl IntoIterator<Item = &'a str>,
) -> VocabularyReport {
    let observed: BTreeSet<&str> = observed.into_iter().collect();

    VocabularyReport {
        missing: CANONICAL_STATES
            .iter()
            .copied()
            .filter(|s| !observed.contains(s))
            .collect(),
        unexpected: observed
            .into_iter()
            .filter(|s| CanonicalState::from_canonical(s).is_none())
            .map(str::to_string)
            .collect(),
    }
}
