//! Hierarchical deck model.
//!
//! # Responsibility
//! - Describe a named card grouping and its path segments.
//!
//! # Invariants
//! - `name` is the full path, segments joined by [`DECK_SEPARATOR`].
//! - `parents` holds deck identifiers only; parent decks are never copied.

use super::{CardId, DeckId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Separator between deck path segments, e.g. `Lang::Spanish`.
pub const DECK_SEPARATOR: &str = "::";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deck {
    pub id: DeckId,
    pub name: String,
    /// Member cards in insertion order.
    pub card_ids: Vec<CardId>,
    pub parents: BTreeSet<DeckId>,
}

impl Deck {
    pub fn new(id: DeckId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            card_ids: Vec::new(),
            parents: BTreeSet::new(),
        }
    }

    /// Number of path segments in this deck's name.
    pub fn depth(&self) -> usize {
        path_depth(&self.name)
    }
}

/// Splits a deck path into its segments. Matching is exact: no trimming or
/// case folding.
pub fn path_segments(name: &str) -> Vec<&str> {
    name.split(DECK_SEPARATOR).collect()
}

/// Number of segments in a deck path.
pub fn path_depth(name: &str) -> usize {
    name.matches(DECK_SEPARATOR).count() + 1
}

/// Returns every strict, non-empty ancestor path of `name`, shortest first.
///
/// `"A::B::C"` yields `["A", "A::B"]`; a name without separator yields none.
pub fn ancestor_paths(name: &str) -> Vec<String> {
    let segments = path_segments(name);
    (1..segments.len())
        .map(|len| segments[..len].join(DECK_SEPARATOR))
        .collect()
}
