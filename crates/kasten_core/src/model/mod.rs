//! In-memory domain model for templates, notes, cards and decks.
//!
//! # Responsibility
//! - Define the canonical records owned by the stores in `crate::store`.
//! - Keep cross-entity links as plain identifiers, never as references.
//!
//! # Invariants
//! - A note owns its cards; every other link (card -> deck, card ->
//!   template, deck -> parent deck) is an identifier lookup.
//! - Identifiers are unique only within their own category.

pub mod deck;
pub mod note;
pub mod template;

/// Identifier of a [`card`](note::Card), unique among cards.
pub type CardId = u64;
/// Identifier of a [`note`](note::Note), unique among notes.
pub type NoteId = u64;
/// Identifier of a [`deck`](deck::Deck), unique among decks.
pub type DeckId = u64;
/// Identifier of a [`template`](template::Template), unique among templates.
pub type TemplateId = u64;

/// Entity category used in lookups and error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Card,
    Note,
    Deck,
    Template,
}

impl EntityKind {
    /// Stable lowercase name used in messages and log events.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Note => "note",
            Self::Deck => "deck",
            Self::Template => "template",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
