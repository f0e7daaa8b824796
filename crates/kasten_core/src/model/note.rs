//! Note, card and review history model.
//!
//! # Responsibility
//! - Define notes as the single owner of their generated cards.
//! - Record review events as an append-only history per card.
//!
//! # Invariants
//! - `Note::cards` is ordered by layout slot.
//! - `Card::history` is append-only; entries are never edited or removed.

use super::{CardId, DeckId, NoteId, TemplateId};
use serde::{Deserialize, Serialize};

/// One recorded rating event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewHistoryEntry {
    /// Milliseconds since the previous review, `0` for the first review.
    pub elapsed_ms: u64,
    pub rating: u32,
    /// Unix epoch milliseconds, `0` for the first review.
    pub timestamp_ms: u64,
}

/// Template variant that renders a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TemplateSlot {
    pub template_id: TemplateId,
    /// Index into the template's front/back layout lists.
    pub slot: u32,
}

/// One renderable variant of a note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub note_id: NoteId,
    pub deck_id: DeckId,
    pub variant: TemplateSlot,
    pub history: Vec<ReviewHistoryEntry>,
}

impl Card {
    /// Creates a card with empty review history.
    pub fn new(id: CardId, note_id: NoteId, deck_id: DeckId, variant: TemplateSlot) -> Self {
        Self {
            id,
            note_id,
            deck_id,
            variant,
            history: Vec::new(),
        }
    }

    /// Most recent review, if any.
    pub fn last_review(&self) -> Option<&ReviewHistoryEntry> {
        self.history.last()
    }
}

/// Field values plus every card generated from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub fields: Vec<String>,
    pub cards: Vec<Card>,
}

impl Note {
    pub fn new(id: NoteId, fields: Vec<String>) -> Self {
        Self {
            id,
            fields,
            cards: Vec::new(),
        }
    }
}
