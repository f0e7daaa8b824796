//! In-memory stores and the `Kasten` facade that owns them.
//!
//! # Responsibility
//! - Own templates, notes (with their cards) and decks for one collection.
//! - Route every identifier allocation through one `IdAllocator`.
//! - Report data-integrity failures without partially mutating state.
//!
//! # Invariants
//! - Notes and cards are created together and never deleted.
//! - Cards reference decks and templates by identifier only.

use crate::config::KastenConfig;
use crate::ids::{AllocationExhausted, IdAllocator};
use crate::model::deck::Deck;
use crate::model::note::{Card, Note, ReviewHistoryEntry};
use crate::model::template::{CardSide, Template};
use crate::model::{CardId, DeckId, EntityKind, NoteId, TemplateId};
use log::warn;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod deck_tree;
pub mod note_store;
pub mod template_store;

pub use deck_tree::DeckTree;
pub use note_store::{CardLocation, NoteCardStore};
pub use template_store::TemplateStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse failure class callers use to decide between prompting and
/// aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Validation,
    Storage,
}

/// Errors from in-memory store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Unknown identifier passed to a lookup.
    NotFound(EntityKind, u64),
    /// Note field values do not match the template's field names.
    FieldCountMismatch { expected: usize, actual: usize },
    /// Identifier allocation gave up after its retry cap.
    AllocationExhausted(AllocationExhausted),
    /// Restore asked for an identifier that is already taken.
    IdOccupied(EntityKind, u64),
    /// Stored state is inconsistent (dangling slot, missing fields).
    InvalidData(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(..) => ErrorKind::NotFound,
            Self::FieldCountMismatch { .. } | Self::IdOccupied(..) | Self::InvalidData(_) => {
                ErrorKind::Validation
            }
            Self::AllocationExhausted(_) => ErrorKind::Storage,
        }
    }

    /// Stable code used as `error_code` in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(..) => "not_found",
            Self::FieldCountMismatch { .. } => "field_count_mismatch",
            Self::AllocationExhausted(_) => "allocation_exhausted",
            Self::IdOccupied(..) => "id_occupied",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(kind, id) => write!(f, "{kind} not found: {id}"),
            Self::FieldCountMismatch { expected, actual } => write!(
                f,
                "template expects {expected} field values, got {actual}"
            ),
            Self::AllocationExhausted(err) => write!(f, "{err}"),
            Self::IdOccupied(kind, id) => write!(f, "{kind} id already in use: {id}"),
            Self::InvalidData(message) => write!(f, "invalid store data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::AllocationExhausted(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AllocationExhausted> for StoreError {
    fn from(value: AllocationExhausted) -> Self {
        Self::AllocationExhausted(value)
    }
}

/// One flashcard collection: templates, notes with their cards, and decks.
#[derive(Debug)]
pub struct Kasten {
    config: KastenConfig,
    ids: IdAllocator,
    templates: TemplateStore,
    notes: NoteCardStore,
    decks: DeckTree,
}

impl Default for Kasten {
    fn default() -> Self {
        Self::new()
    }
}

impl Kasten {
    /// Creates an empty collection with default configuration.
    pub fn new() -> Self {
        Self::with_config(KastenConfig::default())
    }

    pub fn with_config(config: KastenConfig) -> Self {
        let ids = IdAllocator::new(config.max_id_attempts);
        Self {
            config,
            ids,
            templates: TemplateStore::default(),
            notes: NoteCardStore::default(),
            decks: DeckTree::default(),
        }
    }

    pub fn config(&self) -> &KastenConfig {
        &self.config
    }

    /// Allocates an identifier that is free within `category`.
    pub fn allocate_id(&mut self, category: EntityKind) -> StoreResult<u64> {
        let id = match category {
            EntityKind::Card => self
                .ids
                .allocate(category, |id| self.notes.locate(id).is_ok())?,
            EntityKind::Note => self
                .ids
                .allocate(category, |id| self.notes.note(id).is_ok())?,
            EntityKind::Deck => self
                .ids
                .allocate(category, |id| self.decks.get(id).is_ok())?,
            EntityKind::Template => self
                .ids
                .allocate(category, |id| self.templates.contains(id))?,
        };
        Ok(id)
    }

    /// Registers a template and returns its identifier.
    pub fn register_template(
        &mut self,
        name: impl Into<String>,
        front_layouts: Vec<String>,
        back_layouts: Vec<String>,
        field_names: Vec<String>,
    ) -> StoreResult<TemplateId> {
        self.templates.register(
            &mut self.ids,
            name,
            front_layouts,
            back_layouts,
            field_names,
        )
    }

    /// Creates a note and its cards against `template_id`.
    ///
    /// New cards are appended to `deck_id`'s member list when that deck
    /// exists; otherwise they keep a dangling deck reference.
    pub fn create_note(
        &mut self,
        template_id: TemplateId,
        fields: Vec<String>,
        deck_id: DeckId,
    ) -> StoreResult<NoteId> {
        let template = self.templates.get(template_id)?;
        let note_id = self
            .notes
            .create_note(&mut self.ids, template, fields, deck_id)?;

        let card_ids: Vec<CardId> = self
            .notes
            .note(note_id)?
            .cards
            .iter()
            .map(|card| card.id)
            .collect();
        for card_id in card_ids {
            if !self.decks.attach_card(deck_id, card_id) {
                warn!(
                    "event=note_create module=store status=warn error_code=deck_missing deck_id={}",
                    deck_id
                );
                break;
            }
        }
        Ok(note_id)
    }

    /// Resolves a `::`-separated deck path, creating missing decks.
    pub fn resolve_deck(&mut self, name: &str) -> StoreResult<DeckId> {
        self.decks.resolve(&mut self.ids, name)
    }

    /// Renders one face of a card with the note's field values substituted.
    pub fn render(&self, card_id: CardId, side: CardSide) -> StoreResult<String> {
        self.notes.render(&self.templates, card_id, side)
    }

    /// Records a review at the current wall-clock time.
    pub fn record_review(
        &mut self,
        card_id: CardId,
        rating: u32,
    ) -> StoreResult<ReviewHistoryEntry> {
        self.notes.record_review_at(card_id, rating, now_epoch_ms())
    }

    /// Records a review at an explicit epoch-millisecond timestamp.
    pub fn record_review_at(
        &mut self,
        card_id: CardId,
        rating: u32,
        now_ms: u64,
    ) -> StoreResult<ReviewHistoryEntry> {
        self.notes.record_review_at(card_id, rating, now_ms)
    }

    pub fn template(&self, id: TemplateId) -> StoreResult<&Template> {
        self.templates.get(id)
    }

    pub fn note(&self, id: NoteId) -> StoreResult<&Note> {
        self.notes.note(id)
    }

    pub fn card(&self, id: CardId) -> StoreResult<&Card> {
        self.notes.card(id)
    }

    pub fn deck(&self, id: DeckId) -> StoreResult<&Deck> {
        self.decks.get(id)
    }

    pub fn deck_by_name(&self, name: &str) -> Option<DeckId> {
        self.decks.find_by_name(name)
    }

    /// Ancestors of a deck, nearest first.
    pub fn deck_ancestors(&self, id: DeckId) -> StoreResult<Vec<DeckId>> {
        self.decks.ancestors(id)
    }

    /// Cards listed as members of a deck, in membership order.
    pub fn cards_in_deck(&self, id: DeckId) -> StoreResult<Vec<&Card>> {
        self.decks
            .get(id)?
            .card_ids
            .iter()
            .map(|card_id| self.notes.card(*card_id))
            .collect()
    }

    pub fn templates(&self) -> &TemplateStore {
        &self.templates
    }

    pub fn notes(&self) -> &NoteCardStore {
        &self.notes
    }

    pub fn decks(&self) -> &DeckTree {
        &self.decks
    }

    pub(crate) fn restore_template(&mut self, template: Template) -> StoreResult<()> {
        self.templates.restore(template)
    }

    pub(crate) fn restore_note(&mut self, note: Note) -> StoreResult<()> {
        self.notes.restore(note)
    }

    pub(crate) fn restore_deck(&mut self, name: &str, id: DeckId) -> StoreResult<DeckId> {
        self.decks.restore(&mut self.ids, name, id)
    }

    pub(crate) fn attach_card_to_deck(&mut self, deck_id: DeckId, card_id: CardId) -> bool {
        self.decks.attach_card(deck_id, card_id)
    }
}

/// Current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{ErrorKind, Kasten, StoreError};
    use crate::model::EntityKind;

    #[test]
    fn error_kinds_classify_failures() {
        assert_eq!(
            StoreError::NotFound(EntityKind::Card, 1).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            StoreError::FieldCountMismatch {
                expected: 2,
                actual: 1
            }
            .kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn allocate_id_avoids_existing_keys_per_category() {
        let mut kasten = Kasten::new();
        let deck = kasten.resolve_deck("Inbox").unwrap();
        for _ in 0..256 {
            assert_ne!(kasten.allocate_id(EntityKind::Deck).unwrap(), deck);
        }
    }
}
