//! Note/card ownership and the card lookup index.
//!
//! # Responsibility
//! - Own every note together with the cards generated from it.
//! - Resolve card identifiers through `card_index` into `(note, position)`.
//! - Render card faces and append review history.
//!
//! # Invariants
//! - `card_index` is refreshed for a note in the same call that places the
//!   note into `notes`, after the insert; no card reference outlives a
//!   mutation of `notes`.
//! - Failed note creation leaves `notes` and `card_index` untouched.
//! - Review history is only ever appended to.

use super::template_store::TemplateStore;
use super::{StoreError, StoreResult};
use crate::ids::IdAllocator;
use crate::model::note::{Card, Note, ReviewHistoryEntry, TemplateSlot};
use crate::model::template::{CardSide, Template};
use crate::model::{CardId, DeckId, EntityKind, NoteId};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Position of a card inside its owning note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardLocation {
    pub note_id: NoteId,
    pub position: usize,
}

#[derive(Debug, Default)]
pub struct NoteCardStore {
    notes: HashMap<NoteId, Note>,
    card_index: HashMap<CardId, CardLocation>,
}

impl NoteCardStore {
    /// Creates one note and one card per front layout of `template`.
    ///
    /// # Errors
    /// - `FieldCountMismatch` when `fields.len()` differs from the
    ///   template's field count. Nothing is created in that case.
    pub fn create_note(
        &mut self,
        ids: &mut IdAllocator,
        template: &Template,
        fields: Vec<String>,
        deck_id: DeckId,
    ) -> StoreResult<NoteId> {
        if fields.len() != template.field_count() {
            return Err(StoreError::FieldCountMismatch {
                expected: template.field_count(),
                actual: fields.len(),
            });
        }

        let note_id = ids.allocate(EntityKind::Note, |candidate| {
            self.notes.contains_key(&candidate)
        })?;

        let mut pending: HashSet<CardId> = HashSet::new();
        let mut note = Note::new(note_id, fields);
        for slot in 0..template.slot_count() {
            let card_id = ids.allocate(EntityKind::Card, |candidate| {
                self.card_index.contains_key(&candidate) || pending.contains(&candidate)
            })?;
            pending.insert(card_id);
            let variant = TemplateSlot {
                template_id: template.id,
                slot: slot as u32,
            };
            note.cards.push(Card::new(card_id, note_id, deck_id, variant));
        }

        self.notes.insert(note_id, note);
        self.reindex_note(note_id);

        debug!(
            "event=note_create module=store status=ok template_id={} cards={}",
            template.id,
            pending.len()
        );
        Ok(note_id)
    }

    /// Re-inserts a persisted note with its cards, ordered by layout slot.
    pub(crate) fn restore(&mut self, mut note: Note) -> StoreResult<()> {
        if self.notes.contains_key(&note.id) {
            return Err(StoreError::IdOccupied(EntityKind::Note, note.id));
        }
        let mut seen = HashSet::new();
        for card in &note.cards {
            if self.card_index.contains_key(&card.id) || !seen.insert(card.id) {
                return Err(StoreError::IdOccupied(EntityKind::Card, card.id));
            }
        }

        note.cards.sort_by_key(|card| card.variant.slot);
        let note_id = note.id;
        self.notes.insert(note_id, note);
        self.reindex_note(note_id);
        Ok(())
    }

    fn reindex_note(&mut self, note_id: NoteId) {
        let Some(note) = self.notes.get(&note_id) else {
            return;
        };
        for (position, card) in note.cards.iter().enumerate() {
            self.card_index
                .insert(card.id, CardLocation { note_id, position });
        }
    }

    pub fn note(&self, id: NoteId) -> StoreResult<&Note> {
        self.notes
            .get(&id)
            .ok_or(StoreError::NotFound(EntityKind::Note, id))
    }

    pub fn card(&self, id: CardId) -> StoreResult<&Card> {
        let location = self.locate(id)?;
        self.notes
            .get(&location.note_id)
            .and_then(|note| note.cards.get(location.position))
            .ok_or(StoreError::NotFound(EntityKind::Card, id))
    }

    fn card_mut(&mut self, id: CardId) -> StoreResult<&mut Card> {
        let location = self.locate(id)?;
        self.notes
            .get_mut(&location.note_id)
            .and_then(|note| note.cards.get_mut(location.position))
            .ok_or(StoreError::NotFound(EntityKind::Card, id))
    }

    /// Looks up where a card lives without borrowing it.
    pub fn locate(&self, id: CardId) -> StoreResult<CardLocation> {
        self.card_index
            .get(&id)
            .copied()
            .ok_or(StoreError::NotFound(EntityKind::Card, id))
    }

    /// Renders one face of a card.
    ///
    /// Placeholders `{{name}}` are replaced in field-declaration order, each
    /// pass scanning the output of the previous ones. A field value that
    /// itself contains a later field's placeholder is therefore substituted
    /// again.
    pub fn render(
        &self,
        templates: &TemplateStore,
        card_id: CardId,
        side: CardSide,
    ) -> StoreResult<String> {
        let card = self.card(card_id)?;
        let note = self.note(card.note_id)?;
        let template = templates.get(card.variant.template_id)?;

        let slot = card.variant.slot as usize;
        let layout = template.layout(side, slot).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "card {card_id} uses layout slot {slot} but template {} has no {side:?} layout there",
                template.id
            ))
        })?;
        if note.fields.len() < template.field_count() {
            return Err(StoreError::InvalidData(format!(
                "note {} has {} fields but template {} declares {}",
                note.id,
                note.fields.len(),
                template.id,
                template.field_count()
            )));
        }

        let mut face = layout.to_string();
        for (field_name, value) in template.field_names.iter().zip(&note.fields) {
            face = face.replace(&Template::placeholder(field_name), value);
        }
        Ok(face)
    }

    /// Appends one review entry to a card's history.
    ///
    /// The first review records elapsed `0` and timestamp `0`; later reviews
    /// measure elapsed time from the previous entry's timestamp.
    pub fn record_review_at(
        &mut self,
        card_id: CardId,
        rating: u32,
        now_ms: u64,
    ) -> StoreResult<ReviewHistoryEntry> {
        let card = self.card_mut(card_id)?;
        let entry = match card.last_review() {
            None => ReviewHistoryEntry {
                elapsed_ms: 0,
                rating,
                timestamp_ms: 0,
            },
            Some(previous) => ReviewHistoryEntry {
                elapsed_ms: now_ms.saturating_sub(previous.timestamp_ms),
                rating,
                timestamp_ms: now_ms,
            },
        };
        card.history.push(entry);

        debug!(
            "event=review_record module=store status=ok rating={} history_len={}",
            rating,
            card.history.len()
        );
        Ok(entry)
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn card_count(&self) -> usize {
        self.card_index.len()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values()
    }

    pub fn cards(&self) -> impl Iterator<Item = &Card> {
        self.notes.values().flat_map(|note| note.cards.iter())
    }
}
