//! Rebuilds a `Kasten` from a row store.
//!
//! Order: templates, cards, notes, decks (shallowest path first), then deck
//! membership in card-row order.

use super::schema::{
    check_schema, id_from_sql, open_store, OpenMode, SELECT_CARDS_SQL, SELECT_DECKS_SQL,
    SELECT_NOTES_SQL, SELECT_TEMPLATES_SQL,
};
use super::{PersistError, PersistResult, RowCounts};
use crate::codec::flat::decode;
use crate::config::KastenConfig;
use crate::model::deck::path_depth;
use crate::model::note::{Card, Note, ReviewHistoryEntry, TemplateSlot};
use crate::model::template::Template;
use crate::model::{CardId, DeckId, NoteId, TemplateId};
use crate::store::Kasten;
use log::{error, info, warn};
use rusqlite::{Connection, Row};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Instant;

/// Loads a collection saved by [`save`](super::save) using default
/// configuration.
pub fn load(path: impl AsRef<Path>) -> PersistResult<Kasten> {
    load_with_config(path, KastenConfig::default())
}

/// Loads a collection, keeping every persisted identifier.
///
/// # Side effects
/// - Emits `kasten_load` logging events with duration and row counts.
pub fn load_with_config(path: impl AsRef<Path>, config: KastenConfig) -> PersistResult<Kasten> {
    let started_at = Instant::now();
    info!("event=kasten_load module=persist status=start");

    let result = open_store(path.as_ref(), OpenMode::ReadOnly, config.busy_timeout)
        .and_then(|conn| read_rows(&conn, Kasten::with_config(config)));
    match result {
        Ok((kasten, counts)) => {
            info!(
                "event=kasten_load module=persist status=ok duration_ms={} cards={} notes={} decks={} templates={}",
                started_at.elapsed().as_millis(),
                counts.cards,
                counts.notes,
                counts.decks,
                counts.templates
            );
            Ok(kasten)
        }
        Err(err) => {
            error!(
                "event=kasten_load module=persist status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            Err(err)
        }
    }
}

fn read_rows(conn: &Connection, mut kasten: Kasten) -> PersistResult<(Kasten, RowCounts)> {
    check_schema(conn)?;
    let mut counts = RowCounts::default();

    // Templates come first: they disambiguate lists that encode to "".
    let mut field_counts: HashMap<TemplateId, usize> = HashMap::new();
    for template in read_templates(conn)? {
        field_counts.insert(template.id, template.field_count());
        kasten.restore_template(template)?;
        counts.templates += 1;
    }

    let cards = read_cards(conn)?;
    counts.cards = cards.len();
    let deck_links: Vec<(DeckId, CardId)> =
        cards.iter().map(|card| (card.deck_id, card.id)).collect();
    let mut cards_by_note: HashMap<NoteId, Vec<Card>> = HashMap::new();
    for card in cards {
        cards_by_note.entry(card.note_id).or_default().push(card);
    }

    for (note_id, mut fields) in read_notes(conn)? {
        let cards = cards_by_note.remove(&note_id).unwrap_or_default();
        let expected = cards
            .first()
            .and_then(|card| field_counts.get(&card.variant.template_id));
        if fields.is_empty() && expected == Some(&1) {
            fields.push(String::new());
        }
        let mut note = Note::new(note_id, fields);
        note.cards = cards;
        kasten.restore_note(note)?;
        counts.notes += 1;
    }
    if !cards_by_note.is_empty() {
        warn!(
            "event=kasten_load module=persist status=warn error_code=orphan_cards count={}",
            cards_by_note.values().map(Vec::len).sum::<usize>()
        );
    }

    let mut decks = read_decks(conn)?;
    decks.sort_by_key(|(_, name)| path_depth(name));
    for (deck_id, name) in &decks {
        kasten.restore_deck(name, *deck_id)?;
        counts.decks += 1;
    }
    let mut unlinked = 0usize;
    for (deck_id, card_id) in deck_links {
        if kasten.card(card_id).is_ok() && !kasten.attach_card_to_deck(deck_id, card_id) {
            unlinked += 1;
        }
    }
    if unlinked > 0 {
        warn!(
            "event=kasten_load module=persist status=warn error_code=deck_missing count={}",
            unlinked
        );
    }

    Ok((kasten, counts))
}

fn read_cards(conn: &Connection) -> PersistResult<Vec<Card>> {
    let mut stmt = conn.prepare(SELECT_CARDS_SQL).map_err(PersistError::Read)?;
    let mut rows = stmt.query([]).map_err(PersistError::Read)?;
    let mut cards = Vec::new();
    while let Some(row) = rows.next().map_err(PersistError::Read)? {
        cards.push(parse_card_row(row)?);
    }
    Ok(cards)
}

fn parse_card_row(row: &Row<'_>) -> PersistResult<Card> {
    let card_id = id_from_sql(get(row, "cardId")?);
    let slot_value: i64 = get(row, "layoutSlotIndex")?;
    let slot = u32::try_from(slot_value).map_err(|_| PersistError::InvalidRow {
        table: "cardPile",
        message: format!("card {card_id} has layout slot {slot_value}"),
    })?;

    let elapsed: Vec<u64> = decode_column(row, "cardPile", "elapsedTimeHistory")?;
    let timestamps: Vec<u64> = decode_column(row, "cardPile", "timestampHistory")?;
    let ratings: Vec<u32> = decode_column(row, "cardPile", "ratingHistory")?;
    if elapsed.len() != timestamps.len() || elapsed.len() != ratings.len() {
        return Err(PersistError::InvalidRow {
            table: "cardPile",
            message: format!(
                "card {card_id} history lists differ in length ({}, {}, {})",
                elapsed.len(),
                timestamps.len(),
                ratings.len()
            ),
        });
    }

    let variant = TemplateSlot {
        template_id: id_from_sql(get(row, "templateId")?),
        slot,
    };
    let mut card = Card::new(
        card_id,
        id_from_sql(get(row, "noteId")?),
        id_from_sql(get(row, "deckId")?),
        variant,
    );
    card.history = elapsed
        .into_iter()
        .zip(timestamps)
        .zip(ratings)
        .map(|((elapsed_ms, timestamp_ms), rating)| ReviewHistoryEntry {
            elapsed_ms,
            rating,
            timestamp_ms,
        })
        .collect();
    Ok(card)
}

fn read_notes(conn: &Connection) -> PersistResult<Vec<(NoteId, Vec<String>)>> {
    let mut stmt = conn.prepare(SELECT_NOTES_SQL).map_err(PersistError::Read)?;
    let mut rows = stmt.query([]).map_err(PersistError::Read)?;
    let mut notes = Vec::new();
    while let Some(row) = rows.next().map_err(PersistError::Read)? {
        let note_id = id_from_sql(get(row, "noteId")?);
        let fields = decode_column(row, "notes", "fields")?;
        notes.push((note_id, fields));
    }
    Ok(notes)
}

fn read_decks(conn: &Connection) -> PersistResult<Vec<(DeckId, String)>> {
    let mut stmt = conn.prepare(SELECT_DECKS_SQL).map_err(PersistError::Read)?;
    let mut rows = stmt.query([]).map_err(PersistError::Read)?;
    let mut decks = Vec::new();
    while let Some(row) = rows.next().map_err(PersistError::Read)? {
        decks.push((id_from_sql(get(row, "deckId")?), get(row, "deckName")?));
    }
    Ok(decks)
}

fn read_templates(conn: &Connection) -> PersistResult<Vec<Template>> {
    let mut stmt = conn
        .prepare(SELECT_TEMPLATES_SQL)
        .map_err(PersistError::Read)?;
    let mut rows = stmt.query([]).map_err(PersistError::Read)?;
    let mut templates = Vec::new();
    while let Some(row) = rows.next().map_err(PersistError::Read)? {
        let mut front_layouts: Vec<String> =
            decode_column(row, "templateCollection", "frontLayouts")?;
        let mut back_layouts: Vec<String> =
            decode_column(row, "templateCollection", "backLayouts")?;
        // A single empty layout encodes to ""; the other side gives the slot count.
        if back_layouts.is_empty() && front_layouts.len() == 1 {
            back_layouts.push(String::new());
        } else if front_layouts.is_empty() && back_layouts.len() == 1 {
            front_layouts.push(String::new());
        }
        templates.push(Template {
            id: id_from_sql(get(row, "templateId")?),
            name: get(row, "templateName")?,
            front_layouts,
            back_layouts,
            field_names: decode_column(row, "templateCollection", "fieldNames")?,
        });
    }
    Ok(templates)
}

fn get<T: rusqlite::types::FromSql>(row: &Row<'_>, column: &str) -> PersistResult<T> {
    row.get(column).map_err(PersistError::Read)
}

fn decode_column<T>(row: &Row<'_>, table: &'static str, column: &'static str) -> PersistResult<Vec<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let text: String = get(row, column)?;
    decode(&text).map_err(|source| PersistError::Decode {
        table,
        column,
        source,
    })
}
