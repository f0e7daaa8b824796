//! Writes a `Kasten` into a fresh row store.

use super::schema::{
    create_schema, id_to_sql, open_store, OpenMode, INSERT_CARD_SQL, INSERT_DECK_SQL,
    INSERT_NOTE_SQL, INSERT_TEMPLATE_SQL,
};
use super::{PersistError, PersistResult, RowCounts};
use crate::codec::flat::encode;
use crate::model::note::Card;
use crate::model::CardId;
use crate::store::Kasten;
use log::{error, info, warn};
use rusqlite::{params, Connection};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Saves every template, note, card and deck to `path`.
///
/// Rows go to `<path><temp_suffix>` first; the file is renamed over `path`
/// only after the transaction commits and the connection closes. On failure
/// the target is untouched and the temporary file is removed.
///
/// # Side effects
/// - Emits `kasten_save` logging events with duration and row counts.
pub fn save(kasten: &Kasten, path: impl AsRef<Path>) -> PersistResult<RowCounts> {
    let started_at = Instant::now();
    info!("event=kasten_save module=persist status=start");

    let target = path.as_ref();
    let temp = temp_path(target, &kasten.config().temp_suffix);
    match save_via_temp(kasten, target, &temp) {
        Ok(counts) => {
            info!(
                "event=kasten_save module=persist status=ok duration_ms={} cards={} notes={} decks={} templates={}",
                started_at.elapsed().as_millis(),
                counts.cards,
                counts.notes,
                counts.decks,
                counts.templates
            );
            Ok(counts)
        }
        Err(err) => {
            if temp.exists() {
                if let Err(cleanup) = fs::remove_file(&temp) {
                    warn!(
                        "event=kasten_save module=persist status=warn error_code=temp_cleanup_failed error={}",
                        cleanup
                    );
                }
            }
            error!(
                "event=kasten_save module=persist status=error duration_ms={} error_code={} error={}",
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            Err(err)
        }
    }
}

fn temp_path(target: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(target.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

fn save_via_temp(kasten: &Kasten, target: &Path, temp: &Path) -> PersistResult<RowCounts> {
    if temp.exists() {
        fs::remove_file(temp).map_err(|source| PersistError::Io {
            action: "remove stale temporary file",
            path: temp.to_path_buf(),
            source,
        })?;
    }

    let mut conn = open_store(temp, OpenMode::Create, kasten.config().busy_timeout)?;
    let counts = write_rows(&mut conn, kasten)?;
    conn.close().map_err(|(_, err)| PersistError::Write(err))?;

    fs::rename(temp, target).map_err(|source| PersistError::Io {
        action: "rename temporary file over",
        path: target.to_path_buf(),
        source,
    })?;
    Ok(counts)
}

fn write_rows(conn: &mut Connection, kasten: &Kasten) -> PersistResult<RowCounts> {
    create_schema(conn)?;

    let tx = conn.transaction().map_err(PersistError::Write)?;
    let mut counts = RowCounts::default();
    {
        let mut notes: Vec<_> = kasten.notes().notes().collect();
        notes.sort_by_key(|note| note.id);

        let mut decks: Vec<_> = kasten.decks().iter().collect();
        decks.sort_by_key(|deck| deck.id);

        // Card rows follow deck membership order; load re-attaches in row order.
        let members = decks
            .iter()
            .flat_map(|deck| deck.card_ids.iter())
            .filter_map(|&card_id| kasten.card(card_id).ok());
        let mut ordered: Vec<&Card> = Vec::with_capacity(kasten.notes().card_count());
        let mut written: HashSet<CardId> = HashSet::new();
        for card in members.chain(notes.iter().flat_map(|note| note.cards.iter())) {
            if written.insert(card.id) {
                ordered.push(card);
            }
        }

        let mut insert_card = tx.prepare(INSERT_CARD_SQL).map_err(PersistError::Write)?;
        for card in ordered {
            let elapsed: Vec<u64> = card.history.iter().map(|h| h.elapsed_ms).collect();
            let timestamps: Vec<u64> = card.history.iter().map(|h| h.timestamp_ms).collect();
            let ratings: Vec<u32> = card.history.iter().map(|h| h.rating).collect();
            insert_card
                .execute(params![
                    id_to_sql(card.id),
                    id_to_sql(card.variant.template_id),
                    id_to_sql(card.note_id),
                    i64::from(card.variant.slot),
                    id_to_sql(card.deck_id),
                    encode(&elapsed),
                    encode(&timestamps),
                    encode(&ratings),
                ])
                .map_err(PersistError::Write)?;
            counts.cards += 1;
        }

        let mut insert_note = tx.prepare(INSERT_NOTE_SQL).map_err(PersistError::Write)?;
        for note in &notes {
            insert_note
                .execute(params![id_to_sql(note.id), encode(&note.fields)])
                .map_err(PersistError::Write)?;
            counts.notes += 1;
        }

        let mut insert_deck = tx.prepare(INSERT_DECK_SQL).map_err(PersistError::Write)?;
        for deck in decks {
            insert_deck
                .execute(params![id_to_sql(deck.id), deck.name.as_str()])
                .map_err(PersistError::Write)?;
            counts.decks += 1;
        }

        let mut templates: Vec<_> = kasten.templates().iter().collect();
        templates.sort_by_key(|template| template.id);
        let mut insert_template = tx
            .prepare(INSERT_TEMPLATE_SQL)
            .map_err(PersistError::Write)?;
        for template in templates {
            insert_template
                .execute(params![
                    id_to_sql(template.id),
                    template.name.as_str(),
                    encode(&template.front_layouts),
                    encode(&template.back_layouts),
                    encode(&template.field_names),
                ])
                .map_err(PersistError::Write)?;
            counts.templates += 1;
        }
    }
    tx.commit().map_err(PersistError::Write)?;

    Ok(counts)
}
