//! Row layout and connection bootstrap for persisted collections.
//!
//! # Invariants
//! - Written files carry `PRAGMA user_version = SCHEMA_VERSION`.
//! - Files stamped with a newer version are rejected on load.
//! - Identifiers are stored as the bit pattern of `u64` in an `INTEGER`.

use super::{PersistError, PersistResult};
use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

pub(crate) const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Version stamped into `PRAGMA user_version` on save.
pub const SCHEMA_VERSION: u32 = 1;

/// Row collections every persisted file must contain.
pub const REQUIRED_TABLES: [&str; 4] = ["cardPile", "notes", "boxes", "templateCollection"];

pub(crate) const INSERT_CARD_SQL: &str = "INSERT INTO cardPile (
    cardId,
    templateId,
    noteId,
    layoutSlotIndex,
    deckId,
    elapsedTimeHistory,
    timestampHistory,
    ratingHistory
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8);";

pub(crate) const INSERT_NOTE_SQL: &str = "INSERT INTO notes (noteId, fields) VALUES (?1, ?2);";

pub(crate) const INSERT_DECK_SQL: &str = "INSERT INTO boxes (deckId, deckName) VALUES (?1, ?2);";

pub(crate) const INSERT_TEMPLATE_SQL: &str = "INSERT INTO templateCollection (
    templateId,
    templateName,
    frontLayouts,
    backLayouts,
    fieldNames
) VALUES (?1, ?2, ?3, ?4, ?5);";

pub(crate) const SELECT_CARDS_SQL: &str = "SELECT
    cardId,
    templateId,
    noteId,
    layoutSlotIndex,
    deckId,
    elapsedTimeHistory,
    timestampHistory,
    ratingHistory
FROM cardPile
ORDER BY rowid;";

pub(crate) const SELECT_NOTES_SQL: &str = "SELECT noteId, fields FROM notes ORDER BY rowid;";

pub(crate) const SELECT_DECKS_SQL: &str = "SELECT deckId, deckName FROM boxes ORDER BY rowid;";

pub(crate) const SELECT_TEMPLATES_SQL: &str = "SELECT
    templateId,
    templateName,
    frontLayouts,
    backLayouts,
    fieldNames
FROM templateCollection
ORDER BY rowid;";

pub(crate) fn id_to_sql(id: u64) -> i64 {
    id as i64
}

pub(crate) fn id_from_sql(value: i64) -> u64 {
    value as u64
}

/// Connection access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OpenMode {
    /// Create the file if missing.
    Create,
    /// Existing file only; nothing is written.
    ReadOnly,
}

impl OpenMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::ReadOnly => "read_only",
        }
    }

    fn flags(self) -> OpenFlags {
        match self {
            Self::Create => {
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX
            }
            Self::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        }
    }
}

/// Opens a row store and applies connection settings.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub(crate) fn open_store(
    path: &Path,
    mode: OpenMode,
    busy_timeout: Duration,
) -> PersistResult<Connection> {
    let started_at = Instant::now();
    info!(
        "event=db_open module=persist status=start mode={}",
        mode.as_str()
    );

    let conn = Connection::open_with_flags(path, mode.flags())
        .and_then(|conn| {
            conn.busy_timeout(busy_timeout)?;
            Ok(conn)
        })
        .map_err(PersistError::Open);

    match &conn {
        Ok(_) => info!(
            "event=db_open module=persist status=ok mode={} duration_ms={}",
            mode.as_str(),
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=persist status=error mode={} duration_ms={} error_code={} error={}",
            mode.as_str(),
            started_at.elapsed().as_millis(),
            err.code(),
            err
        ),
    }
    conn
}

/// Creates the four row collections and stamps the schema version.
pub(crate) fn create_schema(conn: &Connection) -> PersistResult<()> {
    conn.execute_batch(SCHEMA_SQL)
        .and_then(|()| conn.execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};")))
        .map_err(PersistError::Schema)
}

/// Verifies version stamp and required tables before any row is read.
pub(crate) fn check_schema(conn: &Connection) -> PersistResult<()> {
    let version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(PersistError::Read)?;
    if version > SCHEMA_VERSION {
        return Err(PersistError::UnsupportedSchemaVersion {
            file_version: version,
            latest_supported: SCHEMA_VERSION,
        });
    }

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(PersistError::MissingTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> PersistResult<bool> {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )
        .map_err(PersistError::Read)?;
    Ok(exists == 1)
}

#[cfg(test)]
mod tests {
    use super::{id_from_sql, id_to_sql};

    #[test]
    fn ids_above_i64_max_survive_sql_conversion() {
        for id in [0, 1, i64::MAX as u64, i64::MAX as u64 + 1, u64::MAX] {
            assert_eq!(id_from_sql(id_to_sql(id)), id);
        }
    }
}
