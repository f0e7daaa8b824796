//! Save/load of a whole `Kasten` to a SQLite row store.
//!
//! # Responsibility
//! - Flatten the in-memory object graph into four row collections
//!   (`cardPile`, `notes`, `boxes`, `templateCollection`).
//! - Rebuild a `Kasten` from those rows with identical identifiers.
//!
//! # Invariants
//! - Save writes to a temporary file and renames it over the target only
//!   after every row is committed; the rename is the commit point.
//! - Load restores templates, then cards, notes and decks; deck membership
//!   follows card-row order.
//! - The store connection is closed on every return path.
//! - Nested sequences are stored with `codec::flat`; malformed numeric
//!   tokens fail the load instead of defaulting.

use crate::codec::flat::DecodeError;
use crate::store::{ErrorKind, StoreError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

mod loader;
pub mod schema;
mod writer;

pub use loader::{load, load_with_config};
pub use writer::save;

pub type PersistResult<T> = Result<T, PersistError>;

/// Number of rows written or read per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowCounts {
    pub cards: usize,
    pub notes: usize,
    pub decks: usize,
    pub templates: usize,
}

/// Errors from persistence operations.
#[derive(Debug)]
pub enum PersistError {
    /// The row store could not be opened or configured.
    Open(rusqlite::Error),
    /// Row collections could not be created.
    Schema(rusqlite::Error),
    /// A row insert or the enclosing transaction failed.
    Write(rusqlite::Error),
    /// A row query failed during load.
    Read(rusqlite::Error),
    /// File-level step around the store (stale temp removal, final rename).
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    /// A flat-encoded column holds a malformed token.
    Decode {
        table: &'static str,
        column: &'static str,
        source: DecodeError,
    },
    /// A row is well-typed but inconsistent (e.g. history lists differ in
    /// length, slot index out of range).
    InvalidRow {
        table: &'static str,
        message: String,
    },
    /// A required row collection is missing from the file.
    MissingTable(&'static str),
    UnsupportedSchemaVersion {
        file_version: u32,
        latest_supported: u32,
    },
    /// Restoring rows into the in-memory stores failed.
    Store(StoreError),
}

impl PersistError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Store(err) => err.kind(),
            _ => ErrorKind::Storage,
        }
    }

    /// Stable code used as `error_code` in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Open(_) => "storage_open_failed",
            Self::Schema(_) | Self::MissingTable(_) | Self::UnsupportedSchemaVersion { .. } => {
                "storage_schema_failed"
            }
            Self::Write(_) | Self::Io { .. } => "storage_write_failed",
            Self::Read(_) => "storage_read_failed",
            Self::Decode { .. } | Self::InvalidRow { .. } => "decode_failed",
            Self::Store(err) => err.code(),
        }
    }
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(err) => write!(f, "failed to open row store: {err}"),
            Self::Schema(err) => write!(f, "failed to create row collections: {err}"),
            Self::Write(err) => write!(f, "failed to write rows: {err}"),
            Self::Read(err) => write!(f, "failed to read rows: {err}"),
            Self::Io {
                action,
                path,
                source,
            } => write!(f, "failed to {action} `{}`: {source}", path.display()),
            Self::Decode {
                table,
                column,
                source,
            } => write!(f, "malformed {table}.{column}: {source}"),
            Self::InvalidRow { table, message } => write!(f, "invalid {table} row: {message}"),
            Self::MissingTable(table) => write!(f, "row store has no `{table}` collection"),
            Self::UnsupportedSchemaVersion {
                file_version,
                latest_supported,
            } => write!(
                f,
                "row store schema version {file_version} is newer than supported {latest_supported}"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for PersistError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open(err) | Self::Schema(err) | Self::Write(err) | Self::Read(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Decode { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            Self::InvalidRow { .. }
            | Self::MissingTable(_)
            | Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<StoreError> for PersistError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
