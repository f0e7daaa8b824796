//! Core of the Kasten flashcard store.
//!
//! Templates, notes with their generated cards, and hierarchical decks live
//! in memory inside a [`Kasten`]; [`persist`] flattens them into a SQLite
//! row store and rebuilds them with identical identifiers.

pub mod codec;
pub mod config;
pub mod ids;
pub mod logging;
pub mod model;
pub mod persist;
pub mod store;

pub use config::KastenConfig;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::deck::{Deck, DECK_SEPARATOR};
pub use model::note::{Card, Note, ReviewHistoryEntry, TemplateSlot};
pub use model::template::{CardSide, Template};
pub use model::{CardId, DeckId, EntityKind, NoteId, TemplateId};
pub use persist::{load, load_with_config, save, PersistError, PersistResult, RowCounts};
pub use store::{ErrorKind, Kasten, StoreError, StoreResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
