//! Text encodings used by the persisted row layout.

pub mod flat;
