//! Card template model.
//!
//! # Responsibility
//! - Describe how one note renders into one card per layout slot.
//!
//! # Invariants
//! - Templates are immutable after registration.
//! - `front_layouts[i]` and `back_layouts[i]` describe the same card variant.
//! - Every note created against a template carries exactly
//!   `field_names.len()` field values.

use super::TemplateId;
use serde::{Deserialize, Serialize};

/// Which face of a card to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardSide {
    Front,
    Back,
}

impl CardSide {
    /// Parses the single-character side codes (`f` front, `r` reverse).
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'f' => Some(Self::Front),
            'r' => Some(Self::Back),
            _ => None,
        }
    }
}

/// Reusable layout definition with positional field bindings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    /// One entry per card variant; the slot index is the card's variant.
    pub front_layouts: Vec<String>,
    /// Parallel to `front_layouts`.
    pub back_layouts: Vec<String>,
    /// `{{name}}` placeholders bind to note field values by position.
    pub field_names: Vec<String>,
}

impl Template {
    /// Number of field values a note must supply.
    pub fn field_count(&self) -> usize {
        self.field_names.len()
    }

    /// Number of cards a note generates (one per front layout).
    pub fn slot_count(&self) -> usize {
        self.front_layouts.len()
    }

    /// Returns the layout text for one side of one slot.
    pub fn layout(&self, side: CardSide, slot: usize) -> Option<&str> {
        let layouts = match side {
            CardSide::Front => &self.front_layouts,
            CardSide::Back => &self.back_layouts,
        };
        layouts.get(slot).map(String::as_str)
    }

    /// Returns the `{{name}}` placeholder for one field name.
    pub fn placeholder(field_name: &str) -> String {
        format!("{{{{{field_name}}}}}")
    }
}
