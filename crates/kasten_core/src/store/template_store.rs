//! Template registry.
//!
//! # Invariants
//! - Templates are never updated or removed once registered.
//! - No front/back length check happens here; arity is enforced against
//!   field counts at note creation.

use super::{StoreError, StoreResult};
use crate::ids::IdAllocator;
use crate::model::template::Template;
use crate::model::{EntityKind, TemplateId};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TemplateStore {
    templates: HashMap<TemplateId, Template>,
}

impl TemplateStore {
    /// Stores a new template under a freshly allocated identifier.
    pub fn register(
        &mut self,
        ids: &mut IdAllocator,
        name: impl Into<String>,
        front_layouts: Vec<String>,
        back_layouts: Vec<String>,
        field_names: Vec<String>,
    ) -> StoreResult<TemplateId> {
        let id = ids.allocate(EntityKind::Template, |candidate| {
            self.templates.contains_key(&candidate)
        })?;
        self.templates.insert(
            id,
            Template {
                id,
                name: name.into(),
                front_layouts,
                back_layouts,
                field_names,
            },
        );
        Ok(id)
    }

    /// Re-inserts a persisted template under its original identifier.
    pub(crate) fn restore(&mut self, template: Template) -> StoreResult<()> {
        if self.templates.contains_key(&template.id) {
            return Err(StoreError::IdOccupied(EntityKind::Template, template.id));
        }
        self.templates.insert(template.id, template);
        Ok(())
    }

    pub fn get(&self, id: TemplateId) -> StoreResult<&Template> {
        self.templates
            .get(&id)
            .ok_or(StoreError::NotFound(EntityKind::Template, id))
    }

    pub fn contains(&self, id: TemplateId) -> bool {
        self.templates.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }
}
