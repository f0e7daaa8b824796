//! Deck hierarchy resolution.
//!
//! # Responsibility
//! - Map full deck paths (`Parent::Child`) to deck identifiers.
//! - Create missing ancestor decks before the leaf, shortest path first.
//!
//! # Invariants
//! - Deck names are unique; `by_name` and `decks` always agree.
//! - Resolving an existing name is a no-op returning its identifier.
//! - A created deck's parent is its longest ancestor path; ancestors are
//!   never duplicated.
//! - A failed resolve (rejected restore identifier, exhausted allocation)
//!   leaves the tree unchanged.

use super::{StoreError, StoreResult};
use crate::ids::IdAllocator;
use crate::model::deck::{ancestor_paths, Deck};
use crate::model::{CardId, DeckId, EntityKind};
use log::debug;
use std::collections::{HashMap, HashSet, VecDeque};

#[derive(Debug, Default)]
pub struct DeckTree {
    decks: HashMap<DeckId, Deck>,
    by_name: HashMap<String, DeckId>,
}

impl DeckTree {
    /// Returns the identifier of `name`, creating it and any missing
    /// ancestors.
    pub fn resolve(&mut self, ids: &mut IdAllocator, name: &str) -> StoreResult<DeckId> {
        self.resolve_with_id(ids, name, None)
    }

    /// Resolves `name`, registering the leaf under `id` when it must be
    /// created. Missing ancestors still get fresh identifiers.
    ///
    /// # Errors
    /// - `IdOccupied` when `id` already belongs to another deck.
    /// - `InvalidData` when `name` already exists under a different id.
    pub(crate) fn restore(
        &mut self,
        ids: &mut IdAllocator,
        name: &str,
        id: DeckId,
    ) -> StoreResult<DeckId> {
        self.resolve_with_id(ids, name, Some(id))
    }

    fn resolve_with_id(
        &mut self,
        ids: &mut IdAllocator,
        name: &str,
        requested: Option<DeckId>,
    ) -> StoreResult<DeckId> {
        if let Some(&existing) = self.by_name.get(name) {
            return match requested {
                Some(id) if id != existing => Err(StoreError::InvalidData(format!(
                    "deck name is already registered under id {existing}, cannot restore it as {id}"
                ))),
                _ => Ok(existing),
            };
        }
        if let Some(id) = requested {
            if self.decks.contains_key(&id) {
                return Err(StoreError::IdOccupied(EntityKind::Deck, id));
            }
        }

        let missing: Vec<String> = ancestor_paths(name)
            .into_iter()
            .filter(|path| !self.by_name.contains_key(path))
            .collect();
        let mut planned: Vec<DeckId> = Vec::with_capacity(missing.len() + 1);
        for _ in 0..missing.len() {
            let id = ids.allocate(EntityKind::Deck, |candidate| {
                self.decks.contains_key(&candidate)
                    || requested == Some(candidate)
                    || planned.contains(&candidate)
            })?;
            planned.push(id);
        }
        let leaf_id = match requested {
            Some(id) => id,
            None => ids.allocate(EntityKind::Deck, |candidate| {
                self.decks.contains_key(&candidate) || planned.contains(&candidate)
            })?,
        };

        let mut planned = planned.into_iter();
        let mut parent = None;
        for path in ancestor_paths(name) {
            let ancestor_id = match self.by_name.get(&path) {
                Some(&id) => id,
                None => match planned.next() {
                    Some(id) => self.insert(id, path, parent),
                    None => {
                        return Err(StoreError::InvalidData(format!(
                            "deck ancestor `{path}` appeared during resolution"
                        )))
                    }
                },
            };
            parent = Some(ancestor_id);
        }
        Ok(self.insert(leaf_id, name.to_string(), parent))
    }

    /// Registers one deck whose id has already been checked free.
    fn insert(&mut self, id: DeckId, name: String, parent: Option<DeckId>) -> DeckId {
        let mut deck = Deck::new(id, name);
        deck.parents.extend(parent);
        debug!(
            "event=deck_create module=store status=ok depth={} has_parent={}",
            deck.depth(),
            parent.is_some()
        );
        self.by_name.insert(deck.name.clone(), id);
        self.decks.insert(id, deck);
        id
    }

    /// Adds a card to a deck's member list. Returns `false` if the deck does
    /// not exist.
    pub(crate) fn attach_card(&mut self, deck_id: DeckId, card_id: CardId) -> bool {
        match self.decks.get_mut(&deck_id) {
            Some(deck) => {
                deck.card_ids.push(card_id);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: DeckId) -> StoreResult<&Deck> {
        self.decks
            .get(&id)
            .ok_or(StoreError::NotFound(EntityKind::Deck, id))
    }

    /// Exact-match lookup by full path.
    pub fn find_by_name(&self, name: &str) -> Option<DeckId> {
        self.by_name.get(name).copied()
    }

    /// Every ancestor of a deck, nearest first, each listed once.
    pub fn ancestors(&self, id: DeckId) -> StoreResult<Vec<DeckId>> {
        let start = self.get(id)?;
        let mut seen = HashSet::from([id]);
        let mut queue: VecDeque<DeckId> = start.parents.iter().copied().collect();
        let mut chain = Vec::new();
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            chain.push(current);
            if let Some(deck) = self.decks.get(&current) {
                queue.extend(deck.parents.iter().copied());
            }
        }
        Ok(chain)
    }

    pub fn len(&self) -> usize {
        self.decks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Deck> {
        self.decks.values()
    }
}

#[cfg(test)]
mod tests {
    use super::DeckTree;
    use crate::ids::IdAllocator;
    use crate::model::EntityKind;
    use crate::store::StoreError;

    #[test]
    fn single_segment_name_has_no_parents() {
        let mut ids = IdAllocator::seeded(1, 16);
        let mut tree = DeckTree::default();
        let id = tree.resolve(&mut ids, "Solo").unwrap();
        assert!(tree.get(id).unwrap().parents.is_empty());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn names_match_exactly() {
        let mut ids = IdAllocator::seeded(2, 16);
        let mut tree = DeckTree::default();
        let lower = tree.resolve(&mut ids, "lang").unwrap();
        let upper = tree.resolve(&mut ids, "Lang").unwrap();
        let padded = tree.resolve(&mut ids, "Lang ").unwrap();
        assert_ne!(lower, upper);
        assert_ne!(upper, padded);
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn sibling_reuses_existing_ancestor() {
        let mut ids = IdAllocator::seeded(3, 16);
        let mut tree = DeckTree::default();
        let spanish = tree.resolve(&mut ids, "Lang::Spanish").unwrap();
        let french = tree.resolve(&mut ids, "Lang::French").unwrap();
        let lang = tree.find_by_name("Lang").unwrap();

        assert_eq!(tree.len(), 3);
        assert_eq!(tree.ancestors(spanish).unwrap(), vec![lang]);
        assert_eq!(tree.ancestors(french).unwrap(), vec![lang]);
    }

    #[test]
    fn restore_keeps_requested_id_and_rejects_occupied_one() {
        let mut ids = IdAllocator::seeded(4, 16);
        let mut tree = DeckTree::default();
        assert_eq!(tree.restore(&mut ids, "Lang", 11).unwrap(), 11);
        assert_eq!(tree.restore(&mut ids, "Lang::Spanish", 12).unwrap(), 12);
        assert_eq!(tree.ancestors(12).unwrap(), vec![11]);

        let err = tree.restore(&mut ids, "Other::Leaf", 11).unwrap_err();
        assert!(matches!(err, StoreError::IdOccupied(_, 11)));
        assert!(tree.find_by_name("Other").is_none());
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn exhausted_allocation_mid_path_creates_nothing() {
        let mut preview = IdAllocator::seeded(9, 1);
        let first = preview.allocate(EntityKind::Deck, |_| false).unwrap();
        let second = preview.allocate(EntityKind::Deck, |_| false).unwrap();
        assert_ne!(first, second);

        let mut tree = DeckTree::default();
        let mut restore_ids = IdAllocator::seeded(1, 1);
        tree.restore(&mut restore_ids, "Blocker", second).unwrap();

        let mut ids = IdAllocator::seeded(9, 1);
        let err = tree.resolve(&mut ids, "A::B::C").unwrap_err();
        assert!(matches!(err, StoreError::AllocationExhausted(_)));
        assert_eq!(tree.len(), 1);
        assert!(tree.find_by_name("A").is_none());
        assert!(tree.find_by_name("A::B").is_none());
    }
}
