//! Ordered, unique-keyed, persistent entity collection.
//!
//! `EntitySet<T>` is the container behind every node and tree collection.
//! It is a thin wrapper over `im::OrdMap<Id, Arc<T>>`: every "mutating"
//! operation returns a new set in O(log n), and entries that the operation
//! did not touch keep pointing at the same `Arc` as before. Renderers rely
//! on that pointer identity to skip unchanged subtrees, so it is part of the
//! contract (see `shares_entry`).

use crate::error::{CoreError, CoreResult};
use im::OrdMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::hash::Hash;
use std::ops::Index;
use std::sync::Arc;

/// Something that can live in an `EntitySet`.
pub trait Entity: Clone {
    type Id: Copy + Ord + Hash + fmt::Debug + fmt::Display;

    fn id(&self) -> Self::Id;

    /// The lookup error reported when `id` is absent.
    fn not_found(id: Self::Id) -> CoreError;
}

pub struct EntitySet<T: Entity> {
    entries: OrdMap<T::Id, Arc<T>>,
}

impl<T: Entity> EntitySet<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: OrdMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: T::Id) -> Option<&T> {
        self.entries.get(&id).map(|e| &**e)
    }

    /// Look up an entity, reporting an absent id as `NoSuchNode`/`NoSuchTree`.
    pub fn try_get(&self, id: T::Id) -> CoreResult<&T> {
        self.get(id).ok_or_else(|| T::not_found(id))
    }

    pub fn contains(&self, id: T::Id) -> bool {
        self.entries.contains_key(&id)
    }

    /// Entities in id order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.entries.values().map(|e| &**e)
    }

    pub fn ids(&self) -> impl Iterator<Item = T::Id> + '_ {
        self.entries.keys().copied()
    }

    /// Insert `entity`, replacing any entry with the same id.
    #[must_use]
    pub fn insert(&self, entity: T) -> Self {
        Self {
            entries: self.entries.update(entity.id(), Arc::new(entity)),
        }
    }

    #[must_use]
    pub fn remove(&self, id: T::Id) -> Self {
        Self {
            entries: self.entries.without(&id),
        }
    }

    #[must_use]
    pub fn remove_all<'a>(&self, ids: impl IntoIterator<Item = &'a T::Id>) -> Self
    where
        T::Id: 'a,
    {
        let mut entries = self.entries.clone();
        for id in ids {
            entries.remove(id);
        }
        Self { entries }
    }

    /// Replace the entity `id` with `f(entity)`. Absent ids leave the set as is.
    #[must_use]
    pub fn transform(&self, id: T::Id, f: impl FnOnce(&T) -> T) -> Self {
        match self.entries.get(&id) {
            Some(current) => self.insert(f(&**current)),
            None => self.clone(),
        }
    }

    /// Apply `f` to every listed id that is present. Duplicates are applied once.
    #[must_use]
    pub fn transform_all<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a T::Id>,
        mut f: impl FnMut(&T) -> T,
    ) -> Self
    where
        T::Id: 'a,
    {
        let mut entries = self.entries.clone();
        let mut seen = std::collections::BTreeSet::new();
        for id in ids {
            if !seen.insert(*id) {
                continue;
            }
            if let Some(current) = self.entries.get(id) {
                let next = f(&**current);
                entries.insert(next.id(), Arc::new(next));
            }
        }
        Self { entries }
    }

    /// Bulk transform: `f` returns `Some(replacement)` for the entries it
    /// changes and `None` for the ones it leaves alone.
    #[must_use]
    pub fn update_where(&self, mut f: impl FnMut(&T) -> Option<T>) -> Self {
        let mut entries = self.entries.clone();
        for current in self.entries.values() {
            if let Some(next) = f(&**current) {
                entries.insert(next.id(), Arc::new(next));
            }
        }
        Self { entries }
    }

    /// Keep only the entities matching `keep`.
    #[must_use]
    pub fn filter(&self, mut keep: impl FnMut(&T) -> bool) -> Self {
        let mut entries = OrdMap::new();
        for (id, entity) in self.entries.iter() {
            if keep(&**entity) {
                entries.insert(*id, Arc::clone(entity));
            }
        }
        Self { entries }
    }

    /// The entries for `ids`, sharing the same allocations as `self`.
    #[must_use]
    pub fn subset<'a>(&self, ids: impl IntoIterator<Item = &'a T::Id>) -> Self
    where
        T::Id: 'a,
    {
        Self {
            entries: ids
                .into_iter()
                .filter_map(|id| self.entries.get(id).map(|e| (*id, Arc::clone(e))))
                .collect(),
        }
    }

    /// True when both sets hold the very same allocation for `id`.
    pub fn shares_entry(&self, other: &Self, id: T::Id) -> bool {
        match (self.entries.get(&id), other.entries.get(&id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl<T: Entity> Clone for EntitySet<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T: Entity> Default for EntitySet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Entity + PartialEq> PartialEq for EntitySet<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .entries
                .iter()
                .zip(other.entries.iter())
                .all(|((ka, a), (kb, b))| ka == kb && (Arc::ptr_eq(a, b) || a == b))
    }
}

impl<T: Entity + fmt::Debug> fmt::Debug for EntitySet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl<T: Entity> FromIterator<T> for EntitySet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|e| (e.id(), Arc::new(e))).collect(),
        }
    }
}

impl<T: Entity> Index<T::Id> for EntitySet<T> {
    type Output = T;

    /// Panics when `id` is absent. Use `get`/`try_get` for ids that may be missing.
    fn index(&self, id: T::Id) -> &T {
        match self.get(id) {
            Some(entity) => entity,
            None => panic!("{}", T::not_found(id)),
        }
    }
}

impl<T: Entity + Serialize> Serialize for EntitySet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de, T: Entity + Deserialize<'de>> Deserialize<'de> for EntitySet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<T>::deserialize(deserializer)?;
        let expected = items.len();
        let set: Self = items.into_iter().collect();
        if set.len() != expected {
            return Err(D::Error::custom("duplicate entity id in collection"));
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        id: NodeId,
        value: u32,
    }

    impl Entity for Item {
        type Id = NodeId;

        fn id(&self) -> NodeId {
            self.id
        }

        fn not_found(id: NodeId) -> CoreError {
            CoreError::NoSuchNode(id)
        }
    }

    fn item(id: &str, value: u32) -> Item {
        Item {
            id: NodeId::intern(id),
            value,
        }
    }

    fn sample() -> EntitySet<Item> {
        [item("a", 1), item("b", 2), item("c", 3)]
            .into_iter()
            .collect()
    }

    #[test]
    fn lookup_reports_absent_ids() {
        let set = sample();
        assert_eq!(set.get(NodeId::intern("b")).map(|i| i.value), Some(2));
        assert!(set.get(NodeId::intern("zzz")).is_none());
        assert_eq!(
            set.try_get(NodeId::intern("zzz")),
            Err(CoreError::NoSuchNode(NodeId::intern("zzz")))
        );
    }

    #[test]
    #[should_panic(expected = "no such node")]
    fn index_panics_on_absent_id() {
        let _ = &sample()[NodeId::intern("missing_entity")];
    }

    #[test]
    fn insert_replaces_and_keeps_old_value_valid() {
        let before = sample();
        let after = before.insert(item("b", 20));
        assert_eq!(before[NodeId::intern("b")].value, 2);
        assert_eq!(after[NodeId::intern("b")].value, 20);
        assert_eq!(after.len(), 3);
    }

    #[test]
    fn transform_shares_untouched_entries() {
        let before = sample();
        let after = before.transform(NodeId::intern("a"), |i| Item {
            value: i.value + 100,
            ..i.clone()
        });
        assert_eq!(after[NodeId::intern("a")].value, 101);
        assert!(!before.shares_entry(&after, NodeId::intern("a")));
        assert!(before.shares_entry(&after, NodeId::intern("b")));
        assert!(before.shares_entry(&after, NodeId::intern("c")));
    }

    #[test]
    fn transform_of_absent_id_is_noop() {
        let before = sample();
        let after = before.transform(NodeId::intern("nope"), |i| i.clone());
        assert_eq!(before, after);
    }

    #[test]
    fn remove_all_and_filter() {
        let set = sample();
        let ids = [NodeId::intern("a"), NodeId::intern("c")];
        let removed = set.remove_all(&ids);
        assert_eq!(removed.ids().collect::<Vec<_>>(), vec![NodeId::intern("b")]);
        let odd = set.filter(|i| i.value % 2 == 1);
        assert_eq!(odd.len(), 2);
        assert!(set.shares_entry(&odd, NodeId::intern("a")));
    }

    #[test]
    fn iteration_is_ordered_by_id() {
        let set: EntitySet<Item> = [item("c", 3), item("a", 1), item("b", 2)]
            .into_iter()
            .collect();
        let ids: Vec<&str> = set.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }
}
