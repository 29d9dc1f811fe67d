//! Ordered result sets and their set algebra.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::schema::EntityId;

/// An ordered, duplicate-free list of entity identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultSet {
    ids: Vec<EntityId>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from identifiers, keeping the first occurrence of each.
    pub fn from_ids<I: IntoIterator<Item = EntityId>>(ids: I) -> Self {
        let mut seen = AHashSet::new();
        ResultSet {
            ids: ids.into_iter().filter(|id| seen.insert(*id)).collect(),
        }
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn into_ids(self) -> Vec<EntityId> {
        self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.ids.contains(&id)
    }

    /// Identifiers present in both sets, in the order of `self`.
    pub fn intersect(&self, other: &ResultSet) -> ResultSet {
        let other: AHashSet<EntityId> = other.ids.iter().copied().collect();
        ResultSet {
            ids: self.ids.iter().copied().filter(|id| other.contains(id)).collect(),
        }
    }

    /// Identifiers of `self` followed by the unseen ones of `other`.
    pub fn union(&self, other: &ResultSet) -> ResultSet {
        ResultSet::from_ids(self.ids.iter().chain(other.ids.iter()).copied())
    }

    /// Keep only the identifiers accepted by `keep`.
    pub fn retain<F: FnMut(EntityId) -> bool>(&mut self, mut keep: F) {
        self.ids.retain(|id| keep(*id));
    }

    /// Drop everything past the first `max` identifiers.
    pub fn truncate(&mut self, max: usize) {
        self.ids.truncate(max);
    }
}

impl FromIterator<EntityId> for ResultSet {
    fn from_iter<I: IntoIterator<Item = EntityId>>(iter: I) -> Self {
        ResultSet::from_ids(iter)
    }
}

impl IntoIterator for ResultSet {
    type Item = EntityId;
    type IntoIter = std::vec::IntoIter<EntityId>;

    fn into_iter(self) -> Self::IntoIter {
        self.ids.into_iter()
    }
}
