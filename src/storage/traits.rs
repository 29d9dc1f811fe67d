//! Storage abstraction trait.

use ahash::AHashSet;

use crate::error::Result;
use crate::schema::{EntityId, EntityRef, EntityTypeName, FieldValue};

/// The entity storage layer, seen from the search subsystem.
///
/// The store owns the records; search only reads attributes and walks
/// relationships. Implementations must be usable from indexing worker threads.
pub trait EntityStore: Send + Sync + std::fmt::Debug {
    /// Identifiers of every stored entity of a type, in ascending order.
    fn ids(&self, entity_type: &EntityTypeName) -> Result<Vec<EntityId>>;

    /// Check whether an entity exists.
    fn contains(&self, entity: &EntityRef) -> Result<bool>;

    /// Read one attribute. `None` when the entity does not exist.
    fn attribute(&self, entity: &EntityRef, attribute: &str) -> Result<Option<FieldValue>>;

    /// Follow one relation from an entity.
    fn related(&self, entity: &EntityRef, relation: &str) -> Result<Vec<EntityRef>>;

    /// Follow a path of relations from an entity, hop by hop.
    ///
    /// The result is de-duplicated and keeps first-seen order. An empty path
    /// resolves to the entity itself.
    fn resolve_relationship(&self, entity: &EntityRef, path: &[String]) -> Result<Vec<EntityRef>> {
        let mut frontier = vec![entity.clone()];
        for hop in path {
            let mut seen = AHashSet::new();
            let mut next = Vec::new();
            for current in &frontier {
                for reached in self.related(current, hop)? {
                    if seen.insert(reached.clone()) {
                        next.push(reached);
                    }
                }
            }
            if next.is_empty() {
                return Ok(next);
            }
            frontier = next;
        }
        Ok(frontier)
    }
}
