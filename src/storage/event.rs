//! Change notifications emitted by the storage layer.

use serde::{Deserialize, Serialize};

use crate::schema::{EntityRef, JunctionSide};

/// What happened to a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    /// Sent before the entity is removed, while it can still be traversed.
    Deleted,
}

/// What happened to a many-to-many link set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkAction {
    Added,
    /// Sent before the pairs are removed.
    Removed,
}

/// A change in the storage layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// An entity was created, updated or is about to be deleted.
    Entity { entity: EntityRef, kind: ChangeKind },
    /// Pairs were added to or are about to be removed from a junction.
    ///
    /// `anchor` is the instance whose accessor was used and `side` the
    /// junction side that accessor lives on. `linked` are the instances on
    /// the other side.
    Link {
        junction: String,
        action: LinkAction,
        side: JunctionSide,
        anchor: EntityRef,
        linked: Vec<EntityRef>,
    },
}

/// Receives change notifications from the storage layer.
///
/// Observers are called synchronously from the mutating call and must return
/// quickly; heavy work belongs on a task queue.
pub trait ChangeObserver: Send + Sync {
    fn on_entity_changed(&self, event: &ChangeEvent);
}
