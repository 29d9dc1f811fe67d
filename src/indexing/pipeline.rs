//! Reactive indexing: turns storage changes into index jobs.
//!
//! The pipeline is a [`ChangeObserver`]. It only decides which entities are
//! affected by a change and enqueues jobs for them; the task queue does the
//! work. Failures to resolve affected entities are logged and never reach
//! the caller of the mutating storage operation.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};

use crate::error::Result;
use crate::indexing::job::{Exclusion, IndexJob};
use crate::indexing::queue::TaskQueue;
use crate::schema::{
    EntityRef, EntityTypeName, JunctionBinding, JunctionSide, RelatedTarget, Registry,
};
use crate::storage::{ChangeEvent, ChangeKind, ChangeObserver, EntityStore, LinkAction};

/// Maps storage changes to index jobs.
pub struct IndexingPipeline {
    registry: Arc<Registry>,
    store: Arc<dyn EntityStore>,
    queue: Arc<dyn TaskQueue>,
    watchers: AHashMap<EntityTypeName, Vec<RelatedTarget>>,
    bindings: AHashMap<String, Vec<JunctionBinding>>,
}

impl std::fmt::Debug for IndexingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexingPipeline")
            .field("watched_models", &self.watchers.len())
            .field("junctions", &self.bindings.len())
            .finish()
    }
}

impl IndexingPipeline {
    /// Create a pipeline, precomputing which models and junctions affect
    /// registered entity types.
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn EntityStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Result<Self> {
        let mut watchers: AHashMap<EntityTypeName, Vec<RelatedTarget>> = AHashMap::new();
        for target in registry.related_targets()? {
            watchers.entry(target.related.clone()).or_default().push(target);
        }
        let mut bindings: AHashMap<String, Vec<JunctionBinding>> = AHashMap::new();
        for binding in registry.junction_bindings()? {
            bindings.entry(binding.junction.clone()).or_default().push(binding);
        }

        Ok(IndexingPipeline {
            registry,
            store,
            queue,
            watchers,
            bindings,
        })
    }

    /// Models whose changes trigger re-indexing of some other entity type.
    pub fn watched_models(&self) -> impl Iterator<Item = &EntityTypeName> {
        self.watchers.keys()
    }

    /// Enqueue the jobs caused by a created, updated or deleted entity.
    ///
    /// A registered entity gets an index job, or a deindex job when deleted.
    /// Entities reaching it through a related field are re-indexed too; when
    /// the change is a delete they skip the deleted instance.
    pub fn reindex_on_change(&self, entity: &EntityRef, kind: ChangeKind) {
        if self.registry.lookup(&entity.entity_type).is_some() {
            let job = match kind {
                ChangeKind::Deleted => IndexJob::deindex(entity.clone()),
                ChangeKind::Created | ChangeKind::Updated => IndexJob::index(entity.clone()),
            };
            self.queue.enqueue(job);
        }

        let Some(targets) = self.watchers.get(&entity.entity_type) else {
            return;
        };
        let mut enqueued = AHashSet::new();
        for target in targets {
            let owners = match self.store.resolve_relationship(entity, &target.reverse_path) {
                Ok(owners) => owners,
                Err(err) => {
                    log::error!(
                        "cannot resolve owners of {entity} for '{}.{}': {err}",
                        target.owner,
                        target.field
                    );
                    continue;
                }
            };
            for owner in owners {
                if owner == *entity || !enqueued.insert(owner.clone()) {
                    continue;
                }
                let job = match kind {
                    ChangeKind::Deleted => IndexJob::index_excluding(
                        owner,
                        Exclusion::Instance {
                            entity: entity.clone(),
                        },
                    ),
                    ChangeKind::Created | ChangeKind::Updated => IndexJob::index(owner),
                };
                self.queue.enqueue(job);
            }
        }
    }

    /// Enqueue the jobs caused by pairs added to or removed from a junction.
    ///
    /// `side` is the junction side of the accessor `anchor` was changed
    /// through. Both the anchor and every linked instance are resolved to
    /// their owners. Jobs for removals skip the removed pairs.
    pub fn reindex_on_link_change(
        &self,
        junction: &str,
        action: LinkAction,
        side: JunctionSide,
        anchor: &EntityRef,
        linked: &[EntityRef],
    ) {
        let Some(bindings) = self.bindings.get(junction) else {
            return;
        };

        let mut enqueued = AHashSet::new();
        for binding in bindings {
            let anchor_is_left = side == JunctionSide::Left;
            let (anchor_path, linked_path) = if anchor_is_left {
                (&binding.left_to_owner, &binding.right_to_owner)
            } else {
                (&binding.right_to_owner, &binding.left_to_owner)
            };

            let exclusion = match action {
                LinkAction::Added => None,
                LinkAction::Removed => Some(Exclusion::Links {
                    junction: junction.to_string(),
                    pairs: linked
                        .iter()
                        .map(|other| {
                            if anchor_is_left {
                                (anchor.id, other.id)
                            } else {
                                (other.id, anchor.id)
                            }
                        })
                        .collect(),
                }),
            };

            let mut owners = Vec::new();
            match self.store.resolve_relationship(anchor, anchor_path) {
                Ok(found) => owners.extend(found),
                Err(err) => log::error!("cannot resolve owners of {anchor} via '{junction}': {err}"),
            }
            for other in linked {
                match self.store.resolve_relationship(other, linked_path) {
                    Ok(found) => owners.extend(found),
                    Err(err) => log::error!("cannot resolve owners of {other} via '{junction}': {err}"),
                }
            }

            for owner in owners {
                if owner.entity_type != binding.owner || !enqueued.insert(owner.clone()) {
                    continue;
                }
                let job = match &exclusion {
                    Some(exclusion) => IndexJob::index_excluding(owner, exclusion.clone()),
                    None => IndexJob::index(owner),
                };
                self.queue.enqueue(job);
            }
        }
    }
}

impl ChangeObserver for IndexingPipeline {
    fn on_entity_changed(&self, event: &ChangeEvent) {
        log::debug!("change event: {event:?}");
        match event {
            ChangeEvent::Entity { entity, kind } => self.reindex_on_change(entity, *kind),
            ChangeEvent::Link {
                junction,
                action,
                side,
                anchor,
                linked,
            } => self.reindex_on_link_change(junction, *action, *side, anchor, linked),
        }
    }
}
