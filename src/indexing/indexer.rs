//! Builds indexed documents from stored entities.

use std::sync::Arc;

use ahash::AHashSet;
use rayon::prelude::*;

use crate::error::{Result, ScopeSearchError};
use crate::indexing::job::{Exclusion, IndexJob};
use crate::schema::{EntityRef, EntityType, EntityTypeName, FieldDescriptor, JunctionSide, Registry};
use crate::search::{IndexedDocument, SearchBackend};
use crate::storage::EntityStore;

/// Applies index jobs by reading entities from the store and writing
/// documents to the backend.
#[derive(Debug, Clone)]
pub struct Indexer {
    registry: Arc<Registry>,
    store: Arc<dyn EntityStore>,
    backend: Arc<dyn SearchBackend>,
}

impl Indexer {
    pub fn new(
        registry: Arc<Registry>,
        store: Arc<dyn EntityStore>,
        backend: Arc<dyn SearchBackend>,
    ) -> Self {
        Indexer {
            registry,
            store,
            backend,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Flatten one entity into its indexed document.
    ///
    /// Returns `None` when the entity no longer exists. Related fields
    /// collect the values of every instance reached through the path,
    /// skipping whatever `exclude` names.
    pub fn build_document(
        &self,
        entity_type: &EntityType,
        entity: &EntityRef,
        exclude: Option<&Exclusion>,
    ) -> Result<Option<IndexedDocument>> {
        if !self.store.contains(entity)? {
            return Ok(None);
        }

        let mut document = IndexedDocument::new(entity.clone());
        for field in entity_type.fields() {
            let values = self.field_values(entity_type.name(), field, entity, exclude)?;
            document.extend(field.name(), values);
        }
        Ok(Some(document))
    }

    fn field_values(
        &self,
        owner: &EntityTypeName,
        field: &FieldDescriptor,
        entity: &EntityRef,
        exclude: Option<&Exclusion>,
    ) -> Result<Vec<String>> {
        let catalog = self.registry.catalog();
        let mut frontier = vec![entity.clone()];
        let mut current = owner.clone();

        for hop in field.path().relations() {
            let relation = catalog.relation(&current, hop).ok_or_else(|| {
                ScopeSearchError::index(format!(
                    "Field '{}' of '{owner}': '{current}' has no relation '{hop}'",
                    field.name()
                ))
            })?;
            let junction = relation.junction();

            let mut seen = AHashSet::new();
            let mut next = Vec::new();
            for source in &frontier {
                for reached in self.store.related(source, hop)? {
                    if let Some(exclusion) = exclude {
                        if exclusion.excludes_instance(&reached) {
                            continue;
                        }
                        if let Some((name, side)) = junction {
                            let (left, right) = match side {
                                JunctionSide::Left => (source.id, reached.id),
                                JunctionSide::Right => (reached.id, source.id),
                            };
                            if exclusion.excludes_pair(name, left, right) {
                                continue;
                            }
                        }
                    }
                    if seen.insert(reached.clone()) {
                        next.push(reached);
                    }
                }
            }
            frontier = next;
            current = relation.target.clone();
            if frontier.is_empty() {
                return Ok(Vec::new());
            }
        }

        let mut values = Vec::new();
        for reached in &frontier {
            let Some(value) = self.store.attribute(reached, field.path().attribute())? else {
                continue;
            };
            if value.is_null() {
                continue;
            }
            match field.value_transform() {
                Some(transform) => values.push(transform.apply(&value)),
                None => values.extend(value.index_strings()),
            }
        }
        Ok(values)
    }

    /// Apply one job to the backend.
    pub fn apply(&self, job: &IndexJob) -> Result<()> {
        match job {
            IndexJob::Index { entity, exclude } => {
                let Some(entity_type) = self.registry.lookup(&entity.entity_type) else {
                    log::debug!("skipping {job}: '{}' is not registered", entity.entity_type);
                    return Ok(());
                };
                match self.build_document(entity_type, entity, exclude.as_ref())? {
                    Some(document) => self.backend.index_document(document),
                    None => self.backend.deindex_document(entity),
                }
            }
            IndexJob::Deindex { entity } => self.backend.deindex_document(entity),
        }
    }

    /// Re-index every stored entity of a registered type.
    ///
    /// Documents are built in parallel. Returns the number indexed.
    pub fn rebuild(&self, entity_type: &EntityTypeName) -> Result<usize> {
        let entity_type = Arc::clone(self.registry.get(entity_type)?);
        let ids = self.store.ids(entity_type.name())?;

        let documents: Vec<Option<IndexedDocument>> = ids
            .par_iter()
            .map(|&id| {
                let entity = EntityRef::new(entity_type.name().clone(), id);
                self.build_document(&entity_type, &entity, None)
            })
            .collect::<Result<_>>()?;

        self.backend.clear(entity_type.name())?;
        let mut count = 0;
        for document in documents.into_iter().flatten() {
            self.backend.index_document(document)?;
            count += 1;
        }
        log::info!("rebuilt {count} documents of '{}'", entity_type.name());
        Ok(count)
    }

    /// Re-index every registered entity type.
    pub fn rebuild_all(&self) -> Result<usize> {
        let names: Vec<EntityTypeName> = self
            .registry
            .entity_types()
            .map(|entity_type| entity_type.name().clone())
            .collect();
        let mut total = 0;
        for name in names {
            total += self.rebuild(&name)?;
        }
        Ok(total)
    }
}
