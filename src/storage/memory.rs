//! In-memory entity store.
//!
//! This is the reference storage layer used by tests and the CLI. It keeps
//! records per model, foreign keys on the owning record and many-to-many
//! pairs per junction, and notifies [`ChangeObserver`]s of every change.
//! Observers run after creates, updates and link additions, and before
//! deletes and link removals, so a removed row can still be traversed while
//! its change is being handled. No lock is held while observers run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use parking_lot::RwLock;

use crate::error::{Result, ScopeSearchError};
use crate::schema::{
    EntityId, EntityRef, EntityTypeName, FieldValue, JunctionSide, ModelCatalog, RelationKind,
};
use crate::storage::event::{ChangeEvent, ChangeKind, ChangeObserver, LinkAction};
use crate::storage::traits::EntityStore;

#[derive(Debug, Clone, Default)]
struct Record {
    attributes: AHashMap<String, FieldValue>,
    foreign_keys: AHashMap<String, EntityId>,
}

type Records = AHashMap<EntityTypeName, BTreeMap<EntityId, Record>>;
type Links = AHashMap<String, BTreeSet<(EntityId, EntityId)>>;

/// An in-memory relational store.
pub struct MemoryStore {
    catalog: Arc<ModelCatalog>,
    records: RwLock<Records>,
    links: RwLock<Links>,
    next_id: AtomicU64,
    observers: RwLock<Vec<Arc<dyn ChangeObserver>>>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("models", &self.records.read().len())
            .field("junctions", &self.links.read().len())
            .field("observers", &self.observers.read().len())
            .finish()
    }
}

impl MemoryStore {
    /// Create an empty store for the models of a catalog.
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        MemoryStore {
            catalog,
            records: RwLock::new(AHashMap::new()),
            links: RwLock::new(AHashMap::new()),
            next_id: AtomicU64::new(1),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// The catalog describing stored models.
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Register an observer for change notifications.
    pub fn subscribe(&self, observer: Arc<dyn ChangeObserver>) {
        self.observers.write().push(observer);
    }

    /// Number of stored entities of a type.
    pub fn count(&self, entity_type: &EntityTypeName) -> usize {
        self.records
            .read()
            .get(entity_type)
            .map_or(0, BTreeMap::len)
    }

    /// Create an entity and notify observers.
    pub fn insert<I, S>(&self, entity_type: &EntityTypeName, attributes: I) -> Result<EntityRef>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        let attributes = self.check_attributes(entity_type, attributes)?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.records
            .write()
            .entry(entity_type.clone())
            .or_default()
            .insert(
                id,
                Record {
                    attributes,
                    foreign_keys: AHashMap::new(),
                },
            );

        let entity = EntityRef::new(entity_type.clone(), id);
        self.notify(&ChangeEvent::Entity {
            entity: entity.clone(),
            kind: ChangeKind::Created,
        });
        Ok(entity)
    }

    /// Overwrite attributes of an entity and notify observers.
    pub fn update<I, S>(&self, entity: &EntityRef, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        let attributes = self.check_attributes(&entity.entity_type, attributes)?;
        {
            let mut records = self.records.write();
            let record = record_mut(&mut records, entity)?;
            record.attributes.extend(attributes);
        }

        self.notify(&ChangeEvent::Entity {
            entity: entity.clone(),
            kind: ChangeKind::Updated,
        });
        Ok(())
    }

    /// Point a foreign key at `target`, or clear it.
    pub fn set_foreign_key(
        &self,
        entity: &EntityRef,
        relation: &str,
        target: Option<EntityId>,
    ) -> Result<()> {
        let definition = self
            .catalog
            .relation(&entity.entity_type, relation)
            .ok_or_else(|| {
                ScopeSearchError::storage(format!(
                    "'{}' has no relation '{relation}'",
                    entity.entity_type
                ))
            })?;
        if definition.kind != RelationKind::ForeignKey {
            return Err(ScopeSearchError::storage(format!(
                "Relation '{relation}' of '{}' is not a foreign key",
                entity.entity_type
            )));
        }
        if let Some(target_id) = target {
            let target_ref = EntityRef::new(definition.target.clone(), target_id);
            if !self.contains(&target_ref)? {
                return Err(ScopeSearchError::storage(format!(
                    "Foreign key target {target_ref} does not exist"
                )));
            }
        }

        {
            let mut records = self.records.write();
            let record = record_mut(&mut records, entity)?;
            match target {
                Some(target_id) => {
                    record.foreign_keys.insert(relation.to_string(), target_id);
                }
                None => {
                    record.foreign_keys.remove(relation);
                }
            }
        }

        self.notify(&ChangeEvent::Entity {
            entity: entity.clone(),
            kind: ChangeKind::Updated,
        });
        Ok(())
    }

    /// Delete an entity.
    ///
    /// Observers are notified first. Links involving the entity are dropped
    /// and foreign keys pointing at it are cleared without further events.
    pub fn delete(&self, entity: &EntityRef) -> Result<()> {
        if !self.contains(entity)? {
            return Err(ScopeSearchError::not_found(entity.to_string()));
        }

        self.notify(&ChangeEvent::Entity {
            entity: entity.clone(),
            kind: ChangeKind::Deleted,
        });

        let model = self.catalog.model(&entity.entity_type).cloned();
        {
            let mut records = self.records.write();
            if let Some(table) = records.get_mut(&entity.entity_type) {
                table.remove(&entity.id);
            }
            if let Some(model) = &model {
                for relation in model.relations.values() {
                    if let RelationKind::ReverseForeignKey { field } = &relation.kind
                        && let Some(table) = records.get_mut(&relation.target)
                    {
                        for record in table.values_mut() {
                            if record.foreign_keys.get(field) == Some(&entity.id) {
                                record.foreign_keys.remove(field);
                            }
                        }
                    }
                }
            }
        }
        {
            let mut links = self.links.write();
            for junction in self.catalog.junctions() {
                let Some(pairs) = links.get_mut(&junction.name) else {
                    continue;
                };
                if junction.left == entity.entity_type {
                    pairs.retain(|(left, _)| *left != entity.id);
                }
                if junction.right == entity.entity_type {
                    pairs.retain(|(_, right)| *right != entity.id);
                }
            }
        }
        Ok(())
    }

    /// Link an entity to targets through a many-to-many relation.
    ///
    /// Pairs that already exist are ignored; observers only see new pairs.
    pub fn link(&self, entity: &EntityRef, relation: &str, targets: &[EntityId]) -> Result<()> {
        let (junction, side, target_type) = self.junction_of(entity, relation)?;
        if !self.contains(entity)? {
            return Err(ScopeSearchError::not_found(entity.to_string()));
        }
        for &target in targets {
            let target_ref = EntityRef::new(target_type.clone(), target);
            if !self.contains(&target_ref)? {
                return Err(ScopeSearchError::storage(format!(
                    "Link target {target_ref} does not exist"
                )));
            }
        }

        let mut added = Vec::new();
        {
            let mut links = self.links.write();
            let pairs = links.entry(junction.clone()).or_default();
            for &target in targets {
                if pairs.insert(orient(side, entity.id, target)) {
                    added.push(EntityRef::new(target_type.clone(), target));
                }
            }
        }

        if !added.is_empty() {
            self.notify(&ChangeEvent::Link {
                junction,
                action: LinkAction::Added,
                side,
                anchor: entity.clone(),
                linked: added,
            });
        }
        Ok(())
    }

    /// Remove links between an entity and targets.
    ///
    /// Observers are notified before the pairs disappear. Missing pairs are
    /// ignored.
    pub fn unlink(&self, entity: &EntityRef, relation: &str, targets: &[EntityId]) -> Result<()> {
        let (junction, side, target_type) = self.junction_of(entity, relation)?;

        let existing: Vec<EntityId> = {
            let links = self.links.read();
            match links.get(&junction) {
                Some(pairs) => targets
                    .iter()
                    .copied()
                    .filter(|&target| pairs.contains(&orient(side, entity.id, target)))
                    .collect(),
                None => Vec::new(),
            }
        };
        if existing.is_empty() {
            return Ok(());
        }

        self.notify(&ChangeEvent::Link {
            junction: junction.clone(),
            action: LinkAction::Removed,
            side,
            anchor: entity.clone(),
            linked: existing
                .iter()
                .map(|&id| EntityRef::new(target_type.clone(), id))
                .collect(),
        });

        let mut links = self.links.write();
        if let Some(pairs) = links.get_mut(&junction) {
            for target in existing {
                pairs.remove(&orient(side, entity.id, target));
            }
        }
        Ok(())
    }

    fn junction_of(
        &self,
        entity: &EntityRef,
        relation: &str,
    ) -> Result<(String, JunctionSide, EntityTypeName)> {
        let definition = self
            .catalog
            .relation(&entity.entity_type, relation)
            .ok_or_else(|| {
                ScopeSearchError::storage(format!(
                    "'{}' has no relation '{relation}'",
                    entity.entity_type
                ))
            })?;
        match definition.junction() {
            Some((junction, side)) => Ok((junction.to_string(), side, definition.target.clone())),
            None => Err(ScopeSearchError::storage(format!(
                "Relation '{relation}' of '{}' is not many-to-many",
                entity.entity_type
            ))),
        }
    }

    fn check_attributes<I, S>(
        &self,
        entity_type: &EntityTypeName,
        attributes: I,
    ) -> Result<AHashMap<String, FieldValue>>
    where
        I: IntoIterator<Item = (S, FieldValue)>,
        S: Into<String>,
    {
        let model = self
            .catalog
            .model(entity_type)
            .ok_or_else(|| ScopeSearchError::storage(format!("Unknown model '{entity_type}'")))?;

        let mut checked = AHashMap::new();
        for (name, value) in attributes {
            let name = name.into();
            if !model.attributes.contains_key(&name) {
                return Err(ScopeSearchError::storage(format!(
                    "Model '{entity_type}' has no attribute '{name}'"
                )));
            }
            checked.insert(name, value);
        }
        Ok(checked)
    }

    fn notify(&self, event: &ChangeEvent) {
        let observers: Vec<Arc<dyn ChangeObserver>> = self.observers.read().clone();
        for observer in observers {
            observer.on_entity_changed(event);
        }
    }
}

impl EntityStore for MemoryStore {
    fn ids(&self, entity_type: &EntityTypeName) -> Result<Vec<EntityId>> {
        Ok(self
            .records
            .read()
            .get(entity_type)
            .map(|table| table.keys().copied().collect())
            .unwrap_or_default())
    }

    fn contains(&self, entity: &EntityRef) -> Result<bool> {
        Ok(self
            .records
            .read()
            .get(&entity.entity_type)
            .is_some_and(|table| table.contains_key(&entity.id)))
    }

    fn attribute(&self, entity: &EntityRef, attribute: &str) -> Result<Option<FieldValue>> {
        let records = self.records.read();
        let Some(record) = records
            .get(&entity.entity_type)
            .and_then(|table| table.get(&entity.id))
        else {
            return Ok(None);
        };
        Ok(Some(
            record
                .attributes
                .get(attribute)
                .cloned()
                .unwrap_or(FieldValue::Null),
        ))
    }

    fn related(&self, entity: &EntityRef, relation: &str) -> Result<Vec<EntityRef>> {
        let definition = self
            .catalog
            .relation(&entity.entity_type, relation)
            .ok_or_else(|| {
                ScopeSearchError::storage(format!(
                    "'{}' has no relation '{relation}'",
                    entity.entity_type
                ))
            })?;
        let target_type = definition.target.clone();

        let ids: Vec<EntityId> = match &definition.kind {
            RelationKind::ForeignKey => {
                let records = self.records.read();
                records
                    .get(&entity.entity_type)
                    .and_then(|table| table.get(&entity.id))
                    .and_then(|record| record.foreign_keys.get(relation).copied())
                    .into_iter()
                    .collect()
            }
            RelationKind::ReverseForeignKey { field } => {
                let records = self.records.read();
                records
                    .get(&target_type)
                    .map(|table| {
                        table
                            .iter()
                            .filter(|(_, record)| record.foreign_keys.get(field) == Some(&entity.id))
                            .map(|(id, _)| *id)
                            .collect()
                    })
                    .unwrap_or_default()
            }
            RelationKind::ManyToMany { junction, side } => {
                let links = self.links.read();
                links
                    .get(junction)
                    .map(|pairs| {
                        pairs
                            .iter()
                            .filter_map(|&(left, right)| match side {
                                JunctionSide::Left if left == entity.id => Some(right),
                                JunctionSide::Right if right == entity.id => Some(left),
                                _ => None,
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            }
        };

        Ok(ids
            .into_iter()
            .map(|id| EntityRef::new(target_type.clone(), id))
            .collect())
    }
}

fn record_mut<'a>(records: &'a mut Records, entity: &EntityRef) -> Result<&'a mut Record> {
    records
        .get_mut(&entity.entity_type)
        .and_then(|table| table.get_mut(&entity.id))
        .ok_or_else(|| ScopeSearchError::not_found(entity.to_string()))
}

/// Order a pair as `(left, right)` for storage in a junction.
fn orient(side: JunctionSide, anchor: EntityId, other: EntityId) -> (EntityId, EntityId) {
    match side {
        JunctionSide::Left => (anchor, other),
        JunctionSide::Right => (other, anchor),
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::schema::ValueKind;

    fn name(s: &str) -> EntityTypeName {
        EntityTypeName::parse(s).unwrap()
    }

    fn store() -> MemoryStore {
        let mut catalog = ModelCatalog::new();
        catalog
            .define_model(&name("documents.document"), [("title", ValueKind::Text)])
            .unwrap();
        catalog
            .define_model(&name("tags.tag"), [("name", ValueKind::Text)])
            .unwrap();
        catalog
            .define_model(&name("cabinets.cabinet"), [("label", ValueKind::Text)])
            .unwrap();
        catalog
            .many_to_many(&name("documents.document"), "tags", &name("tags.tag"), "documents")
            .unwrap();
        catalog
            .foreign_key(
                &name("documents.document"),
                "cabinet",
                &name("cabinets.cabinet"),
                "documents",
            )
            .unwrap();
        MemoryStore::new(Arc::new(catalog))
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ChangeEvent>>,
    }

    impl ChangeObserver for Recorder {
        fn on_entity_changed(&self, event: &ChangeEvent) {
            self.events.lock().push(event.clone());
        }
    }

    #[test]
    fn test_insert_and_read() {
        let store = store();
        let doc = store
            .insert(&name("documents.document"), [("title", FieldValue::from("Report"))])
            .unwrap();

        assert!(store.contains(&doc).unwrap());
        assert_eq!(
            store.attribute(&doc, "title").unwrap(),
            Some(FieldValue::from("Report"))
        );
        assert_eq!(store.ids(&name("documents.document")).unwrap(), vec![doc.id]);
        assert!(store
            .insert(&name("documents.document"), [("color", FieldValue::from("red"))])
            .is_err());
    }

    #[test]
    fn test_relations_both_directions() {
        let store = store();
        let doc = store
            .insert(&name("documents.document"), [("title", FieldValue::from("a"))])
            .unwrap();
        let tag = store
            .insert(&name("tags.tag"), [("name", FieldValue::from("alpha"))])
            .unwrap();
        let cabinet = store
            .insert(&name("cabinets.cabinet"), [("label", FieldValue::from("box"))])
            .unwrap();

        store.link(&doc, "tags", &[tag.id]).unwrap();
        store.set_foreign_key(&doc, "cabinet", Some(cabinet.id)).unwrap();

        assert_eq!(store.related(&doc, "tags").unwrap(), vec![tag.clone()]);
        assert_eq!(store.related(&tag, "documents").unwrap(), vec![doc.clone()]);
        assert_eq!(store.related(&doc, "cabinet").unwrap(), vec![cabinet.clone()]);
        assert_eq!(store.related(&cabinet, "documents").unwrap(), vec![doc.clone()]);

        let path = vec!["documents".to_string(), "tags".to_string()];
        assert_eq!(store.resolve_relationship(&cabinet, &path).unwrap(), vec![tag]);
    }

    #[test]
    fn test_delete_cascades_links_and_foreign_keys() {
        let store = store();
        let doc = store
            .insert(&name("documents.document"), [("title", FieldValue::from("a"))])
            .unwrap();
        let tag = store
            .insert(&name("tags.tag"), [("name", FieldValue::from("alpha"))])
            .unwrap();
        let cabinet = store
            .insert(&name("cabinets.cabinet"), [("label", FieldValue::from("box"))])
            .unwrap();
        store.link(&doc, "tags", &[tag.id]).unwrap();
        store.set_foreign_key(&doc, "cabinet", Some(cabinet.id)).unwrap();

        store.delete(&tag).unwrap();
        store.delete(&cabinet).unwrap();

        assert!(store.related(&doc, "tags").unwrap().is_empty());
        assert!(store.related(&doc, "cabinet").unwrap().is_empty());
        assert!(store.delete(&tag).is_err());
    }

    #[test]
    fn test_observer_sees_events_in_order() {
        let store = store();
        let recorder = Arc::new(Recorder::default());
        store.subscribe(recorder.clone());

        let doc = store
            .insert(&name("documents.document"), [("title", FieldValue::from("a"))])
            .unwrap();
        let tag = store
            .insert(&name("tags.tag"), [("name", FieldValue::from("alpha"))])
            .unwrap();
        store.link(&doc, "tags", &[tag.id]).unwrap();
        // Existing pair: no event.
        store.link(&doc, "tags", &[tag.id]).unwrap();
        store.unlink(&tag, "documents", &[doc.id]).unwrap();
        store.delete(&doc).unwrap();

        let events = recorder.events.lock();
        assert_eq!(events.len(), 5);
        assert_eq!(
            events[2],
            ChangeEvent::Link {
                junction: "documents.document_tags".to_string(),
                action: LinkAction::Added,
                side: JunctionSide::Left,
                anchor: doc.clone(),
                linked: vec![tag.clone()],
            }
        );
        assert_eq!(
            events[3],
            ChangeEvent::Link {
                junction: "documents.document_tags".to_string(),
                action: LinkAction::Removed,
                side: JunctionSide::Right,
                anchor: tag.clone(),
                linked: vec![doc.clone()],
            }
        );
        assert_eq!(
            events[4],
            ChangeEvent::Entity {
                entity: doc,
                kind: ChangeKind::Deleted,
            }
        );
    }
}
