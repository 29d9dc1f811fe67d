//! JSON fixtures: a model catalog, registrations and records in one file.
//!
//! ```json
//! {
//!   "models": {
//!     "documents.document": { "title": "text" },
//!     "tags.tag": { "name": "text" }
//!   },
//!   "relations": [
//!     { "type": "many_to_many", "source": "documents.document", "name": "tags",
//!       "target": "tags.tag", "reverse": "documents" }
//!   ],
//!   "entity_types": [
//!     { "name": "documents.document", "permission": "documents.view",
//!       "fields": [ { "path": "title", "free_text_rank": 1 }, { "path": "tags.name" } ] }
//!   ],
//!   "records": [
//!     { "key": "red", "model": "tags.tag", "attributes": { "name": "red" } },
//!     { "key": "d1", "model": "documents.document",
//!       "attributes": { "title": "Annual report" }, "links": { "tags": ["red"] } }
//!   ],
//!   "grants": [ { "actor": "alice", "permission": "documents.view" } ]
//! }
//! ```
//!
//! Loading a fixture wires a [`MemoryStore`] to a [`MemoryBackend`] through
//! the reactive indexing pipeline, so records are indexed as they are
//! inserted and linked.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;
use crate::error::{Result, ScopeSearchError};
use crate::indexing::{Indexer, IndexingPipeline, InlineTaskQueue, TaskQueue};
use crate::schema::{
    EntityId, EntityRef, EntityType, EntityTypeName, FieldDescriptor, FieldValue, ModelCatalog,
    Permission, Registry, TermTransform, ValueKind, ValueTransform,
};
use crate::search::{Actor, GrantPermissions, MemoryBackend, PermissionChecker, SearchBackend, SearchEngine};
use crate::storage::{EntityStore, MemoryStore};

/// A fixture file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub models: BTreeMap<EntityTypeName, BTreeMap<String, ValueKind>>,
    pub relations: Vec<RelationSpec>,
    pub entity_types: Vec<EntityTypeSpec>,
    pub records: Vec<RecordSpec>,
    pub grants: Vec<GrantSpec>,
}

/// A relation declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationSpec {
    #[serde(rename = "type")]
    pub kind: RelationType,
    pub source: EntityTypeName,
    pub name: String,
    pub target: EntityTypeName,
    pub reverse: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    ForeignKey,
    ManyToMany,
}

/// A searchable entity type registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityTypeSpec {
    pub name: EntityTypeName,
    #[serde(default)]
    pub permission: Option<String>,
    #[serde(default)]
    pub aliases: Vec<EntityTypeName>,
    pub fields: Vec<FieldSpec>,
}

/// A searchable field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub path: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub free_text_rank: Option<u32>,
    #[serde(default)]
    pub term_transform: Option<TransformName>,
    #[serde(default)]
    pub value_transform: Option<TransformName>,
}

/// Built-in transforms available to fixtures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformName {
    Uuid,
    Lowercase,
}

/// A stored record. `key` names it for links, foreign keys and output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSpec {
    pub key: String,
    pub model: EntityTypeName,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub foreign_keys: BTreeMap<String, String>,
    #[serde(default)]
    pub links: BTreeMap<String, Vec<String>>,
}

/// A permission grant. Without `objects` the grant covers every entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantSpec {
    pub actor: String,
    pub permission: String,
    #[serde(default)]
    pub objects: Option<Vec<String>>,
}

/// A fixture wired into a running search stack.
#[derive(Debug)]
pub struct LoadedFixture {
    pub registry: Arc<Registry>,
    pub store: Arc<MemoryStore>,
    pub backend: Arc<MemoryBackend>,
    pub engine: SearchEngine,
    keys: BTreeMap<EntityRef, String>,
}

impl LoadedFixture {
    /// The fixture key of a stored entity.
    pub fn key_of(&self, entity: &EntityRef) -> Option<&str> {
        self.keys.get(entity).map(String::as_str)
    }
}

impl Fixture {
    /// Read a fixture from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Build the catalog, registry, store, backend and engine described by
    /// this fixture, then insert its records.
    pub fn load(&self, config: &SearchConfig) -> Result<LoadedFixture> {
        let catalog = Arc::new(self.catalog()?);
        let registry = Arc::new(self.registry(Arc::clone(&catalog))?);
        let store = Arc::new(MemoryStore::new(catalog));
        let backend = Arc::new(MemoryBackend::new(
            Arc::clone(&registry),
            Arc::clone(&store) as Arc<dyn EntityStore>,
            config,
        ));

        let indexer = Arc::new(Indexer::new(
            Arc::clone(&registry),
            Arc::clone(&store) as Arc<dyn EntityStore>,
            Arc::clone(&backend) as Arc<dyn SearchBackend>,
        ));
        let queue: Arc<dyn TaskQueue> =
            Arc::new(InlineTaskQueue::new(indexer, config.indexing.max_retries));
        let pipeline = IndexingPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&store) as Arc<dyn EntityStore>,
            queue,
        )?;
        store.subscribe(Arc::new(pipeline));

        let ids = self.insert_records(&store)?;
        let permissions = Arc::new(GrantPermissions::new());
        for grant in &self.grants {
            let actor = Actor::new(grant.actor.as_str());
            let permission = Permission::new(grant.permission.as_str());
            match &grant.objects {
                None => permissions.grant_all(&actor, &permission),
                Some(keys) => {
                    let objects = keys
                        .iter()
                        .map(|key| resolve_key(&ids, key).map(|entity| entity.id))
                        .collect::<Result<Vec<EntityId>>>()?;
                    permissions.grant_objects(&actor, &permission, objects);
                }
            }
        }

        let engine = SearchEngine::new(
            Arc::clone(&registry),
            Arc::clone(&backend) as Arc<dyn SearchBackend>,
            permissions as Arc<dyn PermissionChecker>,
            config.clone(),
        )?;
        log::info!(
            "loaded fixture: {} entity types, {} records",
            self.entity_types.len(),
            self.records.len()
        );

        Ok(LoadedFixture {
            registry,
            store,
            backend,
            engine,
            keys: ids.into_iter().map(|(key, entity)| (entity, key)).collect(),
        })
    }

    fn catalog(&self) -> Result<ModelCatalog> {
        let mut catalog = ModelCatalog::new();
        for (name, attributes) in &self.models {
            catalog.define_model(name, attributes.iter().map(|(a, k)| (a.as_str(), *k)))?;
        }
        for relation in &self.relations {
            match relation.kind {
                RelationType::ForeignKey => catalog.foreign_key(
                    &relation.source,
                    &relation.name,
                    &relation.target,
                    &relation.reverse,
                )?,
                RelationType::ManyToMany => {
                    catalog.many_to_many(
                        &relation.source,
                        &relation.name,
                        &relation.target,
                        &relation.reverse,
                    )?;
                }
            }
        }
        Ok(catalog)
    }

    fn registry(&self, catalog: Arc<ModelCatalog>) -> Result<Registry> {
        let mut registry = Registry::new(catalog);
        for entry in &self.entity_types {
            let mut builder = EntityType::builder(entry.name.clone());
            for field in &entry.fields {
                builder = builder.field(field.descriptor()?);
            }
            if let Some(permission) = &entry.permission {
                builder = builder.permission(Permission::new(permission.as_str()));
            }
            for alias in &entry.aliases {
                builder = builder.alias(alias.clone());
            }
            registry.register(builder.build()?)?;
        }
        Ok(registry)
    }

    fn insert_records(&self, store: &MemoryStore) -> Result<BTreeMap<String, EntityRef>> {
        let mut ids = BTreeMap::new();
        for record in &self.records {
            let attributes = record
                .attributes
                .iter()
                .map(|(name, value)| (name.as_str(), FieldValue::from_json(value)));
            let entity = store.insert(&record.model, attributes)?;
            if ids.insert(record.key.clone(), entity).is_some() {
                return Err(ScopeSearchError::invalid_argument(format!(
                    "Duplicate record key '{}'",
                    record.key
                )));
            }
        }

        for record in &self.records {
            let entity = resolve_key(&ids, &record.key)?;
            for (relation, target) in &record.foreign_keys {
                let target = resolve_key(&ids, target)?;
                store.set_foreign_key(entity, relation, Some(target.id))?;
            }
            for (relation, targets) in &record.links {
                let targets = targets
                    .iter()
                    .map(|key| resolve_key(&ids, key).map(|target| target.id))
                    .collect::<Result<Vec<EntityId>>>()?;
                store.link(entity, relation, &targets)?;
            }
        }
        Ok(ids)
    }
}

impl FieldSpec {
    fn descriptor(&self) -> Result<FieldDescriptor> {
        let mut descriptor = FieldDescriptor::new(&self.path)?;
        if let Some(label) = &self.label {
            descriptor = descriptor.with_label(label.as_str());
        }
        if let Some(rank) = self.free_text_rank {
            descriptor = descriptor.with_free_text_rank(rank);
        }
        if let Some(name) = self.term_transform {
            descriptor = descriptor.with_term_transform(match name {
                TransformName::Uuid => TermTransform::canonical_uuid(),
                TransformName::Lowercase => TermTransform::lowercase(),
            });
        }
        if let Some(name) = self.value_transform {
            descriptor = descriptor.with_value_transform(match name {
                TransformName::Uuid => ValueTransform::canonical_uuid(),
                TransformName::Lowercase => {
                    ValueTransform::new(|value| value.to_string().to_lowercase())
                }
            });
        }
        Ok(descriptor)
    }
}

fn resolve_key<'a>(ids: &'a BTreeMap<String, EntityRef>, key: &str) -> Result<&'a EntityRef> {
    ids.get(key)
        .ok_or_else(|| ScopeSearchError::invalid_argument(format!("Unknown record key '{key}'")))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;
    use crate::query::WireQuery;

    const FIXTURE: &str = r#"{
        "models": {
            "documents.document": { "title": "text", "uuid": "text" },
            "tags.tag": { "name": "text" }
        },
        "relations": [
            { "type": "many_to_many", "source": "documents.document", "name": "tags",
              "target": "tags.tag", "reverse": "documents" }
        ],
        "entity_types": [
            { "name": "documents.document", "permission": "documents.view",
              "fields": [
                { "path": "title", "label": "Title", "free_text_rank": 1 },
                { "path": "uuid", "term_transform": "uuid", "value_transform": "uuid" },
                { "path": "tags.name", "free_text_rank": 2 }
              ] }
        ],
        "records": [
            { "key": "red", "model": "tags.tag", "attributes": { "name": "red" } },
            { "key": "d1", "model": "documents.document",
              "attributes": { "title": "Annual report" }, "links": { "tags": ["red"] } },
            { "key": "d2", "model": "documents.document", "attributes": { "title": "Memo" } }
        ],
        "grants": [
            { "actor": "alice", "permission": "documents.view" },
            { "actor": "bob", "permission": "documents.view", "objects": ["d2"] }
        ]
    }"#;

    fn load() -> LoadedFixture {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(FIXTURE.as_bytes()).unwrap();
        Fixture::from_file(file.path())
            .unwrap()
            .load(&SearchConfig::default())
            .unwrap()
    }

    #[test]
    fn test_load_indexes_records() {
        let loaded = load();
        let doc = EntityTypeName::parse("documents.document").unwrap();
        assert_eq!(loaded.backend.len(&doc), 2);
        assert_eq!(loaded.store.count(&EntityTypeName::parse("tags.tag").unwrap()), 1);

        let results = loaded
            .engine
            .search(&WireQuery::new().with("q", "red"), &doc, &Actor::new("alice"), false)
            .unwrap();
        assert_eq!(results.len(), 1);
        let entity = EntityRef::new(doc, results.ids()[0]);
        assert_eq!(loaded.key_of(&entity), Some("d1"));
    }

    #[test]
    fn test_object_grants() {
        let loaded = load();
        let doc = EntityTypeName::parse("documents.document").unwrap();
        let query = WireQuery::new().with("title", "e");
        let alice = loaded.engine.search(&query, &doc, &Actor::new("alice"), false).unwrap();
        let bob = loaded.engine.search(&query, &doc, &Actor::new("bob"), false).unwrap();
        let carol = loaded.engine.search(&query, &doc, &Actor::new("carol"), false).unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(bob.len(), 1);
        assert!(carol.is_empty());
    }

    #[test]
    fn test_demo_fixture() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/library.json");
        let loaded = Fixture::from_file(path)
            .unwrap()
            .load(&SearchConfig::default())
            .unwrap();
        let alias = EntityTypeName::parse("docs.document").unwrap();
        let alice = Actor::new("alice");

        let inbox = loaded
            .engine
            .search(&WireQuery::new().with("folder.label", "inbox"), &alias, &alice, false)
            .unwrap();
        let keys: Vec<_> = inbox
            .ids()
            .iter()
            .map(|&id| {
                let entity = EntityRef::new(EntityTypeName::parse("documents.document").unwrap(), id);
                loaded.key_of(&entity).map(str::to_string)
            })
            .collect();
        assert_eq!(keys, vec![Some("budget".to_string()), Some("minutes".to_string())]);

        let bob = loaded
            .engine
            .search(&WireQuery::new().with("q", "finance"), &alias, &Actor::new("bob"), false)
            .unwrap();
        assert!(bob.is_empty());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut fixture: Fixture = serde_json::from_str(FIXTURE).unwrap();
        fixture.records[1].links.insert("tags".to_string(), vec!["blue".to_string()]);
        assert!(fixture.load(&SearchConfig::default()).is_err());
    }
}
