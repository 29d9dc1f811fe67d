//! In-memory execution backend.
//!
//! Documents are kept per entity type, ordered by identifier. A scope is
//! executed in two steps: the predicate is evaluated over the indexed
//! documents to collect matching identifiers only, then the identifiers are
//! checked against the entity type's base result set and the store. Related
//! fields are flattened at indexing time, so a document matches once no
//! matter how many related rows produced the match.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;

use crate::config::SearchConfig;
use crate::error::{Result, ScopeSearchError};
use crate::query::{ANY_FIELD, Predicate, QueryMode, ScopeQuery, ScopeQueryComposer};
use crate::schema::{EntityId, EntityRef, EntityType, EntityTypeName, Registry, ResultCollection};
use crate::search::backend::{IndexedDocument, ScopeRequest, SearchBackend};
use crate::search::cache::ResultCache;
use crate::search::result::ResultSet;
use crate::storage::EntityStore;

type Documents = AHashMap<EntityTypeName, BTreeMap<EntityId, IndexedDocument>>;

/// A search backend holding its index in memory.
#[derive(Debug)]
pub struct MemoryBackend {
    registry: Arc<Registry>,
    store: Arc<dyn EntityStore>,
    composer: ScopeQueryComposer,
    cache: Option<ResultCache>,
    documents: RwLock<Documents>,
    available: AtomicBool,
}

impl MemoryBackend {
    /// Create an empty backend over a registry and its storage layer.
    pub fn new(registry: Arc<Registry>, store: Arc<dyn EntityStore>, config: &SearchConfig) -> Self {
        let cache = config
            .cache_enabled
            .then(|| ResultCache::new(config.cache_ttl()));
        MemoryBackend {
            registry,
            store,
            composer: ScopeQueryComposer::from_config(config, true),
            cache,
            documents: RwLock::new(AHashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Take the backend on- or offline. Offline backends fail every call
    /// with `BackendUnavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    /// The free-text result cache, when enabled.
    pub fn cache(&self) -> Option<&ResultCache> {
        self.cache.as_ref()
    }

    /// Number of indexed documents of an entity type.
    pub fn len(&self, entity_type: &EntityTypeName) -> usize {
        self.documents
            .read()
            .get(entity_type)
            .map_or(0, BTreeMap::len)
    }

    fn check_available(&self) -> Result<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(ScopeSearchError::backend_unavailable(
                "the search index is offline",
            ))
        }
    }

    /// Normalize a scope before execution.
    ///
    /// Values are trimmed and empty ones dropped. A free-text scope keeps its
    /// free-text value only; the composer binds it to the priority fields.
    /// Structured scopes lose fields the entity type does not register.
    fn clean_scope(&self, entity: &EntityType, scope: &ScopeQuery) -> (ScopeQuery, QueryMode) {
        let mode = scope.mode();
        let mut cleaned = ScopeQuery::new(scope.match_all);
        match mode {
            QueryMode::FreeText => {
                if scope.fields.len() > 1 {
                    log::debug!("free-text scope on '{}' ignores its other fields", entity.name());
                }
                if let Some(value) = scope.free_text().map(str::trim).filter(|v| !v.is_empty()) {
                    cleaned.fields.insert(ANY_FIELD.to_string(), value.to_string());
                }
            }
            QueryMode::Structured => {
                for (name, value) in &scope.fields {
                    let value = value.trim();
                    if value.is_empty() {
                        continue;
                    }
                    if entity.field(name).is_none() {
                        log::warn!("dropping unknown field '{name}' of '{}'", entity.name());
                        continue;
                    }
                    cleaned.fields.insert(name.clone(), value.to_string());
                }
            }
        }
        (cleaned, mode)
    }

    /// Step one: identifiers of indexed documents matching the predicate.
    fn matching_ids(&self, entity_type: &EntityTypeName, predicate: &Predicate) -> Vec<EntityId> {
        let documents = self.documents.read();
        let Some(table) = documents.get(entity_type) else {
            return Vec::new();
        };
        table
            .iter()
            .filter(|(_, doc)| predicate.matches(*doc))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Step two: keep identifiers that are in the base result set and still
    /// exist in the store.
    fn fetch(&self, entity: &EntityType, ids: Vec<EntityId>) -> Result<ResultSet> {
        if ids.is_empty() {
            return Ok(ResultSet::new());
        }
        let base: AHashSet<EntityId> = match entity.collection() {
            ResultCollection::All => self.store.ids(entity.name())?.into_iter().collect(),
            ResultCollection::Provider(provider) => {
                provider.provide(self.store.as_ref())?.into_iter().collect()
            }
        };

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            if base.contains(&id) && self.store.contains(&EntityRef::new(entity.name().clone(), id))? {
                results.push(id);
            }
        }
        Ok(ResultSet::from_ids(results))
    }
}

impl SearchBackend for MemoryBackend {
    fn supports_array_membership(&self) -> bool {
        true
    }

    fn execute_scope(&self, request: &ScopeRequest<'_>) -> Result<ResultSet> {
        self.check_available()?;
        let entity = request.entity_type;
        let (scope, mode) = self.clean_scope(entity, request.scope);

        let cache_key = match (&self.cache, mode) {
            (Some(_), QueryMode::FreeText) if !scope.is_empty() => {
                Some(ResultCache::key(entity.name(), request.actor, &scope))
            }
            _ => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, cache_key)
            && let Some(hit) = cache.get(key)
        {
            log::debug!("cache hit for free-text scope on '{}'", entity.name());
            return Ok(hit);
        }

        let filter = self
            .composer
            .compose(self.registry.catalog(), entity, &scope, mode)?;
        let results = match filter.predicate() {
            Some(predicate) => {
                let ids = self.matching_ids(entity.name(), predicate);
                self.fetch(entity, ids)?
            }
            None => ResultSet::new(),
        };

        if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
            cache.insert(key, &results);
        }
        Ok(results)
    }

    fn index_document(&self, document: IndexedDocument) -> Result<()> {
        self.check_available()?;
        let entity = document.entity.clone();
        self.documents
            .write()
            .entry(entity.entity_type)
            .or_default()
            .insert(entity.id, document);
        Ok(())
    }

    fn deindex_document(&self, entity: &EntityRef) -> Result<()> {
        self.check_available()?;
        if let Some(table) = self.documents.write().get_mut(&entity.entity_type) {
            table.remove(&entity.id);
        }
        Ok(())
    }

    fn clear(&self, entity_type: &EntityTypeName) -> Result<()> {
        self.check_available()?;
        self.documents.write().remove(entity_type);
        Ok(())
    }

    fn document(&self, entity: &EntityRef) -> Result<Option<IndexedDocument>> {
        self.check_available()?;
        Ok(self
            .documents
            .read()
            .get(&entity.entity_type)
            .and_then(|table| table.get(&entity.id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDescriptor, FieldValue, ModelCatalog, ResultSetProvider, ValueKind};
    use crate::search::permission::Actor;
    use crate::storage::MemoryStore;

    fn name(s: &str) -> EntityTypeName {
        EntityTypeName::parse(s).unwrap()
    }

    struct Setup {
        store: Arc<MemoryStore>,
        registry: Arc<Registry>,
        ids: Vec<EntityId>,
    }

    fn setup(provider: Option<ResultSetProvider>) -> Setup {
        let doc = name("documents.document");
        let mut catalog = ModelCatalog::new();
        catalog
            .define_model(&doc, [("title", ValueKind::Text), ("labels", ValueKind::List)])
            .unwrap();
        let catalog = Arc::new(catalog);
        let store = Arc::new(MemoryStore::new(Arc::clone(&catalog)));

        let mut builder = EntityType::builder(doc.clone())
            .field(FieldDescriptor::new("title").unwrap())
            .field(FieldDescriptor::new("labels").unwrap());
        if let Some(provider) = provider {
            builder = builder.provider(provider);
        }
        let mut registry = Registry::new(catalog);
        registry.register(builder.build().unwrap()).unwrap();

        let mut ids = Vec::new();
        for title in ["alpha report", "beta memo", "alpha memo"] {
            ids.push(
                store
                    .insert(&doc, [("title", FieldValue::from(title))])
                    .unwrap()
                    .id,
            );
        }
        Setup {
            store,
            registry: Arc::new(registry),
            ids,
        }
    }

    fn backend(setup: &Setup, config: &SearchConfig) -> MemoryBackend {
        let backend = MemoryBackend::new(
            Arc::clone(&setup.registry),
            Arc::clone(&setup.store) as Arc<dyn EntityStore>,
            config,
        );
        let titles = ["alpha report", "beta memo", "alpha memo"];
        for (id, title) in setup.ids.iter().zip(titles) {
            let labels = if title.contains("memo") { vec!["internal".to_string()] } else { Vec::new() };
            backend
                .index_document(
                    IndexedDocument::new(EntityRef::new(name("documents.document"), *id))
                        .with_field("title", vec![title.to_string()])
                        .with_field("labels", labels),
                )
                .unwrap();
        }
        backend
    }

    fn run(backend: &MemoryBackend, registry: &Registry, scope: &ScopeQuery) -> Result<ResultSet> {
        let entity = registry.get(&name("documents.document")).unwrap();
        backend.execute_scope(&ScopeRequest {
            entity_type: entity,
            scope,
            actor: &Actor::anonymous(),
        })
    }

    #[test]
    fn test_structured_scope() {
        let setup = setup(None);
        let backend = backend(&setup, &SearchConfig::default());
        let scope = ScopeQuery::new(true).with_field("title", "alpha");
        let results = run(&backend, &setup.registry, &scope).unwrap();
        assert_eq!(results.ids(), &[setup.ids[0], setup.ids[2]]);

        let scope = ScopeQuery::new(true).with_field("labels", "INTERNAL");
        let results = run(&backend, &setup.registry, &scope).unwrap();
        assert_eq!(results.ids(), &[setup.ids[1], setup.ids[2]]);
    }

    #[test]
    fn test_unknown_and_empty_fields_narrow_to_nothing() {
        let setup = setup(None);
        let backend = backend(&setup, &SearchConfig::default());
        let scope = ScopeQuery::new(true)
            .with_field("color", "red")
            .with_field("title", "  ");
        assert!(run(&backend, &setup.registry, &scope).unwrap().is_empty());
    }

    #[test]
    fn test_deleted_entities_are_not_returned() {
        let setup = setup(None);
        let backend = backend(&setup, &SearchConfig::default());
        setup
            .store
            .delete(&EntityRef::new(name("documents.document"), setup.ids[0]))
            .unwrap();
        let scope = ScopeQuery::new(true).with_field("title", "alpha");
        let results = run(&backend, &setup.registry, &scope).unwrap();
        assert_eq!(results.ids(), &[setup.ids[2]]);
    }

    #[test]
    fn test_provider_restricts_base_set() {
        let setup = setup(Some(ResultSetProvider::new(|store| {
            let ids = store.ids(&EntityTypeName::parse("documents.document")?)?;
            Ok(ids.into_iter().skip(2).collect())
        })));
        let backend = backend(&setup, &SearchConfig::default());
        let scope = ScopeQuery::new(true).with_field("title", "alpha");
        let results = run(&backend, &setup.registry, &scope).unwrap();
        assert_eq!(results.ids(), &[setup.ids[2]]);
    }

    #[test]
    fn test_free_text_results_are_cached() {
        let setup = setup(None);
        let backend = backend(&setup, &SearchConfig::default());
        let scope = ScopeQuery::new(false).with_field(ANY_FIELD, "memo");

        let miss = run(&backend, &setup.registry, &scope).unwrap();
        assert_eq!(backend.cache().unwrap().len(), 1);
        let hit = run(&backend, &setup.registry, &scope).unwrap();
        assert_eq!(miss, hit);

        let structured = ScopeQuery::new(false).with_field("title", "memo");
        run(&backend, &setup.registry, &structured).unwrap();
        assert_eq!(backend.cache().unwrap().len(), 1);
    }

    #[test]
    fn test_offline_backend_is_unavailable() {
        let setup = setup(None);
        let backend = backend(&setup, &SearchConfig::default());
        backend.set_available(false);
        let scope = ScopeQuery::new(true).with_field("title", "alpha");
        let err = run(&backend, &setup.registry, &scope).unwrap_err();
        assert!(err.is_backend_unavailable());
        assert!(backend.index_document(IndexedDocument::new(EntityRef::new(name("documents.document"), 99))).is_err());
    }
}
