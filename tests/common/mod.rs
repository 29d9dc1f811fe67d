//! Shared fixture for integration tests: documents with tags (many-to-many)
//! and a folder (foreign key).

#![allow(dead_code)]

use std::sync::Arc;

use scopesearch::indexing::{Indexer, IndexingPipeline, InlineTaskQueue, TaskQueue};
use scopesearch::prelude::*;

pub const VIEW_DOCUMENT: &str = "documents.view_document";

pub struct Library {
    pub doc: EntityTypeName,
    pub tag: EntityTypeName,
    pub folder: EntityTypeName,
    pub registry: Arc<Registry>,
    pub store: Arc<MemoryStore>,
    pub backend: Arc<MemoryBackend>,
    pub indexer: Arc<Indexer>,
    pub engine: SearchEngine,
}

fn name(s: &str) -> EntityTypeName {
    EntityTypeName::parse(s).unwrap()
}

fn catalog() -> Arc<ModelCatalog> {
    let mut catalog = ModelCatalog::new();
    catalog
        .define_model(&name("documents.document"), [("title", ValueKind::Text)])
        .unwrap();
    catalog.define_model(&name("tags.tag"), [("name", ValueKind::Text)]).unwrap();
    catalog
        .define_model(&name("folders.folder"), [("label", ValueKind::Text)])
        .unwrap();
    catalog
        .many_to_many(&name("documents.document"), "tags", &name("tags.tag"), "documents")
        .unwrap();
    catalog
        .foreign_key(&name("documents.document"), "folder", &name("folders.folder"), "documents")
        .unwrap();
    Arc::new(catalog)
}

fn registry(catalog: Arc<ModelCatalog>) -> Arc<Registry> {
    let mut registry = Registry::new(catalog);
    registry
        .register(
            EntityType::builder(name("documents.document"))
                .field(FieldDescriptor::new("title").unwrap().with_free_text_rank(1))
                .field(FieldDescriptor::new("tags.name").unwrap().with_free_text_rank(2))
                .field(FieldDescriptor::new("folder.label").unwrap())
                .permission(Permission::new(VIEW_DOCUMENT))
                .build()
                .unwrap(),
        )
        .unwrap();
    Arc::new(registry)
}

impl Library {
    /// A library indexing inline, on the thread that changes the store.
    pub fn new(permissions: Arc<dyn PermissionChecker>, config: SearchConfig) -> Library {
        let max_retries = config.indexing.max_retries;
        Library::with_queue(permissions, config, |indexer| {
            Arc::new(InlineTaskQueue::new(indexer, max_retries))
        })
    }

    /// A library whose pipeline hands jobs to the queue built by `queue`.
    pub fn with_queue<F>(
        permissions: Arc<dyn PermissionChecker>,
        config: SearchConfig,
        queue: F,
    ) -> Library
    where
        F: FnOnce(Arc<Indexer>) -> Arc<dyn TaskQueue>,
    {
        let catalog = catalog();
        let registry = registry(Arc::clone(&catalog));
        let store = Arc::new(MemoryStore::new(catalog));
        let backend = Arc::new(MemoryBackend::new(
            Arc::clone(&registry),
            Arc::clone(&store) as Arc<dyn EntityStore>,
            &config,
        ));
        let indexer = Arc::new(Indexer::new(
            Arc::clone(&registry),
            Arc::clone(&store) as Arc<dyn EntityStore>,
            Arc::clone(&backend) as Arc<dyn SearchBackend>,
        ));
        let pipeline = IndexingPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&store) as Arc<dyn EntityStore>,
            queue(Arc::clone(&indexer)),
        )
        .unwrap();
        store.subscribe(Arc::new(pipeline));

        let engine = SearchEngine::new(
            Arc::clone(&registry),
            Arc::clone(&backend) as Arc<dyn SearchBackend>,
            permissions,
            config,
        )
        .unwrap();

        Library {
            doc: name("documents.document"),
            tag: name("tags.tag"),
            folder: name("folders.folder"),
            registry,
            store,
            backend,
            indexer,
            engine,
        }
    }

    pub fn allow_all() -> Library {
        Library::new(Arc::new(AllowAll), SearchConfig::default())
    }

    pub fn add_tag(&self, tag: &str) -> EntityRef {
        self.store.insert(&self.tag, [("name", FieldValue::from(tag))]).unwrap()
    }

    pub fn add_folder(&self, label: &str) -> EntityRef {
        self.store
            .insert(&self.folder, [("label", FieldValue::from(label))])
            .unwrap()
    }

    pub fn add_document(&self, title: &str, tags: &[&EntityRef]) -> EntityRef {
        let doc = self
            .store
            .insert(&self.doc, [("title", FieldValue::from(title))])
            .unwrap();
        if !tags.is_empty() {
            let ids: Vec<EntityId> = tags.iter().map(|tag| tag.id).collect();
            self.store.link(&doc, "tags", &ids).unwrap();
        }
        doc
    }

    pub fn search(&self, query: &WireQuery) -> Result<ResultSet> {
        self.engine.search(query, &self.doc, &Actor::anonymous(), false)
    }

    pub fn search_as(&self, query: &WireQuery, actor: &Actor) -> Result<ResultSet> {
        self.engine.search(query, &self.doc, actor, false)
    }
}

/// Identifiers of `entities`, in ascending order.
pub fn ids(entities: &[&EntityRef]) -> Vec<EntityId> {
    let mut ids: Vec<EntityId> = entities.iter().map(|entity| entity.id).collect();
    ids.sort_unstable();
    ids
}
