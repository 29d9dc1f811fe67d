//! # scopesearch
//!
//! Scoped boolean search over registered entity types, with reactive
//! re-indexing driven by storage change notifications.
//!
//! ## Features
//!
//! - Flat, prefix-encoded query dictionaries with named scopes and AND/OR operators
//! - Quoted phrases, negation and an `OR` keyword in field values
//! - A schema registry of searchable entity types with direct and related fields
//! - Permission restriction applied once per search
//! - Reactive indexing of related and many-to-many changes
//! - An in-memory backend with a TTL result cache
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use scopesearch::prelude::*;
//!
//! # fn main() -> scopesearch::error::Result<()> {
//! let doc = EntityTypeName::parse("documents.document")?;
//! let mut catalog = ModelCatalog::new();
//! catalog.define_model(&doc, [("title", ValueKind::Text)])?;
//! let catalog = Arc::new(catalog);
//!
//! let mut registry = Registry::new(Arc::clone(&catalog));
//! registry.register(EntityType::builder(doc.clone()).field(FieldDescriptor::new("title")?).build()?)?;
//! let registry = Arc::new(registry);
//!
//! let store = Arc::new(MemoryStore::new(catalog));
//! let config = SearchConfig::default();
//! let backend = Arc::new(MemoryBackend::new(Arc::clone(&registry), store.clone(), &config));
//! let indexer = Arc::new(Indexer::new(Arc::clone(&registry), store.clone(), backend.clone()));
//! let queue = Arc::new(InlineTaskQueue::new(indexer, config.indexing.max_retries));
//! store.subscribe(Arc::new(IndexingPipeline::new(Arc::clone(&registry), store.clone(), queue)?));
//!
//! store.insert(&doc, [("title", FieldValue::from("Annual report"))])?;
//!
//! let engine = SearchEngine::new(registry, backend, Arc::new(AllowAll), config)?;
//! let results = engine.search(&WireQuery::new().with("q", "report"), &doc, &Actor::anonymous(), false)?;
//! assert_eq!(results.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod indexing;
pub mod query;
pub mod schema;
pub mod search;
pub mod storage;

pub mod prelude {
    pub use crate::config::{IndexingConfig, SearchConfig};
    pub use crate::error::{Result, ScopeSearchError};
    pub use crate::indexing::{
        ChannelTaskQueue, Exclusion, IndexJob, Indexer, IndexingPipeline, InlineTaskQueue, TaskQueue,
    };
    pub use crate::query::{QueryTree, ScopeQuery, WireQuery, tokenize};
    pub use crate::schema::{
        EntityId, EntityRef, EntityType, EntityTypeName, FieldDescriptor, FieldValue, ModelCatalog,
        Permission, Registry, TermTransform, ValueKind, ValueTransform,
    };
    pub use crate::search::{
        Actor, AllowAll, GrantPermissions, MemoryBackend, PermissionChecker, ResultSet, SearchBackend,
        SearchEngine,
    };
    pub use crate::storage::{ChangeObserver, EntityStore, MemoryStore};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
