//! The execution backend seam.

use std::collections::BTreeMap;
use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::{FieldValues, ScopeQuery};
use crate::schema::{EntityRef, EntityType, EntityTypeName};
use crate::search::permission::Actor;
use crate::search::result::ResultSet;

/// One scope to evaluate against the base result set of an entity type.
#[derive(Debug, Clone, Copy)]
pub struct ScopeRequest<'a> {
    pub entity_type: &'a EntityType,
    pub scope: &'a ScopeQuery,
    pub actor: &'a Actor,
}

/// The flattened, indexed form of one entity.
///
/// Every registered field maps to the strings it was indexed with. Related
/// fields hold one string per reached value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub entity: EntityRef,
    pub fields: BTreeMap<String, Vec<String>>,
}

impl IndexedDocument {
    pub fn new(entity: EntityRef) -> Self {
        IndexedDocument {
            entity,
            fields: BTreeMap::new(),
        }
    }

    /// Builder: set the values of a field.
    pub fn with_field<F: Into<String>>(mut self, field: F, values: Vec<String>) -> Self {
        self.fields.insert(field.into(), values);
        self
    }

    /// Append values to a field.
    pub fn extend<F: Into<String>, I: IntoIterator<Item = String>>(&mut self, field: F, values: I) {
        self.fields.entry(field.into()).or_default().extend(values);
    }
}

impl FieldValues for IndexedDocument {
    fn values(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A search execution backend.
///
/// The backend owns the index. It evaluates one scope at a time; combining
/// scopes, permission restriction and limiting are done by the engine.
pub trait SearchBackend: Send + Sync + Debug {
    /// Whether multi-valued fields can be tested for membership natively.
    fn supports_array_membership(&self) -> bool;

    /// Evaluate one scope.
    ///
    /// Returns identifiers in ascending order. Fails with
    /// [`BackendUnavailable`](crate::error::ScopeSearchError::BackendUnavailable)
    /// when the backend cannot run.
    fn execute_scope(&self, request: &ScopeRequest<'_>) -> Result<ResultSet>;

    /// Insert or replace the document of one entity.
    fn index_document(&self, document: IndexedDocument) -> Result<()>;

    /// Remove the document of one entity. Missing documents are ignored.
    fn deindex_document(&self, entity: &EntityRef) -> Result<()>;

    /// Remove every document of an entity type.
    fn clear(&self, entity_type: &EntityTypeName) -> Result<()>;

    /// Fetch the indexed document of one entity.
    fn document(&self, entity: &EntityRef) -> Result<Option<IndexedDocument>>;
}
