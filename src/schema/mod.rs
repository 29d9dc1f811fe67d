//! Schema module for scopesearch.
//!
//! This module provides the model catalog the storage layer exposes, the
//! searchable field descriptors and the registry of searchable entity types.

pub mod entity;
pub mod field;
pub mod model;
pub mod name;
pub mod registry;
pub mod value;

// Re-export commonly used types
pub use entity::{EntityType, EntityTypeBuilder, Permission, ResultCollection, ResultSetProvider};
pub use field::{FieldDescriptor, FieldPath, TermTransform, ValueTransform};
pub use model::{JunctionDefinition, JunctionSide, ModelCatalog, ModelDefinition, Relation, RelationKind};
pub use name::{EntityId, EntityRef, EntityTypeName};
pub use registry::{JunctionBinding, RelatedTarget, Registry};
pub use value::{FieldValue, ValueKind};
