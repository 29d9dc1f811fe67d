//! Registered entity types.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeSearchError};
use crate::schema::field::FieldDescriptor;
use crate::schema::name::{EntityId, EntityTypeName};
use crate::storage::EntityStore;

/// Permission token required to see results of an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    pub fn new<S: Into<String>>(token: S) -> Self {
        Permission(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Custom provider of the base result set a scope is evaluated against.
#[derive(Clone)]
pub struct ResultSetProvider(Arc<dyn Fn(&dyn EntityStore) -> Result<Vec<EntityId>> + Send + Sync>);

impl ResultSetProvider {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&dyn EntityStore) -> Result<Vec<EntityId>> + Send + Sync + 'static,
    {
        ResultSetProvider(Arc::new(f))
    }

    pub fn provide(&self, store: &dyn EntityStore) -> Result<Vec<EntityId>> {
        (self.0)(store)
    }
}

impl fmt::Debug for ResultSetProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ResultSetProvider(<fn>)")
    }
}

/// How the base result set of an entity type is collected.
#[derive(Debug, Clone, Default)]
pub enum ResultCollection {
    /// Every stored entity of the type.
    #[default]
    All,
    /// Entities returned by a custom provider.
    Provider(ResultSetProvider),
}

/// A searchable entity type and its field catalog.
#[derive(Debug, Clone)]
pub struct EntityType {
    name: EntityTypeName,
    fields: Vec<FieldDescriptor>,
    field_index: AHashMap<String, usize>,
    permission: Option<Permission>,
    collection: ResultCollection,
    aliases: Vec<EntityTypeName>,
}

impl EntityType {
    /// Start building an entity type.
    pub fn builder(name: EntityTypeName) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }

    pub fn name(&self) -> &EntityTypeName {
        &self.name
    }

    /// Fields in registration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.field_index.get(name).map(|&i| &self.fields[i])
    }

    pub fn permission(&self) -> Option<&Permission> {
        self.permission.as_ref()
    }

    pub fn collection(&self) -> &ResultCollection {
        &self.collection
    }

    pub fn aliases(&self) -> &[EntityTypeName] {
        &self.aliases
    }

    /// Fields that traverse no relation.
    pub fn direct_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| !f.is_related())
    }

    /// Fields that traverse at least one relation.
    pub fn related_fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().filter(|f| f.is_related())
    }

    /// Fields a free-text query is bound to, in rank order.
    ///
    /// Explicitly ranked fields win. Without any, fields whose terminal
    /// attribute appears in `priority_names` are used in that order. Failing
    /// that, the first `limit` fields in registration order. At most `limit`
    /// fields are returned either way.
    pub fn free_text_fields(&self, priority_names: &[String], limit: usize) -> Vec<&FieldDescriptor> {
        let mut ranked: Vec<&FieldDescriptor> = self
            .fields
            .iter()
            .filter(|f| f.free_text_rank().is_some())
            .collect();
        if !ranked.is_empty() {
            ranked.sort_by_key(|f| f.free_text_rank());
            ranked.truncate(limit.max(1));
            return ranked;
        }

        let mut by_name: Vec<&FieldDescriptor> = Vec::new();
        for priority in priority_names {
            for field in &self.fields {
                if field.path().attribute() == priority
                    && !by_name.iter().any(|f| f.name() == field.name())
                {
                    by_name.push(field);
                }
            }
        }
        if !by_name.is_empty() {
            by_name.truncate(limit.max(1));
            return by_name;
        }

        self.fields.iter().take(limit.max(1)).collect()
    }
}

/// Builder for [`EntityType`].
#[derive(Debug)]
pub struct EntityTypeBuilder {
    name: EntityTypeName,
    fields: Vec<FieldDescriptor>,
    permission: Option<Permission>,
    collection: ResultCollection,
    aliases: Vec<EntityTypeName>,
}

impl EntityTypeBuilder {
    pub fn new(name: EntityTypeName) -> Self {
        EntityTypeBuilder {
            name,
            fields: Vec::new(),
            permission: None,
            collection: ResultCollection::All,
            aliases: Vec::new(),
        }
    }

    /// Add a searchable field.
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Add several searchable fields.
    pub fn fields<I: IntoIterator<Item = FieldDescriptor>>(mut self, fields: I) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Require a permission to see results.
    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    /// Use a custom base result set.
    pub fn provider(mut self, provider: ResultSetProvider) -> Self {
        self.collection = ResultCollection::Provider(provider);
        self
    }

    /// Register a proxy name resolving to this entity type.
    pub fn alias(mut self, alias: EntityTypeName) -> Self {
        self.aliases.push(alias);
        self
    }

    pub fn build(self) -> Result<EntityType> {
        if self.fields.is_empty() {
            return Err(ScopeSearchError::schema(format!(
                "Entity type '{}' has no searchable fields",
                self.name
            )));
        }

        let mut field_index = AHashMap::with_capacity(self.fields.len());
        for (i, field) in self.fields.iter().enumerate() {
            if field_index.insert(field.name().to_string(), i).is_some() {
                return Err(ScopeSearchError::schema(format!(
                    "Field '{}' registered twice on '{}'",
                    field.name(),
                    self.name
                )));
            }
        }

        Ok(EntityType {
            name: self.name,
            fields: self.fields,
            field_index,
            permission: self.permission,
            collection: self.collection,
            aliases: self.aliases,
        })
    }
}
