//! Schema registry: the catalog of searchable entity types.
//!
//! A [`Registry`] is built once at startup and then shared read-only, usually
//! behind an `Arc`. Besides name lookup it answers the relationship questions
//! reactive indexing needs: which models can change the indexed text of an
//! entity type (and how to walk back from them), and which junction tables
//! sit on a registered many-to-many path.

use std::collections::BTreeMap;
use std::sync::Arc;

use ahash::AHashMap;
use serde::Serialize;

use crate::error::{Result, ScopeSearchError};
use crate::schema::entity::EntityType;
use crate::schema::field::{walk_path, FieldDescriptor};
use crate::schema::model::{JunctionSide, ModelCatalog};
use crate::schema::name::EntityTypeName;

/// A model whose changes affect the indexed text of a registered entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RelatedTarget {
    /// Registered entity type owning the related field.
    pub owner: EntityTypeName,
    /// The related field.
    pub field: String,
    /// Model reached by (a prefix of) the field path.
    pub related: EntityTypeName,
    /// Relation names leading from `related` back to `owner`.
    pub reverse_path: Vec<String>,
}

/// A junction table crossed by a registered many-to-many field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct JunctionBinding {
    pub junction: String,
    pub owner: EntityTypeName,
    pub field: String,
    /// Model on the declaring side of the junction.
    pub left: EntityTypeName,
    /// Model on the target side of the junction.
    pub right: EntityTypeName,
    /// Relation names leading from a `left` instance to its owners.
    pub left_to_owner: Vec<String>,
    /// Relation names leading from a `right` instance to its owners.
    pub right_to_owner: Vec<String>,
}

/// Process-wide catalog of searchable entity types.
#[derive(Debug, Clone)]
pub struct Registry {
    catalog: Arc<ModelCatalog>,
    entity_types: BTreeMap<EntityTypeName, Arc<EntityType>>,
    aliases: AHashMap<EntityTypeName, EntityTypeName>,
}

impl Registry {
    /// Create an empty registry over a model catalog.
    pub fn new(catalog: Arc<ModelCatalog>) -> Self {
        Registry {
            catalog,
            entity_types: BTreeMap::new(),
            aliases: AHashMap::new(),
        }
    }

    /// The model catalog field paths are resolved against.
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    /// Shared handle to the model catalog.
    pub fn catalog_arc(&self) -> Arc<ModelCatalog> {
        Arc::clone(&self.catalog)
    }

    /// Register an entity type.
    ///
    /// Each name (including aliases) maps to exactly one entry for the
    /// lifetime of the registry: registering a taken name is an error and
    /// leaves the existing entry untouched.
    pub fn register(&mut self, entity_type: EntityType) -> Result<Arc<EntityType>> {
        let name = entity_type.name().clone();
        if self.is_taken(&name) {
            return Err(ScopeSearchError::schema(format!(
                "Entity type '{name}' is already registered"
            )));
        }
        if self.catalog.model(&name).is_none() {
            return Err(ScopeSearchError::schema(format!(
                "Entity type '{name}' has no model in the catalog"
            )));
        }
        for alias in entity_type.aliases() {
            if self.is_taken(alias) || *alias == name {
                return Err(ScopeSearchError::schema(format!(
                    "Alias '{alias}' of '{name}' is already registered"
                )));
            }
        }
        for field in entity_type.fields() {
            self.validate_field(&name, field)?;
        }

        for alias in entity_type.aliases() {
            self.aliases.insert(alias.clone(), name.clone());
        }
        let entity_type = Arc::new(entity_type);
        self.entity_types.insert(name.clone(), Arc::clone(&entity_type));
        log::debug!(
            "registered entity type '{name}' with {} fields",
            entity_type.fields().len()
        );
        Ok(entity_type)
    }

    /// Look up an entity type by name or alias.
    pub fn lookup(&self, name: &EntityTypeName) -> Option<&Arc<EntityType>> {
        let canonical = self.aliases.get(name).unwrap_or(name);
        self.entity_types.get(canonical)
    }

    /// Look up an entity type by name or alias, failing when unknown.
    pub fn get(&self, name: &EntityTypeName) -> Result<&Arc<EntityType>> {
        self.lookup(name)
            .ok_or_else(|| ScopeSearchError::not_found(format!("entity type '{name}'")))
    }

    /// True when `name` is a registered entity type (aliases excluded).
    pub fn is_registered(&self, name: &EntityTypeName) -> bool {
        self.entity_types.contains_key(name)
    }

    /// Iterate over registered entity types in name order.
    pub fn entity_types(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.entity_types.values()
    }

    /// Relation names leading from the model a related field reaches back to
    /// the owning entity type. Empty for direct fields.
    pub fn reverse_path(&self, owner: &EntityTypeName, field: &str) -> Result<Vec<String>> {
        let entity_type = self.get(owner)?;
        let descriptor = entity_type.field(field).ok_or_else(|| {
            ScopeSearchError::not_found(format!("field '{field}' of '{owner}'"))
        })?;
        let hops = self.hops(entity_type.name(), descriptor)?;
        Ok(reverse_of(&hops, hops.len()))
    }

    /// The related entity type a field reaches, or `None` for direct fields.
    pub fn related_entity_type(
        &self,
        owner: &EntityTypeName,
        field: &str,
    ) -> Result<Option<EntityTypeName>> {
        let entity_type = self.get(owner)?;
        let descriptor = entity_type.field(field).ok_or_else(|| {
            ScopeSearchError::not_found(format!("field '{field}' of '{owner}'"))
        })?;
        let hops = self.hops(entity_type.name(), descriptor)?;
        Ok(hops.last().map(|hop| hop.target.clone()))
    }

    /// Every model reachable through a related field, with the path back to
    /// the owner. Intermediate hops of multi-hop paths are included.
    pub fn related_targets(&self) -> Result<Vec<RelatedTarget>> {
        let mut targets = Vec::new();
        for entity_type in self.entity_types.values() {
            for field in entity_type.related_fields() {
                let hops = self.hops(entity_type.name(), field)?;
                for depth in 1..=hops.len() {
                    let target = RelatedTarget {
                        owner: entity_type.name().clone(),
                        field: field.name().to_string(),
                        related: hops[depth - 1].target.clone(),
                        reverse_path: reverse_of(&hops, depth),
                    };
                    if !targets.iter().any(|t: &RelatedTarget| {
                        t.owner == target.owner
                            && t.related == target.related
                            && t.reverse_path == target.reverse_path
                    }) {
                        targets.push(target);
                    }
                }
            }
        }
        Ok(targets)
    }

    /// Every junction crossed by a registered field path, with the model on
    /// each side and the paths leading from either side back to the owner.
    pub fn junction_bindings(&self) -> Result<Vec<JunctionBinding>> {
        let mut bindings = Vec::new();
        for entity_type in self.entity_types.values() {
            for field in entity_type.related_fields() {
                let hops = self.hops(entity_type.name(), field)?;
                for (i, hop) in hops.iter().enumerate() {
                    let Some((junction, side)) = hop.junction.clone() else {
                        continue;
                    };
                    let near = reverse_of(&hops, i);
                    let far = reverse_of(&hops, i + 1);
                    let (left, right, left_to_owner, right_to_owner) = match side {
                        JunctionSide::Left => (hop.source.clone(), hop.target.clone(), near, far),
                        JunctionSide::Right => (hop.target.clone(), hop.source.clone(), far, near),
                    };
                    let binding = JunctionBinding {
                        junction,
                        owner: entity_type.name().clone(),
                        field: field.name().to_string(),
                        left,
                        right,
                        left_to_owner,
                        right_to_owner,
                    };
                    if !bindings.iter().any(|b: &JunctionBinding| {
                        b.junction == binding.junction
                            && b.owner == binding.owner
                            && b.left_to_owner == binding.left_to_owner
                            && b.right_to_owner == binding.right_to_owner
                    }) {
                        bindings.push(binding);
                    }
                }
            }
        }
        Ok(bindings)
    }

    fn is_taken(&self, name: &EntityTypeName) -> bool {
        self.entity_types.contains_key(name) || self.aliases.contains_key(name)
    }

    fn validate_field(&self, owner: &EntityTypeName, field: &FieldDescriptor) -> Result<()> {
        let reached = walk_path(&self.catalog, owner, field.path())?;
        let terminal = reached.last().unwrap_or(owner);
        if self
            .catalog
            .attribute_kind(terminal, field.path().attribute())
            .is_none()
        {
            return Err(ScopeSearchError::schema(format!(
                "Field '{}' of '{owner}': '{terminal}' has no attribute '{}'",
                field.name(),
                field.path().attribute()
            )));
        }
        Ok(())
    }

    fn hops(&self, owner: &EntityTypeName, field: &FieldDescriptor) -> Result<Vec<Hop>> {
        let mut current = owner.clone();
        let mut hops = Vec::with_capacity(field.path().relations().len());
        for name in field.path().relations() {
            let relation = self.catalog.relation(&current, name).ok_or_else(|| {
                ScopeSearchError::schema(format!(
                    "Field '{}' of '{owner}': '{current}' has no relation '{name}'",
                    field.name()
                ))
            })?;
            hops.push(Hop {
                source: current.clone(),
                target: relation.target.clone(),
                reverse: relation.reverse.clone(),
                junction: relation
                    .junction()
                    .map(|(junction, side)| (junction.to_string(), side)),
            });
            current = relation.target.clone();
        }
        Ok(hops)
    }
}

/// One relation hop of a resolved field path.
#[derive(Debug, Clone)]
struct Hop {
    source: EntityTypeName,
    target: EntityTypeName,
    reverse: String,
    junction: Option<(String, JunctionSide)>,
}

/// Reverse relation names leading from the model reached after `depth` hops
/// back to the start of the path.
fn reverse_of(hops: &[Hop], depth: usize) -> Vec<String> {
    hops[..depth].iter().rev().map(|hop| hop.reverse.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::value::ValueKind;

    fn name(s: &str) -> EntityTypeName {
        EntityTypeName::parse(s).unwrap()
    }

    fn catalog() -> Arc<ModelCatalog> {
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
            .many_to_many(
                &name("cabinets.cabinet"),
                "documents",
                &name("documents.document"),
                "cabinets",
            )
            .unwrap();
        catalog
            .foreign_key(
                &name("cabinets.cabinet"),
                "parent",
                &name("cabinets.cabinet"),
                "children",
            )
            .unwrap();
        Arc::new(catalog)
    }

    fn registry() -> Registry {
        let mut registry = Registry::new(catalog());
        let doc = EntityType::builder(name("documents.document"))
            .field(FieldDescriptor::new("title").unwrap())
            .field(FieldDescriptor::new("tags.name").unwrap())
            .field(FieldDescriptor::new("cabinets.parent.label").unwrap())
            .alias(name("documents.document_proxy"))
            .build()
            .unwrap();
        registry.register(doc).unwrap();
        registry
    }

    #[test]
    fn test_register_and_lookup_alias() {
        let registry = registry();
        let by_name = registry.get(&name("documents.document")).unwrap();
        let by_alias = registry.get(&name("documents.document_proxy")).unwrap();
        assert!(Arc::ptr_eq(by_name, by_alias));
        assert!(registry.is_registered(&name("documents.document")));
        assert!(!registry.is_registered(&name("documents.document_proxy")));
        assert!(registry.get(&name("tags.tag")).is_err());
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let mut registry = registry();
        let again = EntityType::builder(name("documents.document"))
            .field(FieldDescriptor::new("title").unwrap())
            .build()
            .unwrap();
        assert!(registry.register(again).is_err());
        assert_eq!(
            registry
                .get(&name("documents.document"))
                .unwrap()
                .fields()
                .len(),
            3
        );
    }

    #[test]
    fn test_unresolvable_field_rejected() {
        let mut registry = Registry::new(catalog());
        let tag = EntityType::builder(name("tags.tag"))
            .field(FieldDescriptor::new("documents.missing").unwrap())
            .build()
            .unwrap();
        assert!(registry.register(tag).is_err());

        let tag = EntityType::builder(name("tags.tag"))
            .field(FieldDescriptor::new("owner.name").unwrap())
            .build()
            .unwrap();
        assert!(registry.register(tag).is_err());
    }

    #[test]
    fn test_reverse_path() {
        let registry = registry();
        let doc = name("documents.document");
        assert!(registry.reverse_path(&doc, "title").unwrap().is_empty());
        assert_eq!(registry.reverse_path(&doc, "tags.name").unwrap(), vec!["documents"]);
        assert_eq!(
            registry.reverse_path(&doc, "cabinets.parent.label").unwrap(),
            vec!["children", "documents"]
        );
        assert_eq!(
            registry.related_entity_type(&doc, "tags.name").unwrap(),
            Some(name("tags.tag"))
        );
    }

    #[test]
    fn test_related_targets_include_intermediate_hops() {
        let registry = registry();
        let targets = registry.related_targets().unwrap();

        let paths: Vec<(String, Vec<String>)> = targets
            .iter()
            .map(|t| (t.related.to_string(), t.reverse_path.clone()))
            .collect();
        assert!(paths.contains(&("tags.tag".to_string(), vec!["documents".to_string()])));
        assert!(paths.contains(&("cabinets.cabinet".to_string(), vec!["documents".to_string()])));
        assert!(paths.contains(&(
            "cabinets.cabinet".to_string(),
            vec!["children".to_string(), "documents".to_string()]
        )));
    }

    #[test]
    fn test_junction_bindings_orient_sides() {
        let registry = registry();
        let bindings = registry.junction_bindings().unwrap();

        let tags = bindings
            .iter()
            .find(|b| b.junction == "documents.document_tags")
            .unwrap();
        assert_eq!(tags.left, name("documents.document"));
        assert_eq!(tags.right, name("tags.tag"));
        assert!(tags.left_to_owner.is_empty());
        assert_eq!(tags.right_to_owner, vec!["documents"]);

        // Document -> cabinets crosses the cabinet junction from its right side.
        let cabinets = bindings
            .iter()
            .find(|b| b.junction == "cabinets.cabinet_documents")
            .unwrap();
        assert_eq!(cabinets.left, name("cabinets.cabinet"));
        assert_eq!(cabinets.right, name("documents.document"));
        assert_eq!(cabinets.left_to_owner, vec!["documents"]);
        assert!(cabinets.right_to_owner.is_empty());
    }
}
