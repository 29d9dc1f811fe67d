//! Model catalog: the storage layer's attributes and relationships.
//!
//! The catalog is what field paths are resolved against. Declaring a relation
//! always declares its reverse accessor on the target model, so every hop of
//! a path can be walked in both directions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeSearchError};
use crate::schema::name::EntityTypeName;
use crate::schema::value::ValueKind;

/// Which side of a junction a many-to-many accessor lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JunctionSide {
    /// The model that declared the many-to-many field.
    Left,
    /// The target model (reverse accessor).
    Right,
}

/// How a relation reaches its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Many-to-one. The source record stores the target id.
    ForeignKey,
    /// One-to-many. The reverse accessor of a foreign key named `field`.
    ReverseForeignKey { field: String },
    /// Many-to-many through a junction table.
    ManyToMany { junction: String, side: JunctionSide },
}

/// A named relation from one model to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub target: EntityTypeName,
    pub kind: RelationKind,
    /// Name of the relation on `target` that leads back.
    pub reverse: String,
}

impl Relation {
    /// The junction this relation goes through, if any.
    pub fn junction(&self) -> Option<(&str, JunctionSide)> {
        match &self.kind {
            RelationKind::ManyToMany { junction, side } => Some((junction.as_str(), *side)),
            _ => None,
        }
    }
}

/// Attributes and relations of one model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub attributes: BTreeMap<String, ValueKind>,
    pub relations: BTreeMap<String, Relation>,
}

impl ModelDefinition {
    fn has_member(&self, name: &str) -> bool {
        self.attributes.contains_key(name) || self.relations.contains_key(name)
    }
}

/// A many-to-many link table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunctionDefinition {
    pub name: String,
    pub left: EntityTypeName,
    pub right: EntityTypeName,
    /// Accessor on `left` leading to `right`.
    pub left_relation: String,
    /// Accessor on `right` leading to `left`.
    pub right_relation: String,
}

/// Catalog of every model known to the storage layer.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: BTreeMap<EntityTypeName, ModelDefinition>,
    junctions: BTreeMap<String, JunctionDefinition>,
}

impl ModelCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a model with its attributes.
    pub fn define_model<I, S>(&mut self, name: &EntityTypeName, attributes: I) -> Result<()>
    where
        I: IntoIterator<Item = (S, ValueKind)>,
        S: Into<String>,
    {
        if self.models.contains_key(name) {
            return Err(ScopeSearchError::schema(format!(
                "Model '{name}' already exists"
            )));
        }

        let mut model = ModelDefinition::default();
        for (attribute, kind) in attributes {
            let attribute = attribute.into();
            if attribute.is_empty() || attribute.contains('.') {
                return Err(ScopeSearchError::schema(format!(
                    "Invalid attribute name '{attribute}' on model '{name}'"
                )));
            }
            model.attributes.insert(attribute, kind);
        }
        self.models.insert(name.clone(), model);
        Ok(())
    }

    /// Declare a foreign key `source.name -> target` with reverse accessor
    /// `target.reverse`.
    pub fn foreign_key(
        &mut self,
        source: &EntityTypeName,
        name: &str,
        target: &EntityTypeName,
        reverse: &str,
    ) -> Result<()> {
        self.check_free(source, name)?;
        self.check_free(target, reverse)?;
        if source == target && name == reverse {
            return Err(ScopeSearchError::schema(format!(
                "Relation '{name}' on '{source}' cannot be its own reverse"
            )));
        }

        self.insert_relation(
            source,
            Relation {
                name: name.to_string(),
                target: target.clone(),
                kind: RelationKind::ForeignKey,
                reverse: reverse.to_string(),
            },
        );
        self.insert_relation(
            target,
            Relation {
                name: reverse.to_string(),
                target: source.clone(),
                kind: RelationKind::ReverseForeignKey {
                    field: name.to_string(),
                },
                reverse: name.to_string(),
            },
        );
        Ok(())
    }

    /// Declare a many-to-many field `source.name <-> target.reverse`.
    ///
    /// Returns the name of the implied junction, `{source}_{name}`.
    pub fn many_to_many(
        &mut self,
        source: &EntityTypeName,
        name: &str,
        target: &EntityTypeName,
        reverse: &str,
    ) -> Result<String> {
        self.check_free(source, name)?;
        self.check_free(target, reverse)?;
        if source == target && name == reverse {
            return Err(ScopeSearchError::schema(format!(
                "Relation '{name}' on '{source}' cannot be its own reverse"
            )));
        }

        let junction = format!("{source}_{name}");
        self.insert_relation(
            source,
            Relation {
                name: name.to_string(),
                target: target.clone(),
                kind: RelationKind::ManyToMany {
                    junction: junction.clone(),
                    side: JunctionSide::Left,
                },
                reverse: reverse.to_string(),
            },
        );
        self.insert_relation(
            target,
            Relation {
                name: reverse.to_string(),
                target: source.clone(),
                kind: RelationKind::ManyToMany {
                    junction: junction.clone(),
                    side: JunctionSide::Right,
                },
                reverse: name.to_string(),
            },
        );
        self.junctions.insert(
            junction.clone(),
            JunctionDefinition {
                name: junction.clone(),
                left: source.clone(),
                right: target.clone(),
                left_relation: name.to_string(),
                right_relation: reverse.to_string(),
            },
        );
        Ok(junction)
    }

    /// Get a model by name.
    pub fn model(&self, name: &EntityTypeName) -> Option<&ModelDefinition> {
        self.models.get(name)
    }

    /// Get a relation of a model.
    pub fn relation(&self, model: &EntityTypeName, relation: &str) -> Option<&Relation> {
        self.models.get(model)?.relations.get(relation)
    }

    /// Get the declared kind of an attribute.
    pub fn attribute_kind(&self, model: &EntityTypeName, attribute: &str) -> Option<ValueKind> {
        self.models.get(model)?.attributes.get(attribute).copied()
    }

    /// Get a junction by name.
    pub fn junction(&self, name: &str) -> Option<&JunctionDefinition> {
        self.junctions.get(name)
    }

    /// Iterate over all model names.
    pub fn model_names(&self) -> impl Iterator<Item = &EntityTypeName> {
        self.models.keys()
    }

    /// Iterate over all junctions.
    pub fn junctions(&self) -> impl Iterator<Item = &JunctionDefinition> {
        self.junctions.values()
    }

    fn check_free(&self, model: &EntityTypeName, member: &str) -> Result<()> {
        let definition = self
            .models
            .get(model)
            .ok_or_else(|| ScopeSearchError::schema(format!("Unknown model '{model}'")))?;
        if member.is_empty() || member.contains('.') {
            return Err(ScopeSearchError::schema(format!(
                "Invalid relation name '{member}' on model '{model}'"
            )));
        }
        if definition.has_member(member) {
            return Err(ScopeSearchError::schema(format!(
                "Model '{model}' already has a member named '{member}'"
            )));
        }
        Ok(())
    }

    fn insert_relation(&mut self, model: &EntityTypeName, relation: Relation) {
        if let Some(definition) = self.models.get_mut(model) {
            definition.relations.insert(relation.name.clone(), relation);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> EntityTypeName {
        EntityTypeName::parse(s).unwrap()
    }

    fn catalog() -> ModelCatalog {
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
    }

    #[test]
    fn test_foreign_key_declares_reverse() {
        let mut catalog = catalog();
        catalog
            .foreign_key(
                &name("documents.document"),
                "cabinet",
                &name("cabinets.cabinet"),
                "documents",
            )
            .unwrap();

        let forward = catalog
            .relation(&name("documents.document"), "cabinet")
            .unwrap();
        assert_eq!(forward.kind, RelationKind::ForeignKey);
        assert_eq!(forward.reverse, "documents");

        let reverse = catalog
            .relation(&name("cabinets.cabinet"), "documents")
            .unwrap();
        assert_eq!(
            reverse.kind,
            RelationKind::ReverseForeignKey {
                field: "cabinet".to_string()
            }
        );
        assert_eq!(reverse.target, name("documents.document"));
    }

    #[test]
    fn test_many_to_many_declares_junction() {
        let mut catalog = catalog();
        let junction = catalog
            .many_to_many(&name("documents.document"), "tags", &name("tags.tag"), "documents")
            .unwrap();
        assert_eq!(junction, "documents.document_tags");

        let definition = catalog.junction(&junction).unwrap();
        assert_eq!(definition.left, name("documents.document"));
        assert_eq!(definition.right, name("tags.tag"));

        let reverse = catalog.relation(&name("tags.tag"), "documents").unwrap();
        assert_eq!(reverse.junction(), Some((junction.as_str(), JunctionSide::Right)));
    }

    #[test]
    fn test_member_name_clash() {
        let mut catalog = catalog();
        let result =
            catalog.foreign_key(&name("documents.document"), "title", &name("tags.tag"), "docs");
        assert!(result.is_err());

        let result = catalog.many_to_many(
            &name("documents.document"),
            "tags",
            &name("unknown.model"),
            "documents",
        );
        assert!(result.is_err());
    }
}
