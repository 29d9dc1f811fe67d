//! Entity type names and entity references.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScopeSearchError};

/// Identifier of one stored entity within its entity type.
pub type EntityId = u64;

/// A stable two-part entity type name, written `namespace.kind`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityTypeName {
    namespace: String,
    kind: String,
}

impl EntityTypeName {
    /// Create a name from its two parts.
    pub fn new<N: Into<String>, K: Into<String>>(namespace: N, kind: K) -> Result<Self> {
        let namespace = namespace.into();
        let kind = kind.into();

        if namespace.is_empty() || kind.is_empty() {
            return Err(ScopeSearchError::schema(format!(
                "Entity type name '{namespace}.{kind}' must have a namespace and a kind"
            )));
        }
        if namespace.contains('.') || kind.contains('.') {
            return Err(ScopeSearchError::schema(format!(
                "Entity type name '{namespace}.{kind}' must contain exactly one '.'"
            )));
        }

        Ok(EntityTypeName { namespace, kind })
    }

    /// Parse a `namespace.kind` string.
    pub fn parse(name: &str) -> Result<Self> {
        match name.split_once('.') {
            Some((namespace, kind)) => EntityTypeName::new(namespace, kind),
            None => Err(ScopeSearchError::schema(format!(
                "Entity type name '{name}' must be written as 'namespace.kind'"
            ))),
        }
    }

    /// The namespace half.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The kind half.
    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl fmt::Display for EntityTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.kind)
    }
}

impl FromStr for EntityTypeName {
    type Err = ScopeSearchError;

    fn from_str(s: &str) -> Result<Self> {
        EntityTypeName::parse(s)
    }
}

impl TryFrom<String> for EntityTypeName {
    type Error = ScopeSearchError;

    fn try_from(value: String) -> Result<Self> {
        EntityTypeName::parse(&value)
    }
}

impl From<EntityTypeName> for String {
    fn from(name: EntityTypeName) -> Self {
        name.to_string()
    }
}

/// A pointer to one stored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    pub entity_type: EntityTypeName,
    pub id: EntityId,
}

impl EntityRef {
    pub fn new(entity_type: EntityTypeName, id: EntityId) -> Self {
        EntityRef { entity_type, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_type_name() {
        let name = EntityTypeName::parse("documents.document").unwrap();
        assert_eq!(name.namespace(), "documents");
        assert_eq!(name.kind(), "document");
        assert_eq!(name.to_string(), "documents.document");
    }

    #[test]
    fn test_reject_malformed_names() {
        assert!(EntityTypeName::parse("documents").is_err());
        assert!(EntityTypeName::parse(".document").is_err());
        assert!(EntityTypeName::parse("documents.").is_err());
        assert!(EntityTypeName::parse("a.b.c").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let name = EntityTypeName::parse("tags.tag").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        assert_eq!(json, "\"tags.tag\"");

        let back: EntityTypeName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, name);
        assert!(serde_json::from_str::<EntityTypeName>("\"tags\"").is_err());
    }
}
