//! Searchable field descriptors.
//!
//! A field is addressed by a dotted path. A path with a single segment names a
//! *direct* attribute of the entity; a longer path traverses one relation per
//! leading segment and ends at an attribute of the model reached (a *related*
//! field). The split drives both predicate building and reactive indexing.

use std::fmt;
use std::sync::{Arc, OnceLock};

use uuid::Uuid;

use crate::error::{Result, ScopeSearchError};
use crate::schema::model::ModelCatalog;
use crate::schema::name::EntityTypeName;
use crate::schema::value::{FieldValue, ValueKind};

/// Separator between relation hops in a field path.
pub const PATH_SEPARATOR: char = '.';

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse a dotted path. Every segment must be non-empty.
    pub fn parse(path: &str) -> Result<Self> {
        let segments: Vec<String> = path.split(PATH_SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(ScopeSearchError::schema(format!(
                "Invalid field path '{path}'"
            )));
        }
        Ok(FieldPath { segments })
    }

    /// True when the path traverses at least one relation.
    pub fn is_related(&self) -> bool {
        self.segments.len() > 1
    }

    /// The relation hops, in traversal order.
    pub fn relations(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    /// The terminal attribute.
    pub fn attribute(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Query-time transformation of one search term.
#[derive(Clone)]
pub struct TermTransform(Arc<dyn Fn(&str) -> String + Send + Sync>);

impl TermTransform {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        TermTransform(Arc::new(f))
    }

    pub fn apply(&self, term: &str) -> String {
        (self.0)(term)
    }

    /// Canonicalise identifier terms: anything that parses as a UUID is
    /// rewritten to its hyphenated lowercase form, other terms pass through.
    pub fn canonical_uuid() -> Self {
        TermTransform::new(canonicalize_uuid)
    }

    /// Lowercase every term.
    pub fn lowercase() -> Self {
        TermTransform::new(|term| term.to_lowercase())
    }
}

impl fmt::Debug for TermTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TermTransform(<fn>)")
    }
}

/// Index-time transformation of one stored value.
#[derive(Clone)]
pub struct ValueTransform(Arc<dyn Fn(&FieldValue) -> String + Send + Sync>);

impl ValueTransform {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&FieldValue) -> String + Send + Sync + 'static,
    {
        ValueTransform(Arc::new(f))
    }

    pub fn apply(&self, value: &FieldValue) -> String {
        (self.0)(value)
    }

    /// Index values in canonical UUID form when they parse as one.
    pub fn canonical_uuid() -> Self {
        ValueTransform::new(|value| canonicalize_uuid(&value.to_string()))
    }
}

impl fmt::Debug for ValueTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ValueTransform(<fn>)")
    }
}

fn canonicalize_uuid(text: &str) -> String {
    match Uuid::parse_str(text.trim()) {
        Ok(uuid) => uuid.hyphenated().to_string(),
        Err(_) => text.to_string(),
    }
}

/// Metadata describing one searchable field.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    path: FieldPath,
    name: String,
    label: Option<String>,
    term_transform: Option<TermTransform>,
    value_transform: Option<ValueTransform>,
    free_text_rank: Option<u32>,
    value_kind: OnceLock<ValueKind>,
}

impl FieldDescriptor {
    /// Create a descriptor for a dotted field path. The path doubles as the
    /// field name used in queries.
    pub fn new(path: &str) -> Result<Self> {
        Ok(FieldDescriptor {
            path: FieldPath::parse(path)?,
            name: path.to_string(),
            label: None,
            term_transform: None,
            value_transform: None,
            free_text_rank: None,
            value_kind: OnceLock::new(),
        })
    }

    /// Set the display label.
    pub fn with_label<S: Into<String>>(mut self, label: S) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the query-time term transformation.
    pub fn with_term_transform(mut self, transform: TermTransform) -> Self {
        self.term_transform = Some(transform);
        self
    }

    /// Set the index-time value transformation.
    pub fn with_value_transform(mut self, transform: ValueTransform) -> Self {
        self.value_transform = Some(transform);
        self
    }

    /// Include the field in free-text queries. Lower ranks come first.
    pub fn with_free_text_rank(mut self, rank: u32) -> Self {
        self.free_text_rank = Some(rank);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// The display label, falling back to the field name.
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    pub fn term_transform(&self) -> Option<&TermTransform> {
        self.term_transform.as_ref()
    }

    pub fn value_transform(&self) -> Option<&ValueTransform> {
        self.value_transform.as_ref()
    }

    pub fn free_text_rank(&self) -> Option<u32> {
        self.free_text_rank
    }

    /// True when the field traverses at least one relation.
    pub fn is_related(&self) -> bool {
        self.path.is_related()
    }

    /// The underlying value kind, resolved against the catalog on first use.
    pub fn value_kind(&self, catalog: &ModelCatalog, owner: &EntityTypeName) -> Result<ValueKind> {
        if let Some(kind) = self.value_kind.get() {
            return Ok(*kind);
        }

        let terminal = walk_path(catalog, owner, &self.path)?
            .last()
            .cloned()
            .unwrap_or_else(|| owner.clone());
        let kind = catalog
            .attribute_kind(&terminal, self.path.attribute())
            .ok_or_else(|| {
                ScopeSearchError::schema(format!(
                    "Field '{}' of '{owner}' ends at unknown attribute '{}' of '{terminal}'",
                    self.name,
                    self.path.attribute()
                ))
            })?;
        Ok(*self.value_kind.get_or_init(|| kind))
    }
}

/// Follow the relation hops of `path` from `owner`, returning the model
/// reached after each hop.
pub(crate) fn walk_path(
    catalog: &ModelCatalog,
    owner: &EntityTypeName,
    path: &FieldPath,
) -> Result<Vec<EntityTypeName>> {
    let mut current = owner.clone();
    let mut reached = Vec::with_capacity(path.relations().len());

    for hop in path.relations() {
        let relation = catalog.relation(&current, hop).ok_or_else(|| {
            ScopeSearchError::schema(format!(
                "Field path '{path}' of '{owner}': '{current}' has no relation '{hop}'"
            ))
        })?;
        current = relation.target.clone();
        reached.push(current.clone());
    }

    Ok(reached)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_classification() {
        let direct = FieldPath::parse("title").unwrap();
        assert!(!direct.is_related());
        assert!(direct.relations().is_empty());
        assert_eq!(direct.attribute(), "title");

        let related = FieldPath::parse("cabinets.parent.label").unwrap();
        assert!(related.is_related());
        assert_eq!(related.relations(), ["cabinets", "parent"]);
        assert_eq!(related.attribute(), "label");
    }

    #[test]
    fn test_invalid_paths() {
        assert!(FieldPath::parse("").is_err());
        assert!(FieldPath::parse("tags.").is_err());
        assert!(FieldPath::parse("tags..name").is_err());
    }

    #[test]
    fn test_canonical_uuid_transform() {
        let transform = TermTransform::canonical_uuid();
        assert_eq!(
            transform.apply("67E5504410B1426F9247BB680E5FE0C8"),
            "67e55044-10b1-426f-9247-bb680e5fe0c8"
        );
        assert_eq!(transform.apply("invoice"), "invoice");
    }

    #[test]
    fn test_value_kind_is_resolved_lazily() {
        let mut catalog = ModelCatalog::new();
        let doc = EntityTypeName::parse("documents.document").unwrap();
        let tag = EntityTypeName::parse("tags.tag").unwrap();
        catalog
            .define_model(&doc, [("keywords", ValueKind::List)])
            .unwrap();
        catalog.define_model(&tag, [("name", ValueKind::Text)]).unwrap();
        catalog.many_to_many(&doc, "tags", &tag, "documents").unwrap();

        let keywords = FieldDescriptor::new("keywords").unwrap();
        assert_eq!(keywords.value_kind(&catalog, &doc).unwrap(), ValueKind::List);

        let tag_name = FieldDescriptor::new("tags.name").unwrap();
        assert_eq!(tag_name.value_kind(&catalog, &doc).unwrap(), ValueKind::Text);

        let missing = FieldDescriptor::new("tags.color").unwrap();
        assert!(missing.value_kind(&catalog, &doc).is_err());
    }
}
