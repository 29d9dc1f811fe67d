//! Scope query composition.
//!
//! A scope is one unscoped sub-query: a map of field name to raw value plus a
//! match-all flag. Composing a scope tokenizes every selected field value,
//! builds one predicate per field and joins them with AND (`match_all`) or OR.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::SearchConfig;
use crate::error::Result;
use crate::query::field::FieldQueryBuilder;
use crate::query::predicate::{Predicate, ScopeFilter};
use crate::query::tokenizer::tokenize;
use crate::schema::{EntityType, FieldDescriptor, ModelCatalog};

/// Reserved field key binding one free-text value to the priority fields.
pub const ANY_FIELD: &str = "q";

/// How the values of a scope are bound to fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// One value (under [`ANY_FIELD`]) searched across the priority fields.
    FreeText,
    /// Each value searched in its own field.
    Structured,
}

/// One unscoped sub-query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeQuery {
    pub match_all: bool,
    pub fields: BTreeMap<String, String>,
}

impl ScopeQuery {
    pub fn new(match_all: bool) -> Self {
        ScopeQuery {
            match_all,
            fields: BTreeMap::new(),
        }
    }

    /// Builder: add a field value.
    pub fn with_field<F: Into<String>, V: Into<String>>(mut self, field: F, value: V) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// The free-text value, if this scope is a free-text query.
    pub fn free_text(&self) -> Option<&str> {
        self.fields.get(ANY_FIELD).map(String::as_str)
    }

    /// The binding mode implied by the keys present.
    pub fn mode(&self) -> QueryMode {
        if self.fields.contains_key(ANY_FIELD) {
            QueryMode::FreeText
        } else {
            QueryMode::Structured
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Combines per-field predicates into one predicate per scope.
#[derive(Debug, Clone)]
pub struct ScopeQueryComposer {
    builder: FieldQueryBuilder,
    priority_names: Vec<String>,
    free_text_limit: usize,
}

impl ScopeQueryComposer {
    pub fn new(builder: FieldQueryBuilder, priority_names: Vec<String>, free_text_limit: usize) -> Self {
        ScopeQueryComposer {
            builder,
            priority_names,
            free_text_limit,
        }
    }

    /// Create a composer from the search configuration.
    pub fn from_config(config: &SearchConfig, array_membership: bool) -> Self {
        ScopeQueryComposer::new(
            FieldQueryBuilder::new(array_membership),
            config.priority_field_names.clone(),
            config.free_text_field_limit,
        )
    }

    /// Pick the fields a scope is evaluated against, each with its raw value.
    ///
    /// Free-text scopes bind their value to the ranked priority subset only.
    /// Structured scopes use the registered fields present with a non-empty
    /// value; unknown names are skipped.
    pub fn select_fields<'e, 's>(
        &self,
        entity: &'e EntityType,
        scope: &'s ScopeQuery,
        mode: QueryMode,
    ) -> Vec<(&'e FieldDescriptor, &'s str)> {
        match mode {
            QueryMode::FreeText => match scope.free_text() {
                Some(value) if !value.trim().is_empty() => entity
                    .free_text_fields(&self.priority_names, self.free_text_limit)
                    .into_iter()
                    .map(|field| (field, value))
                    .collect(),
                _ => Vec::new(),
            },
            QueryMode::Structured => scope
                .fields
                .iter()
                .filter(|(_, value)| !value.trim().is_empty())
                .filter_map(|(name, value)| entity.field(name).map(|f| (f, value.as_str())))
                .collect(),
        }
    }

    /// Compose the predicate of one scope.
    ///
    /// Fields whose value yields no term are skipped, never treated as
    /// "match nothing". When no field yields a predicate the result is
    /// [`ScopeFilter::MatchNone`].
    pub fn compose(
        &self,
        catalog: &ModelCatalog,
        entity: &EntityType,
        scope: &ScopeQuery,
        mode: QueryMode,
    ) -> Result<ScopeFilter> {
        let mut predicates = Vec::new();
        for (field, value) in self.select_fields(entity, scope, mode) {
            let terms = tokenize(value);
            if terms.is_effectively_empty() {
                continue;
            }
            let kind = field.value_kind(catalog, entity.name())?;
            if let Some(predicate) = self.builder.build(field, kind, &terms) {
                predicates.push(predicate);
            }
        }

        Ok(match Predicate::combine(predicates, scope.match_all) {
            Some(predicate) => ScopeFilter::Predicate(predicate),
            None => ScopeFilter::MatchNone,
        })
    }
}
