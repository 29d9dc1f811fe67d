//! Search engine resolving scope trees.
//!
//! A search runs through four stages: the wire query is decoded into a
//! [`QueryTree`], the result scope is resolved recursively (scopes through the
//! backend, operators by combining their operands), the resolved set is
//! restricted once by the permission system and finally truncated.

use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::{Result, ScopeSearchError};
use crate::query::{Combinator, QueryTree, WireQuery};
use crate::schema::{EntityType, EntityTypeName, Registry};
use crate::search::backend::{ScopeRequest, SearchBackend};
use crate::search::permission::{Actor, PermissionChecker};
use crate::search::result::ResultSet;

/// Resolves scoped searches against a backend.
#[derive(Debug, Clone)]
pub struct SearchEngine {
    registry: Arc<Registry>,
    backend: Arc<dyn SearchBackend>,
    permissions: Arc<dyn PermissionChecker>,
    config: SearchConfig,
}

impl SearchEngine {
    /// Create a new search engine.
    pub fn new(
        registry: Arc<Registry>,
        backend: Arc<dyn SearchBackend>,
        permissions: Arc<dyn PermissionChecker>,
        config: SearchConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(SearchEngine {
            registry,
            backend,
            permissions,
            config,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backend(&self) -> &Arc<dyn SearchBackend> {
        &self.backend
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Run a search.
    ///
    /// `match_all_default` is the match-all mode of scopes that do not set
    /// their own. Returns identifiers of `entity_type` the actor may see, at
    /// most `max_results` of them.
    ///
    /// Unknown scope names, cycles, excessive nesting and scopes without a
    /// body fail with a configuration error. A backend that cannot run fails
    /// the search in strict mode and yields no results otherwise.
    pub fn search(
        &self,
        query: &WireQuery,
        entity_type: &EntityTypeName,
        actor: &Actor,
        match_all_default: bool,
    ) -> Result<ResultSet> {
        let entity = self.registry.get(entity_type)?;
        if query.is_empty() {
            log::debug!("empty query on '{entity_type}'");
            return Ok(ResultSet::new());
        }

        let tree = QueryTree::decode(query, match_all_default)?;
        let mut path = Vec::new();
        let resolved = match self.resolve(&tree, entity, actor, &tree.result_scope, &mut path) {
            Ok(results) => results,
            Err(err) if err.is_backend_unavailable() && !self.config.strict => {
                log::error!("search on '{entity_type}' degraded to no results: {err}");
                return Ok(ResultSet::new());
            }
            Err(err) => return Err(err),
        };

        let mut results = match entity.permission() {
            Some(permission) => self.permissions.restrict(resolved, permission, actor)?,
            None => resolved,
        };
        results.truncate(self.config.max_results);
        log::debug!(
            "search on '{entity_type}' for '{actor}' returned {} results",
            results.len()
        );
        Ok(results)
    }

    /// Resolve one scope or operator. `path` holds the operators being
    /// resolved above this one.
    fn resolve(
        &self,
        tree: &QueryTree,
        entity: &EntityType,
        actor: &Actor,
        scope_id: &str,
        path: &mut Vec<String>,
    ) -> Result<ResultSet> {
        if let Some(scope) = tree.scopes.get(scope_id) {
            if scope.is_empty() {
                return Err(ScopeSearchError::configuration(format!(
                    "Scope '{scope_id}' has no query body"
                )));
            }
            log::debug!("resolving scope '{scope_id}'");
            return self.backend.execute_scope(&ScopeRequest {
                entity_type: entity,
                scope,
                actor,
            });
        }

        let Some(operator) = tree.operators.get(scope_id) else {
            return Err(ScopeSearchError::scope_not_found(scope_id));
        };
        if path.iter().any(|id| id == scope_id) {
            return Err(ScopeSearchError::configuration(format!(
                "Operator '{scope_id}' refers to itself through {}",
                path.join(" -> ")
            )));
        }
        if path.len() >= self.config.max_scope_depth {
            return Err(ScopeSearchError::configuration(format!(
                "Operator '{scope_id}' nests deeper than {} levels",
                self.config.max_scope_depth
            )));
        }

        log::debug!(
            "resolving operator '{scope_id}' = {} of {:?}",
            operator.combinator,
            operator.operands
        );
        path.push(scope_id.to_string());
        let mut combined: Option<ResultSet> = None;
        for operand in &operator.operands {
            let results = self.resolve(tree, entity, actor, operand, path)?;
            combined = Some(match combined {
                None => results,
                Some(acc) => match operator.combinator {
                    Combinator::And => acc.intersect(&results),
                    Combinator::Or => acc.union(&results),
                },
            });
        }
        path.pop();
        Ok(combined.unwrap_or_default())
    }
}
