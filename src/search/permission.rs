//! Permission restriction of search results.

use std::fmt;

use ahash::{AHashMap, AHashSet};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::schema::{EntityId, Permission};
use crate::search::result::ResultSet;

/// The identity a search runs on behalf of.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Actor {
    id: String,
}

impl Actor {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Actor { id: id.into() }
    }

    /// The actor of unauthenticated requests.
    pub fn anonymous() -> Self {
        Actor::new("anonymous")
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// The permission system, seen from the search subsystem.
///
/// The engine calls [`restrict`](PermissionChecker::restrict) once per search,
/// on the fully resolved result set, and only for entity types that declare a
/// permission.
pub trait PermissionChecker: Send + Sync + fmt::Debug {
    /// Keep the results `actor` may see under `permission`, in order.
    fn restrict(&self, results: ResultSet, permission: &Permission, actor: &Actor) -> Result<ResultSet>;
}

/// Permission checker that lets everything through.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PermissionChecker for AllowAll {
    fn restrict(&self, results: ResultSet, _permission: &Permission, _actor: &Actor) -> Result<ResultSet> {
        Ok(results)
    }
}

/// What an actor was granted for one permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Every entity.
    All,
    /// Only the listed entities.
    Objects(AHashSet<EntityId>),
}

/// Permission checker backed by explicit grants.
///
/// Actors without a grant for a permission see nothing.
#[derive(Debug, Default)]
pub struct GrantPermissions {
    grants: RwLock<AHashMap<(String, Permission), Grant>>,
}

impl GrantPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant `permission` on every entity.
    pub fn grant_all(&self, actor: &Actor, permission: &Permission) {
        self.grants
            .write()
            .insert((actor.id().to_string(), permission.clone()), Grant::All);
    }

    /// Grant `permission` on specific entities, adding to earlier object grants.
    pub fn grant_objects<I: IntoIterator<Item = EntityId>>(
        &self,
        actor: &Actor,
        permission: &Permission,
        ids: I,
    ) {
        let mut grants = self.grants.write();
        let grant = grants
            .entry((actor.id().to_string(), permission.clone()))
            .or_insert_with(|| Grant::Objects(AHashSet::new()));
        if let Grant::Objects(objects) = grant {
            objects.extend(ids);
        }
    }

    /// Withdraw every grant of `permission` from `actor`.
    pub fn revoke(&self, actor: &Actor, permission: &Permission) {
        self.grants
            .write()
            .remove(&(actor.id().to_string(), permission.clone()));
    }
}

impl PermissionChecker for GrantPermissions {
    fn restrict(&self, mut results: ResultSet, permission: &Permission, actor: &Actor) -> Result<ResultSet> {
        let grants = self.grants.read();
        match grants.get(&(actor.id().to_string(), permission.clone())) {
            Some(Grant::All) => {}
            Some(Grant::Objects(objects)) => results.retain(|id| objects.contains(&id)),
            None => {
                log::debug!("actor '{actor}' has no grant for '{permission}'");
                results = ResultSet::new();
            }
        }
        Ok(results)
    }
}
