//! Index maintenance jobs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::schema::{EntityId, EntityRef};

/// Data a re-index pass must ignore because it is about to disappear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Exclusion {
    /// A related instance being deleted.
    Instance { entity: EntityRef },
    /// Junction pairs being removed, as `(left id, right id)`.
    Links {
        junction: String,
        pairs: Vec<(EntityId, EntityId)>,
    },
}

impl Exclusion {
    /// Check whether traversing `junction` from `left` to `right` is excluded.
    pub fn excludes_pair(&self, junction: &str, left: EntityId, right: EntityId) -> bool {
        match self {
            Exclusion::Links {
                junction: excluded,
                pairs,
            } => excluded == junction && pairs.contains(&(left, right)),
            Exclusion::Instance { .. } => false,
        }
    }

    /// Check whether an instance is excluded.
    pub fn excludes_instance(&self, entity: &EntityRef) -> bool {
        matches!(self, Exclusion::Instance { entity: excluded } if excluded == entity)
    }
}

/// One unit of index maintenance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum IndexJob {
    /// Rebuild the document of an entity.
    Index {
        entity: EntityRef,
        exclude: Option<Exclusion>,
    },
    /// Drop the document of an entity.
    Deindex { entity: EntityRef },
}

impl IndexJob {
    pub fn index(entity: EntityRef) -> Self {
        IndexJob::Index {
            entity,
            exclude: None,
        }
    }

    pub fn index_excluding(entity: EntityRef, exclude: Exclusion) -> Self {
        IndexJob::Index {
            entity,
            exclude: Some(exclude),
        }
    }

    pub fn deindex(entity: EntityRef) -> Self {
        IndexJob::Deindex { entity }
    }

    /// The entity whose document the job touches.
    pub fn entity(&self) -> &EntityRef {
        match self {
            IndexJob::Index { entity, .. } | IndexJob::Deindex { entity } => entity,
        }
    }
}

impl fmt::Display for IndexJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexJob::Index { entity, exclude: None } => write!(f, "index {entity}"),
            IndexJob::Index {
                entity,
                exclude: Some(_),
            } => write!(f, "index {entity} (with exclusion)"),
            IndexJob::Deindex { entity } => write!(f, "deindex {entity}"),
        }
    }
}
