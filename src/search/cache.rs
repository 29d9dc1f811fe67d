//! Time-limited cache of free-text results.
//!
//! Entries expire after a fixed TTL and are never invalidated by writes: a
//! search may keep returning a stale identifier list until its entry expires.
//! Concurrent writers for one key always store equivalent values, so the last
//! write wins.

use std::hash::{BuildHasher, Hash, Hasher};
use std::time::{Duration, Instant};

use ahash::{AHashMap, RandomState};
use parking_lot::RwLock;

use crate::query::ScopeQuery;
use crate::schema::{EntityId, EntityTypeName};
use crate::search::permission::Actor;
use crate::search::result::ResultSet;

/// Fixed hasher seeds, so keys do not depend on per-process random state.
const KEY_SEEDS: [u64; 4] = [
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
];

fn key_hasher() -> impl Hasher {
    RandomState::with_seeds(KEY_SEEDS[0], KEY_SEEDS[1], KEY_SEEDS[2], KEY_SEEDS[3]).build_hasher()
}

#[derive(Debug, Clone)]
struct CacheEntry {
    ids: Vec<EntityId>,
    inserted: Instant,
}

/// Shared result cache keyed by a deterministic query hash.
#[derive(Debug)]
pub struct ResultCache {
    ttl: Duration,
    entries: RwLock<AHashMap<u64, CacheEntry>>,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        ResultCache {
            ttl,
            entries: RwLock::new(AHashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Compute the cache key of a scope.
    ///
    /// The key covers the entity type, the actor, the match-all mode and the
    /// query entries in sorted order. Hashing uses fixed seeds, so equal
    /// inputs give equal keys in every cache instance.
    pub fn key(entity_type: &EntityTypeName, actor: &Actor, scope: &ScopeQuery) -> u64 {
        let mut hasher = key_hasher();
        entity_type.to_string().hash(&mut hasher);
        actor.id().hash(&mut hasher);
        scope.match_all.hash(&mut hasher);
        // BTreeMap iteration is already sorted by field name.
        for (field, value) in &scope.fields {
            field.hash(&mut hasher);
            value.hash(&mut hasher);
        }
        hasher.finish()
    }

    /// Look up a live entry.
    pub fn get(&self, key: u64) -> Option<ResultSet> {
        let entries = self.entries.read();
        let entry = entries.get(&key)?;
        if entry.inserted.elapsed() < self.ttl {
            Some(ResultSet::from_ids(entry.ids.iter().copied()))
        } else {
            None
        }
    }

    /// Store a result, replacing any previous entry for the key.
    pub fn insert(&self, key: u64, results: &ResultSet) {
        let mut entries = self.entries.write();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.inserted.elapsed() < ttl);
        entries.insert(
            key,
            CacheEntry {
                ids: results.ids().to_vec(),
                inserted: Instant::now(),
            },
        );
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::ANY_FIELD;

    fn doc_type() -> EntityTypeName {
        EntityTypeName::parse("documents.document").unwrap()
    }

    #[test]
    fn test_key_uses_fixed_seeds() {
        let scope = ScopeQuery::new(false).with_field(ANY_FIELD, "alpha");
        let alice = Actor::new("alice");

        let mut hasher =
            RandomState::with_seeds(KEY_SEEDS[0], KEY_SEEDS[1], KEY_SEEDS[2], KEY_SEEDS[3]).build_hasher();
        "documents.document".to_string().hash(&mut hasher);
        "alice".hash(&mut hasher);
        false.hash(&mut hasher);
        ANY_FIELD.to_string().hash(&mut hasher);
        "alpha".to_string().hash(&mut hasher);

        assert_eq!(ResultCache::key(&doc_type(), &alice, &scope), hasher.finish());
    }

    #[test]
    fn test_key_is_deterministic_and_discriminating() {
        let scope = ScopeQuery::new(false).with_field(ANY_FIELD, "alpha");
        let alice = Actor::new("alice");
        let key = ResultCache::key(&doc_type(), &alice, &scope);

        assert_eq!(key, ResultCache::key(&doc_type(), &alice, &scope.clone()));
        assert_ne!(key, ResultCache::key(&doc_type(), &Actor::new("bob"), &scope));
        assert_ne!(
            key,
            ResultCache::key(&doc_type(), &alice, &ScopeQuery::new(true).with_field(ANY_FIELD, "alpha"))
        );
        assert_ne!(
            key,
            ResultCache::key(
                &EntityTypeName::parse("tags.tag").unwrap(),
                &alice,
                &scope
            )
        );
    }

    #[test]
    fn test_get_and_insert() {
        let cache = ResultCache::new(Duration::from_secs(30));
        assert!(cache.get(7).is_none());

        cache.insert(7, &ResultSet::from_ids([3, 1]));
        assert_eq!(cache.get(7).unwrap().ids(), &[3, 1]);
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_entries_expire() {
        let cache = ResultCache::new(Duration::ZERO);
        cache.insert(7, &ResultSet::from_ids([1]));
        assert!(cache.get(7).is_none());
    }
}
