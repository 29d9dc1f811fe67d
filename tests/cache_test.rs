//! Integration tests for the free-text result cache.

mod common;

use std::sync::Arc;

use common::{Library, ids};
use scopesearch::prelude::*;

fn cached_library(ttl_secs: u64) -> Library {
    Library::new(
        Arc::new(AllowAll),
        SearchConfig {
            cache_ttl_secs: ttl_secs,
            ..SearchConfig::default()
        },
    )
}

#[test]
fn test_cache_hit_matches_cache_miss() -> Result<()> {
    let library = cached_library(60);
    let tag = library.add_tag("alpha");
    library.add_document("alpha report", &[]);
    library.add_document("notes", &[&tag]);
    library.add_document("unrelated", &[]);

    let query = WireQuery::new().with("q", "alpha");
    let miss = library.search(&query)?;
    let cache = library.backend.cache().unwrap();
    assert_eq!(cache.len(), 1);

    let hit = library.search(&query)?;
    assert_eq!(hit, miss);
    assert_eq!(hit.len(), 2);
    assert_eq!(cache.len(), 1);
    Ok(())
}

#[test]
fn test_structured_scopes_are_not_cached() -> Result<()> {
    let library = cached_library(60);
    library.add_document("alpha", &[]);

    library.search(&WireQuery::new().with("title", "alpha"))?;
    assert!(library.backend.cache().unwrap().is_empty());
    Ok(())
}

#[test]
fn test_cache_entries_are_per_actor() -> Result<()> {
    let library = cached_library(60);
    library.add_document("alpha", &[]);

    let query = WireQuery::new().with("q", "alpha");
    library.search_as(&query, &Actor::new("alice"))?;
    library.search_as(&query, &Actor::new("bob"))?;
    assert_eq!(library.backend.cache().unwrap().len(), 2);
    Ok(())
}

#[test]
fn test_writes_do_not_invalidate_until_ttl_expires() -> Result<()> {
    let library = cached_library(60);
    let first = library.add_document("alpha one", &[]);

    let query = WireQuery::new().with("q", "alpha");
    assert_eq!(library.search(&query)?.ids(), &[first.id]);

    let second = library.add_document("alpha two", &[]);

    // The cached free-text answer is served until it expires.
    assert_eq!(library.search(&query)?.ids(), &[first.id]);
    // Structured scopes read the index directly.
    assert_eq!(
        library.search(&WireQuery::new().with("title", "alpha"))?.ids(),
        ids(&[&first, &second]).as_slice()
    );

    library.backend.cache().unwrap().clear();
    assert_eq!(
        library.search(&query)?.ids(),
        ids(&[&first, &second]).as_slice()
    );
    Ok(())
}

#[test]
fn test_zero_ttl_never_serves_stale_results() -> Result<()> {
    let library = cached_library(0);
    let first = library.add_document("alpha one", &[]);

    let query = WireQuery::new().with("q", "alpha");
    assert_eq!(library.search(&query)?.ids(), &[first.id]);

    let second = library.add_document("alpha two", &[]);
    assert_eq!(
        library.search(&query)?.ids(),
        ids(&[&first, &second]).as_slice()
    );
    Ok(())
}

#[test]
fn test_disabled_cache() -> Result<()> {
    let library = Library::new(
        Arc::new(AllowAll),
        SearchConfig {
            cache_enabled: false,
            ..SearchConfig::default()
        },
    );
    library.add_document("alpha", &[]);
    library.search(&WireQuery::new().with("q", "alpha"))?;
    assert!(library.backend.cache().is_none());
    Ok(())
}
