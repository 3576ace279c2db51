//! SnapshotCache freshness and invalidation against a manual clock.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{sample_snapshot, scope};
use taskflow_core::Resource;
use taskflow_store::{CacheConfig, ManualClock, Scope, SnapshotCache};

fn cache(config: CacheConfig) -> (Arc<ManualClock>, SnapshotCache) {
    let clock = Arc::new(ManualClock::new());
    let cache = SnapshotCache::new(config, clock.clone());
    (clock, cache)
}

#[test]
fn test_fresh_until_ttl_elapses() {
    let (clock, cache) = cache(CacheConfig::new().with_ttl(Duration::from_secs(60)));
    assert!(cache.is_stale(&scope()));

    cache.put(&scope(), &sample_snapshot());
    assert!(!cache.is_stale(&scope()));
    assert_eq!(cache.get(&scope()), Some(sample_snapshot()));

    clock.advance(Duration::from_secs(61));
    assert!(cache.is_stale(&scope()));
    assert_eq!(cache.get(&scope()), None);
}

#[test]
fn test_shortest_resource_ttl_decides() {
    let config = CacheConfig::new()
        .with_ttl(Duration::from_secs(300))
        .with_resource_ttl(Resource::Actions, Duration::from_secs(10));
    let (clock, cache) = cache(config);
    cache.put(&scope(), &sample_snapshot());

    clock.advance(Duration::from_secs(11));
    assert!(cache.is_stale(&scope()));
    assert!(cache.get(&scope()).is_none());
}

#[test]
fn test_invalidate_single_resource() {
    let (_clock, cache) = cache(CacheConfig::new());
    cache.put(&scope(), &sample_snapshot());

    cache.invalidate(&scope(), &[Resource::Dependencies]);
    assert!(cache.is_stale(&scope()));
    assert_eq!(cache.inner().len(), 2);
}

#[test]
fn test_scopes_do_not_share_entries() {
    let (_clock, cache) = cache(CacheConfig::new());
    let other = Scope::new("acme", "bob");
    cache.put(&scope(), &sample_snapshot());

    assert!(cache.is_stale(&other));
    assert_eq!(cache.invalidate_scope(&other).unwrap(), 0);
    assert_eq!(cache.invalidate_scope(&scope()).unwrap(), 3);
    assert!(cache.inner().is_empty());
}

#[test]
fn test_metrics_count_hits_and_misses() {
    let (_clock, cache) = cache(CacheConfig::new());
    assert!(cache.get(&scope()).is_none());
    cache.put(&scope(), &sample_snapshot());
    assert!(cache.get(&scope()).is_some());

    let metrics = cache.inner().metrics();
    assert_eq!(metrics.hits, 3);
    assert_eq!(metrics.misses, 1);
    assert_eq!(metrics.entries, 3);
}
