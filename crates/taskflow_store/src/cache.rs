//! TTL cache in front of the authoritative store.
//!
//! A plain key to entry map, instantiated per controller. Keys are produced by
//! [`Scope::cache_key`], so the cache itself holds no notion of tenants.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use taskflow_core::{Resource, Snapshot};
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::{Result, StoreError};
use crate::identity::Scope;

/// Time source for staleness checks.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset: Mutex<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.base + offset
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub stored_at: Instant,
    pub ttl: Duration,
    pub hits: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub entries: usize,
}

impl CacheMetrics {
    /// Hits over lookups, in percent.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            return 0.0;
        }
        self.hits as f64 * 100.0 / total as f64
    }
}

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
}

impl<V> fmt::Debug for TtlCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("entries", &self.lock().entries.len())
            .field("max_entries", &self.max_entries)
            .finish()
    }
}

impl<V> TtlCache<V> {
    fn lock(&self) -> MutexGuard<'_, Inner<V>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new(max_entries: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            clock,
            max_entries: max_entries.max(1),
        }
    }

    pub fn is_stale(&self, entry: &CacheEntry<V>) -> bool {
        self.clock.now().saturating_duration_since(entry.stored_at) > entry.ttl
    }

    /// Fresh value for `key`. A stale entry is dropped and counts as a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let fresh = inner
            .entries
            .get(key)
            .map(|e| now.saturating_duration_since(e.stored_at) <= e.ttl);
        let value = match fresh {
            Some(true) => inner.entries.get_mut(key).map(|entry| {
                entry.hits += 1;
                entry.value.clone()
            }),
            Some(false) => {
                inner.entries.remove(key);
                debug!(key, "cache entry expired");
                None
            }
            None => None,
        };
        match value {
            Some(_) => inner.hits += 1,
            None => inner.misses += 1,
        }
        value
    }

    /// Entry for `key` without touching metrics, stale or not.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.lock().entries.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let stored_at = self.clock.now();
        let mut inner = self.lock();
        if !inner.entries.contains_key(&key) && inner.entries.len() >= self.max_entries {
            Self::evict_least_used(&mut inner);
        }
        inner.entries.insert(
            key,
            CacheEntry {
                value,
                stored_at,
                ttl,
                hits: 0,
            },
        );
    }

    /// Drops the least-hit tenth of the entries, at least one.
    fn evict_least_used(inner: &mut Inner<V>) {
        let count = (inner.entries.len() / 10).max(1);
        let mut ranked: Vec<(u64, Instant, String)> = inner
            .entries
            .iter()
            .map(|(k, e)| (e.hits, e.stored_at, k.clone()))
            .collect();
        ranked.sort();
        for (_, _, key) in ranked.into_iter().take(count) {
            inner.entries.remove(&key);
        }
        inner.evictions += count as u64;
        debug!(evicted = count, "cache full, evicted least-used entries");
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Drops every key matching the glob `pattern`.
    pub fn invalidate_pattern(&self, pattern: &str) -> Result<usize> {
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| StoreError::Config(format!("invalid cache pattern '{pattern}': {e}")))?;
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !pattern.matches(key));
        Ok(before - inner.entries.len())
    }

    /// Drops expired entries.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|_, e| now.saturating_duration_since(e.stored_at) <= e.ttl);
        before - inner.entries.len()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> CacheMetrics {
        let inner = self.lock();
        CacheMetrics {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            entries: inner.entries.len(),
        }
    }
}

fn part_of(snapshot: &Snapshot, resource: Resource) -> Snapshot {
    match resource {
        Resource::Tasks => Snapshot {
            tasks: snapshot.tasks.clone(),
            ..Default::default()
        },
        Resource::Actions => Snapshot {
            actions: snapshot.actions.clone(),
            ..Default::default()
        },
        Resource::Dependencies => Snapshot {
            dependencies: snapshot.dependencies.clone(),
            ..Default::default()
        },
    }
}

/// Per-resource snapshot cache for one or more scopes.
///
/// Each collection is cached under its own key and TTL. A read is served only when
/// every collection of the scope is fresh.
#[derive(Debug)]
pub struct SnapshotCache {
    cache: TtlCache<Snapshot>,
    config: CacheConfig,
}

impl SnapshotCache {
    pub fn new(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: TtlCache::new(config.max_entries, clock),
            config,
        }
    }

    pub fn get(&self, scope: &Scope) -> Option<Snapshot> {
        let mut merged = Snapshot::default();
        for resource in Resource::ALL {
            let part = self.cache.get(&scope.cache_key(resource))?;
            match resource {
                Resource::Tasks => merged.tasks = part.tasks,
                Resource::Actions => merged.actions = part.actions,
                Resource::Dependencies => merged.dependencies = part.dependencies,
            }
        }
        Some(merged)
    }

    pub fn put(&self, scope: &Scope, snapshot: &Snapshot) {
        for resource in Resource::ALL {
            self.cache.set(
                scope.cache_key(resource),
                part_of(snapshot, resource),
                self.config.ttl_for(resource),
            );
        }
    }

    pub fn invalidate(&self, scope: &Scope, resources: &[Resource]) {
        for resource in resources {
            self.cache.invalidate(&scope.cache_key(*resource));
        }
    }

    pub fn invalidate_scope(&self, scope: &Scope) -> Result<usize> {
        self.cache.invalidate_pattern(&scope.cache_pattern())
    }

    /// True when any collection of `scope` is missing or expired.
    pub fn is_stale(&self, scope: &Scope) -> bool {
        Resource::ALL.iter().any(|resource| {
            self.cache
                .entry(&scope.cache_key(*resource))
                .is_none_or(|entry| self.cache.is_stale(&entry))
        })
    }

    pub fn inner(&self) -> &TtlCache<Snapshot> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max: usize) -> (Arc<ManualClock>, TtlCache<u32>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::new(max, clock.clone());
        (clock, cache)
    }

    const FIVE_MIN: Duration = Duration::from_secs(300);

    #[test]
    fn test_get_after_set_then_stale() {
        let (clock, cache) = cache(10);
        cache.set("tasks:acme:p1", 7, FIVE_MIN);
        assert_eq!(cache.get("tasks:acme:p1"), Some(7));

        clock.advance(FIVE_MIN);
        let entry = cache.entry("tasks:acme:p1").unwrap();
        assert!(!cache.is_stale(&entry));

        clock.advance(Duration::from_secs(1));
        assert!(cache.is_stale(&entry));
        assert_eq!(cache.get("tasks:acme:p1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_metrics() {
        let (_, cache) = cache(10);
        cache.set("a", 1, FIVE_MIN);
        cache.get("a");
        cache.get("a");
        cache.get("b");
        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 2);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.entries, 1);
        assert!((metrics.hit_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_invalidate_pattern() {
        let (_, cache) = cache(10);
        cache.set("tasks:acme:p1", 1, FIVE_MIN);
        cache.set("actions:acme:p1", 2, FIVE_MIN);
        cache.set("tasks:globex:p1", 3, FIVE_MIN);
        assert_eq!(cache.invalidate_pattern("*:acme:*").unwrap(), 2);
        assert_eq!(cache.get("tasks:globex:p1"), Some(3));
        assert!(matches!(
            cache.invalidate_pattern("[unclosed"),
            Err(StoreError::Config(_))
        ));
    }

    #[test]
    fn test_eviction_drops_least_used() {
        let (_, cache) = cache(3);
        cache.set("a", 1, FIVE_MIN);
        cache.set("b", 2, FIVE_MIN);
        cache.set("c", 3, FIVE_MIN);
        cache.get("a");
        cache.get("c");
        cache.set("d", 4, FIVE_MIN);
        assert_eq!(cache.len(), 3);
        assert!(cache.entry("b").is_none());
        assert_eq!(cache.metrics().evictions, 1);
    }

    #[test]
    fn test_cleanup_and_clear() {
        let (clock, cache) = cache(10);
        cache.set("short", 1, Duration::from_secs(1));
        cache.set("long", 2, FIVE_MIN);
        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_snapshot_cache_needs_every_resource() {
        let clock = Arc::new(ManualClock::new());
        let config = CacheConfig::new().with_resource_ttl(Resource::Actions, Duration::from_secs(30));
        let cache = SnapshotCache::new(config, clock.clone());
        let scope = Scope::new("acme", "p1");
        assert!(cache.is_stale(&scope));

        cache.put(&scope, &Snapshot::default());
        assert!(!cache.is_stale(&scope));
        assert!(cache.get(&scope).is_some());
        assert!(cache.get(&Scope::new("globex", "p1")).is_none());

        clock.advance(Duration::from_secs(31));
        assert!(cache.is_stale(&scope));
        assert!(cache.get(&scope).is_none());
    }

    #[test]
    fn test_snapshot_cache_invalidate() {
        let cache = SnapshotCache::new(CacheConfig::new(), Arc::new(SystemClock));
        let scope = Scope::new("acme", "p1");
        cache.put(&scope, &Snapshot::default());
        cache.invalidate(&scope, &[Resource::Actions]);
        assert!(cache.get(&scope).is_none());
        assert_eq!(cache.invalidate_scope(&scope).unwrap(), 2);
    }
}
