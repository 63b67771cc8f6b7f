//! In-memory TTL cache with group tags.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use serde::{Deserialize, Serialize};
use tracing::debug;

use lolgate_core::constants::DEFAULT_CACHE_MAX_ENTRIES;
use lolgate_core::{CacheKey, CacheTier};

/// Cache entry with TTL. Replaced wholesale, never mutated.
#[derive(Clone)]
struct CacheEntry {
    payload: Bytes,
    inserted_at: Instant,
    ttl: Duration,
    groups: Vec<String>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }

    fn remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.inserted_at.elapsed())
    }
}

/// Entries plus the group index, behind one lock so they never disagree.
#[derive(Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    /// Group → keys tagged with it. Only references live entries.
    groups: HashMap<String, HashSet<CacheKey>>,
}

impl Inner {
    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        for group in &entry.groups {
            if let Some(keys) = self.groups.get_mut(group) {
                keys.remove(key);
                if keys.is_empty() {
                    self.groups.remove(group);
                }
            }
        }
        Some(entry)
    }

    fn remove_expired(&mut self) -> usize {
        let expired: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            self.remove(key);
        }
        expired.len()
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest_key) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.inserted_at)
            .map(|(k, _)| k.clone())
        {
            self.remove(&oldest_key);
        }
    }
}

/// Cache configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_entries: usize,
    /// Whether to sweep expired entries before evicting live ones
    pub auto_cleanup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_CACHE_MAX_ENTRIES,
            auto_cleanup: true,
        }
    }
}

/// A cache hit.
#[derive(Clone, Debug)]
pub struct CachedResponse {
    /// Response body exactly as first returned.
    pub payload: Bytes,
    /// Time left before the entry expires.
    pub remaining: Duration,
}

/// Per-worker response cache.
///
/// Expired entries are evicted lazily on access and by `cleanup_expired`.
/// `purge_group` drops every entry tagged with a group in one step.
pub struct ResponseCache {
    inner: RwLock<Inner>,
    config: CacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Creates a new cache with default configuration.
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    /// Creates a cache with custom configuration.
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the entry for `key` if present and not expired.
    pub fn get(&self, key: &CacheKey) -> Option<CachedResponse> {
        let inner = self.inner.upgradable_read();
        let hit = match inner.entries.get(key) {
            Some(entry) if !entry.is_expired() => Some(CachedResponse {
                payload: entry.payload.clone(),
                remaining: entry.remaining(),
            }),
            _ => None,
        };

        if hit.is_none() && inner.entries.contains_key(key) {
            let mut inner = RwLockUpgradableReadGuard::upgrade(inner);
            inner.remove(key);
            debug!(%key, "Evicted expired cache entry");
        }

        match hit {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        hit
    }

    /// Stores `payload` under the tier's TTL, tagged with `groups`.
    ///
    /// Returns false without storing anything for the uncached tier.
    pub fn put<I>(&self, key: CacheKey, payload: Bytes, tier: CacheTier, groups: I) -> bool
    where
        I: IntoIterator<Item = String>,
    {
        match tier.ttl() {
            Some(ttl) => {
                self.put_with_ttl(key, payload, ttl, groups);
                true
            }
            None => false,
        }
    }

    /// Stores `payload` with an explicit TTL.
    pub fn put_with_ttl<I>(&self, key: CacheKey, payload: Bytes, ttl: Duration, groups: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut groups: Vec<String> = groups.into_iter().collect();
        groups.sort();
        groups.dedup();

        let mut inner = self.inner.write();

        // Replacement drops the old group memberships first.
        inner.remove(&key);

        if self.config.auto_cleanup && inner.entries.len() >= self.config.max_entries {
            inner.remove_expired();
        }
        if inner.entries.len() >= self.config.max_entries {
            inner.evict_oldest();
        }

        for group in &groups {
            inner
                .groups
                .entry(group.clone())
                .or_default()
                .insert(key.clone());
        }
        inner.entries.insert(
            key,
            CacheEntry {
                payload,
                inserted_at: Instant::now(),
                ttl,
                groups,
            },
        );
    }

    /// Removes every entry tagged with `group`. Returns how many were removed.
    ///
    /// Unknown or empty groups are a no-op.
    pub fn purge_group(&self, group: &str) -> usize {
        let mut inner = self.inner.write();
        let Some(keys) = inner.groups.remove(group) else {
            return 0;
        };
        let mut removed = 0;
        for key in &keys {
            if inner.remove(key).is_some() {
                removed += 1;
            }
        }
        debug!(group, removed, "Purged cache group");
        removed
    }

    /// Removes a single entry.
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.inner.write().remove(key).is_some()
    }

    /// Clears all cached entries and groups.
    pub fn clear(&self) {
        let mut inner = self.inner.write();
        inner.entries.clear();
        inner.groups.clear();
    }

    /// Removes all expired entries. Returns how many were removed.
    pub fn cleanup_expired(&self) -> usize {
        self.inner.write().remove_expired()
    }

    /// Returns the number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Number of keys currently tagged with `group`.
    pub fn group_len(&self, group: &str) -> usize {
        self.inner.read().groups.get(group).map_or(0, HashSet::len)
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.read();
        let expired = inner.entries.values().filter(|e| e.is_expired()).count();
        CacheStats {
            total_entries: inner.entries.len(),
            expired_entries: expired,
            valid_entries: inner.entries.len().saturating_sub(expired),
            groups: inner.groups.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            capacity: self.config.max_entries,
        }
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    /// Stored entries, expired ones included
    pub total_entries: usize,
    /// Entries past their TTL not yet evicted
    pub expired_entries: usize,
    /// Entries still fresh
    pub valid_entries: usize,
    /// Groups with at least one member
    pub groups: usize,
    /// Lookups answered from cache
    pub hits: u64,
    /// Lookups that found nothing fresh
    pub misses: u64,
    /// Configured maximum entries
    pub capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> CacheKey {
        CacheKey::from(s)
    }

    fn body(s: &'static str) -> Bytes {
        Bytes::from_static(s.as_bytes())
    }

    fn group(s: &str) -> Option<String> {
        Some(s.to_string())
    }

    #[test]
    fn test_cache_put_get() {
        let cache = ResponseCache::new();
        assert!(cache.put(key("getSummonerById?id=1"), body("{}"), CacheTier::Long, group("1")));
        let hit = cache.get(&key("getSummonerById?id=1")).unwrap();
        assert_eq!(hit.payload, body("{}"));
        assert!(hit.remaining <= CacheTier::Long.ttl().unwrap());
    }

    #[test]
    fn test_cache_miss() {
        let cache = ResponseCache::new();
        assert!(cache.get(&key("getMaps")).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_uncached_tier_is_not_stored() {
        let cache = ResponseCache::new();
        assert!(!cache.put(key("getStatus"), body("{}"), CacheTier::None, None));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_ttl_expiration_is_lazy() {
        let cache = ResponseCache::new();
        cache.put_with_ttl(key("a"), body("1"), Duration::from_millis(1), group("7"));
        std::thread::sleep(Duration::from_millis(10));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.group_len("7"), 0);
    }

    #[test]
    fn test_purge_group_only_hits_tagged_entries() {
        let cache = ResponseCache::new();
        cache.put(key("getSummonerById?id=1"), body("a"), CacheTier::Long, group("1"));
        cache.put(key("getLeagueBySummonerId?id=1"), body("b"), CacheTier::Long, group("1"));
        cache.put(key("getSummonerById?id=2"), body("c"), CacheTier::Long, group("2"));
        cache.put(key("getMaps"), body("d"), CacheTier::Short, None);

        assert_eq!(cache.purge_group("1"), 2);

        assert!(cache.get(&key("getSummonerById?id=1")).is_none());
        assert!(cache.get(&key("getLeagueBySummonerId?id=1")).is_none());
        assert!(cache.get(&key("getSummonerById?id=2")).is_some());
        assert!(cache.get(&key("getMaps")).is_some());
    }

    #[test]
    fn test_purge_group_is_idempotent() {
        let cache = ResponseCache::new();
        cache.put(key("x"), body("1"), CacheTier::Long, group("1"));
        cache.put(key("y"), body("2"), CacheTier::Long, group("2"));

        assert_eq!(cache.purge_group("1"), 1);
        assert_eq!(cache.purge_group("1"), 0);
        assert_eq!(cache.purge_group("never-seen"), 0);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&key("y")).is_some());
    }

    #[test]
    fn test_replace_moves_group_membership() {
        let cache = ResponseCache::new();
        cache.put(key("k"), body("old"), CacheTier::Long, group("1"));
        cache.put(key("k"), body("new"), CacheTier::Long, group("2"));

        assert_eq!(cache.group_len("1"), 0);
        assert_eq!(cache.group_len("2"), 1);
        assert_eq!(cache.purge_group("1"), 0);
        assert_eq!(cache.get(&key("k")).unwrap().payload, body("new"));
    }

    #[test]
    fn test_cache_capacity_eviction_keeps_index_consistent() {
        let cache = ResponseCache::with_config(CacheConfig {
            max_entries: 2,
            auto_cleanup: true,
        });
        cache.put(key("a"), body("1"), CacheTier::Long, group("g"));
        std::thread::sleep(Duration::from_millis(2));
        cache.put(key("b"), body("2"), CacheTier::Long, group("g"));
        std::thread::sleep(Duration::from_millis(2));
        cache.put(key("c"), body("3"), CacheTier::Long, group("g"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&key("a")).is_none());
        assert_eq!(cache.group_len("g"), 2);
        assert_eq!(cache.purge_group("g"), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_cleanup_expired() {
        let cache = ResponseCache::new();
        cache.put_with_ttl(key("a"), body("1"), Duration::from_millis(1), group("1"));
        cache.put(key("b"), body("2"), CacheTier::Short, None);
        std::thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.stats().groups, 0);
        assert!(cache.get(&key("b")).is_some());
    }

    #[test]
    fn test_cache_clear() {
        let cache = ResponseCache::new();
        cache.put(key("a"), body("1"), CacheTier::Long, group("1"));
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.group_len("1"), 0);
    }

    #[test]
    fn test_cache_stats() {
        let cache = ResponseCache::new();
        cache.put(key("a"), body("1"), CacheTier::Long, group("1"));
        cache.put(key("b"), body("2"), CacheTier::Short, None);
        cache.get(&key("a"));
        cache.get(&key("zzz"));

        let stats = cache.stats();
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.valid_entries, 2);
        assert_eq!(stats.groups, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
