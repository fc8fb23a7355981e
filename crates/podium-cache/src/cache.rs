//! LRU cache with absolute per-entry TTL
//!
//! One mutex guards both the entry map and the recency index. Recency is a
//! `BTreeMap` keyed by a monotonically increasing access tick, so the least
//! recently used entry is always its first element.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Point-in-time cache statistics
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub size: usize,
    pub capacity: usize,
    /// size / capacity
    pub utilization: f64,
}

#[derive(Debug, Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl CacheCounters {
    fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
    }
}

struct CacheEntry<V> {
    value: V,
    /// `None` when the TTL is too large to represent
    expires_at: Option<Instant>,
    tick: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// access tick -> key, oldest first
    recency: BTreeMap<u64, String>,
    tick: u64,
}

impl<V> CacheState<V> {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }
}

/// Capacity-bounded, time-expiring LRU cache
pub struct LocalCache<V> {
    state: Mutex<CacheState<V>>,
    counters: CacheCounters,
    capacity: usize,
    ttl: Duration,
}

impl<V: Clone> LocalCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum 1), each
    /// living at most `ttl` after it was last set.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::with_capacity(capacity),
                recency: BTreeMap::new(),
                tick: 0,
            }),
            counters: CacheCounters::default(),
            capacity,
            ttl,
        }
    }

    /// Look up a live entry and mark it most recently used.
    ///
    /// An expired entry counts as a miss and is removed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(entry) = state.entries.get_mut(key) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if entry.is_expired(now) {
            state.remove(key);
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        state.tick += 1;
        let tick = state.tick;
        state.recency.remove(&entry.tick);
        entry.tick = tick;
        state.recency.insert(tick, key.to_string());

        self.counters.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Insert or overwrite. Overwriting resets the TTL and marks the entry
    /// most recently used. At capacity, the least recently used entry is
    /// evicted before the new one is inserted.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let expires_at = Instant::now().checked_add(self.ttl);
        let mut state = self.state.lock();
        let tick = state.next_tick();

        let replaced = state.remove(&key).is_some();
        if !replaced
            && state.entries.len() >= self.capacity
            && let Some((_, lru)) = state.recency.pop_first()
        {
            state.entries.remove(&lru);
            self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        }

        state.recency.insert(tick, key.clone());
        state.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at,
                tick,
            },
        );
    }

    /// Remove one entry. Returns `true` if it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.state.lock().remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`. Returns the number removed.
    pub fn clear_by_prefix(&self, prefix: &str) -> usize {
        let mut state = self.state.lock();
        let keys: Vec<String> = state
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &keys {
            state.remove(key);
        }
        keys.len()
    }

    /// Remove every entry and reset the hit/miss counters
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
        self.counters.reset();
    }

    /// Remove every expired entry. Returns the number removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired {
            state.remove(key);
        }
        expired.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of capacity evictions since the last clear
    #[must_use]
    pub fn evictions(&self) -> u64 {
        self.counters.evictions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let size = self.len();
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            hit_rate: self.counters.hit_ratio(),
            size,
            capacity: self.capacity,
            utilization: size as f64 / self.capacity as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    fn cache(capacity: usize) -> LocalCache<u32> {
        LocalCache::new(capacity, Duration::from_secs(60))
    }

    #[test]
    fn test_get_set() {
        let cache = cache(4);
        assert_eq!(cache.get("a"), None);
        cache.set("a", 1);
        assert_eq!(cache.get("a"), Some(1));

        cache.set("a", 2);
        assert_eq!(cache.get("a"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = cache(3);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        // Touch "a" so "b" becomes the oldest
        assert_eq!(cache.get("a"), Some(1));
        cache.set("d", 4);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.get("d"), Some(4));
        assert_eq!(cache.evictions(), 1);
    }

    #[test]
    fn test_overwrite_marks_recent() {
        let cache = cache(2);
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        cache.set("c", 3);

        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(10));
    }

    #[test]
    fn test_size_never_exceeds_capacity() {
        let cache = cache(5);
        for i in 0..100 {
            cache.set(format!("k{i}"), i);
            assert!(cache.stats().size <= 5);
        }
        assert_eq!(cache.len(), 5);
    }

    #[test]
    fn test_expired_read_is_miss_and_removes() {
        let cache = LocalCache::new(4, Duration::from_millis(20));
        cache.set("a", 1);
        sleep(Duration::from_millis(40));

        assert_eq!(cache.get("a"), None);
        assert_eq!(cache.len(), 0);
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
    }

    #[test]
    fn test_overwrite_resets_ttl() {
        let cache = LocalCache::new(4, Duration::from_millis(60));
        cache.set("a", 1);
        sleep(Duration::from_millis(40));
        cache.set("a", 2);
        sleep(Duration::from_millis(40));
        assert_eq!(cache.get("a"), Some(2));
    }

    #[test]
    fn test_clear_by_prefix() {
        let cache = cache(10);
        cache.set("top:10", 1);
        cache.set("top:100", 2);
        cache.set("rank:p1", 3);

        assert_eq!(cache.clear_by_prefix("top:"), 2);
        assert_eq!(cache.get("top:10"), None);
        assert_eq!(cache.get("rank:p1"), Some(3));
    }

    #[test]
    fn test_sweep_expired() {
        let cache = LocalCache::new(4, Duration::from_millis(20));
        cache.set("a", 1);
        cache.set("b", 2);
        sleep(Duration::from_millis(40));
        cache.set("c", 3);

        assert_eq!(cache.sweep_expired(), 2);
        assert_eq!(cache.len(), 1);
        // Sweeping does not touch the counters
        assert_eq!(cache.stats().misses, 0);
    }

    #[test]
    fn test_stats_and_clear() {
        let cache = cache(4);
        cache.set("a", 1);
        cache.get("a");
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 4);
        assert!((stats.utilization - 0.25).abs() < f64::EPSILON);

        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn test_delete() {
        let cache = cache(4);
        cache.set("a", 1);
        assert!(cache.delete("a"));
        assert!(!cache.delete("a"));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn test_unbounded_ttl() {
        let cache = LocalCache::new(4, Duration::MAX);
        cache.set("a", 1);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.sweep_expired(), 0);
    }
}
