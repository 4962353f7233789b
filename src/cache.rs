//! Bounded concurrent memoization used by the parser and the filter engine.
//!
//! Lookups and inserts never block each other for long: the map is sharded
//! and values are computed outside of any lock. Two threads missing on the
//! same key may both compute it; the last insert wins, which is harmless
//! because every cached computation is deterministic.

use crate::config::CacheSpec;
use dashmap::DashMap;
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Point-in-time counters for one cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: u64,
}

impl CacheStats {
    /// Write the counters into `metrics` under `prefix`
    pub fn apply(&self, prefix: &str, metrics: &mut BTreeMap<String, u64>) {
        metrics.insert(format!("{prefix}hitCount"), self.hits);
        metrics.insert(format!("{prefix}missCount"), self.misses);
        metrics.insert(format!("{prefix}evictionCount"), self.evictions);
        metrics.insert(format!("{prefix}size"), self.size);
    }
}

struct Entry<V> {
    value: V,
    written: Instant,
    /// Logical clock value of the last access, for eviction order
    accessed: AtomicU64,
    /// Nanoseconds since the cache epoch of the last access
    accessed_nanos: AtomicU64,
}

pub struct ConcurrentCache<K, V> {
    entries: DashMap<K, Entry<V>>,
    spec: CacheSpec,
    epoch: Instant,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl<K: Hash + Eq, V> fmt::Debug for ConcurrentCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentCache")
            .field("spec", &self.spec)
            .field("size", &self.entries.len())
            .finish()
    }
}

impl<K, V> ConcurrentCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    pub fn new(spec: &CacheSpec) -> Self {
        Self {
            entries: DashMap::new(),
            spec: spec.clone(),
            epoch: Instant::now(),
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn now_nanos(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    fn is_expired(&self, entry: &Entry<V>) -> bool {
        if let Some(ttl) = self.spec.expire_after_write {
            if entry.written.elapsed() > ttl {
                return true;
            }
        }
        if let Some(ttl) = self.spec.expire_after_access {
            let idle = self
                .now_nanos()
                .saturating_sub(entry.accessed_nanos.load(Ordering::Relaxed));
            if u128::from(idle) > ttl.as_nanos() {
                return true;
            }
        }
        false
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut expired = false;

        if let Some(entry) = self.entries.get(key) {
            if self.is_expired(&entry) {
                expired = true;
            } else {
                entry.accessed.store(self.tick(), Ordering::Relaxed);
                entry
                    .accessed_nanos
                    .store(self.now_nanos(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.value.clone());
            }
        }

        if expired && self.entries.remove(key).is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: K, value: V) {
        if self.spec.maximum_size == Some(0) {
            return;
        }

        self.entries.insert(
            key,
            Entry {
                value,
                written: Instant::now(),
                accessed: AtomicU64::new(self.tick()),
                accessed_nanos: AtomicU64::new(self.now_nanos()),
            },
        );

        if let Some(max) = self.spec.maximum_size {
            while self.entries.len() as u64 > max {
                if !self.evict_least_recent() {
                    break;
                }
            }
        }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    /// Errors from `compute` are returned as-is and nothing is stored.
    pub fn get_or_try_insert_with<E>(
        &self,
        key: K,
        compute: impl FnOnce() -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = compute()?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Infallible form of [`Self::get_or_try_insert_with`]
    pub fn get_or_insert_with(&self, key: K, compute: impl FnOnce() -> V) -> V {
        let Ok(value) = self.get_or_try_insert_with(key, || Ok::<V, Infallible>(compute()));
        value
    }

    fn evict_least_recent(&self) -> bool {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().accessed.load(Ordering::Relaxed))
            .map(|entry| entry.key().clone());

        match oldest {
            Some(key) => {
                if self.entries.remove(&key).is_some() {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            size: self.entries.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn spec(text: &str) -> CacheSpec {
        text.parse().expect("valid cache spec")
    }

    #[test]
    fn test_debug_reports_size() {
        let cache: ConcurrentCache<String, u32> = ConcurrentCache::new(&spec("maximumSize=4"));
        cache.insert("a".to_string(), 1);
        let rendered = format!("{cache:?}");
        assert!(rendered.contains("size: 1"));
    }

    #[test]
    fn test_hits_and_misses_are_counted() {
        let cache: ConcurrentCache<String, u32> = ConcurrentCache::new(&CacheSpec::default());
        assert_eq!(cache.get("a"), None);
        cache.insert("a".to_string(), 1);
        assert_eq!(cache.get("a"), Some(1));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_least_recently_accessed_entry_is_evicted() {
        let cache: ConcurrentCache<&str, u32> = ConcurrentCache::new(&spec("maximumSize=2"));
        cache.insert("a", 1);
        cache.insert("b", 2);
        assert_eq!(cache.get("a"), Some(1));
        cache.insert("c", 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("b"), None);
        assert_eq!(cache.get("a"), Some(1));
        assert_eq!(cache.get("c"), Some(3));
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_zero_maximum_size_disables_storage() {
        let cache: ConcurrentCache<&str, u32> = ConcurrentCache::new(&spec("maximumSize=0"));
        cache.insert("a", 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expire_after_write() {
        let cache: ConcurrentCache<&str, u32> = ConcurrentCache::new(&CacheSpec {
            expire_after_write: Some(Duration::from_millis(10)),
            ..CacheSpec::default()
        });
        cache.insert("a", 1);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(cache.get("a"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_compute_errors_are_not_stored() {
        let cache: ConcurrentCache<&str, u32> = ConcurrentCache::new(&CacheSpec::default());
        let result: Result<u32, &str> = cache.get_or_try_insert_with("a", || Err("boom"));
        assert_eq!(result, Err("boom"));
        assert!(cache.is_empty());

        let result: Result<u32, &str> = cache.get_or_try_insert_with("a", || Ok(7));
        assert_eq!(result, Ok(7));
        assert_eq!(cache.get("a"), Some(7));
    }

    #[test]
    fn test_compute_runs_once_per_key() {
        let cache: ConcurrentCache<&str, u32> = ConcurrentCache::new(&CacheSpec::default());
        let mut calls = 0;
        for _ in 0..3 {
            let value = cache.get_or_insert_with("a", || {
                calls += 1;
                5
            });
            assert_eq!(value, 5);
        }
        assert_eq!(calls, 1);
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_concurrent_compute_if_absent_converges() {
        let cache: Arc<ConcurrentCache<u32, u32>> =
            Arc::new(ConcurrentCache::new(&CacheSpec::default()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for key in 0..50 {
                        let value: Result<u32, ()> =
                            cache.get_or_try_insert_with(key, || Ok(key * 2));
                        assert_eq!(value, Ok(key * 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker thread");
        }

        assert_eq!(cache.len(), 50);
    }
}
