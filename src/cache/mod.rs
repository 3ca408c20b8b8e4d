//! Read cache with clone-in/clone-out semantics and LRU eviction.
//!
//! A [`RecordCache`] pairs the full-record cache with a derived ("abstract")
//! cache keyed the same way. Writing the full record for an id invalidates
//! the derived entry; the derived view is recomputed lazily by whoever owns
//! it, never by the cache itself.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::record::Record;

struct CacheSlot {
    record: Record,
    stamp: u64,
}

struct LruInner {
    map: HashMap<String, CacheSlot>,
    tick: u64,
}

/// Bounded cache of record snapshots, least-recently-used eviction.
///
/// All entries are cloned on the way in and on the way out, so callers can
/// never mutate cached state through a returned value. A single mutex guards
/// the map and the recency bookkeeping; a `get` never observes a partially
/// written entry.
pub struct LruCache {
    capacity: usize,
    inner: Mutex<LruInner>,
}

impl LruCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(LruInner {
                map: HashMap::new(),
                tick: 0,
            }),
        }
    }

    /// Get a snapshot of the cached record, refreshing its recency.
    pub fn get(&self, id: &str) -> Option<Record> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.tick += 1;
        let tick = inner.tick;
        let slot = inner.map.get_mut(id)?;
        slot.stamp = tick;
        Some(slot.record.clone())
    }

    /// Store a snapshot of the record, evicting the least recently used
    /// entry when over capacity.
    pub fn put(&self, id: impl Into<String>, record: &Record) {
        let mut inner = self.inner.lock().expect("cache lock poisoned");
        inner.tick += 1;
        let tick = inner.tick;
        inner.map.insert(
            id.into(),
            CacheSlot {
                record: record.clone(),
                stamp: tick,
            },
        );

        if inner.map.len() > self.capacity {
            // Capacities are small enough that a scan beats the bookkeeping
            // of a linked recency list.
            if let Some(oldest) = inner
                .map
                .iter()
                .min_by_key(|(_, slot)| slot.stamp)
                .map(|(id, _)| id.clone())
            {
                inner.map.remove(&oldest);
            }
        }
    }

    /// Remove an entry.
    pub fn remove(&self, id: &str) {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .map
            .remove(id);
    }

    /// Whether an entry exists without touching recency.
    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .lock()
            .expect("cache lock poisoned")
            .map
            .contains_key(id)
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache lock poisoned").map.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.lock().expect("cache lock poisoned").map.clear();
    }

    /// Configured maximum entry count.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Full-record cache plus the derived-view cache for one entity kind.
pub struct RecordCache {
    full: LruCache,
    derived: LruCache,
}

impl RecordCache {
    /// Create both caches with the same capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            full: LruCache::new(capacity),
            derived: LruCache::new(capacity),
        }
    }

    /// Get the full record for an id.
    pub fn get(&self, id: &str) -> Option<Record> {
        self.full.get(id)
    }

    /// Store the full record and invalidate the derived entry for the same
    /// id; the derived view is recomputed lazily by its producer.
    pub fn put(&self, id: impl Into<String>, record: &Record) {
        let id = id.into();
        self.derived.remove(&id);
        self.full.put(id, record);
    }

    /// Get the derived view for an id.
    pub fn get_derived(&self, id: &str) -> Option<Record> {
        self.derived.get(id)
    }

    /// Store a derived view.
    pub fn put_derived(&self, id: impl Into<String>, record: &Record) {
        self.derived.put(id, record);
    }

    /// Remove both the full record and the derived view.
    pub fn remove(&self, id: &str) {
        self.full.remove(id);
        self.derived.remove(id);
    }

    /// The underlying full-record cache.
    pub fn full(&self) -> &LruCache {
        &self.full
    }

    /// The underlying derived-view cache.
    pub fn derived(&self) -> &LruCache {
        &self.derived
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;

    fn record(id: &str, n: i64) -> Record {
        let mut r = Record::new();
        r.set("id", id).set("n", n);
        r
    }

    #[test]
    fn test_get_after_put_returns_equal_clone() {
        let cache = LruCache::new(10);
        let original = record("a", 1);
        cache.put("a", &original);

        let mut copy = cache.get("a").unwrap();
        assert_eq!(copy, original);

        // Mutating the copy must not leak into the cache.
        copy.set("n", 99i64);
        assert_eq!(cache.get("a").unwrap(), original);
    }

    #[test]
    fn test_lru_eviction_order() {
        let cache = LruCache::new(2);
        cache.put("a", &record("a", 1));
        cache.put("b", &record("b", 2));

        // Touch "a" so "b" becomes the eviction candidate.
        cache.get("a");
        cache.put("c", &record("c", 3));

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_put_existing_key_does_not_evict() {
        let cache = LruCache::new(2);
        cache.put("a", &record("a", 1));
        cache.put("b", &record("b", 2));
        cache.put("a", &record("a", 3));
        assert_eq!(cache.len(), 2);
        assert!(cache.contains("b"));
    }

    #[test]
    fn test_remove() {
        let cache = LruCache::new(2);
        cache.put("a", &record("a", 1));
        cache.remove("a");
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_put_invalidates_derived_entry() {
        let cache = RecordCache::new(10);
        cache.put("x", &record("x", 1));
        cache.put_derived("x", &record("x", 100));
        assert!(cache.get_derived("x").is_some());

        cache.put("x", &record("x", 2));
        assert!(cache.get_derived("x").is_none());
        assert!(cache.get("x").is_some());
    }

    #[test]
    fn test_remove_clears_both_caches() {
        let cache = RecordCache::new(10);
        cache.put("x", &record("x", 1));
        cache.put_derived("x", &record("x", 100));
        cache.remove("x");
        assert!(cache.get("x").is_none());
        assert!(cache.get_derived("x").is_none());
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let cache = Arc::new(LruCache::new(64));
        let mut handles = Vec::new();
        for t in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for i in 0..100 {
                    let id = format!("{}-{}", t, i % 8);
                    cache.put(id.clone(), &record(&id, i));
                    let got = cache.get(&id).unwrap();
                    assert_eq!(got.get_str("id"), Some(id.as_str()));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
    }
}
