//! Reference-counted LRU cache for file contents
//!
//! Entries are keyed by logical path and bounded by total byte size. An entry
//! is pinned while its reference count is above zero and pinned entries are
//! never evicted, so the cache may sit above capacity while everything in it
//! is pinned. Only insertion evicts.
//!
//! Evicted entries are handed to an [`EvictionHandler`] before they are
//! dropped, which lets the owner write them back to a backing store.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Receives entries as they leave the cache
pub trait EvictionHandler: Send + Sync {
    fn on_evict(&self, key: &str, value: &Bytes);
}

/// Eviction handler that drops evicted entries
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardOnEvict;

impl EvictionHandler for DiscardOnEvict {
    fn on_evict(&self, _key: &str, _value: &Bytes) {}
}

/// A cached blob
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: Bytes,
    /// Tracked size in bytes
    pub size: u64,
    pub accessed: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    /// Pin count; the entry is evictable at zero or below
    pub references: i64,
}

impl CacheEntry {
    fn is_pinned(&self) -> bool {
        self.references > 0
    }
}

struct CacheState {
    /// Most recently used at the front, eviction candidates at the back
    entries: LruCache<String, CacheEntry>,
    size: u64,
}

/// Bounded LRU of path → blob with pinning
pub struct FileCache {
    capacity: u64,
    state: Mutex<CacheState>,
    on_evict: Arc<dyn EvictionHandler>,
}

impl FileCache {
    /// Create a cache holding up to `capacity` bytes
    pub fn new(capacity: u64, on_evict: Arc<dyn EvictionHandler>) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState {
                entries: LruCache::unbounded(),
                size: 0,
            }),
            on_evict,
        }
    }

    /// Look up `key`, pinning and promoting it on a hit
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let mut state = self.state.lock();
        let entry = state.entries.get_mut(key)?;
        entry.accessed = Utc::now();
        entry.references += 1;
        Some(entry.value.clone())
    }

    /// Insert or replace `key`, pinning it, then evict down to capacity
    pub fn put(&self, key: &str, value: Bytes, size: u64) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let now = Utc::now();

        let previous = match state.entries.get_mut(key) {
            Some(entry) => {
                let previous = entry.size;
                entry.value = value;
                entry.size = size;
                entry.modified = now;
                entry.accessed = now;
                entry.references += 1;
                previous
            }
            None => {
                state.entries.push(
                    key.to_string(),
                    CacheEntry {
                        value,
                        size,
                        accessed: now,
                        modified: now,
                        references: 1,
                    },
                );
                0
            }
        };
        state.size = state.size - previous + size;

        self.evict_overflow(state);
    }

    /// Drop one pin on `key`.
    ///
    /// An entry whose count reaches zero moves straight to the eviction end,
    /// ahead of colder entries that were never pinned. Nothing is evicted
    /// here; the next `put` reclaims the space.
    pub fn release(&self, key: &str) {
        let mut state = self.state.lock();
        let Some(entry) = state.entries.peek_mut(key) else {
            return;
        };
        entry.references -= 1;
        if !entry.is_pinned() {
            state.entries.demote(key);
        }
    }

    /// Remove `key` without notifying the eviction handler
    pub fn remove(&self, key: &str) -> Option<Bytes> {
        let mut state = self.state.lock();
        let entry = state.entries.pop(key)?;
        state.size -= entry.size;
        Some(entry.value)
    }

    /// Evict every entry, pinned or not, notifying the handler for each
    pub fn clear(&self) {
        let mut state = self.state.lock();
        while let Some((key, entry)) = state.entries.pop_lru() {
            self.on_evict.on_evict(&key, &entry.value);
        }
        state.size = 0;
    }

    /// Snapshot of an entry without touching its recency or pin count
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        self.state.lock().entries.peek(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().entries.contains(key)
    }

    /// Total tracked size in bytes
    pub fn size(&self) -> u64 {
        self.state.lock().size
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len() as u64,
            pinned: state.entries.iter().filter(|(_, e)| e.is_pinned()).count() as u64,
            size: state.size,
            capacity: self.capacity,
        }
    }

    /// Evict from the back while over capacity. Stops at the first pinned
    /// candidate rather than skipping past it.
    fn evict_overflow(&self, state: &mut CacheState) {
        while state.size > self.capacity {
            match state.entries.peek_lru() {
                Some((_, entry)) if !entry.is_pinned() => {}
                _ => return,
            }
            let Some((key, entry)) = state.entries.pop_lru() else {
                return;
            };
            state.size -= entry.size;
            self.on_evict.on_evict(&key, &entry.value);
        }
    }
}

impl fmt::Debug for FileCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("FileCache")
            .field("capacity", &self.capacity)
            .field("size", &state.size)
            .field("entries", &state.entries.len())
            .finish()
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub pinned: u64,
    pub size: u64,
    pub capacity: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every eviction in order
    #[derive(Default)]
    struct Recorder {
        evicted: Mutex<Vec<(String, Bytes)>>,
    }

    impl Recorder {
        fn keys(&self) -> Vec<String> {
            self.evicted.lock().iter().map(|(k, _)| k.clone()).collect()
        }
    }

    impl EvictionHandler for Recorder {
        fn on_evict(&self, key: &str, value: &Bytes) {
            self.evicted.lock().push((key.to_string(), value.clone()));
        }
    }

    fn cache_with_recorder(capacity: u64) -> (FileCache, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        (FileCache::new(capacity, recorder.clone()), recorder)
    }

    fn put_released(cache: &FileCache, key: &str, value: &'static [u8]) {
        cache.put(key, Bytes::from_static(value), value.len() as u64);
        cache.release(key);
    }

    #[test]
    fn test_get_miss() {
        let (cache, recorder) = cache_with_recorder(10);
        assert!(cache.get("missing").is_none());
        assert!(recorder.keys().is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let (cache, _) = cache_with_recorder(100);
        cache.put("a.txt", Bytes::from_static(b"hello"), 5);

        assert_eq!(cache.get("a.txt"), Some(Bytes::from_static(b"hello")));
        let entry = cache.peek("a.txt").unwrap();
        assert_eq!(entry.references, 2);
        assert_eq!(cache.size(), 5);
    }

    #[test]
    fn test_replace_adjusts_size() {
        let (cache, _) = cache_with_recorder(100);
        cache.put("a.txt", Bytes::from_static(b"hello"), 5);
        cache.put("a.txt", Bytes::from_static(b"hi"), 2);

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.peek("a.txt").unwrap().references, 2);
        assert_eq!(cache.get("a.txt"), Some(Bytes::from_static(b"hi")));
    }

    #[test]
    fn test_evicts_least_recently_used_unpinned() {
        let (cache, recorder) = cache_with_recorder(10);
        put_released(&cache, "a", b"aaaa");
        put_released(&cache, "b", b"bbbb");

        // Touch "a" and release it again; release demotes it to the back
        cache.get("a");
        cache.release("a");

        put_released(&cache, "c", b"cccc");

        assert_eq!(recorder.keys(), vec!["a".to_string()]);
        assert!(cache.size() <= cache.capacity());
        assert!(cache.contains("b"));
        assert!(cache.contains("c"));
    }

    #[test]
    fn test_pinned_entries_are_never_evicted() {
        let (cache, recorder) = cache_with_recorder(5);
        cache.put("pinned", Bytes::from_static(b"12345"), 5);
        cache.put("other", Bytes::from_static(b"678"), 3);

        // Both pinned: over capacity, nothing evicted
        assert!(recorder.keys().is_empty());
        assert_eq!(cache.size(), 8);

        // Releasing "other" makes it the candidate, reclaimed by the next put
        cache.release("other");
        assert!(recorder.keys().is_empty());
        cache.put("next", Bytes::from_static(b"9"), 1);
        assert_eq!(recorder.keys(), vec!["other".to_string()]);
        assert!(cache.contains("pinned"));
        assert!(cache.contains("next"));
        assert_eq!(cache.size(), 6);
    }

    #[test]
    fn test_eviction_stops_at_pinned_tail() {
        let (cache, recorder) = cache_with_recorder(6);
        cache.put("old", Bytes::from_static(b"aaaa"), 4);
        cache.put("new", Bytes::from_static(b"bbbb"), 4);
        assert!(recorder.keys().is_empty());

        // "new" is demoted behind "old", so it goes first
        cache.release("new");
        cache.put("newer", Bytes::from_static(b"cccc"), 4);
        assert_eq!(recorder.keys(), vec!["new".to_string()]);

        // Tail is the pinned "old"; nothing more is evicted
        assert_eq!(cache.size(), 8);
    }

    #[test]
    fn test_single_put_over_capacity_evicts_prior() {
        let (cache, recorder) = cache_with_recorder(5);
        put_released(&cache, "prior", b"xy");

        cache.put("a.txt", Bytes::from(vec![0u8; 10]), 10);

        assert_eq!(recorder.keys(), vec!["prior".to_string()]);
        assert!(cache.contains("a.txt"));

        // Releasing leaves it in place, over capacity, until the next put
        cache.release("a.txt");
        assert_eq!(recorder.keys(), vec!["prior".to_string()]);
        assert!(cache.contains("a.txt"));
        assert_eq!(cache.size(), 10);
    }

    #[test]
    fn test_single_put_into_empty_cache_evicts_nothing() {
        let (cache, recorder) = cache_with_recorder(5);
        put_released(&cache, "a.txt", b"0123456789");

        assert!(recorder.keys().is_empty());
        assert!(cache.contains("a.txt"));
    }

    #[test]
    fn test_bounded_after_release_and_put() {
        let (cache, _) = cache_with_recorder(16);
        let keys: Vec<String> = (0..20).map(|i| format!("file-{i}")).collect();

        for key in &keys {
            cache.put(key, Bytes::from(vec![1u8; 3]), 3);
        }
        assert_eq!(cache.size(), 60);

        for key in &keys {
            cache.release(key);
        }
        assert_eq!(cache.size(), 60);

        put_released(&cache, "last", b"abc");
        assert!(cache.size() <= 16);
    }

    #[test]
    fn test_remove_skips_handler() {
        let (cache, recorder) = cache_with_recorder(100);
        cache.put("a", Bytes::from_static(b"abc"), 3);

        assert_eq!(cache.remove("a"), Some(Bytes::from_static(b"abc")));
        assert!(cache.remove("a").is_none());
        assert_eq!(cache.size(), 0);
        assert!(recorder.keys().is_empty());
    }

    #[test]
    fn test_clear_notifies_every_entry() {
        let (cache, recorder) = cache_with_recorder(100);
        cache.put("a", Bytes::from_static(b"1"), 1);
        put_released(&cache, "b", b"2");

        cache.clear();

        let mut keys = recorder.keys();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);
        assert!(cache.is_empty());
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_stats() {
        let (cache, _) = cache_with_recorder(100);
        cache.put("a", Bytes::from_static(b"123"), 3);
        put_released(&cache, "b", b"45");

        assert_eq!(
            cache.stats(),
            CacheStats {
                entries: 2,
                pinned: 1,
                size: 5,
                capacity: 100,
            }
        );
    }

    #[test]
    fn test_release_unknown_key_is_noop() {
        let (cache, recorder) = cache_with_recorder(1);
        cache.release("nothing");
        assert!(recorder.keys().is_empty());
    }
}
