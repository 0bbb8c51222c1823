//! Bounded memoization used by the accessor resolver and provider registry.

use lru::LruCache;
use parking_lot::Mutex;
use std::{
    hash::Hash,
    num::NonZeroUsize,
    sync::atomic::{AtomicU64, Ordering},
};

/// Hit and miss counters of a [`MemoizingCache`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to compute the value.
    pub misses: u64,
}

/// A thread-safe least-recently-used memoization cache.
///
/// The value is computed outside the lock, so two threads that miss on the
/// same key at the same time may both compute it. The computation must be
/// deterministic for the key; whichever result lands last is kept.
pub struct MemoizingCache<K: Hash + Eq, V> {
    entries: Mutex<LruCache<K, V>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> MemoizingCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Creates a cache that holds at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns the cached value for `key`, or computes and caches it.
    pub fn get_or_insert_with(&self, key: &K, compute: impl FnOnce() -> V) -> V {
        self.get_or_insert_if(key, compute, || true)
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with), but a freshly
    /// computed value is only cached if `still_valid` holds.
    ///
    /// `still_valid` runs under the cache lock, after the computation. A
    /// writer that invalidates the inputs and then calls
    /// [`clear`](Self::clear) can therefore never leave a stale entry
    /// behind: either the entry lands before the clear, or the check fails.
    pub fn get_or_insert_if(
        &self,
        key: &K,
        compute: impl FnOnce() -> V,
        still_valid: impl FnOnce() -> bool,
    ) -> V {
        if let Some(value) = self.entries.lock().get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return value.clone();
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = compute();
        let mut entries = self.entries.lock();
        if still_valid() {
            entries.put(key.clone(), value.clone());
        }
        value
    }

    /// Drops every entry. The counters are kept.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// The number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the cache holds no entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The maximum number of entries.
    pub fn capacity(&self) -> NonZeroUsize {
        self.entries.lock().cap()
    }

    /// A snapshot of the hit and miss counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
