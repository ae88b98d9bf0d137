//! The capability set every eviction policy engine implements.
//!
//! Each concrete engine in [`crate::policy`] used to be a standalone struct
//! with its own copy of `get`/`put`/`len`/... (one per algorithm, as in the
//! original LRU/LFU/LFUDA/SLRU/GDSF caches). `InMemoryCache` pulls that
//! repeated method set into one trait so the wrapper layers — [`crate::locking::Locking`],
//! [`crate::metrics::Instrumented`], [`crate::sharded::Sharded`], and the
//! [`crate::controller`] — can work with any of the eight policies
//! uniformly.

use std::hash::Hash;

/// Why an entry left the cache, passed to an [`EvictionCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Evicted to make room under the capacity limit.
    Capacity,
    /// Expired per TTL at the controller layer.
    Ttl,
    /// Removed by an explicit `delete`/`purge` call.
    Manual,
    /// Removed because a stale (unrevalidatable) entry aged out.
    Stale,
}

/// Invoked once per entry leaving a cache, after it has already been removed.
pub type EvictionCallback<K, V> = Box<dyn FnMut(EvictionReason, &K, &V) + Send>;

/// A bounded key-value store with a pluggable eviction policy.
///
/// Implementors own their entries outright: `get`/`peek` return owned clones
/// rather than references, since wrapper layers (locking, sharding) need to
/// release any internal lock before handing a value back to the caller.
pub trait InMemoryCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    /// Inserts or overwrites `key`. Returns the previous value, if any.
    /// May trigger one eviction if the cache was already at capacity.
    fn set(&mut self, key: K, value: V) -> Option<V>;

    /// Reads `key`, updating whatever recency/frequency state the policy
    /// tracks (e.g. moving the entry to the front of an LRU list).
    fn get(&mut self, key: &K) -> Option<V>;

    /// Reads `key` without updating policy state.
    fn peek(&self, key: &K) -> Option<V>;

    /// Whether `key` is present, without updating policy state.
    fn has(&self, key: &K) -> bool;

    /// Removes `key` if present, returning its value.
    fn delete(&mut self, key: &K) -> Option<V>;

    /// Removes every entry.
    fn purge(&mut self);

    fn keys(&self) -> Vec<K>;
    fn values(&self) -> Vec<V>;

    /// Returns up to `take` entries after skipping the first `skip`, in the
    /// policy's natural iteration order. Used for cursor-style enumeration.
    fn range(&self, skip: usize, take: usize) -> Vec<(K, V)>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    /// A short, stable name for the policy (`"lru"`, `"arc"`, `"s3-fifo"`, ...).
    fn algorithm(&self) -> &'static str;

    /// Evicts and returns the entry the policy considers least valuable,
    /// independent of capacity pressure. Used by the janitor and by callers
    /// that want to manually shrink a cache.
    fn delete_oldest(&mut self) -> Option<(K, V)>;

    /// Installs (or clears, with `None`) the eviction callback.
    fn set_eviction_callback(&mut self, callback: Option<EvictionCallback<K, V>>);

    fn set_many(&mut self, entries: Vec<(K, V)>) -> Vec<Option<V>> {
        entries.into_iter().map(|(k, v)| self.set(k, v)).collect()
    }

    fn get_many(&mut self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    fn peek_many(&self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|k| self.peek(k)).collect()
    }

    fn has_many(&self, keys: &[K]) -> Vec<bool> {
        keys.iter().map(|k| self.has(k)).collect()
    }

    fn delete_many(&mut self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|k| self.delete(k)).collect()
    }
}
