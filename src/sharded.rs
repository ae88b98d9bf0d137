//! Sharded wrapper: fans a cache out across `N` independent engine
//! instances, routing each key to a shard by hash, so concurrent access to
//! different keys only contends on the shards those keys land in instead of
//! one global lock.

use std::collections::hash_map::DefaultHasher;
use std::hash::{BuildHasher, Hash};

use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};

/// Default `BuildHasher` used to route keys to shards.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultShardHasher;

impl BuildHasher for DefaultShardHasher {
    type Hasher = DefaultHasher;

    fn build_hasher(&self) -> DefaultHasher {
        DefaultHasher::new()
    }
}

/// `N` engine instances of the same policy, keys routed by `key.hash() % N`.
pub struct Sharded<E, S = DefaultShardHasher> {
    shards: Vec<E>,
    hasher: S,
}

impl<E> Sharded<E, DefaultShardHasher> {
    /// Builds `shard_count` shards via `factory`, called once per shard.
    ///
    /// # Panics
    /// Panics if `shard_count` is 0.
    pub fn new(shard_count: usize, factory: impl Fn() -> E) -> Self {
        Self::with_hasher(shard_count, factory, DefaultShardHasher)
    }
}

impl<E, S> Sharded<E, S>
where
    S: BuildHasher,
{
    /// # Panics
    /// Panics if `shard_count` is 0.
    pub fn with_hasher(shard_count: usize, factory: impl Fn() -> E, hasher: S) -> Self {
        assert!(shard_count > 0, "shard_count must be greater than zero");
        Self { shards: (0..shard_count).map(|_| factory()).collect(), hasher }
    }

    fn shard_index<K: Hash>(&self, key: &K) -> usize {
        let hash = self.hasher.hash_one(key);
        (usize::try_from(hash).unwrap_or(usize::MAX)) % self.shards.len()
    }

    fn shard<K: Hash>(&self, key: &K) -> &E {
        &self.shards[self.shard_index(key)]
    }

    fn shard_mut<K: Hash>(&mut self, key: &K) -> &mut E {
        let idx = self.shard_index(key);
        &mut self.shards[idx]
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }
}

impl<K, V, E, S> InMemoryCache<K, V> for Sharded<E, S>
where
    K: Clone + Eq + Hash + 'static,
    V: Clone + 'static,
    E: InMemoryCache<K, V>,
    S: BuildHasher,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        self.shard_mut(&key).set(key, value)
    }

    fn get(&mut self, key: &K) -> Option<V> {
        self.shard_mut(key).get(key)
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.shard(key).peek(key)
    }

    fn has(&self, key: &K) -> bool {
        self.shard(key).has(key)
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        self.shard_mut(key).delete(key)
    }

    fn purge(&mut self) {
        for shard in &mut self.shards {
            shard.purge();
        }
    }

    fn keys(&self) -> Vec<K> {
        self.shards.iter().flat_map(|s| s.keys()).collect()
    }

    fn values(&self) -> Vec<V> {
        self.shards.iter().flat_map(|s| s.values()).collect()
    }

    fn range(&self, skip: usize, take: usize) -> Vec<(K, V)> {
        self.shards.iter().flat_map(|s| s.range(0, usize::MAX)).skip(skip).take(take).collect()
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    fn capacity(&self) -> usize {
        self.shards.iter().map(|s| s.capacity()).sum()
    }

    fn algorithm(&self) -> &'static str {
        self.shards.first().map(|s| s.algorithm()).unwrap_or("sharded")
    }

    /// Evicts from whichever shard currently holds the most entries, the
    /// natural choice when the caller has no per-key context to route on.
    fn delete_oldest(&mut self) -> Option<(K, V)> {
        let (idx, _) = self.shards.iter().enumerate().max_by_key(|(_, s)| s.len())?;
        self.shards[idx].delete_oldest()
    }

    /// Broadcasts `callback` to every shard behind a shared mutex, since a
    /// single `FnMut` can't be cloned across shards. Events from different
    /// shards interleave in whatever order they occur, with no cross-shard
    /// ordering guarantee.
    fn set_eviction_callback(&mut self, callback: Option<EvictionCallback<K, V>>) {
        match callback {
            None => {
                for shard in &mut self.shards {
                    shard.set_eviction_callback(None);
                }
            }
            Some(callback) => {
                let shared = std::sync::Arc::new(parking_lot::Mutex::new(callback));
                for shard in &mut self.shards {
                    let shared = std::sync::Arc::clone(&shared);
                    shard.set_eviction_callback(Some(Box::new(
                        move |reason: EvictionReason, k: &K, v: &V| {
                            (shared.lock())(reason, k, v);
                        },
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::LruCache;

    #[test]
    fn keys_route_to_stable_shards() {
        let mut cache: Sharded<LruCache<u64, u64>> = Sharded::new(4, || LruCache::new(100));
        for i in 0..40 {
            cache.set(i, i);
        }
        assert_eq!(cache.len(), 40);
        for i in 0..40 {
            assert_eq!(cache.get(&i), Some(i));
        }
    }

    #[test]
    fn delete_oldest_targets_the_largest_shard() {
        let mut cache: Sharded<LruCache<u64, u64>> = Sharded::new(2, || LruCache::new(100));
        cache.set(1, 1);
        cache.set(2, 2);
        cache.set(3, 3);
        let before = cache.len();
        assert!(cache.delete_oldest().is_some());
        assert_eq!(cache.len(), before - 1);
    }
}
