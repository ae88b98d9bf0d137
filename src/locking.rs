//! Thread-safety wrapper: a single `parking_lot::Mutex` around any
//! [`InMemoryCache`] engine.
//!
//! Every read path on `InMemoryCache` (including `peek`) takes `&mut self`
//! at the engine level, since even a "read" mutates recency/frequency
//! bookkeeping; there is no reader/writer split to exploit, so a single
//! mutex is both the simplest and the correct choice here. Splitting reads
//! and writes would need a redesign of the engine trait itself to separate
//! "observe" from "update policy state," which is out of scope (see
//! DESIGN.md).

use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{EvictionCallback, InMemoryCache};

/// Wraps an [`InMemoryCache`] engine behind one mutex, making it `Send + Sync`
/// so it can be shared across threads via [`Arc`].
pub struct Locking<E> {
    inner: Arc<Mutex<E>>,
}

impl<E> Locking<E> {
    pub fn new(engine: E) -> Self {
        Self { inner: Arc::new(Mutex::new(engine)) }
    }
}

impl<E> Clone for Locking<E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K, V, E> InMemoryCache<K, V> for Locking<E>
where
    K: Clone + Eq + Hash,
    V: Clone,
    E: InMemoryCache<K, V>,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        self.inner.lock().set(key, value)
    }

    fn get(&mut self, key: &K) -> Option<V> {
        self.inner.lock().get(key)
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.inner.lock().peek(key)
    }

    fn has(&self, key: &K) -> bool {
        self.inner.lock().has(key)
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        self.inner.lock().delete(key)
    }

    fn purge(&mut self) {
        self.inner.lock().purge()
    }

    fn keys(&self) -> Vec<K> {
        self.inner.lock().keys()
    }

    fn values(&self) -> Vec<V> {
        self.inner.lock().values()
    }

    fn range(&self, skip: usize, take: usize) -> Vec<(K, V)> {
        self.inner.lock().range(skip, take)
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    fn algorithm(&self) -> &'static str {
        self.inner.lock().algorithm()
    }

    fn delete_oldest(&mut self) -> Option<(K, V)> {
        self.inner.lock().delete_oldest()
    }

    fn set_eviction_callback(&mut self, callback: Option<EvictionCallback<K, V>>) {
        self.inner.lock().set_eviction_callback(callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::LruCache;
    use std::thread;

    #[test]
    fn concurrent_writers_see_a_consistent_cache() {
        let cache: Locking<LruCache<u64, u64>> = Locking::new(LruCache::new(1000));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let mut cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..200 {
                        let key = t * 200 + i;
                        cache.set(key, key);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 1000);
    }
}
