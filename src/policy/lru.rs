//! Least-Recently-Used: a single list, hits move an entry to the front,
//! capacity pressure evicts from the back.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::clock;
use crate::entry::CacheEntry;
use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};
use crate::list::{Handle, List};

pub struct LruCache<K, V> {
    capacity: usize,
    map: HashMap<K, Handle>,
    list: List<CacheEntry<K, V, ()>>,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> LruCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        Self { capacity, map: HashMap::new(), list: List::new(), on_evict: None }
    }

    fn notify_evict(&mut self, reason: EvictionReason, key: &K, value: &V) {
        if let Some(cb) = &mut self.on_evict {
            cb(reason, key, value);
        }
    }

    fn evict_if_full(&mut self) {
        if self.map.len() < self.capacity {
            return;
        }
        if let Some((_, entry)) = self.list.pop_back() {
            self.map.remove(&entry.key);
            self.notify_evict(EvictionReason::Capacity, &entry.key, &entry.value);
        }
    }
}

impl<K, V> InMemoryCache<K, V> for LruCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        let now = clock::now_micros();
        if let Some(&handle) = self.map.get(&key) {
            let entry = self.list.get_mut(handle);
            let old = std::mem::replace(&mut entry.value, value);
            entry.touch(now);
            self.list.move_to_front(handle);
            return Some(old);
        }
        self.evict_if_full();
        let handle = self.list.push_front(CacheEntry::new(key.clone(), value, (), now));
        self.map.insert(key, handle);
        None
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let handle = *self.map.get(key)?;
        self.list.move_to_front(handle);
        let now = clock::now_micros();
        let entry = self.list.get_mut(handle);
        entry.touch(now);
        Some(entry.value.clone())
    }

    fn peek(&self, key: &K) -> Option<V> {
        let handle = *self.map.get(key)?;
        Some(self.list.get(handle).value.clone())
    }

    fn has(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        let handle = self.map.remove(key)?;
        Some(self.list.remove(handle).value)
    }

    fn purge(&mut self) {
        self.map.clear();
        self.list.clear();
    }

    fn keys(&self) -> Vec<K> {
        self.list.iter().map(|e| e.key.clone()).collect()
    }

    fn values(&self) -> Vec<V> {
        self.list.iter().map(|e| e.value.clone()).collect()
    }

    fn range(&self, skip: usize, take: usize) -> Vec<(K, V)> {
        self.list.iter().skip(skip).take(take).map(|e| (e.key.clone(), e.value.clone())).collect()
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn algorithm(&self) -> &'static str {
        "lru"
    }

    fn delete_oldest(&mut self) -> Option<(K, V)> {
        let (_, entry) = self.list.pop_back()?;
        self.map.remove(&entry.key);
        self.notify_evict(EvictionReason::Manual, &entry.key, &entry.value);
        Some((entry.key, entry.value))
    }

    fn set_eviction_callback(&mut self, callback: Option<EvictionCallback<K, V>>) {
        self.on_evict = callback;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_promotes_to_front() {
        let mut cache = LruCache::new(2);
        cache.set(1, "a");
        cache.set(2, "b");
        assert_eq!(cache.get(&1), Some("a"));
        cache.set(3, "c");
        // 2 was least-recently-used after touching 1, so it gets evicted.
        assert!(!cache.has(&2));
        assert!(cache.has(&1));
        assert!(cache.has(&3));
    }

    #[test]
    fn set_over_capacity_evicts_lru() {
        let mut cache = LruCache::new(1);
        cache.set("a", 1);
        cache.set("b", 2);
        assert!(!cache.has(&"a"));
        assert_eq!(cache.get(&"b"), Some(2));
    }

    #[test]
    fn eviction_callback_fires_with_capacity_reason() {
        let mut cache = LruCache::new(1);
        let evicted = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = evicted.clone();
        cache.set_eviction_callback(Some(Box::new(move |reason, k, v| {
            sink.lock().unwrap().push((reason, *k, *v));
        })));
        cache.set(1, 10);
        cache.set(2, 20);
        let log = evicted.lock().unwrap();
        assert_eq!(log.as_slice(), &[(EvictionReason::Capacity, 1, 10)]);
    }

    #[test]
    fn peek_does_not_change_order() {
        let mut cache = LruCache::new(2);
        cache.set(1, "a");
        cache.set(2, "b");
        assert_eq!(cache.peek(&1), Some("a"));
        cache.set(3, "c");
        assert!(!cache.has(&1));
    }
}
