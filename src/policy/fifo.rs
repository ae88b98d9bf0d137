//! First-In-First-Out: insertion order is eviction order. Unlike LRU, reads
//! never reorder entries — only `set` of a brand-new key affects position.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::clock;
use crate::entry::CacheEntry;
use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};
use crate::list::{Handle, List};

pub struct FifoCache<K, V> {
    capacity: usize,
    map: HashMap<K, Handle>,
    list: List<CacheEntry<K, V, ()>>,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> FifoCache<K, V>
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

impl<K, V> InMemoryCache<K, V> for FifoCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&handle) = self.map.get(&key) {
            // Overwriting an existing key updates the value but keeps its
            // original place in the queue.
            let entry = self.list.get_mut(handle);
            let old = std::mem::replace(&mut entry.value, value);
            return Some(old);
        }
        self.evict_if_full();
        let now = clock::now_micros();
        let handle = self.list.push_front(CacheEntry::new(key.clone(), value, (), now));
        self.map.insert(key, handle);
        None
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let handle = *self.map.get(key)?;
        Some(self.list.get(handle).value.clone())
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
        "fifo"
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
