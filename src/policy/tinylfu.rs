//! TinyLFU: an LRU main store whose admission decisions are gated by a
//! Count-Min Sketch frequency estimate. When the cache is full, a new key
//! only displaces the current LRU victim if its estimated frequency is
//! strictly greater — otherwise the candidate is simply never cached.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::clock;
use crate::entry::CacheEntry;
use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};
use crate::list::{Handle, List};
use crate::sketch::{CountMinSketch, Doorkeeper};

pub struct TinyLfuCache<K, V> {
    capacity: usize,
    map: HashMap<K, Handle>,
    list: List<CacheEntry<K, V, ()>>,
    sketch: CountMinSketch,
    doorkeeper: Doorkeeper,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> TinyLfuCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        Self {
            capacity,
            map: HashMap::new(),
            list: List::new(),
            sketch: CountMinSketch::new(capacity * 8),
            doorkeeper: Doorkeeper::new(capacity * 64),
            on_evict: None,
        }
    }

    fn notify_evict(&mut self, reason: EvictionReason, key: &K, value: &V) {
        if let Some(cb) = &mut self.on_evict {
            cb(reason, key, value);
        }
    }

    /// Only increments the sketch on a key's second sighting, gated by the
    /// doorkeeper, so a long tail of one-off keys never drowns out genuinely
    /// hot keys' frequency estimate.
    fn record_access(&mut self, key: &K) {
        if self.doorkeeper.insert(key) {
            self.sketch.increment(key);
        }
    }
}

impl<K, V> InMemoryCache<K, V> for TinyLfuCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        self.record_access(&key);
        let now = clock::now_micros();
        if let Some(&handle) = self.map.get(&key) {
            let entry = self.list.get_mut(handle);
            let old = std::mem::replace(&mut entry.value, value);
            entry.touch(now);
            self.list.move_to_front(handle);
            return Some(old);
        }
        if self.map.len() < self.capacity {
            let handle = self.list.push_front(CacheEntry::new(key.clone(), value, (), now));
            self.map.insert(key, handle);
            return None;
        }
        let victim_handle = self.list.back()?;
        let victim_key = self.list.get(victim_handle).key.clone();
        if self.sketch.estimate(&key) <= self.sketch.estimate(&victim_key) {
            // Candidate loses the admission contest; it is simply not cached.
            return None;
        }
        let (_, victim_entry) = self.list.pop_back().expect("checked non-empty above");
        self.map.remove(&victim_entry.key);
        self.notify_evict(EvictionReason::Capacity, &victim_entry.key, &victim_entry.value);
        let handle = self.list.push_front(CacheEntry::new(key.clone(), value, (), now));
        self.map.insert(key, handle);
        None
    }

    fn get(&mut self, key: &K) -> Option<V> {
        self.record_access(key);
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
        "tinylfu"
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
    fn frequent_candidate_displaces_cold_victim() {
        let mut cache = TinyLfuCache::new(1);
        cache.set("cold", 1);
        // Build up frequency for "hot" via repeated failed admission attempts
        // and reads of keys that raise its sketch estimate indirectly isn't
        // possible without it being cached; instead, drive the doorkeeper by
        // reading the candidate key directly before insertion.
        for _ in 0..5 {
            cache.get(&"hot");
        }
        cache.set("hot", 2);
        assert!(cache.has(&"hot"));
        assert!(!cache.has(&"cold"));
    }

    #[test]
    fn cold_candidate_is_rejected_without_disturbing_cache() {
        let mut cache = TinyLfuCache::new(1);
        cache.set("incumbent", 1);
        for _ in 0..10 {
            cache.get(&"incumbent");
        }
        cache.set("newcomer", 2);
        assert!(cache.has(&"incumbent"));
        assert!(!cache.has(&"newcomer"));
    }
}
