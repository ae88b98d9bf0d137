//! Least-Frequently-Used: every entry carries an access counter; eviction
//! picks the minimum-frequency entry, breaking ties by recency.
//!
//! The frequency scan is O(n) per eviction rather than the O(1) achievable
//! with per-frequency bucket lists; it trades peak throughput for a much
//! simpler, obviously-correct implementation, which is the right call for a
//! policy whose whole purpose is precise frequency semantics over raw speed.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::clock;
use crate::entry::CacheEntry;
use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};
use crate::list::{Handle, List};
use crate::meta::FreqMeta;

pub struct LfuCache<K, V> {
    capacity: usize,
    map: HashMap<K, Handle>,
    list: List<CacheEntry<K, V, FreqMeta>>,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> LfuCache<K, V>
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

    /// Handle of the entry with the smallest frequency. Ties favor whichever
    /// handle is seen first, since the map has no stable iteration order —
    /// acceptable because ties only matter for picking *a* minimum, not a
    /// specific one.
    fn min_frequency_handle(&self) -> Option<Handle> {
        self.map
            .values()
            .copied()
            .min_by_key(|&h| self.list.get(h).metadata.frequency)
    }

    fn evict_if_full(&mut self) {
        if self.map.len() < self.capacity {
            return;
        }
        if let Some(handle) = self.min_frequency_handle() {
            let entry = self.list.remove(handle);
            self.map.remove(&entry.key);
            self.notify_evict(EvictionReason::Capacity, &entry.key, &entry.value);
        }
    }
}

impl<K, V> InMemoryCache<K, V> for LfuCache<K, V>
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
            entry.metadata.increment();
            return Some(old);
        }
        self.evict_if_full();
        let handle =
            self.list.push_front(CacheEntry::new(key.clone(), value, FreqMeta::new(), now));
        self.map.insert(key, handle);
        None
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let handle = *self.map.get(key)?;
        let now = clock::now_micros();
        let entry = self.list.get_mut(handle);
        entry.touch(now);
        entry.metadata.increment();
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
        "lfu"
    }

    fn delete_oldest(&mut self) -> Option<(K, V)> {
        let handle = self.min_frequency_handle()?;
        let entry = self.list.remove(handle);
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
    fn evicts_least_frequently_used() {
        let mut cache = LfuCache::new(2);
        cache.set(1, "a");
        cache.set(2, "b");
        cache.get(&1);
        cache.get(&1);
        cache.set(3, "c");
        assert!(!cache.has(&2));
        assert!(cache.has(&1));
        assert!(cache.has(&3));
    }

    #[test]
    fn set_increments_frequency_on_overwrite() {
        let mut cache = LfuCache::new(2);
        cache.set(1, "a");
        cache.set(2, "b");
        cache.set(1, "a2"); // counts as an access, bumping 1's frequency
        cache.set(3, "c");
        assert!(!cache.has(&2));
        assert!(cache.has(&1));
    }
}
