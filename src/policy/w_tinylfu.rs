//! Window TinyLFU (Caffeine's design): a small LRU admission window absorbs
//! bursty one-off traffic; everything that survives the window competes,
//! via the same sketch-gated admission contest as [`crate::policy::tinylfu`],
//! for a place in a segmented (`probationary`/`protected`) main store. A
//! second access to a probationary entry promotes it to `protected`; a full
//! `protected` segment demotes its LRU entry back down to make room.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::clock;
use crate::entry::CacheEntry;
use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};
use crate::list::{Handle, List};
use crate::sketch::{CountMinSketch, Doorkeeper};

#[derive(Clone, Copy)]
enum Location {
    Window(Handle),
    Probationary(Handle),
    Protected(Handle),
}

pub struct WTinyLfuCache<K, V> {
    capacity: usize,
    window_capacity: usize,
    main_capacity: usize,
    protected_capacity: usize,
    window: List<CacheEntry<K, V, ()>>,
    probationary: List<CacheEntry<K, V, ()>>,
    protected: List<CacheEntry<K, V, ()>>,
    index: HashMap<K, Location>,
    sketch: CountMinSketch,
    doorkeeper: Doorkeeper,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> WTinyLfuCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        let window_capacity = (capacity / 100).max(1).min(capacity);
        let main_capacity = capacity - window_capacity;
        let protected_capacity = (main_capacity * 4 / 5).max(if main_capacity > 0 { 1 } else { 0 });
        Self {
            capacity,
            window_capacity,
            main_capacity,
            protected_capacity,
            window: List::new(),
            probationary: List::new(),
            protected: List::new(),
            index: HashMap::new(),
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

    fn record_access(&mut self, key: &K) {
        if self.doorkeeper.insert(key) {
            self.sketch.increment(key);
        }
    }

    fn promote_to_protected(&mut self, handle: Handle) -> V
    where
        V: Clone,
    {
        let entry = self.probationary.remove(handle);
        if self.protected.len() >= self.protected_capacity && self.protected_capacity > 0 {
            if let Some((_, demoted)) = self.protected.pop_back() {
                let h = self.probationary.push_front(demoted);
                let key = self.probationary.get(h).key.clone();
                self.index.insert(key, Location::Probationary(h));
            }
        }
        let value = entry.value.clone();
        let key = entry.key.clone();
        let h = self.protected.push_front(entry);
        self.index.insert(key, Location::Protected(h));
        value
    }

    /// Window overflowed; evict its LRU entry and run the admission contest
    /// for a place in `probationary`.
    fn admit_from_window(&mut self) {
        let Some((_, candidate)) = self.window.pop_back() else { return };
        self.index.remove(&candidate.key);
        if self.probationary.len() + self.protected.len() < self.main_capacity {
            let key = candidate.key.clone();
            let h = self.probationary.push_front(candidate);
            self.index.insert(key, Location::Probationary(h));
            return;
        }
        let Some(victim_handle) = self.probationary.back() else {
            // Main is full but only with protected entries; candidate loses.
            self.notify_evict(EvictionReason::Capacity, &candidate.key, &candidate.value);
            return;
        };
        let victim_key = self.probationary.get(victim_handle).key.clone();
        if self.sketch.estimate(&candidate.key) > self.sketch.estimate(&victim_key) {
            let (_, victim) = self.probationary.pop_back().expect("checked above");
            self.index.remove(&victim.key);
            self.notify_evict(EvictionReason::Capacity, &victim.key, &victim.value);
            let key = candidate.key.clone();
            let h = self.probationary.push_front(candidate);
            self.index.insert(key, Location::Probationary(h));
        } else {
            self.notify_evict(EvictionReason::Capacity, &candidate.key, &candidate.value);
        }
    }
}

impl<K, V> InMemoryCache<K, V> for WTinyLfuCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        self.record_access(&key);
        let now = clock::now_micros();
        match self.index.get(&key).copied() {
            Some(Location::Window(h)) => {
                let entry = self.window.get_mut(h);
                let old = std::mem::replace(&mut entry.value, value);
                entry.touch(now);
                self.window.move_to_front(h);
                Some(old)
            }
            Some(Location::Protected(h)) => {
                let entry = self.protected.get_mut(h);
                let old = std::mem::replace(&mut entry.value, value);
                entry.touch(now);
                self.protected.move_to_front(h);
                Some(old)
            }
            Some(Location::Probationary(h)) => {
                let entry = self.probationary.get_mut(h);
                let old = std::mem::replace(&mut entry.value, value);
                entry.touch(now);
                self.promote_to_protected(h);
                Some(old)
            }
            None => {
                let entry = CacheEntry::new(key.clone(), value, (), now);
                let h = self.window.push_front(entry);
                self.index.insert(key, Location::Window(h));
                if self.window.len() > self.window_capacity {
                    self.admit_from_window();
                }
                None
            }
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        self.record_access(key);
        match self.index.get(key).copied() {
            Some(Location::Window(h)) => {
                self.window.move_to_front(h);
                let now = clock::now_micros();
                let entry = self.window.get_mut(h);
                entry.touch(now);
                Some(entry.value.clone())
            }
            Some(Location::Protected(h)) => {
                self.protected.move_to_front(h);
                let now = clock::now_micros();
                let entry = self.protected.get_mut(h);
                entry.touch(now);
                Some(entry.value.clone())
            }
            Some(Location::Probationary(h)) => Some(self.promote_to_protected(h)),
            None => None,
        }
    }

    fn peek(&self, key: &K) -> Option<V> {
        match self.index.get(key)? {
            Location::Window(h) => Some(self.window.get(*h).value.clone()),
            Location::Probationary(h) => Some(self.probationary.get(*h).value.clone()),
            Location::Protected(h) => Some(self.protected.get(*h).value.clone()),
        }
    }

    fn has(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        match self.index.remove(key)? {
            Location::Window(h) => Some(self.window.remove(h).value),
            Location::Probationary(h) => Some(self.probationary.remove(h).value),
            Location::Protected(h) => Some(self.protected.remove(h).value),
        }
    }

    fn purge(&mut self) {
        self.window.clear();
        self.probationary.clear();
        self.protected.clear();
        self.index.clear();
    }

    fn keys(&self) -> Vec<K> {
        self.protected
            .iter()
            .chain(self.probationary.iter())
            .chain(self.window.iter())
            .map(|e| e.key.clone())
            .collect()
    }

    fn values(&self) -> Vec<V> {
        self.protected
            .iter()
            .chain(self.probationary.iter())
            .chain(self.window.iter())
            .map(|e| e.value.clone())
            .collect()
    }

    fn range(&self, skip: usize, take: usize) -> Vec<(K, V)> {
        self.protected
            .iter()
            .chain(self.probationary.iter())
            .chain(self.window.iter())
            .skip(skip)
            .take(take)
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.window.len() + self.probationary.len() + self.protected.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn algorithm(&self) -> &'static str {
        "w-tinylfu"
    }

    fn delete_oldest(&mut self) -> Option<(K, V)> {
        let victim = if !self.window.is_empty() {
            self.window.pop_back()
        } else if !self.probationary.is_empty() {
            self.probationary.pop_back()
        } else {
            self.protected.pop_back()
        };
        let (_, entry) = victim?;
        self.index.remove(&entry.key);
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
    fn new_keys_start_in_window() {
        let mut cache = WTinyLfuCache::new(200);
        cache.set(1, "a");
        assert!(matches!(cache.index.get(&1), Some(Location::Window(_))));
    }

    #[test]
    fn second_access_promotes_out_of_probationary() {
        let mut cache = WTinyLfuCache::new(200);
        // window_capacity = max(1, 2) = 2 for capacity 200; force an overflow.
        for i in 0..5 {
            cache.set(i, i);
        }
        // Whichever key made it to probationary, a read should promote it.
        let probationary_key =
            cache.index.iter().find_map(|(k, loc)| matches!(loc, Location::Probationary(_)).then_some(*k));
        if let Some(k) = probationary_key {
            cache.get(&k);
            assert!(matches!(cache.index.get(&k), Some(Location::Protected(_))));
        }
    }

    #[test]
    fn len_matches_total_across_segments() {
        let mut cache = WTinyLfuCache::new(10);
        for i in 0..6 {
            cache.set(i, i);
        }
        assert_eq!(cache.len(), 6);
    }
}
