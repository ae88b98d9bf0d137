//! 2Q (Johnson & Shasha): a short FIFO admission queue (`a1in`) filters
//! one-off keys before they earn a place in the long-term LRU (`am`); a
//! ghost FIFO (`a1out`) remembers recently-evicted `a1in` keys so a second
//! sighting promotes straight into `am` instead of restarting in `a1in`.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::clock;
use crate::entry::CacheEntry;
use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};
use crate::list::{Handle, List};

#[derive(Clone, Copy)]
enum Location {
    A1In(Handle),
    Am(Handle),
    A1Out(Handle),
}

pub struct TwoQCache<K, V> {
    capacity: usize,
    a1in_capacity: usize,
    a1out_capacity: usize,
    a1in: List<CacheEntry<K, V, ()>>,
    am: List<CacheEntry<K, V, ()>>,
    a1out: List<K>,
    index: HashMap<K, Location>,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> TwoQCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        Self {
            capacity,
            a1in_capacity: (capacity / 4).max(1),
            a1out_capacity: (capacity / 2).max(1),
            a1in: List::new(),
            am: List::new(),
            a1out: List::new(),
            index: HashMap::new(),
            on_evict: None,
        }
    }

    fn notify_evict(&mut self, reason: EvictionReason, key: &K, value: &V) {
        if let Some(cb) = &mut self.on_evict {
            cb(reason, key, value);
        }
    }

    fn trim_a1out(&mut self) {
        while self.a1out.len() > self.a1out_capacity {
            if let Some((_, key)) = self.a1out.pop_back() {
                self.index.remove(&key);
            }
        }
    }

    /// Moves `a1in`'s LRU entry to the ghost queue, or discards it outright
    /// if `am` is empty and the cache is at capacity (mirrors ARC's direct
    /// drop when there is no room left anywhere).
    fn age_a1in(&mut self) {
        if let Some((_, entry)) = self.a1in.pop_back() {
            self.notify_evict(EvictionReason::Capacity, &entry.key, &entry.value);
            let h = self.a1out.push_front(entry.key.clone());
            self.index.insert(entry.key, Location::A1Out(h));
            self.trim_a1out();
        }
    }

    /// Enforces both `a1in`'s own quota (scan resistance) and the overall
    /// capacity, run after a new entry has already been linked in.
    fn evict_if_needed(&mut self) {
        while self.a1in.len() > self.a1in_capacity {
            self.age_a1in();
        }
        while self.a1in.len() + self.am.len() > self.capacity {
            if !self.a1in.is_empty() {
                self.age_a1in();
            } else if let Some((_, entry)) = self.am.pop_back() {
                self.index.remove(&entry.key);
                self.notify_evict(EvictionReason::Capacity, &entry.key, &entry.value);
            } else {
                break;
            }
        }
    }
}

impl<K, V> InMemoryCache<K, V> for TwoQCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        let now = clock::now_micros();
        match self.index.get(&key).copied() {
            Some(Location::A1In(h)) => {
                let entry = self.a1in.get_mut(h);
                let old = std::mem::replace(&mut entry.value, value);
                entry.touch(now);
                Some(old)
            }
            Some(Location::Am(h)) => {
                let entry = self.am.get_mut(h);
                let old = std::mem::replace(&mut entry.value, value);
                entry.touch(now);
                self.am.move_to_front(h);
                Some(old)
            }
            Some(Location::A1Out(h)) => {
                self.a1out.remove(h);
                self.index.remove(&key);
                let entry = CacheEntry::new(key.clone(), value, (), now);
                let new_h = self.am.push_front(entry);
                self.index.insert(key, Location::Am(new_h));
                self.evict_if_needed();
                None
            }
            None => {
                let entry = CacheEntry::new(key.clone(), value, (), now);
                let h = self.a1in.push_front(entry);
                self.index.insert(key, Location::A1In(h));
                self.evict_if_needed();
                None
            }
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        match self.index.get(key).copied() {
            Some(Location::A1In(h)) => Some(self.a1in.get(h).value.clone()),
            Some(Location::Am(h)) => {
                self.am.move_to_front(h);
                Some(self.am.get(h).value.clone())
            }
            _ => None,
        }
    }

    fn peek(&self, key: &K) -> Option<V> {
        match self.index.get(key)? {
            Location::A1In(h) => Some(self.a1in.get(*h).value.clone()),
            Location::Am(h) => Some(self.am.get(*h).value.clone()),
            _ => None,
        }
    }

    fn has(&self, key: &K) -> bool {
        matches!(self.index.get(key), Some(Location::A1In(_)) | Some(Location::Am(_)))
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        match self.index.remove(key)? {
            Location::A1In(h) => Some(self.a1in.remove(h).value),
            Location::Am(h) => Some(self.am.remove(h).value),
            Location::A1Out(h) => {
                self.a1out.remove(h);
                None
            }
        }
    }

    fn purge(&mut self) {
        self.a1in.clear();
        self.am.clear();
        self.a1out.clear();
        self.index.clear();
    }

    fn keys(&self) -> Vec<K> {
        self.am.iter().chain(self.a1in.iter()).map(|e| e.key.clone()).collect()
    }

    fn values(&self) -> Vec<V> {
        self.am.iter().chain(self.a1in.iter()).map(|e| e.value.clone()).collect()
    }

    fn range(&self, skip: usize, take: usize) -> Vec<(K, V)> {
        self.am
            .iter()
            .chain(self.a1in.iter())
            .skip(skip)
            .take(take)
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.a1in.len() + self.am.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn algorithm(&self) -> &'static str {
        "2q"
    }

    fn delete_oldest(&mut self) -> Option<(K, V)> {
        let victim = if !self.a1in.is_empty() { self.a1in.pop_back() } else { self.am.pop_back() };
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
    fn fresh_key_enters_a1in_and_reads_do_not_promote() {
        let mut cache = TwoQCache::new(8);
        cache.set(1, "a");
        assert!(matches!(cache.index.get(&1), Some(Location::A1In(_))));
        cache.get(&1);
        assert!(matches!(cache.index.get(&1), Some(Location::A1In(_))));
    }

    #[test]
    fn ghost_hit_promotes_directly_to_am() {
        let mut cache = TwoQCache::new(2);
        cache.set(1, "a"); // a1in_capacity = max(1, 2/4) = 1, so next insert ages this out
        cache.set(2, "b");
        assert!(matches!(cache.index.get(&1), Some(Location::A1Out(_))) || !cache.has(&1));
        cache.set(1, "a-again");
        assert!(matches!(cache.index.get(&1), Some(Location::Am(_))));
    }

    #[test]
    fn delete_oldest_prefers_a1in() {
        let mut cache = TwoQCache::new(8);
        cache.set(1, "a");
        cache.set(2, "b");
        let (key, _) = cache.delete_oldest().unwrap();
        assert_eq!(key, 1);
    }
}
