//! S3-FIFO: three FIFO queues instead of a single LRU list. New keys land in
//! `small`; an entry that has been accessed at least once survives small's
//! eviction by moving to `main` (a FIFO with CLOCK-style second chances via
//! a capped per-entry counter); everything else is dropped into `ghost`
//! (keys only) so a near-term re-insertion skips `small` and goes straight
//! to `main`.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::clock;
use crate::entry::CacheEntry;
use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};
use crate::list::{Handle, List};
use crate::meta::CappedFreqMeta;

#[derive(Clone, Copy)]
enum Location {
    Small(Handle),
    Main(Handle),
    Ghost(Handle),
}

pub struct S3FifoCache<K, V> {
    capacity: usize,
    small_capacity: usize,
    main_capacity: usize,
    small: List<CacheEntry<K, V, CappedFreqMeta>>,
    main: List<CacheEntry<K, V, CappedFreqMeta>>,
    ghost: List<K>,
    index: HashMap<K, Location>,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> S3FifoCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        let small_capacity = (capacity / 10).max(1).min(capacity);
        Self {
            capacity,
            small_capacity,
            main_capacity: capacity - small_capacity,
            small: List::new(),
            main: List::new(),
            ghost: List::new(),
            index: HashMap::new(),
            on_evict: None,
        }
    }

    fn notify_evict(&mut self, reason: EvictionReason, key: &K, value: &V) {
        if let Some(cb) = &mut self.on_evict {
            cb(reason, key, value);
        }
    }

    /// Pops `small`'s tail: gives it a second chance in `main` if it has ever
    /// been accessed, otherwise drops it into `ghost`. Returns whether an
    /// entry actually left the cache (a second-chance promotion does not).
    fn evict_from_small(&mut self) -> bool {
        let Some((_, mut entry)) = self.small.pop_back() else { return false };
        self.index.remove(&entry.key);
        if entry.metadata.frequency > 0 {
            entry.metadata = CappedFreqMeta::default();
            let key = entry.key.clone();
            let h = self.main.push_front(entry);
            self.index.insert(key, Location::Main(h));
            false
        } else {
            self.notify_evict(EvictionReason::Capacity, &entry.key, &entry.value);
            if self.ghost.len() >= self.main_capacity.max(1) {
                if let Some((_, old_key)) = self.ghost.pop_back() {
                    self.index.remove(&old_key);
                }
            }
            let h = self.ghost.push_front(entry.key.clone());
            self.index.insert(entry.key, Location::Ghost(h));
            true
        }
    }

    /// Pops `main`'s tail: gives it one more lap (decrementing its counter)
    /// if it has been accessed since its last lap, otherwise evicts it.
    fn evict_from_main(&mut self) -> bool {
        let Some((_, mut entry)) = self.main.pop_back() else { return false };
        if entry.metadata.frequency > 0 {
            entry.metadata.decrement();
            let key = entry.key.clone();
            let h = self.main.push_front(entry);
            self.index.insert(key, Location::Main(h));
            false
        } else {
            self.index.remove(&entry.key);
            self.notify_evict(EvictionReason::Capacity, &entry.key, &entry.value);
            true
        }
    }

    /// Makes room for a new `small` admission: caps `small` at its own
    /// budget regardless of overall fullness, and also respects the total
    /// capacity once `small` alone can't free enough room.
    fn evict_until_small_has_room(&mut self) {
        while self.small.len() >= self.small_capacity
            || self.small.len() + self.main.len() >= self.capacity
        {
            if self.small.len() >= self.small_capacity && !self.small.is_empty() {
                self.evict_from_small();
            } else if !self.main.is_empty() {
                self.evict_from_main();
            } else if !self.small.is_empty() {
                self.evict_from_small();
            } else {
                return;
            }
        }
    }

    /// Makes room for a ghost-hit admission straight into `main`.
    fn evict_until_main_has_room(&mut self) {
        while self.small.len() + self.main.len() >= self.capacity {
            if !self.main.is_empty() {
                self.evict_from_main();
            } else if !self.small.is_empty() {
                self.evict_from_small();
            } else {
                return;
            }
        }
    }
}

impl<K, V> InMemoryCache<K, V> for S3FifoCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        let now = clock::now_micros();
        match self.index.get(&key).copied() {
            Some(Location::Small(h)) => {
                let entry = self.small.get_mut(h);
                let old = std::mem::replace(&mut entry.value, value);
                entry.touch(now);
                entry.metadata.increment();
                Some(old)
            }
            Some(Location::Main(h)) => {
                let entry = self.main.get_mut(h);
                let old = std::mem::replace(&mut entry.value, value);
                entry.touch(now);
                entry.metadata.increment();
                Some(old)
            }
            Some(Location::Ghost(h)) => {
                self.ghost.remove(h);
                self.index.remove(&key);
                self.evict_until_main_has_room();
                let entry = CacheEntry::new(key.clone(), value, CappedFreqMeta::default(), now);
                let h = self.main.push_front(entry);
                self.index.insert(key, Location::Main(h));
                None
            }
            None => {
                self.evict_until_small_has_room();
                let entry = CacheEntry::new(key.clone(), value, CappedFreqMeta::default(), now);
                let h = self.small.push_front(entry);
                self.index.insert(key, Location::Small(h));
                None
            }
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        match self.index.get(key).copied() {
            Some(Location::Small(h)) => {
                let entry = self.small.get_mut(h);
                entry.metadata.increment();
                Some(entry.value.clone())
            }
            Some(Location::Main(h)) => {
                let entry = self.main.get_mut(h);
                entry.metadata.increment();
                Some(entry.value.clone())
            }
            _ => None,
        }
    }

    fn peek(&self, key: &K) -> Option<V> {
        match self.index.get(key)? {
            Location::Small(h) => Some(self.small.get(*h).value.clone()),
            Location::Main(h) => Some(self.main.get(*h).value.clone()),
            Location::Ghost(_) => None,
        }
    }

    fn has(&self, key: &K) -> bool {
        matches!(self.index.get(key), Some(Location::Small(_)) | Some(Location::Main(_)))
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        match self.index.remove(key)? {
            Location::Small(h) => Some(self.small.remove(h).value),
            Location::Main(h) => Some(self.main.remove(h).value),
            Location::Ghost(h) => {
                self.ghost.remove(h);
                None
            }
        }
    }

    fn purge(&mut self) {
        self.small.clear();
        self.main.clear();
        self.ghost.clear();
        self.index.clear();
    }

    fn keys(&self) -> Vec<K> {
        self.main.iter().chain(self.small.iter()).map(|e| e.key.clone()).collect()
    }

    fn values(&self) -> Vec<V> {
        self.main.iter().chain(self.small.iter()).map(|e| e.value.clone()).collect()
    }

    fn range(&self, skip: usize, take: usize) -> Vec<(K, V)> {
        self.main
            .iter()
            .chain(self.small.iter())
            .skip(skip)
            .take(take)
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.small.len() + self.main.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn algorithm(&self) -> &'static str {
        "s3-fifo"
    }

    fn delete_oldest(&mut self) -> Option<(K, V)> {
        let victim = if !self.small.is_empty() { self.small.pop_back() } else { self.main.pop_back() };
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
    fn accessed_small_entry_survives_into_main() {
        let mut cache = S3FifoCache::new(20); // small_capacity = max(1, 2) = 2
        cache.set(1, "a");
        cache.get(&1); // bump frequency so it earns a second chance
        cache.set(2, "b");
        cache.set(3, "c"); // overflows small_capacity, evicting 1 into main
        assert!(cache.has(&1));
        assert!(matches!(cache.index.get(&1), Some(Location::Main(_))));
    }

    #[test]
    fn never_accessed_small_entry_is_dropped_to_ghost() {
        let mut cache = S3FifoCache::new(20);
        cache.set(1, "a");
        cache.set(2, "b");
        cache.set(3, "c");
        assert!(!cache.has(&1));
        assert!(matches!(cache.index.get(&1), Some(Location::Ghost(_))));
    }

    #[test]
    fn ghost_hit_inserts_directly_into_main() {
        let mut cache = S3FifoCache::new(20);
        cache.set(1, "a");
        cache.set(2, "b");
        cache.set(3, "c"); // 1 -> ghost
        cache.set(1, "a-again");
        assert!(matches!(cache.index.get(&1), Some(Location::Main(_))));
    }
}
