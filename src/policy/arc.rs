//! Adaptive Replacement Cache (Megiddo & Modha): two real lists (`t1`
//! recency, `t2` frequency) and two ghost lists (`b1`, `b2`) that remember
//! keys without their values, used to adapt the recency/frequency balance
//! `p` as the workload shifts.
//!
//! `get` only resolves hits against `t1`/`t2` — a ghost list has no value to
//! return. The full adaptive logic (ghost hits, `REPLACE`, and growing the
//! ghost lists) runs in `set`, which matches how this cache is meant to be
//! driven: a `get` miss is followed by a loader fetch, then a `set` of the
//! freshly loaded value, exactly the point at which ARC's ghost-hit
//! adaptation applies.

use hashbrown::HashMap;
use std::hash::Hash;

use crate::clock;
use crate::entry::CacheEntry;
use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};
use crate::list::{Handle, List};

#[derive(Clone, Copy)]
enum Location {
    T1(Handle),
    T2(Handle),
    B1(Handle),
    B2(Handle),
}

pub struct ArcCache<K, V> {
    capacity: usize,
    p: usize,
    t1: List<CacheEntry<K, V, ()>>,
    t2: List<CacheEntry<K, V, ()>>,
    b1: List<K>,
    b2: List<K>,
    index: HashMap<K, Location>,
    on_evict: Option<EvictionCallback<K, V>>,
}

impl<K, V> ArcCache<K, V>
where
    K: Clone + Eq + Hash,
{
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than zero");
        Self {
            capacity,
            p: 0,
            t1: List::new(),
            t2: List::new(),
            b1: List::new(),
            b2: List::new(),
            index: HashMap::new(),
            on_evict: None,
        }
    }

    fn notify_evict(&mut self, reason: EvictionReason, key: &K, value: &V) {
        if let Some(cb) = &mut self.on_evict {
            cb(reason, key, value);
        }
    }

    /// `REPLACE` from the ARC paper: evicts the LRU of `t1` into `b1`, unless
    /// `t1` is smaller than the adaptive target `p` (or equal to it while the
    /// current miss came from `b2`), in which case `t2`'s LRU moves to `b2`.
    fn replace(&mut self, key_seen_in_b2: bool) {
        let t1_len = self.t1.len();
        let prefer_t1 = t1_len >= 1 && (t1_len > self.p || (key_seen_in_b2 && t1_len == self.p));
        if prefer_t1 {
            if let Some((_, entry)) = self.t1.pop_back() {
                self.notify_evict(EvictionReason::Capacity, &entry.key, &entry.value);
                let h = self.b1.push_front(entry.key.clone());
                self.index.insert(entry.key, Location::B1(h));
            }
        } else if let Some((_, entry)) = self.t2.pop_back() {
            self.notify_evict(EvictionReason::Capacity, &entry.key, &entry.value);
            let h = self.b2.push_front(entry.key.clone());
            self.index.insert(entry.key, Location::B2(h));
        }
    }
}

impl<K, V> InMemoryCache<K, V> for ArcCache<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        let now = clock::now_micros();
        match self.index.get(&key).copied() {
            Some(Location::T1(h)) => {
                let mut entry = self.t1.remove(h);
                let old = std::mem::replace(&mut entry.value, value);
                entry.touch(now);
                let new_h = self.t2.push_front(entry);
                self.index.insert(key, Location::T2(new_h));
                Some(old)
            }
            Some(Location::T2(h)) => {
                let entry = self.t2.get_mut(h);
                let old = std::mem::replace(&mut entry.value, value);
                entry.touch(now);
                self.t2.move_to_front(h);
                Some(old)
            }
            Some(Location::B1(h)) => {
                let (b1_len, b2_len) = (self.b1.len(), self.b2.len());
                let delta = b2_len.checked_div(b1_len).unwrap_or(1).max(1);
                self.p = (self.p + delta).min(self.capacity);
                self.b1.remove(h);
                self.index.remove(&key);
                self.replace(false);
                let entry = CacheEntry::new(key.clone(), value, (), now);
                let new_h = self.t2.push_front(entry);
                self.index.insert(key, Location::T2(new_h));
                None
            }
            Some(Location::B2(h)) => {
                let (b1_len, b2_len) = (self.b1.len(), self.b2.len());
                let delta = b1_len.checked_div(b2_len).unwrap_or(1).max(1);
                self.p = self.p.saturating_sub(delta);
                self.b2.remove(h);
                self.index.remove(&key);
                self.replace(true);
                let entry = CacheEntry::new(key.clone(), value, (), now);
                let new_h = self.t2.push_front(entry);
                self.index.insert(key, Location::T2(new_h));
                None
            }
            None => {
                let (t1_len, b1_len) = (self.t1.len(), self.b1.len());
                let (t2_len, b2_len) = (self.t2.len(), self.b2.len());
                if t1_len + b1_len == self.capacity {
                    if t1_len < self.capacity {
                        if let Some((_, old_key)) = self.b1.pop_back() {
                            self.index.remove(&old_key);
                        }
                        self.replace(false);
                    } else if let Some((_, entry)) = self.t1.pop_back() {
                        self.index.remove(&entry.key);
                        self.notify_evict(EvictionReason::Capacity, &entry.key, &entry.value);
                    }
                } else if t1_len + t2_len + b1_len + b2_len >= self.capacity {
                    if t1_len + t2_len + b1_len + b2_len >= 2 * self.capacity {
                        if let Some((_, old_key)) = self.b2.pop_back() {
                            self.index.remove(&old_key);
                        }
                    }
                    self.replace(false);
                }
                let entry = CacheEntry::new(key.clone(), value, (), now);
                let h = self.t1.push_front(entry);
                self.index.insert(key, Location::T1(h));
                None
            }
        }
    }

    fn get(&mut self, key: &K) -> Option<V> {
        match self.index.get(key).copied() {
            Some(Location::T1(h)) => {
                let entry = self.t1.remove(h);
                let value = entry.value.clone();
                let new_h = self.t2.push_front(entry);
                self.index.insert(key.clone(), Location::T2(new_h));
                Some(value)
            }
            Some(Location::T2(h)) => {
                self.t2.move_to_front(h);
                Some(self.t2.get(h).value.clone())
            }
            _ => None,
        }
    }

    fn peek(&self, key: &K) -> Option<V> {
        match self.index.get(key)? {
            Location::T1(h) => Some(self.t1.get(*h).value.clone()),
            Location::T2(h) => Some(self.t2.get(*h).value.clone()),
            _ => None,
        }
    }

    fn has(&self, key: &K) -> bool {
        matches!(self.index.get(key), Some(Location::T1(_)) | Some(Location::T2(_)))
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        match self.index.remove(key)? {
            Location::T1(h) => Some(self.t1.remove(h).value),
            Location::T2(h) => Some(self.t2.remove(h).value),
            Location::B1(h) => {
                self.b1.remove(h);
                None
            }
            Location::B2(h) => {
                self.b2.remove(h);
                None
            }
        }
    }

    fn purge(&mut self) {
        self.t1.clear();
        self.t2.clear();
        self.b1.clear();
        self.b2.clear();
        self.index.clear();
        self.p = 0;
    }

    fn keys(&self) -> Vec<K> {
        self.t2.iter().chain(self.t1.iter()).map(|e| e.key.clone()).collect()
    }

    fn values(&self) -> Vec<V> {
        self.t2.iter().chain(self.t1.iter()).map(|e| e.value.clone()).collect()
    }

    fn range(&self, skip: usize, take: usize) -> Vec<(K, V)> {
        self.t2
            .iter()
            .chain(self.t1.iter())
            .skip(skip)
            .take(take)
            .map(|e| (e.key.clone(), e.value.clone()))
            .collect()
    }

    fn len(&self) -> usize {
        self.t1.len() + self.t2.len()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn algorithm(&self) -> &'static str {
        "arc"
    }

    fn delete_oldest(&mut self) -> Option<(K, V)> {
        let t1_len = self.t1.len();
        let victim = if t1_len > 0 && t1_len >= self.p.max(1) {
            self.t1.pop_back()
        } else {
            self.t2.pop_back().or_else(|| self.t1.pop_back())
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
    fn hit_in_t1_promotes_to_t2() {
        let mut cache = ArcCache::new(4);
        cache.set(1, "a");
        assert_eq!(cache.get(&1), Some("a"));
        assert_eq!(cache.get(&1), Some("a"));
        assert!(cache.has(&1));
    }

    #[test]
    fn ghost_hit_in_b1_grows_p_and_admits_without_shrinking_cache() {
        let mut cache = ArcCache::new(2);
        cache.set(1, "a");
        cache.set(2, "b");
        cache.set(3, "c"); // forces 1 into b1 as a ghost
        assert!(!cache.has(&1));
        let p_before = cache.p;
        cache.set(1, "a-again"); // ghost hit in b1
        assert!(cache.p >= p_before);
        assert!(cache.has(&1));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn delete_removes_from_whichever_list_holds_the_key() {
        let mut cache = ArcCache::new(2);
        cache.set(1, "a");
        assert_eq!(cache.delete(&1), Some("a"));
        assert!(!cache.has(&1));
    }

    #[test]
    fn purge_resets_adaptive_parameter() {
        let mut cache = ArcCache::new(2);
        cache.set(1, "a");
        cache.set(2, "b");
        cache.set(3, "c");
        cache.set(1, "a-again");
        cache.purge();
        assert_eq!(cache.p, 0);
        assert_eq!(cache.len(), 0);
    }
}
