//! Instrumentation wrapper: wraps any [`InMemoryCache`] engine and records
//! insertion/hit/miss/eviction counters onto a [`MetricsCollector`].
//!
//! This mirrors the original size-accounting metrics module's shape
//! (a small trait plus a concrete counter struct) but counts *events*
//! rather than bytes, since the spec's capacity model is entry-count based.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};

/// Sink for cache events. `NoopCollector` is zero-cost; `AtomicCollector` is
/// a ready-to-use counter set a Prometheus (or similar) exporter can read.
pub trait MetricsCollector {
    fn record_insertion(&self) {}
    fn record_hit(&self) {}
    fn record_miss(&self) {}
    fn record_eviction(&self, _reason: EvictionReason) {}
    fn set_size(&self, _len: usize) {}
}

/// A collector that discards every event; the default when metrics aren't needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCollector;

impl MetricsCollector for NoopCollector {}

/// Lock-free counters for insertions, hits, misses, and evictions by reason.
#[derive(Debug, Default)]
pub struct AtomicCollector {
    pub insertion_total: AtomicU64,
    pub hit_total: AtomicU64,
    pub miss_total: AtomicU64,
    pub eviction_capacity_total: AtomicU64,
    pub eviction_ttl_total: AtomicU64,
    pub eviction_manual_total: AtomicU64,
    pub eviction_stale_total: AtomicU64,
    pub size: AtomicU64,
}

impl AtomicCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hit_total.load(Ordering::Relaxed) as f64;
        let misses = self.miss_total.load(Ordering::Relaxed) as f64;
        if hits + misses == 0.0 {
            0.0
        } else {
            hits / (hits + misses)
        }
    }

    pub fn eviction_total(&self) -> u64 {
        self.eviction_capacity_total.load(Ordering::Relaxed)
            + self.eviction_ttl_total.load(Ordering::Relaxed)
            + self.eviction_manual_total.load(Ordering::Relaxed)
            + self.eviction_stale_total.load(Ordering::Relaxed)
    }
}

impl MetricsCollector for AtomicCollector {
    fn record_insertion(&self) {
        self.insertion_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_hit(&self) {
        self.hit_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.miss_total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_eviction(&self, reason: EvictionReason) {
        let counter = match reason {
            EvictionReason::Capacity => &self.eviction_capacity_total,
            EvictionReason::Ttl => &self.eviction_ttl_total,
            EvictionReason::Manual => &self.eviction_manual_total,
            EvictionReason::Stale => &self.eviction_stale_total,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn set_size(&self, len: usize) {
        self.size.store(len as u64, Ordering::Relaxed);
    }
}

/// Delegates every operation to `E`, recording hit/miss/insertion/eviction
/// events onto `C` along the way.
pub struct Instrumented<E, C> {
    inner: E,
    collector: std::sync::Arc<C>,
}

impl<E, C> Instrumented<E, C> {
    /// Wraps `inner`, installing an eviction callback that forwards every
    /// engine-driven eviction (capacity pressure, `delete_oldest`) to
    /// `collector`. Explicit `delete`/`purge` calls are recorded separately
    /// by this wrapper's own methods, since the engines don't treat those
    /// as evictions.
    pub fn new<K, V>(mut inner: E, collector: C) -> Self
    where
        K: Clone + Eq + Hash + 'static,
        V: Clone + 'static,
        E: InMemoryCache<K, V>,
        C: MetricsCollector + Send + Sync + 'static,
    {
        let collector = std::sync::Arc::new(collector);
        let forwarded = std::sync::Arc::clone(&collector);
        inner.set_eviction_callback(Some(Box::new(move |reason, _k: &K, _v: &V| {
            forwarded.record_eviction(reason);
        })));
        Self { inner, collector }
    }

    pub fn collector(&self) -> &C {
        &self.collector
    }
}

impl<K, V, E, C> InMemoryCache<K, V> for Instrumented<E, C>
where
    K: Clone + Eq + Hash,
    V: Clone,
    K: 'static,
    V: 'static,
    E: InMemoryCache<K, V>,
    C: MetricsCollector + Send + Sync + 'static,
{
    fn set(&mut self, key: K, value: V) -> Option<V> {
        self.collector.record_insertion();
        let old = self.inner.set(key, value);
        self.collector.set_size(self.inner.len());
        old
    }

    fn get(&mut self, key: &K) -> Option<V> {
        let result = self.inner.get(key);
        if result.is_some() {
            self.collector.record_hit();
        } else {
            self.collector.record_miss();
        }
        result
    }

    fn peek(&self, key: &K) -> Option<V> {
        self.inner.peek(key)
    }

    fn has(&self, key: &K) -> bool {
        self.inner.has(key)
    }

    fn delete(&mut self, key: &K) -> Option<V> {
        let result = self.inner.delete(key);
        if result.is_some() {
            self.collector.record_eviction(EvictionReason::Manual);
            self.collector.set_size(self.inner.len());
        }
        result
    }

    fn purge(&mut self) {
        self.inner.purge();
        self.collector.set_size(0);
    }

    fn keys(&self) -> Vec<K> {
        self.inner.keys()
    }

    fn values(&self) -> Vec<V> {
        self.inner.values()
    }

    fn range(&self, skip: usize, take: usize) -> Vec<(K, V)> {
        self.inner.range(skip, take)
    }

    fn len(&self) -> usize {
        self.inner.len()
    }

    fn capacity(&self) -> usize {
        self.inner.capacity()
    }

    fn algorithm(&self) -> &'static str {
        self.inner.algorithm()
    }

    fn delete_oldest(&mut self) -> Option<(K, V)> {
        // The callback installed in `new` already records this via the
        // engine's own notify-on-evict path; just keep the size gauge fresh.
        let result = self.inner.delete_oldest();
        if result.is_some() {
            self.collector.set_size(self.inner.len());
        }
        result
    }

    /// Composes `callback` with the metrics-recording callback installed in
    /// [`Instrumented::new`], so replacing it never silences the collector.
    fn set_eviction_callback(&mut self, callback: Option<EvictionCallback<K, V>>) {
        let collector = std::sync::Arc::clone(&self.collector);
        let mut user_callback = callback;
        self.inner.set_eviction_callback(Some(Box::new(move |reason, k: &K, v: &V| {
            collector.record_eviction(reason);
            if let Some(cb) = user_callback.as_mut() {
                cb(reason, k, v);
            }
        })));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::LruCache;

    #[test]
    fn hits_and_misses_are_counted() {
        let mut cache = Instrumented::new(LruCache::new(2), AtomicCollector::new());
        cache.set(1, "a");
        cache.get(&1);
        cache.get(&2);
        assert_eq!(cache.collector().hit_total.load(Ordering::Relaxed), 1);
        assert_eq!(cache.collector().miss_total.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn capacity_eviction_is_forwarded_from_the_installed_callback() {
        let mut cache = Instrumented::new(LruCache::new(1), AtomicCollector::new());
        cache.set(1, "a");
        cache.set(2, "b"); // evicts 1 inside the engine via the callback installed in `new`
        assert_eq!(cache.collector().insertion_total.load(Ordering::Relaxed), 2);
        assert_eq!(cache.collector().eviction_capacity_total.load(Ordering::Relaxed), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn explicit_delete_is_counted_as_manual_eviction() {
        let mut cache = Instrumented::new(LruCache::new(2), AtomicCollector::new());
        cache.set(1, "a");
        cache.delete(&1);
        assert_eq!(cache.collector().eviction_manual_total.load(Ordering::Relaxed), 1);
    }
}
