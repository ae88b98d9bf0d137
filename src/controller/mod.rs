//! `HotCache`: the top-level cache controller layering TTL, stale
//! revalidation, missing-key (negative) caching, single-flight loader
//! dedup, jitter, and copy-on-read/write hooks over a policy engine from
//! [`crate::policy`].
//!
//! This is new surface the teacher never had (the teacher's caches are
//! bare, synchronous, TTL-free data structures); it is built the way the
//! teacher builds its own thin wrappers (delegate to an inner
//! `InMemoryCache`, install an eviction callback at construction) plus
//! `tracing` events at the points a production loader-cache logs: miss,
//! loader dispatch, revalidation outcome, janitor sweep.

mod janitor;

use std::hash::Hash;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use crate::clock::{Clock, RealClock};
use crate::config::{HotCacheConfig, RevalidationErrorPolicy};
use crate::engine::{EvictionCallback, EvictionReason, InMemoryCache};
use crate::error::ControllerError;
use crate::singleflight::SingleFlight;

use janitor::Janitor;

/// A loader call for one key: `Ok(Some(v))` found it, `Ok(None)` confirms
/// the key is absent upstream (a candidate for missing-key caching),
/// `Err(e)` is a loader failure.
pub type Loader<K, V, E> = Arc<dyn Fn(&K) -> Result<Option<V>, E> + Send + Sync>;

/// Clones (or otherwise transforms) a value on the way in or out of the
/// cache, e.g. `Arc::new(|v: &Vec<u8>| v.clone())` to defend against
/// callers mutating a value they got back from `get`.
pub type CopyHook<V> = Arc<dyn Fn(&V) -> V + Send + Sync>;

type EngineBox<K, V> = Box<dyn InMemoryCache<K, Item<V>> + Send>;

/// Result of a single `get`: `(value, present)` on success, where `present`
/// distinguishes a confirmed-missing key (`(None, false)`) from an ordinary
/// miss that never got recorded.
pub type GetResult<V, E> = Result<(Option<V>, bool), ControllerError<E>>;

/// A stored payload. `value.is_none()` marks a missing-key entry: it
/// exists only to suppress repeated loader calls for a key known to be
/// absent upstream.
///
/// Public only so [`EngineBox`]-typed fields on [`HotCacheParams`] are
/// nameable from outside this crate; callers virtually never construct
/// one directly (`HotCacheParams::new` and `set`/`set_missing` do it for
/// you).
#[derive(Clone)]
pub struct Item<V> {
    value: Option<V>,
    expire_at_micros: i64,
    stale_at_micros: i64,
}

impl<V> Item<V> {
    fn has_value(&self) -> bool {
        self.value.is_some()
    }

    fn is_expired(&self, now: i64) -> bool {
        self.expire_at_micros != 0 && now >= self.expire_at_micros
    }

    fn is_stale(&self, now: i64) -> bool {
        self.stale_at_micros != 0 && now >= self.stale_at_micros
    }
}

/// Constructor parameters for [`HotCache`]. Plain public fields, built
/// with [`HotCacheParams::new`] and struct-update syntax for anything
/// beyond the defaults, in the same spirit as [`HotCacheConfig`].
pub struct HotCacheParams<K, V, E> {
    pub primary: EngineBox<K, V>,
    pub missing: Option<EngineBox<K, V>>,
    pub shared_missing: bool,
    pub config: HotCacheConfig,
    pub loaders: Vec<Loader<K, V, E>>,
    pub revalidation_loaders: Vec<Loader<K, V, E>>,
    pub eviction_callback: Option<EvictionCallback<K, V>>,
    pub copy_on_read: Option<CopyHook<V>>,
    pub copy_on_write: Option<CopyHook<V>>,
    pub clock: Arc<dyn Clock>,
}

impl<K, V, E> HotCacheParams<K, V, E>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(primary: EngineBox<K, V>, config: HotCacheConfig) -> Self {
        Self {
            primary,
            missing: None,
            shared_missing: false,
            config,
            loaders: Vec::new(),
            revalidation_loaders: Vec::new(),
            eviction_callback: None,
            copy_on_read: None,
            copy_on_write: None,
            clock: Arc::new(RealClock),
        }
    }
}

struct Inner<K, V, E> {
    primary: Mutex<EngineBox<K, V>>,
    missing: Option<Mutex<EngineBox<K, V>>>,
    shared_missing: bool,
    clock: Arc<dyn Clock>,
    ttl_micros: i64,
    stale_micros: i64,
    missing_ttl_micros: i64,
    jitter_upper_bound_micros: i64,
    loaders: Vec<Loader<K, V, E>>,
    revalidation_loaders: Vec<Loader<K, V, E>>,
    revalidation_error_policy: RevalidationErrorPolicy,
    eviction_hook: Arc<Mutex<Option<EvictionCallback<K, V>>>>,
    copy_on_read: Option<CopyHook<V>>,
    copy_on_write: Option<CopyHook<V>>,
    single_flight: SingleFlight<K, Option<V>, E>,
    janitor: StdMutex<Option<Janitor>>,
}

/// The top-level cache: TTL/stale expiry, missing-key caching, loader
/// chains deduplicated through a single-flight group, jitter, and
/// copy-on-read/write, layered over one primary [`InMemoryCache`] engine
/// (and optionally a second one for missing-key entries).
///
/// Cheap to clone: clones share the same underlying state via `Arc`, so a
/// `HotCache` can be moved into the janitor thread and background
/// revalidation closures.
pub struct HotCache<K, V, E> {
    inner: Arc<Inner<K, V, E>>,
}

impl<K, V, E> Clone for HotCache<K, V, E> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K, V, E> HotCache<K, V, E>
where
    K: Clone + Eq + Hash + std::fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(mut params: HotCacheParams<K, V, E>) -> Self {
        assert!(params.config.capacity > 0, "capacity must be greater than zero");

        let eviction_hook: Arc<Mutex<Option<EvictionCallback<K, V>>>> =
            Arc::new(Mutex::new(params.eviction_callback.take()));
        install_forwarding_callback(&mut params.primary, Arc::clone(&eviction_hook));
        if let Some(missing) = params.missing.as_mut() {
            install_forwarding_callback(missing, Arc::clone(&eviction_hook));
        }

        let ttl_micros = params.config.ttl.map(duration_to_micros).unwrap_or(0);
        let stale_micros = params.config.stale_after_ttl.map(duration_to_micros).unwrap_or(0);
        let missing_ttl_micros = params
            .config
            .missing_ttl
            .map(duration_to_micros)
            .unwrap_or(ttl_micros);
        let jitter_upper_bound_micros =
            params.config.ttl_jitter.map(duration_to_micros).unwrap_or(0);

        let inner = Inner {
            primary: Mutex::new(params.primary),
            missing: params.missing.map(Mutex::new),
            shared_missing: params.shared_missing,
            clock: params.clock,
            ttl_micros,
            stale_micros,
            missing_ttl_micros,
            jitter_upper_bound_micros,
            loaders: params.loaders,
            revalidation_loaders: params.revalidation_loaders,
            revalidation_error_policy: params.config.revalidation_error_policy,
            eviction_hook,
            copy_on_read: params.copy_on_read,
            copy_on_write: params.copy_on_write,
            single_flight: SingleFlight::new(),
            janitor: StdMutex::new(None),
        };
        let cache = Self { inner: Arc::new(inner) };
        if let Some(interval) = params.config.janitor_interval {
            cache.start_janitor(interval);
        }
        cache
    }

    fn now(&self) -> i64 {
        self.inner.clock.now_micros()
    }

    fn missing_enabled(&self) -> bool {
        self.inner.shared_missing || self.inner.missing.is_some()
    }

    fn missing_engine(&self) -> &Mutex<EngineBox<K, V>> {
        if self.inner.shared_missing {
            &self.inner.primary
        } else {
            self.inner.missing.as_ref().expect("missing-key caching is not enabled for this cache")
        }
    }

    fn copy_read(&self, value: &V) -> V {
        match &self.inner.copy_on_read {
            Some(hook) => hook(value),
            None => value.clone(),
        }
    }

    fn copy_write(&self, value: &V) -> V {
        match &self.inner.copy_on_write {
            Some(hook) => hook(value),
            None => value.clone(),
        }
    }

    fn apply_jitter(&self, ttl_micros: i64) -> i64 {
        if ttl_micros == 0 || self.inner.jitter_upper_bound_micros <= 0 {
            return ttl_micros;
        }
        let upper = self.inner.jitter_upper_bound_micros as f64;
        let u: f64 = rand::thread_rng().gen_range(0.0..1.0);
        let lambda = 3.0 / upper.max(1.0);
        let draw = (-((1.0 - u).ln()) / lambda).min(upper);
        // `draw` is clamped to `upper`, which came from an i64 microsecond count.
        #[allow(clippy::cast_possible_truncation)]
        let draw = draw as i64;
        ttl_micros.saturating_add(draw)
    }

    fn build_item(&self, value: Option<V>, ttl_micros: i64, now: i64) -> Item<V> {
        let ttl = self.apply_jitter(ttl_micros);
        let expire_at_micros = if ttl > 0 { now + ttl } else { 0 };
        let stale_at_micros = if expire_at_micros != 0 && self.inner.stale_micros > 0 {
            (expire_at_micros - self.inner.stale_micros).max(now)
        } else {
            0
        };
        Item { value, expire_at_micros, stale_at_micros }
    }

    /// Inserts `value` for `key` with the configured default TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.inner.ttl_micros);
    }

    /// Inserts `value` for `key` with an explicit TTL in microseconds (`0`
    /// disables expiry for this entry).
    pub fn set_with_ttl(&self, key: K, value: V, ttl_micros: i64) {
        let value = self.copy_write(&value);
        let now = self.now();
        let item = self.build_item(Some(value), ttl_micros, now);
        if self.missing_enabled() && !self.inner.shared_missing {
            self.missing_engine().lock().delete(&key);
        }
        self.inner.primary.lock().set(key, item);
    }

    /// Records `key` as known-absent upstream, so further `get` calls
    /// don't hit the loader chain until the entry expires.
    ///
    /// # Panics
    /// Panics if missing-key caching was not enabled for this cache.
    pub fn set_missing(&self, key: K) {
        self.set_missing_with_ttl(key, self.inner.missing_ttl_micros);
    }

    pub fn set_missing_with_ttl(&self, key: K, ttl_micros: i64) {
        assert!(self.missing_enabled(), "missing-key caching is not enabled for this cache");
        let now = self.now();
        let item = self.build_item(None, ttl_micros, now);
        self.missing_engine().lock().set(key, item);
    }

    /// Looks up `key` using the configured loader chain on a miss.
    /// Returns `(Some(value), true)` on a hit or successful load,
    /// `(None, false)` for a confirmed-missing key, or `Err` if the
    /// loader chain failed.
    pub fn get(&self, key: &K) -> GetResult<V, E> {
        self.get_with_loaders(key, &self.inner.loaders.clone())
    }

    pub fn get_with_loaders(
        &self,
        key: &K,
        loaders: &[Loader<K, V, E>],
    ) -> GetResult<V, E> {
        let now = self.now();
        if let Some(resolved) = self.lookup(key, now) {
            return Ok(resolved);
        }

        let key_for_load = key.clone();
        let loaders = loaders.to_vec();
        let (result, _executed) = self.inner.single_flight.call(key.clone(), || {
            run_loader_chain(&loaders, &key_for_load)
        });
        let found = result.map_err(ControllerError::loader)?;
        match &found {
            Some(value) => self.set(key.clone(), value.clone()),
            None if self.missing_enabled() => self.set_missing(key.clone()),
            None => {}
        }
        let present = found.is_some();
        Ok((found, present))
    }

    /// Looks up `key` without invoking loaders or triggering revalidation.
    pub fn peek(&self, key: &K) -> Option<V> {
        let now = self.now();
        if let Some(item) = self.inner.primary.lock().peek(key) {
            if !item.is_expired(now) {
                return item.value.as_ref().map(|v| self.copy_read(v));
            }
        }
        None
    }

    pub fn peek_many(&self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|k| self.peek(k)).collect()
    }

    /// True only for live, value-bearing entries.
    pub fn has(&self, key: &K) -> bool {
        self.peek(key).is_some()
    }

    fn lookup(&self, key: &K, now: i64) -> Option<(Option<V>, bool)> {
        let found = self.inner.primary.lock().get(key);
        if let Some(item) = found {
            if item.is_expired(now) {
                self.evict_expired(&self.inner.primary, key, EvictionReason::Ttl);
            } else {
                if item.is_stale(now) {
                    self.schedule_revalidation(key.clone());
                }
                return Some((item.value.as_ref().map(|v| self.copy_read(v)), item.has_value()));
            }
        }
        if !self.inner.shared_missing && self.inner.missing.is_some() {
            let engine = self.missing_engine();
            let found = engine.lock().get(key);
            if let Some(item) = found {
                if item.is_expired(now) {
                    self.evict_expired(engine, key, EvictionReason::Ttl);
                } else {
                    return Some((None, false));
                }
            }
        }
        None
    }

    fn evict_expired(&self, engine: &Mutex<EngineBox<K, V>>, key: &K, reason: EvictionReason) {
        let removed = engine.lock().delete(key);
        if let Some(item) = removed {
            if let Some(value) = item.value {
                if let Some(hook) = self.inner.eviction_hook.lock().as_mut() {
                    hook(reason, key, &value);
                }
            }
        }
    }

    fn schedule_revalidation(&self, key: K) {
        if self.inner.revalidation_loaders.is_empty() {
            return;
        }
        let cache = self.clone();
        std::thread::spawn(move || {
            cache.revalidate(&key);
        });
    }

    fn revalidate(&self, key: &K) {
        tracing::debug!(?key, "revalidation dispatched");
        match run_loader_chain(&self.inner.revalidation_loaders, key) {
            Ok(Some(value)) => {
                tracing::debug!(?key, "revalidation succeeded");
                self.set(key.clone(), value);
            }
            Ok(None) => {
                tracing::debug!(?key, "revalidation confirmed missing");
                if self.missing_enabled() {
                    self.set_missing(key.clone());
                }
            }
            Err(_err) => {
                tracing::debug!(?key, "revalidation failed");
                match self.inner.revalidation_error_policy {
                    RevalidationErrorPolicy::DropOnError => {}
                    RevalidationErrorPolicy::KeepOnError => {
                        let old = self.inner.primary.lock().peek(key);
                        if let Some(value) = old.and_then(|item| item.value) {
                            self.set(key.clone(), value);
                        }
                    }
                }
            }
        }
    }

    pub fn get_many(&self, keys: &[K]) -> Vec<GetResult<V, E>> {
        keys.iter().map(|k| self.get(k)).collect()
    }

    pub fn get_many_with_loaders(
        &self,
        keys: &[K],
        loaders: &[Loader<K, V, E>],
    ) -> Vec<GetResult<V, E>> {
        keys.iter().map(|k| self.get_with_loaders(k, loaders)).collect()
    }

    /// Loader-error-intolerant variant of [`HotCache::get`]: panics if the
    /// loader chain returns an error.
    pub fn must_get(&self, key: &K) -> (Option<V>, bool)
    where
        E: std::fmt::Debug,
    {
        self.get(key).unwrap_or_else(|e| panic!("loader failed: {e:?}"))
    }

    pub fn delete(&self, key: &K) -> Option<V> {
        let removed_primary = self.inner.primary.lock().delete(key).and_then(|i| i.value);
        if !self.inner.shared_missing {
            if let Some(missing) = &self.inner.missing {
                missing.lock().delete(key);
            }
        }
        removed_primary
    }

    pub fn delete_many(&self, keys: &[K]) -> Vec<Option<V>> {
        keys.iter().map(|k| self.delete(k)).collect()
    }

    pub fn purge(&self) {
        self.inner.primary.lock().purge();
        if !self.inner.shared_missing {
            if let Some(missing) = &self.inner.missing {
                missing.lock().purge();
            }
        }
    }

    /// Live, value-bearing keys only.
    pub fn keys(&self) -> Vec<K> {
        self.values_and_keys().into_iter().map(|(k, _)| k).collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.values_and_keys().into_iter().map(|(_, v)| v).collect()
    }

    fn values_and_keys(&self) -> Vec<(K, V)> {
        let now = self.now();
        self.inner
            .primary
            .lock()
            .range(0, usize::MAX)
            .into_iter()
            .filter(|(_, item)| !item.is_expired(now))
            .filter_map(|(k, item)| item.value.map(|v| (k, v)))
            .collect()
    }

    pub fn range(&self, skip: usize, take: usize) -> Vec<(K, V)> {
        self.values_and_keys().into_iter().skip(skip).take(take).collect()
    }

    /// One-shot preload: calls `loader` for every key in `keys` and stores
    /// whatever it returns (value, confirmed-missing, or propagates the
    /// first error encountered).
    pub fn warm_up(&self, keys: &[K], loader: &Loader<K, V, E>) -> Result<(), E> {
        for key in keys {
            match loader(key) {
                Ok(Some(value)) => self.set(key.clone(), value),
                Ok(None) if self.missing_enabled() => self.set_missing(key.clone()),
                Ok(None) => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Starts the background janitor at `interval`, sweeping both engines
    /// for expired entries. A second call is a no-op.
    pub fn start_janitor(&self, interval: Duration) {
        let mut guard = self.inner.janitor.lock().unwrap();
        if guard.is_some() {
            return;
        }
        let cache = self.clone();
        *guard = Some(Janitor::start(interval, move || cache.sweep_expired()));
    }

    /// Signals the janitor to stop and waits for it to exit. Idempotent.
    pub fn stop_janitor(&self) {
        if let Some(janitor) = self.inner.janitor.lock().unwrap().take() {
            janitor.stop();
        }
    }

    fn sweep_expired(&self) {
        let now = self.now();
        let expired = self.sweep_engine(&self.inner.primary, now);
        let expired_missing = if !self.inner.shared_missing {
            self.inner.missing.as_ref().map(|m| self.sweep_engine(m, now)).unwrap_or(0)
        } else {
            0
        };
        tracing::debug!(expired, expired_missing, "janitor sweep complete");
    }

    fn sweep_engine(&self, engine: &Mutex<EngineBox<K, V>>, now: i64) -> usize {
        let expired_keys: Vec<K> = engine
            .lock()
            .range(0, usize::MAX)
            .into_iter()
            .filter(|(_, item)| item.is_expired(now))
            .map(|(k, _)| k)
            .collect();
        let count = expired_keys.len();
        for key in &expired_keys {
            self.evict_expired(engine, key, EvictionReason::Ttl);
        }
        count
    }
}

fn run_loader_chain<K, V, E>(loaders: &[Loader<K, V, E>], key: &K) -> Result<Option<V>, E> {
    for loader in loaders {
        if let Some(value) = loader(key)? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn install_forwarding_callback<K, V>(
    engine: &mut EngineBox<K, V>,
    hook: Arc<Mutex<Option<EvictionCallback<K, V>>>>,
) where
    K: Clone + Eq + Hash + 'static,
    V: Clone + 'static,
{
    engine.set_eviction_callback(Some(Box::new(move |reason, key: &K, item: &Item<V>| {
        if let Some(value) = &item.value {
            if let Some(cb) = hook.lock().as_mut() {
                cb(reason, key, value);
            }
        }
    })));
}

fn duration_to_micros(d: Duration) -> i64 {
    i64::try_from(d.as_micros()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::VirtualClock;
    use crate::policy::LruCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn params(capacity: usize) -> HotCacheParams<&'static str, u64, &'static str> {
        HotCacheParams::new(
            Box::new(LruCache::new(capacity)),
            HotCacheConfig { capacity, ..HotCacheConfig::default() },
        )
    }

    #[test]
    fn set_then_get_hits() {
        let cache: HotCache<&str, u64, &str> = HotCache::new(params(10));
        cache.set("a", 1);
        assert_eq!(cache.get(&"a").unwrap(), (Some(1), true));
    }

    #[test]
    fn get_on_unknown_key_with_no_loaders_misses() {
        let cache: HotCache<&str, u64, &str> = HotCache::new(params(10));
        assert_eq!(cache.get(&"missing").unwrap(), (None, false));
    }

    #[test]
    fn loader_chain_is_used_on_miss_and_result_is_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let loader: Loader<&str, u64, &str> = Arc::new(move |_k| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(Some(42))
        });
        let mut p = params(10);
        p.loaders.push(loader);
        let cache: HotCache<&str, u64, &str> = HotCache::new(p);
        assert_eq!(cache.get(&"x").unwrap(), (Some(42), true));
        assert_eq!(cache.get(&"x").unwrap(), (Some(42), true));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ttl_expiry_makes_entry_a_miss() {
        let clock = Arc::new(VirtualClock::new());
        let mut p = params(10);
        p.clock = clock.clone();
        p.config.ttl = Some(Duration::from_micros(100));
        let cache: HotCache<&str, u64, &str> = HotCache::new(p);
        cache.set("a", 1);
        assert_eq!(cache.get(&"a").unwrap(), (Some(1), true));
        clock.advance(200);
        assert_eq!(cache.get(&"a").unwrap(), (None, false));
    }

    #[test]
    fn missing_key_caching_suppresses_loader_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let loader: Loader<&str, u64, &str> = Arc::new(move |_k| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        });
        let mut p = params(10);
        p.missing = Some(Box::new(LruCache::new(10)));
        p.loaders.push(loader);
        let cache: HotCache<&str, u64, &str> = HotCache::new(p);
        for _ in 0..5 {
            assert_eq!(cache.get(&"m").unwrap(), (None, false));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_removes_from_primary() {
        let cache: HotCache<&str, u64, &str> = HotCache::new(params(10));
        cache.set("a", 1);
        assert_eq!(cache.delete(&"a"), Some(1));
        assert_eq!(cache.get(&"a").unwrap(), (None, false));
    }

    #[test]
    fn single_flight_deduplicates_concurrent_loader_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let loader: Loader<&str, u64, &str> = Arc::new(move |_k| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(30));
            Ok(Some(7))
        });
        let mut p = params(10);
        p.loaders.push(loader);
        let cache: HotCache<&'static str, u64, &'static str> = HotCache::new(p);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get(&"x").unwrap())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), (Some(7), true));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn janitor_reaps_expired_entries() {
        let clock = Arc::new(VirtualClock::new());
        let mut p = params(10);
        p.clock = clock.clone();
        p.config.ttl = Some(Duration::from_micros(100));
        let cache: HotCache<&str, u64, &str> = HotCache::new(p);
        cache.set("a", 1);
        cache.set("b", 2);
        clock.advance(200);
        cache.sweep_expired();
        assert_eq!(cache.get(&"a").unwrap(), (None, false));
        assert_eq!(cache.get(&"b").unwrap(), (None, false));
    }
}
