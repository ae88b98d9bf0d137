//! End-to-end controller scenarios, mirroring the concrete examples a
//! design review would check against: LRU/FIFO eviction-order contrast,
//! TTL+stale revalidation, single-flight loader dedup, missing-key
//! caching, and janitor reclamation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use embercache::controller::{HotCache, HotCacheParams};
use embercache::policy::{FifoCache, LruCache};
use embercache::HotCacheConfig;

fn lru_params(capacity: usize) -> HotCacheParams<&'static str, u64, ()> {
    HotCacheParams::new(
        Box::new(LruCache::new(capacity)),
        HotCacheConfig { capacity, ..HotCacheConfig::default() },
    )
}

fn fifo_params(capacity: usize) -> HotCacheParams<&'static str, u64, ()> {
    HotCacheParams::new(
        Box::new(FifoCache::new(capacity)),
        HotCacheConfig { capacity, ..HotCacheConfig::default() },
    )
}

#[test]
fn scenario_lru_access_protects_from_eviction() {
    let cache: HotCache<&str, u64, ()> = HotCache::new(lru_params(2));
    cache.set("a", 1);
    cache.set("b", 2);
    cache.get(&"a").unwrap();
    cache.set("c", 3);
    assert!(cache.has(&"a"));
    assert!(!cache.has(&"b"));
    assert!(cache.has(&"c"));
}

#[test]
fn scenario_fifo_access_does_not_protect_from_eviction() {
    let cache: HotCache<&str, u64, ()> = HotCache::new(fifo_params(2));
    cache.set("a", 1);
    cache.set("b", 2);
    cache.get(&"a").unwrap();
    cache.set("c", 3);
    assert!(!cache.has(&"a"));
    assert!(cache.has(&"b"));
    assert!(cache.has(&"c"));
}

#[test]
fn scenario_ttl_and_stale_triggers_background_revalidation() {
    let reval_calls = Arc::new(AtomicUsize::new(0));
    let reval_calls_clone = Arc::clone(&reval_calls);

    let mut params = lru_params(10);
    params.config.ttl = Some(Duration::from_millis(100));
    params.config.stale_after_ttl = Some(Duration::from_millis(40));
    params.revalidation_loaders.push(Arc::new(move |_k: &&str| {
        reval_calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(Some(99))
    }));
    let cache: HotCache<&str, u64, ()> = HotCache::new(params);

    cache.set("k", 1);
    std::thread::sleep(Duration::from_millis(70));
    let (value, present) = cache.get(&"k").unwrap();
    assert_eq!((value, present), (Some(1), true));

    std::thread::sleep(Duration::from_millis(50));
    assert_eq!(reval_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn scenario_single_flight_collapses_concurrent_loader_calls() {
    let loader_calls = Arc::new(AtomicUsize::new(0));
    let loader_calls_clone = Arc::clone(&loader_calls);
    let mut params = lru_params(10);
    params.loaders.push(Arc::new(move |_k: &&str| {
        loader_calls_clone.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(50));
        Ok(Some(7))
    }));
    let cache: HotCache<&'static str, u64, ()> = HotCache::new(params);

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let cache = cache.clone();
            std::thread::spawn(move || cache.get(&"x").unwrap())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), (Some(7), true));
    }
    assert_eq!(loader_calls.load(Ordering::SeqCst), 1);
}

#[test]
fn scenario_missing_key_cache_suppresses_loader_calls() {
    let loader_calls = Arc::new(AtomicUsize::new(0));
    let loader_calls_clone = Arc::clone(&loader_calls);
    let mut params = lru_params(10);
    params.missing = Some(Box::new(LruCache::new(10)));
    params.loaders.push(Arc::new(move |_k: &&str| {
        loader_calls_clone.fetch_add(1, Ordering::SeqCst);
        Ok(None)
    }));
    let cache: HotCache<&str, u64, ()> = HotCache::new(params);

    cache.set_missing("m");
    for _ in 0..1000 {
        assert_eq!(cache.get(&"m").unwrap(), (None, false));
    }
    assert_eq!(loader_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn scenario_janitor_reaps_expired_entries_and_fires_callbacks() {
    use embercache::EvictionReason;
    use std::sync::Mutex;

    let evicted: Arc<Mutex<Vec<(&'static str, EvictionReason)>>> = Arc::new(Mutex::new(Vec::new()));
    let evicted_clone = Arc::clone(&evicted);

    let mut params = lru_params(2000);
    params.config.ttl = Some(Duration::from_millis(10));
    params.config.janitor_interval = Some(Duration::from_millis(5));
    params.eviction_callback = Some(Box::new(move |reason, key: &&str, _v: &u64| {
        evicted_clone.lock().unwrap().push((*key, reason));
    }));
    let cache: HotCache<&'static str, u64, ()> = HotCache::new(params);

    let keys: Vec<&'static str> = (0..1000)
        .map(|i| Box::leak(i.to_string().into_boxed_str()) as &'static str)
        .collect();
    for k in &keys {
        cache.set(k, 1);
    }

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(cache.keys().len(), 0);
    let ttl_evictions =
        evicted.lock().unwrap().iter().filter(|(_, r)| *r == EvictionReason::Ttl).count();
    assert_eq!(ttl_evictions, 1000);
    cache.stop_janitor();
}
