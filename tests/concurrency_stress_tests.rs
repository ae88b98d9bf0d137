//! Stress tests for the thread-safety and sharding wrappers under high
//! contention, in the spirit of the teacher's `concurrent_stress_tests.rs`.

use std::sync::Arc;

use embercache::engine::InMemoryCache;
use embercache::policy::LruCache;
use embercache::{Locking, Sharded};

const NUM_THREADS: u32 = 16;
const OPS_PER_THREAD: u32 = 5_000;

#[test]
fn stress_locking_lru_high_contention() {
    let cache: Locking<LruCache<u64, u64>> = Locking::new(LruCache::new(1000));
    let mut pool = scoped_threadpool::Pool::new(NUM_THREADS);
    pool.scoped(|scope| {
        for t in 0..NUM_THREADS {
            let mut cache = cache.clone();
            scope.execute(move || {
                for i in 0..OPS_PER_THREAD {
                    let key = (t * OPS_PER_THREAD + i) as u64 % 2000;
                    cache.set(key, key);
                    cache.get(&key);
                }
            });
        }
    });
    assert!(cache.len() <= 1000);
}

#[test]
fn stress_sharded_lru_distributes_across_shards() {
    let cache: Arc<parking_lot::Mutex<Sharded<LruCache<u64, u64>>>> =
        Arc::new(parking_lot::Mutex::new(Sharded::new(16, || LruCache::new(200))));
    let mut pool = scoped_threadpool::Pool::new(NUM_THREADS);
    pool.scoped(|scope| {
        for t in 0..NUM_THREADS {
            let cache = Arc::clone(&cache);
            scope.execute(move || {
                for i in 0..OPS_PER_THREAD {
                    let key = (t * OPS_PER_THREAD + i) as u64;
                    cache.lock().set(key, key);
                }
            });
        }
    });
    let cache = cache.lock();
    assert!(cache.len() <= 16 * 200);
    assert!(cache.len() > 0);
}
