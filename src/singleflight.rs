//! Single-flight call de-duplication: at most one loader invocation is ever
//! in flight per key at a time. Callers that ask for a key already being
//! loaded attach to the in-progress call and receive its result instead of
//! starting a redundant one.
//!
//! This generalizes the atomic-`get_or_insert`-under-one-lock pattern (lock,
//! check freshness, call the loader, insert, unlock) to a batch of keys and
//! to callers arriving from other threads while the call is still in
//! flight, using a condvar instead of just holding the lock for the loader's
//! full duration — so unrelated keys never wait on a slow loader call.

use std::hash::Hash;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Condvar, Mutex};

enum CallState<V, E> {
    Pending,
    Done(Result<V, E>),
}

struct Call<V, E> {
    state: Mutex<CallState<V, E>>,
    done: Condvar,
}

/// Deduplicates concurrent loader calls for the same key.
///
/// `V` and `E` must be `Clone` since every caller attached to a call
/// receives its own copy of the (possibly shared) result.
pub struct SingleFlight<K, V, E> {
    in_flight: Mutex<HashMap<K, Arc<Call<V, E>>>>,
}

impl<K, V, E> Default for SingleFlight<K, V, E>
where
    K: Clone + Eq + Hash,
    V: Clone,
    E: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, E> SingleFlight<K, V, E>
where
    K: Clone + Eq + Hash,
    V: Clone,
    E: Clone,
{
    pub fn new() -> Self {
        Self { in_flight: Mutex::new(HashMap::new()) }
    }

    /// Runs `load` for `key` if no call is already in flight; otherwise
    /// blocks until the in-flight call completes and returns its result.
    /// The `bool` in the `Ok` case is `true` when this call executed `load`
    /// itself, `false` when it attached to an existing call.
    pub fn call(&self, key: K, load: impl FnOnce() -> Result<V, E>) -> (Result<V, E>, bool) {
        let mut table = self.in_flight.lock();
        if let Some(existing) = table.get(&key).cloned() {
            drop(table);
            return (wait_for(&existing), false);
        }
        let call = Arc::new(Call { state: Mutex::new(CallState::Pending), done: Condvar::new() });
        table.insert(key.clone(), Arc::clone(&call));
        drop(table);

        let result = load();

        {
            let mut state = call.state.lock();
            *state = CallState::Done(result.clone());
            call.done.notify_all();
        }
        self.in_flight.lock().remove(&key);
        (result, true)
    }
}

fn wait_for<V: Clone, E: Clone>(call: &Arc<Call<V, E>>) -> Result<V, E> {
    let mut state = call.state.lock();
    loop {
        match &*state {
            CallState::Done(result) => return result.clone(),
            CallState::Pending => call.done.wait(&mut state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn late_callers_attach_to_the_in_flight_call() {
        let group: Arc<SingleFlight<&str, u64, ()>> = Arc::new(SingleFlight::new());
        let load_count = Arc::new(AtomicUsize::new(0));

        // Collecting here is load-bearing: all threads must be spawned before any is joined.
        #[allow(clippy::needless_collect)]
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let group = Arc::clone(&group);
                let load_count = Arc::clone(&load_count);
                thread::spawn(move || {
                    group.call("key", || {
                        load_count.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Ok::<_, ()>(42)
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.iter().all(|(r, _)| *r == Ok(42)));
        assert_eq!(load_count.load(Ordering::SeqCst), 1);
        assert_eq!(results.iter().filter(|(_, executed)| *executed).count(), 1);
    }

    #[test]
    fn sequential_calls_each_execute_their_own_load() {
        let group: SingleFlight<&str, u64, ()> = SingleFlight::new();
        let (r1, executed1) = group.call("key", || Ok(1));
        let (r2, executed2) = group.call("key", || Ok(2));
        assert_eq!(r1, Ok(1));
        assert_eq!(r2, Ok(2));
        assert!(executed1);
        assert!(executed2);
    }

    #[test]
    fn errors_propagate_to_every_attached_caller() {
        let group: Arc<SingleFlight<&str, u64, &str>> = Arc::new(SingleFlight::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let group = Arc::clone(&group);
                thread::spawn(move || {
                    group.call("key", || {
                        thread::sleep(Duration::from_millis(10));
                        Err("load failed")
                    })
                })
            })
            .collect();
        for h in handles {
            let (result, _) = h.join().unwrap();
            assert_eq!(result, Err("load failed"));
        }
    }
}
