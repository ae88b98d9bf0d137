//! Background expiry sweep: a named worker thread with an explicit
//! start/stop handshake, the idiom spec.md calls for in place of a
//! goroutine-style background loop.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct StopSignal {
    stop: Mutex<bool>,
    condvar: Condvar,
}

/// A running janitor thread. Dropping without calling [`Janitor::stop`]
/// leaks the thread (it keeps ticking) rather than silently detaching it
/// mid-sweep, so callers are expected to stop it explicitly.
pub struct Janitor {
    signal: Arc<StopSignal>,
    handle: JoinHandle<()>,
}

impl Janitor {
    pub fn start(interval: Duration, mut sweep: impl FnMut() + Send + 'static) -> Self {
        let signal = Arc::new(StopSignal { stop: Mutex::new(false), condvar: Condvar::new() });
        let thread_signal = Arc::clone(&signal);
        let handle = std::thread::spawn(move || loop {
            let mut stop = thread_signal.stop.lock();
            let timed_out = thread_signal.condvar.wait_for(&mut stop, interval);
            if *stop {
                return;
            }
            let should_sweep = timed_out.timed_out();
            drop(stop);
            if should_sweep {
                sweep();
            }
        });
        Self { signal, handle }
    }

    /// Signals the loop to stop and waits for it to exit.
    pub fn stop(self) {
        *self.signal.stop.lock() = true;
        self.signal.condvar.notify_all();
        let _ = self.handle.join();
    }
}
