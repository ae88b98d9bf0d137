//! Monotonic microsecond time source used throughout the controller layer.
//!
//! TTL, stale-revalidation, and jitter math all work in microseconds since an
//! arbitrary process-local origin rather than wall-clock time, so a leap
//! second or a user resetting their system clock can't make an entry appear
//! to live forever or expire instantly. Tests inject a [`VirtualClock`]
//! instead of sleeping, the same way the original per-algorithm caches let
//! callers stamp timestamps manually for deterministic tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

/// A source of monotonically non-decreasing microsecond timestamps.
pub trait Clock: Send + Sync {
    fn now_micros(&self) -> i64;
}

/// Wall-clock time anchored to process start, backed by [`std::time::Instant`].
#[derive(Debug, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now_micros(&self) -> i64 {
        now_micros()
    }
}

/// Returns microseconds elapsed since this process's first call to
/// `now_micros`. The origin is latched once via [`OnceLock`] so repeated
/// calls are cheap and consistent across threads.
pub fn now_micros() -> i64 {
    static ORIGIN: OnceLock<Instant> = OnceLock::new();
    let origin = ORIGIN.get_or_init(Instant::now);
    i64::try_from(origin.elapsed().as_micros()).unwrap_or(i64::MAX)
}

/// A clock tests can advance by hand instead of sleeping. Never goes backwards.
#[derive(Debug, Default)]
pub struct VirtualClock {
    micros: AtomicI64,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self { micros: AtomicI64::new(0) }
    }

    pub fn set(&self, micros: i64) {
        self.micros.store(micros, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_micros: i64) {
        self.micros.fetch_add(delta_micros, Ordering::SeqCst);
    }
}

impl Clock for VirtualClock {
    fn now_micros(&self) -> i64 {
        self.micros.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn real_clock_is_monotonic() {
        let clock = RealClock;
        let a = clock.now_micros();
        let b = clock.now_micros();
        assert!(b >= a);
    }

    #[test]
    fn virtual_clock_advances_deterministically() {
        let clock = VirtualClock::new();
        assert_eq!(clock.now_micros(), 0);
        clock.advance(1_000);
        assert_eq!(clock.now_micros(), 1_000);
        clock.set(50);
        assert_eq!(clock.now_micros(), 50);
    }
}
