//! Unified cache entry type shared by every policy engine.
//!
//! `CacheEntry<K, V, M>` is the node payload every engine in [`crate::policy`]
//! stores in its [`crate::list::List`]. The generic `M` parameter lets each
//! policy attach its own per-entry bookkeeping (a frequency counter, a segment
//! tag, ...) without each engine needing its own entry type.

use std::fmt;

/// A single cache slot: key, value, access timestamps, and algorithm-specific
/// metadata. Use `M = ()` for policies that need no extra per-entry state.
pub struct CacheEntry<K, V, M = ()> {
    pub key: K,
    pub value: V,
    last_accessed_micros: i64,
    create_time_micros: i64,
    pub metadata: M,
}

impl<K, V, M> CacheEntry<K, V, M> {
    /// Creates a new entry, stamping both timestamps with `now`.
    pub fn new(key: K, value: V, metadata: M, now: i64) -> Self {
        Self { key, value, last_accessed_micros: now, create_time_micros: now, metadata }
    }

    /// Marks the entry as accessed at `now`.
    #[inline]
    pub fn touch(&mut self, now: i64) {
        self.last_accessed_micros = now;
    }

    #[inline]
    pub fn last_accessed_micros(&self) -> i64 {
        self.last_accessed_micros
    }

    #[inline]
    pub fn create_time_micros(&self) -> i64 {
        self.create_time_micros
    }

    /// Microseconds since creation, as of `now`.
    #[inline]
    pub fn age_micros(&self, now: i64) -> i64 {
        now.saturating_sub(self.create_time_micros)
    }

    /// Microseconds since last access, as of `now`.
    #[inline]
    pub fn idle_micros(&self, now: i64) -> i64 {
        now.saturating_sub(self.last_accessed_micros)
    }

    #[inline]
    pub fn metadata_mut(&mut self) -> &mut M {
        &mut self.metadata
    }
}

impl<K: Clone, V: Clone, M: Clone> Clone for CacheEntry<K, V, M> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            last_accessed_micros: self.last_accessed_micros,
            create_time_micros: self.create_time_micros,
            metadata: self.metadata.clone(),
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, M: fmt::Debug> fmt::Debug for CacheEntry<K, V, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("value", &self.value)
            .field("last_accessed_micros", &self.last_accessed_micros)
            .field("create_time_micros", &self.create_time_micros)
            .field("metadata", &self.metadata)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entry_stamps_both_timestamps() {
        let entry: CacheEntry<&str, i32, ()> = CacheEntry::new("key", 42, (), 100);
        assert_eq!(entry.create_time_micros(), 100);
        assert_eq!(entry.last_accessed_micros(), 100);
    }

    #[test]
    fn touch_updates_last_accessed_only() {
        let mut entry: CacheEntry<&str, i32, ()> = CacheEntry::new("key", 42, (), 100);
        entry.touch(200);
        assert_eq!(entry.create_time_micros(), 100);
        assert_eq!(entry.last_accessed_micros(), 200);
        assert_eq!(entry.age_micros(250), 150);
        assert_eq!(entry.idle_micros(250), 50);
    }

    #[test]
    fn metadata_mut_is_writable() {
        let mut entry = CacheEntry::new("key", "value", 0u64, 0);
        *entry.metadata_mut() += 1;
        assert_eq!(entry.metadata, 1);
    }
}
