//! Cache Configuration Module
//!
//! Configuration structs have all public fields for simple instantiation:
//!
//! - **Simple**: just create the struct with all fields set, or start from
//!   `Default::default()` and override what matters.
//! - **Type safety**: all parameters must be provided at construction.
//! - **No boilerplate**: no constructors or builder methods needed.
//!
//! This module holds [`HotCacheConfig`], the configuration for
//! [`crate::controller::HotCache`]. Per-engine capacity is a plain `usize`
//! passed directly to the policy constructors (`LruCache::new`, and so on);
//! the policies themselves have no other tunables worth a config struct.

use std::time::Duration;

/// What to do when a background revalidation attempt fails.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationErrorPolicy {
    /// Evict the stale entry; the next `get` is a miss and goes through the
    /// loader chain from scratch.
    DropOnError,
    /// Keep serving the stale value until a revalidation eventually succeeds.
    #[default]
    KeepOnError,
}

/// Configuration for [`crate::controller::HotCache`].
#[derive(Debug, Clone)]
pub struct HotCacheConfig {
    /// Maximum number of entries the primary engine holds.
    pub capacity: usize,

    /// How long an entry stays fresh after insertion/revalidation. `None`
    /// means entries never expire.
    pub ttl: Option<Duration>,

    /// How long past `ttl` a stale entry may still be served while a
    /// background revalidation is attempted. `None` means entries expire
    /// outright at `ttl` with no stale grace period.
    pub stale_after_ttl: Option<Duration>,

    /// Upper bound on random jitter added to `ttl`, so a herd of entries
    /// inserted together doesn't expire in the same instant. Jitter only
    /// ever raises an entry's effective TTL, never lowers it.
    pub ttl_jitter: Option<Duration>,

    /// Whether a loader miss (the key genuinely doesn't exist upstream) is
    /// itself cached, to avoid repeatedly calling the loader for a key that
    /// keeps coming back empty.
    pub cache_missing_keys: bool,

    /// How long a cached "missing" marker stays valid. Defaults to `ttl`
    /// when `None` and `cache_missing_keys` is set.
    pub missing_ttl: Option<Duration>,

    pub revalidation_error_policy: RevalidationErrorPolicy,

    /// Background janitor sweep interval. `None` disables the janitor;
    /// expiry is then only enforced lazily, on access.
    pub janitor_interval: Option<Duration>,
}

impl Default for HotCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            ttl: None,
            stale_after_ttl: None,
            ttl_jitter: None,
            cache_missing_keys: false,
            missing_ttl: None,
            revalidation_error_policy: RevalidationErrorPolicy::default(),
            janitor_interval: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_ttl_and_no_missing_caching() {
        let config = HotCacheConfig::default();
        assert_eq!(config.capacity, 1024);
        assert!(config.ttl.is_none());
        assert!(!config.cache_missing_keys);
    }
}
