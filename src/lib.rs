//! `embercache`: an in-process, generic key-value cache library.
//!
//! Eight eviction policies ([`policy::LruCache`], [`policy::FifoCache`],
//! [`policy::LfuCache`], [`policy::ArcCache`], [`policy::TwoQCache`],
//! [`policy::TinyLfuCache`], [`policy::WTinyLfuCache`],
//! [`policy::S3FifoCache`]) share one capability trait, [`engine::InMemoryCache`].
//! Any engine can be wrapped for thread-safety ([`locking::Locking`]),
//! instrumentation ([`metrics::Instrumented`]), or sharding
//! ([`sharded::Sharded`]), and composed under [`controller::HotCache`] for
//! TTL expiry, stale revalidation, missing-key caching, and single-flight
//! loader deduplication.
//!
//! ## Quick example
//!
//! ```rust
//! use embercache::policy::LruCache;
//! use embercache::engine::InMemoryCache;
//!
//! let mut cache: LruCache<&str, i32> = LruCache::new(2);
//! cache.set("a", 1);
//! cache.set("b", 2);
//! cache.get(&"a"); // "a" becomes most recently used
//! cache.set("c", 3); // "b" is evicted
//! assert!(!cache.has(&"b"));
//! ```
//!
//! ## Modules
//!
//! - [`list`]: arena-indexed intrusive doubly-linked list, the substrate
//!   every policy engine is built on.
//! - [`entry`], [`meta`]: the generic cache node and per-policy metadata.
//! - [`clock`]: injectable monotonic time source.
//! - [`sketch`]: Count-Min Sketch + Doorkeeper frequency estimator for
//!   (W-)TinyLFU.
//! - [`engine`]: the `InMemoryCache` capability trait all policies share.
//! - [`policy`]: the eight eviction engines.
//! - [`locking`], [`metrics`], [`sharded`]: composable wrappers.
//! - [`singleflight`]: concurrent loader-call deduplication.
//! - [`config`]: plain configuration structs.
//! - [`controller`]: `HotCache`, the top-level TTL/loader-aware cache.
//! - [`error`]: `thiserror`-based error types.

pub mod clock;
pub mod config;
pub mod controller;
pub mod engine;
pub mod entry;
pub mod error;
pub mod list;
pub mod locking;
pub mod meta;
pub mod metrics;
pub mod policy;
pub mod sharded;
pub mod singleflight;
pub mod sketch;

pub use config::HotCacheConfig;
pub use controller::{GetResult, HotCache, HotCacheParams};
pub use engine::{EvictionCallback, EvictionReason, InMemoryCache};
pub use error::{ConfigError, ControllerError, LoaderError};
pub use locking::Locking;
pub use metrics::{AtomicCollector, Instrumented, MetricsCollector, NoopCollector};
pub use policy::{
    ArcCache, FifoCache, LfuCache, LruCache, S3FifoCache, TinyLfuCache, TwoQCache, WTinyLfuCache,
};
pub use sharded::Sharded;
