//! The eight eviction policy engines, each implementing [`crate::engine::InMemoryCache`]
//! over the shared [`crate::list::List`] arena and [`crate::entry::CacheEntry`] node type.

mod arc;
mod fifo;
mod lfu;
mod lru;
mod s3fifo;
mod tinylfu;
mod two_q;
mod w_tinylfu;

pub use arc::ArcCache;
pub use fifo::FifoCache;
pub use lfu::LfuCache;
pub use lru::LruCache;
pub use s3fifo::S3FifoCache;
pub use tinylfu::TinyLfuCache;
pub use two_q::TwoQCache;
pub use w_tinylfu::WTinyLfuCache;
