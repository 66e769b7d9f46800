//! Eviction policy for the buffer pool.
//!
//! - [`LruReplacer`] - evicts the least recently accessed unpinned frame

mod lru;

pub use lru::LruReplacer;
