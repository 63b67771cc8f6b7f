//! Response cache for lolgate workers.
//!
//! In-memory TTL store keyed by operation and params, with a group index so
//! every cached view of one identity can be purged at once.

mod cache;

pub use cache::{CacheConfig, CacheStats, CachedResponse, ResponseCache};
