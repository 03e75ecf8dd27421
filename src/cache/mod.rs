//! Cache Module
//!
//! Category-partitioned in-memory caching with per-category TTL, checksum
//! verification and domain-aware invalidation.

mod category;
mod entry;
mod invalidation;
mod shared;
mod stats;
mod store;


// Re-export public types
pub use category::Category;
pub use entry::{compute_checksum, CacheEntry};
pub use invalidation::{TaskChange, TaskOperation, TaskQuery, Workflow};
pub use shared::SharedCache;
pub use stats::CacheStats;
pub use store::{CacheStore, CorruptionDetail, ValidationReport};
