//! Task Cache - process-local cache layer for a task-management bridge
//!
//! Category-partitioned storage with per-category TTL, checksum verification,
//! task-domain invalidation rules and a bounded startup warmer.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;
pub mod telemetry;
pub mod warming;

pub use cache::{CacheStats, CacheStore, Category, SharedCache, TaskChange, TaskOperation};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use tasks::{spawn_configured_sweep, spawn_sweep_task};
pub use warming::{CacheWarmer, WarmingReport, WarmingSource};
