//! Expiry Sweep Task
//!
//! Background task that periodically drops expired entries so memory held by
//! entries nobody reads again is released. Reads never rely on it: expiry is
//! always checked on access.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::SharedCache;
use crate::config::CacheConfig;

/// Spawns a background task that calls `cleanup_expired` every `interval`.
///
/// # Returns
/// A JoinHandle that the host aborts during shutdown.
///
/// # Example
/// ```ignore
/// let cache = SharedCache::default();
/// let sweep = spawn_sweep_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep.abort();
/// ```
pub fn spawn_sweep_task(cache: SharedCache, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_ms = interval.as_millis() as u64, "Starting cache expiry sweep");

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.lock().cleanup_expired();

            if removed > 0 {
                info!("Expiry sweep: removed {} expired entries", removed);
            } else {
                debug!("Expiry sweep: no expired entries found");
            }
        }
    })
}

/// Starts the sweep when `config.sweep_interval` is set.
///
/// Returns `None` when the sweep is disabled.
pub fn spawn_configured_sweep(cache: SharedCache, config: &CacheConfig) -> Option<JoinHandle<()>> {
    match config.sweep_interval {
        Some(interval) => Some(spawn_sweep_task(cache, interval)),
        None => {
            debug!("Cache expiry sweep disabled");
            None
        }
    }
}
