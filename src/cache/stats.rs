//! Cache Statistics Module
//!
//! Process-lifetime counters owned by the store.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance and integrity metrics.
///
/// Mutated only by the store; callers receive clones via `CacheStore::stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Number of valid cache retrievals
    pub hits: u64,
    /// Number of failed retrievals (absent, expired or corrupted)
    pub misses: u64,
    /// Number of entries removed by expiry or invalidation
    pub evictions: u64,
    /// Current number of entries in the cache
    pub size: usize,
    /// Number of reads that found a checksum mismatch
    pub checksum_failures: u64,
    /// hits / (hits + misses), 0.0 before the first read
    pub hit_rate: f64,
    /// checksum failures / (hits + misses), 0.0 before the first read
    pub failure_rate: f64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Rates ==
    /// Share of reads counted in `count`, or 0.0 if no reads have been made.
    fn per_read(&self, count: u64) -> f64 {
        match self.hits + self.misses {
            0 => 0.0,
            total => count as f64 / total as f64,
        }
    }

    fn refresh_rates(&mut self) {
        self.hit_rate = self.per_read(self.hits);
        self.failure_rate = self.per_read(self.checksum_failures);
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits += 1;
        self.refresh_rates();
    }

    pub(crate) fn record_miss(&mut self) {
        self.misses += 1;
        self.refresh_rates();
    }

    pub(crate) fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    pub(crate) fn record_checksum_failure(&mut self) {
        self.checksum_failures += 1;
        self.refresh_rates();
    }

    pub(crate) fn set_size(&mut self, size: usize) {
        self.size = size;
    }
}
