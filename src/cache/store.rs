//! Cache Store Module
//!
//! Main cache engine: category-partitioned maps with per-category TTL,
//! lazy expiry and checksum verification on every read.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, CacheStats, Category};
use crate::config::TtlConfig;
use crate::error::{CacheError, Result};

// == Validation Report ==
/// Result of walking every stored entry and recomputing its checksum.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Number of entries inspected
    pub total: usize,
    /// Number of entries whose checksum no longer matches
    pub corrupted: usize,
    /// One record per corrupted entry
    pub details: Vec<CorruptionDetail>,
}

/// A single checksum mismatch found by `validate_all_entries`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptionDetail {
    pub category: Category,
    pub key: String,
    pub expected: u32,
    pub actual: u32,
}

/// What a read found, decided before the entry borrow ends.
enum Lookup {
    Absent,
    Expired,
    Corrupted,
    Present(Vec<u8>),
}

// == Cache Store ==
/// Category-partitioned cache storage with TTL and integrity checks.
#[derive(Debug, Default)]
pub struct CacheStore {
    /// Entries keyed by category, then by opaque query key
    partitions: HashMap<Category, HashMap<String, CacheEntry>>,
    /// Performance statistics
    stats: CacheStats,
    /// Per-category lifetimes
    ttl: TtlConfig,
}

impl CacheStore {
    // == Constructor ==
    /// Creates a new CacheStore with the given TTL policy.
    pub fn new(ttl: TtlConfig) -> Self {
        Self {
            partitions: HashMap::new(),
            stats: CacheStats::new(),
            ttl,
        }
    }

    // == Set ==
    /// Stores a value under `(category, key)` using the category TTL.
    ///
    /// Overwrites any prior entry for the same key. The deadline is fixed
    /// here; later reads never extend it.
    pub fn set<T>(&mut self, category: Category, key: impl Into<String>, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.set_with_ttl(category, key, value, None)
    }

    /// Stores a value with an optional TTL override.
    pub fn set_with_ttl<T>(
        &mut self,
        category: Category,
        key: impl Into<String>,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let key = key.into();
        let payload = serde_json::to_vec(value).map_err(|source| CacheError::Serialization {
            category: category.to_string(),
            key: key.clone(),
            source,
        })?;

        let ttl = ttl.unwrap_or_else(|| self.ttl.ttl(category));
        debug!(%category, %key, ttl_ms = ttl.as_millis() as u64, "cache set");

        self.partitions
            .entry(category)
            .or_default()
            .insert(key, CacheEntry::new(payload, ttl));
        self.refresh_size();
        Ok(())
    }

    // == Get ==
    /// Retrieves a value if present, unexpired and intact.
    ///
    /// Expired entries are evicted and counted as an eviction and a miss.
    /// Corrupted entries are evicted and counted as a checksum failure and a
    /// miss; their contents are never returned.
    pub fn get<T: DeserializeOwned>(&mut self, category: Category, key: &str) -> Option<T> {
        let lookup = match self.partitions.get(&category).and_then(|p| p.get(key)) {
            None => Lookup::Absent,
            Some(entry) if entry.is_expired() => Lookup::Expired,
            Some(entry) if !entry.verify() => Lookup::Corrupted,
            Some(entry) => Lookup::Present(entry.payload.clone()),
        };

        match lookup {
            Lookup::Absent => {
                self.stats.record_miss();
                None
            }
            Lookup::Expired => {
                self.remove_entry(category, key);
                self.stats.record_evictions(1);
                self.stats.record_miss();
                debug!(%category, key, "cache entry expired");
                None
            }
            Lookup::Corrupted => {
                self.remove_entry(category, key);
                self.stats.record_checksum_failure();
                self.stats.record_miss();
                warn!(%category, key, "cache entry failed checksum verification, evicted");
                None
            }
            Lookup::Present(payload) => match serde_json::from_slice(&payload) {
                Ok(value) => {
                    self.stats.record_hit();
                    Some(value)
                }
                Err(err) => {
                    self.stats.record_miss();
                    warn!(%category, key, error = %err, "cached value has unexpected shape");
                    None
                }
            },
        }
    }

    /// Returns true if a live entry exists. Does not touch statistics.
    pub fn contains(&self, category: Category, key: &str) -> bool {
        self.partitions
            .get(&category)
            .and_then(|p| p.get(key))
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Lists the keys currently stored in `category`, expired or not.
    pub fn keys(&self, category: Category) -> Vec<String> {
        self.partitions
            .get(&category)
            .map(|p| p.keys().cloned().collect())
            .unwrap_or_default()
    }

    // == Invalidate ==
    /// Removes entries and counts each removal as an eviction.
    ///
    /// - category and key: that single entry
    /// - category only: every entry in the category
    /// - no category: the whole store
    ///
    /// Returns the number of entries removed. Removing an absent key is a no-op.
    pub fn invalidate(&mut self, category: Option<Category>, key: Option<&str>) -> usize {
        let removed = self.remove(category, key);
        self.stats.record_evictions(removed);
        if removed > 0 {
            debug!(category = ?category, key = ?key, removed, "cache invalidated");
        }
        removed
    }

    /// Removes a single entry.
    pub fn invalidate_key(&mut self, category: Category, key: &str) -> usize {
        self.invalidate(Some(category), Some(key))
    }

    /// Removes every entry in `category`.
    pub fn invalidate_category(&mut self, category: Category) -> usize {
        self.invalidate(Some(category), None)
    }

    // == Clear ==
    /// Administrative reset: removes entries without counting evictions.
    ///
    /// A full clear (no category) also resets the statistics.
    pub fn clear(&mut self, category: Option<Category>) {
        self.remove(category, None);
        if category.is_none() {
            self.stats = CacheStats::new();
        }
    }

    // == Stats ==
    /// Returns a point-in-time snapshot of the statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_size(self.len());
        stats
    }

    // == Validate ==
    /// Recomputes every checksum and reports mismatches without evicting.
    pub fn validate_all_entries(&self) -> ValidationReport {
        let mut report = ValidationReport::default();

        for (category, partition) in &self.partitions {
            for (key, entry) in partition {
                report.total += 1;
                let actual = entry.current_checksum();
                if actual != entry.checksum {
                    report.details.push(CorruptionDetail {
                        category: *category,
                        key: key.clone(),
                        expected: entry.checksum,
                        actual,
                    });
                }
            }
        }

        report
            .details
            .sort_by(|a, b| (a.category, &a.key).cmp(&(b.category, &b.key)));
        report.corrupted = report.details.len();
        report
    }

    // == Cleanup Expired ==
    /// Removes all expired entries, counting each as an eviction.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let mut removed = 0;
        for partition in self.partitions.values_mut() {
            let before = partition.len();
            partition.retain(|_, entry| !entry.is_expired());
            removed += before - partition.len();
        }

        self.stats.record_evictions(removed);
        self.refresh_size();
        removed
    }

    // == Length ==
    /// Returns the current number of entries across all categories.
    pub fn len(&self) -> usize {
        self.partitions.values().map(HashMap::len).sum()
    }

    /// Returns true if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&mut self, category: Option<Category>, key: Option<&str>) -> usize {
        let removed = match (category, key) {
            (Some(category), Some(key)) => usize::from(self.remove_entry(category, key)),
            (Some(category), None) => self
                .partitions
                .remove(&category)
                .map_or(0, |partition| partition.len()),
            (None, _) => {
                let count = self.len();
                self.partitions.clear();
                count
            }
        };
        self.refresh_size();
        removed
    }

    fn remove_entry(&mut self, category: Category, key: &str) -> bool {
        let removed = self
            .partitions
            .get_mut(&category)
            .and_then(|p| p.remove(key))
            .is_some();
        self.refresh_size();
        removed
    }

    fn refresh_size(&mut self) {
        let size = self.len();
        self.stats.set_size(size);
    }

    #[cfg(test)]
    pub(crate) fn corrupt_entry(&mut self, category: Category, key: &str) {
        if let Some(entry) = self.partitions.get_mut(&category).and_then(|p| p.get_mut(key)) {
            entry.payload.push(b' ');
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn store() -> CacheStore {
        CacheStore::new(TtlConfig::default())
    }

    #[test]
    fn test_store_new() {
        let store = store();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_set_and_get() {
        let mut store = store();

        store.set(Category::Tasks, "today", &json!({"n": 1})).unwrap();
        let value: Value = store.get(Category::Tasks, "today").unwrap();

        assert_eq!(value, json!({"n": 1}));
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().hits, 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let mut store = store();

        assert!(store.get::<Value>(Category::Tasks, "missing").is_none());
        assert_eq!(store.stats().misses, 1);
    }

    #[test]
    fn test_store_categories_are_independent() {
        let mut store = store();

        store.set(Category::Tasks, "list", &1).unwrap();
        store.set(Category::Projects, "list", &2).unwrap();

        assert_eq!(store.get::<i32>(Category::Tasks, "list"), Some(1));
        assert_eq!(store.get::<i32>(Category::Projects, "list"), Some(2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_store_overwrite() {
        let mut store = store();

        store.set(Category::Tags, "list", &"a").unwrap();
        store.set(Category::Tags, "list", &"b").unwrap();

        assert_eq!(store.get::<String>(Category::Tags, "list").as_deref(), Some("b"));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_expiration() {
        let mut store = store();
        store.set(Category::Tasks, "today", &json!({"n": 1})).unwrap();

        tokio::time::advance(Duration::from_secs(200)).await;
        assert_eq!(store.get::<Value>(Category::Tasks, "today"), Some(json!({"n": 1})));

        tokio::time::advance(Duration::from_secs(101)).await;
        assert!(store.get::<Value>(Category::Tasks, "today").is_none());

        let stats = store.stats();
        assert_eq!(stats.evictions, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_ttl_override() {
        let mut store = store();
        store
            .set_with_ttl(Category::Analytics, "weekly", &7, Some(Duration::from_secs(5)))
            .unwrap();

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.get::<i32>(Category::Analytics, "weekly").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_do_not_extend_lifetime() {
        let mut store = store();
        store.set(Category::Tasks, "inbox", &1).unwrap();

        for _ in 0..5 {
            tokio::time::advance(Duration::from_secs(59)).await;
            assert_eq!(store.get::<i32>(Category::Tasks, "inbox"), Some(1));
        }
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(store.get::<i32>(Category::Tasks, "inbox").is_none());
    }

    #[test]
    fn test_corrupted_entry_is_a_miss() {
        let mut store = store();
        store.set(Category::Projects, "list", &json!(["a", "b"])).unwrap();
        store.corrupt_entry(Category::Projects, "list");

        assert!(store.get::<Value>(Category::Projects, "list").is_none());

        let stats = store.stats();
        assert_eq!(stats.checksum_failures, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.size, 0);
        assert_eq!(stats.failure_rate, 1.0);
    }

    #[test]
    fn test_wrong_shape_is_a_miss_but_kept() {
        let mut store = store();
        store.set(Category::Tags, "list", &json!(["work"])).unwrap();

        assert!(store.get::<u64>(Category::Tags, "list").is_none());
        assert!(store.contains(Category::Tags, "list"));
        assert_eq!(store.stats().checksum_failures, 0);
    }

    #[test]
    fn test_invalidate_single_key() {
        let mut store = store();
        store.set(Category::Tasks, "a", &1).unwrap();
        store.set(Category::Tasks, "b", &2).unwrap();

        assert_eq!(store.invalidate(Some(Category::Tasks), Some("a")), 1);
        assert_eq!(store.invalidate(Some(Category::Tasks), Some("a")), 0);

        assert!(!store.contains(Category::Tasks, "a"));
        assert!(store.contains(Category::Tasks, "b"));
        assert_eq!(store.stats().evictions, 1);
    }

    #[test]
    fn test_invalidate_category_only() {
        let mut store = store();
        store.set(Category::Tasks, "a", &1).unwrap();
        store.set(Category::Tasks, "b", &2).unwrap();
        store.set(Category::Folders, "list", &3).unwrap();

        assert_eq!(store.invalidate_category(Category::Tasks), 2);
        assert_eq!(store.get::<i32>(Category::Folders, "list"), Some(3));
        assert_eq!(store.stats().evictions, 2);
    }

    #[test]
    fn test_invalidate_everything() {
        let mut store = store();
        store.set(Category::Tasks, "a", &1).unwrap();
        store.set(Category::Reviews, "due", &2).unwrap();

        assert_eq!(store.invalidate(None, None), 2);
        let stats = store.stats();
        assert_eq!(stats.size, 0);
        assert_eq!(stats.evictions, 2);
    }

    #[test]
    fn test_clear_does_not_count_evictions() {
        let mut store = store();
        store.set(Category::Tasks, "a", &1).unwrap();
        store.set(Category::Tags, "list", &2).unwrap();

        store.clear(Some(Category::Tasks));
        assert_eq!(store.stats().evictions, 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_full_clear_resets_stats() {
        let mut store = store();
        store.set(Category::Tasks, "a", &1).unwrap();
        store.get::<i32>(Category::Tasks, "a");
        store.invalidate_key(Category::Tasks, "a");

        store.clear(None);
        assert_eq!(store.stats(), CacheStats::new());
    }

    #[test]
    fn test_stats_snapshot_does_not_mutate() {
        let mut store = store();
        store.set(Category::Tasks, "a", &1).unwrap();

        let first = store.stats();
        let second = store.stats();
        assert_eq!(first, second);
    }

    #[test]
    fn test_validate_all_entries_reports_without_evicting() {
        let mut store = store();
        store.set(Category::Tasks, "today", &1).unwrap();
        store.set(Category::Tasks, "overdue", &2).unwrap();
        store.set(Category::Tags, "list", &3).unwrap();
        store.corrupt_entry(Category::Tasks, "overdue");

        let report = store.validate_all_entries();
        assert_eq!(report.total, 3);
        assert_eq!(report.corrupted, 1);
        assert_eq!(report.details[0].category, Category::Tasks);
        assert_eq!(report.details[0].key, "overdue");
        assert_ne!(report.details[0].expected, report.details[0].actual);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_set_with_huge_configured_ttl() {
        let overrides = crate::config::TtlOverrides {
            tasks: Some(u64::MAX),
            ..Default::default()
        };
        let mut store = CacheStore::new(overrides.apply(TtlConfig::default()));

        store.set(Category::Tasks, "today", &1).unwrap();
        store
            .set_with_ttl(Category::Tags, "list", &2, Some(Duration::MAX))
            .unwrap();

        assert_eq!(store.get::<i32>(Category::Tasks, "today"), Some(1));
        assert_eq!(store.get::<i32>(Category::Tags, "list"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_cleanup_expired() {
        let mut store = store();
        store.set(Category::Reviews, "due", &1).unwrap();
        store.set(Category::Analytics, "summary", &2).unwrap();

        tokio::time::advance(Duration::from_secs(181)).await;

        assert_eq!(store.cleanup_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().evictions, 1);
        assert!(store.contains(Category::Analytics, "summary"));
    }
}
