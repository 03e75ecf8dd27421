//! Shared Cache Handle
//!
//! A cloneable handle over one `CacheStore`. Synchronous operations take the
//! lock for their whole duration; `warm` releases it while the fetcher runs.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{
    CacheStats, CacheStore, Category, TaskChange, TaskQuery, ValidationReport, Workflow,
};
use crate::config::TtlConfig;
use crate::error::Result;

// == Shared Cache ==
/// Thread-safe handle to a cache store.
///
/// Cached values never leave the store by reference: `get` deserializes a
/// fresh copy, so callers cannot bypass `set`/`invalidate`.
#[derive(Debug, Clone, Default)]
pub struct SharedCache {
    inner: Arc<Mutex<CacheStore>>,
}

impl SharedCache {
    pub fn new(ttl: TtlConfig) -> Self {
        Self::from_store(CacheStore::new(ttl))
    }

    pub fn from_store(store: CacheStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Locks the store. A poisoned lock is recovered since every store
    /// operation leaves the maps consistent.
    pub fn lock(&self) -> MutexGuard<'_, CacheStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get<T: DeserializeOwned>(&self, category: Category, key: &str) -> Option<T> {
        self.lock().get(category, key)
    }

    pub fn set<T>(&self, category: Category, key: impl Into<String>, value: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.lock().set(category, key, value)
    }

    pub fn set_with_ttl<T>(
        &self,
        category: Category,
        key: impl Into<String>,
        value: &T,
        ttl: Option<std::time::Duration>,
    ) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        self.lock().set_with_ttl(category, key, value, ttl)
    }

    pub fn invalidate(&self, category: Option<Category>, key: Option<&str>) -> usize {
        self.lock().invalidate(category, key)
    }

    pub fn clear(&self, category: Option<Category>) {
        self.lock().clear(category)
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    pub fn validate_all_entries(&self) -> ValidationReport {
        self.lock().validate_all_entries()
    }

    pub fn invalidate_project(&self, project_id: &str) -> usize {
        self.lock().invalidate_project(project_id)
    }

    pub fn invalidate_tag(&self, tag: &str) -> usize {
        self.lock().invalidate_tag(tag)
    }

    pub fn invalidate_task_queries(&self, queries: &[TaskQuery]) -> usize {
        self.lock().invalidate_task_queries(queries)
    }

    pub fn invalidate_for_task_change(&self, change: &TaskChange) -> usize {
        self.lock().invalidate_for_task_change(change)
    }

    pub fn refresh_for_workflow(&self, workflow: Workflow) -> usize {
        self.lock().refresh_for_workflow(workflow)
    }

    // == Warm ==
    /// Returns the cached value, or runs `fetcher`, caches its result and
    /// returns it.
    ///
    /// The fetcher's error is returned unchanged and nothing is cached. Two
    /// concurrent misses on the same key both fetch; the last `set` wins.
    pub async fn warm<T, E, F, Fut>(
        &self,
        category: Category,
        key: &str,
        fetcher: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(value) = self.get(category, key) {
            return Ok(value);
        }

        debug!(%category, key, "cache miss, fetching");
        let value = fetcher().await?;

        if let Err(err) = self.set(category, key, &value) {
            warn!(error = %err, "fetched value could not be cached");
        }
        Ok(value)
    }
}
