//! Cache Warmer
//!
//! Pre-populates the cache at startup. All enabled fetches run concurrently
//! and race one global deadline; whatever has not settled by then is reported
//! as timed out and left running in the background.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cache::{Category, SharedCache};
use crate::config::WarmingStrategy;
use crate::warming::source::{TaskView, WarmOperation, WarmingSource};

// == Warming Result ==
/// Outcome of a single warming step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmingResult {
    pub operation: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WarmingResult {
    fn succeeded(operation: &str, duration: Duration) -> Self {
        Self {
            operation: operation.to_string(),
            success: true,
            duration_ms: duration.as_millis() as u64,
            error: None,
        }
    }

    fn failed(operation: &str, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            operation: operation.to_string(),
            success: false,
            duration_ms: duration.as_millis() as u64,
            error: Some(error.into()),
        }
    }

    fn timed_out(timeout: Duration) -> Self {
        Self::failed("timeout", timeout, "Timeout exceeded")
    }
}

// == Warming Report ==
/// Aggregate returned once per warming pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarmingReport {
    pub enabled: bool,
    pub results: Vec<WarmingResult>,
    pub total_count: usize,
    pub success_count: usize,
}

impl WarmingReport {
    fn disabled() -> Self {
        Self {
            enabled: false,
            results: Vec::new(),
            total_count: 0,
            success_count: 0,
        }
    }

    fn from_results(results: Vec<WarmingResult>) -> Self {
        let success_count = results.iter().filter(|r| r.success).count();
        Self {
            enabled: true,
            total_count: results.len(),
            success_count,
            results,
        }
    }
}

// == Cache Warmer ==
/// Runs a single bounded warming pass against a shared cache.
pub struct CacheWarmer {
    cache: SharedCache,
    source: Arc<dyn WarmingSource>,
    strategy: WarmingStrategy,
}

impl CacheWarmer {
    pub fn new(cache: SharedCache, source: Arc<dyn WarmingSource>, strategy: WarmingStrategy) -> Self {
        Self {
            cache,
            source,
            strategy,
        }
    }

    /// Names of the operations the strategy enables, in reporting order.
    pub fn planned_operations(&self) -> Vec<&'static str> {
        if !self.strategy.enabled {
            return Vec::new();
        }
        let c = &self.strategy.categories;
        let mut names = Vec::new();
        if c.projects {
            names.push("projects");
        }
        if c.tags {
            names.push("tags");
        }
        if c.tasks {
            names.extend(self.task_views().into_iter().map(TaskView::operation));
        }
        if c.perspectives {
            names.push("perspectives");
        }
        names
    }

    fn task_views(&self) -> Vec<TaskView> {
        let t = &self.strategy.task_options;
        [
            (t.today, TaskView::Today),
            (t.overdue, TaskView::Overdue),
            (t.upcoming, TaskView::Upcoming),
            (t.flagged, TaskView::Flagged),
        ]
        .into_iter()
        .filter_map(|(enabled, view)| enabled.then_some(view))
        .collect()
    }

    fn plan(&self) -> Vec<WarmOperation> {
        let c = &self.strategy.categories;
        let source = &self.source;
        let mut operations = Vec::new();
        if c.projects {
            operations.push(WarmOperation {
                name: "projects",
                category: Category::Projects,
                key: "list",
                fetch: {
                    let source = Arc::clone(source);
                    Box::new(move || source.projects())
                },
            });
        }
        if c.tags {
            operations.push(WarmOperation {
                name: "tags",
                category: Category::Tags,
                key: "list",
                fetch: {
                    let source = Arc::clone(source);
                    Box::new(move || source.tags())
                },
            });
        }
        if c.tasks {
            for view in self.task_views() {
                operations.push(WarmOperation {
                    name: view.operation(),
                    category: Category::Tasks,
                    key: view.key(),
                    fetch: {
                        let source = Arc::clone(source);
                        Box::new(move || source.tasks(view))
                    },
                });
            }
        }
        if c.perspectives {
            operations.push(WarmOperation {
                name: "perspectives",
                category: Category::Perspectives,
                key: "list",
                fetch: {
                    let source = Arc::clone(source);
                    Box::new(move || source.perspectives())
                },
            });
        }
        operations
    }

    // == Warm Cache ==
    /// Runs the warming pass. Consumes the warmer: there is one pass per
    /// process and no retry.
    ///
    /// Never fails. Fetch errors and the deadline become failed results.
    pub async fn warm_cache(self) -> WarmingReport {
        if !self.strategy.enabled {
            info!("Cache warming disabled");
            return WarmingReport::disabled();
        }

        let timeout = self.strategy.timeout;
        let operations = self.plan();
        let total = operations.len();
        info!(operations = total, timeout_ms = timeout.as_millis() as u64, "Starting cache warming");

        let started = Instant::now();
        let mut pending: FuturesUnordered<_> = operations
            .into_iter()
            .enumerate()
            .map(|(index, operation)| {
                let name = operation.name;
                // Detached: dropping the handle on timeout does not cancel the fetch.
                let handle = tokio::spawn(run_operation(self.cache.clone(), operation));
                async move {
                    let result = handle.await.unwrap_or_else(|err| {
                        WarmingResult::failed(name, started.elapsed(), err.to_string())
                    });
                    (index, result)
                }
            })
            .collect();

        let mut slots: Vec<Option<WarmingResult>> = vec![None; total];
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                next = pending.next() => match next {
                    Some((index, result)) => slots[index] = Some(result),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(outstanding = pending.len(), "Cache warming timed out");
                    break;
                }
            }
        }

        let results = slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| WarmingResult::timed_out(timeout)))
            .collect();
        let report = WarmingReport::from_results(results);
        info!(
            total = report.total_count,
            succeeded = report.success_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cache warming finished"
        );
        report
    }
}

async fn run_operation(cache: SharedCache, operation: WarmOperation) -> WarmingResult {
    let WarmOperation {
        name,
        category,
        key,
        fetch,
    } = operation;
    let started = Instant::now();

    match cache.warm(category, key, fetch).await {
        Ok(_) => {
            debug!(operation = name, "warmed");
            WarmingResult::succeeded(name, started.elapsed())
        }
        Err(err) => {
            warn!(operation = name, error = %err, "warming operation failed");
            WarmingResult::failed(name, started.elapsed(), err.to_string())
        }
    }
}
