//! Warming Source
//!
//! The seam between the warmer and whatever talks to the task backend. The
//! warmer only knows how to cache what a source returns.

use futures::future::BoxFuture;
use serde_json::Value;

use crate::cache::Category;

/// Future returned by every source fetcher.
pub type FetchFuture = BoxFuture<'static, anyhow::Result<Value>>;

// == Task View ==
/// Task lists that can be warmed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskView {
    Today,
    Overdue,
    Upcoming,
    Flagged,
}

impl TaskView {
    /// Cache key in the tasks category.
    pub fn key(self) -> &'static str {
        match self {
            TaskView::Today => "today",
            TaskView::Overdue => "overdue",
            TaskView::Upcoming => "upcoming",
            TaskView::Flagged => "flagged",
        }
    }

    /// Name reported in warming results.
    pub fn operation(self) -> &'static str {
        match self {
            TaskView::Today => "tasks_today",
            TaskView::Overdue => "tasks_overdue",
            TaskView::Upcoming => "tasks_upcoming",
            TaskView::Flagged => "tasks_flagged",
        }
    }
}

// == Warming Source ==
/// Supplies fresh data for each warmable query.
///
/// Each method is called at most once per warming pass, and only for the
/// operations the strategy enables, and only when the cache misses.
pub trait WarmingSource: Send + Sync {
    fn projects(&self) -> FetchFuture;
    fn tags(&self) -> FetchFuture;
    fn tasks(&self, view: TaskView) -> FetchFuture;
    fn perspectives(&self) -> FetchFuture;
}

/// Source call that is only made once the cache reports a miss.
pub(crate) type DeferredFetch = Box<dyn FnOnce() -> FetchFuture + Send>;

/// One planned warming step: where the result goes and how to fetch it.
pub(crate) struct WarmOperation {
    pub name: &'static str,
    pub category: Category,
    pub key: &'static str,
    pub fetch: DeferredFetch,
}
