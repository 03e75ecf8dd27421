//! Cache Warming Module
//!
//! Bounded-time cache population at process startup.

mod source;
mod warmer;

pub use source::{FetchFuture, TaskView, WarmingSource};
pub use warmer::{CacheWarmer, WarmingReport, WarmingResult};
