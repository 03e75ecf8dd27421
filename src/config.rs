//! Configuration Module
//!
//! TTL policy and warming strategy, with documented defaults and partial
//! overrides that are merged onto them. Overrides can come from environment
//! variables or a JSON document; unknown keys are ignored.

use std::collections::BTreeMap;
use std::env;
use std::time::Duration;

use serde::Deserialize;

use crate::cache::Category;
use crate::error::{CacheError, Result};

// == TTL Config ==
/// Per-category lifetimes. Categories without an override use
/// `Category::default_ttl`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TtlConfig {
    overrides: BTreeMap<Category, Duration>,
}

impl TtlConfig {
    /// Lifetime assigned to new entries in `category`.
    pub fn ttl(&self, category: Category) -> Duration {
        self.overrides
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_ttl())
    }

    /// Returns a copy with `category` set to `ttl`.
    pub fn with_ttl(mut self, category: Category, ttl: Duration) -> Self {
        self.overrides.insert(category, ttl);
        self
    }
}

/// Partial TTL settings in seconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TtlOverrides {
    pub tasks: Option<u64>,
    pub projects: Option<u64>,
    pub folders: Option<u64>,
    pub tags: Option<u64>,
    pub analytics: Option<u64>,
    pub reviews: Option<u64>,
    pub perspectives: Option<u64>,
}

impl TtlOverrides {
    fn get(&self, category: Category) -> Option<u64> {
        match category {
            Category::Tasks => self.tasks,
            Category::Projects => self.projects,
            Category::Folders => self.folders,
            Category::Tags => self.tags,
            Category::Analytics => self.analytics,
            Category::Reviews => self.reviews,
            Category::Perspectives => self.perspectives,
        }
    }

    fn slot(&mut self, category: Category) -> &mut Option<u64> {
        match category {
            Category::Tasks => &mut self.tasks,
            Category::Projects => &mut self.projects,
            Category::Folders => &mut self.folders,
            Category::Tags => &mut self.tags,
            Category::Analytics => &mut self.analytics,
            Category::Reviews => &mut self.reviews,
            Category::Perspectives => &mut self.perspectives,
        }
    }

    /// Applies these overrides onto `base`.
    pub fn apply(&self, base: TtlConfig) -> TtlConfig {
        Category::ALL.into_iter().fold(base, |config, category| match self.get(category) {
            Some(secs) => config.with_ttl(category, Duration::from_secs(secs)),
            None => config,
        })
    }
}

// == Warming Strategy ==
/// Which categories the warmer pre-fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmCategories {
    pub projects: bool,
    pub tags: bool,
    pub tasks: bool,
    pub perspectives: bool,
}

impl Default for WarmCategories {
    fn default() -> Self {
        Self {
            projects: true,
            tags: true,
            tasks: true,
            perspectives: false,
        }
    }
}

/// Which task views are pre-fetched when task warming is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskWarmingOptions {
    pub today: bool,
    pub overdue: bool,
    pub upcoming: bool,
    pub flagged: bool,
}

impl Default for TaskWarmingOptions {
    fn default() -> Self {
        Self {
            today: true,
            overdue: true,
            upcoming: true,
            flagged: false,
        }
    }
}

/// Complete warming configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarmingStrategy {
    pub enabled: bool,
    /// Global budget for the whole warming pass
    pub timeout: Duration,
    pub categories: WarmCategories,
    pub task_options: TaskWarmingOptions,
}

impl Default for WarmingStrategy {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_millis(5000),
            categories: WarmCategories::default(),
            task_options: TaskWarmingOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WarmCategoriesOverrides {
    pub projects: Option<bool>,
    pub tags: Option<bool>,
    pub tasks: Option<bool>,
    pub perspectives: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TaskWarmingOverrides {
    pub today: Option<bool>,
    pub overdue: Option<bool>,
    pub upcoming: Option<bool>,
    pub flagged: Option<bool>,
}

/// Partial warming settings; `timeout` is in milliseconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WarmingOverrides {
    pub enabled: Option<bool>,
    pub timeout: Option<u64>,
    pub categories: WarmCategoriesOverrides,
    pub task_warming_options: TaskWarmingOverrides,
}

impl WarmingOverrides {
    /// Applies these overrides onto `base`.
    pub fn apply(&self, base: WarmingStrategy) -> WarmingStrategy {
        let c = &self.categories;
        let t = &self.task_warming_options;
        WarmingStrategy {
            enabled: self.enabled.unwrap_or(base.enabled),
            timeout: self.timeout.map_or(base.timeout, Duration::from_millis),
            categories: WarmCategories {
                projects: c.projects.unwrap_or(base.categories.projects),
                tags: c.tags.unwrap_or(base.categories.tags),
                tasks: c.tasks.unwrap_or(base.categories.tasks),
                perspectives: c.perspectives.unwrap_or(base.categories.perspectives),
            },
            task_options: TaskWarmingOptions {
                today: t.today.unwrap_or(base.task_options.today),
                overdue: t.overdue.unwrap_or(base.task_options.overdue),
                upcoming: t.upcoming.unwrap_or(base.task_options.upcoming),
                flagged: t.flagged.unwrap_or(base.task_options.flagged),
            },
        }
    }
}

// == Cache Config ==
/// Top-level configuration for the cache layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: TtlConfig,
    pub warming: WarmingStrategy,
    /// Interval of the optional background expiry sweep; `None` disables it
    pub sweep_interval: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: TtlConfig::default(),
            warming: WarmingStrategy::default(),
            sweep_interval: Some(Duration::from_secs(60)),
        }
    }
}

/// Partial top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CacheConfigOverrides {
    pub ttl: TtlOverrides,
    pub warming: WarmingOverrides,
    /// Seconds; 0 disables the sweep
    pub sweep_interval: Option<u64>,
}

impl CacheConfigOverrides {
    /// Applies these overrides onto `base`.
    pub fn apply(&self, base: CacheConfig) -> CacheConfig {
        CacheConfig {
            ttl: self.ttl.apply(base.ttl),
            warming: self.warming.apply(base.warming),
            sweep_interval: match self.sweep_interval {
                Some(0) => None,
                Some(secs) => Some(Duration::from_secs(secs)),
                None => base.sweep_interval,
            },
        }
    }

    /// Reads overrides from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL_<CATEGORY>` - TTL in seconds, e.g. `CACHE_TTL_TASKS`
    /// - `CACHE_WARMING_ENABLED` - `true` / `false`
    /// - `CACHE_WARMING_TIMEOUT_MS` - warming budget in milliseconds
    /// - `CACHE_SWEEP_INTERVAL` - sweep interval in seconds, 0 disables
    ///
    /// Unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut overrides = Self::default();
        for category in Category::ALL {
            let name = format!("CACHE_TTL_{}", category.as_str().to_uppercase());
            *overrides.ttl.slot(category) = parse_env(&name);
        }
        overrides.warming.enabled = parse_env("CACHE_WARMING_ENABLED");
        overrides.warming.timeout = parse_env("CACHE_WARMING_TIMEOUT_MS");
        overrides.sweep_interval = parse_env("CACHE_SWEEP_INTERVAL");
        overrides
    }
}

impl CacheConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        CacheConfigOverrides::from_env().apply(Self::default())
    }

    /// Defaults with overrides from a JSON document applied.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let overrides: CacheConfigOverrides =
            serde_json::from_str(json).map_err(|e| CacheError::Config(e.to_string()))?;
        Ok(overrides.apply(Self::default()))
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
