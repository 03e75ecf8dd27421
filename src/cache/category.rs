//! Cache Category Module
//!
//! Named partitions of the cache, each with its own default TTL.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// == Category ==
/// A partition of the cache. Eviction, TTL and invalidation are scoped to one
/// category unless a rule explicitly targets several.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tasks,
    Projects,
    Folders,
    Tags,
    Analytics,
    Reviews,
    Perspectives,
}

impl Category {
    /// Every category, in declaration order.
    pub const ALL: [Category; 7] = [
        Category::Tasks,
        Category::Projects,
        Category::Folders,
        Category::Tags,
        Category::Analytics,
        Category::Reviews,
        Category::Perspectives,
    ];

    /// Default time-to-live applied when no override is configured.
    ///
    /// Volatile data (tasks, projects) lives for minutes; aggregates that are
    /// expensive to compute (analytics) live for an hour.
    pub fn default_ttl(self) -> Duration {
        let secs = match self {
            Category::Tasks => 300,
            Category::Projects => 300,
            Category::Folders => 600,
            Category::Tags => 600,
            Category::Analytics => 3600,
            Category::Reviews => 180,
            Category::Perspectives => 600,
        };
        Duration::from_secs(secs)
    }

    /// Lower-case name used in logs, config keys and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tasks => "tasks",
            Category::Projects => "projects",
            Category::Folders => "folders",
            Category::Tags => "tags",
            Category::Analytics => "analytics",
            Category::Reviews => "reviews",
            Category::Perspectives => "perspectives",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown cache category: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_ttls() {
        assert_eq!(Category::Tasks.default_ttl(), Duration::from_secs(300));
        assert_eq!(Category::Analytics.default_ttl(), Duration::from_secs(3600));
        assert!(Category::Projects.default_ttl() < Category::Analytics.default_ttl());
    }

    #[test]
    fn test_parse_and_display() {
        for category in Category::ALL {
            let parsed: Category = category.to_string().parse().unwrap();
            assert_eq!(parsed, category);
        }
        assert!("widgets".parse::<Category>().is_err());
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Category::Perspectives).unwrap();
        assert_eq!(json, "\"perspectives\"");
    }
}
