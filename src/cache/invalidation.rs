//! Invalidation Rules
//!
//! Domain-aware eviction layered on `CacheStore::invalidate`. A write
//! description ("a task was created in project P with tags T") is turned into
//! the set of cached queries that may now be stale.
//!
//! Key conventions understood here (the store itself never parses keys):
//! - project scope: `project:<id>` or `projectId:<id>`
//! - tag scope: `tag:<name>` or `tags:<name>[,<name>...]`
//! - task views: the view name appears in the key (`today`, `overdue`, ...)

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use tracing::debug;

use crate::cache::{CacheStore, Category};

const PROJECT_PREFIXES: [&str; 2] = ["project:", "projectId:"];
const TAG_PREFIXES: [&str; 2] = ["tag:", "tags:"];

/// Characters that may appear inside a scoped value; anything else ends it.
fn is_value_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | ',')
}

// == Task Operation ==
/// Kind of task mutation that was written to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOperation {
    Create,
    Update,
    Complete,
    Delete,
}

// == Task Change ==
/// Description of a successful task write, produced by the mutation handler.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskChange {
    pub operation: TaskOperation,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub affects_today: bool,
    #[serde(default)]
    pub affects_overdue: bool,
}

impl TaskChange {
    pub fn new(operation: TaskOperation) -> Self {
        Self {
            operation,
            project_id: None,
            tags: Vec::new(),
            affects_today: false,
            affects_overdue: false,
        }
    }

    pub fn in_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn affecting_today(mut self, affects: bool) -> Self {
        self.affects_today = affects;
        self
    }

    pub fn affecting_overdue(mut self, affects: bool) -> Self {
        self.affects_overdue = affects;
        self
    }
}

// == Task Query ==
/// Named task views that can be invalidated by pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskQuery {
    Today,
    Overdue,
    Upcoming,
    Inbox,
    Agenda,
    /// Every entry in the tasks category
    All,
}

impl TaskQuery {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskQuery::Today => "today",
            TaskQuery::Overdue => "overdue",
            TaskQuery::Upcoming => "upcoming",
            TaskQuery::Inbox => "inbox",
            TaskQuery::Agenda => "agenda",
            TaskQuery::All => "all",
        }
    }

    fn matches(self, key: &str) -> bool {
        match self {
            TaskQuery::All => true,
            query => key.contains(query.as_str()),
        }
    }
}

impl FromStr for TaskQuery {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "today" => Ok(TaskQuery::Today),
            "overdue" => Ok(TaskQuery::Overdue),
            "upcoming" => Ok(TaskQuery::Upcoming),
            "inbox" => Ok(TaskQuery::Inbox),
            "agenda" => Ok(TaskQuery::Agenda),
            "all" => Ok(TaskQuery::All),
            other => Err(format!("unknown task query pattern: {other}")),
        }
    }
}

// == Workflow ==
/// Coarse invalidation bundles for common user workflows.
///
/// Each bundle over-approximates the precise rules: it may refetch more than
/// needed but never leaves a changed view cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workflow {
    InboxProcessing,
    WeeklyReview,
    DailyPlanning,
}

impl Workflow {
    pub fn as_str(self) -> &'static str {
        match self {
            Workflow::InboxProcessing => "inbox_processing",
            Workflow::WeeklyReview => "weekly_review",
            Workflow::DailyPlanning => "daily_planning",
        }
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Workflow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbox_processing" => Ok(Workflow::InboxProcessing),
            "weekly_review" => Ok(Workflow::WeeklyReview),
            "daily_planning" => Ok(Workflow::DailyPlanning),
            other => Err(format!("unknown workflow: {other}")),
        }
    }
}

// == Key Matching ==
/// Returns true if `key` scopes itself to `value` under one of `prefixes`.
///
/// The prefix must start at a word boundary and the value must match a whole
/// token, so `project:1` does not match `project:12` or `subproject:1`.
fn key_references(key: &str, prefixes: &[&str], value: &str) -> bool {
    prefixes.iter().any(|prefix| {
        key.match_indices(prefix).any(|(start, _)| {
            let boundary = key[..start]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_ascii_alphanumeric());
            if !boundary {
                return false;
            }
            let rest = &key[start + prefix.len()..];
            let end = rest.find(|c: char| !is_value_char(c)).unwrap_or(rest.len());
            rest[..end].split(',').any(|token| token == value)
        })
    })
}

// == Rules ==
impl CacheStore {
    fn invalidate_task_keys_where(&mut self, predicate: impl Fn(&str) -> bool) -> usize {
        let stale: Vec<String> = self
            .keys(Category::Tasks)
            .into_iter()
            .filter(|key| predicate(key.as_str()))
            .collect();

        stale
            .iter()
            .map(|key| self.invalidate_key(Category::Tasks, key))
            .sum()
    }

    /// Evicts task queries scoped to `project_id` and every projects entry.
    ///
    /// The whole projects category goes because list-shaped entries may have
    /// changed shape, not just the one project.
    pub fn invalidate_project(&mut self, project_id: &str) -> usize {
        let tasks =
            self.invalidate_task_keys_where(|key| key_references(key, &PROJECT_PREFIXES, project_id));
        let projects = self.invalidate_category(Category::Projects);
        debug!(project_id, tasks, projects, "invalidated project scope");
        tasks + projects
    }

    /// Evicts every tags entry and task queries referencing `tag`.
    pub fn invalidate_tag(&mut self, tag: &str) -> usize {
        let tags = self.invalidate_category(Category::Tags);
        let tasks = self.invalidate_task_keys_where(|key| key_references(key, &TAG_PREFIXES, tag));
        debug!(tag, tags, tasks, "invalidated tag scope");
        tags + tasks
    }

    /// Evicts task queries matching any of `queries`.
    pub fn invalidate_task_queries(&mut self, queries: &[TaskQuery]) -> usize {
        if queries.is_empty() {
            return 0;
        }
        if queries.contains(&TaskQuery::All) {
            return self.invalidate_category(Category::Tasks);
        }
        self.invalidate_task_keys_where(|key| queries.iter().any(|q| q.matches(key)))
    }

    /// String form of `invalidate_task_queries`; unknown patterns are skipped.
    pub fn invalidate_task_query_names(&mut self, patterns: &[&str]) -> usize {
        let queries: Vec<TaskQuery> = patterns
            .iter()
            .filter_map(|name| match name.parse() {
                Ok(query) => Some(query),
                Err(err) => {
                    debug!(%err, "ignoring task query pattern");
                    None
                }
            })
            .collect();
        self.invalidate_task_queries(&queries)
    }

    /// Primary write-path hook, called after a successful task mutation.
    pub fn invalidate_for_task_change(&mut self, change: &TaskChange) -> usize {
        let mut queries = Vec::new();
        if change.affects_today {
            queries.push(TaskQuery::Today);
        }
        if change.affects_overdue {
            queries.push(TaskQuery::Overdue);
        }
        // A date or status change can move a task across the upcoming window.
        if change.operation != TaskOperation::Create {
            queries.push(TaskQuery::Upcoming);
        }
        if change.operation == TaskOperation::Create && change.project_id.is_none() {
            queries.push(TaskQuery::Inbox);
        }

        let mut removed = self.invalidate_category(Category::Analytics);
        removed += self.invalidate_task_queries(&queries);
        if let Some(project_id) = &change.project_id {
            removed += self.invalidate_project(project_id);
        }
        for tag in &change.tags {
            removed += self.invalidate_tag(tag);
        }

        debug!(operation = ?change.operation, removed, "invalidated for task change");
        removed
    }

    /// Applies a coarse invalidation bundle for `workflow`.
    pub fn refresh_for_workflow(&mut self, workflow: Workflow) -> usize {
        let removed = match workflow {
            Workflow::InboxProcessing => {
                self.invalidate_task_queries(&[
                    TaskQuery::Today,
                    TaskQuery::Agenda,
                    TaskQuery::Inbox,
                ]) + self.invalidate_category(Category::Projects)
            }
            Workflow::WeeklyReview => {
                self.invalidate_category(Category::Tasks)
                    + self.invalidate_category(Category::Projects)
                    + self.invalidate_category(Category::Reviews)
            }
            Workflow::DailyPlanning => self.invalidate_task_queries(&[
                TaskQuery::Today,
                TaskQuery::Agenda,
                TaskQuery::Upcoming,
                TaskQuery::Overdue,
            ]),
        };
        debug!(%workflow, removed, "refreshed for workflow");
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TtlConfig;

    fn seeded() -> CacheStore {
        let mut store = CacheStore::new(TtlConfig::default());
        for key in [
            "today",
            "overdue",
            "upcoming:days=7",
            "inbox",
            "agenda",
            "flagged",
            "project:p1|completed=false",
            "projectId:p12",
            "tag:work",
            "tags:home,errands",
        ] {
            store.set(Category::Tasks, key, &key).unwrap();
        }
        store.set(Category::Projects, "list", &"projects").unwrap();
        store.set(Category::Projects, "project:p1", &"p1").unwrap();
        store.set(Category::Tags, "list", &"tags").unwrap();
        store.set(Category::Analytics, "productivity", &1).unwrap();
        store.set(Category::Reviews, "due", &2).unwrap();
        store
    }

    #[test]
    fn test_key_references_token_boundaries() {
        assert!(key_references("project:p1", &PROJECT_PREFIXES, "p1"));
        assert!(key_references("filter|projectId:p1|x", &PROJECT_PREFIXES, "p1"));
        assert!(!key_references("project:p12", &PROJECT_PREFIXES, "p1"));
        assert!(!key_references("subproject:p1", &PROJECT_PREFIXES, "p1"));
        assert!(key_references("tags:home,errands", &TAG_PREFIXES, "errands"));
        assert!(!key_references("tags:home,errands", &TAG_PREFIXES, "err"));
        assert!(key_references("project:p1 completed=false", &PROJECT_PREFIXES, "p1"));
        assert!(key_references("project:p1=open", &PROJECT_PREFIXES, "p1"));
        assert!(key_references("projectId:p1.flagged", &PROJECT_PREFIXES, "p1"));
        assert!(key_references("tag:work)", &TAG_PREFIXES, "work"));
        assert!(key_references("project:p_1-a", &PROJECT_PREFIXES, "p_1-a"));
        assert!(!key_references("project:p1-a", &PROJECT_PREFIXES, "p1"));
    }

    #[test]
    fn test_scoped_values_end_at_punctuation() {
        let mut store = seeded();
        for key in [
            "project:p1 completed=false",
            "project:p1=open",
            "projectId:p1.flagged",
            "tag:work)",
        ] {
            store.set(Category::Tasks, key, &key).unwrap();
        }

        store.invalidate_project("p1");
        store.invalidate_tag("work");

        for gone in [
            "project:p1 completed=false",
            "project:p1=open",
            "projectId:p1.flagged",
            "tag:work)",
        ] {
            assert!(!store.contains(Category::Tasks, gone), "{gone} should be evicted");
        }
        assert!(store.contains(Category::Tasks, "projectId:p12"));
    }

    #[test]
    fn test_invalidate_project() {
        let mut store = seeded();

        store.invalidate_project("p1");

        assert!(!store.contains(Category::Tasks, "project:p1|completed=false"));
        assert!(store.contains(Category::Tasks, "projectId:p12"));
        assert!(!store.contains(Category::Projects, "list"));
        assert!(!store.contains(Category::Projects, "project:p1"));
        assert!(store.contains(Category::Tasks, "today"));
    }

    #[test]
    fn test_invalidate_tag() {
        let mut store = seeded();

        store.invalidate_tag("home");

        assert!(!store.contains(Category::Tags, "list"));
        assert!(!store.contains(Category::Tasks, "tags:home,errands"));
        assert!(store.contains(Category::Tasks, "tag:work"));
    }

    #[test]
    fn test_invalidate_task_query_names() {
        let mut store = seeded();

        let removed = store.invalidate_task_query_names(&["today", "nonsense"]);

        assert_eq!(removed, 1);
        assert!(!store.contains(Category::Tasks, "today"));
        assert!(store.contains(Category::Tasks, "overdue"));
    }

    #[test]
    fn test_invalidate_task_queries_all() {
        let mut store = seeded();

        assert_eq!(store.invalidate_task_queries(&[TaskQuery::All]), 10);
        assert!(store.keys(Category::Tasks).is_empty());
        assert!(store.contains(Category::Tags, "list"));
    }

    #[test]
    fn test_unknown_patterns_are_noops() {
        let mut store = seeded();
        let before = store.len();

        assert_eq!(store.invalidate_task_query_names(&["someday"]), 0);
        assert_eq!(store.len(), before);
    }

    #[test]
    fn test_create_in_inbox() {
        let mut store = seeded();

        store.invalidate_for_task_change(&TaskChange::new(TaskOperation::Create));

        assert!(!store.contains(Category::Tasks, "inbox"));
        assert!(!store.contains(Category::Analytics, "productivity"));
        assert!(store.contains(Category::Tasks, "today"));
        assert!(store.contains(Category::Tasks, "upcoming:days=7"));
    }

    #[test]
    fn test_complete_in_project_with_tags() {
        let mut store = seeded();

        let change = TaskChange::new(TaskOperation::Complete)
            .in_project("p1")
            .with_tags(["work"])
            .affecting_today(true)
            .affecting_overdue(true);
        store.invalidate_for_task_change(&change);

        for gone in ["today", "overdue", "upcoming:days=7", "project:p1|completed=false", "tag:work"] {
            assert!(!store.contains(Category::Tasks, gone), "{gone} should be evicted");
        }
        for kept in ["inbox", "agenda", "flagged", "projectId:p12", "tags:home,errands"] {
            assert!(store.contains(Category::Tasks, kept), "{kept} should be kept");
        }
        assert!(store.keys(Category::Projects).is_empty());
        assert!(store.keys(Category::Tags).is_empty());
        assert!(store.contains(Category::Reviews, "due"));
    }

    #[test]
    fn test_task_change_deserializes() {
        let json = r#"{"operation":"update","projectId":"p1","affectsToday":true}"#;
        let change: TaskChange = serde_json::from_str(json).unwrap();
        assert_eq!(change.operation, TaskOperation::Update);
        assert_eq!(change.project_id.as_deref(), Some("p1"));
        assert!(change.tags.is_empty());
        assert!(change.affects_today);
        assert!(!change.affects_overdue);
    }

    #[test]
    fn test_workflow_inbox_processing() {
        let mut store = seeded();

        store.refresh_for_workflow(Workflow::InboxProcessing);

        for gone in ["today", "agenda", "inbox"] {
            assert!(!store.contains(Category::Tasks, gone));
        }
        assert!(store.keys(Category::Projects).is_empty());
        assert!(store.contains(Category::Tasks, "upcoming:days=7"));
        assert!(store.contains(Category::Analytics, "productivity"));
    }

    #[test]
    fn test_workflow_weekly_review() {
        let mut store = seeded();

        store.refresh_for_workflow(Workflow::WeeklyReview);

        assert!(store.keys(Category::Tasks).is_empty());
        assert!(store.keys(Category::Projects).is_empty());
        assert!(store.keys(Category::Reviews).is_empty());
        assert!(store.contains(Category::Analytics, "productivity"));
        assert!(store.contains(Category::Tags, "list"));
    }

    #[test]
    fn test_workflow_daily_planning() {
        let mut store = seeded();

        store.refresh_for_workflow("daily_planning".parse().unwrap());

        for gone in ["today", "agenda", "upcoming:days=7", "overdue"] {
            assert!(!store.contains(Category::Tasks, gone));
        }
        assert!(store.contains(Category::Tasks, "inbox"));
        assert!(store.contains(Category::Projects, "list"));
        assert!(store.contains(Category::Analytics, "productivity"));
    }

    #[test]
    fn test_workflow_parse_unknown() {
        assert!("spring_cleaning".parse::<Workflow>().is_err());
    }
}
