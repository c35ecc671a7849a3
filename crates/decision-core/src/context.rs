//! Per-run context
//!
//! Everything the CI trigger tells us about the current run. The value is
//! built once at process start and handed to every planner by reference.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pull request title marker that disables every task of the run
pub const SKIP_TASKS_TRIGGER: &str = "[ci skip]";

/// Immutable description of the triggering push or pull request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Task id of the decision task itself; used as the task group id
    pub decision_task_id: String,
    /// Repository the commit lives in
    pub repo_url: String,
    /// Branch (or ref) to fetch
    pub branch: String,
    /// Commit to check out
    pub commit: String,
    /// Push timestamp as reported by the trigger
    pub push_date_time: Option<String>,
    /// Pull request title, empty on pushes
    pub pull_request_title: String,
    /// Trust level of the trigger (1 for pull requests, 3 for releases)
    pub trust_level: u8,
    /// Scheduler id of the created tasks
    pub scheduler_id: String,
    /// Priority of the created tasks
    pub priority: String,
    /// Worker type running build-ish tasks
    pub build_worker_type: String,
    /// Worker type running beetmover tasks
    pub beetmover_worker_type: String,
}

impl RunContext {
    /// Validate required fields and build the context
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        decision_task_id: impl Into<String>,
        repo_url: impl Into<String>,
        branch: impl Into<String>,
        commit: impl Into<String>,
        trust_level: u8,
        build_worker_type: impl Into<String>,
        beetmover_worker_type: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let context = Self {
            decision_task_id: decision_task_id.into(),
            repo_url: repo_url.into(),
            branch: branch.into(),
            commit: commit.into(),
            push_date_time: None,
            pull_request_title: String::new(),
            trust_level,
            scheduler_id: "taskcluster-github".to_string(),
            priority: "lowest".to_string(),
            build_worker_type: build_worker_type.into(),
            beetmover_worker_type: beetmover_worker_type.into(),
        };
        context.validate()?;
        Ok(context)
    }

    /// Set the pull request title
    pub fn with_pull_request_title(mut self, title: impl Into<String>) -> Self {
        self.pull_request_title = title.into();
        self
    }

    /// Set the push timestamp
    pub fn with_push_date_time(mut self, push_date_time: Option<String>) -> Self {
        self.push_date_time = push_date_time;
        self
    }

    /// Set the scheduler id
    pub fn with_scheduler_id(mut self, scheduler_id: impl Into<String>) -> Self {
        self.scheduler_id = scheduler_id.into();
        self
    }

    /// Set the task priority
    pub fn with_priority(mut self, priority: impl Into<String>) -> Self {
        self.priority = priority.into();
        self
    }

    /// Check that every field a task definition needs is present
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("TASK_ID", &self.decision_task_id),
            ("MOBILE_HEAD_REPOSITORY", &self.repo_url),
            ("MOBILE_HEAD_BRANCH", &self.branch),
            ("MOBILE_HEAD_REV", &self.commit),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingField(name.to_string()));
            }
        }
        if !(1..=3).contains(&self.trust_level) {
            return Err(ConfigError::invalid(
                "TRUST_LEVEL",
                format!("expected 1, 2 or 3, got {}", self.trust_level),
            ));
        }
        Ok(())
    }

    /// Whether the pull request asked for no tasks at all
    pub fn skip_requested(&self) -> bool {
        self.pull_request_title.contains(SKIP_TASKS_TRIGGER)
    }

    /// Metadata source of every created task
    pub fn source(&self) -> String {
        format!("{}/raw/{}/.taskcluster.yml", self.repo_url, self.commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> RunContext {
        RunContext::new(
            "decision-id",
            "https://github.com/mozilla-mobile/android-components",
            "master",
            "abc123",
            1,
            "github-worker",
            "mobile-beetmover-v1",
        )
        .unwrap()
    }

    #[test]
    fn test_source_points_at_taskcluster_yml() {
        assert_eq!(
            context().source(),
            "https://github.com/mozilla-mobile/android-components/raw/abc123/.taskcluster.yml"
        );
    }

    #[test]
    fn test_skip_marker_detection() {
        assert!(!context().skip_requested());
        assert!(context()
            .with_pull_request_title("Fix typo [ci skip]")
            .skip_requested());
    }

    #[test]
    fn test_missing_commit_is_rejected() {
        let result = RunContext::new("id", "https://repo", "master", " ", 1, "w", "b");
        assert!(matches!(result, Err(ConfigError::MissingField(f)) if f == "MOBILE_HEAD_REV"));
    }

    #[test]
    fn test_trust_level_range() {
        let result = RunContext::new("id", "https://repo", "master", "abc", 7, "w", "b");
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_defaults() {
        let ctx = context();
        assert_eq!(ctx.scheduler_id, "taskcluster-github");
        assert_eq!(ctx.priority, "lowest");
        assert!(ctx.push_date_time.is_none());
    }
}
