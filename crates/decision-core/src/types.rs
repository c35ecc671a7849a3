//! Core types for modules and release artifacts

use serde::{Deserialize, Serialize};

/// Lint target used when a policy does not name one
pub const DEFAULT_LINT_TASK: &str = "lintRelease";

fn default_lint_task() -> String {
    DEFAULT_LINT_TASK.to_string()
}

/// How the tasks of a module are shaped
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum ModulePolicy {
    /// A single task running assemble, test and the release lint
    #[default]
    Default,

    /// One task per variant; the lint task rides along with exactly one of them
    SplitVariants {
        /// Variants that are only assembled
        #[serde(default)]
        assemble_only: Vec<String>,
        /// Variants that are assembled and unit tested
        #[serde(default)]
        assemble_and_test: Vec<String>,
        /// Lint target; a variant is eligible when its name is part of it
        #[serde(default = "default_lint_task")]
        lint_task: String,
    },

    /// A single task with a module-specific lint target
    CustomLint {
        /// Lint target replacing the generic one
        lint_task: String,
    },
}

impl ModulePolicy {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::SplitVariants { .. } => "split-variants",
            Self::CustomLint { .. } => "custom-lint",
        }
    }
}

/// A buildable unit of the source tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    /// Module name, without the leading gradle colon
    pub name: String,
    /// Task-shaping policy
    #[serde(default)]
    pub policy: ModulePolicy,
}

impl Module {
    /// Create a module using the default policy
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            policy: ModulePolicy::Default,
        }
    }

    /// Set the policy
    pub fn with_policy(mut self, policy: ModulePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Gradle project path, e.g. `:browser-engine`
    pub fn gradle_name(&self) -> String {
        format!(":{}", self.name)
    }

    /// Fully qualified gradle task, e.g. `:browser-engine:assemble`
    pub fn gradle_task(&self, task: &str) -> String {
        format!(":{}:{}", self.name, task)
    }
}

/// A publishable output of a release build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactInfo {
    /// Module name
    pub name: String,
    /// Path the build task publishes the artifact under
    pub artifact: String,
    /// Path of the artifact inside the worker
    pub path: String,
    /// Destination inside the maven bucket
    pub maven_destination: String,
    /// Whether releases publish this artifact
    pub should_publish: bool,
}

impl ArtifactInfo {
    /// Gradle project path of the module producing the artifact
    pub fn gradle_name(&self) -> String {
        format!(":{}", self.name)
    }
}
