//! Task types and descriptors

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default artifact lifetime (one year)
pub const DEFAULT_EXPIRES_IN_DAYS: u32 = 365;

/// Opaque Taskcluster task identifier
///
/// Generated ids are "nice" slugs: 22 URL-safe base64 characters of a v4 UUID
/// whose first bit is cleared, so they never start with `-`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id
    pub fn generate() -> Self {
        let mut bytes = *Uuid::new_v4().as_bytes();
        bytes[0] &= 0x7f;
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What an artifact path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    File,
}

/// An artifact published by a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskArtifact {
    pub kind: ArtifactKind,
    /// Source path inside the worker
    pub path: String,
    /// Lifetime, counted from task creation
    pub expires_in_days: u32,
}

impl TaskArtifact {
    /// A file artifact with the default lifetime
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            kind: ArtifactKind::File,
            path: path.into(),
            expires_in_days: DEFAULT_EXPIRES_IN_DAYS,
        }
    }
}

/// Which pool of workers runs a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum WorkerKind {
    /// Gradle builds, tests and lints
    Build,
    /// Docker image builds
    Images,
    /// Maven publication through beetmover
    Beetmover,
    /// Artifact signing
    Signing { staging: bool },
    /// No-op tasks aggregating other tasks
    Barrier,
}

/// Image a docker-worker task runs in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskImage {
    /// Image pulled from a registry
    Named(String),
    /// Image produced as an artifact of another task
    Task { task_id: TaskId, path: String },
}

/// Settings of a docker-worker task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerPayload {
    pub image: TaskImage,
    /// Shell wrapping the command, e.g. `/bin/bash`
    pub shell: String,
    /// Max run time in seconds
    pub max_run_time: u32,
    pub env: BTreeMap<String, String>,
    /// Explicit worker features; chain of trust and proxy are derived
    pub features: BTreeMap<String, bool>,
    pub privileged: bool,
}

impl DockerPayload {
    /// A bash payload in the given image
    pub fn new(image: TaskImage, max_run_time: u32) -> Self {
        Self {
            image,
            shell: "/bin/bash".to_string(),
            max_run_time,
            env: BTreeMap::new(),
            features: BTreeMap::new(),
            privileged: false,
        }
    }
}

/// Payload of a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskPayload {
    /// Runs `command` inside a container
    Docker(DockerPayload),
    /// Scriptworker payload, passed through as-is
    Script(serde_json::Value),
}

/// One schedulable unit of work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescriptor {
    /// Set by the planner when another task refers to this one, otherwise by the assembler
    pub id: Option<TaskId>,
    pub name: String,
    pub description: String,
    /// Shell instructions, run in order
    pub command: Vec<String>,
    /// Tasks that must complete first
    pub dependencies: BTreeSet<TaskId>,
    /// Published path -> source
    pub artifacts: BTreeMap<String, TaskArtifact>,
    pub scopes: BTreeSet<String>,
    pub worker: WorkerKind,
    pub routes: Vec<String>,
    pub payload: TaskPayload,
}

impl TaskDescriptor {
    /// Create a new descriptor
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        worker: WorkerKind,
        payload: TaskPayload,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            command: Vec::new(),
            dependencies: BTreeSet::new(),
            artifacts: BTreeMap::new(),
            scopes: BTreeSet::new(),
            worker,
            routes: Vec::new(),
            payload,
        }
    }

    /// Pre-assign the id
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    /// Set the command
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Add a dependency
    pub fn with_dependency(mut self, id: TaskId) -> Self {
        self.dependencies.insert(id);
        self
    }

    /// Add several dependencies
    pub fn with_dependencies(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.dependencies.extend(ids);
        self
    }

    /// Declare an artifact
    pub fn with_artifact(mut self, published: impl Into<String>, artifact: TaskArtifact) -> Self {
        self.artifacts.insert(published.into(), artifact);
        self
    }

    /// Require a scope
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scopes.insert(scope.into());
        self
    }

    /// Add an index route
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.routes.push(route.into());
        self
    }

    /// The id, once assigned
    pub fn id(&self) -> Option<&TaskId> {
        self.id.as_ref()
    }

    /// The instructions as a single shell line
    pub fn command_line(&self) -> String {
        self.command.join(" && ")
    }

    /// Whether one of the instructions invokes `target` as a whole word
    pub fn runs(&self, target: &str) -> bool {
        self.command
            .iter()
            .any(|line| line.split_whitespace().any(|word| word == target))
    }

    /// Whether a scope needs the taskcluster proxy (secret access)
    pub fn needs_taskcluster_proxy(&self) -> bool {
        self.scopes.iter().any(|s| s.starts_with("secrets:"))
    }
}
