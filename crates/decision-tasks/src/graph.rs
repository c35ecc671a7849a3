//! Task graph assembly and validation

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::task::{TaskDescriptor, TaskId};

/// Named group of tasks, submitted after every earlier group
#[derive(Debug, Clone, PartialEq)]
pub struct TaskGroup {
    pub name: String,
    pub tasks: Vec<TaskDescriptor>,
}

impl TaskGroup {
    pub fn new(name: impl Into<String>, tasks: Vec<TaskDescriptor>) -> Self {
        Self {
            name: name.into(),
            tasks,
        }
    }
}

/// A group whose tasks all carry an id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssembledGroup {
    pub name: String,
    /// Tasks in submission order
    pub tasks: Vec<(TaskId, TaskDescriptor)>,
}

/// Ordered, dependency-checked groups of tasks
///
/// Submitting the tasks in iteration order never submits a task before one
/// of its dependencies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskGraph {
    groups: Vec<AssembledGroup>,
}

impl TaskGraph {
    pub fn groups(&self) -> &[AssembledGroup] {
        &self.groups
    }

    /// Total number of tasks
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.tasks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every task in submission order, with the name of its group
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TaskId, &TaskDescriptor)> {
        self.groups.iter().flat_map(|group| {
            group
                .tasks
                .iter()
                .map(move |(id, task)| (group.name.as_str(), id, task))
        })
    }

    /// Get a human-readable summary of the submission plan
    pub fn execution_plan(&self) -> String {
        let mut plan = String::new();
        for group in &self.groups {
            plan.push_str(&format!("Group {} ({} tasks):\n", group.name, group.tasks.len()));
            for (id, task) in &group.tasks {
                let deps: Vec<String> = task.dependencies.iter().map(|d| d.to_string()).collect();
                if deps.is_empty() {
                    plan.push_str(&format!("  {} {}\n", id, task.name));
                } else {
                    plan.push_str(&format!(
                        "  {} {} (after: {})\n",
                        id,
                        task.name,
                        deps.join(", ")
                    ));
                }
            }
        }
        plan
    }
}

/// Errors during graph assembly
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// A dependency is neither an earlier task nor a known task
    #[error("Task '{task}' depends on unknown or later task {dependency}")]
    UnknownDependency { task: String, dependency: TaskId },

    /// Two tasks share an id
    #[error("Task id {0} is used more than once")]
    DuplicateTaskId(TaskId),
}

/// Assigns ids and checks dependency edges of ordered groups
#[derive(Debug, Clone, Default)]
pub struct TaskGraphAssembler {
    existing: BTreeSet<TaskId>,
}

impl TaskGraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task that already exists outside of the graph
    pub fn with_existing(mut self, id: TaskId) -> Self {
        self.existing.insert(id);
        self
    }

    pub fn with_existing_all(mut self, ids: impl IntoIterator<Item = TaskId>) -> Self {
        self.existing.extend(ids);
        self
    }

    /// Assemble groups given in dependency order
    #[instrument(skip_all, fields(groups = groups.len()))]
    pub fn assemble(&self, groups: Vec<TaskGroup>) -> Result<TaskGraph, GraphError> {
        let mut known = self.existing.clone();
        let mut assembled = Vec::with_capacity(groups.len());

        for group in groups {
            let mut tasks = Vec::with_capacity(group.tasks.len());
            for mut task in group.tasks {
                let id = task.id.clone().unwrap_or_else(TaskId::generate);
                if known.contains(&id) {
                    return Err(GraphError::DuplicateTaskId(id));
                }
                if let Some(dependency) = task.dependencies.iter().find(|d| !known.contains(*d)) {
                    return Err(GraphError::UnknownDependency {
                        task: task.name.clone(),
                        dependency: dependency.clone(),
                    });
                }

                known.insert(id.clone());
                task.id = Some(id.clone());
                tasks.push((id, task));
            }
            debug!(group = %group.name, tasks = tasks.len(), "group assembled");
            assembled.push(AssembledGroup {
                name: group.name,
                tasks,
            });
        }

        let graph = TaskGraph { groups: assembled };
        info!(tasks = graph.len(), "task graph assembled");
        Ok(graph)
    }
}
