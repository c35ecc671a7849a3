//! Graph submission

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use decision_tasks::{CraftContext, SubmissionEvent, TaskGraph, TaskId, TaskReporterRegistry};

use crate::definition::TaskDefinition;
use crate::error::{Result, TaskclusterError};

/// Write access to the queue
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Create a task under a chosen id
    async fn create_task(&self, task_id: &TaskId, definition: &TaskDefinition) -> Result<()>;

    /// Definition of a task, including the fields the queue fills in
    async fn task(&self, task_id: &TaskId) -> Result<Value>;
}

/// One entry of the full task graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullTaskEntry {
    pub task: Value,
}

/// Every submitted task, as the queue knows it
pub type FullTaskGraph = BTreeMap<String, FullTaskEntry>;

/// Submits an assembled graph, group by group
pub struct GraphSubmitter<'a> {
    queue: &'a dyn TaskQueue,
    cx: CraftContext<'a>,
    reporters: TaskReporterRegistry,
    created: Option<DateTime<Utc>>,
}

impl<'a> GraphSubmitter<'a> {
    pub fn new(queue: &'a dyn TaskQueue, cx: CraftContext<'a>) -> Self {
        Self {
            queue,
            cx,
            reporters: TaskReporterRegistry::new(),
            created: None,
        }
    }

    pub fn with_reporters(mut self, reporters: TaskReporterRegistry) -> Self {
        self.reporters = reporters;
        self
    }

    /// Pin the creation time of every definition
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Definitions of every task, in submission order
    pub fn render(&self, graph: &TaskGraph) -> Vec<(TaskId, TaskDefinition)> {
        let created = self.created.unwrap_or_else(Utc::now);
        graph
            .iter()
            .map(|(_, id, task)| (id.clone(), TaskDefinition::render(self.cx, task, created)))
            .collect()
    }

    /// Submit every task in order, stopping at the first failure.
    ///
    /// Tasks submitted before a failure stay registered. Once every task is
    /// created, each is fetched back to build the full task graph.
    #[instrument(skip_all, fields(tasks = graph.len()))]
    pub async fn submit(&self, graph: &TaskGraph) -> Result<FullTaskGraph> {
        let created = self.created.unwrap_or_else(Utc::now);

        for group in graph.groups() {
            self.reporters.broadcast(&SubmissionEvent::GroupStarted {
                group: group.name.clone(),
                task_count: group.tasks.len(),
            });

            for (id, task) in &group.tasks {
                let definition = TaskDefinition::render(self.cx, task, created);
                if let Err(e) = self.queue.create_task(id, &definition).await {
                    self.reporters.broadcast(&SubmissionEvent::TaskFailed {
                        id: id.clone(),
                        name: task.name.clone(),
                        error: e.to_string(),
                    });
                    return Err(TaskclusterError::SubmissionFailed {
                        task_id: id.clone(),
                        name: task.name.clone(),
                        message: e.to_string(),
                    });
                }
                self.reporters.broadcast(&SubmissionEvent::TaskSubmitted {
                    id: id.clone(),
                    name: task.name.clone(),
                });
            }
        }

        let mut full_graph = FullTaskGraph::new();
        for (_, id, _) in graph.iter() {
            let task = self.queue.task(id).await?;
            full_graph.insert(id.to_string(), FullTaskEntry { task });
        }

        self.reporters.broadcast(&SubmissionEvent::AllSubmitted {
            total: full_graph.len(),
        });
        info!(total = full_graph.len(), "task graph submitted");
        Ok(full_graph)
    }
}
