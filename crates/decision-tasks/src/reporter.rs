//! Submission progress reporting

use std::sync::{Arc, Mutex};

use crate::task::TaskId;

/// Events emitted while a graph is submitted
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionEvent {
    /// Submission of a group is starting
    GroupStarted { group: String, task_count: usize },
    /// The queue accepted a task
    TaskSubmitted { id: TaskId, name: String },
    /// The queue rejected a task; nothing after it is submitted
    TaskFailed { id: TaskId, name: String, error: String },
    /// Every task was submitted
    AllSubmitted { total: usize },
}

/// Trait for reporting submission progress
pub trait TaskReporter: Send + Sync {
    /// Handle a submission event
    fn report(&self, event: &SubmissionEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &SubmissionEvent) {
        match event {
            SubmissionEvent::GroupStarted { group, task_count } => {
                tracing::info!(group = %group, task_count, "submitting group");
            }
            SubmissionEvent::TaskSubmitted { id, name } => {
                tracing::info!(task_id = %id, "submitted {}", name);
            }
            SubmissionEvent::TaskFailed { id, name, error } => {
                tracing::error!(task_id = %id, "submission of {} failed: {}", name, error);
            }
            SubmissionEvent::AllSubmitted { total } => {
                tracing::info!(total, "all tasks submitted");
            }
        }
    }
}

/// Reporter that collects events for later inspection
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<SubmissionEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<SubmissionEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &SubmissionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Registry of task reporters
pub struct TaskReporterRegistry {
    reporters: Vec<Arc<dyn TaskReporter>>,
}

impl TaskReporterRegistry {
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    /// Register a reporter the caller keeps a handle on
    pub fn register_shared(&mut self, reporter: Arc<dyn TaskReporter>) {
        self.reporters.push(reporter);
    }

    /// Broadcast an event to all registered reporters
    pub fn broadcast(&self, event: &SubmissionEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}

impl Default for TaskReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
