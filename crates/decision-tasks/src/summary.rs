//! Plan summaries for humans and machines

use serde::Serialize;

use crate::graph::TaskGraph;
use crate::task::WorkerKind;

/// One task of a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskLine {
    pub id: String,
    pub name: String,
    pub worker: String,
    pub dependencies: usize,
}

/// One group of a summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub tasks: Vec<TaskLine>,
}

/// What a run planned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// `pr-or-push` or `release`
    pub command: String,
    pub groups: Vec<GroupSummary>,
    pub total_tasks: usize,
    /// Docker images built by earlier runs
    pub reused_images: usize,
    /// Destination bucket of a release
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    /// The run was skipped on request
    pub skipped: bool,
}

fn worker_name(worker: WorkerKind) -> &'static str {
    match worker {
        WorkerKind::Build => "build",
        WorkerKind::Images => "images",
        WorkerKind::Beetmover => "beetmover",
        WorkerKind::Signing { .. } => "signing",
        WorkerKind::Barrier => "barrier",
    }
}

impl PlanSummary {
    pub fn from_graph(command: impl Into<String>, graph: &TaskGraph) -> Self {
        let groups: Vec<GroupSummary> = graph
            .groups()
            .iter()
            .map(|group| GroupSummary {
                name: group.name.clone(),
                tasks: group
                    .tasks
                    .iter()
                    .map(|(id, task)| TaskLine {
                        id: id.to_string(),
                        name: task.name.clone(),
                        worker: worker_name(task.worker).to_string(),
                        dependencies: task.dependencies.len(),
                    })
                    .collect(),
            })
            .collect();

        Self {
            command: command.into(),
            groups,
            total_tasks: graph.len(),
            ..Self::default()
        }
    }

    /// Summary of a run that scheduled nothing
    pub fn skipped(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            skipped: true,
            ..Self::default()
        }
    }

    pub fn with_reused_images(mut self, reused: usize) -> Self {
        self.reused_images = reused;
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }
}

/// Render a summary as a markdown report
pub fn render_markdown(summary: &PlanSummary) -> String {
    let mut out = format!("## Decision task: `{}`\n\n", summary.command);
    if summary.skipped {
        out.push_str("Skipped: no task was scheduled.\n");
        return out;
    }

    out.push_str(&format!(
        "**{} tasks** scheduled, {} docker image(s) reused.",
        summary.total_tasks, summary.reused_images
    ));
    if let Some(bucket) = &summary.bucket {
        out.push_str(&format!(" Publishing to `{}`.", bucket));
    }
    out.push('\n');

    for group in &summary.groups {
        out.push_str(&format!("\n### {} ({})\n\n", group.name, group.tasks.len()));
        if group.tasks.is_empty() {
            out.push_str("_none_\n");
            continue;
        }
        out.push_str("| Task | Worker | Task id |\n|---|---|---|\n");
        for task in &group.tasks {
            out.push_str(&format!(
                "| {} | {} | `{}` |\n",
                task.name.replace('|', "\\|"),
                task.worker,
                task.id
            ));
        }
    }
    out
}

/// Render a summary as plain text
pub fn render_text(summary: &PlanSummary) -> String {
    if summary.skipped {
        return format!("{}: skipped, no task scheduled\n", summary.command);
    }

    let mut out = format!(
        "{}: {} tasks ({} reused images)\n",
        summary.command, summary.total_tasks, summary.reused_images
    );
    if let Some(bucket) = &summary.bucket {
        out.push_str(&format!("bucket: {}\n", bucket));
    }
    for group in &summary.groups {
        out.push_str(&format!("{} ({})\n", group.name, group.tasks.len()));
        for task in &group.tasks {
            out.push_str(&format!("  {}  {}\n", task.id, task.name));
        }
    }
    out
}
