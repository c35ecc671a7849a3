//! Queue task definitions
//!
//! Renders a [`TaskDescriptor`] to the JSON document the queue's `createTask`
//! endpoint accepts.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use decision_tasks::{CraftContext, TaskDescriptor, TaskImage, TaskPayload, WorkerKind};

const DEADLINE_DAYS: i64 = 1;
const EXPIRES_DAYS: i64 = 365;
const RETRIES: u32 = 5;

/// Format a timestamp the way the queue does
pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Task metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    pub name: String,
    pub description: String,
    pub owner: String,
    pub source: String,
}

/// Task definition as accepted by the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDefinition {
    pub provisioner_id: String,
    pub worker_type: String,
    pub task_group_id: String,
    pub scheduler_id: String,
    pub created: String,
    pub deadline: String,
    pub expires: String,
    pub retries: u32,
    pub tags: BTreeMap<String, String>,
    pub priority: String,
    /// The decision task first, then the task's own dependencies
    pub dependencies: Vec<String>,
    pub requires: String,
    pub routes: Vec<String>,
    pub scopes: Vec<String>,
    pub payload: Value,
    pub metadata: TaskMetadata,
}

impl TaskDefinition {
    /// Render a descriptor, timestamps counted from `created`
    pub fn render(cx: CraftContext<'_>, task: &TaskDescriptor, created: DateTime<Utc>) -> Self {
        let (provisioner_id, worker_type) = placement(cx, task.worker);

        let decision = cx.run.decision_task_id.clone();
        let mut dependencies = vec![decision.clone()];
        dependencies.extend(
            task.dependencies
                .iter()
                .map(|d| d.to_string())
                .filter(|d| *d != decision),
        );

        Self {
            provisioner_id,
            worker_type,
            task_group_id: decision,
            scheduler_id: cx.run.scheduler_id.clone(),
            created: format_timestamp(created),
            deadline: format_timestamp(created + Duration::days(DEADLINE_DAYS)),
            expires: format_timestamp(created + Duration::days(EXPIRES_DAYS)),
            retries: RETRIES,
            tags: BTreeMap::new(),
            priority: cx.run.priority.clone(),
            dependencies,
            requires: "all-completed".to_string(),
            routes: task.routes.clone(),
            scopes: task.scopes.iter().cloned().collect(),
            payload: render_payload(task, created),
            metadata: TaskMetadata {
                name: task.name.clone(),
                description: task.description.clone(),
                owner: cx.config.project.owner.clone(),
                source: cx.run.source(),
            },
        }
    }
}

/// Provisioner and worker type of a worker kind
fn placement(cx: CraftContext<'_>, worker: WorkerKind) -> (String, String) {
    let workers = &cx.config.workers;
    match worker {
        WorkerKind::Build | WorkerKind::Barrier => (
            workers.build_provisioner.clone(),
            cx.run.build_worker_type.clone(),
        ),
        WorkerKind::Images => (
            workers.build_provisioner.clone(),
            workers.images_worker_type(cx.run.trust_level),
        ),
        WorkerKind::Beetmover => (
            workers.scriptworker_provisioner.clone(),
            cx.run.beetmover_worker_type.clone(),
        ),
        WorkerKind::Signing { staging } => (
            workers.scriptworker_provisioner.clone(),
            if staging {
                workers.signing_staging.clone()
            } else {
                workers.signing.clone()
            },
        ),
    }
}

fn render_payload(task: &TaskDescriptor, created: DateTime<Utc>) -> Value {
    let docker = match &task.payload {
        TaskPayload::Script(payload) => return payload.clone(),
        TaskPayload::Docker(docker) => docker,
    };

    let mut payload = Map::new();
    payload.insert(
        "image".to_string(),
        match &docker.image {
            TaskImage::Named(name) => json!(name),
            TaskImage::Task { task_id, path } => json!({
                "type": "task-image",
                "path": path,
                "taskId": task_id,
            }),
        },
    );
    if !task.command.is_empty() {
        payload.insert(
            "command".to_string(),
            json!([docker.shell, "--login", "-cx", task.command_line()]),
        );
    }
    payload.insert("maxRunTime".to_string(), json!(docker.max_run_time));
    payload.insert("env".to_string(), json!(docker.env));

    let mut features = docker.features.clone();
    if !task.artifacts.is_empty() {
        features.insert("chainOfTrust".to_string(), true);
    }
    if task.needs_taskcluster_proxy() {
        features.insert("taskclusterProxy".to_string(), true);
    }
    payload.insert("features".to_string(), json!(features));

    if docker.privileged {
        payload.insert("capabilities".to_string(), json!({ "privileged": true }));
    }

    let artifacts: Map<String, Value> = task
        .artifacts
        .iter()
        .map(|(published, artifact)| {
            let expires = created + Duration::days(i64::from(artifact.expires_in_days));
            (
                published.clone(),
                json!({
                    "type": artifact.kind,
                    "path": artifact.path,
                    "expires": format_timestamp(expires),
                }),
            )
        })
        .collect();
    payload.insert("artifacts".to_string(), Value::Object(artifacts));

    Value::Object(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use decision_core::{Config, RunContext};
    use decision_tasks::craft::{craft_barrier_task, craft_build_task, craft_sign_task};
    use decision_tasks::{GradleTask, TaskId};

    fn run() -> RunContext {
        RunContext::new(
            "decision",
            "https://github.com/mozilla-mobile/android-components",
            "master",
            "abc123",
            1,
            "github-worker",
            "mobile-beetmover-v1",
        )
        .unwrap()
    }

    fn created() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(created()), "2024-06-01T12:00:00.000Z");
    }

    #[test]
    fn test_build_task_definition() {
        let (run, config) = (run(), Config::default());
        let cx = CraftContext::new(&run, &config);
        let image = TaskId::from("image");
        let gradle = GradleTask::new(":core", ":core:assemble", "assemble")
            .with_coverage()
            .with_artifact("public/core.zip", "core/build/core.zip");
        let task = craft_build_task(cx, &gradle, &image);

        let definition = TaskDefinition::render(cx, &task, created());
        assert_eq!(definition.provisioner_id, "aws-provisioner-v1");
        assert_eq!(definition.worker_type, "github-worker");
        assert_eq!(definition.task_group_id, "decision");
        assert_eq!(definition.dependencies, vec!["decision", "image"]);
        assert_eq!(definition.deadline, "2024-06-02T12:00:00.000Z");
        assert_eq!(definition.expires, "2025-06-01T12:00:00.000Z");
        assert_eq!(definition.retries, 5);
        assert_eq!(definition.requires, "all-completed");
        assert_eq!(
            definition.metadata.source,
            "https://github.com/mozilla-mobile/android-components/raw/abc123/.taskcluster.yml"
        );

        let payload = &definition.payload;
        assert_eq!(payload["command"][0], "/bin/bash");
        assert_eq!(payload["command"][2], "-cx");
        assert!(payload["command"][3]
            .as_str()
            .unwrap()
            .starts_with("git fetch https://github.com/mozilla-mobile/android-components master --tags && "));
        assert_eq!(payload["maxRunTime"], 7200);
        assert_eq!(payload["image"]["type"], "task-image");
        assert_eq!(payload["image"]["taskId"], "image");
        assert_eq!(payload["features"]["chainOfTrust"], true);
        assert_eq!(payload["features"]["taskclusterProxy"], true);
        assert_eq!(payload["artifacts"]["public/core.zip"]["type"], "file");
        assert_eq!(
            payload["artifacts"]["public/core.zip"]["expires"],
            "2025-06-01T12:00:00.000Z"
        );
    }

    #[test]
    fn test_camel_case_serialization() {
        let (run, config) = (run(), Config::default());
        let cx = CraftContext::new(&run, &config);
        let task = craft_barrier_task(cx, vec![TaskId::from("b")]);

        let value = serde_json::to_value(TaskDefinition::render(cx, &task, created())).unwrap();
        assert_eq!(value["provisionerId"], "aws-provisioner-v1");
        assert_eq!(value["taskGroupId"], "decision");
        assert_eq!(value["payload"]["image"], "alpine");
        assert_eq!(value["payload"]["command"][0], "/bin/sh");
        assert_eq!(value["payload"]["command"][3], "echo \"Dummy task\"");
        assert_eq!(value["payload"]["maxRunTime"], 600);
        assert!(value["payload"]["features"].as_object().unwrap().is_empty());
    }

    #[test]
    fn test_signing_placement() {
        let (run, config) = (run(), Config::default());
        let cx = CraftContext::new(&run, &config);
        let artifact = decision_core::ArtifactInfo {
            name: "feature-a".to_string(),
            artifact: "public/build/feature-a.maven.zip".to_string(),
            path: "a/build/target.maven.zip".to_string(),
            maven_destination: "maven2/a/".to_string(),
            should_publish: true,
        };
        let task = craft_sign_task(cx, &artifact, false, &TaskId::from("b"), &TaskId::from("w"));

        let definition = TaskDefinition::render(cx, &task, created());
        assert_eq!(definition.provisioner_id, "scriptworker-prov-v1");
        assert_eq!(definition.worker_type, "mobile-signing-v1");
        assert_eq!(definition.payload["upstreamArtifacts"][0]["taskId"], "b");
    }
}
