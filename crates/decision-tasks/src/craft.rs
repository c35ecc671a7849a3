//! Task crafting
//!
//! Pure functions turning the run context and configuration into
//! [`TaskDescriptor`]s. Nothing here talks to the execution service or picks
//! task ids for tasks nobody refers to; that is left to the planners and the
//! graph assembler.

use serde_json::json;

use decision_core::config::QualityTaskConfig;
use decision_core::{ArtifactInfo, Config, RunContext};

use crate::release::{Bucket, ReleaseRequest};
use crate::task::{
    DockerPayload, TaskArtifact, TaskDescriptor, TaskId, TaskImage, TaskPayload, WorkerKind,
};

/// Gradle invocation shared by every build task
pub const GRADLE_COMMAND: &str = "./gradlew --no-daemon clean";

/// Post-build step uploading coverage reports
pub const COVERAGE_UPLOAD_SCRIPT: &str = "automation/taskcluster/action/upload_coverage_report.sh";

/// Artifact under which image-build tasks publish their image
pub const DOCKER_IMAGE_ARTIFACT: &str = "public/image.tar.zst";

const BARRIER_IMAGE: &str = "alpine";
const BARRIER_MAX_RUN_TIME: u32 = 600;

/// Borrowed view of what every crafted task needs
#[derive(Debug, Clone, Copy)]
pub struct CraftContext<'a> {
    pub run: &'a RunContext,
    pub config: &'a Config,
}

impl<'a> CraftContext<'a> {
    pub fn new(run: &'a RunContext, config: &'a Config) -> Self {
        Self { run, config }
    }

    /// Task name prefixed with the project display name
    pub fn task_name(&self, title: &str) -> String {
        format!("{} - {}", self.config.project.display_name, title)
    }

    /// Id of the running decision task
    pub fn decision_task_id(&self) -> TaskId {
        TaskId::new(self.run.decision_task_id.clone())
    }
}

/// A gradle invocation for one module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradleTask {
    /// Gradle project path, e.g. `:browser-engine`
    pub module: String,
    /// Space separated gradle targets
    pub targets: String,
    /// Suffix of the task name
    pub subtitle: String,
    pub coverage: bool,
    pub snapshot: bool,
    /// Published path and worker path of the release artifact
    pub artifact: Option<(String, String)>,
}

impl GradleTask {
    pub fn new(
        module: impl Into<String>,
        targets: impl Into<String>,
        subtitle: impl Into<String>,
    ) -> Self {
        Self {
            module: module.into(),
            targets: targets.into(),
            subtitle: subtitle.into(),
            coverage: false,
            snapshot: false,
            artifact: None,
        }
    }

    pub fn with_coverage(mut self) -> Self {
        self.coverage = true;
        self
    }

    pub fn with_snapshot(mut self, snapshot: bool) -> Self {
        self.snapshot = snapshot;
        self
    }

    pub fn with_artifact(mut self, published: impl Into<String>, path: impl Into<String>) -> Self {
        self.artifact = Some((published.into(), path.into()));
        self
    }

    /// The full gradle command line
    pub fn command(&self) -> String {
        let mut command = GRADLE_COMMAND.to_string();
        if self.coverage {
            command.push_str(" -Pcoverage");
        }
        if self.snapshot {
            command.push_str(" -Psnapshot");
        }
        command.push(' ');
        command.push_str(&self.targets);
        command
    }
}

/// Fetch the branch with tags, then check out the commit
pub fn checkout_commands(run: &RunContext) -> Vec<String> {
    vec![
        format!("git fetch {} {} --tags", run.repo_url, run.branch),
        "git config advice.detachedHead false".to_string(),
        format!("git checkout {}", run.commit),
    ]
}

fn task_image(image_task_id: &TaskId) -> TaskImage {
    TaskImage::Task {
        task_id: image_task_id.clone(),
        path: DOCKER_IMAGE_ARTIFACT.to_string(),
    }
}

/// A docker-worker task on the build workers, running `steps` after checkout
fn craft_build_ish_task(
    cx: CraftContext<'_>,
    name: String,
    description: String,
    steps: Vec<String>,
    image_task_id: &TaskId,
) -> TaskDescriptor {
    let mut command = checkout_commands(cx.run);
    command.extend(steps);

    let payload = DockerPayload::new(task_image(image_task_id), cx.config.workers.max_run_time);
    TaskDescriptor::new(name, description, WorkerKind::Build, TaskPayload::Docker(payload))
        .with_command(command)
        .with_dependency(image_task_id.clone())
}

/// Gradle build task of a module
pub fn craft_build_task(
    cx: CraftContext<'_>,
    gradle: &GradleTask,
    image_task_id: &TaskId,
) -> TaskDescriptor {
    let mut steps = vec![gradle.command()];
    if gradle.coverage {
        steps.push(COVERAGE_UPLOAD_SCRIPT.to_string());
    }

    let mut task = craft_build_ish_task(
        cx,
        cx.task_name(&format!("Module {} {}", gradle.module, gradle.subtitle)),
        format!("Execute Gradle tasks for module {}", gradle.module),
        steps,
        image_task_id,
    );

    if gradle.coverage {
        task = task.with_scope(format!(
            "secrets:get:{}",
            cx.config.project.coverage_secret
        ));
    }
    if let Some((published, path)) = &gradle.artifact {
        task = task.with_artifact(published.clone(), TaskArtifact::file(path.clone()));
    }
    task
}

/// Repository-wide quality task (detekt, ktlint, ...)
pub fn craft_quality_task(
    cx: CraftContext<'_>,
    quality: &QualityTaskConfig,
    image_task_id: &TaskId,
) -> TaskDescriptor {
    craft_build_ish_task(
        cx,
        cx.task_name(&quality.name),
        quality.description.clone(),
        vec![quality.command.clone()],
        image_task_id,
    )
}

/// Every configured quality task
pub fn craft_quality_tasks(cx: CraftContext<'_>, image_task_id: &TaskId) -> Vec<TaskDescriptor> {
    cx.config
        .quality
        .iter()
        .map(|quality| craft_quality_task(cx, quality, image_task_id))
        .collect()
}

/// No-op task completing once all `dependencies` completed
pub fn craft_barrier_task(
    cx: CraftContext<'_>,
    dependencies: impl IntoIterator<Item = TaskId>,
) -> TaskDescriptor {
    let mut payload = DockerPayload::new(
        TaskImage::Named(BARRIER_IMAGE.to_string()),
        BARRIER_MAX_RUN_TIME,
    );
    payload.shell = "/bin/sh".to_string();

    TaskDescriptor::new(
        cx.task_name("Barrier task to wait on other tasks to complete"),
        "Dummy tasks that ensures all other tasks are correctly done before publishing them",
        WorkerKind::Barrier,
        TaskPayload::Docker(payload),
    )
    .with_command(vec!["echo \"Dummy task\"".to_string()])
    .with_dependencies(dependencies)
}

/// Index route under which the image of a build context is cached
pub fn docker_image_route(cx: CraftContext<'_>, image: &str, hash: &str) -> String {
    format!(
        "index.{}.cache.level-{}.docker-images.v1.{}.hash.{}",
        cx.config.project.index_namespace, cx.run.trust_level, image, hash
    )
}

/// Task building a docker image from its build context
///
/// The builder image runs its own entrypoint, so the task has no command. The
/// context archive is published by the decision task itself.
pub fn craft_docker_image_task(cx: CraftContext<'_>, image: &str, hash: &str) -> TaskDescriptor {
    let docker = &cx.config.docker;
    let mut payload = DockerPayload::new(
        TaskImage::Named(docker.builder_image.clone()),
        docker.max_run_time,
    );
    payload.privileged = true;
    payload.features.insert("dind".to_string(), true);
    payload.features.insert("chainOfTrust".to_string(), true);
    payload.features.insert("taskclusterProxy".to_string(), true);
    payload.env = [
        ("CONTEXT_TASK_ID", cx.run.decision_task_id.clone()),
        (
            "CONTEXT_PATH",
            format!("public/docker-contexts/{}.tar.gz", image),
        ),
        ("HASH", hash.to_string()),
        ("PROJECT", cx.config.project.name.clone()),
        ("IMAGE_NAME", image.to_string()),
        ("DOCKER_IMAGE_NAME", image.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    TaskDescriptor::new(
        cx.task_name(&format!("Docker image build: {}", image)),
        format!("Build the docker image {} (hash {})", image, hash),
        WorkerKind::Images,
        TaskPayload::Docker(payload),
    )
    .with_artifact(
        DOCKER_IMAGE_ARTIFACT,
        TaskArtifact::file("/workspace/image.tar.zst"),
    )
    .with_route(docker_image_route(cx, image, hash))
}

/// Signing task of one release artifact
pub fn craft_sign_task(
    cx: CraftContext<'_>,
    artifact: &ArtifactInfo,
    is_staging: bool,
    build_task_id: &TaskId,
    barrier_task_id: &TaskId,
) -> TaskDescriptor {
    let payload = json!({
        "upstreamArtifacts": [{
            "paths": [artifact.artifact],
            "formats": ["autograph_gpg"],
            "taskId": build_task_id,
            "taskType": "build",
        }]
    });

    let cert = if is_staging { "dep" } else { "release" };
    TaskDescriptor::new(
        cx.task_name(&format!("Sign Module {}", artifact.gradle_name())),
        format!("Sign release module {}", artifact.name),
        WorkerKind::Signing { staging: is_staging },
        TaskPayload::Script(payload),
    )
    .with_dependency(build_task_id.clone())
    .with_dependency(barrier_task_id.clone())
    .with_scope(format!(
        "{}:signing:cert:{}-signing",
        cx.config.project.scope_prefix, cert
    ))
}

/// Artifacts of the upstream tasks a beetmover task publishes
pub struct PublishInputs<'a> {
    pub build: &'a TaskId,
    pub barrier: &'a TaskId,
    pub sign: Option<&'a TaskId>,
}

/// Beetmover task publishing one release artifact to maven
pub fn craft_beetmover_task(
    cx: CraftContext<'_>,
    artifact: &ArtifactInfo,
    request: &ReleaseRequest,
    inputs: PublishInputs<'_>,
) -> TaskDescriptor {
    let bucket = Bucket::select(request.is_snapshot, request.is_staging);

    let mut upstream = vec![json!({
        "paths": [artifact.artifact],
        "taskId": inputs.build,
        "taskType": "build",
        "zipExtract": true,
    })];
    if let Some(sign) = inputs.sign {
        upstream.push(json!({
            "paths": [format!("{}.asc", artifact.artifact)],
            "taskId": sign,
            "taskType": "signing",
        }));
    }

    let payload = json!({
        "upstreamArtifacts": upstream,
        "artifactMap": {
            artifact.artifact.clone(): artifact.maven_destination,
        },
        "releaseProperties": {
            "appName": if request.is_snapshot { "snapshot_components" } else { "components" },
        },
        "version": request.published_version(),
        "artifact_id": artifact.name,
    });

    let prefix = &cx.config.project.scope_prefix;
    let mut task = TaskDescriptor::new(
        cx.task_name(&format!(
            "Publish Module {} via beetmover",
            artifact.gradle_name()
        )),
        format!(
            "Publish release module {} to {}",
            artifact.name,
            bucket.public_url()
        ),
        WorkerKind::Beetmover,
        TaskPayload::Script(payload),
    )
    .with_dependency(inputs.build.clone())
    .with_dependency(inputs.barrier.clone())
    .with_scope(format!("{}:beetmover:bucket:{}", prefix, bucket.name()))
    .with_scope(format!("{}:beetmover:action:push-to-maven", prefix));

    if let Some(sign) = inputs.sign {
        task = task.with_dependency(sign.clone());
    }
    task
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run() -> RunContext {
        RunContext::new(
            "decision",
            "https://github.com/mozilla-mobile/android-components",
            "master",
            "abc123",
            3,
            "github-worker",
            "mobile-beetmover-v1",
        )
        .unwrap()
    }

    fn artifact() -> ArtifactInfo {
        ArtifactInfo {
            name: "feature-a".to_string(),
            artifact: "public/build/feature-a.maven.zip".to_string(),
            path: "components/feature/a/build/target.maven.zip".to_string(),
            maven_destination: "maven2/org/mozilla/components/feature-a/0.52.0/".to_string(),
            should_publish: true,
        }
    }

    #[test]
    fn test_checkout_commands() {
        let commands = checkout_commands(&run());
        assert_eq!(
            commands,
            vec![
                "git fetch https://github.com/mozilla-mobile/android-components master --tags",
                "git config advice.detachedHead false",
                "git checkout abc123",
            ]
        );
    }

    #[test]
    fn test_gradle_command_flags() {
        let gradle = GradleTask::new(":core", ":core:assemble", "assemble")
            .with_coverage()
            .with_snapshot(true);
        assert_eq!(
            gradle.command(),
            "./gradlew --no-daemon clean -Pcoverage -Psnapshot :core:assemble"
        );
    }

    #[test]
    fn test_build_task_with_coverage() {
        let run = run();
        let config = Config::default();
        let cx = CraftContext::new(&run, &config);
        let image = TaskId::from("image");

        let gradle = GradleTask::new(":core", ":core:assemble :core:test", "assembleAndTest")
            .with_coverage();
        let task = craft_build_task(cx, &gradle, &image);

        assert_eq!(task.name, "Android Components - Module :core assembleAndTest");
        assert_eq!(task.description, "Execute Gradle tasks for module :core");
        assert_eq!(task.command[0], checkout_commands(&run)[0]);
        assert_eq!(task.command.last().unwrap(), COVERAGE_UPLOAD_SCRIPT);
        assert!(task.needs_taskcluster_proxy());
        assert!(task.dependencies.contains(&image));
        match &task.payload {
            TaskPayload::Docker(payload) => {
                assert_eq!(payload.max_run_time, 7200);
                assert_eq!(
                    payload.image,
                    TaskImage::Task {
                        task_id: image.clone(),
                        path: DOCKER_IMAGE_ARTIFACT.to_string()
                    }
                );
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_barrier_task() {
        let run = run();
        let config = Config::default();
        let cx = CraftContext::new(&run, &config);
        let builds = vec![TaskId::from("a"), TaskId::from("b")];

        let task = craft_barrier_task(cx, builds.clone());
        assert_eq!(task.worker, WorkerKind::Barrier);
        assert_eq!(task.dependencies.len(), 2);
        match &task.payload {
            TaskPayload::Docker(payload) => {
                assert_eq!(payload.shell, "/bin/sh");
                assert_eq!(payload.max_run_time, 600);
                assert_eq!(payload.image, TaskImage::Named("alpine".to_string()));
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_docker_image_task() {
        let run = run();
        let config = Config::default();
        let cx = CraftContext::new(&run, &config);

        let task = craft_docker_image_task(cx, "build", "deadbeef");
        assert_eq!(
            task.routes,
            vec!["index.project.mobile.android-components.cache.level-3.docker-images.v1.build.hash.deadbeef"]
        );
        assert!(task.artifacts.contains_key(DOCKER_IMAGE_ARTIFACT));
        match &task.payload {
            TaskPayload::Docker(payload) => {
                assert!(payload.privileged);
                assert_eq!(payload.env["CONTEXT_TASK_ID"], "decision");
                assert_eq!(
                    payload.env["CONTEXT_PATH"],
                    "public/docker-contexts/build.tar.gz"
                );
                assert_eq!(payload.env["HASH"], "deadbeef");
                assert_eq!(payload.max_run_time, 3600);
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_quality_tasks() {
        let run = run();
        let config = Config::default();
        let cx = CraftContext::new(&run, &config);

        let tasks = craft_quality_tasks(cx, &TaskId::from("image"));
        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "Android Components - detekt",
                "Android Components - ktlint",
                "Android Components - compare-locales"
            ]
        );
        assert!(tasks[0].runs("detekt"));
    }

    #[test]
    fn test_beetmover_task() {
        let run = run();
        let config = Config::default();
        let cx = CraftContext::new(&run, &config);
        let build = TaskId::from("build");
        let barrier = TaskId::from("barrier");
        let request = ReleaseRequest::new("0.52.0", true, false);

        let task = craft_beetmover_task(
            cx,
            &artifact(),
            &request,
            PublishInputs {
                build: &build,
                barrier: &barrier,
                sign: None,
            },
        );

        assert_eq!(
            task.name,
            "Android Components - Publish Module :feature-a via beetmover"
        );
        assert!(task.scopes.contains(
            "project:mobile:android-components:releng:beetmover:bucket:maven-snapshot-production"
        ));
        assert_eq!(
            task.dependencies.iter().cloned().collect::<Vec<_>>(),
            vec![barrier, build]
        );
        match &task.payload {
            TaskPayload::Script(payload) => {
                assert_eq!(payload["version"], "0.52.0-SNAPSHOT");
                assert_eq!(payload["artifact_id"], "feature-a");
                assert_eq!(payload["releaseProperties"]["appName"], "snapshot_components");
                assert_eq!(payload["upstreamArtifacts"][0]["zipExtract"], true);
                assert_eq!(
                    payload["artifactMap"]["public/build/feature-a.maven.zip"],
                    "maven2/org/mozilla/components/feature-a/0.52.0/"
                );
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_sign_task() {
        let run = run();
        let config = Config::default();
        let cx = CraftContext::new(&run, &config);

        let task = craft_sign_task(
            cx,
            &artifact(),
            true,
            &TaskId::from("build"),
            &TaskId::from("barrier"),
        );
        assert_eq!(task.worker, WorkerKind::Signing { staging: true });
        assert!(task
            .scopes
            .contains("project:mobile:android-components:releng:signing:cert:dep-signing"));
        match &task.payload {
            TaskPayload::Script(payload) => {
                assert_eq!(payload["upstreamArtifacts"][0]["formats"][0], "autograph_gpg");
            }
            other => panic!("unexpected payload {:?}", other),
        }
    }
}
