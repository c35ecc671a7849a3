//! End-to-end decision run: discover, plan, submit, record

use std::path::{Path, PathBuf};

use tracing::{info, instrument};

use decision_core::build_config::validate_version;
use decision_core::{ArtifactInfo, BuildConfig, Config, ConfigError, Module};
use decision_tasks::{
    plan_pr_or_push, plan_release, Bucket, CraftContext, DockerImageCache, PlanSummary,
    ReleaseRequest, TaskGraph, TaskId, TaskIndex, TaskReporterRegistry,
};

use crate::chain_of_trust::write_chain_of_trust;
use crate::definition::TaskDefinition;
use crate::error::Result;
use crate::submit::{FullTaskGraph, GraphSubmitter, TaskQueue};

/// Which graph to build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Build, test and lint every module
    PrOrPush,
    /// Build and publish every publishable module
    Release {
        /// Defaults to the version of the build config
        version: Option<String>,
        is_snapshot: bool,
        is_staging: bool,
    },
}

impl RunMode {
    pub fn command(&self) -> &'static str {
        match self {
            Self::PrOrPush => "pr-or-push",
            Self::Release { .. } => "release",
        }
    }

    pub fn is_release(&self) -> bool {
        matches!(self, Self::Release { .. })
    }
}

/// Inputs of a decision run
pub struct DecisionRun<'a> {
    cx: CraftContext<'a>,
    repo_root: &'a Path,
    index: &'a dyn TaskIndex,
    queue: &'a dyn TaskQueue,
    dry_run: bool,
    reporters: TaskReporterRegistry,
}

impl<'a> DecisionRun<'a> {
    pub fn new(
        cx: CraftContext<'a>,
        repo_root: &'a Path,
        index: &'a dyn TaskIndex,
        queue: &'a dyn TaskQueue,
    ) -> Self {
        Self {
            cx,
            repo_root,
            index,
            queue,
            dry_run: false,
            reporters: TaskReporterRegistry::new(),
        }
    }

    /// Plan without submitting anything
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_reporters(mut self, reporters: TaskReporterRegistry) -> Self {
        self.reporters = reporters;
        self
    }
}

/// A planned graph and its rendered definitions
#[derive(Debug, Clone)]
pub struct PlannedRun {
    pub graph: TaskGraph,
    pub definitions: Vec<(TaskId, TaskDefinition)>,
    pub reused_images: usize,
    /// Destination of a release
    pub bucket: Option<Bucket>,
}

/// Result of a decision run
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The trigger asked for no tasks
    Skipped,
    /// Planned, nothing submitted
    DryRun(PlannedRun),
    /// Every task submitted and the chain of trust written
    Submitted {
        planned: PlannedRun,
        full_graph: FullTaskGraph,
        artifacts: Vec<PathBuf>,
    },
}

impl RunOutcome {
    pub fn planned(&self) -> Option<&PlannedRun> {
        match self {
            Self::Skipped => None,
            Self::DryRun(planned) | Self::Submitted { planned, .. } => Some(planned),
        }
    }

    /// Number of tasks planned
    pub fn task_count(&self) -> usize {
        self.planned().map(|p| p.graph.len()).unwrap_or(0)
    }

    pub fn summary(&self, command: &str) -> PlanSummary {
        let Some(planned) = self.planned() else {
            return PlanSummary::skipped(command);
        };
        let summary = PlanSummary::from_graph(command, &planned.graph)
            .with_reused_images(planned.reused_images);
        match planned.bucket {
            Some(bucket) => summary.with_bucket(bucket.name()),
            None => summary,
        }
    }
}

/// What the build config yields for a run, checked before any lookup
enum PlanInputs {
    PrOrPush {
        modules: Vec<Module>,
    },
    Release {
        artifacts: Vec<ArtifactInfo>,
        request: ReleaseRequest,
    },
}

impl PlanInputs {
    fn from_build_config(
        build_config: &BuildConfig,
        config: &Config,
        mode: &RunMode,
    ) -> std::result::Result<Self, ConfigError> {
        match mode {
            RunMode::PrOrPush => {
                let modules = build_config.modules(config);
                if modules.is_empty() {
                    return Err(ConfigError::NoModules);
                }
                Ok(Self::PrOrPush { modules })
            }
            RunMode::Release {
                version,
                is_snapshot,
                is_staging,
            } => {
                let version = version
                    .clone()
                    .unwrap_or_else(|| build_config.components_version.clone());
                validate_version(&version)?;
                let artifacts = build_config.artifacts(&config.project, &version);
                if !artifacts.iter().any(|a| a.should_publish) {
                    return Err(ConfigError::NoPublishableArtifacts);
                }
                Ok(Self::Release {
                    artifacts,
                    request: ReleaseRequest::new(version, *is_snapshot, *is_staging),
                })
            }
        }
    }
}

/// Run the decision task
#[instrument(skip_all, fields(command = mode.command(), dry_run = run.dry_run))]
pub async fn run_decision(run: DecisionRun<'_>, mode: &RunMode) -> Result<RunOutcome> {
    let cx = run.cx;
    let config = cx.config;

    if !mode.is_release() && cx.run.skip_requested() {
        info!(title = %cx.run.pull_request_title, "pull request asks to skip every task");
        return Ok(RunOutcome::Skipped);
    }

    let build_config = BuildConfig::load(&run.repo_root.join(&config.build_config))?;
    let inputs = PlanInputs::from_build_config(&build_config, config, mode)?;

    let cache = DockerImageCache::new(run.index, cx);
    let images = cache
        .resolve_all(&run.repo_root.join(&config.docker.folder), mode.is_release())
        .await?;

    let (graph, bucket) = match &inputs {
        PlanInputs::PrOrPush { modules } => (plan_pr_or_push(cx, modules, &images)?, None),
        PlanInputs::Release { artifacts, request } => (
            plan_release(cx, artifacts, request, &images)?,
            Some(Bucket::select(request.is_snapshot, request.is_staging)),
        ),
    };

    let submitter = GraphSubmitter::new(run.queue, cx).with_reporters(run.reporters);
    let planned = PlannedRun {
        definitions: submitter.render(&graph),
        graph,
        reused_images: images.reused.len(),
        bucket,
    };

    if run.dry_run {
        info!(tasks = planned.graph.len(), "dry run, nothing submitted");
        return Ok(RunOutcome::DryRun(planned));
    }

    let full_graph = submitter.submit(&planned.graph).await?;
    let artifacts = write_chain_of_trust(&config.artifacts_dir, &full_graph)?;

    Ok(RunOutcome::Submitted {
        planned,
        full_graph,
        artifacts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskclusterError;
    use crate::submit::tests::FakeQueue;
    use async_trait::async_trait;
    use decision_core::RunContext;
    use decision_tasks::{IndexedTask, LookupError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Index without any cached image
    #[derive(Default)]
    struct EmptyIndex {
        lookups: AtomicU32,
    }

    #[async_trait]
    impl TaskIndex for EmptyIndex {
        async fn find_task(&self, _namespace: &str) -> std::result::Result<Option<TaskId>, LookupError> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(None)
        }

        async fn get_task(&self, task_id: &TaskId) -> std::result::Result<IndexedTask, LookupError> {
            Err(LookupError::NotFound(task_id.to_string()))
        }
    }

    const BUILD_CONFIG: &str = r#"
componentsVersion: 1.0.0
projects:
  feature-a:
    path: components/feature/a
    publish: true
  feature-b:
    path: components/feature/b
    publish: false
"#;

    struct Fixture {
        repo: TempDir,
        config: Config,
    }

    fn fixture() -> Fixture {
        let repo = TempDir::new().unwrap();
        std::fs::write(repo.path().join(".buildconfig.yml"), BUILD_CONFIG).unwrap();
        let build = repo.path().join("automation/docker/build");
        std::fs::create_dir_all(&build).unwrap();
        std::fs::write(build.join("Dockerfile"), "FROM ubuntu:18.04").unwrap();

        let mut config = Config::default();
        config.artifacts_dir = repo.path().join("artifacts");
        Fixture { repo, config }
    }

    fn context() -> RunContext {
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

    fn release(version: Option<&str>) -> RunMode {
        RunMode::Release {
            version: version.map(str::to_string),
            is_snapshot: false,
            is_staging: false,
        }
    }

    #[tokio::test]
    async fn test_skip_marker_submits_nothing() {
        let fixture = fixture();
        let run = context().with_pull_request_title("Update docs [ci skip]");
        let cx = CraftContext::new(&run, &fixture.config);
        let (index, queue) = (EmptyIndex::default(), FakeQueue::default());

        let outcome = run_decision(
            DecisionRun::new(cx, fixture.repo.path(), &index, &queue),
            &RunMode::PrOrPush,
        )
        .await
        .unwrap();

        assert!(matches!(outcome, RunOutcome::Skipped));
        assert_eq!(outcome.task_count(), 0);
        assert!(outcome.summary("pr-or-push").skipped);
        assert!(queue.created.lock().unwrap().is_empty());
        assert_eq!(index.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_final_production_release() {
        let fixture = fixture();
        let run = context();
        let cx = CraftContext::new(&run, &fixture.config);
        let (index, queue) = (EmptyIndex::default(), FakeQueue::default());

        let outcome = run_decision(
            DecisionRun::new(cx, fixture.repo.path(), &index, &queue),
            &release(None),
        )
        .await
        .unwrap();

        let RunOutcome::Submitted {
            planned,
            full_graph,
            artifacts,
        } = &outcome
        else {
            panic!("expected a submitted run, got {:?}", outcome);
        };
        assert_eq!(planned.bucket, Some(Bucket::MavenProduction));

        // image, one build, barrier, one publish
        let created = queue.created.lock().unwrap();
        assert_eq!(created.len(), 4);
        assert_eq!(full_graph.len(), 4);

        let groups = planned.graph.groups();
        let (build_id, build) = &groups[1].tasks[0];
        assert!(build.name.contains(":feature-a"));
        let barrier = &created[2].1;
        assert_eq!(barrier.dependencies, vec!["decision".to_string(), build_id.to_string()]);

        let publish = &created[3].1;
        assert!(publish
            .scopes
            .iter()
            .any(|s| s.ends_with("beetmover:bucket:maven-production")));
        assert_eq!(publish.payload["version"], "1.0.0");
        assert_eq!(publish.worker_type, "mobile-beetmover-v1");

        assert_eq!(artifacts.len(), 3);
        assert!(fixture.config.artifacts_dir.join("task-graph.json").exists());
        assert_eq!(outcome.summary("release").bucket.as_deref(), Some("maven-production"));
    }

    #[tokio::test]
    async fn test_dry_run_submits_nothing() {
        let fixture = fixture();
        let run = context();
        let cx = CraftContext::new(&run, &fixture.config);
        let (index, queue) = (EmptyIndex::default(), FakeQueue::default());

        let outcome = run_decision(
            DecisionRun::new(cx, fixture.repo.path(), &index, &queue).dry_run(true),
            &RunMode::PrOrPush,
        )
        .await
        .unwrap();

        let planned = outcome.planned().unwrap();
        // image, two module tasks, three quality tasks
        assert_eq!(planned.graph.len(), 6);
        assert_eq!(planned.definitions.len(), 6);
        assert!(queue.created.lock().unwrap().is_empty());
        assert!(!fixture.config.artifacts_dir.exists());
    }

    #[tokio::test]
    async fn test_blank_release_version() {
        let fixture = fixture();
        let run = context();
        let cx = CraftContext::new(&run, &fixture.config);
        let (index, queue) = (EmptyIndex::default(), FakeQueue::default());

        let err = run_decision(
            DecisionRun::new(cx, fixture.repo.path(), &index, &queue),
            &release(Some("  ")),
        )
        .await
        .unwrap_err();
        assert!(err.is_configuration());
        assert!(queue.created.lock().unwrap().is_empty());
        assert_eq!(index.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_two_part_release_version() {
        let fixture = fixture();
        let run = context();
        let cx = CraftContext::new(&run, &fixture.config);
        let (index, queue) = (EmptyIndex::default(), FakeQueue::default());

        let outcome = run_decision(
            DecisionRun::new(cx, fixture.repo.path(), &index, &queue).dry_run(true),
            &release(Some("0.52")),
        )
        .await
        .unwrap();

        let planned = outcome.planned().unwrap();
        let (_, publish) = planned.definitions.last().unwrap();
        assert_eq!(publish.payload["version"], "0.52");
    }

    #[tokio::test]
    async fn test_nothing_publishable_fails_before_lookups() {
        let fixture = fixture();
        std::fs::write(
            fixture.repo.path().join(".buildconfig.yml"),
            "componentsVersion: 1.0.0\nprojects:\n  feature-b:\n    path: components/feature/b\n    publish: false\n",
        )
        .unwrap();
        let run = context();
        let cx = CraftContext::new(&run, &fixture.config);
        let (index, queue) = (EmptyIndex::default(), FakeQueue::default());

        let err = run_decision(
            DecisionRun::new(cx, fixture.repo.path(), &index, &queue),
            &release(None),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            TaskclusterError::Config(ConfigError::NoPublishableArtifacts)
        ));
        assert_eq!(index.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_modules_fails_before_lookups() {
        let fixture = fixture();
        std::fs::write(
            fixture.repo.path().join(".buildconfig.yml"),
            "componentsVersion: 1.0.0\nprojects: {}\n",
        )
        .unwrap();
        let run = context();
        let cx = CraftContext::new(&run, &fixture.config);
        let (index, queue) = (EmptyIndex::default(), FakeQueue::default());

        let err = run_decision(
            DecisionRun::new(cx, fixture.repo.path(), &index, &queue),
            &RunMode::PrOrPush,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TaskclusterError::Config(ConfigError::NoModules)));
        assert_eq!(index.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_build_config() {
        let fixture = fixture();
        std::fs::remove_file(fixture.repo.path().join(".buildconfig.yml")).unwrap();
        let run = context();
        let cx = CraftContext::new(&run, &fixture.config);
        let (index, queue) = (EmptyIndex::default(), FakeQueue::default());

        let err = run_decision(
            DecisionRun::new(cx, fixture.repo.path(), &index, &queue),
            &RunMode::PrOrPush,
        )
        .await
        .unwrap_err();
        assert!(err.is_configuration());
    }
}
