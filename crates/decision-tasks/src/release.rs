//! Release pipeline: build, optional sign, publish

use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use decision_core::{ArtifactInfo, ConfigError};

use crate::craft::{
    craft_barrier_task, craft_beetmover_task, craft_build_task, craft_quality_tasks,
    craft_sign_task, CraftContext, GradleTask, PublishInputs,
};
use crate::task::{TaskDescriptor, TaskId};

/// What to release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRequest {
    pub version: String,
    pub is_snapshot: bool,
    pub is_staging: bool,
}

impl ReleaseRequest {
    pub fn new(version: impl Into<String>, is_snapshot: bool, is_staging: bool) -> Self {
        Self {
            version: version.into(),
            is_snapshot,
            is_staging,
        }
    }

    /// Version as published, `-SNAPSHOT` suffixed for snapshots
    pub fn published_version(&self) -> String {
        if self.is_snapshot {
            format!("{}-SNAPSHOT", self.version)
        } else {
            self.version.clone()
        }
    }
}

/// Maven bucket receiving release artifacts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    MavenSnapshotStaging,
    MavenSnapshotProduction,
    MavenStaging,
    MavenProduction,
}

impl Bucket {
    /// Bucket of a release
    pub fn select(is_snapshot: bool, is_staging: bool) -> Self {
        match (is_snapshot, is_staging) {
            (true, true) => Self::MavenSnapshotStaging,
            (true, false) => Self::MavenSnapshotProduction,
            (false, true) => Self::MavenStaging,
            (false, false) => Self::MavenProduction,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::MavenSnapshotStaging => "maven-snapshot-staging",
            Self::MavenSnapshotProduction => "maven-snapshot-production",
            Self::MavenStaging => "maven-staging",
            Self::MavenProduction => "maven-production",
        }
    }

    pub fn public_url(self) -> &'static str {
        match self {
            Self::MavenSnapshotStaging => "https://maven-snapshots.stage.mozaws.net/",
            Self::MavenSnapshotProduction => "https://snapshots.maven.mozilla.org/",
            Self::MavenStaging => "https://maven-default.stage.mozaws.net/",
            Self::MavenProduction => "https://maven.mozilla.org/",
        }
    }
}

/// Tasks releasing one artifact
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseChain {
    pub artifact: ArtifactInfo,
    pub build: TaskDescriptor,
    pub sign: Option<TaskDescriptor>,
    pub publish: TaskDescriptor,
}

/// Every task of a release
#[derive(Debug, Clone, PartialEq)]
pub struct ReleasePlan {
    pub request: ReleaseRequest,
    pub chains: Vec<ReleaseChain>,
    /// Waits on every build before anything is published
    pub barrier: TaskDescriptor,
    /// Quality tasks, scheduled for snapshots only
    pub quality: Vec<TaskDescriptor>,
}

impl ReleasePlan {
    pub fn bucket(&self) -> Bucket {
        Bucket::select(self.request.is_snapshot, self.request.is_staging)
    }
}

/// Gradle targets of a release build
fn release_targets(artifact: &ArtifactInfo, is_snapshot: bool) -> String {
    let suffix = if is_snapshot { "" } else { "Release" };
    let module = artifact.gradle_name();
    let mut targets: Vec<String> = ["assemble", "test", "lint"]
        .iter()
        .map(|task| format!("{}:{}{}", module, task, suffix))
        .collect();
    targets.push("uploadArchives".to_string());
    targets.push("zipMavenArtifacts".to_string());
    targets.join(" ")
}

/// Plans the release of a set of artifacts
#[derive(Debug, Clone, Copy)]
pub struct ReleasePipelineBuilder<'a> {
    cx: CraftContext<'a>,
}

impl<'a> ReleasePipelineBuilder<'a> {
    pub fn new(cx: CraftContext<'a>) -> Self {
        Self { cx }
    }

    /// Plan the release of every publishable artifact
    #[instrument(skip_all, fields(version = %request.version, snapshot = request.is_snapshot, staging = request.is_staging))]
    pub fn plan(
        &self,
        artifacts: &[ArtifactInfo],
        request: &ReleaseRequest,
        image_task_id: &TaskId,
    ) -> Result<ReleasePlan, ConfigError> {
        let publishable: Vec<&ArtifactInfo> =
            artifacts.iter().filter(|a| a.should_publish).collect();
        if publishable.is_empty() {
            return Err(ConfigError::NoPublishableArtifacts);
        }

        let sign_artifacts = self.cx.config.release.sign_artifacts;
        let barrier_id = TaskId::generate();
        let subtitle = format!(
            "({}{})",
            request.version,
            if request.is_snapshot { "-SNAPSHOT" } else { "" }
        );

        let mut chains = Vec::with_capacity(publishable.len());
        for artifact in publishable {
            let build_id = TaskId::generate();
            let gradle = GradleTask::new(
                artifact.gradle_name(),
                release_targets(artifact, request.is_snapshot),
                subtitle.clone(),
            )
            .with_snapshot(request.is_snapshot)
            .with_artifact(artifact.artifact.clone(), artifact.path.clone());
            let build = craft_build_task(self.cx, &gradle, image_task_id).with_id(build_id.clone());

            let sign = sign_artifacts.then(|| {
                craft_sign_task(self.cx, artifact, request.is_staging, &build_id, &barrier_id)
                    .with_id(TaskId::generate())
            });

            let publish = craft_beetmover_task(
                self.cx,
                artifact,
                request,
                PublishInputs {
                    build: &build_id,
                    barrier: &barrier_id,
                    sign: sign.as_ref().and_then(|s| s.id()),
                },
            );

            chains.push(ReleaseChain {
                artifact: artifact.clone(),
                build,
                sign,
                publish,
            });
        }

        let barrier = craft_barrier_task(
            self.cx,
            chains.iter().filter_map(|c| c.build.id().cloned()),
        )
        .with_id(barrier_id);

        let quality = if request.is_snapshot {
            craft_quality_tasks(self.cx, image_task_id)
        } else {
            Vec::new()
        };

        info!(
            chains = chains.len(),
            bucket = Bucket::select(request.is_snapshot, request.is_staging).name(),
            signing = sign_artifacts,
            "release planned"
        );

        Ok(ReleasePlan {
            request: request.clone(),
            chains,
            barrier,
            quality,
        })
    }
}
