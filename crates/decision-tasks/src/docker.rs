//! Docker build-environment image cache
//!
//! Each sub-folder of the docker folder is one image build context. An image
//! is looked up in the index by the hash of its context: a hit is reused, a
//! miss (or a stale hit outside of releases) gets a fresh image-build task.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use decision_core::ConfigError;

use crate::craft::{craft_docker_image_task, docker_image_route, CraftContext};
use crate::error::PlanError;
use crate::retry::{RetryPolicy, Retryable};
use crate::task::{TaskDescriptor, TaskId};

/// A task as known by the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedTask {
    pub task_id: TaskId,
    pub created: DateTime<Utc>,
}

/// Failure to look something up in the execution service
#[derive(Debug, Error)]
pub enum LookupError {
    /// The service does not know the task
    #[error("Task {0} not found")]
    NotFound(String),

    /// The service answered with an error status
    #[error("Service returned {status}: {message}")]
    Service { status: u16, message: String },

    /// The request never got an answer
    #[error("Transport error: {0}")]
    Transport(String),

    /// The answer could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl Retryable for LookupError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Service { status, .. } => *status >= 500 || *status == 429,
            Self::Transport(_) => true,
            Self::NotFound(_) | Self::InvalidResponse(_) => false,
        }
    }
}

/// Read access to the index and queue
#[async_trait]
pub trait TaskIndex: Send + Sync {
    /// Task indexed under `namespace`, `None` when nothing is indexed there
    async fn find_task(&self, namespace: &str) -> Result<Option<TaskId>, LookupError>;

    /// Definition summary of an existing task
    async fn get_task(&self, task_id: &TaskId) -> Result<IndexedTask, LookupError>;
}

/// What is known about one image build context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerImageRecord {
    pub folder_name: String,
    pub content_hash: String,
    pub existing_task_id: Option<TaskId>,
    pub created_at: Option<DateTime<Utc>>,
}

/// How an image gets to the build tasks
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    /// An earlier run built it
    Reused(TaskId),
    /// This run builds it
    Crafted(TaskDescriptor),
}

/// An image build context and its outcome
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedImage {
    pub record: DockerImageRecord,
    pub outcome: ImageOutcome,
}

impl ResolvedImage {
    /// Id of the task providing the image
    pub fn task_id(&self) -> Option<TaskId> {
        match &self.outcome {
            ImageOutcome::Reused(id) => Some(id.clone()),
            ImageOutcome::Crafted(task) => task.id().cloned(),
        }
    }

    pub fn is_reused(&self) -> bool {
        matches!(self.outcome, ImageOutcome::Reused(_))
    }
}

/// Every image of a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedImages {
    /// Image-build tasks to submit
    pub crafted: Vec<TaskDescriptor>,
    /// Ids of images built by earlier runs
    pub reused: Vec<TaskId>,
    /// Task providing the image build tasks run in
    pub build_image: Option<TaskId>,
    pub records: Vec<DockerImageRecord>,
}

impl ResolvedImages {
    /// Images of a run reusing a single, already built, build image
    pub fn reusing(build_image: TaskId) -> Self {
        Self {
            crafted: Vec::new(),
            reused: vec![build_image.clone()],
            build_image: Some(build_image),
            records: Vec::new(),
        }
    }

    /// The build image id, required by every build task
    pub fn build_image_id(&self, name: &str) -> Result<&TaskId, ConfigError> {
        self.build_image
            .as_ref()
            .ok_or_else(|| ConfigError::MissingDockerImage(name.to_string()))
    }
}

/// Checksum of a folder: sha256 of the sorted sha256 digests of its files.
/// Symlinks are followed and hashed by their target's content.
pub fn dirhash(folder: &Path) -> std::io::Result<String> {
    let mut digests = Vec::new();
    for entry in WalkDir::new(folder).follow_links(true) {
        let entry = entry.map_err(std::io::Error::other)?;
        if entry.file_type().is_file() {
            let content = std::fs::read(entry.path())?;
            digests.push(format!("{:x}", Sha256::digest(&content)));
        }
    }
    digests.sort();

    let mut hasher = Sha256::new();
    for digest in &digests {
        hasher.update(digest.as_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// Resolves build contexts to reused or freshly crafted image tasks
pub struct DockerImageCache<'a> {
    index: &'a dyn TaskIndex,
    cx: CraftContext<'a>,
    retry: RetryPolicy,
    now: DateTime<Utc>,
}

impl<'a> DockerImageCache<'a> {
    pub fn new(index: &'a dyn TaskIndex, cx: CraftContext<'a>) -> Self {
        Self {
            index,
            cx,
            retry: RetryPolicy::from_config(&cx.config.retry),
            now: Utc::now(),
        }
    }

    /// Override the clock image ages are measured against
    pub fn with_clock(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    fn craft(&self, record: DockerImageRecord) -> ResolvedImage {
        let task = craft_docker_image_task(self.cx, &record.folder_name, &record.content_hash)
            .with_id(TaskId::generate());
        ResolvedImage {
            record,
            outcome: ImageOutcome::Crafted(task),
        }
    }

    /// Decide how the image of one build context is provided
    pub async fn resolve(
        &self,
        folder_name: &str,
        content_hash: &str,
        is_release: bool,
    ) -> Result<ResolvedImage, LookupError> {
        let route = docker_image_route(self.cx, folder_name, content_hash);
        let namespace = route.strip_prefix("index.").unwrap_or(&route);

        let mut record = DockerImageRecord {
            folder_name: folder_name.to_string(),
            content_hash: content_hash.to_string(),
            existing_task_id: None,
            created_at: None,
        };

        let existing = self
            .retry
            .run("find_task", || self.index.find_task(namespace))
            .await?;

        let Some(task_id) = existing else {
            info!(image = folder_name, hash = content_hash, "no cached image, scheduling a build");
            return Ok(self.craft(record));
        };
        record.existing_task_id = Some(task_id.clone());

        // Releases never wait on an image rebuild
        if is_release {
            debug!(image = folder_name, task_id = %task_id, "reusing cached image for release");
            return Ok(ResolvedImage {
                record,
                outcome: ImageOutcome::Reused(task_id),
            });
        }

        let task = self
            .retry
            .run("get_task", || self.index.get_task(&task_id))
            .await?;
        record.created_at = Some(task.created);

        let age_days = (self.now - task.created).num_days();
        if age_days > self.cx.config.docker.staleness_days {
            info!(
                image = folder_name,
                task_id = %task_id,
                age_days,
                "cached image is too old, scheduling a new one"
            );
            return Ok(self.craft(record));
        }

        debug!(image = folder_name, task_id = %task_id, age_days, "reusing cached image");
        Ok(ResolvedImage {
            record,
            outcome: ImageOutcome::Reused(task_id),
        })
    }

    /// Resolve every build context under `docker_root`, in folder name order
    #[instrument(skip_all, fields(docker_root = %docker_root.display(), is_release))]
    pub async fn resolve_all(
        &self,
        docker_root: &Path,
        is_release: bool,
    ) -> Result<ResolvedImages, PlanError> {
        let build_image_name = &self.cx.config.docker.build_image;
        let mut images = ResolvedImages::default();

        let folders = WalkDir::new(docker_root)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in folders {
            let entry = entry.map_err(std::io::Error::other)?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let folder_name = entry.file_name().to_string_lossy().to_string();
            let hash = dirhash(entry.path())?;

            let resolved = self.resolve(&folder_name, &hash, is_release).await?;
            let task_id = resolved.task_id();
            if &folder_name == build_image_name {
                images.build_image = task_id;
            }
            images.records.push(resolved.record);
            match resolved.outcome {
                ImageOutcome::Reused(id) => images.reused.push(id),
                ImageOutcome::Crafted(task) => images.crafted.push(task),
            }
        }

        images.build_image_id(build_image_name)?;
        info!(
            crafted = images.crafted.len(),
            reused = images.reused.len(),
            "docker images resolved"
        );
        Ok(images)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::Duration;
    use decision_core::{Config, RunContext};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// In-memory index
    #[derive(Default)]
    pub(crate) struct FakeIndex {
        pub routes: Mutex<HashMap<String, TaskId>>,
        pub created: Mutex<HashMap<TaskId, DateTime<Utc>>>,
        pub transient_failures: AtomicU32,
        pub find_calls: AtomicU32,
    }

    impl FakeIndex {
        pub fn with_task(self, namespace: &str, id: &str, created: DateTime<Utc>) -> Self {
            let id = TaskId::from(id);
            self.routes
                .lock()
                .unwrap()
                .insert(namespace.to_string(), id.clone());
            self.created.lock().unwrap().insert(id, created);
            self
        }
    }

    #[async_trait]
    impl TaskIndex for FakeIndex {
        async fn find_task(&self, namespace: &str) -> Result<Option<TaskId>, LookupError> {
            self.find_calls.fetch_add(1, Ordering::SeqCst);
            if self.transient_failures.load(Ordering::SeqCst) > 0 {
                self.transient_failures.fetch_sub(1, Ordering::SeqCst);
                return Err(LookupError::Service {
                    status: 503,
                    message: "unavailable".to_string(),
                });
            }
            Ok(self.routes.lock().unwrap().get(namespace).cloned())
        }

        async fn get_task(&self, task_id: &TaskId) -> Result<IndexedTask, LookupError> {
            self.created
                .lock()
                .unwrap()
                .get(task_id)
                .map(|created| IndexedTask {
                    task_id: task_id.clone(),
                    created: *created,
                })
                .ok_or_else(|| LookupError::NotFound(task_id.to_string()))
        }
    }

    fn run() -> RunContext {
        RunContext::new("decision", "https://repo", "master", "abc", 1, "b", "m").unwrap()
    }

    const BUILD_NAMESPACE: &str =
        "project.mobile.android-components.cache.level-1.docker-images.v1.build.hash.h1";

    fn now() -> DateTime<Utc> {
        "2024-06-01T12:00:00Z".parse().unwrap()
    }

    #[tokio::test]
    async fn test_missing_image_is_crafted() {
        let (run, config) = (run(), Config::default());
        let index = FakeIndex::default();
        let cache = DockerImageCache::new(&index, CraftContext::new(&run, &config));

        let resolved = cache.resolve("build", "h1", false).await.unwrap();
        assert!(!resolved.is_reused());
        assert!(resolved.task_id().is_some());
        assert!(resolved.record.existing_task_id.is_none());
    }

    #[tokio::test]
    async fn test_fresh_image_is_reused() {
        let (run, config) = (run(), Config::default());
        let index = FakeIndex::default().with_task(BUILD_NAMESPACE, "img", now() - Duration::days(3));
        let cache =
            DockerImageCache::new(&index, CraftContext::new(&run, &config)).with_clock(now());

        let resolved = cache.resolve("build", "h1", false).await.unwrap();
        assert_eq!(resolved.outcome, ImageOutcome::Reused(TaskId::from("img")));
    }

    #[tokio::test]
    async fn test_stale_image_rebuilt_outside_releases() {
        let (run, config) = (run(), Config::default());
        let index =
            FakeIndex::default().with_task(BUILD_NAMESPACE, "img", now() - Duration::days(31));
        let cache =
            DockerImageCache::new(&index, CraftContext::new(&run, &config)).with_clock(now());

        let resolved = cache.resolve("build", "h1", false).await.unwrap();
        assert!(!resolved.is_reused());
        assert_eq!(resolved.record.existing_task_id, Some(TaskId::from("img")));

        let resolved = cache.resolve("build", "h1", true).await.unwrap();
        assert_eq!(resolved.outcome, ImageOutcome::Reused(TaskId::from("img")));
    }

    #[tokio::test]
    async fn test_thirty_days_is_not_stale() {
        let (run, config) = (run(), Config::default());
        let index = FakeIndex::default().with_task(
            BUILD_NAMESPACE,
            "img",
            now() - Duration::days(30) - Duration::hours(23),
        );
        let cache =
            DockerImageCache::new(&index, CraftContext::new(&run, &config)).with_clock(now());

        assert!(cache.resolve("build", "h1", false).await.unwrap().is_reused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failure_is_retried() {
        let (run, config) = (run(), Config::default());
        let index = FakeIndex::default().with_task(BUILD_NAMESPACE, "img", now());
        index.transient_failures.store(2, Ordering::SeqCst);
        let cache =
            DockerImageCache::new(&index, CraftContext::new(&run, &config)).with_clock(now());

        assert!(cache.resolve("build", "h1", false).await.unwrap().is_reused());
        assert_eq!(index.find_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_is_fatal() {
        let (run, config) = (run(), Config::default());
        let index = FakeIndex::default();
        index.transient_failures.store(10, Ordering::SeqCst);
        let cache = DockerImageCache::new(&index, CraftContext::new(&run, &config));

        let err = cache.resolve("build", "h1", false).await.unwrap_err();
        assert!(matches!(err, LookupError::Service { status: 503, .. }));
        assert_eq!(index.find_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_dirhash_is_order_independent() {
        let a = TempDir::new().unwrap();
        std::fs::write(a.path().join("Dockerfile"), "FROM ubuntu").unwrap();
        std::fs::create_dir(a.path().join("scripts")).unwrap();
        std::fs::write(a.path().join("scripts/setup.sh"), "echo hi").unwrap();

        let b = TempDir::new().unwrap();
        std::fs::create_dir(b.path().join("other")).unwrap();
        std::fs::write(b.path().join("other/x"), "echo hi").unwrap();
        std::fs::write(b.path().join("Dockerfile2"), "FROM ubuntu").unwrap();

        let hash = dirhash(a.path()).unwrap();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, dirhash(a.path()).unwrap());
        assert_eq!(hash, dirhash(b.path()).unwrap());

        std::fs::write(a.path().join("Dockerfile"), "FROM debian").unwrap();
        assert_ne!(hash, dirhash(a.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_dirhash_follows_symlinks() {
        let shared = TempDir::new().unwrap();
        std::fs::write(shared.path().join("setup.sh"), "echo hi").unwrap();

        let linked = TempDir::new().unwrap();
        std::fs::write(linked.path().join("Dockerfile"), "FROM ubuntu").unwrap();
        std::os::unix::fs::symlink(
            shared.path().join("setup.sh"),
            linked.path().join("setup.sh"),
        )
        .unwrap();

        let copied = TempDir::new().unwrap();
        std::fs::write(copied.path().join("Dockerfile"), "FROM ubuntu").unwrap();
        std::fs::write(copied.path().join("setup.sh"), "echo hi").unwrap();

        assert_eq!(dirhash(linked.path()).unwrap(), dirhash(copied.path()).unwrap());
    }

    #[tokio::test]
    async fn test_resolve_all_finds_build_image() {
        let (run, config) = (run(), Config::default());
        let docker = TempDir::new().unwrap();
        for image in ["build", "ui-tests"] {
            std::fs::create_dir(docker.path().join(image)).unwrap();
            std::fs::write(docker.path().join(image).join("Dockerfile"), image).unwrap();
        }
        std::fs::write(docker.path().join("README.md"), "not an image").unwrap();

        let index = FakeIndex::default();
        let cache = DockerImageCache::new(&index, CraftContext::new(&run, &config));
        let images = cache.resolve_all(docker.path(), false).await.unwrap();

        assert_eq!(images.crafted.len(), 2);
        assert_eq!(images.records[0].folder_name, "build");
        assert_eq!(images.records[1].folder_name, "ui-tests");
        assert_eq!(images.build_image, images.crafted[0].id().cloned());
    }

    #[tokio::test]
    async fn test_resolve_all_without_build_image() {
        let (run, config) = (run(), Config::default());
        let docker = TempDir::new().unwrap();
        std::fs::create_dir(docker.path().join("ui-tests")).unwrap();

        let index = FakeIndex::default();
        let cache = DockerImageCache::new(&index, CraftContext::new(&run, &config));
        let err = cache.resolve_all(docker.path(), false).await.unwrap_err();

        assert!(matches!(
            err,
            PlanError::Config(ConfigError::MissingDockerImage(name)) if name == "build"
        ));
    }
}
