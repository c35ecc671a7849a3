//! Decision Tasks - Task graph planning
//!
//! This crate turns module and artifact descriptions into an ordered,
//! dependency-checked graph of Taskcluster task descriptors: docker image
//! caching, per-module build tasks, the release pipeline and graph assembly.

pub mod craft;
pub mod decision;
pub mod docker;
pub mod error;
pub mod graph;
pub mod module;
pub mod release;
pub mod reporter;
pub mod retry;
pub mod summary;
pub mod task;

pub use craft::{CraftContext, GradleTask};
pub use decision::{plan_pr_or_push, plan_release};
pub use docker::{
    dirhash, DockerImageCache, DockerImageRecord, ImageOutcome, IndexedTask, LookupError,
    ResolvedImage, ResolvedImages, TaskIndex,
};
pub use error::PlanError;
pub use graph::{AssembledGroup, GraphError, TaskGraph, TaskGraphAssembler, TaskGroup};
pub use module::ModuleTaskPlanner;
pub use release::{Bucket, ReleaseChain, ReleasePipelineBuilder, ReleasePlan, ReleaseRequest};
pub use reporter::{
    CollectingReporter, SubmissionEvent, TaskReporter, TaskReporterRegistry, TracingReporter,
};
pub use retry::{Retryable, RetryPolicy};
pub use summary::{render_markdown, render_text, PlanSummary};
pub use task::{
    ArtifactKind, DockerPayload, TaskArtifact, TaskDescriptor, TaskId, TaskImage, TaskPayload,
    WorkerKind,
};
