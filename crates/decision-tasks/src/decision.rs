//! The two decision flows: pull request or push, and release

use tracing::{info, instrument};

use decision_core::{ArtifactInfo, ConfigError, Module};

use crate::craft::{craft_quality_tasks, CraftContext};
use crate::docker::ResolvedImages;
use crate::error::PlanError;
use crate::graph::{TaskGraph, TaskGraphAssembler, TaskGroup};
use crate::module::ModuleTaskPlanner;
use crate::release::{ReleasePipelineBuilder, ReleaseRequest};

fn assembler(cx: CraftContext<'_>, images: &ResolvedImages) -> TaskGraphAssembler {
    TaskGraphAssembler::new()
        .with_existing(cx.decision_task_id())
        .with_existing_all(images.reused.iter().cloned())
}

/// Graph of a pull request or push: every module is built, tested and linted
#[instrument(skip_all, fields(modules = modules.len()))]
pub fn plan_pr_or_push(
    cx: CraftContext<'_>,
    modules: &[Module],
    images: &ResolvedImages,
) -> Result<TaskGraph, PlanError> {
    if cx.run.skip_requested() {
        info!("pull request title asks to skip every task");
        return Ok(TaskGraph::default());
    }
    if modules.is_empty() {
        return Err(ConfigError::NoModules.into());
    }

    let image = images.build_image_id(&cx.config.docker.build_image)?;
    let planner = ModuleTaskPlanner::new(cx);
    let build_tasks = modules
        .iter()
        .flat_map(|module| planner.plan(module, image))
        .collect();

    let graph = assembler(cx, images).assemble(vec![
        TaskGroup::new("docker-images", images.crafted.clone()),
        TaskGroup::new("build", build_tasks),
        TaskGroup::new("other", craft_quality_tasks(cx, image)),
    ])?;
    Ok(graph)
}

/// Graph of a release: build, sign if enabled, then publish every publishable artifact
#[instrument(skip_all, fields(artifacts = artifacts.len(), version = %request.version))]
pub fn plan_release(
    cx: CraftContext<'_>,
    artifacts: &[ArtifactInfo],
    request: &ReleaseRequest,
    images: &ResolvedImages,
) -> Result<TaskGraph, PlanError> {
    let image = images.build_image_id(&cx.config.docker.build_image)?;
    let plan = ReleasePipelineBuilder::new(cx).plan(artifacts, request, image)?;

    let mut builds = Vec::with_capacity(plan.chains.len());
    let mut signs = Vec::new();
    let mut publishes = Vec::with_capacity(plan.chains.len());
    for chain in plan.chains {
        builds.push(chain.build);
        signs.extend(chain.sign);
        publishes.push(chain.publish);
    }

    let mut groups = vec![
        TaskGroup::new("docker-images", images.crafted.clone()),
        TaskGroup::new("build", builds),
        TaskGroup::new("wait-on-builds", vec![plan.barrier]),
    ];
    if cx.config.release.sign_artifacts {
        groups.push(TaskGroup::new("signing", signs));
    }
    groups.push(TaskGroup::new("beetmover", publishes));
    groups.push(TaskGroup::new("other", plan.quality));

    Ok(assembler(cx, images).assemble(groups)?)
}
