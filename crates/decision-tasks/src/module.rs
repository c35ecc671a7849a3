//! Per-module build tasks

use tracing::{debug, instrument};

use decision_core::{Module, ModulePolicy, DEFAULT_LINT_TASK};

use crate::craft::{craft_build_task, CraftContext, GradleTask};
use crate::task::{TaskDescriptor, TaskId};

/// Crafts the build, test and lint tasks of a module
#[derive(Debug, Clone, Copy)]
pub struct ModuleTaskPlanner<'a> {
    cx: CraftContext<'a>,
}

impl<'a> ModuleTaskPlanner<'a> {
    pub fn new(cx: CraftContext<'a>) -> Self {
        Self { cx }
    }

    /// Tasks of `module`, running in the image built by `image_task_id`
    #[instrument(skip_all, fields(module = %module.name, policy = module.policy.kind()))]
    pub fn plan(&self, module: &Module, image_task_id: &TaskId) -> Vec<TaskDescriptor> {
        let tasks: Vec<GradleTask> = match &module.policy {
            ModulePolicy::Default => vec![single_task(
                module,
                DEFAULT_LINT_TASK,
                "assembleAndTestAndLintReleaseAll",
            )],
            ModulePolicy::CustomLint { lint_task } => vec![single_task(
                module,
                lint_task,
                "assembleAndTestAndCustomLintAll",
            )],
            ModulePolicy::SplitVariants {
                assemble_only,
                assemble_and_test,
                lint_task,
            } => split_variants(module, assemble_only, assemble_and_test, lint_task),
        };

        debug!(tasks = tasks.len(), "module tasks crafted");
        tasks
            .into_iter()
            .map(|gradle| craft_build_task(self.cx, &gradle.with_coverage(), image_task_id))
            .collect()
    }
}

fn single_task(module: &Module, lint_task: &str, subtitle: &str) -> GradleTask {
    let targets = ["assemble", "test", lint_task]
        .iter()
        .map(|t| module.gradle_task(t))
        .collect::<Vec<_>>()
        .join(" ");
    GradleTask::new(module.gradle_name(), targets, subtitle)
}

/// One task per variant; lint rides along with the first eligible variant,
/// or runs on its own when no variant is eligible.
fn split_variants(
    module: &Module,
    assemble_only: &[String],
    assemble_and_test: &[String],
    lint_task: &str,
) -> Vec<GradleTask> {
    let mut lint_scheduled = false;
    let mut tasks = Vec::new();

    let variants = assemble_only
        .iter()
        .map(|v| (v, false))
        .chain(assemble_and_test.iter().map(|v| (v, true)));

    for (variant, run_tests) in variants {
        let mut targets = vec![module.gradle_task(&format!("assemble{}", variant))];
        let mut subtitle = "assemble".to_string();

        if run_tests {
            targets.push(module.gradle_task(&format!("test{}DebugUnitTest", variant)));
            subtitle.push_str("AndTest");
        }

        if !lint_scheduled && lint_task.contains(variant.as_str()) {
            targets.push(module.gradle_task(lint_task));
            subtitle.push_str("AndLintDebug");
            lint_scheduled = true;
        }

        subtitle.push_str(variant);
        tasks.push(GradleTask::new(
            module.gradle_name(),
            targets.join(" "),
            subtitle,
        ));
    }

    if !lint_scheduled {
        tasks.push(GradleTask::new(
            module.gradle_name(),
            module.gradle_task(lint_task),
            "onlyLintRelease",
        ));
    }

    tasks
}
