//! Exit codes for the CLI

use decision_core::ConfigError;
use decision_taskcluster::TaskclusterError;
use decision_tasks::PlanError;

/// Success
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error
pub const ERROR: i32 = 1;

/// Configuration error, nothing was submitted
pub const CONFIG_ERROR: i32 = 2;

/// The index could not be queried
pub const LOOKUP_ERROR: i32 = 3;

/// The queue refused a task; earlier tasks stay submitted
pub const SUBMISSION_ERROR: i32 = 4;

/// Exit code of a failed command
pub fn for_error(error: &anyhow::Error) -> i32 {
    if error.downcast_ref::<ConfigError>().is_some() {
        return CONFIG_ERROR;
    }
    if let Some(plan) = error.downcast_ref::<PlanError>() {
        return for_plan_error(plan);
    }
    match error.downcast_ref::<TaskclusterError>() {
        Some(e) if e.is_configuration() => CONFIG_ERROR,
        Some(TaskclusterError::Plan(plan)) => for_plan_error(plan),
        Some(TaskclusterError::SubmissionFailed { .. }) => SUBMISSION_ERROR,
        _ => ERROR,
    }
}

fn for_plan_error(error: &PlanError) -> i32 {
    match error {
        PlanError::Config(_) => CONFIG_ERROR,
        PlanError::Lookup(_) => LOOKUP_ERROR,
        _ => ERROR,
    }
}
