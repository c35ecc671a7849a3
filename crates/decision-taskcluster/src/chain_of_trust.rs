//! Chain-of-trust artifacts of the decision task
//!
//! Scriptworkers verify a release by replaying the decision task's graph, so
//! the decision task publishes the full graph plus the (unused but required)
//! actions and parameters files.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::Result;
use crate::submit::FullTaskGraph;

pub const TASK_GRAPH_FILE: &str = "task-graph.json";
pub const ACTIONS_FILE: &str = "actions.json";
pub const PARAMETERS_FILE: &str = "parameters.yml";

/// Write the chain-of-trust files into `artifacts_dir`
pub fn write_chain_of_trust(artifacts_dir: &Path, full_graph: &FullTaskGraph) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(artifacts_dir)?;

    let task_graph = artifacts_dir.join(TASK_GRAPH_FILE);
    std::fs::write(&task_graph, serde_json::to_string_pretty(full_graph)?)?;

    let actions = artifacts_dir.join(ACTIONS_FILE);
    std::fs::write(&actions, "{}")?;

    let parameters = artifacts_dir.join(PARAMETERS_FILE);
    std::fs::write(&parameters, "{}")?;

    info!(
        dir = %artifacts_dir.display(),
        tasks = full_graph.len(),
        "chain of trust artifacts written"
    );
    Ok(vec![task_graph, actions, parameters])
}
