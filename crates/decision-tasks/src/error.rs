//! Planning errors

use thiserror::Error;

use decision_core::ConfigError;

use crate::docker::LookupError;
use crate::graph::GraphError;

/// Error produced while planning a task graph
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Index or queue lookup failed after retries
    #[error("Execution service lookup failed: {0}")]
    Lookup(#[from] LookupError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlanError {
    /// Whether the error comes from the configuration or module descriptions
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
