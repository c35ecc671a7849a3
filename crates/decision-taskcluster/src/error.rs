//! Taskcluster error types

use thiserror::Error;

use decision_core::ConfigError;
use decision_tasks::{LookupError, PlanError, TaskId};

/// Result type alias using TaskclusterError
pub type Result<T> = std::result::Result<T, TaskclusterError>;

/// Taskcluster-related errors
#[derive(Debug, Error)]
pub enum TaskclusterError {
    /// API error from the index or queue
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// The queue refused a task; later tasks were not submitted
    #[error("Submission of task {task_id} ({name}) failed: {message}")]
    SubmissionFailed {
        task_id: TaskId,
        name: String,
        message: String,
    },

    /// A response misses a field or carries an unexpected value
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid proxy or endpoint URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TaskclusterError {
    /// Whether the error stems from configuration or module descriptions
    pub fn is_configuration(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Plan(plan) => plan.is_configuration(),
            _ => false,
        }
    }

    /// HTTP status of an API error
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ApiError { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<TaskclusterError> for LookupError {
    fn from(error: TaskclusterError) -> Self {
        match error {
            TaskclusterError::ApiError { status: 404, message } => LookupError::NotFound(message),
            TaskclusterError::ApiError { status, message } => {
                LookupError::Service { status, message }
            }
            TaskclusterError::Http(e) => match e.status() {
                Some(status) => LookupError::Service {
                    status: status.as_u16(),
                    message: e.to_string(),
                },
                None => LookupError::Transport(e.to_string()),
            },
            other => LookupError::InvalidResponse(other.to_string()),
        }
    }
}
