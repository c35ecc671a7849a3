//! Decision Taskcluster - Execution service integration
//!
//! Talks to the Taskcluster index and queue through the worker proxy:
//! - Looks up cached docker images
//! - Renders task descriptors to queue task definitions
//! - Submits the task graph in order and records the chain of trust

pub mod chain_of_trust;
pub mod client;
pub mod definition;
pub mod error;
pub mod run;
pub mod submit;

pub use chain_of_trust::write_chain_of_trust;
pub use client::{TaskclusterClient, DEFAULT_PROXY_URL};
pub use definition::{format_timestamp, TaskDefinition, TaskMetadata};
pub use error::{Result, TaskclusterError};
pub use run::{run_decision, DecisionRun, PlannedRun, RunMode, RunOutcome};
pub use submit::{FullTaskGraph, GraphSubmitter, TaskQueue};
