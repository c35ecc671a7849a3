//! Decision Core - Core library for the Taskcluster decision task
//!
//! This crate provides the foundational types, error handling, configuration,
//! run context and build-config discovery used to plan a CI task graph.

pub mod build_config;
pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use build_config::{BuildConfig, ProjectEntry};
pub use config::Config;
pub use context::RunContext;
pub use error::ConfigError;
pub use types::{ArtifactInfo, Module, ModulePolicy, DEFAULT_LINT_TASK};
