//! Configuration validation

use tracing::debug;

use crate::error::ConfigError;
use crate::types::ModulePolicy;

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    debug!("validating configuration");
    validate_project(config)?;
    validate_docker(config)?;
    validate_modules(config)?;
    validate_retry(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_project(config: &Config) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::invalid("project.name", "name cannot be empty"));
    }

    if config.project.index_namespace.starts_with("index.") {
        return Err(ConfigError::invalid(
            "project.index_namespace",
            "must not start with the 'index.' route prefix",
        ));
    }

    Ok(())
}

fn validate_docker(config: &Config) -> Result<(), ConfigError> {
    if config.docker.build_image.is_empty() {
        return Err(ConfigError::invalid(
            "docker.build_image",
            "build image name cannot be empty",
        ));
    }

    if config.docker.staleness_days <= 0 {
        return Err(ConfigError::invalid(
            "docker.staleness_days",
            "must be a positive number of days",
        ));
    }

    Ok(())
}

fn validate_modules(config: &Config) -> Result<(), ConfigError> {
    for (name, policy) in &config.modules {
        match policy {
            ModulePolicy::Default => {}
            ModulePolicy::SplitVariants {
                assemble_only,
                assemble_and_test,
                lint_task,
            } => {
                if assemble_only.is_empty() && assemble_and_test.is_empty() {
                    return Err(ConfigError::invalid(
                        format!("modules.{}", name),
                        "split-variants needs at least one variant",
                    ));
                }
                if lint_task.is_empty() {
                    return Err(ConfigError::invalid(
                        format!("modules.{}.lint_task", name),
                        "lint task cannot be empty",
                    ));
                }
            }
            ModulePolicy::CustomLint { lint_task } => {
                if lint_task.is_empty() {
                    return Err(ConfigError::invalid(
                        format!("modules.{}.lint_task", name),
                        "lint task cannot be empty",
                    ));
                }
            }
        }
    }

    Ok(())
}

fn validate_retry(config: &Config) -> Result<(), ConfigError> {
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::invalid(
            "retry.max_attempts",
            "must allow at least one attempt",
        ));
    }

    if config.retry.multiplier == 0 {
        return Err(ConfigError::invalid(
            "retry.multiplier",
            "must be at least 1",
        ));
    }

    Ok(())
}
