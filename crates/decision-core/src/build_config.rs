//! Module discovery from the gradle build config
//!
//! The build config is a YAML file maintained next to the gradle build:
//!
//! ```yaml
//! componentsVersion: 0.52.0
//! projects:
//!   browser-awesomebar:
//!     path: components/browser/awesomebar
//!     description: 'A customizable awesome bar for browsers.'
//!     publish: true
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, ProjectConfig};
use crate::error::ConfigError;
use crate::types::{ArtifactInfo, Module};

/// One gradle project of the build config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntry {
    /// Folder of the project, relative to the repository root
    pub path: String,
    /// Human description
    #[serde(default)]
    pub description: Option<String>,
    /// Whether releases publish the project
    #[serde(default)]
    pub publish: bool,
}

/// Parsed build config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Version released when no explicit version is given
    pub components_version: String,
    /// Projects keyed by module name
    #[serde(default)]
    pub projects: BTreeMap<String, ProjectEntry>,
}

impl BuildConfig {
    /// Load the build config from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::BuildConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let build_config = Self::parse(&content)?;
        info!(
            path = %path.display(),
            projects = build_config.projects.len(),
            version = %build_config.components_version,
            "build config loaded"
        );
        Ok(build_config)
    }

    /// Parse build config content
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Modules of every project, with the policy the configuration assigns them
    pub fn modules(&self, config: &Config) -> Vec<Module> {
        self.projects
            .iter()
            .map(|(name, entry)| {
                let policy = config.policy_for(name);
                debug!(module = %name, policy = policy.kind(), "module discovered");
                Module {
                    name: name.clone(),
                    policy,
                }
            })
            .collect()
    }

    /// Artifact description of every project for a given version
    pub fn artifacts(&self, project: &ProjectConfig, version: &str) -> Vec<ArtifactInfo> {
        let group_path = project.maven_group.replace('.', "/");
        self.projects
            .iter()
            .map(|(name, entry)| ArtifactInfo {
                name: name.clone(),
                artifact: format!("public/build/{}.maven.zip", name),
                path: format!("{}/build/target.maven.zip", entry.path.trim_end_matches('/')),
                maven_destination: format!("maven2/{}/{}/{}/", group_path, name, version),
                should_publish: entry.publish,
            })
            .collect()
    }
}

/// Check that a release version can be substituted into artifact names.
///
/// Versions are opaque: `0.52`, `1.0.0-beta.1` and `0.52.0` are all valid.
pub fn validate_version(version: &str) -> Result<(), ConfigError> {
    if version.trim().is_empty() {
        return Err(ConfigError::InvalidVersion {
            version: version.to_string(),
            reason: "version cannot be empty".to_string(),
        });
    }
    Ok(())
}
