//! Configuration types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::types::ModulePolicy;

/// Main configuration for the decision task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project identity and naming
    pub project: ProjectConfig,

    /// Path of the build config listing the modules, relative to the repository root
    pub build_config: PathBuf,

    /// Docker build-environment images
    pub docker: DockerConfig,

    /// Worker placement
    pub workers: WorkersConfig,

    /// Per-module task policies, keyed by module name
    pub modules: BTreeMap<String, ModulePolicy>,

    /// Repository-wide quality tasks (lint, style, locales)
    pub quality: Vec<QualityTaskConfig>,

    /// Release pipeline settings
    pub release: ReleaseConfig,

    /// Retry policy around execution-service lookups
    pub retry: RetryConfig,

    /// Directory receiving the chain-of-trust artifacts
    pub artifacts_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: ProjectConfig::default(),
            build_config: PathBuf::from(".buildconfig.yml"),
            docker: DockerConfig::default(),
            workers: WorkersConfig::default(),
            modules: default_module_policies(),
            quality: default_quality_tasks(),
            release: ReleaseConfig::default(),
            retry: RetryConfig::default(),
            artifacts_dir: PathBuf::from("/builds/worker/artifacts"),
        }
    }
}

impl Config {
    /// Policy configured for a module, falling back to the default policy
    pub fn policy_for(&self, module: &str) -> ModulePolicy {
        self.modules.get(module).cloned().unwrap_or_default()
    }
}

/// Project identity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Machine name, used in image env and index routes
    pub name: String,

    /// Human name prefixed to every task name
    pub display_name: String,

    /// Owner email recorded in task metadata
    pub owner: String,

    /// Index namespace the docker image routes live under
    pub index_namespace: String,

    /// Prefix of releng scopes (beetmover, signing)
    pub scope_prefix: String,

    /// Secret holding the coverage upload tokens
    pub coverage_secret: String,

    /// Maven group of published artifacts
    pub maven_group: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: "android-components".to_string(),
            display_name: "Android Components".to_string(),
            owner: "skaspari@mozilla.com".to_string(),
            index_namespace: "project.mobile.android-components".to_string(),
            scope_prefix: "project:mobile:android-components:releng".to_string(),
            coverage_secret: "project/mobile/android-components/public-tokens".to_string(),
            maven_group: "org.mozilla.components".to_string(),
        }
    }
}

/// Docker build-environment images
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerConfig {
    /// Folder holding one sub-folder per image build context
    pub folder: PathBuf,

    /// Image used by build tasks
    pub build_image: String,

    /// Age in days after which a cached image is rebuilt on non-release runs
    pub staleness_days: i64,

    /// Image building the docker images
    pub builder_image: String,

    /// Max run time of an image build, in seconds
    pub max_run_time: u32,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("automation/docker"),
            build_image: "build".to_string(),
            staleness_days: 30,
            builder_image: "taskcluster/image_builder:2.1.0".to_string(),
            max_run_time: 3600,
        }
    }
}

/// Worker placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    /// Provisioner of docker-worker tasks
    pub build_provisioner: String,

    /// Provisioner of scriptworker tasks (beetmover, signing)
    pub scriptworker_provisioner: String,

    /// Worker type building docker images, `{level}` is replaced by the trust level
    pub images: String,

    /// Worker type signing production releases
    pub signing: String,

    /// Worker type signing staging releases
    pub signing_staging: String,

    /// Max run time of build-ish tasks, in seconds
    pub max_run_time: u32,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            build_provisioner: "aws-provisioner-v1".to_string(),
            scriptworker_provisioner: "scriptworker-prov-v1".to_string(),
            images: "mobile-{level}-images".to_string(),
            signing: "mobile-signing-v1".to_string(),
            signing_staging: "mobile-signing-dep-v1".to_string(),
            max_run_time: 7200,
        }
    }
}

impl WorkersConfig {
    /// Worker type building docker images for a trust level
    pub fn images_worker_type(&self, trust_level: u8) -> String {
        self.images.replace("{level}", &trust_level.to_string())
    }
}

/// A repository-wide quality task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityTaskConfig {
    /// Short name, e.g. "detekt"
    pub name: String,

    /// Task description
    pub description: String,

    /// Shell command run after checkout
    pub command: String,
}

impl QualityTaskConfig {
    fn new(name: &str, description: &str, command: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            command: command.to_string(),
        }
    }
}

/// Quality tasks scheduled when the configuration does not list any
pub fn default_quality_tasks() -> Vec<QualityTaskConfig> {
    vec![
        QualityTaskConfig::new(
            "detekt",
            "Running detekt over all modules",
            "./gradlew --no-daemon clean detekt",
        ),
        QualityTaskConfig::new(
            "ktlint",
            "Running ktlint over all modules",
            "./gradlew --no-daemon clean ktlint",
        ),
        QualityTaskConfig::new(
            "compare-locales",
            "Validate strings.xml with compare-locales",
            "pip install \"compare-locales>=5.0.2,<6.0\" && compare-locales --validate l10n.toml .",
        ),
    ]
}

/// Modules whose tasks are not shaped by the default policy
pub fn default_module_policies() -> BTreeMap<String, ModulePolicy> {
    let variants = |names: &[&str]| -> Vec<String> { names.iter().map(|n| n.to_string()).collect() };
    let custom_lint = || ModulePolicy::CustomLint {
        lint_task: "lint".to_string(),
    };

    BTreeMap::from([
        (
            "samples-browser".to_string(),
            ModulePolicy::SplitVariants {
                assemble_only: variants(&["ServoArm", "ServoX86", "SystemUniversal"]),
                assemble_and_test: variants(&[
                    "GeckoBetaAarch64",
                    "GeckoBetaArm",
                    "GeckoBetaX86",
                    "GeckoNightlyAarch64",
                    "GeckoNightlyArm",
                    "GeckoNightlyX86",
                    "GeckoReleaseAarch64",
                    "GeckoReleaseArm",
                    "GeckoReleaseX86",
                ]),
                lint_task: "lintGeckoBetaArmDebug".to_string(),
            },
        ),
        ("support-test".to_string(), custom_lint()),
        ("tooling-lint".to_string(), custom_lint()),
    ])
}

/// Release pipeline settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReleaseConfig {
    /// Insert a signing task between each build and its publication
    pub sign_artifacts: bool,
}

/// Retry policy around execution-service lookups
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds
    pub initial_backoff_ms: u64,

    /// Factor applied to the delay after each retry
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            multiplier: 2,
        }
    }
}
