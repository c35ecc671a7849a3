//! Default configuration values

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "decision.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "decision.yaml";

/// Directory also searched at each level
pub const CONFIG_SUBDIR: &str = ".taskcluster";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![DEFAULT_CONFIG_TOML, DEFAULT_CONFIG_YAML, "decision.yml"]
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# Decision task configuration

build_config = ".buildconfig.yml"
artifacts_dir = "/builds/worker/artifacts"

[project]
name = "android-components"
display_name = "Android Components"
owner = "skaspari@mozilla.com"
index_namespace = "project.mobile.android-components"
scope_prefix = "project:mobile:android-components:releng"
maven_group = "org.mozilla.components"

[docker]
folder = "automation/docker"
build_image = "build"
staleness_days = 30

[release]
sign_artifacts = false

[retry]
max_attempts = 3
initial_backoff_ms = 500
multiplier = 2

[modules.samples-browser]
policy = "split-variants"
assemble_only = ["ServoArm", "ServoX86", "SystemUniversal"]
assemble_and_test = [
    "GeckoBetaAarch64", "GeckoBetaArm", "GeckoBetaX86",
    "GeckoNightlyAarch64", "GeckoNightlyArm", "GeckoNightlyX86",
    "GeckoReleaseAarch64", "GeckoReleaseArm", "GeckoReleaseX86",
]
lint_task = "lintGeckoBetaArmDebug"

[modules.support-test]
policy = "custom-lint"
lint_task = "lint"

[modules.tooling-lint]
policy = "custom-lint"
lint_task = "lint"
"#;
