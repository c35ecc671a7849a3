//! CLI definition and command handling

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use decision_core::{ConfigError, RunContext};
use decision_taskcluster::DEFAULT_PROXY_URL;

use commands::{PrOrPushCommand, ReleaseCommand};

/// Decision - plans and submits the CI task graph
#[derive(Debug, Parser)]
#[command(name = "decision")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Configuration file (default: discovered from the working directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Plan and print the graph without submitting it
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Working directory
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    #[command(flatten)]
    pub context: ContextArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Output format for CLI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// JSON output
    Json,
    /// Markdown report
    Markdown,
}

/// What the CI trigger tells us about the run
#[derive(Debug, Clone, Args)]
pub struct ContextArgs {
    /// Task id of this decision task
    #[arg(long, env = "TASK_ID", global = true, hide_env_values = true)]
    pub task_id: Option<String>,

    /// Repository to check out
    #[arg(long, env = "MOBILE_HEAD_REPOSITORY", global = true)]
    pub repository: Option<String>,

    /// Branch to fetch
    #[arg(long, env = "MOBILE_HEAD_BRANCH", global = true)]
    pub branch: Option<String>,

    /// Commit to check out
    #[arg(long, env = "MOBILE_HEAD_REV", global = true)]
    pub commit: Option<String>,

    /// Push timestamp
    #[arg(long, env = "MOBILE_PUSH_DATE_TIME", global = true)]
    pub push_date_time: Option<String>,

    /// Pull request title
    #[arg(long, env = "GITHUB_PULL_TITLE", global = true)]
    pub pull_request_title: Option<String>,

    /// Trust level of the trigger
    #[arg(long, env = "TRUST_LEVEL", global = true, default_value_t = 1)]
    pub trust_level: u8,

    /// Scheduler id of created tasks
    #[arg(long, env = "SCHEDULER_ID", global = true, default_value = "taskcluster-github")]
    pub scheduler_id: String,

    /// Priority of created tasks
    #[arg(long, env = "TASKS_PRIORITY", global = true, default_value = "lowest")]
    pub priority: String,

    /// Worker type of build tasks
    #[arg(long, env = "BUILD_WORKER_TYPE", global = true)]
    pub build_worker_type: Option<String>,

    /// Worker type of beetmover tasks
    #[arg(long, env = "BEETMOVER_WORKER_TYPE", global = true)]
    pub beetmover_worker_type: Option<String>,

    /// Taskcluster proxy address
    #[arg(long, env = "TASKCLUSTER_PROXY_URL", global = true, default_value = DEFAULT_PROXY_URL)]
    pub proxy_url: String,
}

impl ContextArgs {
    /// Build the run context, failing on missing required inputs
    pub fn run_context(&self) -> Result<RunContext, ConfigError> {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        let context = RunContext::new(
            field(&self.task_id),
            field(&self.repository),
            field(&self.branch),
            field(&self.commit),
            self.trust_level,
            field(&self.build_worker_type),
            field(&self.beetmover_worker_type),
        )?;
        Ok(context
            .with_push_date_time(self.push_date_time.clone())
            .with_pull_request_title(field(&self.pull_request_title))
            .with_scheduler_id(self.scheduler_id.clone())
            .with_priority(self.priority.clone()))
    }
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Plan the graph of a pull request or push
    PrOrPush(PrOrPushCommand),

    /// Plan the graph of a release
    Release(ReleaseCommand),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> anyhow::Result<()> {
        // Change to specified directory if provided
        if let Some(dir) = &self.directory {
            std::env::set_current_dir(dir)?;
        }

        match self.command {
            Commands::PrOrPush(ref cmd) => cmd.execute(&self),
            Commands::Release(ref cmd) => cmd.execute(&self),
        }
    }
}
