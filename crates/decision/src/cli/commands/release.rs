//! Release command

use clap::Args;
use tracing::info;

use decision_taskcluster::RunMode;

use super::session::Session;
use crate::cli::Cli;

/// Build and publish every publishable module
#[derive(Debug, Args)]
pub struct ReleaseCommand {
    /// Version to release (default: componentsVersion of the build config)
    #[arg(long)]
    pub version: Option<String>,

    /// Publish a snapshot
    #[arg(long)]
    pub snapshot: bool,

    /// Publish to the staging buckets
    #[arg(long)]
    pub staging: bool,
}

impl ReleaseCommand {
    /// Execute the release command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(
            version = ?self.version,
            snapshot = self.snapshot,
            staging = self.staging,
            dry_run = cli.dry_run,
            "executing release command"
        );
        Session::open(cli)?.run(&RunMode::Release {
            version: self.version.clone(),
            is_snapshot: self.snapshot,
            is_staging: self.staging,
        })
    }
}
