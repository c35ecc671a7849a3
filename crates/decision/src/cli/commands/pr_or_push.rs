//! Pull request and push command

use clap::Args;
use tracing::info;

use decision_taskcluster::RunMode;

use super::session::Session;
use crate::cli::Cli;

/// Build, test and lint every module
#[derive(Debug, Args)]
pub struct PrOrPushCommand {}

impl PrOrPushCommand {
    /// Execute the pr-or-push command
    pub fn execute(&self, cli: &Cli) -> anyhow::Result<()> {
        info!(dry_run = cli.dry_run, "executing pr-or-push command");
        Session::open(cli)?.run(&RunMode::PrOrPush)
    }
}
