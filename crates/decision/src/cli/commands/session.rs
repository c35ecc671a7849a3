//! Shared setup of the decision commands

use std::path::PathBuf;

use console::style;
use serde_json::json;

use decision_core::config::{load_config, load_config_or_default};
use decision_core::{Config, RunContext};
use decision_taskcluster::{run_decision, DecisionRun, RunMode, RunOutcome, TaskclusterClient};
use decision_tasks::{render_markdown, render_text, CraftContext};

use crate::cli::{output, Cli, OutputFormat};

/// Configuration, context and client of one invocation
pub(super) struct Session<'a> {
    cli: &'a Cli,
    repo_root: PathBuf,
    config: Config,
    run: RunContext,
    client: TaskclusterClient,
}

impl<'a> Session<'a> {
    pub(super) fn open(cli: &'a Cli) -> anyhow::Result<Self> {
        let repo_root = std::env::current_dir()?;
        let (config, config_path) = match &cli.config {
            Some(path) => (load_config(path)?, Some(path.clone())),
            None => load_config_or_default(&repo_root)?,
        };

        if config_path.is_none() && !cli.quiet {
            output::warning("No configuration found, using defaults.");
        }

        let run = cli.context.run_context()?;
        let client = TaskclusterClient::new(&cli.context.proxy_url)?;

        Ok(Self {
            cli,
            repo_root,
            config,
            run,
            client,
        })
    }

    pub(super) fn run(&self, mode: &RunMode) -> anyhow::Result<()> {
        let cx = CraftContext::new(&self.run, &self.config);
        let decision = DecisionRun::new(cx, &self.repo_root, &self.client, &self.client)
            .dry_run(self.cli.dry_run);

        let rt = tokio::runtime::Runtime::new()?;
        let outcome = rt.block_on(run_decision(decision, mode))?;

        self.print(mode, &outcome)
    }

    fn print(&self, mode: &RunMode, outcome: &RunOutcome) -> anyhow::Result<()> {
        let summary = outcome.summary(mode.command());

        match self.cli.format {
            OutputFormat::Json => {
                let tasks: serde_json::Map<String, serde_json::Value> = outcome
                    .planned()
                    .map(|planned| {
                        planned
                            .definitions
                            .iter()
                            .map(|(id, definition)| {
                                serde_json::to_value(definition).map(|v| (id.to_string(), v))
                            })
                            .collect::<Result<_, _>>()
                    })
                    .transpose()?
                    .unwrap_or_default();
                let report = json!({ "summary": summary, "tasks": tasks });
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Markdown => println!("{}", render_markdown(&summary)),
            OutputFormat::Text => {
                if self.cli.quiet {
                    return Ok(());
                }
                print!("{}", render_text(&summary));
                println!();
                match outcome {
                    RunOutcome::Skipped => output::info("Pull request asked to skip every task"),
                    RunOutcome::DryRun(planned) => {
                        if self.cli.verbose {
                            print!("{}", planned.graph.execution_plan());
                            println!();
                        }
                        println!(
                            "  {}",
                            style(format!(
                                "[DRY RUN - {} tasks planned, nothing submitted]",
                                planned.graph.len()
                            ))
                            .yellow()
                            .bold()
                        );
                    }
                    RunOutcome::Submitted {
                        planned, artifacts, ..
                    } => {
                        output::success(&format!("Submitted {} tasks", planned.graph.len()));
                        for path in artifacts {
                            println!(
                                "{}",
                                output::key_value(
                                    "artifact",
                                    &output::path_style().apply_to(path.display()).to_string()
                                )
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
