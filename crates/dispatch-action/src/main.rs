mod assign_command;
mod bootstrap_helpers;
mod cleanup_command;
mod trigger_detection;

use anyhow::Result;
use clap::Parser;
use dispatch_cli::{Cli, CliCommand};
use dispatch_core::ActionOutputWriter;

use crate::assign_command::run_assign_command;
use crate::bootstrap_helpers::init_tracing;
use crate::cleanup_command::run_cleanup_releases_command;

async fn run_cli(cli: Cli) -> Result<()> {
    let outputs = ActionOutputWriter::from_env();
    match &cli.command {
        CliCommand::Assign(args) => run_assign_command(&cli.github, args, &outputs).await,
        CliCommand::CleanupReleases(args) => {
            run_cleanup_releases_command(&cli.github, args, &outputs).await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    run_cli(cli).await
}
