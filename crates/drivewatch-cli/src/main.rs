mod bootstrap_helpers;
mod cli_args;
mod settings_commands;

use anyhow::{bail, Result};
use clap::Parser;
use drivewatch_core::{current_unix_timestamp_ms, JsonFileSettingsStore};
use drivewatch_runtime::{check_trello, check_update};

use crate::{
    bootstrap_helpers::{acquire_purpose_lock, build_run_context, init_tracing, settings_path},
    cli_args::{Cli, CliCommand},
    settings_commands::execute_settings_command,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        CliCommand::CheckUpdate { since } => {
            let _lock = acquire_purpose_lock(&cli, "check-update")?;
            let ctx = build_run_context(&cli)?;
            let report = check_update(&ctx, since.as_deref(), current_unix_timestamp_ms()).await?;
            println!("{}", report.summary_line());
        }
        CliCommand::CheckTrello => {
            let _lock = acquire_purpose_lock(&cli, "check-trello")?;
            let ctx = build_run_context(&cli)?;
            let report = check_trello(&ctx, current_unix_timestamp_ms()).await?;
            println!("{}", report.summary_line());
            if report.failed_tickets > 0 {
                bail!(
                    "{} ticket(s) could not be restored; see the admin channel",
                    report.failed_tickets
                );
            }
        }
        CliCommand::Settings { command } => {
            let store = JsonFileSettingsStore::load(settings_path(&cli))?;
            println!("{}", execute_settings_command(&store, command)?);
        }
    }
    Ok(())
}
