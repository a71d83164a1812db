use anyhow::Result;
use clap::Parser;

mod cli;

use cli::commands::catalog::CatalogCommand;
use cli::commands::complete::CompleteCommand;
use cli::commands::enroll::EnrollCommand;
use cli::commands::open::OpenCommand;
use cli::commands::status::StatusCommand;
use cli::commands::Command;
use cli::{Cli, Commands};
use module_progress::config::config;
use module_progress::observability::progress_metrics;
use module_progress::telemetry::init_telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config()?.clone();
    init_telemetry(&config.observability)?;

    let result = tokio::runtime::Runtime::new()?.block_on(async {
        match cli.command {
            Commands::Catalog { json } => {
                CatalogCommand::new(config).with_json(json).execute().await
            }
            Commands::Status { user, json } => {
                StatusCommand::new(config, user).with_json(json).execute().await
            }
            Commands::Complete { user, module, json } => {
                CompleteCommand::new(config, user, module)
                    .with_json(json)
                    .execute()
                    .await
            }
            Commands::Enroll { user } => EnrollCommand::new(config, user).execute().await,
            Commands::Open { user, module, json } => {
                OpenCommand::new(config, user, module)
                    .with_json(json)
                    .execute()
                    .await
            }
        }
    });

    progress_metrics().log_stats();
    result
}
