//! Salescast CLI - Sales forecasts with an analyst's narrative
//!
//! Usage:
//!   salescast run --file sales.csv     Forecast and write an insight report
//!   salescast run --synthetic          Same, on built-in sample data
//!   salescast validate --file CSV      Check a table without forecasting
//!   salescast session                  Interactive session

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Run {
            file,
            horizon,
            synthetic,
            no_insight,
            export,
            full_export,
            json,
            secrets,
        } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_run(
                &config,
                commands::RunOptions {
                    file,
                    horizon,
                    synthetic,
                    no_insight,
                    export,
                    full_export,
                    json,
                    secrets,
                },
            )
            .await
        }
        Commands::Validate { file } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_validate(&config, &file)
        }
        Commands::Sample { out } => commands::cmd_sample(out.as_deref()),
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
        },
        Commands::Session { secrets } => {
            let config = commands::load_config(cli.config.as_deref())?;
            commands::cmd_session(&config, secrets.as_deref()).await
        }
    }
}
