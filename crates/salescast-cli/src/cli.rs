//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Salescast - Sales forecasts with an analyst's narrative
#[derive(Parser)]
#[command(name = "salescast")]
#[command(about = "Forecast sales and generate business insights", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (default: <config_dir>/salescast/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Forecast a sales table and ask for an insight report
    Run {
        /// CSV file with a date column and a numeric column
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Number of future periods to forecast (default from config)
        #[arg(long)]
        horizon: Option<u32>,

        /// Use the built-in synthetic sales series
        #[arg(long, conflicts_with = "file")]
        synthetic: bool,

        /// Skip the insight report
        #[arg(long)]
        no_insight: bool,

        /// Write the full forecast to this CSV file
        #[arg(long)]
        export: Option<PathBuf>,

        /// Include trend and seasonal components in the export
        #[arg(long, requires = "export")]
        full_export: bool,

        /// Print the run report as JSON
        #[arg(long)]
        json: bool,

        /// TOML secrets file with `[openai] api_key`
        ///
        /// Without it the key is read from SALESCAST_API_KEY or OPENAI_API_KEY.
        #[arg(long)]
        secrets: Option<PathBuf>,
    },

    /// Check a sales table without forecasting
    Validate {
        /// CSV file to check
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Write the synthetic sales series as CSV
    Sample {
        /// Output file (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Manage insight prompt templates
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Interactive session that keeps the fitted model between commands
    Session {
        /// TOML secrets file with `[openai] api_key`
        #[arg(long)]
        secrets: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., forecast_insight)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
