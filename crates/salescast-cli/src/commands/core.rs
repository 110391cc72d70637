//! Shared command utilities
//!
//! This module contains:
//! - `load_config` / `load_credentials` - configuration and secrets lookup
//! - `read_table` - open an uploaded CSV
//! - `print_*` - report, forecast table, and narrative rendering

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use salescast_core::{
    AppConfig, Credentials, Forecast, InsightResult, RawTable, RunReport, ValidationSummary,
};

/// Load layered configuration
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    AppConfig::load(path).context("Failed to load configuration")
}

/// API key from the secrets file when given, else from the environment
pub fn load_credentials(secrets: Option<&Path>) -> Result<Option<Credentials>> {
    if let Some(path) = secrets {
        let creds = Credentials::from_secrets_file(path)
            .with_context(|| format!("Failed to read secrets from {}", path.display()))?;
        if creds.is_some() {
            return Ok(creds);
        }
        tracing::warn!(path = %path.display(), "Secrets file has no [openai] api_key");
    }
    Ok(Credentials::from_env())
}

/// Read a CSV file into a raw table
pub fn read_table(path: &Path) -> Result<RawTable> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    RawTable::from_csv(file).with_context(|| format!("Failed to read CSV {}", path.display()))
}

/// Pipeline error with its failure kind, for display
pub fn pipeline_error(err: salescast_core::Error) -> anyhow::Error {
    match err.kind() {
        Some(kind) => anyhow!("[{}] {}", kind, err),
        None => anyhow::Error::new(err),
    }
}

pub fn print_report<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    if report.used_synthetic_data {
        writeln!(out, "   ℹ️  Using synthetic sample data (no series loaded)")?;
    }
    if let Some(v) = &report.validation {
        print_validation(out, v)?;
    }
    writeln!(
        out,
        "   Series {}: {} observations ({})",
        report.series_key.short(),
        report.observations,
        report.granularity
    )?;
    let source = if report.cache_hit {
        "cached"
    } else if report.refit {
        "new model"
    } else {
        "re-projected cached model"
    };
    writeln!(
        out,
        "   Forecast: {} points, horizon {} ({})",
        report.forecast_points, report.horizon, source
    )
}

pub fn print_validation<W: Write>(out: &mut W, summary: &ValidationSummary) -> io::Result<()> {
    writeln!(
        out,
        "   Rows read: {}, distinct dates: {}",
        summary.rows_read, summary.distinct_dates
    )?;
    if summary.duplicates_dropped > 0 {
        writeln!(
            out,
            "   ⚠️  {} duplicate date(s) dropped (kept the later row)",
            summary.duplicates_dropped
        )?;
    }
    if summary.reordered {
        writeln!(out, "   Rows were sorted by date")?;
    }
    Ok(())
}

/// The last `horizon + 5` rows of the forecast
pub fn print_forecast_tail<W: Write>(
    out: &mut W,
    forecast: &Forecast,
    horizon: usize,
) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "   {:<12} {:>12} {:>12} {:>12}",
        "DATE", "ESTIMATE", "LOWER", "UPPER"
    )?;
    writeln!(out, "   {}", "─".repeat(51))?;

    let history_end = forecast.history().last().map(|p| p.date);
    for p in forecast.display_tail(horizon) {
        let marker = if Some(p.date) <= history_end { " " } else { "*" };
        writeln!(
            out,
            "  {}{:<12} {:>12.2} {:>12.2} {:>12.2}",
            marker,
            p.date.format("%Y-%m-%d"),
            p.estimate,
            p.lower,
            p.upper
        )?;
    }
    writeln!(out, "   (* = forecast period)")
}

pub fn print_insight<W: Write>(out: &mut W, result: &InsightResult) -> io::Result<()> {
    writeln!(out)?;
    match result {
        InsightResult::Narrative { narrative } => {
            writeln!(out, "📝 Insight Report")?;
            writeln!(out, "   ─────────────────────────────")?;
            writeln!(out, "{}", narrative)
        }
        InsightResult::Failure { kind, detail } => {
            writeln!(out, "⚠️  Insight unavailable [{}]: {}", kind, detail)
        }
    }
}
