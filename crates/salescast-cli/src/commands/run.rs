//! One-shot forecast + insight command

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use salescast_core::{
    write_forecast_csv, AppConfig, ExportColumns, ForecastPoint, InsightResult, Pipeline,
    RunReport, SeriesInput, Session,
};
use serde::Serialize;

use super::core::{
    load_credentials, pipeline_error, print_forecast_tail, print_insight, print_report,
    read_table,
};

/// Options for `salescast run`
#[derive(Debug, Default)]
pub struct RunOptions {
    pub file: Option<PathBuf>,
    pub horizon: Option<u32>,
    pub synthetic: bool,
    pub no_insight: bool,
    pub export: Option<PathBuf>,
    pub full_export: bool,
    pub json: bool,
    pub secrets: Option<PathBuf>,
}

/// Everything `run --json` prints, as a single document
#[derive(Debug, Serialize)]
struct RunDocument<'a> {
    report: &'a RunReport,
    tail: &'a [ForecastPoint],
    #[serde(skip_serializing_if = "Option::is_none")]
    export: Option<ExportSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    insight: Option<InsightResult>,
}

#[derive(Debug, Serialize)]
struct ExportSummary {
    path: PathBuf,
    rows: usize,
}

pub async fn cmd_run(config: &AppConfig, opts: RunOptions) -> Result<()> {
    let credentials = load_credentials(opts.secrets.as_deref())?;
    let pipeline =
        Pipeline::from_config(config, credentials).context("Failed to set up the pipeline")?;
    let mut out = io::stdout().lock();
    run_with(&pipeline, opts, &mut out).await
}

/// Body of `run`, against any pipeline and output
///
/// With `json` set, nothing but one JSON document is written to `out`.
pub async fn run_with<W: Write>(pipeline: &Pipeline, opts: RunOptions, out: &mut W) -> Result<()> {
    let human = !opts.json;
    let horizon = opts
        .horizon
        .unwrap_or(pipeline.config().forecast.default_horizon);

    let input = match (&opts.file, opts.synthetic) {
        (Some(path), _) => {
            if human {
                writeln!(out, "📂 Loading {}...", path.display())?;
            }
            SeriesInput::Upload(read_table(path)?)
        }
        (None, true) => SeriesInput::Synthetic,
        (None, false) => SeriesInput::Default,
    };

    if human {
        writeln!(out, "📈 Forecasting {} periods ahead...", horizon)?;
    }
    let mut session = Session::new();
    let report = pipeline
        .run_forecast(&mut session, input, horizon)
        .map_err(pipeline_error)?;

    let Some(forecast) = session.forecast() else {
        anyhow::bail!("Forecast missing from session after a successful run");
    };
    if human {
        print_report(out, &report)?;
        print_forecast_tail(out, forecast, horizon as usize)?;
    }

    let export = match &opts.export {
        Some(path) => {
            let columns = if opts.full_export {
                ExportColumns::Full
            } else {
                ExportColumns::Standard
            };
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let rows = write_forecast_csv(forecast, BufWriter::new(file), columns)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            if human {
                writeln!(out, "\n💾 Exported {} rows to {}", rows, path.display())?;
            }
            Some(ExportSummary {
                path: path.clone(),
                rows,
            })
        }
        None => None,
    };

    let insight = if opts.no_insight {
        None
    } else {
        if human {
            writeln!(out, "\n🤖 Generating insight report...")?;
        }
        let result = pipeline.run_insight(&mut session).await;
        if human {
            print_insight(out, &result)?;
        }
        Some(result)
    };

    if opts.json {
        let Some(forecast) = session.forecast() else {
            anyhow::bail!("Forecast missing from session after a successful run");
        };
        let document = RunDocument {
            report: &report,
            tail: forecast.display_tail(horizon as usize),
            export,
            insight,
        };
        writeln!(out, "{}", serde_json::to_string_pretty(&document)?)?;
    }

    Ok(())
}
