//! Interactive session
//!
//! A line-oriented loop over one [`Session`], so repeated renders reuse the
//! cached model and forecast instead of refitting.

use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use salescast_core::{
    write_forecast_csv, AppConfig, Error, ExportColumns, Pipeline, SeriesInput, Session,
};

use super::core::{
    load_credentials, print_forecast_tail, print_insight, print_report, read_table,
};

const HELP: &str = "\
Commands:
  load <file.csv>         Load a sales table and forecast it
  sample                  Load the synthetic sample series
  horizon <n>             Set the horizon (re-forecasts a loaded series)
  run                     Forecast the loaded series (synthetic if none)
  insight                 Generate the insight report for the current forecast
  show                    Show the forecast tail and the last insight
  export <file> [full]    Write the forecast as CSV
  status                  Show session state
  reset                   Forget the loaded series
  help                    Show this help
  quit                    Leave the session";

/// Whether the loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Interactive command interpreter over one session
pub struct Shell {
    pipeline: Pipeline,
    session: Session,
    horizon: u32,
}

impl Shell {
    pub fn new(pipeline: Pipeline) -> Self {
        let horizon = pipeline.config().forecast.default_horizon;
        Self {
            pipeline,
            session: Session::new(),
            horizon,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn horizon(&self) -> u32 {
        self.horizon
    }

    /// Execute one command line
    ///
    /// Pipeline failures are printed and the session continues; only output
    /// errors are returned.
    pub async fn execute<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Flow> {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            return Ok(Flow::Continue);
        };
        let args: Vec<&str> = parts.collect();

        match command {
            "load" => match args.first() {
                Some(path) => match read_table(Path::new(path)) {
                    Ok(table) => self.forecast(SeriesInput::Upload(table), out)?,
                    Err(e) => writeln!(out, "❌ {:#}", e)?,
                },
                None => writeln!(out, "Usage: load <file.csv>")?,
            },
            "sample" => self.forecast(SeriesInput::Synthetic, out)?,
            "run" => self.forecast(SeriesInput::Default, out)?,
            "horizon" => match args.first().map(|s| s.parse::<u32>()) {
                Some(Ok(horizon)) => match self.pipeline.check_horizon(horizon) {
                    Ok(()) => {
                        self.horizon = horizon;
                        writeln!(out, "Horizon set to {}", horizon)?;
                        if self.session.series().is_some() {
                            self.forecast(SeriesInput::Default, out)?;
                        }
                    }
                    Err(e) => print_error(out, &e)?,
                },
                Some(Err(_)) | None => writeln!(out, "Usage: horizon <n>")?,
            },
            "insight" => {
                writeln!(out, "🤖 Generating insight report...")?;
                let result = self.pipeline.run_insight(&mut self.session).await;
                print_insight(out, &result)?;
            }
            "show" => match self.session.forecast() {
                Some(forecast) => {
                    print_forecast_tail(out, forecast, self.horizon as usize)?;
                    if let Some(insight) = self.session.insight() {
                        print_insight(out, insight)?;
                    }
                }
                None => writeln!(out, "No forecast yet. Try `load <file>` or `sample`.")?,
            },
            "export" => self.export(&args, out)?,
            "status" => self.status(out)?,
            "reset" => {
                self.session.reset();
                writeln!(out, "Session cleared")?;
            }
            "help" | "?" => writeln!(out, "{}", HELP)?,
            "quit" | "exit" => return Ok(Flow::Quit),
            other => writeln!(out, "Unknown command: {} (try `help`)", other)?,
        }

        Ok(Flow::Continue)
    }

    fn forecast<W: Write>(&mut self, input: SeriesInput, out: &mut W) -> Result<()> {
        match self
            .pipeline
            .run_forecast(&mut self.session, input, self.horizon)
        {
            Ok(report) => {
                print_report(out, &report)?;
                if let Some(forecast) = self.session.forecast() {
                    print_forecast_tail(out, forecast, self.horizon as usize)?;
                }
            }
            Err(e) => print_error(out, &e)?,
        }
        Ok(())
    }

    fn export<W: Write>(&self, args: &[&str], out: &mut W) -> Result<()> {
        let Some(path) = args.first() else {
            writeln!(out, "Usage: export <file> [full]")?;
            return Ok(());
        };
        let Some(forecast) = self.session.forecast() else {
            writeln!(out, "No forecast to export")?;
            return Ok(());
        };

        let columns = if args.get(1) == Some(&"full") {
            ExportColumns::Full
        } else {
            ExportColumns::Standard
        };
        let file = File::create(path).with_context(|| format!("Failed to create {}", path))?;
        let rows = write_forecast_csv(forecast, BufWriter::new(file), columns)?;
        writeln!(out, "💾 Exported {} rows to {}", rows, path)?;
        Ok(())
    }

    fn status<W: Write>(&self, out: &mut W) -> Result<()> {
        let stats = self.session.cache().stats();
        writeln!(out, "Horizon: {}", self.horizon)?;
        match self.session.series() {
            Some(series) => writeln!(
                out,
                "Series: {} ({} observations{})",
                series.key().short(),
                series.len(),
                if self.session.used_synthetic_data() {
                    ", synthetic"
                } else {
                    ""
                }
            )?,
            None => writeln!(out, "Series: none")?,
        }
        if let Some(model) = self.session.model() {
            let summary = model.summary();
            let seasonalities: Vec<&str> =
                summary.seasonalities.iter().map(|s| s.as_str()).collect();
            writeln!(
                out,
                "Model: {} changepoints, seasonality [{}], growth {:+.2}/period",
                summary.changepoints,
                seasonalities.join(", "),
                summary.growth_per_period
            )?;
        }
        writeln!(
            out,
            "Cache: {} hit(s), {} miss(es)",
            stats.hits, stats.misses
        )?;
        let insight = match self.session.insight() {
            None => "none".to_string(),
            Some(result) => match result.failure_kind() {
                Some(kind) => format!("failed ({})", kind),
                None => "ready".to_string(),
            },
        };
        writeln!(out, "Insight: {}", insight)?;
        writeln!(
            out,
            "API key: {}",
            if self.pipeline.has_credentials() {
                "configured"
            } else {
                "missing"
            }
        )?;
        Ok(())
    }
}

fn print_error<W: Write>(out: &mut W, err: &Error) -> io::Result<()> {
    let kind = err.kind().map(|k| k.as_str()).unwrap_or("error");
    writeln!(out, "❌ [{}] {}", kind, err)
}

/// Feed lines from `input` to the shell until it quits or input ends
pub async fn run_lines<R: BufRead, W: Write>(
    shell: &mut Shell,
    input: R,
    out: &mut W,
    prompt: bool,
) -> Result<()> {
    if prompt {
        write!(out, "salescast> ")?;
        out.flush()?;
    }
    for line in input.lines() {
        let line = line.context("Failed to read input")?;
        if shell.execute(line.trim(), out).await? == Flow::Quit {
            break;
        }
        if prompt {
            write!(out, "salescast> ")?;
            out.flush()?;
        }
    }
    Ok(())
}

pub async fn cmd_session(config: &AppConfig, secrets: Option<&Path>) -> Result<()> {
    let credentials = load_credentials(secrets)?;
    let pipeline =
        Pipeline::from_config(config, credentials).context("Failed to set up the pipeline")?;
    let mut shell = Shell::new(pipeline);

    let mut out = io::stdout();
    writeln!(out, "Salescast interactive session. Type `help` for commands.")?;
    let stdin = io::stdin();
    run_lines(&mut shell, stdin.lock(), &mut out, true).await
}
