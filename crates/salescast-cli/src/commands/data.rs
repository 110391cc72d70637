//! Data commands: table validation and the synthetic sample

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use salescast_core::{sample::synthetic_series, write_series_csv, AppConfig, SeriesValidator};

use super::core::{pipeline_error, print_validation, read_table};

pub fn cmd_validate(config: &AppConfig, file: &Path) -> Result<()> {
    println!("🔍 Validating {}...", file.display());

    let table = read_table(file)?;
    let validator = SeriesValidator::with_fields(&config.series.date_field, &config.series.value_field);
    let (series, summary) = validator
        .validate_detailed(&table)
        .map_err(pipeline_error)?;

    print_validation(&mut io::stdout().lock(), &summary)?;
    println!(
        "   Range: {} to {} ({}, {} observations)",
        series.first_date(),
        series.last_date(),
        series.granularity(),
        series.len()
    );
    println!("✅ Table is ready for forecasting");

    Ok(())
}

pub fn cmd_sample(out: Option<&Path>) -> Result<()> {
    let series = synthetic_series();

    match out {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            let rows = write_series_csv(&series, BufWriter::new(file))?;
            println!("💾 Wrote {} rows of synthetic sales to {}", rows, path.display());
        }
        None => {
            write_series_csv(&series, io::stdout().lock())?;
        }
    }

    Ok(())
}
