//! CSV export of series and forecasts
//!
//! Forecast rows use the column names downstream tooling already expects:
//! `ds,yhat,yhat_lower,yhat_upper`, optionally followed by the components.

use std::io::Write;

use csv::Writer;
use serde::Serialize;

use crate::error::Result;
use crate::models::{Forecast, TimeSeries};

/// Which forecast columns to write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportColumns {
    /// Date, estimate, and interval bounds
    #[default]
    Standard,
    /// Standard columns plus trend, weekly, and yearly components
    Full,
}

#[derive(Serialize)]
struct StandardRow<'a> {
    ds: &'a str,
    yhat: f64,
    yhat_lower: f64,
    yhat_upper: f64,
}

#[derive(Serialize)]
struct FullRow<'a> {
    ds: &'a str,
    yhat: f64,
    yhat_lower: f64,
    yhat_upper: f64,
    trend: f64,
    weekly: f64,
    yearly: f64,
}

#[derive(Serialize)]
struct SeriesRow<'a> {
    ds: &'a str,
    y: f64,
}

/// Write every forecast point (history and future) as CSV
///
/// Returns the number of data rows written.
pub fn write_forecast_csv<W: Write>(
    forecast: &Forecast,
    writer: W,
    columns: ExportColumns,
) -> Result<usize> {
    let mut wtr = Writer::from_writer(writer);

    for (point, parts) in forecast.points().iter().zip(forecast.components()) {
        let ds = point.date.format("%Y-%m-%d").to_string();
        match columns {
            ExportColumns::Standard => wtr.serialize(StandardRow {
                ds: &ds,
                yhat: point.estimate,
                yhat_lower: point.lower,
                yhat_upper: point.upper,
            })?,
            ExportColumns::Full => wtr.serialize(FullRow {
                ds: &ds,
                yhat: point.estimate,
                yhat_lower: point.lower,
                yhat_upper: point.upper,
                trend: parts.trend,
                weekly: parts.weekly,
                yearly: parts.yearly,
            })?,
        }
    }

    wtr.flush()?;
    Ok(forecast.len())
}

/// Write a series as `ds,y` CSV that [`RawTable::from_csv`](crate::RawTable::from_csv) reads back
pub fn write_series_csv<W: Write>(series: &TimeSeries, writer: W) -> Result<usize> {
    let mut wtr = Writer::from_writer(writer);
    for point in series.points() {
        let ds = point.date.format("%Y-%m-%d").to_string();
        wtr.serialize(SeriesRow {
            ds: &ds,
            y: point.value,
        })?;
    }
    wtr.flush()?;
    Ok(series.len())
}
