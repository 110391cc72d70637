//! Deterministic synthetic sales series
//!
//! Lets the pipeline be exercised without real data: 365 consecutive days
//! starting 2023-01-01 with a linear trend, a weekend step, and a quarterly
//! step. No randomness, so every call returns the same series.

use chrono::{Datelike, Days, NaiveDate};

use crate::models::{TimeSeries, TimeSeriesPoint};

/// Number of days in the synthetic series
pub const SYNTHETIC_DAYS: u32 = 365;

/// First date of the synthetic series
pub fn synthetic_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Value of the synthetic series on day `index` (0-based) falling on `date`
pub fn synthetic_value(index: u32, date: NaiveDate) -> f64 {
    let trend = 100.0 + f64::from(index) / 5.0;
    // Saturday and Sunday sell 20 more
    let weekend = 20.0 * f64::from(1 + date.weekday().num_days_from_monday() / 5);
    // Steps up every quarter-ish: Jan-Feb, Mar-May, Jun-Aug, Sep-Nov, Dec
    let quarter = 30.0 * f64::from(1 + date.month() / 3);
    trend + weekend + quarter
}

/// Build the synthetic series
pub fn synthetic_series() -> TimeSeries {
    let start = synthetic_start();
    let points: Vec<TimeSeriesPoint> = (0..SYNTHETIC_DAYS)
        .filter_map(|i| {
            let date = start.checked_add_days(Days::new(u64::from(i)))?;
            Some(TimeSeriesPoint::new(date, synthetic_value(i, date)))
        })
        .collect();

    // 365 strictly increasing daily points with finite values always
    // satisfy the series invariants
    match TimeSeries::new(points) {
        Ok(series) => series,
        Err(e) => unreachable!("synthetic series is valid by construction: {}", e),
    }
}
