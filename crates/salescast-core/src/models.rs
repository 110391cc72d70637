//! Domain models for salescast

use std::collections::BTreeMap;

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, ErrorKind, Result};

/// Minimum number of distinct observations a trend can be fitted on
pub const MIN_OBSERVATIONS: usize = 2;

/// A single observation of the sales series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// A validated, immutable sales series
///
/// Dates are strictly increasing, values are finite, and there are at least
/// [`MIN_OBSERVATIONS`] points. The only way to obtain one is through
/// [`TimeSeries::new`], which checks all of that.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    points: Vec<TimeSeriesPoint>,
}

impl TimeSeries {
    pub fn new(points: Vec<TimeSeriesPoint>) -> Result<Self> {
        if points.len() < MIN_OBSERVATIONS {
            return Err(Error::InsufficientData {
                needed: MIN_OBSERVATIONS,
                got: points.len(),
            });
        }

        for (i, point) in points.iter().enumerate() {
            if !point.value.is_finite() {
                return Err(Error::MalformedValue {
                    row: i + 1,
                    value: point.value.to_string(),
                });
            }
        }

        if let Some(w) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(Error::InvalidData(format!(
                "Series dates must be strictly increasing ({} followed by {})",
                w[0].date, w[1].date
            )));
        }

        Ok(Self { points })
    }

    pub fn points(&self) -> &[TimeSeriesPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false for a validated series; provided for API symmetry
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.points.iter().map(|p| p.date)
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|p| p.value)
    }

    pub fn first_date(&self) -> NaiveDate {
        self.points[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.points[self.points.len() - 1].date
    }

    /// Number of calendar days between the first and last observation
    pub fn span_days(&self) -> i64 {
        (self.last_date() - self.first_date()).num_days()
    }

    pub fn granularity(&self) -> Granularity {
        let dates: Vec<NaiveDate> = self.dates().collect();
        Granularity::infer(&dates)
    }

    /// Content identity of this series (SHA-256 over dates and value bits)
    pub fn key(&self) -> SeriesKey {
        let mut hasher = Sha256::new();
        for point in &self.points {
            hasher.update(point.date.to_string().as_bytes());
            hasher.update(point.value.to_bits().to_be_bytes());
        }
        SeriesKey(hex::encode(hasher.finalize()))
    }
}

/// Identity of a loaded series, used as the session cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SeriesKey(String);

impl SeriesKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for display
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Calendar spacing of a series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
    EveryNDays(u32),
}

impl Granularity {
    /// Infer granularity from the most common gap between consecutive dates
    ///
    /// Ties resolve to the smaller gap. Gaps of 28-31 days are treated as
    /// calendar months.
    pub fn infer(dates: &[NaiveDate]) -> Self {
        let mut counts: BTreeMap<i64, usize> = BTreeMap::new();
        for w in dates.windows(2) {
            let gap = (w[1] - w[0]).num_days();
            if gap > 0 {
                *counts.entry(gap).or_default() += 1;
            }
        }

        let gap = counts
            .iter()
            .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(a.0)))
            .map(|(gap, _)| *gap)
            .unwrap_or(1);

        match gap {
            1 => Self::Daily,
            7 => Self::Weekly,
            28..=31 => Self::Monthly,
            n => Self::EveryNDays(u32::try_from(n).unwrap_or(u32::MAX)),
        }
    }

    /// Date `steps` periods after `from`, or None on calendar overflow
    pub fn advance(&self, from: NaiveDate, steps: u32) -> Option<NaiveDate> {
        match self {
            Self::Daily => from.checked_add_days(Days::new(u64::from(steps))),
            Self::Weekly => from.checked_add_days(Days::new(7 * u64::from(steps))),
            Self::EveryNDays(n) => from.checked_add_days(Days::new(u64::from(*n) * u64::from(steps))),
            Self::Monthly => from.checked_add_months(Months::new(steps)),
        }
    }

    /// Approximate length of one period in days
    pub fn period_days(&self) -> f64 {
        match self {
            Self::Daily => 1.0,
            Self::Weekly => 7.0,
            Self::Monthly => 30.44,
            Self::EveryNDays(n) => f64::from(*n),
        }
    }

    pub fn as_str(&self) -> String {
        match self {
            Self::Daily => "daily".to_string(),
            Self::Weekly => "weekly".to_string(),
            Self::Monthly => "monthly".to_string(),
            Self::EveryNDays(n) => format!("every {} days", n),
        }
    }
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A forecast value with its uncertainty interval
///
/// Invariant: `lower <= estimate <= upper`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Additive decomposition of a forecast point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastComponents {
    pub date: NaiveDate,
    pub trend: f64,
    pub weekly: f64,
    pub yearly: f64,
}

/// Forecast over the observed history plus the requested horizon
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    points: Vec<ForecastPoint>,
    components: Vec<ForecastComponents>,
    history_len: usize,
    granularity: Granularity,
}

impl Forecast {
    pub(crate) fn new(
        points: Vec<ForecastPoint>,
        components: Vec<ForecastComponents>,
        history_len: usize,
        granularity: Granularity,
    ) -> Self {
        debug_assert_eq!(points.len(), components.len());
        Self {
            points,
            components,
            history_len,
            granularity,
        }
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn components(&self) -> &[ForecastComponents] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Number of future periods beyond the observed history
    pub fn horizon(&self) -> usize {
        self.points.len().saturating_sub(self.history_len)
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Points covering the observed history
    pub fn history(&self) -> &[ForecastPoint] {
        &self.points[..self.history_len.min(self.points.len())]
    }

    /// Points beyond the last observed date
    pub fn future(&self) -> &[ForecastPoint] {
        &self.points[self.history_len.min(self.points.len())..]
    }

    /// The last `n` points (or all of them if fewer), in chronological order
    pub fn tail(&self, n: usize) -> &[ForecastPoint] {
        let start = self.points.len().saturating_sub(n);
        &self.points[start..]
    }

    /// Rows the data view shows: the horizon plus five rows of history
    pub fn display_tail(&self, horizon: usize) -> &[ForecastPoint] {
        self.tail(horizon + 5)
    }
}

/// Bounded request sent to the completion service
#[derive(Debug, Clone, PartialEq)]
pub struct InsightRequest {
    /// The most recent forecast points; the only data the model sees
    pub excerpt: Vec<ForecastPoint>,
    /// Template the prompt was rendered from
    pub prompt_template: String,
    /// Fixed system role
    pub system_prompt: String,
    /// Rendered user prompt with the excerpt embedded
    pub prompt: String,
}

/// Outcome of an insight request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InsightResult {
    Narrative { narrative: String },
    Failure { kind: ErrorKind, detail: String },
}

impl InsightResult {
    pub fn narrative(text: impl Into<String>) -> Self {
        Self::Narrative {
            narrative: text.into(),
        }
    }

    pub fn failure(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            detail: detail.into(),
        }
    }

    /// Convert an error into a failure result, defaulting to `ServiceError`
    pub fn from_error(err: &Error) -> Self {
        Self::failure(
            err.kind().unwrap_or(ErrorKind::ServiceError),
            err.to_string(),
        )
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Narrative { narrative } => Some(narrative),
            Self::Failure { .. } => None,
        }
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Narrative { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// What normalization did to an uploaded table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ValidationSummary {
    /// Data rows read from the table
    pub rows_read: usize,
    /// Distinct dates kept
    pub distinct_dates: usize,
    /// Rows discarded because a later row had the same date
    pub duplicates_dropped: usize,
    /// Whether the input was not already in ascending date order
    pub reordered: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_time_series_requires_two_points() {
        let result = TimeSeries::new(vec![TimeSeriesPoint::new(date(2023, 1, 1), 1.0)]);
        assert!(matches!(
            result,
            Err(Error::InsufficientData { needed: 2, got: 1 })
        ));
    }

    #[test]
    fn test_time_series_rejects_unsorted_and_non_finite() {
        let unsorted = TimeSeries::new(vec![
            TimeSeriesPoint::new(date(2023, 1, 2), 1.0),
            TimeSeriesPoint::new(date(2023, 1, 1), 2.0),
        ]);
        assert!(matches!(unsorted, Err(Error::InvalidData(_))));

        let nan = TimeSeries::new(vec![
            TimeSeriesPoint::new(date(2023, 1, 1), 1.0),
            TimeSeriesPoint::new(date(2023, 1, 2), f64::NAN),
        ]);
        assert!(matches!(nan, Err(Error::MalformedValue { row: 2, .. })));
    }

    #[test]
    fn test_series_key_is_content_identity() {
        let a = TimeSeries::new(vec![
            TimeSeriesPoint::new(date(2023, 1, 1), 1.0),
            TimeSeriesPoint::new(date(2023, 1, 2), 2.0),
        ])
        .unwrap();
        let b = a.clone();
        let c = TimeSeries::new(vec![
            TimeSeriesPoint::new(date(2023, 1, 1), 1.0),
            TimeSeriesPoint::new(date(2023, 1, 2), 2.5),
        ])
        .unwrap();

        assert_eq!(a.key(), b.key());
        assert_ne!(a.key(), c.key());
        assert_eq!(a.key().as_str().len(), 64);
        assert_eq!(a.key().short().len(), 12);
    }

    #[test]
    fn test_granularity_infer() {
        let daily: Vec<_> = (1..=5).map(|d| date(2023, 1, d)).collect();
        assert_eq!(Granularity::infer(&daily), Granularity::Daily);

        let weekly = vec![date(2023, 1, 1), date(2023, 1, 8), date(2023, 1, 15)];
        assert_eq!(Granularity::infer(&weekly), Granularity::Weekly);

        let monthly = vec![date(2023, 1, 31), date(2023, 2, 28), date(2023, 3, 31)];
        assert_eq!(Granularity::infer(&monthly), Granularity::Monthly);

        // Daily data with one missing day is still daily
        let gappy = vec![
            date(2023, 1, 1),
            date(2023, 1, 2),
            date(2023, 1, 4),
            date(2023, 1, 5),
        ];
        assert_eq!(Granularity::infer(&gappy), Granularity::Daily);
    }

    #[test]
    fn test_granularity_advance() {
        let start = date(2023, 1, 31);
        assert_eq!(Granularity::Daily.advance(start, 1), Some(date(2023, 2, 1)));
        assert_eq!(Granularity::Weekly.advance(start, 2), Some(date(2023, 2, 14)));
        assert_eq!(Granularity::Monthly.advance(start, 1), Some(date(2023, 2, 28)));
        assert_eq!(Granularity::Monthly.advance(start, 2), Some(date(2023, 3, 31)));
        assert_eq!(
            Granularity::EveryNDays(3).advance(start, 2),
            Some(date(2023, 2, 6))
        );
    }

    #[test]
    fn test_forecast_tail_views() {
        let points: Vec<ForecastPoint> = (1..=10)
            .map(|d| ForecastPoint {
                date: date(2023, 1, d),
                estimate: d as f64,
                lower: d as f64 - 1.0,
                upper: d as f64 + 1.0,
            })
            .collect();
        let components = points
            .iter()
            .map(|p| ForecastComponents {
                date: p.date,
                trend: p.estimate,
                weekly: 0.0,
                yearly: 0.0,
            })
            .collect();
        let forecast = Forecast::new(points, components, 8, Granularity::Daily);

        assert_eq!(forecast.horizon(), 2);
        assert_eq!(forecast.history().len(), 8);
        assert_eq!(forecast.future().len(), 2);
        assert_eq!(forecast.tail(3).len(), 3);
        assert_eq!(forecast.tail(30).len(), 10);
        assert_eq!(forecast.display_tail(2).len(), 7);
        assert_eq!(forecast.tail(1)[0].date, date(2023, 1, 10));
    }

    #[test]
    fn test_insight_result_serialization() {
        let ok = InsightResult::narrative("Sales are rising.");
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["status"], "narrative");
        assert_eq!(json["narrative"], "Sales are rising.");

        let failed = InsightResult::failure(ErrorKind::ServiceError, "timeout");
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["kind"], "service_error");
        assert_eq!(failed.failure_kind(), Some(ErrorKind::ServiceError));
        assert!(failed.text().is_none());
    }
}
