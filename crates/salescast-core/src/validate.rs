//! Sales table loading and series validation
//!
//! Turns an uploaded table into the canonical [`TimeSeries`] the forecaster
//! needs. Checks run in a fixed order so the first reported error is
//! predictable:
//!
//! 1. both named columns exist (`SchemaMismatch`)
//! 2. every date parses (`MalformedDate`, naming the row)
//! 3. every value parses to a finite number (`MalformedValue`)
//! 4. rows are sorted by date; rows sharing a date keep the **last** occurrence
//! 5. at least two distinct dates remain (`InsufficientData`)

use std::io::Read;

use chrono::{NaiveDate, NaiveDateTime};
use csv::ReaderBuilder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{TimeSeries, TimeSeriesPoint, ValidationSummary, MIN_OBSERVATIONS};

/// Column name for dates when none is configured
pub const DEFAULT_DATE_FIELD: &str = "ds";
/// Column name for values when none is configured
pub const DEFAULT_VALUE_FIELD: &str = "y";

/// An uploaded table: header names plus raw string cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Read a CSV table with a header row
    ///
    /// Rows may have differing lengths; missing cells surface later as
    /// malformed dates or values.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').to_string())
            .collect();

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(record.iter().map(|s| s.to_string()).collect());
        }

        Ok(Self { headers, rows })
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h.trim() == name)
    }
}

/// Validates raw tables into time series
#[derive(Debug, Clone)]
pub struct SeriesValidator {
    date_field: String,
    value_field: String,
}

impl SeriesValidator {
    pub fn new() -> Self {
        Self::with_fields(DEFAULT_DATE_FIELD, DEFAULT_VALUE_FIELD)
    }

    pub fn with_fields(date_field: &str, value_field: &str) -> Self {
        Self {
            date_field: date_field.to_string(),
            value_field: value_field.to_string(),
        }
    }

    pub fn date_field(&self) -> &str {
        &self.date_field
    }

    pub fn value_field(&self) -> &str {
        &self.value_field
    }

    /// Validate a table into a time series
    pub fn validate(&self, table: &RawTable) -> Result<TimeSeries> {
        self.validate_detailed(table).map(|(series, _)| series)
    }

    /// Validate a table, also reporting what normalization did
    pub fn validate_detailed(&self, table: &RawTable) -> Result<(TimeSeries, ValidationSummary)> {
        let date_col = table.column(&self.date_field);
        let value_col = table.column(&self.value_field);

        let (date_col, value_col) = match (date_col, value_col) {
            (Some(d), Some(v)) => (d, v),
            _ => {
                let missing: Vec<&str> = [
                    (date_col, self.date_field.as_str()),
                    (value_col, self.value_field.as_str()),
                ]
                .iter()
                .filter(|(col, _)| col.is_none())
                .map(|(_, name)| *name)
                .collect();
                return Err(Error::SchemaMismatch(format!(
                    "table must have columns '{}' and '{}' (missing: {})",
                    self.date_field,
                    self.value_field,
                    missing.join(", ")
                )));
            }
        };

        // Dates are checked for every row before any value is looked at
        let mut dates = Vec::with_capacity(table.rows.len());
        for (i, row) in table.rows.iter().enumerate() {
            let raw = row.get(date_col).map(String::as_str).unwrap_or("");
            let date = parse_date(raw).ok_or_else(|| Error::MalformedDate {
                row: i + 1,
                value: raw.to_string(),
            })?;
            dates.push(date);
        }

        let mut values = Vec::with_capacity(table.rows.len());
        for (i, row) in table.rows.iter().enumerate() {
            let raw = row.get(value_col).map(String::as_str).unwrap_or("");
            let value = parse_value(raw).ok_or_else(|| Error::MalformedValue {
                row: i + 1,
                value: raw.to_string(),
            })?;
            values.push(value);
        }

        let reordered = dates.windows(2).any(|w| w[1] < w[0]);

        let mut points: Vec<TimeSeriesPoint> = dates
            .into_iter()
            .zip(values)
            .map(|(date, value)| TimeSeriesPoint::new(date, value))
            .collect();

        // Stable sort keeps rows sharing a date in input order, so the last
        // one in each run is the latest occurrence.
        points.sort_by_key(|p| p.date);
        let rows_read = points.len();
        let mut deduped: Vec<TimeSeriesPoint> = Vec::with_capacity(rows_read);
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }

        let summary = ValidationSummary {
            rows_read,
            distinct_dates: deduped.len(),
            duplicates_dropped: rows_read - deduped.len(),
            reordered,
        };

        if deduped.len() < MIN_OBSERVATIONS {
            return Err(Error::InsufficientData {
                needed: MIN_OBSERVATIONS,
                got: deduped.len(),
            });
        }

        debug!(
            rows = summary.rows_read,
            distinct = summary.distinct_dates,
            duplicates = summary.duplicates_dropped,
            reordered = summary.reordered,
            "Validated sales series"
        );

        Ok((TimeSeries::new(deduped)?, summary))
    }
}

impl Default for SeriesValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a calendar date, accepting ISO dates and ISO datetimes
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let date_formats = [
        "%Y-%m-%d", // 2023-01-15
        "%Y/%m/%d", // 2023/01/15
        "%m/%d/%Y", // 01/15/2023
    ];
    for fmt in date_formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }

    let datetime_formats = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    for fmt in datetime_formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }

    None
}

/// Parse a sales value, tolerating a currency symbol and thousands separators
///
/// Commas are only accepted as well-formed thousands groups in the integer
/// part (`1,234,567.89`); anything else, like `1,5` or `1.234,56`, is rejected.
fn parse_value(s: &str) -> Option<f64> {
    let s = s.trim();
    let (sign, rest) = match s.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", s),
    };
    let rest = rest.strip_prefix('$').unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }

    let (int_part, frac_part) = match rest.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (rest, None),
    };
    if frac_part.is_some_and(|f| f.contains(',')) {
        return None;
    }

    let digits = if int_part.contains(',') {
        let mut groups = int_part.split(',');
        let lead_ok = groups
            .next()
            .is_some_and(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()));
        let rest_ok = groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()));
        if !(lead_ok && rest_ok) {
            return None;
        }
        int_part.replace(',', "")
    } else {
        int_part.to_string()
    };

    let cleaned = match frac_part {
        Some(frac) => format!("{}{}.{}", sign, digits, frac),
        None => format!("{}{}", sign, digits),
    };
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: &[(&str, &str)]) -> RawTable {
        RawTable::new(
            vec!["ds".into(), "y".into()],
            rows.iter()
                .map(|(d, v)| vec![d.to_string(), v.to_string()])
                .collect(),
        )
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-15"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("01/15/2024"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15 08:30:00"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("2024-01-15T08:30:00"), Some(date(2024, 1, 15)));
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("1234.5"), Some(1234.5));
        assert_eq!(parse_value("$1,234.56"), Some(1234.56));
        assert_eq!(parse_value("-3"), Some(-3.0));
        assert_eq!(parse_value("-$1,200"), Some(-1200.0));
        assert_eq!(parse_value("1,234,567.5"), Some(1234567.5));
        assert_eq!(parse_value("1,5"), None);
        assert_eq!(parse_value("1.234,56"), None);
        assert_eq!(parse_value("12,34,5"), None);
        assert_eq!(parse_value("1234,567"), None);
        assert_eq!(parse_value("$"), None);
        assert_eq!(parse_value("NaN"), None);
        assert_eq!(parse_value("inf"), None);
        assert_eq!(parse_value("abc"), None);
        assert_eq!(parse_value(""), None);
    }

    #[test]
    fn test_validate_happy_path() {
        let series = SeriesValidator::new()
            .validate(&table(&[("2023-01-01", "100"), ("2023-01-02", "101")]))
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[1].value, 101.0);
    }

    #[test]
    fn test_missing_value_column_is_schema_mismatch() {
        let table = RawTable::new(
            vec!["ds".into(), "sales".into()],
            vec![vec!["2023-01-01".into(), "1".into()]],
        );
        let err = SeriesValidator::new().validate(&table).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(ref msg) if msg.contains("missing: y")));
    }

    #[test]
    fn test_malformed_date_names_row() {
        let err = SeriesValidator::new()
            .validate(&table(&[
                ("2023-01-01", "1"),
                ("2023-01-02", "2"),
                ("someday", "3"),
            ]))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedDate { row: 3, ref value } if value == "someday"));
    }

    #[test]
    fn test_dates_are_checked_before_values() {
        let err = SeriesValidator::new()
            .validate(&table(&[("2023-01-01", "oops"), ("bad", "2")]))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedDate { row: 2, .. }));
    }

    #[test]
    fn test_malformed_value() {
        let err = SeriesValidator::new()
            .validate(&table(&[("2023-01-01", "1"), ("2023-01-02", "NaN")]))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedValue { row: 2, .. }));
    }

    #[test]
    fn test_decimal_comma_is_malformed_value() {
        let err = SeriesValidator::new()
            .validate(&table(&[("2023-01-01", "1,5"), ("2023-01-02", "1.234,56")]))
            .unwrap_err();
        assert!(matches!(err, Error::MalformedValue { row: 1, .. }));
    }

    #[test]
    fn test_short_row_is_malformed_value() {
        let table = RawTable::new(
            vec!["ds".into(), "y".into()],
            vec![
                vec!["2023-01-01".into(), "1".into()],
                vec!["2023-01-02".into()],
            ],
        );
        let err = SeriesValidator::new().validate(&table).unwrap_err();
        assert!(matches!(err, Error::MalformedValue { row: 2, .. }));
    }

    #[test]
    fn test_duplicates_keep_last_occurrence() {
        let (series, summary) = SeriesValidator::new()
            .validate_detailed(&table(&[
                ("2023-01-02", "5"),
                ("2023-01-01", "10"),
                ("2023-01-02", "7"),
            ]))
            .unwrap();

        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0].date, date(2023, 1, 1));
        assert_eq!(series.points()[1].date, date(2023, 1, 2));
        assert_eq!(series.points()[1].value, 7.0);
        assert_eq!(summary.duplicates_dropped, 1);
        assert_eq!(summary.rows_read, 3);
        assert!(summary.reordered);
    }

    #[test]
    fn test_insufficient_distinct_dates() {
        let err = SeriesValidator::new()
            .validate(&table(&[("2023-01-01", "1"), ("2023-01-01", "2")]))
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientData { needed: 2, got: 1 }));

        let err = SeriesValidator::new().validate(&table(&[])).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { got: 0, .. }));
    }

    #[test]
    fn test_from_csv_ignores_extra_columns_and_bom() {
        let csv = "\u{feff}ds,store,y\n2023-01-01,north,10\n2023-01-02,north,12\n";
        let table = RawTable::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.headers, vec!["ds", "store", "y"]);

        let series = SeriesValidator::new().validate(&table).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.points()[0].value, 10.0);
    }

    #[test]
    fn test_custom_field_names() {
        let table = RawTable::new(
            vec!["date".into(), "sales".into()],
            vec![
                vec!["2023-01-01".into(), "1".into()],
                vec!["2023-01-02".into(), "2".into()],
            ],
        );
        let series = SeriesValidator::with_fields("date", "sales")
            .validate(&table)
            .unwrap();
        assert_eq!(series.len(), 2);
    }
}
