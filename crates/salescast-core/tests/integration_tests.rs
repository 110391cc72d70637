//! Integration tests for salescast-core
//!
//! These tests exercise the full upload → validate → forecast → insight
//! workflow, with the completion service played by a local mock server.

use chrono::NaiveDate;
use salescast_core::{
    test_utils::MockCompletionServer, AIClient, AppConfig, Credentials, ErrorKind, ExportColumns,
    ForecastEngine, InsightClient, InsightComposer, InsightResult, OpenAICompatibleBackend,
    Pipeline, RawTable, SeriesInput, SeriesValidator, Session,
};

/// Ten consecutive days, 100 through 109
fn ten_day_csv() -> String {
    let mut csv = String::from("ds,y\n");
    for d in 1..=10 {
        csv.push_str(&format!("2023-01-{:02},{}\n", d, 99 + d));
    }
    csv
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn pipeline_for(server: &MockCompletionServer, credentials: Option<Credentials>) -> Pipeline {
    let config = AppConfig::default();
    let backend = OpenAICompatibleBackend::new(&server.url(), &config.insight.model);
    Pipeline::new(
        config,
        InsightComposer::embedded().unwrap(),
        InsightClient::new(AIClient::OpenAICompatible(backend)),
        credentials,
    )
}

// =============================================================================
// Validation → Forecast
// =============================================================================

#[test]
fn test_ten_day_series_end_to_end() {
    let table = RawTable::from_csv(ten_day_csv().as_bytes()).unwrap();
    let series = SeriesValidator::new().validate(&table).unwrap();
    assert_eq!(series.len(), 10);

    let engine = ForecastEngine::default();
    let model = engine.fit(&series).unwrap();
    let forecast = engine.project(&model, 5).unwrap();

    assert_eq!(forecast.len(), 15);
    let future_dates: Vec<NaiveDate> = forecast.future().iter().map(|p| p.date).collect();
    assert_eq!(
        future_dates,
        (11..=15).map(|d| date(2023, 1, d)).collect::<Vec<_>>()
    );
    for p in forecast.points() {
        assert!(p.lower <= p.estimate && p.estimate <= p.upper);
    }

    // Projection is idempotent
    assert_eq!(engine.project(&model, 5).unwrap(), forecast);
}

#[test]
fn test_duplicate_dates_keep_later_row() {
    let csv = "ds,y\n2023-01-02,5\n2023-01-01,1\n2023-01-02,7\n2023-01-03,9\n";
    let table = RawTable::from_csv(csv.as_bytes()).unwrap();
    let (series, summary) = SeriesValidator::new().validate_detailed(&table).unwrap();

    assert_eq!(series.len(), 3);
    let jan2: Vec<f64> = series
        .points()
        .iter()
        .filter(|p| p.date == date(2023, 1, 2))
        .map(|p| p.value)
        .collect();
    assert_eq!(jan2, vec![7.0]);
    assert_eq!(summary.duplicates_dropped, 1);
    assert!(summary.reordered);
}

#[test]
fn test_missing_value_column_is_schema_mismatch() {
    let csv = "ds,revenue\n2023-01-01,1\n2023-01-02,2\n";
    let table = RawTable::from_csv(csv.as_bytes()).unwrap();
    let err = SeriesValidator::new().validate(&table).unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::SchemaMismatch));
}

#[test]
fn test_custom_column_names_from_config() {
    let mut config = AppConfig::default();
    config
        .apply_toml("[series]\ndate_field = \"Date\"\nvalue_field = \"Sales\"\n")
        .unwrap();
    let pipeline = Pipeline::new(
        config,
        InsightComposer::embedded().unwrap(),
        InsightClient::new(AIClient::mock()),
        None,
    );

    let csv = "Date,Region,Sales\n2023-01-01,EU,\"$1,200.50\"\n2023-01-02,EU,1300\n";
    let table = RawTable::from_csv(csv.as_bytes()).unwrap();
    let series = pipeline.validator().validate(&table).unwrap();
    assert_eq!(series.points()[0].value, 1200.5);
}

// =============================================================================
// Full pipeline with the completion service
// =============================================================================

#[tokio::test]
async fn test_pipeline_upload_forecast_insight() {
    let server = MockCompletionServer::start().await;
    server.set_reply("## Executive Summary\nSales grow by about one unit per day.");
    let pipeline = pipeline_for(&server, Some(Credentials::new("sk-integration").unwrap()));
    let mut session = Session::new();

    let table = RawTable::from_csv(ten_day_csv().as_bytes()).unwrap();
    let report = pipeline
        .run_forecast(&mut session, SeriesInput::Upload(table), 30)
        .unwrap();
    assert!(!report.used_synthetic_data);
    assert_eq!(report.forecast_points, 40);

    let result = pipeline.run_insight(&mut session).await;
    assert_eq!(
        result.text(),
        Some("## Executive Summary\nSales grow by about one unit per day.")
    );

    let requests = server.requests();
    assert_eq!(requests.len(), 1);
    let body = &requests[0].body;
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["temperature"], 0.5);
    assert_eq!(
        body["messages"][0]["content"],
        "You are a senior business analyst."
    );
    let user = body["messages"][1]["content"].as_str().unwrap();
    // 30 excerpt rows plus the header
    assert_eq!(
        user.lines()
            .filter(|l| l.starts_with("2023-"))
            .count(),
        30
    );
    assert!(!user.contains("2023-01-10,"));
    assert!(user.contains("2023-02-09,"));
}

#[test]
fn test_compose_short_forecast_uses_all_points() {
    let table = RawTable::from_csv(ten_day_csv().as_bytes()).unwrap();
    let series = SeriesValidator::new().validate(&table).unwrap();
    let engine = ForecastEngine::default();
    let forecast = engine.project(&engine.fit(&series).unwrap(), 5).unwrap();

    let request = InsightComposer::embedded().unwrap().compose(&forecast, 30);
    assert_eq!(request.excerpt.len(), 15);
    assert_eq!(request.excerpt, forecast.points());
}

#[tokio::test]
async fn test_missing_credentials_never_reach_the_server() {
    let server = MockCompletionServer::start().await;
    let pipeline = pipeline_for(&server, None);
    let mut session = Session::new();

    pipeline
        .run_forecast(&mut session, SeriesInput::Synthetic, 90)
        .unwrap();
    let result = pipeline.run_insight(&mut session).await;

    assert_eq!(result.failure_kind(), Some(ErrorKind::MissingCredentials));
    assert_eq!(server.request_count(), 0);
    assert!(session.forecast().is_some());
}

#[tokio::test]
async fn test_service_error_is_isolated_from_forecast() {
    let server = MockCompletionServer::start().await;
    server.fail_with(500);
    let pipeline = pipeline_for(&server, Some(Credentials::new("sk-integration").unwrap()));
    let mut session = Session::new();

    let report = pipeline
        .run_forecast(&mut session, SeriesInput::Default, 90)
        .unwrap();
    assert!(report.used_synthetic_data);

    let result = pipeline.run_insight(&mut session).await;
    match &result {
        InsightResult::Failure { kind, detail } => {
            assert_eq!(*kind, ErrorKind::ServiceError);
            assert!(detail.contains("500"), "detail: {}", detail);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    // No automatic retry
    assert_eq!(server.request_count(), 1);
    assert_eq!(session.forecast().unwrap().len(), 365 + 90);
    assert_eq!(session.insight(), Some(&result));
}

// =============================================================================
// Config + export
// =============================================================================

#[test]
fn test_config_file_drives_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[forecast]\nmin_horizon = 7\nmax_horizon = 14\ndefault_horizon = 7\n\n[insight]\nbackend = \"mock\"\ntail_size = 10\n",
    )
    .unwrap();

    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.forecast.max_horizon, 14);

    let pipeline = Pipeline::from_config(&config, None).unwrap();
    let mut session = Session::new();
    assert_eq!(
        pipeline
            .run_forecast(&mut session, SeriesInput::Synthetic, 30)
            .unwrap_err()
            .kind(),
        Some(ErrorKind::InvalidHorizon)
    );

    pipeline
        .run_forecast(&mut session, SeriesInput::Synthetic, 14)
        .unwrap();
    let request = pipeline.compose_insight(&session).unwrap();
    assert_eq!(request.excerpt.len(), 10);
}

#[test]
fn test_export_after_run() {
    let pipeline = Pipeline::new(
        AppConfig::default(),
        InsightComposer::embedded().unwrap(),
        InsightClient::new(AIClient::mock()),
        None,
    );
    let mut session = Session::new();
    pipeline
        .run_forecast(&mut session, SeriesInput::Synthetic, 30)
        .unwrap();

    let mut buf = Vec::new();
    let rows = salescast_core::write_forecast_csv(
        session.forecast().unwrap(),
        &mut buf,
        ExportColumns::Standard,
    )
    .unwrap();
    assert_eq!(rows, 395);

    let text = String::from_utf8(buf).unwrap();
    assert!(text.starts_with("ds,yhat,yhat_lower,yhat_upper\n2023-01-01,"));
    assert!(text.trim_end().lines().last().unwrap().starts_with("2024-01-30,"));
}
