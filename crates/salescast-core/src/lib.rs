//! Salescast Core Library
//!
//! Sales forecasting with an optional language-model narrative:
//! - Series validation for uploaded tables (schema, dates, values, dedupe)
//! - Additive trend + seasonality forecasting with uncertainty intervals
//! - Insight composition from the forecast tail and a prompt template
//! - Pluggable completion backends (OpenAI-compatible, mock)
//! - Per-session caching of the fitted model and forecast
//! - Layered configuration and operator-supplied credentials

pub mod ai;
pub mod config;
pub mod error;
pub mod export;
pub mod forecast;
pub mod insights;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod sample;
pub mod secrets;
pub mod session;
pub mod validate;

/// Test utilities including a mock completion server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIClient, CompletionBackend, MockBackend, OpenAICompatibleBackend};
pub use config::{AppConfig, BackendKind, ForecastConfig, InsightConfig, SeasonalityMode};
pub use error::{Error, ErrorKind, Result};
pub use export::{write_forecast_csv, write_series_csv, ExportColumns};
pub use forecast::{FittedModel, ForecastEngine, ModelSummary, SeasonalComponent};
pub use insights::{InsightClient, InsightComposer};
pub use models::{
    Forecast, ForecastComponents, ForecastPoint, Granularity, InsightRequest, InsightResult,
    SeriesKey, TimeSeries, TimeSeriesPoint, ValidationSummary,
};
pub use pipeline::{Pipeline, RunReport, SeriesInput};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use secrets::Credentials;
pub use session::{CacheEntry, CacheStats, Session, SessionCache};
pub use validate::{RawTable, SeriesValidator};
