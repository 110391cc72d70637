//! Pipeline orchestration
//!
//! Wires the stages together for one user action:
//!
//! ```text
//! RawTable ──validate──▶ TimeSeries ──fit──▶ FittedModel ──project──▶ Forecast
//!                                                                        │
//!                                              compose ◀─────────────────┘
//!                                                 │
//!                                            summarize ──▶ InsightResult
//! ```
//!
//! Forecasting errors are terminal for the run and leave the session as it
//! was. Insight errors are captured in the session and never propagate.

use serde::Serialize;
use tracing::info;

use crate::ai::AIClient;
use crate::config::AppConfig;
use crate::error::{Error, ErrorKind, Result};
use crate::forecast::ForecastEngine;
use crate::insights::{InsightClient, InsightComposer};
use crate::models::{Granularity, InsightRequest, InsightResult, SeriesKey, ValidationSummary};
use crate::prompts::PromptLibrary;
use crate::sample::synthetic_series;
use crate::secrets::Credentials;
use crate::session::{CacheEntry, Session};
use crate::validate::{RawTable, SeriesValidator};

/// Where the series for a run comes from
#[derive(Debug, Clone)]
pub enum SeriesInput {
    /// A freshly uploaded table; replaces whatever the session holds
    Upload(RawTable),
    /// The series already loaded in the session, or the synthetic series if
    /// none is loaded
    Default,
    /// The synthetic series, explicitly
    Synthetic,
}

/// What a forecast run did
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub series_key: SeriesKey,
    pub used_synthetic_data: bool,
    /// The cached forecast was returned as is
    pub cache_hit: bool,
    /// A new model was fitted (false on a hit or when only the horizon changed)
    pub refit: bool,
    pub observations: usize,
    pub horizon: u32,
    pub forecast_points: usize,
    pub granularity: Granularity,
    /// Present when the series came from an upload
    pub validation: Option<ValidationSummary>,
}

/// The forecast and insight pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AppConfig,
    validator: SeriesValidator,
    engine: ForecastEngine,
    composer: InsightComposer,
    client: InsightClient,
    credentials: Option<Credentials>,
}

impl Pipeline {
    /// Build every stage from config, using the prompt library's template
    pub fn from_config(config: &AppConfig, credentials: Option<Credentials>) -> Result<Self> {
        let composer = InsightComposer::from_library(&mut PromptLibrary::new())?;
        let client = InsightClient::new(AIClient::from_config(&config.insight)?);
        Ok(Self::new(config.clone(), composer, client, credentials))
    }

    pub fn new(
        config: AppConfig,
        composer: InsightComposer,
        client: InsightClient,
        credentials: Option<Credentials>,
    ) -> Self {
        Self {
            validator: SeriesValidator::with_fields(
                &config.series.date_field,
                &config.series.value_field,
            ),
            engine: ForecastEngine::new(config.forecast.clone()),
            config,
            composer,
            client,
            credentials,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn validator(&self) -> &SeriesValidator {
        &self.validator
    }

    pub fn client(&self) -> &InsightClient {
        &self.client
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    /// Check a requested horizon against the configured bounds
    pub fn check_horizon(&self, horizon: u32) -> Result<()> {
        let (min, max) = (self.config.forecast.min_horizon, self.config.forecast.max_horizon);
        if horizon < min || horizon > max {
            return Err(Error::InvalidHorizon(format!(
                "horizon {} is outside [{}, {}]",
                horizon, min, max
            )));
        }
        Ok(())
    }

    /// Validate, fit, and project, reusing cached work where possible
    pub fn run_forecast(
        &self,
        session: &mut Session,
        input: SeriesInput,
        horizon: u32,
    ) -> Result<RunReport> {
        self.check_horizon(horizon)?;

        let (series, used_synthetic_data, validation) = match input {
            SeriesInput::Upload(table) => {
                let (series, summary) = self.validator.validate_detailed(&table)?;
                (series, false, Some(summary))
            }
            SeriesInput::Default => match session.series() {
                Some(series) => (series.clone(), session.used_synthetic_data, None),
                None => {
                    info!("No series loaded, using synthetic data");
                    (synthetic_series(), true, None)
                }
            },
            SeriesInput::Synthetic => (synthetic_series(), true, None),
        };

        let key = series.key();
        let mut refit = false;

        let (entry, cache_hit) = session.cache.get_or_compute(&key, horizon, |previous| {
            let model = match previous.filter(|p| p.key == key) {
                Some(previous) => previous.model.clone(),
                None => {
                    refit = true;
                    self.engine.fit(&series)?
                }
            };
            let forecast = self.engine.project(&model, i64::from(horizon))?;
            Ok(CacheEntry {
                key: key.clone(),
                horizon,
                series,
                model,
                forecast,
            })
        })?;

        let report = RunReport {
            series_key: key.clone(),
            used_synthetic_data,
            cache_hit,
            refit,
            observations: entry.series.len(),
            horizon,
            forecast_points: entry.forecast.len(),
            granularity: entry.forecast.granularity(),
            validation,
        };

        // A stored insight describes the previous forecast tail
        if !cache_hit {
            session.insight = None;
        }
        session.used_synthetic_data = used_synthetic_data;

        info!(
            series = %key.short(),
            horizon,
            observations = report.observations,
            cache_hit,
            refit,
            synthetic = used_synthetic_data,
            "Forecast ready"
        );

        Ok(report)
    }

    /// The request [`Pipeline::run_insight`] would send, if a forecast exists
    pub fn compose_insight(&self, session: &Session) -> Option<InsightRequest> {
        session
            .forecast()
            .map(|f| self.composer.compose(f, self.config.insight.tail_size))
    }

    /// Generate the narrative for the session's forecast
    ///
    /// The result is stored in the session and returned. Never fails; a
    /// missing forecast, missing credentials, or a service error all come
    /// back as a failure result.
    pub async fn run_insight(&self, session: &mut Session) -> InsightResult {
        let result = match self.compose_insight(session) {
            Some(request) => {
                self.client
                    .summarize(&request, self.credentials.as_ref())
                    .await
            }
            None => InsightResult::failure(
                ErrorKind::InsufficientData,
                "No forecast in this session yet; run a forecast first",
            ),
        };

        session.insight = Some(result.clone());
        result
    }
}
