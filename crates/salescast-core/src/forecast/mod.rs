//! Forecast engine: additive trend + seasonality model with uncertainty intervals
//!
//! The model is `y(t) = trend(t) + weekly(t) + yearly(t) + ε` where the trend
//! is piecewise linear with changepoints and the seasonal parts are Fourier
//! series. Coefficients are estimated by ridge-penalized least squares, which
//! makes fitting deterministic: the same series and config always give the
//! same model.
//!
//! Interval half-width combines residual noise with trend uncertainty that
//! grows with distance past the last observation, sized from how much the
//! trend changed historically.
//!
//! ```rust,ignore
//! let engine = ForecastEngine::new(ForecastConfig::default());
//! let model = engine.fit(&series)?;
//! let forecast = engine.project(&model, 90)?;
//! ```

mod design;
mod linalg;

pub use design::SeasonalComponent;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::config::{ForecastConfig, SeasonalityMode};
use crate::error::{Error, Result};
use crate::models::{Forecast, ForecastComponents, ForecastPoint, Granularity, TimeSeries};

use design::{place_changepoints, Design, Seasonality};
use linalg::{quantile_normal, solve_symmetric};

/// Weekly seasonality is only identifiable with at least two full weeks
const MIN_DAYS_FOR_WEEKLY: i64 = 14;
/// Yearly seasonality is only identifiable with at least two full years
const MIN_DAYS_FOR_YEARLY: i64 = 730;

/// Fits models and projects forecasts
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    config: ForecastConfig,
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Fit the model on a validated series
    ///
    /// Fails with `FitFailed` on a constant series or when the penalized
    /// normal equations cannot be solved, and with `Config` when the model
    /// settings are out of range.
    pub fn fit(&self, series: &TimeSeries) -> Result<FittedModel> {
        self.config.validate()?;
        let values: Vec<f64> = series.values().collect();
        let dates: Vec<NaiveDate> = series.dates().collect();

        let first = values[0];
        if values.iter().all(|v| *v == first) {
            return Err(Error::FitFailed(format!(
                "series is constant ({}); trend and seasonality cannot be estimated",
                first
            )));
        }

        let y_scale = values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let start = series.first_date();
        let span_days = series.span_days();
        let span = span_days as f64;
        let granularity = series.granularity();

        let t: Vec<f64> = dates
            .iter()
            .map(|d| (*d - start).num_days() as f64 / span)
            .collect();
        let days: Vec<f64> = dates.iter().map(day_number).collect();

        let design = Design {
            changepoints: place_changepoints(
                &t,
                self.config.n_changepoints,
                self.config.changepoint_range,
            ),
            seasonalities: self.seasonalities_for(span_days, granularity),
        };

        let p = design.n_columns();
        let mut xtx = vec![vec![0.0; p]; p];
        let mut xty = vec![0.0; p];
        let rows: Vec<Vec<f64>> = t
            .iter()
            .zip(&days)
            .map(|(t, day)| design.row(*t, *day))
            .collect();

        for (row, value) in rows.iter().zip(&values) {
            let y = value / y_scale;
            for i in 0..p {
                xty[i] += row[i] * y;
                for j in 0..=i {
                    xtx[i][j] += row[i] * row[j];
                }
            }
        }
        for i in 0..p {
            for j in 0..i {
                xtx[j][i] = xtx[i][j];
            }
        }
        let penalties = design.penalties(
            self.config.changepoint_penalty,
            self.config.seasonality_penalty,
        );
        for (i, penalty) in penalties.iter().enumerate() {
            xtx[i][i] += penalty;
        }

        let beta = solve_symmetric(&xtx, &xty).ok_or_else(|| {
            Error::FitFailed("normal equations are not positive definite".into())
        })?;
        if beta.iter().any(|b| !b.is_finite()) {
            return Err(Error::FitFailed("non-finite model coefficients".into()));
        }

        let sse: f64 = rows
            .iter()
            .zip(&values)
            .map(|(row, value)| {
                let fitted: f64 = row.iter().zip(&beta).map(|(x, b)| x * b).sum();
                (value / y_scale - fitted).powi(2)
            })
            .sum();
        let dof = values.len().saturating_sub(2).max(1);
        let sigma = (sse / dof as f64).sqrt();
        if !sigma.is_finite() {
            return Err(Error::FitFailed("residual variance is not finite".into()));
        }

        let n_cp = design.changepoints.len();
        let delta_scale = if n_cp > 0 {
            beta[2..2 + n_cp].iter().map(|d| d.abs()).sum::<f64>() / n_cp as f64
        } else {
            0.0
        };

        let z = quantile_normal(0.5 + self.config.interval_width / 2.0);

        debug!(
            observations = values.len(),
            changepoints = n_cp,
            seasonalities = ?design.seasonalities.iter().map(|s| s.component.as_str()).collect::<Vec<_>>(),
            sigma = sigma * y_scale,
            "Fitted forecast model"
        );

        Ok(FittedModel {
            design,
            beta,
            start,
            span_days: span,
            y_scale,
            sigma,
            delta_scale,
            z,
            history: dates,
            granularity,
        })
    }

    /// Forecast the history plus `horizon` future periods
    ///
    /// Returns `len(history) + horizon` points. The caller is responsible for
    /// checking the horizon against the configured bounds; this only rejects
    /// non-positive values.
    pub fn project(&self, model: &FittedModel, horizon: i64) -> Result<Forecast> {
        model.project(horizon)
    }

    fn seasonalities_for(&self, span_days: i64, granularity: Granularity) -> Vec<Seasonality> {
        let mut seasonalities = Vec::new();

        let weekly = match self.config.weekly_seasonality {
            SeasonalityMode::Auto => {
                span_days >= MIN_DAYS_FOR_WEEKLY && granularity.period_days() < 7.0
            }
            SeasonalityMode::Enabled => true,
            SeasonalityMode::Disabled => false,
        };
        if weekly && self.config.weekly_order > 0 {
            seasonalities.push(Seasonality {
                component: SeasonalComponent::Weekly,
                order: self.config.weekly_order,
            });
        }

        let yearly = match self.config.yearly_seasonality {
            SeasonalityMode::Auto => span_days >= MIN_DAYS_FOR_YEARLY,
            SeasonalityMode::Enabled => true,
            SeasonalityMode::Disabled => false,
        };
        if yearly && self.config.yearly_order > 0 {
            seasonalities.push(Seasonality {
                component: SeasonalComponent::Yearly,
                order: self.config.yearly_order,
            });
        }

        seasonalities
    }
}

/// A fitted model; immutable after [`ForecastEngine::fit`]
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    design: Design,
    beta: Vec<f64>,
    start: NaiveDate,
    span_days: f64,
    /// Values are divided by this before fitting
    y_scale: f64,
    /// Residual standard deviation, scaled units
    sigma: f64,
    /// Mean absolute changepoint slope adjustment, scaled units
    delta_scale: f64,
    /// Normal quantile for the configured interval width
    z: f64,
    history: Vec<NaiveDate>,
    granularity: Granularity,
}

impl FittedModel {
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn n_observations(&self) -> usize {
        self.history.len()
    }

    pub fn summary(&self) -> ModelSummary {
        let n_cp = self.design.changepoints.len();
        let final_slope: f64 = self.beta[1] + self.beta[2..2 + n_cp].iter().sum::<f64>();
        ModelSummary {
            observations: self.history.len(),
            granularity: self.granularity,
            changepoints: n_cp,
            seasonalities: self
                .design
                .seasonalities
                .iter()
                .map(|s| s.component)
                .collect(),
            growth_per_period: final_slope * self.y_scale / self.span_days
                * self.granularity.period_days(),
            residual_sigma: self.sigma * self.y_scale,
        }
    }

    fn project(&self, horizon: i64) -> Result<Forecast> {
        if horizon <= 0 {
            return Err(Error::InvalidHorizon(format!(
                "horizon must be positive, got {}",
                horizon
            )));
        }
        let steps = u32::try_from(horizon)
            .map_err(|_| Error::InvalidHorizon(format!("horizon {} is too large", horizon)))?;

        let last = self.history[self.history.len() - 1];
        let mut dates = self.history.clone();
        dates.reserve(steps as usize);
        for step in 1..=steps {
            let date = self.granularity.advance(last, step).ok_or_else(|| {
                Error::InvalidHorizon(format!(
                    "horizon {} runs past the supported calendar range",
                    horizon
                ))
            })?;
            dates.push(date);
        }

        let n_cp = self.design.changepoints.len() as f64;
        let mut points = Vec::with_capacity(dates.len());
        let mut components = Vec::with_capacity(dates.len());

        for date in dates {
            let t = (date - self.start).num_days() as f64 / self.span_days;
            let parts = self.design.decompose(&self.beta, t, day_number(&date));

            // Future slope changes arrive at the historical rate with the
            // historical magnitude; their effect on the level grows as (t-1)^3.
            let trend_sd = if t > 1.0 {
                self.delta_scale * (2.0 * n_cp * (t - 1.0).powi(3) / 3.0).sqrt()
            } else {
                0.0
            };
            let half_width = self.z * (self.sigma.powi(2) + trend_sd.powi(2)).sqrt() * self.y_scale;
            let estimate = parts.total() * self.y_scale;

            points.push(ForecastPoint {
                date,
                estimate,
                lower: estimate - half_width,
                upper: estimate + half_width,
            });
            components.push(ForecastComponents {
                date,
                trend: parts.trend * self.y_scale,
                weekly: parts.weekly * self.y_scale,
                yearly: parts.yearly * self.y_scale,
            });
        }

        if points
            .iter()
            .any(|p| !(p.estimate.is_finite() && p.lower.is_finite() && p.upper.is_finite()))
        {
            return Err(Error::FitFailed(
                "projection overflowed; values are too large to forecast".into(),
            ));
        }

        Ok(Forecast::new(
            points,
            components,
            self.history.len(),
            self.granularity,
        ))
    }
}

/// Human-readable facts about a fitted model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSummary {
    pub observations: usize,
    pub granularity: Granularity,
    pub changepoints: usize,
    pub seasonalities: Vec<SeasonalComponent>,
    /// Trend change per period at the end of the history
    pub growth_per_period: f64,
    /// Residual standard deviation in series units
    pub residual_sigma: f64,
}

fn day_number(date: &NaiveDate) -> f64 {
    use chrono::Datelike;
    f64::from(date.num_days_from_ce())
}
