//! Application configuration
//!
//! Config is loaded in layers:
//! 1. Embedded defaults (compiled into binary from `config/salescast.toml`)
//! 2. An override file: an explicit path, else `<config_dir>/salescast/config.toml`
//! 3. Environment overrides (`SALESCAST_BACKEND`, `SALESCAST_BASE_URL`, `SALESCAST_MODEL`)
//!
//! Override files may be partial; only the keys they set are replaced.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::validate::{DEFAULT_DATE_FIELD, DEFAULT_VALUE_FIELD};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/salescast.toml");

/// Whether a seasonal component is fitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonalityMode {
    /// Fit when the history is long enough to identify it
    Auto,
    Enabled,
    Disabled,
}

impl std::str::FromStr for SeasonalityMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "enabled" | "on" | "true" => Ok(Self::Enabled),
            "disabled" | "off" | "false" => Ok(Self::Disabled),
            _ => Err(format!("Unknown seasonality mode: {}", s)),
        }
    }
}

/// Column names of the uploaded table
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesConfig {
    pub date_field: String,
    pub value_field: String,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            date_field: DEFAULT_DATE_FIELD.to_string(),
            value_field: DEFAULT_VALUE_FIELD.to_string(),
        }
    }
}

/// Forecast model and horizon settings
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Smallest horizon a caller may request
    pub min_horizon: u32,
    /// Largest horizon a caller may request
    pub max_horizon: u32,
    /// Horizon used when the caller does not pick one
    pub default_horizon: u32,
    /// Coverage of the uncertainty interval, in (0, 1)
    pub interval_width: f64,
    pub weekly_seasonality: SeasonalityMode,
    pub yearly_seasonality: SeasonalityMode,
    /// Fourier order of the weekly component
    pub weekly_order: usize,
    /// Fourier order of the yearly component
    pub yearly_order: usize,
    /// Maximum number of trend changepoints
    pub n_changepoints: usize,
    /// Fraction of history changepoints may be placed in
    pub changepoint_range: f64,
    /// Ridge penalty on changepoint slope adjustments
    pub changepoint_penalty: f64,
    /// Ridge penalty on seasonal coefficients
    pub seasonality_penalty: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            min_horizon: 30,
            max_horizon: 365,
            default_horizon: 90,
            interval_width: 0.8,
            weekly_seasonality: SeasonalityMode::Auto,
            yearly_seasonality: SeasonalityMode::Auto,
            weekly_order: 3,
            yearly_order: 10,
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_penalty: 10.0,
            seasonality_penalty: 0.01,
        }
    }
}

impl ForecastConfig {
    /// Reject model settings the engine cannot fit with
    pub fn validate(&self) -> Result<()> {
        if !(self.interval_width > 0.0 && self.interval_width < 1.0) {
            return Err(Error::Config(format!(
                "interval_width must be in (0, 1), got {}",
                self.interval_width
            )));
        }
        if !(self.changepoint_range > 0.0 && self.changepoint_range <= 1.0) {
            return Err(Error::Config(format!(
                "changepoint_range must be in (0, 1], got {}",
                self.changepoint_range
            )));
        }
        if self.changepoint_penalty <= 0.0 || self.seasonality_penalty <= 0.0 {
            return Err(Error::Config("penalties must be positive".into()));
        }
        Ok(())
    }
}

/// Which completion backend serves insight requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    OpenaiCompatible,
    Mock,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai_compatible" | "openai" => Ok(Self::OpenaiCompatible),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown insight backend: {}", s)),
        }
    }
}

/// Language-model service settings
#[derive(Debug, Clone, PartialEq)]
pub struct InsightConfig {
    pub backend: BackendKind,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Number of trailing forecast points the model receives
    pub tail_size: usize,
    pub timeout: Duration,
    pub max_tokens: Option<u32>,
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::OpenaiCompatible,
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.5,
            tail_size: 30,
            timeout: Duration::from_secs(60),
            max_tokens: None,
        }
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub series: SeriesConfig,
    pub forecast: ForecastConfig,
    pub insight: InsightConfig,
}

impl AppConfig {
    /// Load config from the embedded default, an override file, and the environment
    ///
    /// An explicit `override_path` must exist; the default override location
    /// is used only if present.
    pub fn load(override_path: Option<&Path>) -> Result<Self> {
        let mut config = parse_config(DEFAULT_CONFIG)?;

        match override_path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read config {}: {}", path.display(), e))
                })?;
                config.apply_toml(&content)?;
                debug!(path = %path.display(), "Applied config override");
            }
            None => {
                if let Some(path) = default_config_path().filter(|p| p.exists()) {
                    let content = fs::read_to_string(&path).map_err(|e| {
                        Error::Config(format!("Failed to read config {}: {}", path.display(), e))
                    })?;
                    config.apply_toml(&content)?;
                    debug!(path = %path.display(), "Applied config override");
                }
            }
        }

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// The embedded defaults, without overrides
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }

    /// Apply a (possibly partial) TOML document on top of this config
    pub fn apply_toml(&mut self, content: &str) -> Result<()> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

        if let Some(series) = raw.series {
            if let Some(v) = series.date_field {
                self.series.date_field = v;
            }
            if let Some(v) = series.value_field {
                self.series.value_field = v;
            }
        }

        if let Some(f) = raw.forecast {
            let target = &mut self.forecast;
            if let Some(v) = f.min_horizon {
                target.min_horizon = v;
            }
            if let Some(v) = f.max_horizon {
                target.max_horizon = v;
            }
            if let Some(v) = f.default_horizon {
                target.default_horizon = v;
            }
            if let Some(v) = f.interval_width {
                target.interval_width = v;
            }
            if let Some(v) = f.weekly_seasonality {
                target.weekly_seasonality = v;
            }
            if let Some(v) = f.yearly_seasonality {
                target.yearly_seasonality = v;
            }
            if let Some(v) = f.weekly_order {
                target.weekly_order = v;
            }
            if let Some(v) = f.yearly_order {
                target.yearly_order = v;
            }
            if let Some(v) = f.n_changepoints {
                target.n_changepoints = v;
            }
            if let Some(v) = f.changepoint_range {
                target.changepoint_range = v;
            }
            if let Some(v) = f.changepoint_penalty {
                target.changepoint_penalty = v;
            }
            if let Some(v) = f.seasonality_penalty {
                target.seasonality_penalty = v;
            }
        }

        if let Some(i) = raw.insight {
            let target = &mut self.insight;
            if let Some(v) = i.backend {
                target.backend = v;
            }
            if let Some(v) = i.base_url {
                target.base_url = v;
            }
            if let Some(v) = i.model {
                target.model = v;
            }
            if let Some(v) = i.temperature {
                target.temperature = v;
            }
            if let Some(v) = i.tail_size {
                target.tail_size = v;
            }
            if let Some(v) = i.timeout_secs {
                target.timeout = Duration::from_secs(v);
            }
            if let Some(v) = i.max_tokens {
                target.max_tokens = Some(v);
            }
        }

        Ok(())
    }

    /// Apply environment overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(backend) = lookup("SALESCAST_BACKEND") {
            self.insight.backend = backend.parse().map_err(Error::Config)?;
        }
        if let Some(url) = lookup("SALESCAST_BASE_URL") {
            self.insight.base_url = url;
        }
        if let Some(model) = lookup("SALESCAST_MODEL") {
            self.insight.model = model;
        }
        Ok(())
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let f = &self.forecast;
        if f.min_horizon == 0 {
            return Err(Error::Config("min_horizon must be positive".into()));
        }
        if f.min_horizon > f.max_horizon {
            return Err(Error::Config(format!(
                "min_horizon ({}) exceeds max_horizon ({})",
                f.min_horizon, f.max_horizon
            )));
        }
        if f.default_horizon < f.min_horizon || f.default_horizon > f.max_horizon {
            return Err(Error::Config(format!(
                "default_horizon ({}) outside [{}, {}]",
                f.default_horizon, f.min_horizon, f.max_horizon
            )));
        }
        f.validate()?;
        if self.series.date_field.is_empty() || self.series.value_field.is_empty() {
            return Err(Error::Config("column names must not be empty".into()));
        }
        if self.insight.tail_size == 0 {
            return Err(Error::Config("tail_size must be positive".into()));
        }
        if !(0.0..=2.0).contains(&self.insight.temperature) {
            return Err(Error::Config(format!(
                "temperature must be in [0, 2], got {}",
                self.insight.temperature
            )));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("salescast").join("config.toml"))
}

fn parse_config(content: &str) -> Result<AppConfig> {
    let mut config = AppConfig::default();
    config.apply_toml(content)?;
    Ok(config)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    series: Option<RawSeries>,
    forecast: Option<RawForecast>,
    insight: Option<RawInsight>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSeries {
    date_field: Option<String>,
    value_field: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawForecast {
    min_horizon: Option<u32>,
    max_horizon: Option<u32>,
    default_horizon: Option<u32>,
    interval_width: Option<f64>,
    weekly_seasonality: Option<SeasonalityMode>,
    yearly_seasonality: Option<SeasonalityMode>,
    weekly_order: Option<usize>,
    yearly_order: Option<usize>,
    n_changepoints: Option<usize>,
    changepoint_range: Option<f64>,
    changepoint_penalty: Option<f64>,
    seasonality_penalty: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawInsight {
    backend: Option<BackendKind>,
    base_url: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    tail_size: Option<usize>,
    timeout_secs: Option<u64>,
    max_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_config_matches_defaults() {
        let config = AppConfig::embedded().unwrap();
        assert_eq!(config, AppConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_override() {
        let mut config = AppConfig::default();
        config
            .apply_toml(
                r#"
[forecast]
default_horizon = 60
yearly_seasonality = "disabled"

[insight]
model = "gpt-4o"
timeout_secs = 5
"#,
            )
            .unwrap();

        assert_eq!(config.forecast.default_horizon, 60);
        assert_eq!(config.forecast.yearly_seasonality, SeasonalityMode::Disabled);
        assert_eq!(config.forecast.min_horizon, 30);
        assert_eq!(config.insight.model, "gpt-4o");
        assert_eq!(config.insight.timeout, Duration::from_secs(5));
        assert_eq!(config.insight.tail_size, 30);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let mut config = AppConfig::default();
        let err = config.apply_toml("[forecast]\nhorizon = 5\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_env(|key| match key {
                "SALESCAST_BACKEND" => Some("mock".to_string()),
                "SALESCAST_MODEL" => Some("local-model".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.insight.backend, BackendKind::Mock);
        assert_eq!(config.insight.model, "local-model");
        assert_eq!(config.insight.base_url, "https://api.openai.com");

        let err = config
            .apply_env(|key| (key == "SALESCAST_BACKEND").then(|| "carrier-pigeon".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_inconsistent_horizons() {
        let mut config = AppConfig::default();
        config.forecast.min_horizon = 400;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.forecast.default_horizon = 10;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.forecast.interval_width = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[series]\ndate_field = \"date\"\nvalue_field = \"sales\"").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.series.date_field, "date");
        assert_eq!(config.series.value_field, "sales");
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/salescast.toml"))).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_seasonality_mode_from_str() {
        assert_eq!("AUTO".parse::<SeasonalityMode>().unwrap(), SeasonalityMode::Auto);
        assert_eq!("off".parse::<SeasonalityMode>().unwrap(), SeasonalityMode::Disabled);
        assert!("sometimes".parse::<SeasonalityMode>().is_err());
    }
}
