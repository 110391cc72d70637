use std::collections::HashMap;
use std::fmt::Write;

use crate::error::{Error, Result};
use crate::models::{Forecast, ForecastPoint, InsightRequest};
use crate::prompts::{Prompt, PromptId, PromptLibrary};

/// Template variable the excerpt is substituted into
pub const FORECAST_DATA_VAR: &str = "forecast_data";

/// Header line of the excerpt table
pub const EXCERPT_HEADER: &str = "date,estimate,lower,upper";

/// Builds bounded insight requests from a forecast
///
/// Composition is pure: the same forecast tail always yields the same request.
#[derive(Debug, Clone)]
pub struct InsightComposer {
    system_prompt: String,
    template: String,
    prompt: Prompt,
}

impl InsightComposer {
    pub fn new(prompt: Prompt) -> Result<Self> {
        let system_prompt = prompt
            .system_section()
            .ok_or_else(|| {
                Error::InvalidData(format!(
                    "Prompt {} has no # System section",
                    prompt.metadata.id
                ))
            })?
            .to_string();
        let template = prompt
            .user_section()
            .ok_or_else(|| {
                Error::InvalidData(format!("Prompt {} has no # User section", prompt.metadata.id))
            })?
            .to_string();
        if !template.contains(&format!("{{{{{}}}}}", FORECAST_DATA_VAR)) {
            return Err(Error::InvalidData(format!(
                "Prompt {} does not reference {{{{{}}}}}",
                prompt.metadata.id, FORECAST_DATA_VAR
            )));
        }

        Ok(Self {
            system_prompt,
            template,
            prompt,
        })
    }

    /// Composer over the built-in template
    pub fn embedded() -> Result<Self> {
        Self::new(Prompt::embedded(PromptId::ForecastInsight)?)
    }

    /// Composer over the library's template, honoring overrides
    pub fn from_library(library: &mut PromptLibrary) -> Result<Self> {
        Self::new(library.get(PromptId::ForecastInsight)?.clone())
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub fn prompt_version(&self) -> u32 {
        self.prompt.metadata.version
    }

    /// Select the last `tail_size` points and render them into the template
    pub fn compose(&self, forecast: &Forecast, tail_size: usize) -> InsightRequest {
        let excerpt = forecast.tail(tail_size).to_vec();
        let table = format_excerpt(&excerpt);

        let mut vars = HashMap::new();
        vars.insert(FORECAST_DATA_VAR, table.as_str());

        InsightRequest {
            prompt: self.prompt.render_user(&vars),
            excerpt,
            prompt_template: self.template.clone(),
            system_prompt: self.system_prompt.clone(),
        }
    }
}

/// One header line, then `date,estimate,lower,upper` per point to two decimals
pub fn format_excerpt(points: &[ForecastPoint]) -> String {
    let mut out = String::from(EXCERPT_HEADER);
    for p in points {
        // Writing to a String cannot fail
        let _ = write!(
            out,
            "\n{},{:.2},{:.2},{:.2}",
            p.date.format("%Y-%m-%d"),
            p.estimate,
            p.lower,
            p.upper
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastEngine;
    use crate::models::{TimeSeries, TimeSeriesPoint};
    use chrono::NaiveDate;

    fn ten_point_forecast_model() -> (ForecastEngine, crate::forecast::FittedModel) {
        let series = TimeSeries::new(
            (1..=10)
                .map(|d| {
                    TimeSeriesPoint::new(
                        NaiveDate::from_ymd_opt(2023, 1, d).unwrap(),
                        99.0 + d as f64,
                    )
                })
                .collect(),
        )
        .unwrap();
        let engine = ForecastEngine::default();
        let model = engine.fit(&series).unwrap();
        (engine, model)
    }

    #[test]
    fn test_short_forecast_uses_every_point() {
        let (engine, model) = ten_point_forecast_model();
        let forecast = engine.project(&model, 1).unwrap();
        let composer = InsightComposer::embedded().unwrap();

        let request = composer.compose(&forecast, 30);
        assert_eq!(request.excerpt.len(), 11);
        assert_eq!(request.excerpt, forecast.points());
        // Header plus one line per point
        let table = format_excerpt(&request.excerpt);
        assert_eq!(table.lines().count(), 12);
        assert!(request.prompt.contains(&table));
    }

    #[test]
    fn test_tail_is_most_recent_in_order() {
        let (engine, model) = ten_point_forecast_model();
        let forecast = engine.project(&model, 30).unwrap();
        let composer = InsightComposer::embedded().unwrap();

        let request = composer.compose(&forecast, 5);
        assert_eq!(request.excerpt.len(), 5);
        assert_eq!(request.excerpt, forecast.tail(5));
        assert!(request.excerpt.windows(2).all(|w| w[0].date < w[1].date));
        // History is not sent
        assert!(!request.prompt.contains("2023-01-01,"));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let (engine, model) = ten_point_forecast_model();
        let forecast = engine.project(&model, 30).unwrap();
        let composer = InsightComposer::embedded().unwrap();

        assert_eq!(composer.compose(&forecast, 30), composer.compose(&forecast, 30));
    }

    #[test]
    fn test_request_carries_template_and_system_role() {
        let (engine, model) = ten_point_forecast_model();
        let forecast = engine.project(&model, 30).unwrap();
        let composer = InsightComposer::embedded().unwrap();

        let request = composer.compose(&forecast, 30);
        assert_eq!(request.system_prompt, "You are a senior business analyst.");
        assert!(request.prompt_template.contains("{{forecast_data}}"));
        assert!(!request.prompt.contains("{{forecast_data}}"));
        let summary = request.prompt.find("Executive Summary").unwrap();
        let trend = request.prompt.find("Trend & Pattern").unwrap();
        let risks = request.prompt.find("Risks & Opportunities").unwrap();
        let actions = request.prompt.find("Action Recommendations").unwrap();
        assert!(summary < trend && trend < risks && risks < actions);

        let trend_section = &request.prompt[trend..risks];
        assert!(trend_section.contains("up, down, or stable"));
        assert!(trend_section.contains("Weekly or seasonal patterns"));
        assert!(trend_section.contains("peaks and troughs"));
        assert_eq!(composer.prompt_version(), 2);
    }

    #[test]
    fn test_format_excerpt() {
        let points = vec![ForecastPoint {
            date: NaiveDate::from_ymd_opt(2023, 1, 11).unwrap(),
            estimate: 110.0,
            lower: 108.456,
            upper: 111.5,
        }];
        assert_eq!(
            format_excerpt(&points),
            "date,estimate,lower,upper\n2023-01-11,110.00,108.46,111.50"
        );
    }

    #[test]
    fn test_template_without_placeholder_rejected() {
        let prompt = Prompt {
            metadata: crate::prompts::PromptMetadata {
                id: "forecast_insight".into(),
                version: 1,
                task_type: "narrative".into(),
            },
            content: "# System\nAnalyst.\n\n# User\nNo data here.".into(),
            is_override: true,
            override_path: None,
        };
        assert!(matches!(
            InsightComposer::new(prompt),
            Err(Error::InvalidData(_))
        ));
    }
}
