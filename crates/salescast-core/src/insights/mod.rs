//! Forecast insights: turning a forecast into a business narrative
//!
//! Two steps with a hard boundary between them:
//!
//! - [`InsightComposer`] picks the most recent forecast points and renders
//!   them into the analytical prompt. Pure, no IO.
//! - [`InsightClient`] sends the composed request to the completion service
//!   and folds every failure into an [`InsightResult`](crate::InsightResult).
//!
//! Only the excerpt ever leaves the process; the full history and forecast
//! stay local.

mod client;
mod composer;

pub use client::InsightClient;
pub use composer::{format_excerpt, InsightComposer, EXCERPT_HEADER, FORECAST_DATA_VAR};
