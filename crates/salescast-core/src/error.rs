//! Error types for salescast

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure taxonomy surfaced to the UI collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    SchemaMismatch,
    MalformedDate,
    MalformedValue,
    InsufficientData,
    InvalidHorizon,
    FitFailed,
    MissingCredentials,
    ServiceError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SchemaMismatch => "schema_mismatch",
            Self::MalformedDate => "malformed_date",
            Self::MalformedValue => "malformed_value",
            Self::InsufficientData => "insufficient_data",
            Self::InvalidHorizon => "invalid_horizon",
            Self::FitFailed => "fit_failed",
            Self::MissingCredentials => "missing_credentials",
            Self::ServiceError => "service_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Malformed date in row {row}: {value:?}")]
    MalformedDate { row: usize, value: String },

    #[error("Malformed value in row {row}: {value:?}")]
    MalformedValue { row: usize, value: String },

    #[error("Insufficient data: need at least {needed} distinct dates, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Invalid horizon: {0}")]
    InvalidHorizon(String),

    #[error("Model fit failed: {0}")]
    FitFailed(String),

    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("Completion service error: {0}")]
    Service(String),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl Error {
    /// Map this error onto the pipeline's failure taxonomy
    ///
    /// Configuration and local IO problems have no kind: they are operator
    /// errors, not outcomes of a pipeline run.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::SchemaMismatch(_) | Self::Csv(_) => Some(ErrorKind::SchemaMismatch),
            Self::MalformedDate { .. } => Some(ErrorKind::MalformedDate),
            Self::MalformedValue { .. } => Some(ErrorKind::MalformedValue),
            Self::InsufficientData { .. } => Some(ErrorKind::InsufficientData),
            Self::InvalidHorizon(_) => Some(ErrorKind::InvalidHorizon),
            Self::FitFailed(_) => Some(ErrorKind::FitFailed),
            Self::MissingCredentials(_) => Some(ErrorKind::MissingCredentials),
            Self::Service(_) | Self::Http(_) | Self::Json(_) => Some(ErrorKind::ServiceError),
            Self::Io(_) | Self::Config(_) | Self::InvalidData(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
