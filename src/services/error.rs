// src/services/error.rs
use std::error::Error;
use std::fmt;

/// Failures raised while refreshing or querying the forecast cache. A refresh
/// failure never invalidates an already-published snapshot; callers decide
/// whether to fall back or surface the error.
#[derive(Debug, Clone)]
pub enum ServiceError {
    /// Source file missing/unreadable, target column absent, or no usable rows.
    DataUnavailable(String),
    /// Refitting the model against the current series failed.
    ModelFit(String),
    /// Forecasting from an otherwise valid model failed.
    Forecast(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::DataUnavailable(msg) => write!(f, "data unavailable: {}", msg),
            ServiceError::ModelFit(msg) => write!(f, "model fit failed: {}", msg),
            ServiceError::Forecast(msg) => write!(f, "forecast failed: {}", msg),
        }
    }
}

impl Error for ServiceError {}
