// src/handlers/error.rs
use std::fmt;
use warp::http::StatusCode;
use warp::reject::Reject;

use crate::services::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DataUnavailable,
    ModelFit,
    Forecast,
    Validation,
}

#[derive(Debug, Clone)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ApiError {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorKind::Validation, message)
    }

    pub fn status(&self) -> StatusCode {
        match self.kind {
            ErrorKind::DataUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ModelFit | ErrorKind::Forecast => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            ErrorKind::DataUnavailable => "data_unavailable",
            ErrorKind::ModelFit => "model_fit_error",
            ErrorKind::Forecast => "forecast_error",
            ErrorKind::Validation => "validation_error",
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        let kind = match err {
            ServiceError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            ServiceError::ModelFit(_) => ErrorKind::ModelFit,
            ServiceError::Forecast(_) => ErrorKind::Forecast,
        };
        ApiError::new(kind, err.to_string())
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}
impl Reject for ApiError {}
