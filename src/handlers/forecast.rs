// src/handlers/forecast.rs
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::cache::ForecastCache;

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    steps: Option<i64>,
}

#[derive(Serialize)]
struct ForecastResponse {
    steps: usize,
    pred: Vec<f64>,
}

pub async fn get_forecast(query: ForecastQuery, cache: Arc<ForecastCache>) -> Result<Json, Rejection> {
    let steps = query.steps.unwrap_or(cache.default_steps() as i64);
    info!("Handling request to get {}-step forecast", steps);

    if steps <= 0 {
        return Err(warp::reject::custom(ApiError::validation(
            "steps must be a positive integer",
        )));
    }

    let pred = cache.forecast(steps as usize).await.map_err(|e| {
        error!("Failed to compute {}-step forecast: {}", steps, e);
        warp::reject::custom(ApiError::from(e))
    })?;

    Ok(warp::reply::json(&ForecastResponse {
        steps: steps as usize,
        pred,
    }))
}
