// src/handlers/dashboard.rs
use log::{error, info};
use std::sync::Arc;
use warp::reply::Json;
use warp::Rejection;

use super::error::ApiError;
use crate::services::cache::ForecastCache;

pub async fn get_dashboard(cache: Arc<ForecastCache>) -> Result<Json, Rejection> {
    info!("Handling request to get dashboard snapshot");

    let snapshot = cache.ensure_fresh(false).await.map_err(|e| {
        error!("Failed to refresh dashboard snapshot: {}", e);
        warp::reject::custom(ApiError::from(e))
    })?;

    Ok(warp::reply::json(&*snapshot))
}
