// src/routes.rs
use log::info;
use std::convert::Infallible;
use std::sync::Arc;
use warp::reject::Rejection;
use warp::{Filter, Reply};

use crate::handlers::error::ApiError;
use crate::handlers::{dashboard::get_dashboard, forecast::get_forecast, forecast::ForecastQuery};
use crate::services::cache::ForecastCache;

// Map our custom rejections onto structured error responses.
async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (code, kind, message) = if err.is_not_found() {
        (warp::http::StatusCode::NOT_FOUND, "not_found", "Not Found".to_string())
    } else if let Some(api_error) = err.find::<ApiError>() {
        (api_error.status(), api_error.kind_str(), api_error.message.clone())
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (
            warp::http::StatusCode::BAD_REQUEST,
            "validation_error",
            "invalid query parameters".to_string(),
        )
    } else {
        (
            warp::http::StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "Internal Server Error".to_string(),
        )
    };

    Ok(warp::reply::with_status(
        warp::reply::json(&serde_json::json!({
            "error_kind": kind,
            "message": message,
        })),
        code,
    ))
}

pub fn routes(cache: Arc<ForecastCache>) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    info!("Configuring routes...");

    let cache_filter = warp::any().map(move || cache.clone());

    let health_route = warp::path!("health")
        .and(warp::get())
        .map(|| warp::reply::json(&serde_json::json!({ "status": "ok" })));

    let dashboard_route = warp::path!("api" / "dashboard")
        .and(warp::get())
        .and(cache_filter.clone())
        .and_then(get_dashboard);

    let forecast_route = warp::path!("api" / "forecast")
        .and(warp::get())
        .and(warp::query::<ForecastQuery>())
        .and(cache_filter.clone())
        .and_then(get_forecast);

    info!("All routes configured successfully.");

    health_route
        .or(dashboard_route)
        .or(forecast_route)
        .recover(handle_rejection)
}
