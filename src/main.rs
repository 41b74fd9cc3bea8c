use dotenv::dotenv;
use log::{error, info, warn};
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use warp::Filter;

mod config;
mod handlers;
mod models;
mod routes;
mod services;

use config::Config;
use services::cache::ForecastCache;

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    info!("Logger initialized. Starting the application...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            process::exit(1);
        }
    };
    info!(
        "Serving '{}' from {} with ARIMA{:?}",
        config.target_column,
        config.data_path.display(),
        config.order
    );

    let cache = Arc::new(ForecastCache::new(&config));

    // Warm the cache so the first request is served from memory. A failure
    // here is not fatal: the next request retries the refresh.
    if let Err(e) = cache.ensure_fresh(true).await {
        warn!("Initial refresh failed, continuing without a snapshot: {}", e);
    }

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    info!("Will bind to: {}", addr);

    // Set up CORS
    let mut cors = warp::cors()
        .allow_header("content-type")
        .allow_methods(vec!["GET"]);
    if config.allowed_origins.iter().any(|o| o == "*") {
        cors = cors.allow_any_origin();
    } else {
        cors = cors.allow_origins(config.allowed_origins.iter().map(|o| o.as_str()));
    }

    let api = routes::routes(cache).with(cors);
    info!("Routes configured successfully with CORS.");

    info!("Starting server on {}", addr);
    warp::serve(api).run(addr).await;
}
