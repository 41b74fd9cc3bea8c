// src/services/mod.rs
pub mod arima;
pub mod cache;
pub mod error;
pub mod model_store;
pub mod payload;
pub mod source;
