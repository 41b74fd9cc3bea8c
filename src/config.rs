// src/config.rs
use anyhow::{bail, Context, Result};
use log::warn;
use std::env;
use std::path::PathBuf;

/// Runtime configuration, read once at startup from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_path: PathBuf,
    pub model_path: PathBuf,
    pub target_column: String,
    pub order: (usize, usize, usize),
    pub history_window: usize,
    pub forecast_steps: usize,
    pub allowed_origins: Vec<String>,
    pub save_updated_model: bool,
    pub port: u16,
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| {
        warn!("${} not set, defaulting to {}", name, default);
        default.to_string()
    })
}

pub(crate) fn parse_order(raw: &str) -> Result<(usize, usize, usize)> {
    let parts: Vec<usize> = raw
        .split(',')
        .map(|p| p.trim().parse::<usize>().context("ARIMA_ORDER components must be non-negative integers"))
        .collect::<Result<_>>()?;
    if parts.len() != 3 {
        bail!("ARIMA_ORDER must be three comma-separated integers, got '{}'", raw);
    }
    Ok((parts[0], parts[1], parts[2]))
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let data_path = PathBuf::from(var_or("DATA_PATH", "gold_and_macro_data_final.csv"));
        let model_path = PathBuf::from(var_or("MODEL_PATH", "arima_Gold_High_order_2_1_0.json"));
        let target_column = var_or("TARGET_COLUMN", "Gold_High");
        let order = parse_order(&var_or("ARIMA_ORDER", "2,1,0"))?;

        let history_window = var_or("HISTORY_WINDOW", "180")
            .parse::<usize>()
            .context("HISTORY_WINDOW must be a non-negative integer")?;
        let forecast_steps = var_or("FORECAST_STEPS", "7")
            .parse::<usize>()
            .context("FORECAST_STEPS must be a non-negative integer")?;

        let allowed_origins: Vec<String> = var_or("ALLOWED_ORIGINS", "*")
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let save_updated_model = var_or("SAVE_UPDATED_MODEL", "0") == "1";

        let port = var_or("PORT", "3030")
            .parse::<u16>()
            .context("PORT must be a number")?;

        Ok(Config {
            data_path,
            model_path,
            target_column,
            order,
            history_window,
            forecast_steps,
            allowed_origins,
            save_updated_model,
            port,
        })
    }
}
