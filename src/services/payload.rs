// src/services/payload.rs
use chrono::{Duration, Utc};

use crate::models::{ForecastPoint, HistoryPoint, ModelDiagnostics, Series, Snapshot, SnapshotMeta};
use crate::services::arima::Forecaster;
use crate::services::error::ServiceError;

/// Pure transformation from a (series, model) pair to the published payload.
/// Fails whole: a forecast error produces no partial snapshot.
pub fn build_snapshot(
    series: &Series,
    model: &dyn Forecaster,
    history_window: usize,
    steps: usize,
) -> Result<Snapshot, ServiceError> {
    let n = series.len();
    let latest = series.last().ok_or_else(|| {
        ServiceError::DataUnavailable(format!("series '{}' is empty", series.target))
    })?;

    let start = n.saturating_sub(history_window);
    let history: Vec<HistoryPoint> = series.observations[start..]
        .iter()
        .enumerate()
        .map(|(offset, obs)| HistoryPoint {
            date: obs.label(start + offset),
            actual: obs.value,
        })
        .collect();

    let predicted = model.forecast(steps)?;
    let forecast: Vec<ForecastPoint> = predicted
        .into_iter()
        .enumerate()
        .map(|(k, pred)| {
            let date = match latest.date {
                // Calendar days, ignoring non-trading days.
                Some(last) => (last + Duration::days(k as i64 + 1)).to_string(),
                None => (n + k).to_string(),
            };
            ForecastPoint { date, pred }
        })
        .collect();

    let (p, d, q) = model.order();
    Ok(Snapshot {
        target: series.target.clone(),
        latest: HistoryPoint {
            date: latest.label(n - 1),
            actual: latest.value,
        },
        history,
        forecast,
        model: ModelDiagnostics {
            model_type: "ARIMA".to_string(),
            order: vec![p, d, q],
            n_obs: model.n_obs(),
            aic: model.aic(),
            bic: model.bic(),
        },
        meta: SnapshotMeta {
            refreshed_at: Utc::now().timestamp(),
            rows: n,
        },
    })
}
