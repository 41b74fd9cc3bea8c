// src/services/cache.rs
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::models::Snapshot;
use crate::services::arima::Forecaster;
use crate::services::error::ServiceError;
use crate::services::model_store::ModelStore;
use crate::services::payload;
use crate::services::source::{CsvSource, SourceFingerprint};

struct CacheState {
    store: ModelStore,
    fingerprint: Option<SourceFingerprint>,
    snapshot: Option<Arc<Snapshot>>,
    last_refresh: Option<DateTime<Utc>>,
}

/// Keeps the model and its derived payload consistent with the dataset while
/// serving concurrent readers.
///
/// One mutex guards the whole refresh (probe, load, reconcile, build,
/// publish), so staleness observed by many callers at once still produces
/// exactly one fit-and-build cycle; late arrivals see the fresh fingerprint
/// and take the fast path. The published snapshot is immutable and shared as
/// an `Arc`, so readers never copy it or hold the lock while using it.
pub struct ForecastCache {
    source: CsvSource,
    history_window: usize,
    forecast_steps: usize,
    state: Mutex<CacheState>,
}

impl ForecastCache {
    pub fn new(config: &Config) -> Self {
        ForecastCache {
            source: CsvSource::new(&config.data_path, &config.target_column),
            history_window: config.history_window,
            forecast_steps: config.forecast_steps,
            state: Mutex::new(CacheState {
                store: ModelStore::new(config.order, &config.model_path, config.save_updated_model),
                fingerprint: None,
                snapshot: None,
                last_refresh: None,
            }),
        }
    }

    pub fn default_steps(&self) -> usize {
        self.forecast_steps
    }

    /// Return a current snapshot, refreshing first if the source changed (or
    /// unconditionally when `force` is set). A failed refresh falls back to
    /// the last published snapshot; the error only propagates when no
    /// snapshot has ever been published.
    pub async fn ensure_fresh(&self, force: bool) -> Result<Arc<Snapshot>, ServiceError> {
        let mut state = self.state.lock().await;
        self.ensure_fresh_locked(&mut state, force)
    }

    /// Forecast `steps` values from the currently loaded model, independent
    /// of the snapshot's fixed step count. Runs the freshness check first;
    /// a failure here never touches cache state.
    pub async fn forecast(&self, steps: usize) -> Result<Vec<f64>, ServiceError> {
        let mut state = self.state.lock().await;
        self.ensure_fresh_locked(&mut state, false)?;
        match state.store.model() {
            Some(model) => model.forecast(steps),
            None => Err(ServiceError::DataUnavailable("no model has been fitted yet".to_string())),
        }
    }

    fn ensure_fresh_locked(
        &self,
        state: &mut CacheState,
        force: bool,
    ) -> Result<Arc<Snapshot>, ServiceError> {
        let fingerprint = self.source.fingerprint();

        if !force && state.fingerprint == fingerprint {
            if let Some(snapshot) = &state.snapshot {
                debug!("Source unchanged, serving published snapshot");
                return Ok(snapshot.clone());
            }
        }

        match self.refresh(state, fingerprint) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => match &state.snapshot {
                // Staleness over unavailability: keep serving the last good
                // snapshot after a failed refresh.
                Some(snapshot) => {
                    warn!("Refresh failed, serving last published snapshot: {}", e);
                    Ok(snapshot.clone())
                }
                None => Err(e),
            },
        }
    }

    fn refresh(
        &self,
        state: &mut CacheState,
        fingerprint: Option<SourceFingerprint>,
    ) -> Result<Arc<Snapshot>, ServiceError> {
        info!("Refreshing forecast cache from {}", self.source.path().display());
        let series = self.source.load()?;
        let values = series.values();
        let model = state.store.ensure_up_to_date(&values)?;
        let snapshot = Arc::new(payload::build_snapshot(
            &series,
            model,
            self.history_window,
            self.forecast_steps,
        )?);

        state.fingerprint = fingerprint;
        state.snapshot = Some(snapshot.clone());
        state.last_refresh = Some(Utc::now());
        info!("Published snapshot: {} rows, model n_obs {}", snapshot.meta.rows, snapshot.model.n_obs);
        Ok(snapshot)
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_refresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn csv_rows(n: usize) -> String {
        let mut out = String::from("Date,Gold_High\n");
        for i in 0..n {
            let day = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64);
            out.push_str(&format!("{},{}\n", day, 100.0 + i as f64 + ((i * 3 % 7) as f64)));
        }
        out
    }

    fn test_config(name: &str, rows: usize) -> Config {
        let dir = std::env::temp_dir();
        let data_path = dir.join(format!("gold_forecast_cache_{}_{}.csv", std::process::id(), name));
        fs::write(&data_path, csv_rows(rows)).unwrap();
        Config {
            data_path,
            model_path: dir.join(format!("gold_forecast_cache_{}_{}.json", std::process::id(), name)),
            target_column: "Gold_High".to_string(),
            order: (2, 1, 0),
            history_window: 180,
            forecast_steps: 7,
            allowed_origins: vec!["*".to_string()],
            save_updated_model: false,
            port: 0,
        }
    }

    fn cleanup(config: &Config) {
        fs::remove_file(&config.data_path).ok();
        fs::remove_file(&config.model_path).ok();
    }

    #[tokio::test]
    async fn fast_path_reuses_published_snapshot() {
        let config = test_config("fastpath", 30);
        let cache = ForecastCache::new(&config);

        let first = cache.ensure_fresh(false).await.unwrap();
        let second = cache.ensure_fresh(false).await.unwrap();
        // Same Arc means no rebuild happened.
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
        cleanup(&config);
    }

    #[tokio::test]
    async fn force_refresh_rebuilds_even_when_unchanged() {
        let config = test_config("force", 30);
        let cache = ForecastCache::new(&config);

        let first = cache.ensure_fresh(false).await.unwrap();
        let second = cache.ensure_fresh(true).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        cleanup(&config);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_callers_share_one_refresh() {
        let config = test_config("singleflight", 40);
        let cache = Arc::new(ForecastCache::new(&config));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            handles.push(tokio::spawn(async move { cache.ensure_fresh(false).await.unwrap() }));
        }

        let mut snapshots = Vec::new();
        for handle in handles {
            snapshots.push(handle.await.unwrap());
        }
        // Exactly one build: everyone holds the same published Arc.
        for snapshot in &snapshots[1..] {
            assert!(Arc::ptr_eq(&snapshots[0], snapshot));
        }
        cleanup(&config);
    }

    #[tokio::test]
    async fn growth_triggers_refit_with_new_observation_count() {
        let config = test_config("growth", 30);
        let cache = ForecastCache::new(&config);

        let first = cache.ensure_fresh(false).await.unwrap();
        assert_eq!(first.model.n_obs, 30);

        fs::write(&config.data_path, csv_rows(31)).unwrap();
        let second = cache.ensure_fresh(false).await.unwrap();
        assert_eq!(second.model.n_obs, 31);
        assert_eq!(second.meta.rows, 31);
        cleanup(&config);
    }

    #[tokio::test]
    async fn failed_refresh_serves_last_good_snapshot() {
        let config = test_config("nonregress", 30);
        let cache = ForecastCache::new(&config);

        let good = cache.ensure_fresh(false).await.unwrap();

        // Source disappears: the fingerprint changes, the reload fails, and
        // the previously published snapshot is still served.
        fs::remove_file(&config.data_path).unwrap();
        let served = cache.ensure_fresh(false).await.unwrap();
        assert!(Arc::ptr_eq(&good, &served));
        cleanup(&config);
    }

    #[tokio::test]
    async fn first_request_failure_propagates() {
        let config = test_config("firstfail", 30);
        fs::remove_file(&config.data_path).unwrap();

        let cache = ForecastCache::new(&config);
        let err = cache.ensure_fresh(false).await.unwrap_err();
        assert!(matches!(err, ServiceError::DataUnavailable(_)));
        cleanup(&config);
    }

    #[tokio::test]
    async fn adhoc_forecast_uses_loaded_model() {
        let config = test_config("adhoc", 30);
        let cache = ForecastCache::new(&config);

        let values = cache.forecast(12).await.unwrap();
        assert_eq!(values.len(), 12);
        assert!(cache.last_refresh().await.is_some());
        cleanup(&config);
    }

    #[tokio::test]
    async fn snapshot_forecast_has_consecutive_dates() {
        let config = test_config("dates", 30);
        let cache = ForecastCache::new(&config);

        let snapshot = cache.ensure_fresh(false).await.unwrap();
        // Data ends at 2024-01-30; the 7-step forecast runs Jan 31 .. Feb 6.
        assert_eq!(snapshot.forecast.len(), 7);
        assert_eq!(snapshot.forecast[0].date, "2024-01-31");
        assert_eq!(snapshot.forecast[6].date, "2024-02-06");
        cleanup(&config);
    }
}
