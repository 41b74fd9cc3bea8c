// src/services/model_store.rs
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::services::arima::{ArimaModel, Forecaster};
use crate::services::error::ServiceError;

/// Owns the single active model and decides whether a refit is needed.
///
/// The staleness test compares the model's recorded fit-observation-count with
/// the current series length. A series that edits historical values without
/// changing length therefore keeps the old model; see DESIGN.md.
pub struct ModelStore {
    order: (usize, usize, usize),
    model_path: PathBuf,
    persist_refits: bool,
    model: Option<ArimaModel>,
    tried_disk_load: bool,
}

impl ModelStore {
    pub fn new(order: (usize, usize, usize), model_path: impl Into<PathBuf>, persist_refits: bool) -> Self {
        ModelStore {
            order,
            model_path: model_path.into(),
            persist_refits,
            model: None,
            tried_disk_load: false,
        }
    }

    pub fn model(&self) -> Option<&ArimaModel> {
        self.model.as_ref()
    }

    /// Reconcile the held model against the current series. Refit when no
    /// model exists or its observation count differs from `values.len()`.
    /// A failed refit keeps whatever model was held before.
    pub fn ensure_up_to_date(&mut self, values: &[f64]) -> Result<&ArimaModel, ServiceError> {
        if self.model.is_none() && !self.tried_disk_load {
            self.tried_disk_load = true;
            match load_model(&self.model_path) {
                Ok(Some(model)) => {
                    info!("Loaded persisted model from {} (n_obs {})", self.model_path.display(), model.n_obs());
                    self.model = Some(model);
                }
                Ok(None) => debug!("No persisted model at {}", self.model_path.display()),
                Err(e) => warn!("Ignoring unreadable persisted model at {}: {}", self.model_path.display(), e),
            }
        }

        let up_to_date = self
            .model
            .as_ref()
            .map_or(false, |m| m.n_obs() == values.len());

        if !up_to_date {
            info!("Refitting ARIMA{:?} on {} observations", self.order, values.len());
            let model = ArimaModel::fit(values, self.order)?;
            if self.persist_refits {
                if let Err(e) = persist_model(&self.model_path, &model) {
                    warn!("Failed to persist refit model to {}: {}", self.model_path.display(), e);
                }
            }
            self.model = Some(model);
        }

        self.model
            .as_ref()
            .ok_or_else(|| ServiceError::ModelFit("no model available".to_string()))
    }
}

fn load_model(path: &Path) -> Result<Option<ArimaModel>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let model = serde_json::from_reader(file).with_context(|| format!("parse {}", path.display()))?;
    Ok(Some(model))
}

/// Write to a sibling temp file, flush, then atomically rename over the
/// destination so a concurrent reader never sees a half-written artifact.
fn persist_model(path: &Path, model: &ArimaModel) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let file = fs::File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, model).context("serialize model")?;
    writer.flush().context("flush model artifact")?;
    fs::rename(&tmp, path).with_context(|| format!("rename {} over {}", tmp.display(), path.display()))?;
    debug!("Persisted model to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_model_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("gold_forecast_store_{}_{}.json", std::process::id(), name))
    }

    fn series(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64 + ((i * 3 % 7) as f64)).collect()
    }

    #[test]
    fn fits_on_first_use_and_records_length() {
        let mut store = ModelStore::new((2, 1, 0), temp_model_path("first"), false);
        let model = store.ensure_up_to_date(&series(20)).unwrap();
        assert_eq!(model.n_obs(), 20);
    }

    #[test]
    fn refits_when_series_grows() {
        let mut store = ModelStore::new((2, 1, 0), temp_model_path("grow"), false);
        store.ensure_up_to_date(&series(20)).unwrap();
        let model = store.ensure_up_to_date(&series(21)).unwrap();
        assert_eq!(model.n_obs(), 21);
    }

    #[test]
    fn equal_length_reuses_model_even_if_values_changed() {
        let mut store = ModelStore::new((2, 1, 0), temp_model_path("reuse"), false);
        let first = store.ensure_up_to_date(&series(20)).unwrap().clone();

        // Same length, different values: the length heuristic keeps the model.
        let mut edited = series(20);
        edited[5] += 50.0;
        let second = store.ensure_up_to_date(&edited).unwrap();
        assert_eq!(*second, first);
    }

    #[test]
    fn failed_refit_keeps_previous_model() {
        let mut store = ModelStore::new((2, 1, 0), temp_model_path("keep"), false);
        store.ensure_up_to_date(&series(20)).unwrap();

        // Too short to fit: the refit fails but the old model survives.
        let err = store.ensure_up_to_date(&[1.0, 2.0]).unwrap_err();
        assert!(matches!(err, ServiceError::ModelFit(_)));
        assert_eq!(store.model().unwrap().n_obs(), 20);
    }

    #[test]
    fn persists_and_reloads_across_stores() {
        let path = temp_model_path("persist");
        fs::remove_file(&path).ok();

        let mut store = ModelStore::new((2, 1, 0), &path, true);
        store.ensure_up_to_date(&series(20)).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        // A fresh store with matching length picks up the artifact unchanged.
        let mut reloaded = ModelStore::new((2, 1, 0), &path, true);
        let model = reloaded.ensure_up_to_date(&series(20)).unwrap();
        assert_eq!(model.n_obs(), 20);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn corrupt_artifact_falls_back_to_refit() {
        let path = temp_model_path("corrupt");
        fs::write(&path, "not json").unwrap();

        let mut store = ModelStore::new((2, 1, 0), &path, false);
        let model = store.ensure_up_to_date(&series(20)).unwrap();
        assert_eq!(model.n_obs(), 20);

        fs::remove_file(&path).ok();
    }
}
