// src/services/source.rs
use chrono::NaiveDate;
use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::models::{Observation, Series};
use crate::services::error::ServiceError;

/// Cheap, comparable summary of the dataset's on-disk state. Used to decide
/// whether a refresh is necessary without reading the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceFingerprint {
    mtime: SystemTime,
    len: u64,
}

/// Reads the target column (and optional `Date` column) out of a CSV file.
pub struct CsvSource {
    path: PathBuf,
    target: String,
}

impl CsvSource {
    pub fn new(path: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        CsvSource {
            path: path.into(),
            target: target.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Probe the file without reading it. `None` when the file is absent,
    /// which still compares unequal to any recorded fingerprint.
    pub fn fingerprint(&self) -> Option<SourceFingerprint> {
        let meta = fs::metadata(&self.path).ok()?;
        let mtime = meta.modified().ok()?;
        Some(SourceFingerprint { mtime, len: meta.len() })
    }

    /// Load the full series: parse, drop rows with a missing or non-finite
    /// target value, and sort by date when a `Date` column exists.
    pub fn load(&self) -> Result<Series, ServiceError> {
        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| {
            ServiceError::DataUnavailable(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let headers = reader.headers().map_err(|e| {
            ServiceError::DataUnavailable(format!("cannot read headers of {}: {}", self.path.display(), e))
        })?;

        let date_idx = headers.iter().position(|h| h == "Date");
        let target_idx = headers.iter().position(|h| h == self.target).ok_or_else(|| {
            ServiceError::DataUnavailable(format!(
                "TARGET_COLUMN '{}' not found in {}",
                self.target,
                self.path.display()
            ))
        })?;

        let mut observations = Vec::new();
        let mut dropped = 0usize;
        for record in reader.records() {
            let record = record.map_err(|e| {
                ServiceError::DataUnavailable(format!("malformed row in {}: {}", self.path.display(), e))
            })?;

            let value = match record.get(target_idx).map(str::trim) {
                Some(raw) if !raw.is_empty() => match raw.parse::<f64>() {
                    Ok(v) if v.is_finite() => v,
                    _ => {
                        dropped += 1;
                        continue;
                    }
                },
                _ => {
                    dropped += 1;
                    continue;
                }
            };

            let date = date_idx
                .and_then(|i| record.get(i))
                .map(str::trim)
                .and_then(parse_date);

            observations.push(Observation { date, value });
        }

        if dropped > 0 {
            warn!("Dropped {} rows with missing or non-finite '{}' values", dropped, self.target);
        }

        if date_idx.is_some() {
            observations.sort_by_key(|o| o.date);
        }

        if observations.is_empty() {
            return Err(ServiceError::DataUnavailable(format!(
                "no usable observations for '{}' in {}",
                self.target,
                self.path.display()
            )));
        }

        debug!("Loaded {} observations of '{}' from {}", observations.len(), self.target, self.path.display());
        Ok(Series {
            target: self.target.clone(),
            observations,
        })
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    raw.parse::<NaiveDate>()
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
}
