// src/models.rs
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One row of the target series. The date axis is optional: datasets without a
/// `Date` column are addressed by integer offset instead.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    pub date: Option<NaiveDate>,
    pub value: f64,
}

impl Observation {
    /// Axis label used on the wire: ISO date when dated, row index otherwise.
    pub fn label(&self, index: usize) -> String {
        match self.date {
            Some(d) => d.to_string(),
            None => index.to_string(),
        }
    }
}

/// Ordered observations for one target column. Dates are non-decreasing and
/// values finite once the source has loaded it.
#[derive(Debug, Clone)]
pub struct Series {
    pub target: String,
    pub observations: Vec<Observation>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn values(&self) -> Vec<f64> {
        self.observations.iter().map(|o| o.value).collect()
    }

    pub fn last(&self) -> Option<&Observation> {
        self.observations.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: String,
    pub actual: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: String,
    pub pred: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDiagnostics {
    #[serde(rename = "type")]
    pub model_type: String,
    pub order: Vec<usize>,
    pub n_obs: usize,
    pub aic: Option<f64>,
    pub bic: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub refreshed_at: i64,
    pub rows: usize,
}

/// The published dashboard payload. Immutable once built; the cache hands it
/// out as `Arc<Snapshot>` so concurrent readers share one instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub target: String,
    pub latest: HistoryPoint,
    pub history: Vec<HistoryPoint>,
    pub forecast: Vec<ForecastPoint>,
    pub model: ModelDiagnostics,
    pub meta: SnapshotMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_prefers_date_over_index() {
        let dated = Observation {
            date: NaiveDate::from_ymd_opt(2024, 3, 5),
            value: 1.0,
        };
        assert_eq!(dated.label(42), "2024-03-05");

        let undated = Observation { date: None, value: 1.0 };
        assert_eq!(undated.label(42), "42");
    }

    #[test]
    fn series_values_preserve_order() {
        let series = Series {
            target: "Gold_High".to_string(),
            observations: vec![
                Observation { date: None, value: 1.0 },
                Observation { date: None, value: 2.0 },
            ],
        };
        assert_eq!(series.values(), vec![1.0, 2.0]);
        assert_eq!(series.last().map(|o| o.value), Some(2.0));
    }
}
