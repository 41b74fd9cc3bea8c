// src/services/arima.rs
use log::debug;
use serde::{Deserialize, Serialize};

use crate::services::error::ServiceError;

/// Capability surface the cache needs from a fitted model. Concrete adapters
/// are swappable; the crate ships `ArimaModel`.
pub trait Forecaster: Send + Sync {
    fn forecast(&self, steps: usize) -> Result<Vec<f64>, ServiceError>;
    /// Number of observations the model was fit on.
    fn n_obs(&self) -> usize;
    fn order(&self) -> (usize, usize, usize);
    fn aic(&self) -> Option<f64>;
    fn bic(&self) -> Option<f64>;
}

/// ARIMA(p, d, 0) fit by conditional least squares: difference the series `d`
/// times, then regress each value on its `p` predecessors. Moving-average
/// terms are not supported.
///
/// The struct carries everything forecasting needs, so a deserialized model
/// forecasts identically to a freshly fitted one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArimaModel {
    order: (usize, usize, usize),
    /// AR coefficients, most recent lag first.
    coeffs: Vec<f64>,
    intercept: f64,
    /// Last `p` values of the fully differenced series, oldest first.
    diff_tail: Vec<f64>,
    /// Last value of the series at each differencing depth 0..d.
    level_tail: Vec<f64>,
    n_obs: usize,
    sigma2: f64,
    aic: f64,
    bic: f64,
}

const PIVOT_RIDGE: f64 = 1e-8;

impl ArimaModel {
    pub fn fit(values: &[f64], order: (usize, usize, usize)) -> Result<Self, ServiceError> {
        let (p, d, q) = order;
        if q != 0 {
            return Err(ServiceError::ModelFit(format!(
                "moving-average terms are not supported (order {:?})",
                order
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ServiceError::ModelFit("series contains non-finite values".to_string()));
        }

        let mut diffed = values.to_vec();
        let mut level_tail = Vec::with_capacity(d);
        for _ in 0..d {
            match diffed.last() {
                Some(&last) => level_tail.push(last),
                None => break,
            }
            diffed = difference(&diffed);
        }

        let rows = diffed.len().saturating_sub(p);
        if rows < p + 1 {
            return Err(ServiceError::ModelFit(format!(
                "series of length {} is too short for ARIMA{:?}",
                values.len(),
                order
            )));
        }

        // Normal equations over [1, y_{t-1}, ..., y_{t-p}].
        let k = p + 1;
        let mut xtx = vec![vec![0.0f64; k]; k];
        let mut xty = vec![0.0f64; k];
        let mut row = vec![0.0f64; k];
        for t in p..diffed.len() {
            row[0] = 1.0;
            for lag in 1..=p {
                row[lag] = diffed[t - lag];
            }
            for i in 0..k {
                xty[i] += row[i] * diffed[t];
                for j in 0..k {
                    xtx[i][j] += row[i] * row[j];
                }
            }
        }

        let beta = solve_normal_equations(xtx, xty)?;
        let intercept = beta[0];
        let coeffs: Vec<f64> = beta[1..].to_vec();

        let mut sse = 0.0;
        for t in p..diffed.len() {
            let mut pred = intercept;
            for (i, c) in coeffs.iter().enumerate() {
                pred += c * diffed[t - 1 - i];
            }
            let resid = diffed[t] - pred;
            sse += resid * resid;
        }

        let m = rows as f64;
        let sigma2 = (sse / m).max(f64::MIN_POSITIVE);
        // Conditional-least-squares information criteria; parameter count is
        // the AR terms, the intercept, and the innovation variance.
        let n_params = (p + 2) as f64;
        let aic = m * sigma2.ln() + 2.0 * n_params;
        let bic = m * sigma2.ln() + n_params * m.ln();

        let diff_tail = diffed[diffed.len() - p..].to_vec();
        debug!(
            "Fitted ARIMA{:?} on {} observations (sigma2 {:.6}, aic {:.2})",
            order,
            values.len(),
            sigma2,
            aic
        );

        Ok(ArimaModel {
            order,
            coeffs,
            intercept,
            diff_tail,
            level_tail,
            n_obs: values.len(),
            sigma2,
            aic,
            bic,
        })
    }
}

impl Forecaster for ArimaModel {
    fn forecast(&self, steps: usize) -> Result<Vec<f64>, ServiceError> {
        let mut tail = self.diff_tail.clone();
        let mut levels = self.level_tail.clone();
        let mut out = Vec::with_capacity(steps);

        for step in 0..steps {
            let mut next = self.intercept;
            for (i, c) in self.coeffs.iter().enumerate() {
                next += c * tail[tail.len() - 1 - i];
            }
            if !self.coeffs.is_empty() {
                tail.push(next);
            }

            // Undo the differencing: levels[j] holds the latest value of the
            // j-times-differenced series, with j = 0 the original scale.
            let mut value = next;
            for level in levels.iter_mut().rev() {
                value += *level;
                *level = value;
            }

            if !value.is_finite() {
                return Err(ServiceError::Forecast(format!(
                    "forecast diverged to a non-finite value at step {}",
                    step + 1
                )));
            }
            out.push(value);
        }

        Ok(out)
    }

    fn n_obs(&self) -> usize {
        self.n_obs
    }

    fn order(&self) -> (usize, usize, usize) {
        self.order
    }

    fn aic(&self) -> Option<f64> {
        self.aic.is_finite().then_some(self.aic)
    }

    fn bic(&self) -> Option<f64> {
        self.bic.is_finite().then_some(self.bic)
    }
}

fn difference(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| w[1] - w[0]).collect()
}

/// Gaussian elimination with partial pivoting. A small ridge term keeps
/// degenerate designs (constant or collinear lag columns) solvable instead of
/// failing the whole refresh.
fn solve_normal_equations(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>, ServiceError> {
    let k = b.len();
    let scale = (0..k).map(|i| a[i][i].abs()).fold(1.0f64, f64::max);
    for (i, row) in a.iter_mut().enumerate() {
        row[i] += PIVOT_RIDGE * scale;
    }

    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|&r1, &r2| a[r1][col].abs().total_cmp(&a[r2][col].abs()))
            .unwrap_or(col);
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);

        let pivot = a[col][col];
        if pivot.abs() < f64::MIN_POSITIVE {
            return Err(ServiceError::ModelFit("singular design matrix".to_string()));
        }
        for row in col + 1..k {
            let factor = a[row][col] / pivot;
            for j in col..k {
                a[row][j] -= factor * a[col][j];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0f64; k];
    for col in (0..k).rev() {
        let mut sum = b[col];
        for j in col + 1..k {
            sum -= a[col][j] * x[j];
        }
        x[col] = sum / a[col][col];
    }

    if x.iter().any(|v| !v.is_finite()) {
        return Err(ServiceError::ModelFit("fit produced non-finite coefficients".to_string()));
    }
    Ok(x)
}
