//! Intervals
//!
//! Symmetric prediction intervals from the empirical quantile of the
//! calibration residuals.
use crate::calibration::store::RegressionCalibration;
use crate::errors::ConformalError;
use crate::utils::validate_error_rate;
use serde::{Deserialize, Serialize};

// Products within this many ULP of an integer are taken as that integer
// before rounding up.
const QUANTILE_SNAP_ULPS: f64 = 4.0;

/// Index of the conformal quantile in `n` sorted residuals.
///
/// `k = ceil((1 - error_rate) * (n + 1)) - 1`, clamped to `[0, n - 1]`.
pub fn quantile_index(n: usize, error_rate: f64) -> usize {
    let raw = (1.0 - error_rate) * (n as f64 + 1.0);
    let nearest = raw.round();
    let raw = if (raw - nearest).abs() <= QUANTILE_SNAP_ULPS * f64::EPSILON * nearest.abs().max(1.0) {
        nearest
    } else {
        raw
    };
    let k = raw.ceil().max(0.0) as usize;
    k.saturating_sub(1).min(n.saturating_sub(1))
}

/// A closed prediction interval.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PredictionInterval {
    pub lower: f64,
    pub upper: f64,
}

impl PredictionInterval {
    pub fn new(center: f64, half_width: f64) -> Self {
        PredictionInterval {
            lower: center - half_width,
            upper: center + half_width,
        }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

impl RegressionCalibration {
    /// Half-width of the intervals at `error_rate`.
    ///
    /// Fails with `InsufficientCalibration` without residuals.
    pub fn half_width(&self, error_rate: f64) -> Result<f64, ConformalError> {
        validate_error_rate(error_rate, "error_rate")?;
        if self.is_empty() {
            return Err(ConformalError::InsufficientCalibration("the regression residuals".to_string()));
        }
        Ok(self.residuals()[quantile_index(self.len(), error_rate)])
    }

    /// Interval around a point estimate.
    pub fn predict_interval(&self, point: f64, error_rate: f64) -> Result<PredictionInterval, ConformalError> {
        Ok(PredictionInterval::new(point, self.half_width(error_rate)?))
    }

    /// Interval around a point estimate for residuals normalized by difficulty.
    ///
    /// * `difficulty` - Difficulty estimate plus smoothing of the row, must be positive.
    pub fn predict_normalized_interval(
        &self,
        point: f64,
        difficulty: f64,
        error_rate: f64,
    ) -> Result<PredictionInterval, ConformalError> {
        if !difficulty.is_finite() || difficulty <= 0.0 {
            return Err(ConformalError::InvalidConfiguration(
                "difficulty".to_string(),
                "a positive finite value".to_string(),
                difficulty.to_string(),
            ));
        }
        Ok(PredictionInterval::new(point, self.half_width(error_rate)? * difficulty))
    }
}
