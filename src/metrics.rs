//! Accuracy metrics for forecast evaluation

use crate::error::{ForecastError, Result};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::BTreeMap;

/// Metric key for mean absolute percentage error.
pub const MAPE: &str = "MAPE";
/// Metric key for root mean squared error.
pub const RMSE: &str = "RMSE";
/// Metric key for mean absolute error.
pub const MAE: &str = "MAE";
/// Metric key for mean signed error.
pub const BIAS: &str = "Bias";
/// Metric key for cumulative bias over mean absolute deviation.
pub const TRACKING_SIGNAL: &str = "Tracking_Signal";

/// Calculate forecast accuracy metrics against actual values.
///
/// MAPE is computed over periods with non-zero actuals only and is absent
/// when every actual is zero. The tracking signal is absent when the mean
/// absolute deviation is zero.
pub fn accuracy(actual: &[f64], forecast: &[f64]) -> Result<BTreeMap<String, f64>> {
    if actual.len() != forecast.len() || actual.is_empty() {
        return Err(ForecastError::DataError(
            "Actual and forecast values must have the same non-zero length".to_string(),
        ));
    }

    let n = actual.len() as f64;
    let mut metrics = BTreeMap::new();

    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(f, a)| f - a)
        .collect();

    let nonzero: Vec<(f64, f64)> = actual
        .iter()
        .zip(errors.iter())
        .filter(|(a, _)| **a != 0.0)
        .map(|(a, e)| (*a, *e))
        .collect();
    if !nonzero.is_empty() {
        let mape = nonzero
            .iter()
            .map(|(a, e)| (e.abs() / a.abs()) * 100.0)
            .sum::<f64>()
            / nonzero.len() as f64;
        metrics.insert(MAPE.to_string(), mape);
    }

    let mse = errors.iter().map(|e| e.powi(2)).sum::<f64>() / n;
    metrics.insert(RMSE.to_string(), mse.sqrt());

    let mad = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
    metrics.insert(MAE.to_string(), mad);

    metrics.insert(BIAS.to_string(), errors.iter().sum::<f64>() / n);

    if mad > 0.0 {
        let cumulative: f64 = errors.iter().sum();
        metrics.insert(TRACKING_SIGNAL.to_string(), cumulative / mad);
    }

    Ok(metrics)
}

/// Two-sided standard-normal quantile for a confidence level.
///
/// A 0.95 level yields the familiar z of about 1.96.
pub fn normal_quantile(confidence_level: f64) -> Result<f64> {
    if confidence_level <= 0.0 || confidence_level >= 1.0 {
        return Err(ForecastError::InvalidParameter(
            "Confidence level must be between 0 and 1".to_string(),
        ));
    }

    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| ForecastError::ModelFitError(format!("Normal distribution: {}", e)))?;
    Ok(normal.inverse_cdf((1.0 + confidence_level) / 2.0))
}
