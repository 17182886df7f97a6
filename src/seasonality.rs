//! Seasonality detection via classical additive decomposition
//!
//! Detection is an enhancement, never a requirement: every failure path
//! degrades to "no seasonality" instead of raising.

use crate::series::TimeSeries;
use tracing::debug;

/// Minimum ratio of seasonal-component variance to total variance for a
/// series to count as seasonal.
pub const SEASONAL_VARIANCE_THRESHOLD: f64 = 0.1;

/// Decide whether a series has a meaningful seasonal component.
///
/// Requires at least two full cycles of history; decomposes the series
/// additively with the candidate period and compares the seasonal
/// component's variance to the total variance. Returns
/// `(false, 1)` whenever detection is impossible or inconclusive.
pub fn detect(series: &TimeSeries, points_per_year: usize) -> (bool, usize) {
    let period = points_per_year;
    if period < 2 || series.len() < 2 * period {
        return (false, 1);
    }

    let total_variance = series.variance();
    if !total_variance.is_finite() || total_variance <= 0.0 {
        return (false, 1);
    }

    let seasonal = match seasonal_component(series.values(), period) {
        Some(seasonal) => seasonal,
        None => {
            debug!(period, "seasonal decomposition degenerate, assuming no seasonality");
            return (false, 1);
        }
    };

    let mean = seasonal.iter().sum::<f64>() / seasonal.len() as f64;
    let seasonal_variance = seasonal
        .iter()
        .map(|s| (s - mean).powi(2))
        .sum::<f64>()
        / seasonal.len() as f64;

    let ratio = seasonal_variance / total_variance;
    if !ratio.is_finite() {
        return (false, 1);
    }

    debug!(period, ratio, "seasonality detection");
    if ratio > SEASONAL_VARIANCE_THRESHOLD {
        (true, period)
    } else {
        (false, 1)
    }
}

/// Additive seasonal component of `values` for the given period, tiled to
/// the full series length. `None` when the decomposition cannot produce a
/// finite component.
fn seasonal_component(values: &[f64], period: usize) -> Option<Vec<f64>> {
    let trend = centered_moving_average(values, period);

    // Average the detrended values by position within the cycle.
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (t, trend_value) in trend.iter().enumerate() {
        if let Some(trend_value) = trend_value {
            let detrended = values[t] - trend_value;
            sums[t % period] += detrended;
            counts[t % period] += 1;
        }
    }

    let mut means = Vec::with_capacity(period);
    for (sum, count) in sums.iter().zip(counts.iter()) {
        if *count == 0 {
            return None;
        }
        means.push(sum / *count as f64);
    }

    // Center so the seasonal component sums to zero over one cycle.
    let grand_mean = means.iter().sum::<f64>() / period as f64;
    for mean in &mut means {
        *mean -= grand_mean;
        if !mean.is_finite() {
            return None;
        }
    }

    Some((0..values.len()).map(|t| means[t % period]).collect())
}

/// Centered moving average trend estimate. For an even window the two edge
/// points get half weight (the classical 2xm moving average). Positions
/// without a full window are `None`.
fn centered_moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let half = window / 2;
    let mut trend = vec![None; n];

    for t in half..n.saturating_sub(half) {
        let avg = if window % 2 == 0 {
            let mut sum = 0.5 * values[t - half] + 0.5 * values[t + half];
            for v in &values[t - half + 1..t + half] {
                sum += v;
            }
            sum / window as f64
        } else {
            values[t - half..=t + half].iter().sum::<f64>() / window as f64
        };
        trend[t] = Some(avg);
    }

    trend
}
