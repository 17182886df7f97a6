//! Seasonal ARIMA strategy
//!
//! Orders are selected by a bounded AIC grid search unless fixed by the
//! caller. Coefficients come from Hannan-Rissanen two-stage least squares:
//! a long autoregression supplies residual estimates, then the ARMA terms
//! are fit jointly by ordinary least squares. Seasonal structure is a
//! single seasonal difference at the detected period, dropped when the
//! series cannot support it.

use crate::error::{ForecastError, Result};
use crate::metrics::normal_quantile;
use crate::models::{ForecastResult, ForecastStrategy, SeasonalMode};
use crate::seasonality;
use crate::series::TimeSeries;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

/// Seasonal ARIMA with bounded order search.
#[derive(Debug, Clone, PartialEq)]
pub struct ArimaModel {
    order: Option<(usize, usize, usize)>,
    seasonal: SeasonalMode,
    max_p: usize,
    max_d: usize,
    max_q: usize,
    confidence_level: f64,
}

impl Default for ArimaModel {
    fn default() -> Self {
        Self {
            order: None,
            seasonal: SeasonalMode::Auto,
            max_p: 2,
            max_d: 1,
            max_q: 1,
            confidence_level: 0.95,
        }
    }
}

impl ArimaModel {
    /// Create a model with auto order selection and auto seasonality.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the (p, d, q) order instead of grid-searching it.
    pub fn with_order(mut self, p: usize, d: usize, q: usize) -> Result<Self> {
        if p > 4 || d > 2 || q > 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "ARIMA order ({},{},{}) outside supported bounds (p<=4, d<=2, q<=2)",
                p, d, q
            )));
        }
        self.order = Some((p, d, q));
        Ok(self)
    }

    /// Set the seasonal mode.
    pub fn with_seasonal(mut self, seasonal: SeasonalMode) -> Self {
        self.seasonal = seasonal;
        self
    }

    /// Set the confidence level for the forecast band.
    pub fn with_confidence_level(mut self, level: f64) -> Result<Self> {
        if level <= 0.0 || level >= 1.0 {
            return Err(ForecastError::InvalidParameter(
                "Confidence level must be between 0 and 1".to_string(),
            ));
        }
        self.confidence_level = level;
        Ok(self)
    }

    fn resolve_period(&self, series: &TimeSeries) -> Option<usize> {
        let period = match self.seasonal {
            SeasonalMode::Off => None,
            SeasonalMode::Auto => {
                let (has_seasonality, period) = seasonality::detect(series, 12);
                has_seasonality.then_some(period)
            }
            SeasonalMode::Period(period) => (period >= 2).then_some(period),
        };

        // A seasonal difference eats one full period of history; drop the
        // seasonal terms when what remains is too thin to fit on.
        match period {
            Some(m) if series.len() >= 2 * m && series.len() - m >= 6 => Some(m),
            Some(m) => {
                debug!(period = m, len = series.len(), "series too short for seasonal ARIMA, dropping seasonal terms");
                None
            }
            None => None,
        }
    }
}

impl ForecastStrategy for ArimaModel {
    fn name(&self) -> &str {
        "seasonal_arima"
    }

    fn fit_and_forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        if series.len() < 4 {
            return Err(ForecastError::InsufficientHistory {
                required: 4,
                actual: series.len(),
            });
        }

        let values = series.values();
        let period = self.resolve_period(series);

        // Seasonal differencing stage, applied before regular differencing.
        let mut stages: Vec<(usize, Vec<f64>)> = Vec::new();
        let mut deseasonalized = values.to_vec();
        let seasonal_d = if let Some(m) = period {
            stages.push((m, deseasonalized.clone()));
            deseasonalized = difference(&deseasonalized, m);
            1
        } else {
            0
        };

        let candidates: Vec<(usize, usize, usize)> = match self.order {
            Some(order) => vec![order],
            None => {
                let mut orders = Vec::new();
                for d in 0..=self.max_d {
                    for p in 0..=self.max_p {
                        for q in 0..=self.max_q {
                            orders.push((p, d, q));
                        }
                    }
                }
                orders
            }
        };

        let mut best: Option<(ArmaFit, (usize, usize, usize), Vec<(usize, Vec<f64>)>, Vec<f64>)> =
            None;
        let mut any_attempted = false;
        for (p, d, q) in candidates.iter().copied() {
            let mut order_stages = stages.clone();
            let mut working = deseasonalized.clone();
            let mut feasible = true;
            for _ in 0..d {
                if working.len() < 2 {
                    feasible = false;
                    break;
                }
                order_stages.push((1, working.clone()));
                working = difference(&working, 1);
            }
            if !feasible || working.len() < p + q + 3 {
                continue;
            }
            any_attempted = true;

            if let Some(fit) = fit_arma(&working, p, q) {
                let better = match &best {
                    Some((incumbent, _, _, _)) => fit.aic < incumbent.aic,
                    None => true,
                };
                if better {
                    best = Some((fit, (p, d, q), order_stages, working));
                }
            }
        }

        let (fit, (p, d, q), order_stages, working) = best.ok_or_else(|| {
            match self.order {
                Some((p, d, q)) if !any_attempted => ForecastError::InsufficientHistory {
                    required: p + q + d + seasonal_d * period.unwrap_or(0) + 3,
                    actual: series.len(),
                },
                _ => ForecastError::ModelFitError(
                    "No ARIMA order produced a finite fit".to_string(),
                ),
            }
        })?;

        // ARMA recursion on the differenced scale, future shocks at zero.
        let mut extended = working.clone();
        let mut shocks = fit.residuals.clone();
        for _ in 0..horizon {
            let t = extended.len();
            let mut value = fit.intercept;
            for (i, coefficient) in fit.ar.iter().enumerate() {
                value += coefficient * extended[t - 1 - i];
            }
            for (j, coefficient) in fit.ma.iter().enumerate() {
                if t > j {
                    value += coefficient * shocks[t - 1 - j];
                }
            }
            extended.push(value);
            shocks.push(0.0);
        }

        // Invert the differencing pipeline, innermost stage first.
        let mut forecast_values = extended[working.len()..].to_vec();
        for (lag, base) in order_stages.iter().rev() {
            let mut rebuilt = base.clone();
            for value in &forecast_values {
                let t = rebuilt.len();
                let previous = rebuilt[t - lag];
                rebuilt.push(value + previous);
            }
            forecast_values = rebuilt[base.len()..].to_vec();
        }
        if forecast_values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFitError(
                "ARIMA forecast diverged".to_string(),
            ));
        }

        let sigma = fit.residual_std();
        let z = normal_quantile(self.confidence_level)?;
        let point: Vec<f64> = forecast_values.iter().map(|v| v.max(0.0)).collect();
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (h, value) in forecast_values.iter().enumerate() {
            let margin = z * sigma * ((h + 1) as f64).sqrt();
            lower.push((value - margin).max(0.0));
            upper.push((value + margin).max(0.0));
        }

        let periods = series.future_periods(horizon);
        let forecast = TimeSeries::from_parts(periods.clone(), point)?;
        let lower = TimeSeries::from_parts(periods.clone(), lower)?;
        let upper = TimeSeries::from_parts(periods, upper)?;

        let model_name = match period {
            Some(m) => format!("ARIMA({},{},{})(0,1,0)[{}]", p, d, q, m),
            None => format!("ARIMA({},{},{})", p, d, q),
        };

        let mut parameters = BTreeMap::new();
        parameters.insert("order".to_string(), json!([p, d, q]));
        parameters.insert(
            "seasonal_order".to_string(),
            json!([0, seasonal_d, 0, period.unwrap_or(0)]),
        );
        parameters.insert("aic".to_string(), json!(fit.aic));

        ForecastResult::new(forecast, model_name)
            .with_parameters(parameters)
            .with_confidence(lower, upper)
    }
}

/// Coefficients and diagnostics of one ARMA fit on the differenced scale.
struct ArmaFit {
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    residuals: Vec<f64>,
    sse: f64,
    aic: f64,
}

impl ArmaFit {
    fn residual_std(&self) -> f64 {
        if self.residuals.is_empty() {
            return 0.0;
        }
        (self.sse / self.residuals.len() as f64).sqrt()
    }
}

/// Lagged difference: `w[t] = v[t + lag] - v[t]`.
fn difference(values: &[f64], lag: usize) -> Vec<f64> {
    values
        .windows(lag + 1)
        .map(|window| window[lag] - window[0])
        .collect()
}

/// Hannan-Rissanen two-stage ARMA estimation. Returns `None` when the
/// candidate is infeasible on this many observations or the normal
/// equations are singular.
fn fit_arma(w: &[f64], p: usize, q: usize) -> Option<ArmaFit> {
    let n = w.len();

    if p == 0 && q == 0 {
        let intercept = w.iter().sum::<f64>() / n as f64;
        let residuals: Vec<f64> = w.iter().map(|v| v - intercept).collect();
        let sse: f64 = residuals.iter().map(|r| r * r).sum();
        return finish_fit(intercept, Vec::new(), Vec::new(), residuals, sse, n, p, q);
    }

    // Stage 1: a long autoregression approximates the shocks.
    let shocks = if q > 0 {
        let long_order = ((p + q).max(2) + 2).min((n - 1) / 2);
        let coefficients = ols_autoregression(w, long_order)?;
        let mut shocks = vec![0.0; n];
        for t in long_order..n {
            let mut predicted = coefficients[0];
            for i in 0..long_order {
                predicted += coefficients[i + 1] * w[t - 1 - i];
            }
            shocks[t] = w[t] - predicted;
        }
        shocks
    } else {
        vec![0.0; n]
    };

    // Stage 2: joint least squares on AR lags and lagged shocks.
    let start = if q > 0 {
        p.max(((p + q).max(2) + 2).min((n - 1) / 2) + q)
    } else {
        p
    };
    if n - start < p + q + 2 {
        return None;
    }

    let mut rows = Vec::with_capacity(n - start);
    let mut targets = Vec::with_capacity(n - start);
    for t in start..n {
        let mut row = Vec::with_capacity(1 + p + q);
        row.push(1.0);
        for i in 0..p {
            row.push(w[t - 1 - i]);
        }
        for j in 0..q {
            row.push(shocks[t - 1 - j]);
        }
        rows.push(row);
        targets.push(w[t]);
    }

    let solution = least_squares(&rows, &targets)?;
    let intercept = solution[0];
    let ar = solution[1..1 + p].to_vec();
    let ma = solution[1 + p..].to_vec();

    // Final residuals from the full recursive filter.
    let mut residuals = vec![0.0; n];
    let mut sse = 0.0;
    for t in p..n {
        let mut predicted = intercept;
        for (i, coefficient) in ar.iter().enumerate() {
            predicted += coefficient * w[t - 1 - i];
        }
        for (j, coefficient) in ma.iter().enumerate() {
            if t > j {
                predicted += coefficient * residuals[t - 1 - j];
            }
        }
        residuals[t] = w[t] - predicted;
        sse += residuals[t] * residuals[t];
    }

    finish_fit(intercept, ar, ma, residuals, sse, n - p, p, q)
}

#[allow(clippy::too_many_arguments)]
fn finish_fit(
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    residuals: Vec<f64>,
    sse: f64,
    n_effective: usize,
    p: usize,
    q: usize,
) -> Option<ArmaFit> {
    if !intercept.is_finite()
        || ar.iter().any(|c| !c.is_finite())
        || ma.iter().any(|c| !c.is_finite())
        || !sse.is_finite()
        || n_effective == 0
    {
        return None;
    }

    let k = (p + q + 1) as f64;
    let variance = sse / n_effective as f64;
    let aic = if variance > 0.0 {
        n_effective as f64 * variance.ln() + 2.0 * k
    } else {
        f64::NEG_INFINITY
    };

    Some(ArmaFit {
        intercept,
        ar,
        ma,
        residuals,
        sse,
        aic,
    })
}

/// OLS autoregression of the given order, intercept first.
fn ols_autoregression(w: &[f64], order: usize) -> Option<Vec<f64>> {
    let n = w.len();
    if n <= order + 1 {
        return None;
    }

    let mut rows = Vec::with_capacity(n - order);
    let mut targets = Vec::with_capacity(n - order);
    for t in order..n {
        let mut row = Vec::with_capacity(order + 1);
        row.push(1.0);
        for i in 0..order {
            row.push(w[t - 1 - i]);
        }
        rows.push(row);
        targets.push(w[t]);
    }

    least_squares(&rows, &targets)
}

/// Solve `min ||X b - y||` via the normal equations with partial-pivot
/// Gaussian elimination. `None` on a singular system.
fn least_squares(rows: &[Vec<f64>], targets: &[f64]) -> Option<Vec<f64>> {
    let k = rows.first()?.len();

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, target) in rows.iter().zip(targets.iter()) {
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in 0..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }

    // Gaussian elimination with partial pivoting on [xtx | xty].
    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|a, b| {
                xtx[*a][col]
                    .abs()
                    .partial_cmp(&xtx[*b][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })?;
        if xtx[pivot_row][col].abs() < 1e-10 {
            return None;
        }
        xtx.swap(col, pivot_row);
        xty.swap(col, pivot_row);

        for row in col + 1..k {
            let factor = xtx[row][col] / xtx[col][col];
            for j in col..k {
                xtx[row][j] -= factor * xtx[col][j];
            }
            xty[row] -= factor * xty[col];
        }
    }

    let mut solution = vec![0.0; k];
    for row in (0..k).rev() {
        let mut value = xty[row];
        for j in row + 1..k {
            value -= xtx[row][j] * solution[j];
        }
        solution[row] = value / xtx[row][row];
    }

    if solution.iter().all(|v| v.is_finite()) {
        Some(solution)
    } else {
        None
    }
}
