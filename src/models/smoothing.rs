//! Exponential smoothing (Holt-Winters) strategy

use crate::error::{ForecastError, Result};
use crate::metrics::normal_quantile;
use crate::models::{ForecastResult, ForecastStrategy, SeasonalMode};
use crate::seasonality;
use crate::series::TimeSeries;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

const ALPHA_GRID: [f64; 7] = [0.05, 0.1, 0.2, 0.3, 0.5, 0.7, 0.9];
const BETA_GRID: [f64; 4] = [0.01, 0.05, 0.1, 0.2];
const GAMMA_GRID: [f64; 4] = [0.05, 0.1, 0.2, 0.3];

/// Damped additive Holt-Winters exponential smoothing.
///
/// Smoothing weights left unset are grid-searched over a small fixed grid
/// by one-step-ahead squared error. The seasonal component follows
/// [`SeasonalMode`]; with `Auto` the seasonality detector decides.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingModel {
    alpha: Option<f64>,
    beta: Option<f64>,
    gamma: Option<f64>,
    damping: f64,
    seasonal: SeasonalMode,
    confidence_level: f64,
}

impl Default for SmoothingModel {
    fn default() -> Self {
        Self {
            alpha: None,
            beta: None,
            gamma: None,
            damping: 0.98,
            seasonal: SeasonalMode::Auto,
            confidence_level: 0.95,
        }
    }
}

impl SmoothingModel {
    /// Create a model with all defaults (auto weights, auto seasonality).
    pub fn new() -> Self {
        Self::default()
    }

    /// Fix the level smoothing weight instead of searching for it.
    pub fn with_alpha(mut self, alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha >= 1.0 {
            return Err(ForecastError::InvalidParameter(
                "Alpha must be between 0 and 1".to_string(),
            ));
        }
        self.alpha = Some(alpha);
        Ok(self)
    }

    /// Fix the trend smoothing weight instead of searching for it.
    pub fn with_beta(mut self, beta: f64) -> Result<Self> {
        if beta <= 0.0 || beta >= 1.0 {
            return Err(ForecastError::InvalidParameter(
                "Beta must be between 0 and 1".to_string(),
            ));
        }
        self.beta = Some(beta);
        Ok(self)
    }

    /// Fix the seasonal smoothing weight instead of searching for it.
    pub fn with_gamma(mut self, gamma: f64) -> Result<Self> {
        if gamma <= 0.0 || gamma >= 1.0 {
            return Err(ForecastError::InvalidParameter(
                "Gamma must be between 0 and 1".to_string(),
            ));
        }
        self.gamma = Some(gamma);
        Ok(self)
    }

    /// Set the trend damping factor.
    pub fn with_damping(mut self, damping: f64) -> Result<Self> {
        if damping <= 0.0 || damping > 1.0 {
            return Err(ForecastError::InvalidParameter(
                "Damping must be in (0, 1]".to_string(),
            ));
        }
        self.damping = damping;
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
        match self.seasonal {
            SeasonalMode::Off => None,
            SeasonalMode::Auto => {
                let (has_seasonality, period) = seasonality::detect(series, 12);
                has_seasonality.then_some(period)
            }
            SeasonalMode::Period(period) => {
                if period >= 2 && series.len() >= 2 * period {
                    Some(period)
                } else {
                    debug!(period, len = series.len(), "series too short for seasonality, disabling");
                    None
                }
            }
        }
    }
}

impl ForecastStrategy for SmoothingModel {
    fn name(&self) -> &str {
        "smoothing"
    }

    fn fit_and_forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        if series.len() < 2 {
            return Err(ForecastError::InsufficientHistory {
                required: 2,
                actual: series.len(),
            });
        }

        let values = series.values();
        let period = self.resolve_period(series);

        let alphas: Vec<f64> = match self.alpha {
            Some(alpha) => vec![alpha],
            None => ALPHA_GRID.to_vec(),
        };
        let betas: Vec<f64> = match self.beta {
            Some(beta) => vec![beta],
            None => BETA_GRID.to_vec(),
        };
        let gammas: Vec<f64> = if period.is_none() {
            vec![0.0]
        } else {
            match self.gamma {
                Some(gamma) => vec![gamma],
                None => GAMMA_GRID.to_vec(),
            }
        };

        let mut best: Option<(FittedState, f64, f64, f64)> = None;
        for &alpha in &alphas {
            for &beta in &betas {
                for &gamma in &gammas {
                    if let Some(state) = fit_pass(values, alpha, beta, gamma, self.damping, period)
                    {
                        let better = match &best {
                            Some((incumbent, _, _, _)) => state.sse < incumbent.sse,
                            None => true,
                        };
                        if better {
                            best = Some((state, alpha, beta, gamma));
                        }
                    }
                }
            }
        }

        let (state, alpha, beta, gamma) = best.ok_or_else(|| {
            ForecastError::ModelFitError(
                "Exponential smoothing produced no finite fit".to_string(),
            )
        })?;

        let n = values.len();
        let mut forecast_values = Vec::with_capacity(horizon);
        let mut phi_sum = 0.0;
        let mut phi_pow = 1.0;
        for h in 1..=horizon {
            phi_pow *= self.damping;
            phi_sum += phi_pow;
            let seasonal = period
                .map(|m| state.seasonals[(n + h - 1) % m])
                .unwrap_or(0.0);
            forecast_values.push(state.level + phi_sum * state.trend + seasonal);
        }
        if forecast_values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::ModelFitError(
                "Exponential smoothing forecast diverged".to_string(),
            ));
        }

        let sigma = residual_std(&state.residuals);
        let z = normal_quantile(self.confidence_level)?;

        let point: Vec<f64> = forecast_values.iter().map(|v| v.max(0.0)).collect();
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (h, value) in forecast_values.iter().enumerate() {
            // Interval widens with the horizon.
            let margin = z * sigma * ((h + 1) as f64).sqrt();
            lower.push((value - margin).max(0.0));
            upper.push((value + margin).max(0.0));
        }

        let periods = series.future_periods(horizon);
        let forecast = TimeSeries::from_parts(periods.clone(), point)?;
        let lower = TimeSeries::from_parts(periods.clone(), lower)?;
        let upper = TimeSeries::from_parts(periods, upper)?;

        let mut parameters = BTreeMap::new();
        parameters.insert("alpha".to_string(), json!(alpha));
        parameters.insert("beta".to_string(), json!(beta));
        parameters.insert("gamma".to_string(), json!(period.map(|_| gamma)));
        parameters.insert("damping".to_string(), json!(self.damping));
        parameters.insert("trend".to_string(), json!("add"));
        parameters.insert("seasonal_periods".to_string(), json!(period));

        ForecastResult::new(forecast, "Exponential Smoothing")
            .with_parameters(parameters)
            .with_confidence(lower, upper)
    }
}

/// State after one smoothing pass over the history.
struct FittedState {
    level: f64,
    trend: f64,
    seasonals: Vec<f64>,
    residuals: Vec<f64>,
    sse: f64,
}

/// Run one Holt-Winters pass. Returns `None` when the recursion leaves the
/// finite domain, which lets the grid search skip the combination.
fn fit_pass(
    values: &[f64],
    alpha: f64,
    beta: f64,
    gamma: f64,
    phi: f64,
    period: Option<usize>,
) -> Option<FittedState> {
    let n = values.len();

    let (mut level, mut trend, mut seasonals) = match period {
        Some(m) => {
            let first_cycle = mean(&values[..m]);
            let second_cycle = mean(&values[m..2 * m]);
            let trend = (second_cycle - first_cycle) / m as f64;

            // Average deviation from its own cycle mean, per position.
            let cycles = n / m;
            let mut seasonals = vec![0.0; m];
            for position in 0..m {
                let mut sum = 0.0;
                for cycle in 0..cycles {
                    let cycle_mean = mean(&values[cycle * m..(cycle + 1) * m]);
                    sum += values[cycle * m + position] - cycle_mean;
                }
                seasonals[position] = sum / cycles as f64;
            }
            (first_cycle, trend, seasonals)
        }
        None => {
            let trend = if n > 1 { values[1] - values[0] } else { 0.0 };
            (values[0], trend, Vec::new())
        }
    };

    let mut residuals = Vec::with_capacity(n);
    let mut sse = 0.0;
    for (t, &value) in values.iter().enumerate() {
        let seasonal = period.map(|m| seasonals[t % m]).unwrap_or(0.0);
        let predicted = level + phi * trend + seasonal;
        let error = value - predicted;
        residuals.push(error);
        sse += error * error;

        let previous_level = level;
        level = alpha * (value - seasonal) + (1.0 - alpha) * (level + phi * trend);
        trend = beta * (level - previous_level) + (1.0 - beta) * phi * trend;
        if let Some(m) = period {
            seasonals[t % m] = gamma * (value - level) + (1.0 - gamma) * seasonals[t % m];
        }
    }

    if !level.is_finite() || !trend.is_finite() || !sse.is_finite() {
        return None;
    }

    Some(FittedState {
        level,
        trend,
        seasonals,
        residuals,
        sse,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn residual_std(residuals: &[f64]) -> f64 {
    if residuals.is_empty() {
        return 0.0;
    }
    let mean = residuals.iter().sum::<f64>() / residuals.len() as f64;
    (residuals
        .iter()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / residuals.len() as f64)
        .sqrt()
}
