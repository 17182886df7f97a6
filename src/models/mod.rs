//! Forecasting models for monthly demand series
//!
//! Three interchangeable strategies sit behind the [`ForecastStrategy`]
//! trait and the [`Model`] selector: exponential smoothing, seasonal
//! ARIMA, and tree-ensemble regression. The [`ForecastEngine`] owns the
//! shared preconditions and the held-out back-test that scores whichever
//! strategy ran.

use crate::error::{ForecastError, Result};
use crate::metrics;
use crate::series::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;

pub mod arima;
pub mod ensemble;
pub mod smoothing;

pub use arima::ArimaModel;
pub use ensemble::EnsembleModel;
pub use smoothing::SmoothingModel;

/// How a strategy decides on its seasonal component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SeasonalMode {
    /// Run the seasonality detector on the input series.
    #[default]
    Auto,
    /// Never fit a seasonal component.
    Off,
    /// Use a fixed period length (falls back to non-seasonal when the
    /// series is too short for two full cycles).
    Period(usize),
}

/// Result of a forecast operation.
///
/// Forecast values are floored at zero on construction; demand cannot be
/// negative. Confidence bounds, when attached, are aligned 1:1 with the
/// forecast periods and bracket the point forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    forecast: TimeSeries,
    model_name: String,
    confidence_lower: Option<TimeSeries>,
    confidence_upper: Option<TimeSeries>,
    metrics: BTreeMap<String, f64>,
    feature_importance: Vec<(String, f64)>,
    parameters: BTreeMap<String, Value>,
}

impl ForecastResult {
    /// Create a new forecast result with no bounds, metrics, or parameters.
    pub fn new(forecast: TimeSeries, model_name: impl Into<String>) -> Self {
        let values = forecast.values().iter().map(|v| v.max(0.0)).collect();
        let forecast = forecast
            .with_values(values)
            .unwrap_or_else(|_| TimeSeries::new());
        Self {
            forecast,
            model_name: model_name.into(),
            confidence_lower: None,
            confidence_upper: None,
            metrics: BTreeMap::new(),
            feature_importance: Vec::new(),
            parameters: BTreeMap::new(),
        }
    }

    /// Attach a confidence band.
    ///
    /// Bounds must cover exactly the forecast periods and satisfy
    /// `lower <= point <= upper` everywhere.
    pub fn with_confidence(mut self, lower: TimeSeries, upper: TimeSeries) -> Result<Self> {
        if lower.periods() != self.forecast.periods() || upper.periods() != self.forecast.periods()
        {
            return Err(ForecastError::DataError(
                "Confidence bounds must cover the same periods as the forecast".to_string(),
            ));
        }
        for ((l, point), u) in lower
            .values()
            .iter()
            .zip(self.forecast.values())
            .zip(upper.values())
        {
            if !(l <= point && point <= u) {
                return Err(ForecastError::DataError(format!(
                    "Confidence band must bracket the forecast: {} <= {} <= {} violated",
                    l, point, u
                )));
            }
        }
        self.confidence_lower = Some(lower);
        self.confidence_upper = Some(upper);
        Ok(self)
    }

    /// Attach accuracy metrics.
    pub fn with_metrics(mut self, metrics: BTreeMap<String, f64>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Attach ranked feature importances.
    pub fn with_feature_importance(mut self, importance: Vec<(String, f64)>) -> Self {
        self.feature_importance = importance;
        self
    }

    /// Attach the parameter audit record.
    pub fn with_parameters(mut self, parameters: BTreeMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// The point forecast.
    pub fn forecast(&self) -> &TimeSeries {
        &self.forecast
    }

    /// Identifier of the producing strategy.
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Lower confidence bound, if available.
    pub fn confidence_lower(&self) -> Option<&TimeSeries> {
        self.confidence_lower.as_ref()
    }

    /// Upper confidence bound, if available.
    pub fn confidence_upper(&self) -> Option<&TimeSeries> {
        self.confidence_upper.as_ref()
    }

    /// Accuracy metrics; empty when the model could not produce them.
    pub fn metrics(&self) -> &BTreeMap<String, f64> {
        &self.metrics
    }

    /// Ranked (feature, importance) pairs; empty for statistical models.
    pub fn feature_importance(&self) -> &[(String, f64)] {
        &self.feature_importance
    }

    /// Every adjustment and fitting parameter, for audit and comparison.
    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }

    /// Number of forecast periods.
    pub fn horizon(&self) -> usize {
        self.forecast.len()
    }

    /// Sum of the point forecast.
    pub fn total(&self) -> f64 {
        self.forecast.sum()
    }

    /// Mean forecast value per period.
    pub fn monthly_average(&self) -> f64 {
        self.forecast.mean()
    }

    /// Largest forecast value and its period, if any.
    pub fn peak(&self) -> Option<(NaiveDate, f64)> {
        self.forecast
            .iter()
            .fold(None, |best: Option<(NaiveDate, f64)>, (period, value)| {
                match best {
                    Some((_, best_value)) if best_value >= value => best,
                    _ => Some((period, value)),
                }
            })
    }
}

/// Common interface for forecasting strategies.
///
/// A strategy fits on the full input series and produces `horizon` future
/// points with a 95% confidence band. It never mutates its input.
pub trait ForecastStrategy {
    /// Short identifier of the strategy.
    fn name(&self) -> &str;

    /// Fit on `series` and forecast `horizon` periods ahead.
    fn fit_and_forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult>;
}

/// Model selector dispatching to one of the three strategies.
#[derive(Debug, Clone)]
pub enum Model {
    /// Damped additive Holt-Winters exponential smoothing.
    Smoothing(SmoothingModel),
    /// Seasonal ARIMA with bounded order search.
    SeasonalArima(ArimaModel),
    /// Random-forest regression over lag and calendar features.
    EnsembleRegression(EnsembleModel),
}

impl Model {
    /// Smoothing strategy with default settings.
    pub fn smoothing() -> Self {
        Model::Smoothing(SmoothingModel::default())
    }

    /// Seasonal ARIMA strategy with default settings.
    pub fn seasonal_arima() -> Self {
        Model::SeasonalArima(ArimaModel::default())
    }

    /// Ensemble regression strategy with default settings.
    pub fn ensemble_regression() -> Self {
        Model::EnsembleRegression(EnsembleModel::default())
    }

    fn strategy(&self) -> &dyn ForecastStrategy {
        match self {
            Model::Smoothing(model) => model,
            Model::SeasonalArima(model) => model,
            Model::EnsembleRegression(model) => model,
        }
    }
}

impl ForecastStrategy for Model {
    fn name(&self) -> &str {
        self.strategy().name()
    }

    fn fit_and_forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        self.strategy().fit_and_forecast(series, horizon)
    }
}

/// Orchestrates strategy dispatch, shared preconditions, and back-testing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForecastEngine;

impl ForecastEngine {
    /// Minimum observations any strategy needs before it is worth calling.
    pub const MIN_OBSERVATIONS: usize = 6;

    /// Create a new engine.
    pub fn new() -> Self {
        Self
    }

    /// Generate a forecast with the selected model.
    ///
    /// Fails with `InsufficientHistory` below
    /// [`ForecastEngine::MIN_OBSERVATIONS`] points and attaches held-out
    /// back-test metrics when enough history remains to run one.
    pub fn forecast(
        &self,
        series: &TimeSeries,
        model: &Model,
        horizon: usize,
    ) -> Result<ForecastResult> {
        if horizon == 0 {
            return Err(ForecastError::InvalidParameter(
                "Horizon must be at least 1 period".to_string(),
            ));
        }
        if series.len() < Self::MIN_OBSERVATIONS {
            return Err(ForecastError::InsufficientHistory {
                required: Self::MIN_OBSERVATIONS,
                actual: series.len(),
            });
        }

        let result = model.fit_and_forecast(series, horizon)?;

        let backtest = self.backtest_metrics(series, model);
        if backtest.is_empty() {
            Ok(result)
        } else {
            Ok(result.with_metrics(backtest))
        }
    }

    /// Score the model by withholding the trailing points, refitting on
    /// the remainder, and comparing the regenerated forecast against the
    /// withheld actuals. Empty when the series is too short for a split or
    /// the refit fails.
    fn backtest_metrics(&self, series: &TimeSeries, model: &Model) -> BTreeMap<String, f64> {
        let len = series.len();
        let holdout = (len / 5).clamp(3, 6);
        if len < Self::MIN_OBSERVATIONS + holdout {
            return BTreeMap::new();
        }

        let split = len - holdout;
        let train = match TimeSeries::from_parts(
            series.periods()[..split].to_vec(),
            series.values()[..split].to_vec(),
        ) {
            Ok(train) => train,
            Err(_) => return BTreeMap::new(),
        };

        let replay = match model.fit_and_forecast(&train, holdout) {
            Ok(replay) => replay,
            Err(e) => {
                debug!(error = %e, "back-test refit failed, skipping metrics");
                return BTreeMap::new();
            }
        };

        metrics::accuracy(&series.values()[split..], replay.forecast().values())
            .unwrap_or_default()
    }
}

/// Flat continuation of the trailing-window average.
///
/// This is the documented fallback for callers whose preferred model
/// failed or that have no approved scenario to consume; it is
/// intentionally the simplest forecast that is still defensible.
pub fn naive_forecast(series: &TimeSeries, horizon: usize, window: usize) -> Result<ForecastResult> {
    if horizon == 0 || window == 0 {
        return Err(ForecastError::InvalidParameter(
            "Horizon and window must both be at least 1".to_string(),
        ));
    }
    if series.is_empty() {
        return Err(ForecastError::InsufficientHistory {
            required: 1,
            actual: 0,
        });
    }

    let window = window.min(series.len());
    let level = series.tail_sum(window) / window as f64;
    let periods = series.future_periods(horizon);
    let values = vec![level.max(0.0); periods.len()];
    let forecast = TimeSeries::from_parts(periods, values)?;

    let mut parameters = BTreeMap::new();
    parameters.insert("window".to_string(), json!(window));

    Ok(ForecastResult::new(forecast, "Naive (trailing average)").with_parameters(parameters))
}

/// Blend multiple forecasts with the given weights.
///
/// Weights are normalized (equal when omitted) and applied over the
/// periods common to every input. Confidence bounds are blended only when
/// every input carries them; MAPE and RMSE are averaged across the inputs
/// that report them.
pub fn blend_results(
    results: &[ForecastResult],
    weights: Option<&[f64]>,
) -> Result<ForecastResult> {
    if results.is_empty() {
        return Err(ForecastError::InvalidParameter(
            "No forecasts to blend".to_string(),
        ));
    }

    let weights: Vec<f64> = match weights {
        Some(weights) => {
            if weights.len() != results.len() {
                return Err(ForecastError::InvalidParameter(format!(
                    "Weights length ({}) doesn't match forecasts length ({})",
                    weights.len(),
                    results.len()
                )));
            }
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                return Err(ForecastError::InvalidParameter(
                    "Blend weights must sum to a positive value".to_string(),
                ));
            }
            weights.iter().map(|w| w / total).collect()
        }
        None => vec![1.0 / results.len() as f64; results.len()],
    };

    let common: Vec<NaiveDate> = results[0]
        .forecast()
        .periods()
        .iter()
        .copied()
        .filter(|period| {
            results[1..]
                .iter()
                .all(|r| r.forecast().value_at(*period).is_some())
        })
        .collect();
    if common.is_empty() {
        return Err(ForecastError::DataError(
            "Forecasts share no common periods to blend".to_string(),
        ));
    }

    let point_sources: Vec<&TimeSeries> = results.iter().map(|r| r.forecast()).collect();
    let values = weighted_sum_at(&point_sources, &weights, &common).ok_or_else(|| {
        ForecastError::DataError("Forecast missing a common period during blend".to_string())
    })?;
    let forecast = TimeSeries::from_parts(common.clone(), values)?;

    let model_names: Vec<&str> = results.iter().map(|r| r.model_name()).collect();
    let mut blended = ForecastResult::new(forecast, format!("Blended ({})", model_names.join(", ")));

    let lower_sources: Option<Vec<&TimeSeries>> =
        results.iter().map(|r| r.confidence_lower()).collect();
    let upper_sources: Option<Vec<&TimeSeries>> =
        results.iter().map(|r| r.confidence_upper()).collect();
    if let (Some(lower_sources), Some(upper_sources)) = (lower_sources, upper_sources) {
        let lower = weighted_sum_at(&lower_sources, &weights, &common);
        let upper = weighted_sum_at(&upper_sources, &weights, &common);
        if let (Some(lower), Some(upper)) = (lower, upper) {
            let lower = TimeSeries::from_parts(common.clone(), lower)?;
            let upper = TimeSeries::from_parts(common.clone(), upper)?;
            blended = blended.with_confidence(lower, upper)?;
        }
    }

    let mut averaged = BTreeMap::new();
    for key in [metrics::MAPE, metrics::RMSE] {
        let reported: Vec<f64> = results
            .iter()
            .filter_map(|r| r.metrics().get(key).copied())
            .collect();
        if !reported.is_empty() {
            averaged.insert(
                key.to_string(),
                reported.iter().sum::<f64>() / reported.len() as f64,
            );
        }
    }

    let weight_map: BTreeMap<String, f64> = model_names
        .iter()
        .map(|n| n.to_string())
        .zip(weights.iter().copied())
        .collect();
    let mut parameters = BTreeMap::new();
    parameters.insert("weights".to_string(), json!(weight_map));

    Ok(blended.with_metrics(averaged).with_parameters(parameters))
}

/// Weighted sum of the sources' values at each period, or `None` when any
/// source is missing one of the periods.
fn weighted_sum_at(
    sources: &[&TimeSeries],
    weights: &[f64],
    periods: &[NaiveDate],
) -> Option<Vec<f64>> {
    periods
        .iter()
        .map(|period| {
            let mut sum = 0.0;
            for (source, weight) in sources.iter().zip(weights.iter()) {
                sum += source.value_at(*period)? * weight;
            }
            Some(sum)
        })
        .collect()
}

/// Allocate an aggregate forecast across keys by historical share.
///
/// Shares are each key's historical total divided by the grand total;
/// every key receives the aggregate forecast scaled by its share.
pub fn allocate_topdown(
    total_forecast: &TimeSeries,
    historical_totals: &BTreeMap<String, f64>,
) -> Result<BTreeMap<String, TimeSeries>> {
    let grand_total: f64 = historical_totals.values().sum();
    if grand_total <= 0.0 {
        return Err(ForecastError::DataError(
            "Historical totals must sum to a positive value for allocation".to_string(),
        ));
    }

    let mut allocated = BTreeMap::new();
    for (key, total) in historical_totals {
        let share = total / grand_total;
        let values = total_forecast.values().iter().map(|v| v * share).collect();
        allocated.insert(key.clone(), total_forecast.with_values(values)?);
    }
    Ok(allocated)
}
