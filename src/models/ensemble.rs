//! Tree-ensemble regression strategy
//!
//! A seeded random forest of CART regression trees over lag, rolling, and
//! calendar features. Multi-step forecasts are produced iteratively: each
//! prediction is appended to the history so the next step's lag features
//! can see it.

use crate::error::{ForecastError, Result};
use crate::metrics::normal_quantile;
use crate::models::{ForecastResult, ForecastStrategy};
use crate::series::TimeSeries;
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::BTreeMap;

const MIN_TRAINING_ROWS: usize = 12;

/// Random-forest regression over features derived from the series.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleModel {
    n_estimators: usize,
    max_depth: usize,
    min_samples_split: usize,
    lags: Vec<usize>,
    rolling_windows: Vec<usize>,
    seed: u64,
    confidence_level: f64,
}

impl Default for EnsembleModel {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 4,
            lags: vec![1, 2, 3, 6, 12],
            rolling_windows: vec![3, 6, 12],
            seed: 42,
            confidence_level: 0.95,
        }
    }
}

impl EnsembleModel {
    /// Create a model with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of trees.
    pub fn with_n_estimators(mut self, n_estimators: usize) -> Result<Self> {
        if n_estimators == 0 {
            return Err(ForecastError::InvalidParameter(
                "Number of estimators must be positive".to_string(),
            ));
        }
        self.n_estimators = n_estimators;
        Ok(self)
    }

    /// Set the maximum tree depth.
    pub fn with_max_depth(mut self, max_depth: usize) -> Result<Self> {
        if max_depth == 0 {
            return Err(ForecastError::InvalidParameter(
                "Maximum depth must be positive".to_string(),
            ));
        }
        self.max_depth = max_depth;
        Ok(self)
    }

    /// Set the lag periods used as features.
    pub fn with_lags(mut self, lags: Vec<usize>) -> Result<Self> {
        if lags.is_empty() || lags.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "Lags must be a non-empty list of positive periods".to_string(),
            ));
        }
        self.lags = lags;
        Ok(self)
    }

    /// Set the RNG seed used for bootstrapping and feature subsampling.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
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
}

impl ForecastStrategy for EnsembleModel {
    fn name(&self) -> &str {
        "ensemble_regression"
    }

    fn fit_and_forecast(&self, series: &TimeSeries, horizon: usize) -> Result<ForecastResult> {
        let n = series.len();

        // Keep only the lags and windows the series can actually cover,
        // so shorter histories still train on something.
        let lags: Vec<usize> = self.lags.iter().copied().filter(|l| *l <= n / 2).collect();
        let windows: Vec<usize> = self
            .rolling_windows
            .iter()
            .copied()
            .filter(|w| *w <= n / 2)
            .collect();
        if lags.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                required: 2 * self.lags.iter().copied().min().unwrap_or(1),
                actual: n,
            });
        }

        let layout = FeatureLayout::new(lags, windows);
        let warmup = layout.warmup();
        if n < warmup + MIN_TRAINING_ROWS {
            return Err(ForecastError::InsufficientHistory {
                required: warmup + MIN_TRAINING_ROWS,
                actual: n,
            });
        }

        let values = series.values();
        let periods = series.periods();
        let mut rows = Vec::with_capacity(n - warmup);
        let mut targets = Vec::with_capacity(n - warmup);
        for t in warmup..n {
            rows.push(layout.row(values, t, periods[t]));
            targets.push(values[t]);
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        let forest = Forest::fit(
            &rows,
            &targets,
            self.n_estimators,
            self.max_depth,
            self.min_samples_split,
            &mut rng,
        )?;

        // In-sample residual spread drives the confidence band.
        let residuals: Vec<f64> = rows
            .iter()
            .zip(targets.iter())
            .map(|(row, target)| target - forest.predict(row))
            .collect();
        let sigma = (residuals.iter().map(|r| r * r).sum::<f64>() / residuals.len() as f64).sqrt();

        // Iterative multi-step forecast: each prediction extends the
        // history that feeds the next step's lag and rolling features.
        let future_periods = series.future_periods(horizon);
        let mut extended_values = values.to_vec();
        let mut extended_periods: Vec<NaiveDate> = periods.to_vec();
        extended_periods.extend(future_periods.iter().copied());

        let mut forecast_values = Vec::with_capacity(horizon);
        for step in 0..future_periods.len() {
            let t = extended_values.len();
            let row = layout.row(&extended_values, t, extended_periods[n + step]);
            let predicted = forest.predict(&row).max(0.0);
            if !predicted.is_finite() {
                return Err(ForecastError::ModelFitError(
                    "Ensemble forecast diverged".to_string(),
                ));
            }
            forecast_values.push(predicted);
            extended_values.push(predicted);
        }

        let z = normal_quantile(self.confidence_level)?;
        let mut lower = Vec::with_capacity(horizon);
        let mut upper = Vec::with_capacity(horizon);
        for (h, value) in forecast_values.iter().enumerate() {
            let margin = z * sigma * ((h + 1) as f64).sqrt();
            lower.push((value - margin).max(0.0));
            upper.push(value + margin);
        }

        let forecast = TimeSeries::from_parts(future_periods.clone(), forecast_values)?;
        let lower = TimeSeries::from_parts(future_periods.clone(), lower)?;
        let upper = TimeSeries::from_parts(future_periods, upper)?;

        let importance = forest.feature_importance(&layout.names());

        let mut parameters = BTreeMap::new();
        parameters.insert("model_type".to_string(), json!("random_forest"));
        parameters.insert("n_estimators".to_string(), json!(self.n_estimators));
        parameters.insert("max_depth".to_string(), json!(self.max_depth));
        parameters.insert("lags".to_string(), json!(layout.lags));
        parameters.insert("rolling_windows".to_string(), json!(layout.windows));
        parameters.insert("seed".to_string(), json!(self.seed));

        ForecastResult::new(forecast, "Ensemble (Random Forest)")
            .with_parameters(parameters)
            .with_feature_importance(importance)
            .with_confidence(lower, upper)
    }
}

/// Which lag, rolling, and calendar features make up a row.
struct FeatureLayout {
    lags: Vec<usize>,
    windows: Vec<usize>,
}

impl FeatureLayout {
    fn new(lags: Vec<usize>, windows: Vec<usize>) -> Self {
        Self { lags, windows }
    }

    /// Rows before this index lack at least one feature.
    fn warmup(&self) -> usize {
        let max_lag = self.lags.iter().copied().max().unwrap_or(0);
        let max_window = self.windows.iter().copied().max().unwrap_or(0);
        max_lag.max(max_window)
    }

    fn names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for lag in &self.lags {
            names.push(format!("lag_{}", lag));
        }
        for window in &self.windows {
            names.push(format!("rolling_mean_{}", window));
            names.push(format!("rolling_std_{}", window));
        }
        names.push("month".to_string());
        names.push("quarter".to_string());
        names.push("month_sin".to_string());
        names.push("month_cos".to_string());
        names.push("trend".to_string());
        names
    }

    /// Feature row at time index `t`; callers guarantee `t >= warmup()`.
    fn row(&self, values: &[f64], t: usize, period: NaiveDate) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.lags.len() + 2 * self.windows.len() + 5);
        for lag in &self.lags {
            row.push(values[t - lag]);
        }
        for window in &self.windows {
            let slice = &values[t - window..t];
            let mean = slice.iter().sum::<f64>() / slice.len() as f64;
            let variance =
                slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / slice.len() as f64;
            row.push(mean);
            row.push(variance.sqrt());
        }
        let month = period.month() as f64;
        row.push(month);
        row.push(((period.month() - 1) / 3 + 1) as f64);
        row.push((2.0 * std::f64::consts::PI * month / 12.0).sin());
        row.push((2.0 * std::f64::consts::PI * month / 12.0).cos());
        row.push(t as f64);
        row
    }
}

/// A bagged collection of regression trees.
struct Forest {
    trees: Vec<TreeNode>,
    importance: Vec<f64>,
}

impl Forest {
    fn fit(
        rows: &[Vec<f64>],
        targets: &[f64],
        n_estimators: usize,
        max_depth: usize,
        min_samples_split: usize,
        rng: &mut StdRng,
    ) -> Result<Self> {
        let n = rows.len();
        let n_features = rows.first().map(|r| r.len()).unwrap_or(0);
        if n == 0 || n_features == 0 {
            return Err(ForecastError::ModelFitError(
                "No training rows for the ensemble".to_string(),
            ));
        }

        let subset_size = (n_features + 2) / 3;
        let mut trees = Vec::with_capacity(n_estimators);
        let mut importance = vec![0.0; n_features];
        for _ in 0..n_estimators {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let tree = grow_tree(
                rows,
                targets,
                sample,
                max_depth,
                min_samples_split,
                subset_size,
                rng,
                &mut importance,
            );
            trees.push(tree);
        }

        Ok(Self { trees, importance })
    }

    fn predict(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        sum / self.trees.len() as f64
    }

    /// Split-gain importances, normalized and ranked descending.
    fn feature_importance(&self, names: &[String]) -> Vec<(String, f64)> {
        let total: f64 = self.importance.iter().sum();
        if total <= 0.0 {
            return Vec::new();
        }
        let mut ranked: Vec<(String, f64)> = names
            .iter()
            .cloned()
            .zip(self.importance.iter().map(|i| i / total))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked
    }
}

/// A node in a regression tree.
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, row: &[f64]) -> f64 {
        match self {
            TreeNode::Leaf { value } => *value,
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.predict(row)
                } else {
                    right.predict(row)
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn grow_tree(
    rows: &[Vec<f64>],
    targets: &[f64],
    indices: Vec<usize>,
    depth_left: usize,
    min_samples_split: usize,
    subset_size: usize,
    rng: &mut StdRng,
    importance: &mut [f64],
) -> TreeNode {
    let mean = indices.iter().map(|i| targets[*i]).sum::<f64>() / indices.len() as f64;
    let sse: f64 = indices
        .iter()
        .map(|i| (targets[*i] - mean).powi(2))
        .sum();
    if depth_left == 0 || indices.len() < min_samples_split || sse <= 1e-12 {
        return TreeNode::Leaf { value: mean };
    }

    let n_features = rows[indices[0]].len();
    let candidates = sample_features(n_features, subset_size, rng);

    let mut best: Option<(usize, f64, f64, Vec<usize>, Vec<usize>)> = None;
    for feature in candidates {
        let mut sorted = indices.clone();
        sorted.sort_by(|a, b| {
            rows[*a][feature]
                .partial_cmp(&rows[*b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // Prefix sums let every split position be scored in one sweep.
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        let mut right_sum: f64 = sorted.iter().map(|i| targets[*i]).sum();
        let mut right_sq: f64 = sorted.iter().map(|i| targets[*i].powi(2)).sum();
        for split in 1..sorted.len() {
            let moved = targets[sorted[split - 1]];
            left_sum += moved;
            left_sq += moved * moved;
            right_sum -= moved;
            right_sq -= moved * moved;

            let left_value = rows[sorted[split - 1]][feature];
            let right_value = rows[sorted[split]][feature];
            if left_value == right_value {
                continue;
            }

            let left_n = split as f64;
            let right_n = (sorted.len() - split) as f64;
            let split_sse = (left_sq - left_sum * left_sum / left_n)
                + (right_sq - right_sum * right_sum / right_n);
            let gain = sse - split_sse;

            let better = match &best {
                Some((_, _, best_gain, _, _)) => gain > *best_gain,
                None => gain > 1e-12,
            };
            if better {
                let threshold = (left_value + right_value) / 2.0;
                best = Some((
                    feature,
                    threshold,
                    gain,
                    sorted[..split].to_vec(),
                    sorted[split..].to_vec(),
                ));
            }
        }
    }

    match best {
        Some((feature, threshold, gain, left_indices, right_indices)) => {
            importance[feature] += gain;
            let left = grow_tree(
                rows,
                targets,
                left_indices,
                depth_left - 1,
                min_samples_split,
                subset_size,
                rng,
                importance,
            );
            let right = grow_tree(
                rows,
                targets,
                right_indices,
                depth_left - 1,
                min_samples_split,
                subset_size,
                rng,
                importance,
            );
            TreeNode::Split {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
        None => TreeNode::Leaf { value: mean },
    }
}

/// Draw `count` distinct feature indices by partial Fisher-Yates.
fn sample_features(n_features: usize, count: usize, rng: &mut StdRng) -> Vec<usize> {
    let count = count.clamp(1, n_features);
    let mut pool: Vec<usize> = (0..n_features).collect();
    for i in 0..count {
        let j = rng.gen_range(i..n_features);
        pool.swap(i, j);
    }
    pool.truncate(count);
    pool
}
