//! Monthly time series type used throughout the crate
//!
//! All series in this crate share one granularity: a period is a calendar
//! month, identified by its first day. The preparer guarantees gap-free
//! coverage; the constructors here enforce ordering and month alignment.

use crate::error::{ForecastError, Result};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Truncate a date to the first day of its calendar month.
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Add whole months to a period start. Returns `None` only when the
/// resulting date would fall outside chrono's representable range.
pub(crate) fn add_months(period: NaiveDate, months: u32) -> Option<NaiveDate> {
    period.checked_add_months(Months::new(months))
}

/// Ordered monthly series of (period start, value) pairs.
///
/// Invariants: periods are strictly increasing, unique, and normalized to
/// the first day of their month.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    periods: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create an empty series.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from parallel period/value vectors.
    ///
    /// Periods are normalized to month starts and must be strictly
    /// increasing after normalization.
    pub fn from_parts(periods: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if periods.len() != values.len() {
            return Err(ForecastError::DataError(format!(
                "Periods length ({}) doesn't match values length ({})",
                periods.len(),
                values.len()
            )));
        }

        let periods: Vec<NaiveDate> = periods.into_iter().map(month_start).collect();
        for pair in periods.windows(2) {
            if pair[1] <= pair[0] {
                return Err(ForecastError::DataError(format!(
                    "Periods must be strictly increasing: {} followed by {}",
                    pair[0], pair[1]
                )));
            }
        }

        Ok(Self { periods, values })
    }

    /// Build a gap-free monthly series from bucketed month sums.
    ///
    /// Covers every month from the first to the last key inclusive,
    /// filling months absent from the map with zero. Keys are assumed to
    /// be month starts (the preparer truncates before bucketing).
    pub fn from_monthly_buckets(buckets: &BTreeMap<NaiveDate, f64>) -> Self {
        let (first, last) = match (buckets.keys().next(), buckets.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return Self::new(),
        };

        let mut periods = Vec::new();
        let mut values = Vec::new();
        let mut current = first;
        while current <= last {
            periods.push(current);
            values.push(buckets.get(&current).copied().unwrap_or(0.0));
            current = match add_months(current, 1) {
                Some(next) => next,
                None => break,
            };
        }

        Self { periods, values }
    }

    /// Append a point. The period is normalized to its month start and
    /// must follow the current last period.
    pub fn push(&mut self, period: NaiveDate, value: f64) -> Result<()> {
        let period = month_start(period);
        if let Some(last) = self.periods.last() {
            if period <= *last {
                return Err(ForecastError::DataError(format!(
                    "Period {} does not follow last period {}",
                    period, last
                )));
            }
        }
        self.periods.push(period);
        self.values.push(value);
        Ok(())
    }

    /// Replace the values while keeping the same periods.
    pub fn with_values(&self, values: Vec<f64>) -> Result<Self> {
        if values.len() != self.periods.len() {
            return Err(ForecastError::DataError(format!(
                "Values length ({}) doesn't match periods length ({})",
                values.len(),
                self.periods.len()
            )));
        }
        Ok(Self {
            periods: self.periods.clone(),
            values,
        })
    }

    /// Number of periods in the series.
    pub fn len(&self) -> usize {
        self.periods.len()
    }

    /// Check whether the series has no points.
    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Period starts, in order.
    pub fn periods(&self) -> &[NaiveDate] {
        &self.periods
    }

    /// Values, aligned with `periods()`.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Iterate over (period, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.periods.iter().copied().zip(self.values.iter().copied())
    }

    /// First period, if any.
    pub fn first_period(&self) -> Option<NaiveDate> {
        self.periods.first().copied()
    }

    /// Last period, if any.
    pub fn last_period(&self) -> Option<NaiveDate> {
        self.periods.last().copied()
    }

    /// Value at a period, if present. The date is truncated to its month
    /// before lookup.
    pub fn value_at(&self, period: NaiveDate) -> Option<f64> {
        let period = month_start(period);
        self.periods
            .binary_search(&period)
            .ok()
            .map(|idx| self.values[idx])
    }

    /// Sum of all values.
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Mean value, or 0 for an empty series.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.sum() / self.values.len() as f64
        }
    }

    /// Population variance, or 0 for an empty series.
    pub fn variance(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        self.values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / self.values.len() as f64
    }

    /// Sum of the trailing `n` values (fewer if the series is shorter).
    pub fn tail_sum(&self, n: usize) -> f64 {
        let start = self.values.len().saturating_sub(n);
        self.values[start..].iter().sum()
    }

    /// The `horizon` month starts immediately following the last period.
    ///
    /// Empty when the series itself is empty.
    pub fn future_periods(&self, horizon: usize) -> Vec<NaiveDate> {
        let last = match self.last_period() {
            Some(last) => last,
            None => return Vec::new(),
        };

        let mut periods = Vec::with_capacity(horizon);
        let mut current = last;
        for _ in 0..horizon {
            current = match add_months(current, 1) {
                Some(next) => next,
                None => break,
            };
            periods.push(current);
        }
        periods
    }

    /// Mean value per calendar month (1..=12) over the whole series.
    ///
    /// Months never observed are absent from the map.
    pub fn monthly_means(&self) -> BTreeMap<u32, f64> {
        let mut sums: BTreeMap<u32, (f64, usize)> = BTreeMap::new();
        for (period, value) in self.iter() {
            let entry = sums.entry(period.month()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
        sums.into_iter()
            .map(|(month, (sum, count))| (month, sum / count as f64))
            .collect()
    }
}
