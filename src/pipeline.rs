//! Sales-pipeline signal adapter
//!
//! Converts open deals into a monthly series aligned with a forecast's
//! periods so the scenario adjuster can blend it in. This path is an
//! enhancement and never raises: no usable pipeline data means an empty
//! series, which the blend step reads as "no signal available".

use crate::series::{month_start, TimeSeries};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One sales deal as handed over by the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    /// Deal amount.
    pub amount: f64,
    /// Expected close date, when the source row had a parseable one.
    pub expected_close: Option<NaiveDate>,
    /// Raw pipeline status string.
    pub status: String,
}

/// Adapter from deals to a period-aligned supplementary series.
///
/// The caller supplies the status taxonomy: only deals whose status is in
/// the open set contribute. Status comparison is case-insensitive.
#[derive(Debug, Clone, Default)]
pub struct PipelineForecastAdapter {
    open_statuses: BTreeSet<String>,
}

impl PipelineForecastAdapter {
    /// Create an adapter with the given set of open statuses.
    pub fn new<I, S>(open_statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            open_statuses: open_statuses
                .into_iter()
                .map(|s| s.into().trim().to_lowercase())
                .collect(),
        }
    }

    /// Whether a status string counts as open.
    pub fn is_open(&self, status: &str) -> bool {
        self.open_statuses.contains(&status.trim().to_lowercase())
    }

    /// Build a series over the requested periods from open deal amounts.
    ///
    /// Deal amounts are summed by the month of their expected close date.
    /// Requested periods with no deals receive the mean of all observed
    /// months rather than zero, so a thin pipeline does not drag a blend
    /// down artificially. With no usable deals at all the result is empty.
    pub fn to_period_series(&self, deals: &[Deal], periods: &[NaiveDate]) -> TimeSeries {
        let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for deal in deals {
            if !deal.amount.is_finite() || !self.is_open(&deal.status) {
                continue;
            }
            if let Some(close) = deal.expected_close {
                *buckets.entry(month_start(close)).or_insert(0.0) += deal.amount;
            }
        }

        if buckets.is_empty() {
            return TimeSeries::new();
        }
        let mean = buckets.values().sum::<f64>() / buckets.len() as f64;

        let wanted: BTreeSet<NaiveDate> = periods.iter().copied().map(month_start).collect();
        let ordered: Vec<NaiveDate> = wanted.into_iter().collect();
        let values: Vec<f64> = ordered
            .iter()
            .map(|period| buckets.get(period).copied().unwrap_or(mean))
            .collect();

        TimeSeries::from_parts(ordered, values).unwrap_or_default()
    }
}
