//! Named scenario store with approval workflow
//!
//! Process-wide mutable state: a creation-ordered collection of named
//! scenarios plus at most one approved name that downstream purchase-order
//! planning consumes. All read-modify-write sequences go through one
//! mutex; a poisoned lock is recovered rather than propagated.

use crate::error::{ForecastError, Result};
use crate::models::ForecastResult;
use crate::series::TimeSeries;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

/// A named, saved forecast variant.
///
/// Scenarios are never mutated in place: replacing one is a delete plus a
/// fresh save under the same name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Unique key within the store.
    pub name: String,
    /// Free-form description of the assumptions behind the scenario.
    pub description: String,
    /// Every adjustment that produced the forecast, for audit.
    pub parameters: BTreeMap<String, Value>,
    /// The adjusted forecast itself.
    pub forecast: ForecastResult,
    /// Snapshot of the historical demand the forecast was based on.
    pub historical_demand: TimeSeries,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Scenario {
    /// Create a scenario stamped with the current time.
    ///
    /// The parameter audit record is taken from the forecast.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        forecast: ForecastResult,
        historical_demand: TimeSeries,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: forecast.parameters().clone(),
            forecast,
            historical_demand,
            created_at: Utc::now(),
        }
    }
}

/// One row of a scenario comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioComparison {
    /// Scenario name.
    pub name: String,
    /// Sum of the scenario's forecast.
    pub total_forecast: f64,
    /// Mean forecast value per period.
    pub monthly_average: f64,
    /// Largest forecast value.
    pub peak_value: f64,
    /// Period of the largest forecast value.
    pub peak_period: Option<NaiveDate>,
    /// Total difference versus the first named scenario, in units, over
    /// the periods the two scenarios share.
    pub variance_units: f64,
    /// Total difference versus the first named scenario, in percent.
    pub variance_pct: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreState {
    scenarios: Vec<Scenario>,
    approved: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreExport {
    scenarios: Vec<Scenario>,
    approved: Option<String>,
    exported_at: DateTime<Utc>,
}

/// Keyed collection of scenarios with single-approval semantics.
#[derive(Debug, Default)]
pub struct ScenarioStore {
    state: Mutex<StoreState>,
}

impl ScenarioStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert a scenario, replacing any existing one with the same name.
    pub fn save(&self, scenario: Scenario) {
        let mut state = self.lock();
        state.scenarios.retain(|s| s.name != scenario.name);
        state.scenarios.push(scenario);
    }

    /// Look up a scenario by name.
    pub fn get(&self, name: &str) -> Option<Scenario> {
        self.lock().scenarios.iter().find(|s| s.name == name).cloned()
    }

    /// All scenarios in creation order.
    pub fn list(&self) -> Vec<Scenario> {
        self.lock().scenarios.clone()
    }

    /// Number of stored scenarios.
    pub fn len(&self) -> usize {
        self.lock().scenarios.len()
    }

    /// Whether the store holds no scenarios.
    pub fn is_empty(&self) -> bool {
        self.lock().scenarios.is_empty()
    }

    /// Delete a scenario; clears the approval if it pointed at it.
    pub fn delete(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        let position = state
            .scenarios
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| ForecastError::NotFound(name.to_string()))?;
        state.scenarios.remove(position);
        if state.approved.as_deref() == Some(name) {
            state.approved = None;
        }
        Ok(())
    }

    /// Remove every scenario and any approval.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.scenarios.clear();
        state.approved = None;
    }

    /// Mark a scenario as the single approved one.
    ///
    /// Approving a different scenario silently supersedes the previous
    /// approval (last write wins).
    pub fn approve(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        if !state.scenarios.iter().any(|s| s.name == name) {
            return Err(ForecastError::NotFound(name.to_string()));
        }
        state.approved = Some(name.to_string());
        Ok(())
    }

    /// Withdraw the current approval, if any.
    pub fn revoke_approval(&self) {
        self.lock().approved = None;
    }

    /// The currently approved scenario, if any.
    pub fn get_approved(&self) -> Option<Scenario> {
        let state = self.lock();
        let name = state.approved.as_deref()?;
        state.scenarios.iter().find(|s| s.name == name).cloned()
    }

    /// Summarize the named scenarios side by side.
    ///
    /// Variances are reported against the first named scenario, over the
    /// forecast periods each pair shares. Requires at least two names.
    pub fn compare(&self, names: &[&str]) -> Result<Vec<ScenarioComparison>> {
        if names.len() < 2 {
            return Err(ForecastError::InsufficientSelection {
                required: 2,
                actual: names.len(),
            });
        }

        let state = self.lock();
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let scenario = state
                .scenarios
                .iter()
                .find(|s| s.name == *name)
                .ok_or_else(|| ForecastError::NotFound(name.to_string()))?;
            selected.push(scenario);
        }

        let baseline = selected[0].forecast.forecast();
        let mut rows = Vec::with_capacity(selected.len());
        for (position, scenario) in selected.iter().enumerate() {
            let forecast = scenario.forecast.forecast();
            let (variance_units, variance_pct) = if position == 0 {
                (0.0, 0.0)
            } else {
                let mut base_sum = 0.0;
                let mut comparison_sum = 0.0;
                for (period, value) in forecast.iter() {
                    if let Some(base_value) = baseline.value_at(period) {
                        base_sum += base_value;
                        comparison_sum += value;
                    }
                }
                let variance = comparison_sum - base_sum;
                let pct = if base_sum > 0.0 {
                    variance / base_sum * 100.0
                } else {
                    0.0
                };
                (variance, pct)
            };

            rows.push(ScenarioComparison {
                name: scenario.name.clone(),
                total_forecast: scenario.forecast.total(),
                monthly_average: scenario.forecast.monthly_average(),
                peak_value: scenario.forecast.peak().map(|(_, v)| v).unwrap_or(0.0),
                peak_period: scenario.forecast.peak().map(|(p, _)| p),
                variance_units,
                variance_pct,
            });
        }

        Ok(rows)
    }

    /// Export the whole store as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        let state = self.lock();
        let export = StoreExport {
            scenarios: state.scenarios.clone(),
            approved: state.approved.clone(),
            exported_at: Utc::now(),
        };
        Ok(serde_json::to_string_pretty(&export)?)
    }

    /// Rebuild a store from a JSON export.
    ///
    /// The approved name, when present, must refer to one of the imported
    /// scenarios.
    pub fn from_json(json: &str) -> Result<Self> {
        let export: StoreExport = serde_json::from_str(json)?;
        if let Some(approved) = &export.approved {
            if !export.scenarios.iter().any(|s| s.name == *approved) {
                return Err(ForecastError::NotFound(approved.clone()));
            }
        }
        Ok(Self {
            state: Mutex::new(StoreState {
                scenarios: export.scenarios,
                approved: export.approved,
            }),
        })
    }
}
