//! # Demand Forecast
//!
//! A Rust library for monthly demand forecasting and sales scenario
//! planning.
//!
//! ## Features
//!
//! - Monthly time series preparation from tabular rows (gap filling,
//!   grouping, month truncation)
//! - Forecasting models (Exponential Smoothing, Seasonal ARIMA, Random
//!   Forest regression) behind one strategy interface
//! - Seasonality detection via additive decomposition
//! - Scenario adjustments (growth, seasonality strength, quarterly
//!   overrides, pipeline blending)
//! - A scenario store with compare/approve workflow and JSON export
//!
//! ## Quick Start
//!
//! ```no_run
//! use demand_forecast::models::{ForecastEngine, Model};
//! use demand_forecast::prepare::SeriesPreparer;
//! use demand_forecast::scenario::{ScenarioAdjuster, ScenarioParams};
//! use demand_forecast::store::{Scenario, ScenarioStore};
//!
//! # fn main() -> demand_forecast::error::Result<()> {
//! // Load invoice rows and aggregate them into monthly demand
//! let rows = SeriesPreparer::load_csv("invoice_lines.csv")?;
//! let demand = SeriesPreparer::monthly_series(&rows, "Date", "Quantity")?;
//!
//! // Generate a base forecast 12 months out
//! let engine = ForecastEngine::new();
//! let base = engine.forecast(&demand, &Model::smoothing(), 12)?;
//!
//! // Shape it into a scenario and store it for approval
//! let params = ScenarioParams {
//!     growth_rate_pct: 12.0,
//!     ..ScenarioParams::default()
//! };
//! let adjusted = ScenarioAdjuster::adjust(&base, &demand, &params, None)?;
//!
//! let store = ScenarioStore::new();
//! store.save(Scenario::new("Growth 12%", "Assumes renewed channel push", adjusted, demand));
//! store.approve("Growth 12%")?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod prepare;
pub mod scenario;
pub mod seasonality;
pub mod series;
pub mod store;

// Re-export commonly used types
pub use crate::error::{ForecastError, Result};
pub use crate::models::{ForecastEngine, ForecastResult, ForecastStrategy, Model};
pub use crate::pipeline::{Deal, PipelineForecastAdapter};
pub use crate::prepare::SeriesPreparer;
pub use crate::scenario::{QuarterlyAdjustments, ScenarioAdjuster, ScenarioParams};
pub use crate::series::TimeSeries;
pub use crate::store::{Scenario, ScenarioComparison, ScenarioStore};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
