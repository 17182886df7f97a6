use chrono::{Months, NaiveDate};
use demand_forecast::models::{ForecastEngine, ForecastStrategy, Model};
use demand_forecast::series::TimeSeries;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Demand Forecast: Basic Forecasting Example");
    println!("==========================================\n");

    // Create three years of monthly demand with a seasonal Q4 bump
    println!("Creating sample demand history...");
    let demand = create_sample_demand()?;
    println!("Sample history created: {} monthly points\n", demand.len());

    let engine = ForecastEngine::new();

    // Run every strategy over the same series
    for model in [
        Model::smoothing(),
        Model::seasonal_arima(),
        Model::ensemble_regression(),
    ] {
        println!("--- {} ---", model.name());
        let result = engine.forecast(&demand, &model, 12)?;

        println!("Model: {}", result.model_name());
        for (period, value) in result.forecast().iter().take(6) {
            println!("  {}: {:.1}", period.format("%b %Y"), value);
        }
        if let Some(mape) = result.metrics().get("MAPE") {
            println!("Back-test MAPE: {:.2}%", mape);
        }
        if !result.feature_importance().is_empty() {
            println!("Top features:");
            for (feature, importance) in result.feature_importance().iter().take(3) {
                println!("  {}: {:.3}", feature, importance);
            }
        }
        println!();
    }

    Ok(())
}

fn create_sample_demand() -> Result<TimeSeries, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).ok_or("bad start date")?;
    let mut periods = Vec::new();
    let mut values = Vec::new();
    for i in 0..36u32 {
        let period = start
            .checked_add_months(Months::new(i))
            .ok_or("date overflow")?;
        let month = (i % 12) + 1;
        let seasonal = if month >= 10 { 40.0 } else { 0.0 };
        let trend = i as f64 * 1.5;
        periods.push(period);
        values.push(100.0 + trend + seasonal);
    }
    Ok(TimeSeries::from_parts(periods, values)?)
}
