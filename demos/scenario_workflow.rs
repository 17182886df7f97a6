use chrono::{Months, NaiveDate};
use demand_forecast::models::{ForecastEngine, Model};
use demand_forecast::scenario::{QuarterlyAdjustments, ScenarioAdjuster, ScenarioParams};
use demand_forecast::series::TimeSeries;
use demand_forecast::store::{Scenario, ScenarioStore};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Demand Forecast: Scenario Workflow Example");
    println!("==========================================\n");

    let demand = create_sample_demand()?;
    let engine = ForecastEngine::new();
    let base = engine.forecast(&demand, &Model::smoothing(), 12)?;

    let store = ScenarioStore::new();

    // A conservative scenario: the base forecast, untouched
    let conservative = ScenarioAdjuster::adjust(&base, &demand, &ScenarioParams::default(), None)?;
    store.save(Scenario::new(
        "Conservative",
        "Base statistical forecast, no adjustments",
        conservative,
        demand.clone(),
    ));

    // An upside scenario: 15% growth with a stronger Q4
    let upside_params = ScenarioParams {
        growth_rate_pct: 15.0,
        quarterly_adjustments: QuarterlyAdjustments {
            q1: 0.0,
            q2: 0.0,
            q3: 0.0,
            q4: 10.0,
        },
        ..ScenarioParams::default()
    };
    let upside = ScenarioAdjuster::adjust(&base, &demand, &upside_params, None)?;
    store.save(Scenario::new(
        "Upside",
        "15% annual growth, stronger holiday quarter",
        upside,
        demand.clone(),
    ));

    // Compare them side by side
    println!("Scenario comparison:");
    for row in store.compare(&["Conservative", "Upside"])? {
        println!(
            "  {:<14} total {:>9.0}  avg {:>7.1}  variance {:>+8.0} ({:+.1}%)",
            row.name, row.total_forecast, row.monthly_average, row.variance_units, row.variance_pct
        );
    }

    // Approve the plan of record and export the library
    store.approve("Upside")?;
    let approved = store.get_approved().ok_or("approval missing")?;
    println!("\nApproved scenario: {}", approved.name);
    println!(
        "Approved total over {} months: {:.0} units",
        approved.forecast.horizon(),
        approved.forecast.total()
    );

    let exported = store.to_json()?;
    println!("\nExport size: {} bytes of JSON", exported.len());

    Ok(())
}

fn create_sample_demand() -> Result<TimeSeries, Box<dyn std::error::Error>> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).ok_or("bad start date")?;
    let mut periods = Vec::new();
    let mut values = Vec::new();
    for i in 0..30u32 {
        let period = start
            .checked_add_months(Months::new(i))
            .ok_or("date overflow")?;
        periods.push(period);
        values.push(250.0 + (i as f64 * 2.0) + ((i % 12) as f64 - 6.0).abs() * 5.0);
    }
    Ok(TimeSeries::from_parts(periods, values)?)
}
