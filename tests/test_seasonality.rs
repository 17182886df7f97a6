use chrono::{Months, NaiveDate};
use demand_forecast::seasonality::detect;
use demand_forecast::series::TimeSeries;

fn monthly_series(values: &[f64]) -> TimeSeries {
    let start = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
    let periods: Vec<NaiveDate> = (0..values.len())
        .map(|i| start.checked_add_months(Months::new(i as u32)).unwrap())
        .collect();
    TimeSeries::from_parts(periods, values.to_vec()).unwrap()
}

#[test]
fn test_detects_annual_cycle() {
    let values: Vec<f64> = (0..36)
        .map(|t| 100.0 + 30.0 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin())
        .collect();
    let series = monthly_series(&values);

    assert_eq!(detect(&series, 12), (true, 12));
}

#[test]
fn test_constant_series_has_no_seasonality() {
    let series = monthly_series(&vec![100.0; 36]);
    assert_eq!(detect(&series, 12), (false, 1));
}

#[test]
fn test_pure_trend_has_no_seasonality() {
    let values: Vec<f64> = (0..36).map(|t| 50.0 + 4.0 * t as f64).collect();
    let series = monthly_series(&values);

    assert_eq!(detect(&series, 12), (false, 1));
}

#[test]
fn test_short_series_skips_decomposition() {
    let values: Vec<f64> = (0..18)
        .map(|t| 100.0 + 30.0 * (2.0 * std::f64::consts::PI * t as f64 / 12.0).sin())
        .collect();
    let series = monthly_series(&values);

    // Fewer than two full cycles: no detection attempt.
    assert_eq!(detect(&series, 12), (false, 1));
}

#[test]
fn test_degenerate_period_never_panics() {
    let series = monthly_series(&[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(detect(&series, 0), (false, 1));
    assert_eq!(detect(&series, 1), (false, 1));
}

#[test]
fn test_empty_series() {
    assert_eq!(detect(&TimeSeries::new(), 12), (false, 1));
}
