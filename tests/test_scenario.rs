use assert_approx_eq::assert_approx_eq;
use chrono::{Datelike, Months, NaiveDate};
use demand_forecast::error::ForecastError;
use demand_forecast::models::ForecastResult;
use demand_forecast::scenario::{
    seasonal_indices, QuarterlyAdjustments, ScenarioAdjuster, ScenarioParams,
};
use demand_forecast::series::TimeSeries;
use rstest::rstest;

fn monthly_series(start: NaiveDate, values: &[f64]) -> TimeSeries {
    let periods: Vec<NaiveDate> = (0..values.len())
        .map(|i| start.checked_add_months(Months::new(i as u32)).unwrap())
        .collect();
    TimeSeries::from_parts(periods, values.to_vec()).unwrap()
}

/// 24 months of flat demand ending December 2024.
fn flat_history() -> TimeSeries {
    monthly_series(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), &vec![100.0; 24])
}

/// Constant base forecast of 100 for the 12 months of 2025.
fn flat_base() -> ForecastResult {
    let forecast = monthly_series(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &vec![100.0; 12]);
    ForecastResult::new(forecast, "Exponential Smoothing")
}

#[test]
fn test_no_adjustments_is_identity() {
    let adjusted = ScenarioAdjuster::adjust(
        &flat_base(),
        &flat_history(),
        &ScenarioParams::default(),
        None,
    )
    .unwrap();

    assert_eq!(adjusted.forecast().values(), flat_base().forecast().values());
    assert_eq!(adjusted.model_name(), "Scenario (Exponential Smoothing)");
}

#[test]
fn test_growth_compounds_monthly() {
    let params = ScenarioParams {
        growth_rate_pct: 12.0,
        ..ScenarioParams::default()
    };
    let adjusted =
        ScenarioAdjuster::adjust(&flat_base(), &flat_history(), &params, None).unwrap();

    let values = adjusted.forecast().values();
    let monthly = 1.12_f64.powf(1.0 / 12.0);
    assert_approx_eq!(values[0], 100.0 * monthly, 1e-6);
    assert_approx_eq!(values[11], 112.0, 1e-6);
}

#[rstest]
#[case(1, -10.0)]
#[case(2, -10.0)]
#[case(3, -10.0)]
#[case(4, 0.0)]
#[case(9, 0.0)]
#[case(10, 20.0)]
#[case(12, 20.0)]
fn test_quarterly_overrides_by_month(#[case] month: u32, #[case] expected_pct: f64) {
    let params = ScenarioParams {
        quarterly_adjustments: QuarterlyAdjustments {
            q1: -10.0,
            q2: 0.0,
            q3: 0.0,
            q4: 20.0,
        },
        ..ScenarioParams::default()
    };
    let adjusted =
        ScenarioAdjuster::adjust(&flat_base(), &flat_history(), &params, None).unwrap();

    for (period, value) in adjusted.forecast().iter() {
        if period.month() == month {
            assert_approx_eq!(value, 100.0 * (1.0 + expected_pct / 100.0), 1e-9);
        }
    }
}

#[test]
fn test_seasonality_factor_flattens_pattern() {
    // History where every January runs at double the usual level.
    let values: Vec<f64> = (0..24)
        .map(|i| if i % 12 == 0 { 200.0 } else { 100.0 })
        .collect();
    let history = monthly_series(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(), &values);

    let indices = seasonal_indices(&history);
    assert!(indices[&1] > 1.5);

    let params = ScenarioParams {
        seasonality_factor: 0.0,
        ..ScenarioParams::default()
    };
    let adjusted = ScenarioAdjuster::adjust(&flat_base(), &history, &params, None).unwrap();

    // Flattening removes January's implicit lift; other months gain a
    // little because their index sits just below 1.
    let january = adjusted.forecast().values()[0];
    let june = adjusted.forecast().values()[5];
    assert!(january < 70.0, "january was {}", january);
    assert!(june > 100.0, "june was {}", june);

    // Factor 1.0 keeps the pattern untouched.
    let identity = ScenarioParams::default();
    let unchanged = ScenarioAdjuster::adjust(&flat_base(), &history, &identity, None).unwrap();
    assert_eq!(unchanged.forecast().values(), flat_base().forecast().values());
}

#[test]
fn test_pipeline_blend_with_partial_coverage() {
    let base = flat_base();
    // Pipeline signal covers only the first half of 2025.
    let pipeline = monthly_series(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &vec![60.0; 6]);

    let params = ScenarioParams {
        demand_weight: 0.7,
        ..ScenarioParams::default()
    };
    let adjusted =
        ScenarioAdjuster::adjust(&base, &flat_history(), &params, Some(&pipeline)).unwrap();

    let values = adjusted.forecast().values();
    for value in &values[..6] {
        assert_approx_eq!(*value, 100.0 * 0.7 + 60.0 * 0.3, 1e-9);
    }
    // Periods the pipeline does not cover stay pure demand.
    for value in &values[6..] {
        assert_approx_eq!(*value, 100.0, 1e-9);
    }
}

#[test]
fn test_empty_pipeline_means_no_signal() {
    let params = ScenarioParams {
        demand_weight: 0.5,
        ..ScenarioParams::default()
    };
    let empty = TimeSeries::new();
    let adjusted =
        ScenarioAdjuster::adjust(&flat_base(), &flat_history(), &params, Some(&empty)).unwrap();

    assert_eq!(adjusted.forecast().values(), flat_base().forecast().values());
}

#[test]
fn test_step_order_is_load_bearing() {
    // The documented order applies growth before the pipeline blend.
    // Running the blend first and growing afterwards compounds the
    // pipeline contribution too, so the two orders must diverge.
    let pipeline = monthly_series(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &vec![60.0; 12]);
    let history = flat_history();

    let documented = ScenarioAdjuster::adjust(
        &flat_base(),
        &history,
        &ScenarioParams {
            growth_rate_pct: 12.0,
            demand_weight: 0.5,
            ..ScenarioParams::default()
        },
        Some(&pipeline),
    )
    .unwrap();

    let blended_first = ScenarioAdjuster::adjust(
        &flat_base(),
        &history,
        &ScenarioParams {
            demand_weight: 0.5,
            ..ScenarioParams::default()
        },
        Some(&pipeline),
    )
    .unwrap();
    let reversed = ScenarioAdjuster::adjust(
        &blended_first,
        &history,
        &ScenarioParams {
            growth_rate_pct: 12.0,
            ..ScenarioParams::default()
        },
        None,
    )
    .unwrap();

    let last_documented = documented.forecast().values()[11];
    let last_reversed = reversed.forecast().values()[11];
    assert!(
        (last_documented - last_reversed).abs() > 1.0,
        "orders should diverge: {} vs {}",
        last_documented,
        last_reversed
    );
}

#[test]
fn test_values_are_floored_at_zero() {
    let params = ScenarioParams {
        quarterly_adjustments: QuarterlyAdjustments {
            q1: -150.0,
            q2: 0.0,
            q3: 0.0,
            q4: 0.0,
        },
        ..ScenarioParams::default()
    };
    let adjusted =
        ScenarioAdjuster::adjust(&flat_base(), &flat_history(), &params, None).unwrap();

    for (period, value) in adjusted.forecast().iter() {
        assert!(value >= 0.0);
        if period.month() <= 3 {
            assert_eq!(value, 0.0);
        }
    }
}

#[test]
fn test_parameter_validation() {
    let bad_weight = ScenarioParams {
        demand_weight: 1.5,
        ..ScenarioParams::default()
    };
    assert!(matches!(
        ScenarioAdjuster::adjust(&flat_base(), &flat_history(), &bad_weight, None),
        Err(ForecastError::InvalidParameter(_))
    ));

    let bad_growth = ScenarioParams {
        growth_rate_pct: -100.0,
        ..ScenarioParams::default()
    };
    assert!(ScenarioAdjuster::adjust(&flat_base(), &flat_history(), &bad_growth, None).is_err());
}

#[test]
fn test_confidence_bounds_rescale_with_point() {
    let base = flat_base()
        .with_confidence(
            monthly_series(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &vec![90.0; 12]),
            monthly_series(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), &vec![110.0; 12]),
        )
        .unwrap();

    let params = ScenarioParams {
        growth_rate_pct: 12.0,
        ..ScenarioParams::default()
    };
    let adjusted = ScenarioAdjuster::adjust(&base, &flat_history(), &params, None).unwrap();

    let lower = adjusted.confidence_lower().expect("lower bound");
    let upper = adjusted.confidence_upper().expect("upper bound");
    for ((l, point), u) in lower
        .values()
        .iter()
        .zip(adjusted.forecast().values())
        .zip(upper.values())
    {
        assert!(l <= point && point <= u);
    }
    // Upward growth scales the band upward with it.
    assert!(upper.values()[11] > 110.0);
}

#[test]
fn test_parameters_record_every_knob() {
    let params = ScenarioParams {
        growth_rate_pct: 12.0,
        demand_weight: 0.7,
        seasonality_factor: 1.2,
        quarterly_adjustments: QuarterlyAdjustments {
            q1: -10.0,
            q2: 0.0,
            q3: 5.0,
            q4: 20.0,
        },
    };
    let adjusted =
        ScenarioAdjuster::adjust(&flat_base(), &flat_history(), &params, None).unwrap();

    let recorded = adjusted.parameters();
    assert_eq!(recorded["growth_rate_pct"], 12.0);
    assert_eq!(recorded["demand_weight"], 0.7);
    assert_eq!(recorded["seasonality_factor"], 1.2);
    assert_eq!(recorded["quarterly_adjustments"]["Q4"], 20.0);
    assert_eq!(recorded["base_model"], "Exponential Smoothing");
    assert_eq!(recorded["pipeline_blended"], false);
}
