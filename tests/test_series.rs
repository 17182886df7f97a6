use chrono::{Months, NaiveDate};
use demand_forecast::series::{month_start, TimeSeries};
use std::collections::BTreeMap;

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn monthly_series(start: NaiveDate, values: &[f64]) -> TimeSeries {
    let periods: Vec<NaiveDate> = (0..values.len())
        .map(|i| start.checked_add_months(Months::new(i as u32)).unwrap())
        .collect();
    TimeSeries::from_parts(periods, values.to_vec()).unwrap()
}

#[test]
fn test_month_start_truncation() {
    assert_eq!(month_start(date(2023, 5, 17)), date(2023, 5, 1));
    assert_eq!(month_start(date(2023, 5, 1)), date(2023, 5, 1));
}

#[test]
fn test_gap_filling_covers_every_month() {
    let mut buckets = BTreeMap::new();
    buckets.insert(date(2023, 1, 1), 5.0);
    buckets.insert(date(2023, 4, 1), 7.0);

    let series = TimeSeries::from_monthly_buckets(&buckets);

    // One point per month from January through April, no gaps.
    assert_eq!(series.len(), 4);
    assert_eq!(
        series.periods(),
        &[
            date(2023, 1, 1),
            date(2023, 2, 1),
            date(2023, 3, 1),
            date(2023, 4, 1),
        ]
    );
    assert_eq!(series.values(), &[5.0, 0.0, 0.0, 7.0]);
}

#[test]
fn test_from_parts_normalizes_days() {
    let series = TimeSeries::from_parts(
        vec![date(2023, 1, 15), date(2023, 2, 28)],
        vec![1.0, 2.0],
    )
    .unwrap();

    assert_eq!(series.periods(), &[date(2023, 1, 1), date(2023, 2, 1)]);
}

#[test]
fn test_from_parts_rejects_duplicate_months() {
    let result = TimeSeries::from_parts(vec![date(2023, 1, 2), date(2023, 1, 20)], vec![1.0, 2.0]);
    assert!(result.is_err());

    let result = TimeSeries::from_parts(vec![date(2023, 3, 1), date(2023, 1, 1)], vec![1.0, 2.0]);
    assert!(result.is_err());
}

#[test]
fn test_from_parts_rejects_length_mismatch() {
    let result = TimeSeries::from_parts(vec![date(2023, 1, 1)], vec![1.0, 2.0]);
    assert!(result.is_err());
}

#[test]
fn test_push_requires_later_period() {
    let mut series = TimeSeries::new();
    series.push(date(2023, 1, 10), 5.0).unwrap();
    series.push(date(2023, 2, 1), 6.0).unwrap();

    assert!(series.push(date(2023, 2, 20), 7.0).is_err());
    assert_eq!(series.len(), 2);
}

#[test]
fn test_future_periods_cross_year_boundary() {
    let series = monthly_series(date(2023, 10, 1), &[1.0, 2.0, 3.0]);

    assert_eq!(
        series.future_periods(3),
        vec![date(2024, 1, 1), date(2024, 2, 1), date(2024, 3, 1)]
    );
}

#[test]
fn test_value_at_mid_month_date() {
    let series = monthly_series(date(2023, 1, 1), &[10.0, 20.0]);

    assert_eq!(series.value_at(date(2023, 2, 14)), Some(20.0));
    assert_eq!(series.value_at(date(2023, 3, 1)), None);
}

#[test]
fn test_empty_series_behavior() {
    let series = TimeSeries::new();

    assert!(series.is_empty());
    assert_eq!(series.future_periods(6), Vec::<NaiveDate>::new());
    assert_eq!(series.sum(), 0.0);
    assert_eq!(series.mean(), 0.0);
    assert_eq!(series.first_period(), None);
}

#[test]
fn test_monthly_means_by_calendar_month() {
    // Two years: every January is 200, everything else 100.
    let values: Vec<f64> = (0..24)
        .map(|i| if i % 12 == 0 { 200.0 } else { 100.0 })
        .collect();
    let series = monthly_series(date(2022, 1, 1), &values);

    let means = series.monthly_means();
    assert_eq!(means.get(&1), Some(&200.0));
    assert_eq!(means.get(&7), Some(&100.0));
    assert_eq!(means.len(), 12);
}

#[test]
fn test_with_values_keeps_periods() {
    let series = monthly_series(date(2023, 1, 1), &[1.0, 2.0, 3.0]);
    let replaced = series.with_values(vec![9.0, 8.0, 7.0]).unwrap();

    assert_eq!(replaced.periods(), series.periods());
    assert_eq!(replaced.values(), &[9.0, 8.0, 7.0]);
    assert!(series.with_values(vec![1.0]).is_err());
}

#[test]
fn test_tail_sum() {
    let series = monthly_series(date(2023, 1, 1), &[1.0, 2.0, 3.0, 4.0]);

    assert_eq!(series.tail_sum(2), 7.0);
    assert_eq!(series.tail_sum(10), 10.0);
}
