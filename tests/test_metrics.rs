use assert_approx_eq::assert_approx_eq;
use demand_forecast::metrics::{accuracy, normal_quantile, BIAS, MAE, MAPE, RMSE, TRACKING_SIGNAL};

#[test]
fn test_perfect_forecast() {
    let actual = vec![100.0, 110.0, 120.0];
    let metrics = accuracy(&actual, &actual).unwrap();

    assert_approx_eq!(metrics[MAPE], 0.0);
    assert_approx_eq!(metrics[RMSE], 0.0);
    assert_approx_eq!(metrics[MAE], 0.0);
    assert_approx_eq!(metrics[BIAS], 0.0);
    // With zero deviation the tracking signal is undefined and omitted.
    assert!(!metrics.contains_key(TRACKING_SIGNAL));
}

#[test]
fn test_symmetric_errors() {
    let actual = vec![100.0, 100.0];
    let forecast = vec![110.0, 90.0];
    let metrics = accuracy(&actual, &forecast).unwrap();

    assert_approx_eq!(metrics[MAPE], 10.0);
    assert_approx_eq!(metrics[RMSE], 10.0);
    assert_approx_eq!(metrics[MAE], 10.0);
    assert_approx_eq!(metrics[BIAS], 0.0);
    assert_approx_eq!(metrics[TRACKING_SIGNAL], 0.0);
}

#[test]
fn test_zero_actuals_excluded_from_mape() {
    let actual = vec![0.0, 100.0];
    let forecast = vec![10.0, 110.0];
    let metrics = accuracy(&actual, &forecast).unwrap();

    assert_approx_eq!(metrics[MAPE], 10.0);
    assert_approx_eq!(metrics[RMSE], 10.0);
}

#[test]
fn test_all_zero_actuals_omit_mape() {
    let actual = vec![0.0, 0.0];
    let forecast = vec![5.0, 5.0];
    let metrics = accuracy(&actual, &forecast).unwrap();

    assert!(!metrics.contains_key(MAPE));
    assert_approx_eq!(metrics[BIAS], 5.0);
}

#[test]
fn test_consistent_bias_moves_tracking_signal() {
    let actual = vec![100.0, 100.0, 100.0];
    let forecast = vec![110.0, 110.0, 110.0];
    let metrics = accuracy(&actual, &forecast).unwrap();

    // Cumulative error 30 over a MAD of 10.
    assert_approx_eq!(metrics[TRACKING_SIGNAL], 3.0);
}

#[test]
fn test_length_mismatch_is_an_error() {
    assert!(accuracy(&[1.0], &[1.0, 2.0]).is_err());
    assert!(accuracy(&[], &[]).is_err());
}

#[test]
fn test_normal_quantile() {
    assert_approx_eq!(normal_quantile(0.95).unwrap(), 1.96, 1e-2);
    assert_approx_eq!(normal_quantile(0.99).unwrap(), 2.576, 1e-2);
    assert!(normal_quantile(0.0).is_err());
    assert!(normal_quantile(1.0).is_err());
}
