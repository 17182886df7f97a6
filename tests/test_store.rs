use assert_approx_eq::assert_approx_eq;
use chrono::{Months, NaiveDate};
use demand_forecast::error::ForecastError;
use demand_forecast::models::ForecastResult;
use demand_forecast::series::TimeSeries;
use demand_forecast::store::{Scenario, ScenarioStore};
use pretty_assertions::assert_eq;

fn monthly_series(values: &[f64]) -> TimeSeries {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let periods: Vec<NaiveDate> = (0..values.len())
        .map(|i| start.checked_add_months(Months::new(i as u32)).unwrap())
        .collect();
    TimeSeries::from_parts(periods, values.to_vec()).unwrap()
}

fn scenario(name: &str, monthly_value: f64) -> Scenario {
    let forecast = ForecastResult::new(monthly_series(&vec![monthly_value; 12]), "test-model");
    Scenario::new(name, format!("{} description", name), forecast, monthly_series(&[50.0; 6]))
}

#[test]
fn test_save_get_list_in_creation_order() {
    let store = ScenarioStore::new();
    store.save(scenario("Base", 100.0));
    store.save(scenario("Upside", 125.0));

    assert_eq!(store.len(), 2);
    assert_eq!(store.get("Base").unwrap().name, "Base");
    assert!(store.get("Missing").is_none());

    let names: Vec<String> = store.list().into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["Base".to_string(), "Upside".to_string()]);
}

#[test]
fn test_save_replaces_by_name() {
    let store = ScenarioStore::new();
    store.save(scenario("Base", 100.0));
    store.save(scenario("Base", 140.0));

    assert_eq!(store.len(), 1);
    assert_approx_eq!(store.get("Base").unwrap().forecast.total(), 140.0 * 12.0);
}

#[test]
fn test_single_approval_invariant() {
    let store = ScenarioStore::new();
    store.save(scenario("A", 100.0));
    store.save(scenario("B", 125.0));

    store.approve("A").unwrap();
    store.approve("B").unwrap();
    assert_eq!(store.get_approved().unwrap().name, "B");

    store.delete("B").unwrap();
    assert!(store.get_approved().is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_approve_unknown_scenario() {
    let store = ScenarioStore::new();
    assert!(matches!(
        store.approve("Ghost"),
        Err(ForecastError::NotFound(_))
    ));
}

#[test]
fn test_delete_unknown_scenario() {
    let store = ScenarioStore::new();
    assert!(matches!(
        store.delete("Ghost"),
        Err(ForecastError::NotFound(_))
    ));
}

#[test]
fn test_revoke_approval() {
    let store = ScenarioStore::new();
    store.save(scenario("A", 100.0));
    store.approve("A").unwrap();

    store.revoke_approval();
    assert!(store.get_approved().is_none());
    assert_eq!(store.len(), 1);
}

#[test]
fn test_clear_removes_everything() {
    let store = ScenarioStore::new();
    store.save(scenario("A", 100.0));
    store.approve("A").unwrap();

    store.clear();
    assert!(store.is_empty());
    assert!(store.get_approved().is_none());
}

#[test]
fn test_compare_reports_variance_against_first() {
    let store = ScenarioStore::new();
    store.save(scenario("A", 100.0)); // total 1200
    store.save(scenario("B", 125.0)); // total 1500

    let rows = store.compare(&["A", "B"]).unwrap();

    assert_eq!(rows.len(), 2);
    assert_approx_eq!(rows[0].total_forecast, 1200.0);
    assert_approx_eq!(rows[0].variance_units, 0.0);
    assert_approx_eq!(rows[0].variance_pct, 0.0);

    assert_approx_eq!(rows[1].total_forecast, 1500.0);
    assert_approx_eq!(rows[1].monthly_average, 125.0);
    assert_approx_eq!(rows[1].variance_units, 300.0);
    assert_approx_eq!(rows[1].variance_pct, 25.0);
}

#[test]
fn test_compare_needs_two_scenarios() {
    let store = ScenarioStore::new();
    store.save(scenario("A", 100.0));

    match store.compare(&["A"]) {
        Err(ForecastError::InsufficientSelection { required, actual }) => {
            assert_eq!(required, 2);
            assert_eq!(actual, 1);
        }
        other => panic!("Expected InsufficientSelection, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_compare_unknown_name() {
    let store = ScenarioStore::new();
    store.save(scenario("A", 100.0));

    assert!(matches!(
        store.compare(&["A", "Ghost"]),
        Err(ForecastError::NotFound(_))
    ));
}

#[test]
fn test_json_round_trip() {
    let store = ScenarioStore::new();
    store.save(scenario("Base", 100.0));
    store.save(scenario("Upside", 125.0));
    store.approve("Upside").unwrap();

    let json = store.to_json().unwrap();
    let restored = ScenarioStore::from_json(&json).unwrap();

    assert_eq!(restored.list(), store.list());
    assert_eq!(restored.get_approved(), store.get_approved());
}

#[test]
fn test_import_rejects_dangling_approval() {
    let json = r#"{
        "scenarios": [],
        "approved": "Ghost",
        "exported_at": "2026-01-15T12:00:00Z"
    }"#;

    assert!(matches!(
        ScenarioStore::from_json(json),
        Err(ForecastError::NotFound(_))
    ));
}

#[test]
fn test_import_rejects_malformed_json() {
    assert!(matches!(
        ScenarioStore::from_json("{ not json"),
        Err(ForecastError::SerializationError(_))
    ));
}
