/// Integration tests for growth-rate handling: override parsing as the CLI
/// feeds it, matrix application against configured bounds, and the wire
/// shape shared with the forecast API.
use obrcast::api::types::ImpactRequest;
use obrcast::config::schema::RatesConfig;
use obrcast::rates::{GrowthRateMatrix, RateCategory, parse_overrides};

// ===========================================================================
// 1. CLI override pipeline
// ===========================================================================

#[test]
fn override_list_parses_mixed_notations() {
    let inputs = vec![
        "earned_income:2026=3.5%".to_string(),
        "inflation:2027=0.02".to_string(),
        "capital_income:2028=-1.5%".to_string(),
    ];
    let overrides = parse_overrides(&inputs).unwrap();
    assert_eq!(overrides.len(), 3);
    assert!((overrides[0].rate - 0.035).abs() < 1e-12);
    assert!((overrides[1].rate - 0.02).abs() < 1e-12);
    assert!((overrides[2].rate + 0.015).abs() < 1e-12);
}

#[test]
fn one_bad_override_fails_the_whole_list() {
    let inputs = vec![
        "inflation:2027=2%".to_string(),
        "not-an-override".to_string(),
    ];
    let err = parse_overrides(&inputs).unwrap_err();
    assert!(err.to_string().contains("not-an-override"));
}

#[test]
fn overrides_apply_on_top_of_defaults_with_clamping() {
    let bounds = RatesConfig::default(); // [-0.10, 0.20]

    // Server defaults for two years
    let mut matrix = GrowthRateMatrix::default();
    matrix.set(RateCategory::EarnedIncome, 2026, 0.030);
    matrix.set(RateCategory::EarnedIncome, 2027, 0.028);
    matrix.set(RateCategory::Inflation, 2026, 0.020);

    let overrides = parse_overrides(&[
        "earned_income:2027=5%".to_string(),
        "inflation:2026=80%".to_string(), // far out of bounds
    ])
    .unwrap();

    for ovr in &overrides {
        matrix.apply(ovr, &bounds);
    }

    // Untouched default survives, override replaces, out-of-bounds clamps
    assert_eq!(matrix.get(RateCategory::EarnedIncome, 2026), Some(0.030));
    assert_eq!(matrix.get(RateCategory::EarnedIncome, 2027), Some(0.05));
    assert_eq!(matrix.get(RateCategory::Inflation, 2026), Some(0.20));
}

// ===========================================================================
// 2. Wire shape
// ===========================================================================

#[test]
fn custom_request_serializes_the_full_matrix() {
    let mut matrix = GrowthRateMatrix::default();
    for category in RateCategory::ALL {
        matrix.set(category, 2026, 0.01);
        matrix.set(category, 2027, 0.015);
    }

    let request = ImpactRequest::custom(matrix);
    let json = serde_json::to_value(&request).unwrap();

    assert_eq!(json["forecast_id"], "custom");
    for key in ["earned_income", "mixed_income", "capital_income", "inflation"] {
        assert_eq!(json["growth_rates"][key]["2026"], 0.01);
        assert_eq!(json["growth_rates"][key]["2027"], 0.015);
    }
}

#[test]
fn official_request_omits_growth_rates_entirely() {
    let request = ImpactRequest::official("spring_2025");
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["forecast_id"], "spring_2025");
    assert!(json.get("growth_rates").is_none());
}

#[test]
fn metadata_default_rates_round_trip_from_server_json() {
    let json = r#"{
        "earned_income": {"2026": 0.032, "2027": 0.028},
        "mixed_income": {"2026": 0.030},
        "capital_income": {},
        "inflation": {"2026": 0.021, "2027": 0.019}
    }"#;
    let matrix: GrowthRateMatrix = serde_json::from_str(json).unwrap();

    assert_eq!(matrix.get(RateCategory::EarnedIncome, 2026), Some(0.032));
    assert_eq!(matrix.get(RateCategory::CapitalIncome, 2026), None);
    assert_eq!(matrix.years(), vec![2026, 2027]);
    assert!(!matrix.is_empty());
}
