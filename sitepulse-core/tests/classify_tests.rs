// Tests for metric classification

use proptest::prelude::*;
use sitepulse_core::classify::{
    ClassifiedRecord, CutStyle, Rating, classify, summarize, thresholds,
};
use sitepulse_scanner::{Device, MeasurementResult, Metric};

fn record(load_time: Option<f64>) -> ClassifiedRecord {
    let mut result = MeasurementResult::new("https://example.com/".to_string(), Device::Desktop);
    result.set(Metric::LoadTime, load_time);
    ClassifiedRecord::new(result, &[Metric::LoadTime])
}

// ============================================================================
// Fixed Points
// ============================================================================

#[test]
fn test_load_time_three_seconds_is_moderate() {
    assert_eq!(classify(Metric::LoadTime, Some(3.0)), Rating::Moderate);
    assert_eq!(classify(Metric::LoadTime, Some(2.999)), Rating::Good);
}

#[test]
fn test_absent_is_always_not_available() {
    for metric in Metric::ALL {
        assert_eq!(classify(metric, None), Rating::NotAvailable);
    }
}

#[test]
fn test_record_rates_only_requested_metrics() {
    let rec = record(Some(7.2));
    assert_eq!(rec.rating(Metric::LoadTime), Rating::Poor);
    assert_eq!(rec.rating(Metric::Lcp), Rating::NotAvailable);
}

// ============================================================================
// Summaries
// ============================================================================

#[test]
fn test_summarize_counts_and_percentages() {
    let records = vec![
        record(Some(1.2)),
        record(Some(2.5)),
        record(Some(3.5)),
        record(Some(9.0)),
        record(None),
    ];
    let summary = summarize(&records, Metric::LoadTime);

    assert_eq!(summary.good, 2);
    assert_eq!(summary.moderate, 1);
    assert_eq!(summary.poor, 1);
    assert_eq!(summary.not_available, 1);
    assert_eq!(summary.total(), 5);
    assert!((summary.percentage(Rating::Good) - 40.0).abs() < 1e-9);
}

#[test]
fn test_summarize_empty() {
    let records: Vec<ClassifiedRecord> = Vec::new();
    let summary = summarize(&records, Metric::LoadTime);
    assert_eq!(summary.total(), 0);
    assert_eq!(summary.percentage(Rating::Good), 0.0);
}

// ============================================================================
// Properties
// ============================================================================

fn metric() -> impl Strategy<Value = Metric> {
    prop::sample::select(Metric::ALL.to_vec())
}

fn rank(rating: Rating) -> u8 {
    match rating {
        Rating::Good => 0,
        Rating::Moderate => 1,
        Rating::Poor => 2,
        Rating::NotAvailable => 3,
    }
}

proptest! {
    #[test]
    fn prop_finite_values_get_a_live_rating(m in metric(), v in -1.0e6f64..1.0e6) {
        prop_assert_ne!(classify(m, Some(v)), Rating::NotAvailable);
    }

    #[test]
    fn prop_rating_is_monotonic(m in metric(), a in 0.0f64..1000.0, b in 0.0f64..1000.0) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let low_rank = rank(classify(m, Some(low)));
        let high_rank = rank(classify(m, Some(high)));
        if thresholds(m).style == CutStyle::AtLeast {
            prop_assert!(high_rank <= low_rank);
        } else {
            prop_assert!(low_rank <= high_rank);
        }
    }

    #[test]
    fn prop_summary_total_matches_input(values in prop::collection::vec(prop::option::of(0.0f64..20.0), 0..50)) {
        let records: Vec<ClassifiedRecord> = values.iter().map(|v| record(*v)).collect();
        let summary = summarize(&records, Metric::LoadTime);
        prop_assert_eq!(summary.total(), values.len());
        prop_assert_eq!(summary.not_available, values.iter().filter(|v| v.is_none()).count());
    }
}
