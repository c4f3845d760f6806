use cluster_sentinel::metrics::{evaluate, MetricDomain, MetricSeries, ThresholdPair};
use cluster_sentinel::types::Severity;
use proptest::prelude::*;

#[test]
fn test_ring_keeps_most_recent_five() {
    let mut series = MetricSeries::ring("cpu_percent", 5);
    for value in [1.0, 2.0, 3.0, 4.0, 5.0, 6.0] {
        series.append(value);
    }
    assert_eq!(series.snapshot(), vec![2.0, 3.0, 4.0, 5.0, 6.0]);
}

#[test]
fn test_threshold_bands() {
    let pair = ThresholdPair::new(Some(80.0), Some(95.0));
    assert_eq!(evaluate(90.0, &pair, MetricDomain::Percentage), Severity::Warning);
    assert_eq!(evaluate(97.0, &pair, MetricDomain::Percentage), Severity::Error);
    assert_eq!(evaluate(50.0, &pair, MetricDomain::Percentage), Severity::Ok);
}

#[test]
fn test_zero_capacity_is_unbounded() {
    let mut series = MetricSeries::ring("fd_count", 0);
    for value in 0..5000 {
        series.append(value as f64);
    }
    assert_eq!(series.len(), 5000);
}

proptest! {
    /// Ring retention: after any append sequence the series holds exactly
    /// the most recent values, capped at capacity, in arrival order.
    #[test]
    fn prop_ring_holds_most_recent(
        values in prop::collection::vec(-1e9_f64..1e9, 0..200),
        capacity in 1usize..16,
    ) {
        let mut series = MetricSeries::ring("prop", capacity);
        for &value in &values {
            series.append(value);
        }
        let expected: Vec<f64> = values
            .iter()
            .copied()
            .skip(values.len().saturating_sub(capacity))
            .collect();
        prop_assert_eq!(series.snapshot(), expected);
        prop_assert!(series.len() <= capacity);
    }

    /// Disabled thresholds never raise, whatever the sampled value is.
    #[test]
    fn prop_unconfigured_thresholds_never_raise(
        value in -1e9_f64..1e9,
        warning in prop::option::of(-1e6_f64..=0.0),
        error in prop::option::of(-1e6_f64..=0.0),
    ) {
        let pair = ThresholdPair::new(warning, error);
        prop_assert_eq!(evaluate(value, &pair, MetricDomain::Count), Severity::Ok);
    }
}
