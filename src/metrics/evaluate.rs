use crate::types::Severity;
use serde::{Deserialize, Serialize};

/// Value domain a threshold applies to.
///
/// Percentage metrics reject thresholds above 100; counts and sizes accept
/// any positive level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricDomain {
    Percentage,
    Count,
}

/// A {warning, error} threshold pair. Either side may be absent, which
/// disables that check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThresholdPair {
    pub warning: Option<f64>,
    pub error: Option<f64>,
}

impl ThresholdPair {
    pub fn new(warning: Option<f64>, error: Option<f64>) -> Self {
        Self { warning, error }
    }

    /// Pair with both checks disabled
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Take the other pair's levels where this one has none
    pub fn or(self, fallback: ThresholdPair) -> Self {
        Self {
            warning: self.warning.or(fallback.warning),
            error: self.error.or(fallback.error),
        }
    }
}

/// The single shared disable-threshold policy.
///
/// A level participates in evaluation only when it is finite and strictly
/// positive, and, for percentage metrics, no greater than 100. Anything
/// else means the operator turned the check off (possibly by accident) and
/// the check is skipped rather than failed. Very large positive levels for
/// count metrics are legitimate.
pub fn threshold_enabled(level: Option<f64>, domain: MetricDomain) -> Option<f64> {
    let level = level?;
    if !level.is_finite() || level <= 0.0 {
        return None;
    }
    if domain == MetricDomain::Percentage && level > 100.0 {
        return None;
    }
    Some(level)
}

/// Map a sampled value to a severity against a threshold pair.
///
/// Error wins over Warning; a disabled level never raises.
pub fn evaluate(value: f64, thresholds: &ThresholdPair, domain: MetricDomain) -> Severity {
    if let Some(error_level) = threshold_enabled(thresholds.error, domain) {
        if value >= error_level {
            return Severity::Error;
        }
    }
    if let Some(warning_level) = threshold_enabled(thresholds.warning, domain) {
        if value >= warning_level {
            return Severity::Warning;
        }
    }
    Severity::Ok
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluate_bands() {
        let pair = ThresholdPair::new(Some(80.0), Some(95.0));
        assert_eq!(evaluate(50.0, &pair, MetricDomain::Percentage), Severity::Ok);
        assert_eq!(
            evaluate(90.0, &pair, MetricDomain::Percentage),
            Severity::Warning
        );
        assert_eq!(
            evaluate(97.0, &pair, MetricDomain::Percentage),
            Severity::Error
        );
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let pair = ThresholdPair::new(Some(80.0), Some(95.0));
        assert_eq!(
            evaluate(80.0, &pair, MetricDomain::Percentage),
            Severity::Warning
        );
        assert_eq!(
            evaluate(95.0, &pair, MetricDomain::Percentage),
            Severity::Error
        );
    }

    #[test]
    fn test_bad_levels_disable_the_check() {
        // Negative, zero, NaN, infinite, and out-of-domain percentages all
        // read as "not configured" and must never raise.
        for bad in [
            Some(-1000.0),
            Some(0.0),
            Some(f64::NAN),
            Some(f64::INFINITY),
            Some(150.0),
            None,
        ] {
            let pair = ThresholdPair::new(bad, bad);
            assert_eq!(
                evaluate(99.9, &pair, MetricDomain::Percentage),
                Severity::Ok,
                "level {:?} should be disabled",
                bad
            );
        }
    }

    #[test]
    fn test_large_count_levels_are_legitimate() {
        let pair = ThresholdPair::new(Some(500_000.0), None);
        assert_eq!(
            evaluate(400_000.0, &pair, MetricDomain::Count),
            Severity::Ok
        );
        assert_eq!(
            evaluate(600_000.0, &pair, MetricDomain::Count),
            Severity::Warning
        );
    }

    #[test]
    fn test_error_only_pair() {
        let pair = ThresholdPair::new(None, Some(90.0));
        assert_eq!(evaluate(85.0, &pair, MetricDomain::Percentage), Severity::Ok);
        assert_eq!(
            evaluate(92.0, &pair, MetricDomain::Percentage),
            Severity::Error
        );
    }

    #[test]
    fn test_pair_fallback() {
        let override_pair = ThresholdPair::new(Some(70.0), None);
        let defaults = ThresholdPair::new(Some(80.0), Some(95.0));
        let merged = override_pair.or(defaults);
        assert_eq!(merged.warning, Some(70.0));
        assert_eq!(merged.error, Some(95.0));
    }
}
