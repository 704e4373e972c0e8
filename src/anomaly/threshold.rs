//! Contamination-based threshold selection
//!
//! Scores are sorted ascending and `a = max(1, floor(N·c))` instances are
//! presumed anomalous. With 0-indexed sorted scores `s`, the threshold is
//!
//! ```text
//! β · s[N-a] + (1-β) · s[N-a+1]
//! ```
//!
//! so β = 1 selects the a-th highest score and smaller β interpolates toward
//! the (a-1)-th highest, one order statistic above it.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{AnomalyError, Result};

/// What to do when an order-statistic index falls outside the sorted scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexPolicy {
    /// Clamp indices into `0..N`: `a` is capped at `N` and the upper
    /// interpolation partner at index `N-1`
    Clamp,
    /// Fail with [`AnomalyError::ThresholdError`]
    Reject,
}

impl Default for IndexPolicy {
    fn default() -> Self {
        Self::Clamp
    }
}

/// Number of instances presumed anomalous among `n` at contamination `c`
pub fn anomalous_count(n: usize, contamination: f64) -> usize {
    ((n as f64 * contamination).floor() as usize).max(1)
}

/// Threshold from already computed anomaly scores.
///
/// `contamination` must be finite and non-negative. It may exceed 1 (the
/// anomalous-to-normal label ratio can), in which case `a > N` and the
/// `policy` decides. `beta` must lie in `[0, 1]`.
pub fn threshold_from_scores(
    scores: &[f64],
    contamination: f64,
    beta: f64,
    policy: IndexPolicy,
) -> Result<f64> {
    if scores.is_empty() {
        return Err(AnomalyError::ThresholdError(
            "cannot derive a threshold from zero scores".to_string(),
        ));
    }
    if !contamination.is_finite() || contamination < 0.0 {
        return Err(AnomalyError::invalid_parameter(
            "contamination",
            contamination,
            "must be finite and non-negative",
        ));
    }
    if !(0.0..=1.0).contains(&beta) {
        return Err(AnomalyError::invalid_parameter("beta", beta, "must lie in [0, 1]"));
    }
    if scores.iter().any(|s| s.is_nan()) {
        return Err(AnomalyError::ComputationError(
            "anomaly scores contain NaN".to_string(),
        ));
    }

    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let n = sorted.len();
    let mut a = anomalous_count(n, contamination);

    if a > n {
        match policy {
            IndexPolicy::Clamp => {
                warn!(presumed = a, available = n, "Clamping anomalous count to the number of scores");
                a = n;
            }
            IndexPolicy::Reject => {
                return Err(AnomalyError::ThresholdError(format!(
                    "{} presumed anomalies exceed the {} available scores",
                    a, n
                )))
            }
        }
    }

    let cutoff = sorted[n - a];
    if beta == 1.0 {
        return Ok(cutoff);
    }

    let partner = if a > 1 {
        sorted[n - a + 1]
    } else {
        match policy {
            IndexPolicy::Clamp => sorted[n - 1],
            IndexPolicy::Reject => {
                return Err(AnomalyError::ThresholdError(
                    "no order statistic above the highest score to interpolate with".to_string(),
                ))
            }
        }
    };

    Ok(beta * cutoff + (1.0 - beta) * partner)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_to_ten() -> Vec<f64> {
        (1..=10).map(|v| v as f64).collect()
    }

    #[test]
    fn test_reference_order_statistics() {
        let scores = one_to_ten();
        assert_eq!(threshold_from_scores(&scores, 0.1, 1.0, IndexPolicy::Clamp).unwrap(), 10.0);
        assert_eq!(threshold_from_scores(&scores, 0.3, 1.0, IndexPolicy::Clamp).unwrap(), 8.0);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let scores = vec![7.0, 2.0, 10.0, 1.0, 5.0, 9.0, 3.0, 8.0, 4.0, 6.0];
        assert_eq!(threshold_from_scores(&scores, 0.3, 1.0, IndexPolicy::Clamp).unwrap(), 8.0);
    }

    #[test]
    fn test_monotone_in_contamination() {
        let scores = one_to_ten();
        let mut previous = f64::INFINITY;
        for step in 0..=10 {
            let c = step as f64 / 10.0;
            let t = threshold_from_scores(&scores, c, 1.0, IndexPolicy::Clamp).unwrap();
            assert!(t <= previous, "threshold rose from {} to {} at c = {}", previous, t, c);
            previous = t;
        }
    }

    #[test]
    fn test_beta_interpolates_toward_next_higher_score() {
        let scores = one_to_ten();
        // a = 3: cutoff = 8, partner = 9
        let t = threshold_from_scores(&scores, 0.3, 0.5, IndexPolicy::Clamp).unwrap();
        assert!((t - 8.5).abs() < 1e-12);
        let t = threshold_from_scores(&scores, 0.3, 0.25, IndexPolicy::Clamp).unwrap();
        assert!((t - 8.75).abs() < 1e-12);
        let t0 = threshold_from_scores(&scores, 0.3, 0.0, IndexPolicy::Clamp).unwrap();
        assert_eq!(t0, 9.0);
    }

    #[test]
    fn test_single_anomaly_clamps_partner() {
        let scores = one_to_ten();
        // a = 1: no score above the highest
        assert_eq!(threshold_from_scores(&scores, 0.1, 0.5, IndexPolicy::Clamp).unwrap(), 10.0);
        assert!(matches!(
            threshold_from_scores(&scores, 0.1, 0.5, IndexPolicy::Reject),
            Err(AnomalyError::ThresholdError(_))
        ));
        assert_eq!(threshold_from_scores(&scores, 0.1, 1.0, IndexPolicy::Reject).unwrap(), 10.0);
    }

    #[test]
    fn test_zero_contamination_still_flags_one() {
        assert_eq!(anomalous_count(10, 0.0), 1);
        let t = threshold_from_scores(&one_to_ten(), 0.0, 1.0, IndexPolicy::Clamp).unwrap();
        assert_eq!(t, 10.0);
    }

    #[test]
    fn test_full_contamination_interpolates_with_second_lowest() {
        let scores = one_to_ten();
        // a = N: cutoff = 1, partner = 2
        assert_eq!(threshold_from_scores(&scores, 1.0, 1.0, IndexPolicy::Clamp).unwrap(), 1.0);
        assert_eq!(threshold_from_scores(&scores, 1.0, 0.5, IndexPolicy::Clamp).unwrap(), 1.5);
        assert_eq!(threshold_from_scores(&scores, 1.0, 0.5, IndexPolicy::Reject).unwrap(), 1.5);
    }

    #[test]
    fn test_contamination_above_one() {
        let scores = one_to_ten();
        assert_eq!(threshold_from_scores(&scores, 1.5, 1.0, IndexPolicy::Clamp).unwrap(), 1.0);
        assert!(matches!(
            threshold_from_scores(&scores, 1.5, 1.0, IndexPolicy::Reject),
            Err(AnomalyError::ThresholdError(_))
        ));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(threshold_from_scores(&[], 0.1, 1.0, IndexPolicy::Clamp).is_err());
        assert!(threshold_from_scores(&[1.0], -0.1, 1.0, IndexPolicy::Clamp).is_err());
        assert!(threshold_from_scores(&[1.0], 0.1, 1.5, IndexPolicy::Clamp).is_err());
        assert!(threshold_from_scores(&[1.0, f64::NAN], 0.1, 1.0, IndexPolicy::Clamp).is_err());
    }
}
