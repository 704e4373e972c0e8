//! ROC analysis and confusion-matrix metrics

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{AnomalyError, Result};

fn check_lengths(scores: &Array1<f64>, labels: &Array1<u8>) -> Result<()> {
    if scores.len() != labels.len() {
        return Err(AnomalyError::ShapeError {
            expected: format!("{} labels", scores.len()),
            actual: format!("{} labels", labels.len()),
        });
    }
    Ok(())
}

fn class_counts(labels: &Array1<u8>) -> Result<(usize, usize)> {
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(AnomalyError::ComputationError(
            "ROC analysis needs both normal and anomalous labels".to_string(),
        ));
    }
    Ok((positives, negatives))
}

/// Area under the ROC curve, anomalous (label 1) as the positive class.
///
/// Uses the rank-sum formulation; tied scores receive their average rank.
pub fn roc_auc(scores: &Array1<f64>, labels: &Array1<u8>) -> Result<f64> {
    check_lengths(scores, labels)?;
    let (positives, negatives) = class_counts(labels)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie group i..=j
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = labels
        .iter()
        .zip(ranks.iter())
        .filter(|&(&l, _)| l == 1)
        .map(|(_, &r)| r)
        .sum();

    let p = positives as f64;
    let n = negatives as f64;
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// ROC curve points, ordered by decreasing threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub false_positive_rate: Vec<f64>,
    pub true_positive_rate: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// ROC curve with one point per distinct score, starting at (0, 0)
pub fn roc_curve(scores: &Array1<f64>, labels: &Array1<u8>) -> Result<RocCurve> {
    check_lengths(scores, labels)?;
    let (positives, negatives) = class_counts(labels)?;

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut curve = RocCurve {
        false_positive_rate: vec![0.0],
        true_positive_rate: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };

    let (mut tp, mut fp) = (0usize, 0usize);
    for (k, &idx) in order.iter().enumerate() {
        if labels[idx] == 1 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_group = k + 1 == order.len() || scores[order[k + 1]] != scores[idx];
        if last_of_group {
            curve.true_positive_rate.push(tp as f64 / positives as f64);
            curve.false_positive_rate.push(fp as f64 / negatives as f64);
            curve.thresholds.push(scores[idx]);
        }
    }

    Ok(curve)
}

impl RocCurve {
    /// Trapezoidal area under the curve
    pub fn area(&self) -> f64 {
        self.false_positive_rate
            .windows(2)
            .zip(self.true_positive_rate.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
            .sum()
    }
}

/// Metrics of hard 0/1 predictions, anomalous as the positive class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ClassificationMetrics {
    pub fn compute(labels: &Array1<u8>, predictions: &Array1<u8>) -> Result<Self> {
        if labels.len() != predictions.len() {
            return Err(AnomalyError::ShapeError {
                expected: format!("{} predictions", labels.len()),
                actual: format!("{} predictions", predictions.len()),
            });
        }
        if labels.is_empty() {
            return Err(AnomalyError::DataError("no predictions to evaluate".to_string()));
        }

        let (mut tp, mut fp, mut tn, mut fn_) = (0, 0, 0, 0);
        for (&t, &p) in labels.iter().zip(predictions.iter()) {
            match (t == 1, p == 1) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (false, false) => tn += 1,
                (true, false) => fn_ += 1,
            }
        }

        let precision = if tp + fp > 0 { tp as f64 / (tp + fp) as f64 } else { 0.0 };
        let recall = if tp + fn_ > 0 { tp as f64 / (tp + fn_) as f64 } else { 0.0 };
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy: (tp + tn) as f64 / labels.len() as f64,
            precision,
            recall,
            f1_score,
            true_positives: tp,
            false_positives: fp,
            true_negatives: tn,
            false_negatives: fn_,
        })
    }
}
