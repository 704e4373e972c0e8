//! Anomaly detection
//!
//! Reconstruction-based detectors ([`Autoencoder`], [`VariationalAutoencoder`])
//! score each instance by how badly it is reconstructed; [`KnnDetector`]
//! scores by distance to the nearest normal instances. All of them turn
//! scores into 0/1 labels through a contamination-derived threshold.

mod autoencoder;
mod knn;
mod model;
mod threshold;
mod vae;

pub use autoencoder::Autoencoder;
pub use knn::{DistanceMetric, KnnConfig, KnnDetector};
pub use model::{AnomalyModel, AutoencoderModel, ModelConfig, VaeModel};
pub use threshold::{anomalous_count, threshold_from_scores, IndexPolicy};
pub use vae::VariationalAutoencoder;

use ndarray::{Array1, Array2, Axis};

use crate::error::{AnomalyError, Result};
use crate::training::TrainStep;

/// Label of a normal instance
pub const NORMAL: u8 = 0;
/// Label of an anomalous instance
pub const ANOMALOUS: u8 = 1;

/// Common interface of supervised-threshold anomaly detectors.
///
/// `fit` learns from the normal rows of `x` (label 0) and uses the full
/// labeled set to place the decision threshold.
pub trait AnomalyDetector {
    /// Fit on labeled data
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> Result<()>;

    /// Anomaly score of every row, higher means more anomalous
    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// 0/1 label of every row
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>> {
        let threshold = self.threshold();
        Ok(self.score_samples(x)?.mapv(|s| label_for(s, threshold)))
    }

    /// Current decision threshold
    fn threshold(&self) -> f64;

    /// Short name used in reports
    fn name(&self) -> &str;
}

/// A trainable model that reconstructs its input
pub trait Reconstructor: TrainStep {
    /// Number of features per instance
    fn input_dim(&self) -> usize;

    /// Reconstruction of every row of `x`
    fn reconstruct(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    /// Mean squared reconstruction error over all rows and features
    fn loss(&self, x: &Array2<f64>) -> Result<f64> {
        let recon = self.reconstruct(x)?;
        if x.is_empty() {
            return Err(AnomalyError::DataError("loss of an empty batch".to_string()));
        }
        Ok((&recon - x).mapv(|d| d * d).sum() / x.len() as f64)
    }

    /// Per-instance anomaly score: mean squared error of each row.
    ///
    /// One value per row, never averaged across the batch.
    fn anomaly_score(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let recon = self.reconstruct(x)?;
        Ok(row_mse(&recon, x))
    }

    /// 1 where the anomaly score is strictly greater than `threshold`
    fn classify(&self, x: &Array2<f64>, threshold: f64) -> Result<Array1<u8>> {
        Ok(self.anomaly_score(x)?.mapv(|s| label_for(s, threshold)))
    }

    /// Contamination-based threshold over the rows of a reference set
    fn compute_threshold(
        &self,
        x: &Array2<f64>,
        contamination: f64,
        beta: f64,
        policy: IndexPolicy,
    ) -> Result<f64> {
        let scores = self.anomaly_score(x)?;
        threshold_from_scores(&scores.to_vec(), contamination, beta, policy)
    }
}

/// Strict comparison: a score equal to the threshold is normal
pub fn label_for(score: f64, threshold: f64) -> u8 {
    if score > threshold {
        ANOMALOUS
    } else {
        NORMAL
    }
}

pub(crate) fn row_mse(recon: &Array2<f64>, x: &Array2<f64>) -> Array1<f64> {
    let d = x.ncols().max(1) as f64;
    (recon - x).mapv(|v| v * v).sum_axis(Axis(1)) / d
}

pub(crate) fn check_width(x: &Array2<f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(AnomalyError::shape(
            format!("{} features per row", expected),
            format!("{} features", x.ncols()),
        ));
    }
    Ok(())
}

/// Count labels, returning (normal, anomalous)
pub(crate) fn label_counts(y: &Array1<u8>) -> Result<(usize, usize)> {
    let mut normal = 0;
    let mut anomalous = 0;
    for &label in y {
        match label {
            NORMAL => normal += 1,
            ANOMALOUS => anomalous += 1,
            other => {
                return Err(AnomalyError::DataError(format!(
                    "labels must be 0 or 1, found {}",
                    other
                )))
            }
        }
    }
    Ok((normal, anomalous))
}

/// Rows of `x` whose label is normal
pub(crate) fn normal_rows(x: &Array2<f64>, y: &Array1<u8>) -> Result<Array2<f64>> {
    if x.nrows() != y.len() {
        return Err(AnomalyError::shape(
            format!("{} labels", x.nrows()),
            format!("{} labels", y.len()),
        ));
    }
    let indices: Vec<usize> = y
        .iter()
        .enumerate()
        .filter(|&(_, &label)| label == NORMAL)
        .map(|(i, _)| i)
        .collect();
    Ok(x.select(Axis(0), &indices))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_label_for_is_strict() {
        assert_eq!(label_for(1.0, 1.0), NORMAL);
        assert_eq!(label_for(1.0 + 1e-12, 1.0), ANOMALOUS);
        assert_eq!(label_for(0.5, 1.0), NORMAL);
    }

    #[test]
    fn test_row_mse_is_per_row() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let recon = array![[1.0, 1.0], [1.0, 1.0]];
        assert_eq!(row_mse(&recon, &x), array![1.0, 0.0]);
    }

    #[test]
    fn test_label_counts_and_normal_rows() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![0u8, 1, 0, 0];
        assert_eq!(label_counts(&y).unwrap(), (3, 1));
        assert_eq!(normal_rows(&x, &y).unwrap(), array![[1.0], [3.0], [4.0]]);
        assert!(label_counts(&array![0u8, 2]).is_err());
        assert!(normal_rows(&x, &array![0u8, 1]).is_err());
    }
}
