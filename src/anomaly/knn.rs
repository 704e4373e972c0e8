//! k-nearest-neighbour anomaly baseline
//!
//! Stores the normal training rows; the score of a query row is the mean
//! distance to its k nearest stored rows. While fitting, a normal row is
//! scored without itself so the threshold is not pulled toward zero.

use ndarray::{Array1, Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::debug;

use crate::anomaly::{
    check_width, label_counts, normal_rows, threshold_from_scores, AnomalyDetector, IndexPolicy, NORMAL,
};
use crate::error::{AnomalyError, Result};

/// Distance metric for neighbour search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Euclidean distance (L2)
    Euclidean,
    /// Manhattan distance (L1)
    Manhattan,
}

impl Default for DistanceMetric {
    fn default() -> Self {
        Self::Euclidean
    }
}

impl DistanceMetric {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

/// kNN detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnConfig {
    /// Number of neighbours
    pub n_neighbors: usize,
    /// Distance metric
    pub metric: DistanceMetric,
    /// Tightness of the threshold interpolation
    pub beta: f64,
    /// Out-of-range policy for the threshold order statistics
    pub index_policy: IndexPolicy,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self {
            n_neighbors: 5,
            metric: DistanceMetric::Euclidean,
            beta: 1.0,
            index_policy: IndexPolicy::Clamp,
        }
    }
}

/// Max-heap entry keyed by distance
#[derive(Debug, Clone, Copy)]
struct Neighbor(f64);

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Neighbor {}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
    }
}

/// k-nearest-neighbour anomaly detector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnnDetector {
    config: KnnConfig,
    x_train: Option<Array2<f64>>,
    contamination: f64,
    threshold: f64,
}

impl KnnDetector {
    pub fn new(config: KnnConfig) -> Self {
        Self {
            config,
            x_train: None,
            contamination: 0.0,
            threshold: f64::INFINITY,
        }
    }

    /// Create with default config and specified k
    pub fn with_k(k: usize) -> Self {
        Self::new(KnnConfig {
            n_neighbors: k,
            ..Default::default()
        })
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    /// Mean distance from `point` to its `k` nearest rows of `data`,
    /// skipping the row at index `skip`
    fn mean_knn_distance(
        &self,
        point: ArrayView1<f64>,
        data: &Array2<f64>,
        k: usize,
        skip: Option<usize>,
    ) -> f64 {
        let mut heap: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);
        for (j, row) in data.rows().into_iter().enumerate() {
            if skip == Some(j) {
                continue;
            }
            let dist = self.config.metric.distance(point, row);
            if heap.len() < k {
                heap.push(Neighbor(dist));
            } else if let Some(&Neighbor(max_dist)) = heap.peek() {
                if dist < max_dist {
                    heap.pop();
                    heap.push(Neighbor(dist));
                }
            }
        }
        let n = heap.len().max(1) as f64;
        heap.into_iter().map(|Neighbor(d)| d).sum::<f64>() / n
    }

    /// Scores of the fitting rows. A normal row is stored in `x_train` and is
    /// left out of its own neighbourhood, so it is scored like unseen data.
    fn training_scores(&self, x: &Array2<f64>, y: &Array1<u8>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().ok_or(AnomalyError::ModelNotFitted)?;
        let n_train = x_train.nrows();

        // Position of each normal row of `x` inside `x_train`
        let mut stored = Vec::with_capacity(x.nrows());
        let mut next = 0;
        for &label in y {
            if label == NORMAL {
                stored.push(Some(next));
                next += 1;
            } else {
                stored.push(None);
            }
        }

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let skip = stored[i].filter(|_| n_train > 1);
                let available = n_train - usize::from(skip.is_some());
                let k = self.config.n_neighbors.min(available);
                self.mean_knn_distance(x.row(i), x_train, k, skip)
            })
            .collect();

        Ok(Array1::from_vec(scores))
    }
}

impl Default for KnnDetector {
    fn default() -> Self {
        Self::new(KnnConfig::default())
    }
}

impl AnomalyDetector for KnnDetector {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> Result<()> {
        if self.config.n_neighbors == 0 {
            return Err(AnomalyError::invalid_parameter(
                "n_neighbors",
                0,
                "must be at least 1",
            ));
        }
        let normal = normal_rows(x, y)?;
        let (n_normal, n_anomalous) = label_counts(y)?;
        if n_normal == 0 {
            return Err(AnomalyError::DataError("no normal rows to fit on".to_string()));
        }

        self.x_train = Some(normal);
        self.contamination = n_anomalous as f64 / n_normal as f64;

        let scores = self.training_scores(x, y)?;
        self.threshold = threshold_from_scores(
            &scores.to_vec(),
            self.contamination,
            self.config.beta,
            self.config.index_policy,
        )?;
        debug!(
            k = self.config.n_neighbors,
            contamination = self.contamination,
            threshold = self.threshold,
            "Fitted kNN baseline"
        );
        Ok(())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let x_train = self.x_train.as_ref().ok_or(AnomalyError::ModelNotFitted)?;
        check_width(x, x_train.ncols())?;
        let k = self.config.n_neighbors.min(x_train.nrows());

        let scores: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.mean_knn_distance(x.row(i), x_train, k, None))
            .collect();

        Ok(Array1::from_vec(scores))
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn name(&self) -> &str {
        "knn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn cluster_with_outliers() -> (Array2<f64>, Array1<u8>) {
        let mut data = Vec::new();
        let mut labels = Vec::new();
        for i in 0..20 {
            data.push((i % 5) as f64 * 0.1);
            data.push((i / 5) as f64 * 0.1);
            labels.push(0u8);
        }
        data.extend_from_slice(&[5.0, 5.0, -4.0, 6.0]);
        labels.extend_from_slice(&[1, 1]);
        (
            Array2::from_shape_vec((22, 2), data).unwrap(),
            Array1::from_vec(labels),
        )
    }

    #[test]
    fn test_outliers_score_higher() {
        let (x, y) = cluster_with_outliers();
        let mut knn = KnnDetector::with_k(3);
        knn.fit(&x, &y).unwrap();

        let scores = knn.score_samples(&x).unwrap();
        let max_normal = scores.iter().take(20).cloned().fold(f64::NEG_INFINITY, f64::max);
        assert!(scores[20] > max_normal);
        assert!(scores[21] > max_normal);
    }

    #[test]
    fn test_contamination_is_anomalous_to_normal_ratio() {
        let (x, y) = cluster_with_outliers();
        let mut knn = KnnDetector::with_k(3);
        knn.fit(&x, &y).unwrap();
        assert!((knn.contamination() - 2.0 / 20.0).abs() < 1e-12);

        // a = floor(22 * 0.1) = 2: the lower outlier score is the cutoff
        let labels = knn.predict(&x).unwrap();
        assert_eq!(labels.iter().filter(|&&l| l == 1).count(), 1);
    }

    #[test]
    fn test_training_rows_exclude_themselves() {
        // normal rows 1 apart on a line, one far outlier
        let x = Array2::from_shape_vec((5, 1), vec![0.0, 1.0, 2.0, 3.0, 10.0]).unwrap();
        let y = array![0u8, 0, 0, 0, 1];
        let mut knn = KnnDetector::with_k(1);
        knn.fit(&x, &y).unwrap();

        // queried again, a stored row finds itself at distance 0
        let query_scores = knn.score_samples(&x).unwrap();
        assert_eq!(query_scores[0], 0.0);

        // fitting leaves it out, so its nearest neighbour is 1 away
        let fit_scores = knn.training_scores(&x, &y).unwrap();
        assert_eq!(fit_scores.to_vec(), vec![1.0, 1.0, 1.0, 1.0, 7.0]);

        // a = floor(5 * 0.25) = 1: the outlier score is the cutoff
        assert_eq!(knn.threshold(), 7.0);
    }

    #[test]
    fn test_single_normal_row_keeps_itself() {
        let x = Array2::from_shape_vec((2, 1), vec![0.0, 5.0]).unwrap();
        let y = array![0u8, 1];
        let mut knn = KnnDetector::with_k(3);
        knn.fit(&x, &y).unwrap();
        assert_eq!(knn.training_scores(&x, &y).unwrap().to_vec(), vec![0.0, 5.0]);
    }

    #[test]
    fn test_manhattan_distance() {
        let a = array![0.0, 0.0];
        let b = array![3.0, 4.0];
        assert_eq!(DistanceMetric::Manhattan.distance(a.view(), b.view()), 7.0);
        assert_eq!(DistanceMetric::Euclidean.distance(a.view(), b.view()), 5.0);
    }

    #[test]
    fn test_unfitted_and_invalid() {
        let knn = KnnDetector::default();
        assert!(matches!(
            knn.score_samples(&Array2::zeros((1, 2))),
            Err(AnomalyError::ModelNotFitted)
        ));

        let (x, _) = cluster_with_outliers();
        let all_anomalous = Array1::from_elem(22, 1u8);
        assert!(KnnDetector::with_k(3).fit(&x, &all_anomalous).is_err());
        assert!(KnnDetector::with_k(0).fit(&x, &Array1::zeros(22)).is_err());
    }
}
