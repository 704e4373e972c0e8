//! In-memory labeled dataset

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

use crate::anomaly::{label_counts, normal_rows, ANOMALOUS, NORMAL};
use crate::error::{AnomalyError, Result};

/// Feature matrix with 0/1 labels, one row per instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub x: Array2<f64>,
    pub y: Array1<u8>,
    pub feature_names: Vec<String>,
}

impl Dataset {
    pub fn new(x: Array2<f64>, y: Array1<u8>, feature_names: Vec<String>) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(AnomalyError::shape(
                format!("{} labels", x.nrows()),
                format!("{} labels", y.len()),
            ));
        }
        if feature_names.len() != x.ncols() {
            return Err(AnomalyError::shape(
                format!("{} feature names", x.ncols()),
                format!("{} feature names", feature_names.len()),
            ));
        }
        label_counts(&y)?;
        Ok(Self { x, y, feature_names })
    }

    /// Dataset with generated feature names `f0, f1, ...`
    pub fn from_arrays(x: Array2<f64>, y: Array1<u8>) -> Result<Self> {
        let names = (0..x.ncols()).map(|i| format!("f{}", i)).collect();
        Self::new(x, y, names)
    }

    pub fn n_samples(&self) -> usize {
        self.x.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// `(normal, anomalous)` row counts
    pub fn class_counts(&self) -> (usize, usize) {
        let normal = self.y.iter().filter(|&&l| l == NORMAL).count();
        (normal, self.y.len() - normal)
    }

    /// Rows labeled normal
    pub fn normal_rows(&self) -> Result<Array2<f64>> {
        normal_rows(&self.x, &self.y)
    }

    /// Rows at `indices`, in the given order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
        }
    }

    /// Restrict to the feature columns at `indices`
    pub fn select_features(&self, indices: &[usize]) -> Result<Self> {
        if indices.is_empty() {
            return Err(AnomalyError::invalid_parameter(
                "features",
                "[]",
                "select at least one feature",
            ));
        }
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_features()) {
            return Err(AnomalyError::FeatureNotFound(format!(
                "index {} (dataset has {} features)",
                bad,
                self.n_features()
            )));
        }
        Ok(Self {
            x: self.x.select(Axis(1), indices),
            y: self.y.clone(),
            feature_names: indices.iter().map(|&i| self.feature_names[i].clone()).collect(),
        })
    }

    /// Stratified split into `(train, test)`.
    ///
    /// Each class is shuffled independently and `round(n_c · test_ratio)` of
    /// its rows go to the test side, adjusted so that a class with at least
    /// two rows is present on both sides. Rows keep their original relative
    /// order within each side.
    pub fn train_test_split(&self, test_ratio: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_ratio > 0.0 && test_ratio < 1.0) {
            return Err(AnomalyError::invalid_parameter(
                "test_ratio",
                test_ratio,
                "must lie strictly between 0 and 1",
            ));
        }

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut train_idx = Vec::with_capacity(self.n_samples());
        let mut test_idx = Vec::new();

        for class in [NORMAL, ANOMALOUS] {
            let mut rows: Vec<usize> = self
                .y
                .iter()
                .enumerate()
                .filter(|&(_, &l)| l == class)
                .map(|(i, _)| i)
                .collect();
            if rows.is_empty() {
                continue;
            }
            rows.shuffle(&mut rng);

            let n = rows.len();
            let n_test = if n < 2 {
                0
            } else {
                ((n as f64 * test_ratio).round() as usize).clamp(1, n - 1)
            };
            test_idx.extend_from_slice(&rows[..n_test]);
            train_idx.extend_from_slice(&rows[n_test..]);
        }

        train_idx.sort_unstable();
        test_idx.sort_unstable();
        Ok((self.subset(&train_idx), self.subset(&test_idx)))
    }
}
