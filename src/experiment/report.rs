//! Results of a feature-pair search

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

use crate::error::Result;

/// Test AUC of every detector on one feature pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairResult {
    /// Column indices of the pair
    pub features: [usize; 2],
    /// Column names of the pair
    pub feature_names: [String; 2],
    pub ae_auc: f64,
    pub vae_auc: f64,
    pub knn_auc: f64,
}

impl PairResult {
    /// Highest AUC over the detectors
    pub fn best_auc(&self) -> f64 {
        self.ae_auc.max(self.vae_auc).max(self.knn_auc)
    }

    /// Name of the detector with the highest AUC
    pub fn best_detector(&self) -> &'static str {
        let best = self.best_auc();
        if self.ae_auc == best {
            "ae"
        } else if self.vae_auc == best {
            "vae"
        } else {
            "knn"
        }
    }
}

/// Outcome of a [`FeatureSearch`](super::FeatureSearch) run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchReport {
    pub n_features: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub results: Vec<PairResult>,
}

impl SearchReport {
    /// Order results by best AUC, highest first
    pub fn sort_by_best_auc(&mut self) {
        self.results.sort_by(|a, b| {
            b.best_auc()
                .partial_cmp(&a.best_auc())
                .unwrap_or(Ordering::Equal)
        });
    }

    /// Pair with the highest AUC of any detector; the first one on ties
    pub fn best(&self) -> Option<&PairResult> {
        self.results.iter().fold(None, |best, r| match best {
            Some(b) if b.best_auc() >= r.best_auc() => Some(b),
            _ => Some(r),
        })
    }

    /// Mean AUC per detector as `(ae, vae, knn)`
    pub fn mean_auc(&self) -> Option<(f64, f64, f64)> {
        if self.results.is_empty() {
            return None;
        }
        let n = self.results.len() as f64;
        let (ae, vae, knn) = self.results.iter().fold((0.0, 0.0, 0.0), |acc, r| {
            (acc.0 + r.ae_auc, acc.1 + r.vae_auc, acc.2 + r.knn_auc)
        });
        Some((ae / n, vae / n, knn / n))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
