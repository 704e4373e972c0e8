//! Random feature-pair search

use rand::seq::index;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

use super::{PairResult, SearchReport};
use crate::anomaly::{AnomalyDetector, AutoencoderModel, KnnConfig, KnnDetector, ModelConfig, VaeModel};
use crate::error::{AnomalyError, Result};
use crate::evaluation::roc_auc;
use crate::utils::Dataset;

/// Settings of a [`FeatureSearch`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of distinct feature pairs to evaluate
    pub n_pairs: usize,
    /// Fraction of each class held out for testing
    pub test_ratio: f64,
    /// Seed for the split, the pair draw and every model
    pub seed: u64,
    /// Width of the single hidden layer of encoder and decoder
    pub hidden_width: usize,
    /// Latent dimension of both autoencoders
    pub latent_dim: usize,
    /// Shared settings of the autoencoder and the VAE
    pub model: ModelConfig,
    /// kNN baseline settings
    pub knn: KnnConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_pairs: 10,
            test_ratio: 0.3,
            seed: 0,
            hidden_width: 8,
            latent_dim: 1,
            model: ModelConfig::default(),
            knn: KnnConfig::default(),
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the number of pairs
    pub fn with_n_pairs(mut self, n_pairs: usize) -> Self {
        self.n_pairs = n_pairs;
        self
    }

    /// Builder method to set the held-out fraction
    pub fn with_test_ratio(mut self, test_ratio: f64) -> Self {
        self.test_ratio = test_ratio;
        self
    }

    /// Builder method to set the seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method to set the hidden width and latent dimension
    pub fn with_architecture(mut self, hidden_width: usize, latent_dim: usize) -> Self {
        self.hidden_width = hidden_width;
        self.latent_dim = latent_dim;
        self
    }

    /// Builder method to set the autoencoder settings
    pub fn with_model(mut self, model: ModelConfig) -> Self {
        self.model = model;
        self
    }

    /// Builder method to set the kNN settings
    pub fn with_knn(mut self, knn: KnnConfig) -> Self {
        self.knn = knn;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_pairs == 0 {
            return Err(AnomalyError::invalid_parameter("n_pairs", 0, "must be at least 1"));
        }
        if self.hidden_width == 0 || self.latent_dim == 0 {
            return Err(AnomalyError::invalid_parameter(
                "architecture",
                format!("hidden {} latent {}", self.hidden_width, self.latent_dim),
                "widths must be positive",
            ));
        }
        self.model.validate()
    }
}

/// Compares the autoencoder, the VAE and the kNN baseline on random
/// two-feature projections of a dataset.
#[derive(Debug, Clone, Default)]
pub struct FeatureSearch {
    config: SearchConfig,
}

impl FeatureSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Draw `n_pairs` distinct unordered feature pairs, capped at the
    /// number of available pairs
    pub fn draw_pairs(&self, n_features: usize) -> Result<Vec<[usize; 2]>> {
        if n_features < 2 {
            return Err(AnomalyError::DataError(format!(
                "feature search needs at least 2 features, got {}",
                n_features
            )));
        }
        let all: Vec<[usize; 2]> = (0..n_features)
            .flat_map(|i| ((i + 1)..n_features).map(move |j| [i, j]))
            .collect();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.seed);
        let k = self.config.n_pairs.min(all.len());
        Ok(index::sample(&mut rng, all.len(), k)
            .into_iter()
            .map(|i| all[i])
            .collect())
    }

    /// Split `data`, evaluate every drawn pair and return the results
    /// sorted by best AUC.
    pub fn run(&self, data: &Dataset) -> Result<SearchReport> {
        self.config.validate()?;
        let start = Instant::now();

        let (train, test) = data.train_test_split(self.config.test_ratio, self.config.seed)?;
        let pairs = self.draw_pairs(data.n_features())?;
        info!(
            pairs = pairs.len(),
            n_train = train.n_samples(),
            n_test = test.n_samples(),
            "Starting feature search"
        );

        let results = pairs
            .par_iter()
            .enumerate()
            .map(|(i, &pair)| self.evaluate_pair(&train, &test, pair, i as u64))
            .collect::<Result<Vec<PairResult>>>()?;

        let mut report = SearchReport {
            n_features: data.n_features(),
            n_train: train.n_samples(),
            n_test: test.n_samples(),
            results,
        };
        report.sort_by_best_auc();

        info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            best_auc = report.best().map(PairResult::best_auc),
            "Feature search finished"
        );
        Ok(report)
    }

    fn evaluate_pair(
        &self,
        train: &Dataset,
        test: &Dataset,
        pair: [usize; 2],
        offset: u64,
    ) -> Result<PairResult> {
        let train = train.select_features(&pair)?;
        let test = test.select_features(&pair)?;

        let h = self.config.hidden_width;
        let l = self.config.latent_dim;
        let model_config = self
            .config
            .model
            .clone()
            .with_seed(self.config.seed.wrapping_add(offset));

        let mut ae = AutoencoderModel::new(&[2, h, l], &[l, h, 2], model_config.clone())?;
        let mut vae = VaeModel::new(&[2, h, 2 * l], &[l, h, 2], model_config)?;
        let mut knn = KnnDetector::new(self.config.knn.clone());

        let ae_auc = fit_and_score(&mut ae, &train, &test)?;
        let vae_auc = fit_and_score(&mut vae, &train, &test)?;
        let knn_auc = fit_and_score(&mut knn, &train, &test)?;

        debug!(
            features = ?pair,
            ae_auc,
            vae_auc,
            knn_auc,
            "Evaluated feature pair"
        );
        Ok(PairResult {
            features: pair,
            feature_names: [train.feature_names[0].clone(), train.feature_names[1].clone()],
            ae_auc,
            vae_auc,
            knn_auc,
        })
    }
}

/// Fit on `train`, return the ROC AUC of the scores on `test`
fn fit_and_score(detector: &mut dyn AnomalyDetector, train: &Dataset, test: &Dataset) -> Result<f64> {
    detector.fit(&train.x, &train.y)?;
    let scores = detector.score_samples(&test.x)?;
    roc_auc(&scores, &test.y)
}
