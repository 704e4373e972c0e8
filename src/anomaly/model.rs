//! Fit/predict wrapper around a reconstruction model
//!
//! `fit(x, y)` trains on the normal rows only, then derives the
//! contamination from the labels and places the threshold over the full
//! labeled set. `predict(x)` compares scores against the stored threshold.
//!
//! Mutation contract: only `fit`, `set_threshold` and `set_contamination`
//! take `&mut self`. `fit` updates the network parameters, the optimizer
//! state, the sampler's random state, the history (if enabled), the
//! contamination and the threshold; nothing else changes.

use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::anomaly::{
    check_width, label_counts, normal_rows, AnomalyDetector, Autoencoder, IndexPolicy,
    Reconstructor, VariationalAutoencoder,
};
use crate::error::{AnomalyError, Result};
use crate::network::NetworkConfig;
use crate::optimizer::{OptimizerKind, OptimizerState};
use crate::training::{self, BatchSampler, TrainConfig, TrainSummary, TrainingHistory};

/// Hyperparameters of an [`AnomalyModel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Training loop settings
    pub train: TrainConfig,
    /// Layer activations
    pub network: NetworkConfig,
    /// Parameter update rule
    pub optimizer: OptimizerKind,
    /// Initial contamination estimate, replaced by `fit`
    pub contamination: f64,
    /// Initial threshold, replaced by `fit`
    pub threshold: f64,
    /// Threshold tightness in `[0, 1]`
    pub beta: f64,
    /// Out-of-range policy for the threshold order statistics
    pub index_policy: IndexPolicy,
    /// Record every batch loss
    pub track_history: bool,
    /// Seed for weight initialisation and batch sampling
    pub seed: Option<u64>,
    /// Weight of the KL term (variational models only)
    pub kl_weight: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            train: TrainConfig::default(),
            network: NetworkConfig::default(),
            optimizer: OptimizerKind::default(),
            contamination: 0.0,
            threshold: 0.0,
            beta: 1.0,
            index_policy: IndexPolicy::Clamp,
            track_history: false,
            seed: None,
            kl_weight: 1.0,
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the training loop settings
    pub fn with_train(mut self, train: TrainConfig) -> Self {
        self.train = train;
        self
    }

    /// Builder method to set the activations
    pub fn with_network(mut self, network: NetworkConfig) -> Self {
        self.network = network;
        self
    }

    /// Builder method to set the optimizer
    pub fn with_optimizer(mut self, optimizer: OptimizerKind) -> Self {
        self.optimizer = optimizer;
        self
    }

    /// Builder method to set the initial threshold and contamination
    pub fn with_initial_estimates(mut self, threshold: f64, contamination: f64) -> Self {
        self.threshold = threshold;
        self.contamination = contamination;
        self
    }

    /// Builder method to set the threshold tightness
    pub fn with_beta(mut self, beta: f64) -> Self {
        self.beta = beta;
        self
    }

    /// Builder method to set the index policy
    pub fn with_index_policy(mut self, policy: IndexPolicy) -> Self {
        self.index_policy = policy;
        self
    }

    /// Builder method to enable the training history
    pub fn with_history(mut self, track: bool) -> Self {
        self.track_history = track;
        self
    }

    /// Builder method to set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builder method to set the KL weight
    pub fn with_kl_weight(mut self, kl_weight: f64) -> Self {
        self.kl_weight = kl_weight;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.train.validate()?;
        if !(0.0..=1.0).contains(&self.beta) {
            return Err(AnomalyError::invalid_parameter("beta", self.beta, "must lie in [0, 1]"));
        }
        if !self.contamination.is_finite() || self.contamination < 0.0 {
            return Err(AnomalyError::invalid_parameter(
                "contamination",
                self.contamination,
                "must be finite and non-negative",
            ));
        }
        if self.optimizer.learning_rate() <= 0.0 || !self.optimizer.learning_rate().is_finite() {
            return Err(AnomalyError::invalid_parameter(
                "learning_rate",
                self.optimizer.learning_rate(),
                "must be positive",
            ));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config
            .validate()
            .map_err(|e| AnomalyError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Reconstruction model with contamination-derived threshold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyModel<M> {
    model: M,
    config: ModelConfig,
    optimizer: OptimizerState,
    threshold: f64,
    contamination: f64,
    history: Option<TrainingHistory>,
    #[serde(skip)]
    sampler: BatchSampler,
}

/// Autoencoder behind the fit/predict interface
pub type AutoencoderModel = AnomalyModel<Autoencoder>;

/// Variational autoencoder behind the fit/predict interface
pub type VaeModel = AnomalyModel<VariationalAutoencoder>;

fn init_rng(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}

impl AnomalyModel<Autoencoder> {
    /// Build an autoencoder from encoder/decoder widths
    pub fn new(esize: &[usize], dsize: &[usize], config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = init_rng(config.seed);
        let model = Autoencoder::from_sizes(esize, dsize, &config.network, &mut rng)?;
        Ok(Self::assemble(model, config, rng))
    }
}

impl AnomalyModel<VariationalAutoencoder> {
    /// Build a variational autoencoder from encoder/decoder widths
    pub fn new(esize: &[usize], dsize: &[usize], config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let mut rng = init_rng(config.seed);
        let model = VariationalAutoencoder::from_sizes(esize, dsize, &config.network, config.kl_weight, &mut rng)?;
        Ok(Self::assemble(model, config, rng))
    }
}

impl<M: Reconstructor> AnomalyModel<M> {
    fn assemble(model: M, config: ModelConfig, rng: Xoshiro256PlusPlus) -> Self {
        Self {
            optimizer: config.optimizer.build(),
            threshold: config.threshold,
            contamination: config.contamination,
            history: config.track_history.then(TrainingHistory::new),
            sampler: BatchSampler::new(rng),
            model,
            config,
        }
    }

    /// Train on the normal rows of `x`, then derive contamination and
    /// threshold from the full labeled set.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> Result<TrainSummary> {
        check_width(x, self.model.input_dim())?;
        let (n_normal, n_anomalous) = label_counts(y)?;
        let normal = normal_rows(x, y)?;
        if n_normal == 0 {
            return Err(AnomalyError::DataError("no normal rows to train on".to_string()));
        }

        let summary = training::train(
            &mut self.model,
            &normal,
            &self.config.train,
            &mut self.optimizer,
            &mut self.sampler,
            self.history.as_mut(),
        )?;

        // Ratio of anomalous to normal counts, not the anomalous fraction
        self.contamination = n_anomalous as f64 / n_normal as f64;
        self.threshold = self.model.compute_threshold(
            x,
            self.contamination,
            self.config.beta,
            self.config.index_policy,
        )?;

        debug!(n_normal, n_anomalous, "Label counts");
        info!(
            iterations = summary.iterations_run,
            stopped_early = summary.stopped_early,
            contamination = self.contamination,
            threshold = self.threshold,
            "Model fitted"
        );
        Ok(summary)
    }

    /// 0/1 label of every row against the stored threshold
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>> {
        self.model.classify(x, self.threshold)
    }

    /// Per-row anomaly score
    pub fn anomaly_score(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.model.anomaly_score(x)
    }

    /// 0/1 label of every row against an explicit threshold
    pub fn classify(&self, x: &Array2<f64>, threshold: f64) -> Result<Array1<u8>> {
        self.model.classify(x, threshold)
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn set_contamination(&mut self, contamination: f64) {
        self.contamination = contamination;
    }

    /// Training history, if enabled
    pub fn history(&self) -> Option<&TrainingHistory> {
        self.history.as_ref()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Reset the sampling random source
    pub fn reseed(&mut self, seed: u64) {
        self.sampler = BatchSampler::seed_from_u64(seed);
    }
}

impl<M> AnomalyModel<M>
where
    M: Reconstructor + Serialize + DeserializeOwned,
{
    /// Save the model as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a model saved with [`AnomalyModel::save`]. The sampler is
    /// reseeded from the configured seed when there is one.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mut model: Self = serde_json::from_str(&json)?;
        if let Some(seed) = model.config.seed {
            model.reseed(seed);
        }
        Ok(model)
    }
}

impl AnomalyDetector for AnomalyModel<Autoencoder> {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> Result<()> {
        AnomalyModel::fit(self, x, y).map(|_| ())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.anomaly_score(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>> {
        AnomalyModel::predict(self, x)
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn name(&self) -> &str {
        "ae"
    }
}

impl AnomalyDetector for AnomalyModel<VariationalAutoencoder> {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<u8>) -> Result<()> {
        AnomalyModel::fit(self, x, y).map(|_| ())
    }

    fn score_samples(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.anomaly_score(x)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<u8>> {
        AnomalyModel::predict(self, x)
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn name(&self) -> &str {
        "vae"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::Activation;

    /// 40 normal rows near the diagonal, 4 far-off anomalies
    fn labeled_data() -> (Array2<f64>, Array1<u8>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..40 {
            let t = i as f64 / 40.0 - 0.5;
            rows.extend_from_slice(&[t, t + 0.02 * ((i % 3) as f64 - 1.0)]);
            labels.push(0u8);
        }
        for &(a, b) in &[(0.9, -0.9), (-0.8, 0.85), (1.0, -1.0), (-0.9, 0.7)] {
            rows.extend_from_slice(&[a, b]);
            labels.push(1u8);
        }
        (
            Array2::from_shape_vec((44, 2), rows).unwrap(),
            Array1::from_vec(labels),
        )
    }

    fn config() -> ModelConfig {
        ModelConfig::new()
            .with_train(TrainConfig::new(16, 300))
            .with_network(NetworkConfig::new().with_hidden_activation(Activation::Tanh))
            .with_optimizer(OptimizerKind::Adam { learning_rate: 0.01 })
            .with_seed(3)
    }

    #[test]
    fn test_construction_rejects_inconsistent_sizes() {
        assert!(AutoencoderModel::new(&[2, 4, 1], &[2, 4, 2], config()).is_err());
        assert!(AutoencoderModel::new(&[2, 1], &[1, 4, 2], config()).is_err());
        assert!(VaeModel::new(&[2, 4, 1], &[1, 4, 2], config()).is_err());
    }

    #[test]
    fn test_fit_sets_contamination_from_label_ratio() {
        let (x, y) = labeled_data();
        let mut model = AutoencoderModel::new(&[2, 8, 1], &[1, 8, 2], config()).unwrap();
        model.fit(&x, &y).unwrap();
        assert!((model.contamination() - 4.0 / 40.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_recomputed_over_full_set() {
        let (x, y) = labeled_data();
        let mut model = AutoencoderModel::new(&[2, 8, 1], &[1, 8, 2], config()).unwrap();
        model.fit(&x, &y).unwrap();

        let expected = model
            .model()
            .compute_threshold(&x, 0.1, 1.0, IndexPolicy::Clamp)
            .unwrap();
        assert_eq!(model.threshold(), expected);
    }

    #[test]
    fn test_predict_before_fit_uses_initial_threshold() {
        let (x, _) = labeled_data();
        let model = AutoencoderModel::new(
            &[2, 8, 1],
            &[1, 8, 2],
            config().with_initial_estimates(f64::INFINITY, 0.1),
        )
        .unwrap();
        assert_eq!(model.threshold(), f64::INFINITY);
        assert!(model.predict(&x).unwrap().iter().all(|&l| l == 0));
    }

    #[test]
    fn test_set_threshold() {
        let (x, _) = labeled_data();
        let mut model = AutoencoderModel::new(&[2, 8, 1], &[1, 8, 2], config()).unwrap();
        model.set_threshold(-1.0);
        assert!(model.predict(&x).unwrap().iter().all(|&l| l == 1));
    }

    #[test]
    fn test_history_disabled_by_default() {
        let (x, y) = labeled_data();
        let mut model = AutoencoderModel::new(&[2, 8, 1], &[1, 8, 2], config()).unwrap();
        model.fit(&x, &y).unwrap();
        assert!(model.history().is_none());
    }

    #[test]
    fn test_fit_without_normal_rows_fails() {
        let (x, _) = labeled_data();
        let mut model = AutoencoderModel::new(&[2, 8, 1], &[1, 8, 2], config()).unwrap();
        assert!(model.fit(&x, &Array1::from_elem(44, 1u8)).is_err());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(AutoencoderModel::new(&[2, 4, 1], &[1, 4, 2], config().with_beta(2.0)).is_err());
        let bad_lr = config().with_optimizer(OptimizerKind::Adam { learning_rate: 0.0 });
        assert!(AutoencoderModel::new(&[2, 4, 1], &[1, 4, 2], bad_lr).is_err());
    }

    #[test]
    fn test_invalid_config_file_is_config_error() {
        let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        config().with_beta(2.0).to_json_file(file.path()).unwrap();
        let err = ModelConfig::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, AnomalyError::ConfigError(_)), "{:?}", err);
        assert!(err.to_string().contains("beta"));
    }

    #[test]
    fn test_vae_model_fits() {
        let (x, y) = labeled_data();
        let mut model = VaeModel::new(&[2, 8, 2], &[1, 8, 2], config().with_kl_weight(0.01)).unwrap();
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap().len(), 44);
        assert_eq!(AnomalyDetector::name(&model), "vae");
    }
}
