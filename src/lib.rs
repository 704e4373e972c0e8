//! Autoencoder Anomaly - reconstruction-based anomaly detection
//!
//! A model is trained to reconstruct normal instances; the per-instance
//! reconstruction error is its anomaly score. A threshold over the scores,
//! placed from the contamination observed in the labels, turns scores into
//! 0 (normal) / 1 (anomalous) labels.
//!
//! # Modules
//!
//! ## Core
//! - [`network`] - Activations, dense layers and multilayer perceptrons
//! - [`optimizer`] - Adam and momentum SGD
//! - [`training`] - Minibatch training loop with early stopping and history
//! - [`anomaly`] - Autoencoder, VAE and kNN detectors, threshold selection
//!
//! ## Analysis
//! - [`evaluation`] - ROC AUC, ROC curve and classification metrics
//! - [`experiment`] - Random feature-pair comparison of detectors
//!
//! ## Infrastructure
//! - [`utils`] - CSV loading and the labeled [`Dataset`](utils::Dataset)
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use autoencoder_anomaly::prelude::*;
//!
//! # fn main() -> autoencoder_anomaly::Result<()> {
//! let data = DataLoader::new().load_csv("data.csv", "label")?;
//! let config = ModelConfig::new()
//!     .with_train(TrainConfig::new(64, 2_000).with_rdelta(1e-4))
//!     .with_seed(42);
//! let n = data.n_features();
//! let mut model = AutoencoderModel::new(&[n, 8, 2], &[2, 8, n], config)?;
//! model.fit(&data.x, &data.y)?;
//! let labels = model.predict(&data.x)?;
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

// Core ML modules
pub mod network;
pub mod optimizer;
pub mod training;
pub mod anomaly;

// Analysis
pub mod evaluation;
pub mod experiment;

// Infrastructure
pub mod utils;
pub mod cli;

pub use error::{AnomalyError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{AnomalyError, Result};

    // Networks and optimizers
    pub use crate::network::{Activation, Dense, Mlp, NetworkConfig};
    pub use crate::optimizer::{Adam, Optimizer, OptimizerKind, Sgd};

    // Training
    pub use crate::training::{BatchSampler, TrainConfig, TrainSummary, TrainingHistory};

    // Anomaly detection
    pub use crate::anomaly::{
        AnomalyDetector, AnomalyModel, Autoencoder, AutoencoderModel, IndexPolicy, KnnConfig,
        KnnDetector, ModelConfig, Reconstructor, VaeModel, VariationalAutoencoder,
    };

    // Evaluation
    pub use crate::evaluation::{roc_auc, ClassificationMetrics};

    // Experiments
    pub use crate::experiment::{FeatureSearch, SearchConfig, SearchReport};

    // Data
    pub use crate::utils::{DataLoader, Dataset};
}
