//! Minibatch training loop
//!
//! Drives any [`TrainStep`] model: each iteration samples a batch without
//! replacement, takes one optimizer step, optionally logs progress and
//! records the batch loss, and checks the early-stop delta.
//!
//! Early stopping looks at the loss of the training batch itself, not at
//! held-out data.

mod config;
mod history;
mod sampler;

pub use config::TrainConfig;
pub use history::TrainingHistory;
pub use sampler::BatchSampler;

use ndarray::Array2;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AnomalyError, Result};
use crate::optimizer::Optimizer;

/// A model that can take one gradient step on a batch
pub trait TrainStep {
    /// Compute the loss on `batch`, backpropagate and apply one optimizer
    /// step. Returns the loss evaluated before the update.
    fn train_step(
        &mut self,
        batch: &Array2<f64>,
        optimizer: &mut dyn Optimizer,
        rng: &mut dyn RngCore,
    ) -> Result<f64>;
}

/// Outcome of a training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainSummary {
    /// Iterations actually executed
    pub iterations_run: usize,
    /// Batch loss of the last executed iteration
    pub final_loss: Option<f64>,
    /// Whether the early-stop delta ended the run
    pub stopped_early: bool,
}

/// Run the training loop on `x` (one instance per row).
pub fn train<M: TrainStep + ?Sized>(
    model: &mut M,
    x: &Array2<f64>,
    config: &TrainConfig,
    optimizer: &mut dyn Optimizer,
    sampler: &mut BatchSampler,
    mut history: Option<&mut TrainingHistory>,
) -> Result<TrainSummary> {
    config.validate()?;
    if x.nrows() == 0 {
        return Err(AnomalyError::DataError("cannot train on an empty dataset".to_string()));
    }

    if config.batch_size > x.nrows() {
        warn!(
            batch_size = config.batch_size,
            n_samples = x.nrows(),
            "Batch size exceeds the number of rows, using every row"
        );
    }
    let batch_size = config.batch_size.min(x.nrows());
    let rdelta = config.early_stop_delta();
    debug!(
        n_samples = x.nrows(),
        batch_size,
        iterations = config.iterations,
        "Starting training"
    );

    let mut summary = TrainSummary {
        iterations_run: 0,
        final_loss: None,
        stopped_early: false,
    };

    for i in 1..=config.iterations {
        let batch = sampler.sample_rows(x, batch_size);
        let loss = model.train_step(&batch, optimizer, sampler.rng_mut())?;
        if !loss.is_finite() {
            return Err(AnomalyError::TrainingError(format!(
                "loss became {} at iteration {}",
                loss, i
            )));
        }

        summary.iterations_run = i;
        summary.final_loss = Some(loss);

        if config.verbose && i % config.cbit == 0 {
            info!(iteration = i, "loss: {}", loss);
        }

        if let Some(h) = history.as_deref_mut() {
            h.record(loss);
        }

        if let Some(delta) = rdelta {
            if loss < delta {
                if config.verbose {
                    info!(iteration = i, "Training ended prematurely after {} iterations, loss: {}", i, loss);
                }
                summary.stopped_early = true;
                break;
            }
        }
    }

    Ok(summary)
}
