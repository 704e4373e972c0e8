//! First-order parameter update rules
//!
//! An optimizer receives the parameter tensors of a model together with
//! their gradients (same order, same shapes) and applies one update step.
//! State such as moment estimates is sized lazily on the first step.

mod adam;
mod sgd;

pub use adam::Adam;
pub use sgd::Sgd;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Parameter update rule
pub trait Optimizer {
    /// Apply one update. `params[i]` is updated with `grads[i]`.
    fn step(&mut self, params: Vec<&mut Array2<f64>>, grads: &[Array2<f64>]);

    /// Current learning rate
    fn learning_rate(&self) -> f64;
}

/// Serializable optimizer selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OptimizerKind {
    /// Adam with default betas
    Adam { learning_rate: f64 },
    /// SGD with momentum
    Sgd { learning_rate: f64, momentum: f64 },
}

impl Default for OptimizerKind {
    fn default() -> Self {
        Self::Adam { learning_rate: 0.001 }
    }
}

impl OptimizerKind {
    /// Instantiate a fresh optimizer
    pub fn build(&self) -> OptimizerState {
        match *self {
            OptimizerKind::Adam { learning_rate } => OptimizerState::Adam(Adam::new(learning_rate)),
            OptimizerKind::Sgd { learning_rate, momentum } => {
                OptimizerState::Sgd(Sgd::new(learning_rate, momentum))
            }
        }
    }

    pub fn learning_rate(&self) -> f64 {
        match *self {
            OptimizerKind::Adam { learning_rate } | OptimizerKind::Sgd { learning_rate, .. } => learning_rate,
        }
    }
}

/// A concrete optimizer together with its accumulated state.
///
/// Kept by models across repeated `fit` calls so moment estimates carry over.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OptimizerState {
    Adam(Adam),
    Sgd(Sgd),
}

impl Optimizer for OptimizerState {
    fn step(&mut self, params: Vec<&mut Array2<f64>>, grads: &[Array2<f64>]) {
        match self {
            OptimizerState::Adam(opt) => opt.step(params, grads),
            OptimizerState::Sgd(opt) => opt.step(params, grads),
        }
    }

    fn learning_rate(&self) -> f64 {
        match self {
            OptimizerState::Adam(opt) => opt.learning_rate(),
            OptimizerState::Sgd(opt) => opt.learning_rate(),
        }
    }
}
