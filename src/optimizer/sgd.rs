//! Stochastic gradient descent with momentum

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::Optimizer;

/// SGD with classical momentum: `v = μ·v - lr·g; p = p + v`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sgd {
    learning_rate: f64,
    momentum: f64,
    velocities: Vec<Array2<f64>>,
}

impl Sgd {
    pub fn new(learning_rate: f64, momentum: f64) -> Self {
        Self {
            learning_rate,
            momentum,
            velocities: Vec::new(),
        }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, params: Vec<&mut Array2<f64>>, grads: &[Array2<f64>]) {
        debug_assert_eq!(params.len(), grads.len());
        let fresh = self.velocities.len() != grads.len()
            || self
                .velocities
                .iter()
                .zip(grads)
                .any(|(v, g)| v.raw_dim() != g.raw_dim());
        if fresh {
            self.velocities = grads.iter().map(|g| Array2::zeros(g.raw_dim())).collect();
        }

        for ((param, grad), velocity) in params.into_iter().zip(grads).zip(self.velocities.iter_mut()) {
            *velocity = &*velocity * self.momentum - grad * self.learning_rate;
            *param += &*velocity;
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
