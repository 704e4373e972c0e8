//! Adam optimizer with bias-corrected moment estimates

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use super::Optimizer;

/// Adam (Kingma & Ba) first-order adaptive optimizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    t: u64,
    m: Vec<Array2<f64>>,
    v: Vec<Array2<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            eps: 1e-8,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    /// Set the exponential decay rates of the moment estimates
    pub fn with_betas(mut self, beta1: f64, beta2: f64) -> Self {
        self.beta1 = beta1;
        self.beta2 = beta2;
        self
    }

    /// Number of steps taken so far
    pub fn steps(&self) -> u64 {
        self.t
    }

    fn ensure_state(&mut self, grads: &[Array2<f64>]) {
        let matches = self.m.len() == grads.len()
            && self.m.iter().zip(grads).all(|(m, g)| m.raw_dim() == g.raw_dim());
        if !matches {
            self.m = grads.iter().map(|g| Array2::zeros(g.raw_dim())).collect();
            self.v = grads.iter().map(|g| Array2::zeros(g.raw_dim())).collect();
            self.t = 0;
        }
    }
}

impl Optimizer for Adam {
    fn step(&mut self, params: Vec<&mut Array2<f64>>, grads: &[Array2<f64>]) {
        debug_assert_eq!(params.len(), grads.len());
        self.ensure_state(grads);
        self.t += 1;

        let t = self.t as f64;
        let bias1 = 1.0 - self.beta1.powf(t);
        let bias2 = 1.0 - self.beta2.powf(t);
        let (beta1, beta2, eps, lr) = (self.beta1, self.beta2, self.eps, self.learning_rate);

        for (((param, grad), m), v) in params
            .into_iter()
            .zip(grads)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
        {
            m.zip_mut_with(grad, |m, &g| *m = beta1 * *m + (1.0 - beta1) * g);
            v.zip_mut_with(grad, |v, &g| *v = beta2 * *v + (1.0 - beta2) * g * g);

            ndarray::Zip::from(param)
                .and(&*m)
                .and(&*v)
                .for_each(|p, &m, &v| {
                    let m_hat = m / bias1;
                    let v_hat = v / bias2;
                    *p -= lr * m_hat / (v_hat.sqrt() + eps);
                });
        }
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
