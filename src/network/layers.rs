//! Dense layers and multi-layer perceptrons with analytic backpropagation
//!
//! Instances are rows: a batch `x` has shape `(n_samples, n_features)` and a
//! layer computes `activation(x · W + b)`.

use ndarray::{Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AnomalyError, Result};
use crate::network::Activation;

/// Fully connected layer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    /// Weight matrix, shape `(n_in, n_out)`
    pub weights: Array2<f64>,
    /// Bias row, shape `(1, n_out)`
    pub bias: Array2<f64>,
    /// Activation applied to `x · W + b`
    pub activation: Activation,
}

impl Dense {
    /// Create a layer with Xavier/Glorot uniform weights and zero bias
    pub fn new<R: Rng + ?Sized>(
        n_in: usize,
        n_out: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let scale = (6.0 / (n_in + n_out) as f64).sqrt();
        let weights = Array2::from_shape_fn((n_in, n_out), |_| rng.gen_range(-scale..=scale));

        Self {
            weights,
            bias: Array2::zeros((1, n_out)),
            activation,
        }
    }

    pub fn n_in(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_out(&self) -> usize {
        self.weights.ncols()
    }

    fn pre_activation(&self, x: &Array2<f64>) -> Array2<f64> {
        x.dot(&self.weights) + &self.bias
    }

    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        self.activation.apply(&self.pre_activation(x))
    }
}

/// Intermediate values of a forward pass, kept for backpropagation
#[derive(Debug, Clone)]
pub struct Trace {
    inputs: Vec<Array2<f64>>,
    pre_activations: Vec<Array2<f64>>,
    output: Array2<f64>,
}

impl Trace {
    /// Network output of the traced pass
    pub fn output(&self) -> &Array2<f64> {
        &self.output
    }

    pub fn into_output(self) -> Array2<f64> {
        self.output
    }
}

/// Multi-layer perceptron: an ordered stack of dense layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mlp {
    layers: Vec<Dense>,
}

impl Mlp {
    /// Build a network from layer widths `[w0, w1, ..., wk]`.
    ///
    /// Every layer but the last uses `hidden`; the last layer uses `output`.
    pub fn new<R: Rng + ?Sized>(
        widths: &[usize],
        hidden: Activation,
        output: Activation,
        rng: &mut R,
    ) -> Result<Self> {
        if widths.len() < 2 {
            return Err(AnomalyError::ArchitectureError(format!(
                "a network needs at least 2 widths, got {:?}",
                widths
            )));
        }
        if let Some(pos) = widths.iter().position(|&w| w == 0) {
            return Err(AnomalyError::ArchitectureError(format!(
                "layer width at position {} is zero in {:?}",
                pos, widths
            )));
        }

        let n_layers = widths.len() - 1;
        let layers = widths
            .windows(2)
            .enumerate()
            .map(|(i, pair)| {
                let activation = if i + 1 == n_layers { output } else { hidden };
                Dense::new(pair[0], pair[1], activation, rng)
            })
            .collect();

        Ok(Self { layers })
    }

    /// Assemble a network from existing layers, checking that widths chain
    pub fn from_layers(layers: Vec<Dense>) -> Result<Self> {
        if layers.is_empty() {
            return Err(AnomalyError::ArchitectureError("network has no layers".to_string()));
        }
        for (i, pair) in layers.windows(2).enumerate() {
            if pair[0].n_out() != pair[1].n_in() {
                return Err(AnomalyError::ArchitectureError(format!(
                    "layer {} outputs {} values but layer {} expects {}",
                    i,
                    pair[0].n_out(),
                    i + 1,
                    pair[1].n_in()
                )));
            }
            if pair[0].bias.dim() != (1, pair[0].n_out()) {
                return Err(AnomalyError::ArchitectureError(format!(
                    "layer {} bias has shape {:?}",
                    i,
                    pair[0].bias.dim()
                )));
            }
        }
        Ok(Self { layers })
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    pub fn input_dim(&self) -> usize {
        self.layers[0].n_in()
    }

    pub fn output_dim(&self) -> usize {
        self.layers[self.layers.len() - 1].n_out()
    }

    /// Layer widths, input first
    pub fn widths(&self) -> Vec<usize> {
        std::iter::once(self.input_dim())
            .chain(self.layers.iter().map(Dense::n_out))
            .collect()
    }

    /// Total number of trainable scalars
    pub fn n_parameters(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.weights.len() + l.bias.len())
            .sum()
    }

    /// Forward pass without keeping intermediates
    pub fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut a = x.to_owned();
        for layer in &self.layers {
            a = layer.forward(&a);
        }
        a
    }

    /// Forward pass keeping layer inputs and pre-activations
    pub fn forward_trace(&self, x: &Array2<f64>) -> Trace {
        let mut inputs = Vec::with_capacity(self.layers.len());
        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let mut a = x.to_owned();

        for layer in &self.layers {
            let z = layer.pre_activation(&a);
            let next = layer.activation.apply(&z);
            inputs.push(a);
            pre_activations.push(z);
            a = next;
        }

        Trace {
            inputs,
            pre_activations,
            output: a,
        }
    }

    /// Backpropagate `grad_output` (dL/d output) through a traced pass.
    ///
    /// Returns dL/d input and the parameter gradients in the order of
    /// [`Mlp::parameters_mut`]: `[W0, b0, W1, b1, ...]`.
    pub fn backward(&self, trace: &Trace, grad_output: &Array2<f64>) -> (Array2<f64>, Vec<Array2<f64>>) {
        let n_layers = self.layers.len();
        let mut grads: Vec<Array2<f64>> = Vec::with_capacity(2 * n_layers);

        let mut delta = grad_output * &self.layers[n_layers - 1]
            .activation
            .derivative(&trace.pre_activations[n_layers - 1]);
        let mut grad_input = Array2::zeros((0, 0));

        for i in (0..n_layers).rev() {
            let layer = &self.layers[i];
            let grad_w = trace.inputs[i].t().dot(&delta);
            let grad_b = delta.sum_axis(Axis(0)).insert_axis(Axis(0));
            grads.push(grad_b);
            grads.push(grad_w);

            grad_input = delta.dot(&layer.weights.t());
            if i > 0 {
                delta = &grad_input
                    * &self.layers[i - 1]
                        .activation
                        .derivative(&trace.pre_activations[i - 1]);
            }
        }

        // Pushed as [b_k, W_k, ..., b_0, W_0]
        grads.reverse();
        (grad_input, grads)
    }

    /// Mutable parameter tensors: `[W0, b0, W1, b1, ...]`
    pub fn parameters_mut(&mut self) -> Vec<&mut Array2<f64>> {
        self.layers
            .iter_mut()
            .flat_map(|l| [&mut l.weights, &mut l.bias])
            .collect()
    }

    /// Flattened copy of every parameter, in [`Mlp::parameters_mut`] order
    pub fn flat_parameters(&self) -> Vec<f64> {
        self.layers
            .iter()
            .flat_map(|l| l.weights.iter().chain(l.bias.iter()).copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(7)
    }

    #[test]
    fn test_mlp_shapes() {
        let mlp = Mlp::new(&[4, 3, 2], Activation::Tanh, Activation::Linear, &mut rng()).unwrap();
        assert_eq!(mlp.input_dim(), 4);
        assert_eq!(mlp.output_dim(), 2);
        assert_eq!(mlp.widths(), vec![4, 3, 2]);
        assert_eq!(mlp.n_parameters(), 4 * 3 + 3 + 3 * 2 + 2);

        let x = Array2::ones((5, 4));
        assert_eq!(mlp.forward(&x).dim(), (5, 2));
    }

    #[test]
    fn test_rejects_bad_widths() {
        assert!(Mlp::new(&[4], Activation::ReLU, Activation::Linear, &mut rng()).is_err());
        assert!(Mlp::new(&[4, 0, 4], Activation::ReLU, Activation::Linear, &mut rng()).is_err());
    }

    #[test]
    fn test_from_layers_checks_chaining() {
        let mut r = rng();
        let a = Dense::new(3, 2, Activation::ReLU, &mut r);
        let b = Dense::new(4, 1, Activation::Linear, &mut r);
        assert!(Mlp::from_layers(vec![a.clone(), b]).is_err());

        let c = Dense::new(2, 1, Activation::Linear, &mut r);
        assert!(Mlp::from_layers(vec![a, c]).is_ok());
    }

    #[test]
    fn test_trace_matches_forward() {
        let mlp = Mlp::new(&[3, 5, 3], Activation::Sigmoid, Activation::Linear, &mut rng()).unwrap();
        let x = Array2::from_shape_fn((4, 3), |(i, j)| (i as f64 - j as f64) * 0.3);
        let trace = mlp.forward_trace(&x);
        let direct = mlp.forward(&x);
        for (a, b) in trace.output().iter().zip(direct.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_backward_matches_finite_difference() {
        let mut mlp = Mlp::new(&[2, 3, 2], Activation::Tanh, Activation::Linear, &mut rng()).unwrap();
        let x = Array2::from_shape_vec((3, 2), vec![0.5, -0.2, 0.1, 0.9, -0.7, 0.3]).unwrap();

        // L = sum(output^2) / 2, so dL/d output = output
        let loss = |m: &Mlp| m.forward(&x).mapv(|v| v * v).sum() / 2.0;

        let trace = mlp.forward_trace(&x);
        let grad_out = trace.output().clone();
        let (_, grads) = mlp.backward(&trace, &grad_out);

        let h = 1e-6;
        let n_tensors = grads.len();
        for t in 0..n_tensors {
            let shape = grads[t].dim();
            for r in 0..shape.0 {
                for c in 0..shape.1 {
                    let original = mlp.parameters_mut()[t][[r, c]];
                    mlp.parameters_mut()[t][[r, c]] = original + h;
                    let up = loss(&mlp);
                    mlp.parameters_mut()[t][[r, c]] = original - h;
                    let down = loss(&mlp);
                    mlp.parameters_mut()[t][[r, c]] = original;

                    let numeric = (up - down) / (2.0 * h);
                    assert!(
                        (numeric - grads[t][[r, c]]).abs() < 1e-5,
                        "tensor {} [{}, {}]: numeric {} vs analytic {}",
                        t, r, c, numeric, grads[t][[r, c]]
                    );
                }
            }
        }
    }

    #[test]
    fn test_input_gradient_matches_finite_difference() {
        let mlp = Mlp::new(&[2, 4, 1], Activation::Sigmoid, Activation::Linear, &mut rng()).unwrap();
        let x = Array2::from_shape_vec((1, 2), vec![0.3, -0.4]).unwrap();

        let trace = mlp.forward_trace(&x);
        let (grad_in, _) = mlp.backward(&trace, &Array2::ones((1, 1)));

        let h = 1e-6;
        for j in 0..2 {
            let mut up = x.clone();
            up[[0, j]] += h;
            let mut down = x.clone();
            down[[0, j]] -= h;
            let numeric = (mlp.forward(&up)[[0, 0]] - mlp.forward(&down)[[0, 0]]) / (2.0 * h);
            assert!((numeric - grad_in[[0, j]]).abs() < 1e-6);
        }
    }
}
