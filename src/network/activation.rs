//! Activation functions for dense layers

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Activation function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified Linear Unit
    ReLU,
    /// Leaky ReLU with slope 0.01 for negative inputs
    LeakyReLU,
    /// Sigmoid
    Sigmoid,
    /// Hyperbolic tangent
    Tanh,
    /// Linear (identity)
    Linear,
}

impl Default for Activation {
    fn default() -> Self {
        Self::ReLU
    }
}

const LEAKY_SLOPE: f64 = 0.01;

impl Activation {
    /// Apply the activation elementwise to pre-activations
    pub fn apply(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| v.max(0.0)),
            Activation::LeakyReLU => z.mapv(|v| if v > 0.0 { v } else { LEAKY_SLOPE * v }),
            Activation::Sigmoid => z.mapv(sigmoid),
            Activation::Tanh => z.mapv(f64::tanh),
            Activation::Linear => z.clone(),
        }
    }

    /// Derivative with respect to the pre-activation `z`
    pub fn derivative(&self, z: &Array2<f64>) -> Array2<f64> {
        match self {
            Activation::ReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
            Activation::LeakyReLU => z.mapv(|v| if v > 0.0 { 1.0 } else { LEAKY_SLOPE }),
            Activation::Sigmoid => z.mapv(|v| {
                let s = sigmoid(v);
                s * (1.0 - s)
            }),
            Activation::Tanh => z.mapv(|v| {
                let t = v.tanh();
                1.0 - t * t
            }),
            Activation::Linear => Array2::ones(z.raw_dim()),
        }
    }

    /// Parse an activation name as used on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "relu" => Some(Activation::ReLU),
            "leaky_relu" | "leakyrelu" => Some(Activation::LeakyReLU),
            "sigmoid" | "sigma" => Some(Activation::Sigmoid),
            "tanh" => Some(Activation::Tanh),
            "linear" | "identity" => Some(Activation::Linear),
            _ => None,
        }
    }
}

fn sigmoid(v: f64) -> f64 {
    1.0 / (1.0 + (-v).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_relu_and_derivative() {
        let z = array![[-1.0, 0.0, 2.0]];
        assert_eq!(Activation::ReLU.apply(&z), array![[0.0, 0.0, 2.0]]);
        assert_eq!(Activation::ReLU.derivative(&z), array![[0.0, 0.0, 1.0]]);
    }

    #[test]
    fn test_sigmoid_midpoint() {
        let z = array![[0.0]];
        let s = Activation::Sigmoid.apply(&z);
        assert!((s[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((Activation::Sigmoid.derivative(&z)[[0, 0]] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_tanh_derivative_matches_finite_difference() {
        let h = 1e-6;
        for &v in &[-1.3, -0.2, 0.0, 0.7, 2.1] {
            let z = array![[v]];
            let analytic = Activation::Tanh.derivative(&z)[[0, 0]];
            let numeric = ((v + h).tanh() - (v - h).tanh()) / (2.0 * h);
            assert!((analytic - numeric).abs() < 1e-6);
        }
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Activation::from_name("ReLU"), Some(Activation::ReLU));
        assert_eq!(Activation::from_name("leaky_relu"), Some(Activation::LeakyReLU));
        assert_eq!(Activation::from_name("swish"), None);
    }
}
