//! Neural network building blocks
//!
//! Dense layers with analytic gradients, composed into multi-layer
//! perceptrons that serve as encoder and decoder transforms.

mod activation;
mod layers;

pub use activation::Activation;
pub use layers::{Dense, Mlp, Trace};

use serde::{Deserialize, Serialize};

/// Activation choices for an encoder/decoder pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Activation of hidden layers
    pub hidden_activation: Activation,
    /// Activation of the encoder's final layer
    pub latent_activation: Activation,
    /// Activation of the decoder's final layer
    pub output_activation: Activation,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            hidden_activation: Activation::ReLU,
            latent_activation: Activation::Linear,
            output_activation: Activation::Linear,
        }
    }
}

impl NetworkConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the hidden-layer activation
    pub fn with_hidden_activation(mut self, activation: Activation) -> Self {
        self.hidden_activation = activation;
        self
    }

    /// Builder method to set the latent (encoder output) activation
    pub fn with_latent_activation(mut self, activation: Activation) -> Self {
        self.latent_activation = activation;
        self
    }

    /// Builder method to set the reconstruction (decoder output) activation
    pub fn with_output_activation(mut self, activation: Activation) -> Self {
        self.output_activation = activation;
        self
    }
}
