//! Autoencoder: encoder and decoder networks trained jointly to reconstruct
//! their input

use ndarray::Array2;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::anomaly::{check_width, Reconstructor};
use crate::error::{AnomalyError, Result};
use crate::network::{Mlp, NetworkConfig};
use crate::optimizer::Optimizer;
use crate::training::{self, BatchSampler, TrainConfig, TrainStep, TrainSummary, TrainingHistory};

/// Encoder/decoder pair with `forward(x) = decoder(encoder(x))`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Autoencoder {
    encoder: Mlp,
    decoder: Mlp,
}

impl Autoencoder {
    /// Compose existing networks. The decoder must map the encoder's output
    /// width back to the encoder's input width.
    pub fn new(encoder: Mlp, decoder: Mlp) -> Result<Self> {
        if encoder.output_dim() != decoder.input_dim() {
            return Err(AnomalyError::ArchitectureError(format!(
                "encoder outputs {} values but decoder expects {}",
                encoder.output_dim(),
                decoder.input_dim()
            )));
        }
        if encoder.input_dim() != decoder.output_dim() {
            return Err(AnomalyError::ArchitectureError(format!(
                "encoder reads {} features but decoder reconstructs {}",
                encoder.input_dim(),
                decoder.output_dim()
            )));
        }
        Ok(Self { encoder, decoder })
    }

    /// Build from layer widths, e.g. `esize = [d, 32, 2]`, `dsize = [2, 32, d]`.
    pub fn from_sizes<R: Rng + ?Sized>(
        esize: &[usize],
        dsize: &[usize],
        network: &NetworkConfig,
        rng: &mut R,
    ) -> Result<Self> {
        validate_sizes(esize, dsize, 1)?;
        let encoder = Mlp::new(esize, network.hidden_activation, network.latent_activation, rng)?;
        let decoder = Mlp::new(dsize, network.hidden_activation, network.output_activation, rng)?;
        Self::new(encoder, decoder)
    }

    pub fn encoder(&self) -> &Mlp {
        &self.encoder
    }

    pub fn decoder(&self) -> &Mlp {
        &self.decoder
    }

    pub fn latent_dim(&self) -> usize {
        self.encoder.output_dim()
    }

    /// Latent representation of every row
    pub fn encode(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        check_width(x, self.encoder.input_dim())?;
        Ok(self.encoder.forward(x))
    }

    pub fn forward(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let latent = self.encode(x)?;
        Ok(self.decoder.forward(&latent))
    }

    /// Flattened encoder then decoder parameters
    pub fn flat_parameters(&self) -> Vec<f64> {
        let mut params = self.encoder.flat_parameters();
        params.extend(self.decoder.flat_parameters());
        params
    }

    /// Train on `x` with the minibatch loop
    pub fn fit(
        &mut self,
        x: &Array2<f64>,
        config: &TrainConfig,
        optimizer: &mut dyn Optimizer,
        sampler: &mut BatchSampler,
        history: Option<&mut TrainingHistory>,
    ) -> Result<TrainSummary> {
        check_width(x, self.input_dim())?;
        training::train(self, x, config, optimizer, sampler, history)
    }
}

impl TrainStep for Autoencoder {
    fn train_step(
        &mut self,
        batch: &Array2<f64>,
        optimizer: &mut dyn Optimizer,
        _rng: &mut dyn RngCore,
    ) -> Result<f64> {
        let enc_trace = self.encoder.forward_trace(batch);
        let dec_trace = self.decoder.forward_trace(enc_trace.output());

        let diff = dec_trace.output() - batch;
        let n = diff.len() as f64;
        let loss = diff.mapv(|d| d * d).sum() / n;
        let grad_output = diff * (2.0 / n);

        let (grad_latent, mut grads) = self.decoder.backward(&dec_trace, &grad_output);
        let (_, encoder_grads) = self.encoder.backward(&enc_trace, &grad_latent);

        // Parameter order: encoder first, then decoder
        let mut all_grads = encoder_grads;
        all_grads.append(&mut grads);

        let mut params = self.encoder.parameters_mut();
        params.extend(self.decoder.parameters_mut());
        optimizer.step(params, &all_grads);

        Ok(loss)
    }
}

impl Reconstructor for Autoencoder {
    fn input_dim(&self) -> usize {
        self.encoder.input_dim()
    }

    fn reconstruct(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.forward(x)
    }
}

/// Check encoder/decoder width lists before building any layer.
///
/// `latent_factor` is how many encoder outputs feed one decoder input
/// (1 for a plain autoencoder, 2 when the encoder emits mean and log-variance).
pub(crate) fn validate_sizes(esize: &[usize], dsize: &[usize], latent_factor: usize) -> Result<()> {
    if esize.len() < 3 {
        return Err(AnomalyError::ArchitectureError(format!(
            "encoder needs at least 3 widths, got {:?}",
            esize
        )));
    }
    if dsize.len() < 3 {
        return Err(AnomalyError::ArchitectureError(format!(
            "decoder needs at least 3 widths, got {:?}",
            dsize
        )));
    }
    let (e_first, e_last) = (esize[0], esize[esize.len() - 1]);
    let (d_first, d_last) = (dsize[0], dsize[dsize.len() - 1]);
    if e_last != latent_factor * d_first {
        return Err(AnomalyError::ArchitectureError(format!(
            "encoder output width {} does not match decoder input width {} (x{})",
            e_last, d_first, latent_factor
        )));
    }
    if e_first != d_last {
        return Err(AnomalyError::ArchitectureError(format!(
            "encoder input width {} does not match decoder output width {}",
            e_first, d_last
        )));
    }
    Ok(())
}
