//! Variational autoencoder
//!
//! The encoder emits `2·latent` values per row, the latent mean followed by
//! the latent log-variance. Training samples `z = μ + σ·ε` with ε ~ N(0, 1)
//! and minimises reconstruction MSE plus a weighted KL divergence to the
//! standard normal prior. Scoring is deterministic: rows are reconstructed
//! from their latent mean.

use ndarray::{concatenate, s, Array2, Axis};
use rand::{Rng, RngCore};
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::anomaly::autoencoder::validate_sizes;
use crate::anomaly::{check_width, Reconstructor};
use crate::error::{AnomalyError, Result};
use crate::network::{Activation, Mlp, NetworkConfig};
use crate::optimizer::Optimizer;
use crate::training::{self, BatchSampler, TrainConfig, TrainStep, TrainSummary, TrainingHistory};

/// Variational autoencoder with a Gaussian latent space
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariationalAutoencoder {
    encoder: Mlp,
    decoder: Mlp,
    kl_weight: f64,
}

impl VariationalAutoencoder {
    /// Build from layer widths. The encoder's last width must be twice the
    /// decoder's first width, e.g. `esize = [d, 32, 4]`, `dsize = [2, 32, d]`.
    pub fn from_sizes<R: Rng + ?Sized>(
        esize: &[usize],
        dsize: &[usize],
        network: &NetworkConfig,
        kl_weight: f64,
        rng: &mut R,
    ) -> Result<Self> {
        validate_sizes(esize, dsize, 2)?;
        if !kl_weight.is_finite() || kl_weight < 0.0 {
            return Err(AnomalyError::invalid_parameter(
                "kl_weight",
                kl_weight,
                "must be finite and non-negative",
            ));
        }
        // Mean and log-variance are unbounded
        let encoder = Mlp::new(esize, network.hidden_activation, Activation::Linear, rng)?;
        let decoder = Mlp::new(dsize, network.hidden_activation, network.output_activation, rng)?;
        Ok(Self {
            encoder,
            decoder,
            kl_weight,
        })
    }

    pub fn latent_dim(&self) -> usize {
        self.decoder.input_dim()
    }

    pub fn kl_weight(&self) -> f64 {
        self.kl_weight
    }

    /// Latent mean and log-variance of every row
    pub fn encode(&self, x: &Array2<f64>) -> Result<(Array2<f64>, Array2<f64>)> {
        check_width(x, self.encoder.input_dim())?;
        Ok(self.split(&self.encoder.forward(x)))
    }

    fn split(&self, stats: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let l = self.latent_dim();
        (
            stats.slice(s![.., ..l]).to_owned(),
            stats.slice(s![.., l..]).to_owned(),
        )
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

    /// Loss and parameter gradients for a batch with fixed noise `eps`
    fn loss_and_gradients(&self, batch: &Array2<f64>, eps: &Array2<f64>) -> Result<(f64, Vec<Array2<f64>>)> {
        let enc_trace = self.encoder.forward_trace(batch);
        let (mu, logvar) = self.split(enc_trace.output());
        let sigma = logvar.mapv(|v| (0.5 * v).exp());
        let z = &mu + &(&sigma * eps);

        let dec_trace = self.decoder.forward_trace(&z);
        let diff = dec_trace.output() - batch;
        let n = diff.len() as f64;
        let m = batch.nrows() as f64;

        let recon_loss = diff.mapv(|d| d * d).sum() / n;
        let kl_terms = &logvar.mapv(f64::exp) + &mu.mapv(|v| v * v) - &logvar - 1.0;
        let kl = 0.5 * kl_terms.sum() / m;
        let loss = recon_loss + self.kl_weight * kl;

        let grad_output = diff * (2.0 / n);
        let (grad_z, mut decoder_grads) = self.decoder.backward(&dec_trace, &grad_output);

        let kl_scale = self.kl_weight / m;
        let grad_mu = &grad_z + &(&mu * kl_scale);
        let grad_logvar = &grad_z * eps * &sigma * 0.5
            + logvar.mapv(|v| 0.5 * kl_scale * (v.exp() - 1.0));

        let grad_stats = concatenate(Axis(1), &[grad_mu.view(), grad_logvar.view()])?;
        let (_, mut grads) = self.encoder.backward(&enc_trace, &grad_stats);
        grads.append(&mut decoder_grads);

        Ok((loss, grads))
    }
}

impl TrainStep for VariationalAutoencoder {
    fn train_step(
        &mut self,
        batch: &Array2<f64>,
        optimizer: &mut dyn Optimizer,
        rng: &mut dyn RngCore,
    ) -> Result<f64> {
        let eps = Array2::from_shape_fn((batch.nrows(), self.latent_dim()), |_| {
            rng.sample::<f64, _>(StandardNormal)
        });
        let (loss, grads) = self.loss_and_gradients(batch, &eps)?;

        let mut params = self.encoder.parameters_mut();
        params.extend(self.decoder.parameters_mut());
        optimizer.step(params, &grads);

        Ok(loss)
    }
}

impl Reconstructor for VariationalAutoencoder {
    fn input_dim(&self) -> usize {
        self.encoder.input_dim()
    }

    fn reconstruct(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mu, _) = self.encode(x)?;
        Ok(self.decoder.forward(&mu))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::Adam;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn rng() -> Xoshiro256PlusPlus {
        Xoshiro256PlusPlus::seed_from_u64(11)
    }

    fn blob(n: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, 3), |(i, j)| ((i * 3 + j) % 7) as f64 * 0.1 - 0.3)
    }

    #[test]
    fn test_size_validation_requires_doubled_latent() {
        let net = NetworkConfig::default();
        let mut r = rng();
        assert!(VariationalAutoencoder::from_sizes(&[3, 4, 2], &[2, 4, 3], &net, 1.0, &mut r).is_err());
        assert!(VariationalAutoencoder::from_sizes(&[3, 4, 4], &[2, 4, 3], &net, 1.0, &mut r).is_ok());
        assert!(VariationalAutoencoder::from_sizes(&[3, 4, 4], &[2, 4, 3], &net, -1.0, &mut r).is_err());
    }

    #[test]
    fn test_scores_are_deterministic_per_row() {
        let vae = VariationalAutoencoder::from_sizes(&[3, 5, 4], &[2, 5, 3], &NetworkConfig::default(), 1.0, &mut rng())
            .unwrap();
        let x = blob(9);
        let a = vae.anomaly_score(&x).unwrap();
        let b = vae.anomaly_score(&x).unwrap();
        assert_eq!(a.len(), 9);
        assert_eq!(a, b);
    }

    #[test]
    fn test_gradients_match_finite_difference() {
        let net = NetworkConfig::default().with_hidden_activation(Activation::Tanh);
        let mut vae = VariationalAutoencoder::from_sizes(&[3, 4, 4], &[2, 4, 3], &net, 0.5, &mut rng()).unwrap();
        let x = blob(4);
        let eps = Array2::from_shape_fn((4, 2), |(i, j)| (i as f64 - 1.5) * 0.4 + j as f64 * 0.3);

        let (_, grads) = vae.loss_and_gradients(&x, &eps).unwrap();
        let h = 1e-6;
        let n_encoder = vae.encoder.parameters_mut().len();

        for (t, grad) in grads.iter().enumerate() {
            for r in 0..grad.nrows() {
                for c in 0..grad.ncols() {
                    let perturb = |vae: &mut VariationalAutoencoder, delta: f64| {
                        let params = if t < n_encoder {
                            vae.encoder.parameters_mut()
                        } else {
                            vae.decoder.parameters_mut()
                        };
                        let idx = if t < n_encoder { t } else { t - n_encoder };
                        let mut params = params;
                        params[idx][[r, c]] += delta;
                    };
                    perturb(&mut vae, h);
                    let up = vae.loss_and_gradients(&x, &eps).unwrap().0;
                    perturb(&mut vae, -2.0 * h);
                    let down = vae.loss_and_gradients(&x, &eps).unwrap().0;
                    perturb(&mut vae, h);

                    let numeric = (up - down) / (2.0 * h);
                    assert!(
                        (numeric - grad[[r, c]]).abs() < 1e-5,
                        "tensor {} [{}, {}]: numeric {} vs analytic {}",
                        t, r, c, numeric, grad[[r, c]]
                    );
                }
            }
        }
    }

    #[test]
    fn test_training_reduces_reconstruction_error() {
        let net = NetworkConfig::default().with_hidden_activation(Activation::Tanh);
        let mut vae = VariationalAutoencoder::from_sizes(&[3, 8, 4], &[2, 8, 3], &net, 0.01, &mut rng()).unwrap();
        let x = blob(60);
        let before = vae.loss(&x).unwrap();
        vae.fit(&x, &TrainConfig::new(20, 800), &mut Adam::new(0.01), &mut BatchSampler::seed_from_u64(2), None)
            .unwrap();
        let after = vae.loss(&x).unwrap();
        assert!(after < before, "loss {} -> {}", before, after);
    }
}
