//! Minibatch sampling
//!
//! Every call draws a fresh batch uniformly at random without replacement
//! from the full dataset. Draws are independent across calls: there is no
//! epoch partition, so a row may appear in consecutive batches or be skipped
//! for many of them.

use ndarray::{Array2, Axis};
use rand::seq::index;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Row sampler backed by an explicit, seedable random source
#[derive(Debug, Clone)]
pub struct BatchSampler {
    rng: Xoshiro256PlusPlus,
}

impl Default for BatchSampler {
    fn default() -> Self {
        Self::from_entropy()
    }
}

impl BatchSampler {
    pub fn new(rng: Xoshiro256PlusPlus) -> Self {
        Self { rng }
    }

    pub fn seed_from_u64(seed: u64) -> Self {
        Self::new(Xoshiro256PlusPlus::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(Xoshiro256PlusPlus::from_entropy())
    }

    /// Seeded when `seed` is given, entropy-backed otherwise
    pub fn from_seed_option(seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seed_from_u64(seed),
            None => Self::from_entropy(),
        }
    }

    /// Draw `k` distinct indices from `0..n`; `k` is capped at `n`
    pub fn sample_indices(&mut self, n: usize, k: usize) -> Vec<usize> {
        index::sample(&mut self.rng, n, k.min(n)).into_vec()
    }

    /// Draw a batch of `k` distinct rows of `x`
    pub fn sample_rows(&mut self, x: &Array2<f64>, k: usize) -> Array2<f64> {
        let indices = self.sample_indices(x.nrows(), k);
        x.select(Axis(0), &indices)
    }

    /// The underlying random source, shared with stochastic training steps
    pub fn rng_mut(&mut self) -> &mut Xoshiro256PlusPlus {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_indices_are_distinct_and_in_range() {
        let mut sampler = BatchSampler::seed_from_u64(1);
        for _ in 0..50 {
            let idx = sampler.sample_indices(20, 8);
            assert_eq!(idx.len(), 8);
            let unique: HashSet<_> = idx.iter().copied().collect();
            assert_eq!(unique.len(), 8);
            assert!(idx.iter().all(|&i| i < 20));
        }
    }

    #[test]
    fn test_batch_larger_than_data_is_capped() {
        let mut sampler = BatchSampler::seed_from_u64(1);
        let mut idx = sampler.sample_indices(5, 10);
        idx.sort_unstable();
        assert_eq!(idx, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_same_seed_same_draws() {
        let mut a = BatchSampler::seed_from_u64(99);
        let mut b = BatchSampler::seed_from_u64(99);
        for _ in 0..10 {
            assert_eq!(a.sample_indices(100, 16), b.sample_indices(100, 16));
        }
    }

    #[test]
    fn test_draws_are_not_an_epoch_partition() {
        // Over many single-row draws from 4 rows, some row must repeat before
        // all 4 have been seen at least once in some window.
        let mut sampler = BatchSampler::seed_from_u64(3);
        let draws: Vec<usize> = (0..200).map(|_| sampler.sample_indices(4, 1)[0]).collect();
        let repeated_within_four = draws.chunks(4).any(|c| {
            let unique: HashSet<_> = c.iter().collect();
            unique.len() < c.len()
        });
        assert!(repeated_within_four);
    }

    #[test]
    fn test_sample_rows_shape() {
        let x = Array2::from_shape_fn((10, 3), |(i, j)| (i * 3 + j) as f64);
        let mut sampler = BatchSampler::seed_from_u64(5);
        let batch = sampler.sample_rows(&x, 4);
        assert_eq!(batch.dim(), (4, 3));
        for row in batch.rows() {
            // every sampled row is an original row
            let first = row[0] as usize;
            assert_eq!(first % 3, 0);
            assert_eq!(row[1], row[0] + 1.0);
        }
    }
}
