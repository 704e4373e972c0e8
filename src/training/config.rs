//! Training loop configuration

use serde::{Deserialize, Serialize};

use crate::error::{AnomalyError, Result};

/// Settings of the minibatch training loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Rows drawn per iteration (capped at the dataset size)
    pub batch_size: usize,

    /// Number of optimizer steps
    pub iterations: usize,

    /// Progress is logged every `cbit` iterations when `verbose` is set
    pub cbit: usize,

    /// Log progress and early-stop messages
    pub verbose: bool,

    /// Stop once a batch loss falls below this value; `None` disables
    pub rdelta: Option<f64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size: 256,
            iterations: 10_000,
            cbit: 1_000,
            verbose: false,
            rdelta: None,
        }
    }
}

impl TrainConfig {
    pub fn new(batch_size: usize, iterations: usize) -> Self {
        Self {
            batch_size,
            iterations,
            ..Default::default()
        }
    }

    /// Builder method to set the progress interval
    pub fn with_cbit(mut self, cbit: usize) -> Self {
        self.cbit = cbit;
        self
    }

    /// Builder method to toggle progress logging
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Builder method to set the early-stop delta
    pub fn with_rdelta(mut self, rdelta: f64) -> Self {
        self.rdelta = Some(rdelta);
        self
    }

    /// Early-stop delta if it is set and finite
    pub fn early_stop_delta(&self) -> Option<f64> {
        self.rdelta.filter(|d| d.is_finite())
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(AnomalyError::invalid_parameter(
                "batch_size",
                self.batch_size,
                "must be at least 1",
            ));
        }
        if self.cbit == 0 {
            return Err(AnomalyError::invalid_parameter("cbit", self.cbit, "must be at least 1"));
        }
        if let Some(d) = self.rdelta {
            if d.is_nan() {
                return Err(AnomalyError::invalid_parameter("rdelta", d, "must not be NaN"));
            }
        }
        Ok(())
    }
}
