//! Append-only record of per-iteration training losses

use serde::{Deserialize, Serialize};

/// Training loss history.
///
/// Entries are appended in iteration order and are never removed; repeated
/// training runs keep extending the same history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    losses: Vec<f64>,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, loss: f64) {
        self.losses.push(loss);
    }

    pub fn losses(&self) -> &[f64] {
        &self.losses
    }

    pub fn len(&self) -> usize {
        self.losses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.losses.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.losses.last().copied()
    }

    /// Lowest loss seen so far
    pub fn best(&self) -> Option<f64> {
        self.losses.iter().copied().fold(None, |best, l| match best {
            Some(b) if b <= l => Some(b),
            _ => Some(l),
        })
    }
}
