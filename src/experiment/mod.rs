//! Feature-subset experiments
//!
//! [`FeatureSearch`] projects a labeled dataset onto random feature pairs
//! and compares the autoencoder, the variational autoencoder and the kNN
//! baseline on each projection by held-out ROC AUC.

mod report;
mod search;

pub use report::{PairResult, SearchReport};
pub use search::{FeatureSearch, SearchConfig};
