//! Data handling: CSV loading and the in-memory labeled dataset

pub mod data_loader;
mod dataset;

pub use data_loader::DataLoader;
pub use dataset::Dataset;
