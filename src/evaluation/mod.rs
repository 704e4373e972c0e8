//! Evaluation of anomaly scores and labels
//!
//! - [`roc_auc`] and [`roc_curve`] rank continuous scores against 0/1 labels
//! - [`ClassificationMetrics`] summarises hard predictions

mod metrics;

pub use metrics::{roc_auc, roc_curve, ClassificationMetrics, RocCurve};
