//! Command-line interface
//!
//! `fit` trains a detector on a labeled CSV, `predict` applies a saved
//! detector to new data and `search` runs the feature-pair experiment.

use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::anomaly::{AutoencoderModel, KnnConfig, ModelConfig, VaeModel};
use crate::evaluation::{roc_auc, ClassificationMetrics};
use crate::experiment::{FeatureSearch, SearchConfig, SearchReport};
use crate::optimizer::OptimizerKind;
use crate::training::TrainConfig;
use crate::utils::{DataLoader, Dataset};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ae-anomaly")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Autoencoder-based anomaly detection")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Reconstruction model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelKind {
    /// Deterministic autoencoder
    Ae,
    /// Variational autoencoder
    Vae,
}

/// Training options shared by `fit` and `search`
#[derive(Debug, Clone, clap::Args)]
pub struct TrainArgs {
    /// JSON model configuration; flags below override its fields
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Minibatch size
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Maximum number of training iterations
    #[arg(long)]
    pub iterations: Option<usize>,

    /// Adam learning rate
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Stop once the batch loss falls below this value
    #[arg(long)]
    pub rdelta: Option<f64>,

    /// Threshold tightness in [0, 1]
    #[arg(long)]
    pub beta: Option<f64>,

    /// Random seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Log the loss every `cbit` iterations
    #[arg(short, long)]
    pub verbose: bool,
}

impl TrainArgs {
    /// Model configuration from the optional file plus flag overrides
    pub fn model_config(&self) -> anyhow::Result<ModelConfig> {
        let mut config = match &self.config {
            Some(path) => ModelConfig::from_json_file(path)?,
            None => ModelConfig::default(),
        };

        let mut train: TrainConfig = config.train.clone();
        if let Some(batch_size) = self.batch_size {
            train.batch_size = batch_size;
        }
        if let Some(iterations) = self.iterations {
            train.iterations = iterations;
        }
        if let Some(rdelta) = self.rdelta {
            train = train.with_rdelta(rdelta);
        }
        if self.verbose {
            train = train.with_verbose(true);
        }
        config = config.with_train(train);

        if let Some(learning_rate) = self.learning_rate {
            config = config.with_optimizer(OptimizerKind::Adam { learning_rate });
        }
        if let Some(beta) = self.beta {
            config = config.with_beta(beta);
        }
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train a detector on a labeled CSV and report its metrics
    Fit {
        /// Input CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Name of the 0/1 label column
        #[arg(short, long, default_value = "label")]
        label: String,

        /// Model family
        #[arg(short, long, value_enum, default_value = "ae")]
        model: ModelKind,

        /// Encoder widths, e.g. 4,8,2 (derived from --hidden/--latent if omitted)
        #[arg(long, value_delimiter = ',')]
        encoder: Vec<usize>,

        /// Decoder widths, e.g. 2,8,4
        #[arg(long, value_delimiter = ',')]
        decoder: Vec<usize>,

        /// Hidden layer width of the derived architecture
        #[arg(long, default_value = "8")]
        hidden: usize,

        /// Latent dimension of the derived architecture
        #[arg(long, default_value = "2")]
        latent: usize,

        /// Hold out this fraction of each class for evaluation
        #[arg(long)]
        test_ratio: Option<f64>,

        #[command(flatten)]
        train: TrainArgs,

        /// Save the fitted model as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify a CSV with a saved model
    Predict {
        /// Saved model file
        #[arg(short, long)]
        model: PathBuf,

        /// Model family of the saved file
        #[arg(short, long, value_enum, default_value = "ae")]
        kind: ModelKind,

        /// Input CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Label column; when given, metrics are reported
        #[arg(short, long)]
        label: Option<String>,

        /// Write scores and labels to this CSV
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Compare detectors on random feature pairs
    Search {
        /// Input CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Name of the 0/1 label column
        #[arg(short, long, default_value = "label")]
        label: String,

        /// Number of feature pairs
        #[arg(long, default_value = "10")]
        pairs: usize,

        /// Held-out fraction of each class
        #[arg(long, default_value = "0.3")]
        test_ratio: f64,

        /// Hidden layer width
        #[arg(long, default_value = "8")]
        hidden: usize,

        /// Latent dimension
        #[arg(long, default_value = "1")]
        latent: usize,

        /// Neighbours of the kNN baseline
        #[arg(short, long, default_value = "5")]
        k: usize,

        #[command(flatten)]
        train: TrainArgs,

        /// Write the report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Either reconstruction model behind one interface for the commands
enum Fitted {
    Ae(AutoencoderModel),
    Vae(VaeModel),
}

impl Fitted {
    fn build(kind: ModelKind, esize: &[usize], dsize: &[usize], config: ModelConfig) -> anyhow::Result<Self> {
        Ok(match kind {
            ModelKind::Ae => Fitted::Ae(AutoencoderModel::new(esize, dsize, config)?),
            ModelKind::Vae => Fitted::Vae(VaeModel::new(esize, dsize, config)?),
        })
    }

    fn load(kind: ModelKind, path: &Path) -> anyhow::Result<Self> {
        Ok(match kind {
            ModelKind::Ae => Fitted::Ae(AutoencoderModel::load(path)?),
            ModelKind::Vae => Fitted::Vae(VaeModel::load(path)?),
        })
    }

    fn fit(&mut self, data: &Dataset) -> anyhow::Result<usize> {
        let summary = match self {
            Fitted::Ae(m) => m.fit(&data.x, &data.y)?,
            Fitted::Vae(m) => m.fit(&data.x, &data.y)?,
        };
        Ok(summary.iterations_run)
    }

    fn score_and_predict(&self, x: &Array2<f64>) -> anyhow::Result<(Array1<f64>, Array1<u8>)> {
        Ok(match self {
            Fitted::Ae(m) => (m.anomaly_score(x)?, m.predict(x)?),
            Fitted::Vae(m) => (m.anomaly_score(x)?, m.predict(x)?),
        })
    }

    fn threshold_and_contamination(&self) -> (f64, f64) {
        match self {
            Fitted::Ae(m) => (m.threshold(), m.contamination()),
            Fitted::Vae(m) => (m.threshold(), m.contamination()),
        }
    }

    fn save(&self, path: &Path) -> anyhow::Result<()> {
        match self {
            Fitted::Ae(m) => m.save(path)?,
            Fitted::Vae(m) => m.save(path)?,
        }
        Ok(())
    }
}

/// Encoder and decoder widths: explicit when both are given, otherwise
/// `[n, hidden, latent·f]` and `[latent, hidden, n]`
fn architecture(
    kind: ModelKind,
    n_features: usize,
    encoder: &[usize],
    decoder: &[usize],
    hidden: usize,
    latent: usize,
) -> anyhow::Result<(Vec<usize>, Vec<usize>)> {
    match (encoder.is_empty(), decoder.is_empty()) {
        (false, false) => Ok((encoder.to_vec(), decoder.to_vec())),
        (true, true) => {
            let factor = if kind == ModelKind::Vae { 2 } else { 1 };
            Ok((
                vec![n_features, hidden, latent * factor],
                vec![latent, hidden, n_features],
            ))
        }
        _ => anyhow::bail!("--encoder and --decoder must be given together"),
    }
}

fn load_labeled(path: &Path, label: &str) -> anyhow::Result<Dataset> {
    step_run("Loading data");
    let start = Instant::now();
    let data = DataLoader::new().load_csv(path, label)?;
    let (normal, anomalous) = data.class_counts();
    step_done(&format!(
        "{} rows × {} features ({} normal, {} anomalous) in {:?}",
        data.n_samples(),
        data.n_features(),
        normal,
        anomalous,
        start.elapsed()
    ));
    Ok(data)
}

fn report_metrics(scores: &Array1<f64>, labels: &Array1<u8>, predictions: &Array1<u8>) -> anyhow::Result<()> {
    let metrics = ClassificationMetrics::compute(labels, predictions)?;
    println!();
    match roc_auc(scores, labels) {
        Ok(auc) => kv("ROC AUC", &format!("{:.4}", auc)),
        Err(_) => kv("ROC AUC", "n/a (single class)"),
    }
    kv("Accuracy", &format!("{:.4}", metrics.accuracy));
    kv("Precision", &format!("{:.4}", metrics.precision));
    kv("Recall", &format!("{:.4}", metrics.recall));
    kv("F1", &format!("{:.4}", metrics.f1_score));
    kv(
        "Confusion",
        &format!(
            "tp {} fp {} tn {} fn {}",
            metrics.true_positives, metrics.false_positives, metrics.true_negatives, metrics.false_negatives
        ),
    );
    Ok(())
}

fn write_predictions(path: &Path, scores: &Array1<f64>, predictions: &Array1<u8>) -> anyhow::Result<()> {
    let labels: Vec<i32> = predictions.iter().map(|&l| i32::from(l)).collect();
    let mut df = DataFrame::new(vec![
        Column::new("score".into(), scores.to_vec()),
        Column::new("anomalous".into(), labels),
    ])?;
    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}

// ─── Commands ──────────────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub fn cmd_fit(
    data_path: &Path,
    label: &str,
    kind: ModelKind,
    encoder: &[usize],
    decoder: &[usize],
    hidden: usize,
    latent: usize,
    test_ratio: Option<f64>,
    train: &TrainArgs,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Fit");

    let data = load_labeled(data_path, label)?;
    let config = train.model_config()?;
    let (train_set, eval_set) = match test_ratio {
        Some(ratio) => {
            let (a, b) = data.train_test_split(ratio, config.seed.unwrap_or(0))?;
            step_ok(&format!("Split {} train / {} test rows", a.n_samples(), b.n_samples()));
            (a, b)
        }
        None => (data.clone(), data),
    };

    let (esize, dsize) = architecture(kind, train_set.n_features(), encoder, decoder, hidden, latent)?;
    let mut model = Fitted::build(kind, &esize, &dsize, config)?;

    step_run(&format!("Training {} {:?} → {:?}", format!("{:?}", kind).to_lowercase().cyan(), esize, dsize));
    let start = Instant::now();
    let iterations = model.fit(&train_set)?;
    step_done(&format!("{} iterations in {:?}", iterations, start.elapsed()));

    let (threshold, contamination) = model.threshold_and_contamination();
    println!();
    kv("Threshold", &format!("{:.6}", threshold));
    kv("Contamination", &format!("{:.4}", contamination));

    let (scores, predictions) = model.score_and_predict(&eval_set.x)?;
    report_metrics(&scores, &eval_set.y, &predictions)?;

    if let Some(path) = output {
        println!();
        step_run(&format!("Saving → {}", path.display()));
        model.save(path)?;
        step_done("");
    }
    println!();
    Ok(())
}

pub fn cmd_predict(
    model_path: &Path,
    kind: ModelKind,
    data_path: &Path,
    label: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Predict");

    step_run(&format!("Loading model {}", model_path.display()));
    let model = Fitted::load(kind, model_path)?;
    step_done("");

    let (x, labels) = match label {
        Some(label) => {
            let data = load_labeled(data_path, label)?;
            (data.x, Some(data.y))
        }
        None => {
            step_run("Loading data");
            let (x, _) = DataLoader::new().load_features(data_path)?;
            step_done(&format!("{} rows × {} features", x.nrows(), x.ncols()));
            (x, None)
        }
    };

    let (scores, predictions) = model.score_and_predict(&x)?;
    let flagged = predictions.iter().filter(|&&l| l == 1).count();
    println!();
    kv("Rows", &x.nrows().to_string());
    kv("Anomalous", &format!("{} ({:.1}%)", flagged, 100.0 * flagged as f64 / x.nrows() as f64));

    if let Some(labels) = labels {
        report_metrics(&scores, &labels, &predictions)?;
    }

    if let Some(path) = output {
        println!();
        step_run(&format!("Saving → {}", path.display()));
        write_predictions(path, &scores, &predictions)?;
        step_done(&format!("{} rows", scores.len()));
    }
    println!();
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_search(
    data_path: &Path,
    label: &str,
    pairs: usize,
    test_ratio: f64,
    hidden: usize,
    latent: usize,
    k: usize,
    train: &TrainArgs,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Search");

    let data = load_labeled(data_path, label)?;
    let model = train.model_config()?;
    let config = SearchConfig::new()
        .with_n_pairs(pairs)
        .with_test_ratio(test_ratio)
        .with_seed(model.seed.unwrap_or(0))
        .with_architecture(hidden, latent)
        .with_model(model)
        .with_knn(KnnConfig { n_neighbors: k, ..Default::default() });

    step_run(&format!("Evaluating {} feature pairs", pairs));
    let start = Instant::now();
    let report = FeatureSearch::new(config).run(&data)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_report(&report);

    if let Some(path) = output {
        step_run(&format!("Saving → {}", path.display()));
        report.save_json(path)?;
        step_done("");
    }
    println!();
    Ok(())
}

fn print_report(report: &SearchReport) {
    println!();
    println!(
        "  {:<28} {:>8} {:>8} {:>8}",
        muted("Features"),
        muted("AE"),
        muted("VAE"),
        muted("kNN")
    );
    for r in &report.results {
        let cell = |name: &str, auc: f64| {
            let text = format!("{:.4}", auc);
            if name == r.best_detector() {
                text.green().bold()
            } else {
                text.white()
            }
        };
        println!(
            "  {:<28} {:>8} {:>8} {:>8}",
            format!("{} × {}", r.feature_names[0], r.feature_names[1]),
            cell("ae", r.ae_auc),
            cell("vae", r.vae_auc),
            cell("knn", r.knn_auc)
        );
    }
    if let Some((ae, vae, knn)) = report.mean_auc() {
        println!(
            "  {:<28} {:>8} {:>8} {:>8}",
            dim("mean"),
            format!("{:.4}", ae),
            format!("{:.4}", vae),
            format!("{:.4}", knn)
        );
    }
    println!();
}
