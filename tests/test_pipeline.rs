//! Integration test: CSV loading, persistence and the feature-pair search

use autoencoder_anomaly::anomaly::{AutoencoderModel, KnnConfig, ModelConfig, VaeModel};
use autoencoder_anomaly::evaluation::{roc_auc, ClassificationMetrics};
use autoencoder_anomaly::experiment::{FeatureSearch, SearchConfig, SearchReport};
use autoencoder_anomaly::training::TrainConfig;
use autoencoder_anomaly::utils::DataLoader;
use std::io::Write;
use tempfile::NamedTempFile;

/// Three features; anomalies every 8th row are shifted in `a` and `b`
fn write_dataset() -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    writeln!(file, "a,b,noise,label").unwrap();
    for i in 0..96 {
        let t = (i as f64 * 0.21).sin() * 0.3;
        let anomalous = i % 8 == 0;
        let shift = if anomalous { 2.5 } else { 0.0 };
        writeln!(
            file,
            "{},{},{},{}",
            t + shift,
            0.5 * t - shift,
            (i as f64 * 1.7).cos(),
            u8::from(anomalous)
        )
        .unwrap();
    }
    file
}

fn model_config() -> ModelConfig {
    ModelConfig::new()
        .with_train(TrainConfig::new(32, 300))
        .with_seed(5)
        .with_history(true)
}

#[test]
fn test_fit_on_loaded_csv() {
    let file = write_dataset();
    let data = DataLoader::new().load_csv(file.path(), "label").unwrap();
    assert_eq!(data.n_features(), 3);
    assert_eq!(data.class_counts(), (84, 12));

    let (train, test) = data.train_test_split(0.25, 5).unwrap();
    let mut model = AutoencoderModel::new(&[3, 8, 2], &[2, 8, 3], model_config()).unwrap();
    model.fit(&train.x, &train.y).unwrap();
    assert!((model.contamination() - 9.0 / 63.0).abs() < 1e-12);

    let scores = model.anomaly_score(&test.x).unwrap();
    let auc = roc_auc(&scores, &test.y).unwrap();
    assert!((0.0..=1.0).contains(&auc));

    let metrics = ClassificationMetrics::compute(&test.y, &model.predict(&test.x).unwrap()).unwrap();
    assert_eq!(
        metrics.true_positives + metrics.false_positives + metrics.true_negatives + metrics.false_negatives,
        test.n_samples()
    );
}

#[test]
fn test_save_load_preserves_predictions() {
    let file = write_dataset();
    let data = DataLoader::new().load_csv(file.path(), "label").unwrap();

    let mut model = AutoencoderModel::new(&[3, 8, 2], &[2, 8, 3], model_config()).unwrap();
    model.fit(&data.x, &data.y).unwrap();

    let saved = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    model.save(saved.path()).unwrap();
    let loaded = AutoencoderModel::load(saved.path()).unwrap();

    assert_eq!(loaded.threshold(), model.threshold());
    assert_eq!(loaded.contamination(), model.contamination());
    assert_eq!(loaded.history().unwrap().len(), 300);
    let before = model.anomaly_score(&data.x).unwrap();
    let after = loaded.anomaly_score(&data.x).unwrap();
    assert!(before.iter().zip(after.iter()).all(|(a, b)| (a - b).abs() < 1e-12));
    assert_eq!(loaded.predict(&data.x).unwrap(), model.predict(&data.x).unwrap());
}

#[test]
fn test_vae_save_load() {
    let file = write_dataset();
    let data = DataLoader::new().load_csv(file.path(), "label").unwrap();

    let mut model = VaeModel::new(&[3, 8, 4], &[2, 8, 3], model_config().with_kl_weight(0.1)).unwrap();
    model.fit(&data.x, &data.y).unwrap();

    let saved = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    model.save(saved.path()).unwrap();
    let loaded = VaeModel::load(saved.path()).unwrap();
    assert_eq!(loaded.model().kl_weight(), 0.1);
    assert_eq!(loaded.predict(&data.x).unwrap(), model.predict(&data.x).unwrap());
}

#[test]
fn test_model_config_json_file() {
    let config = model_config().with_beta(0.8);
    let file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    config.to_json_file(file.path()).unwrap();
    assert_eq!(ModelConfig::from_json_file(file.path()).unwrap(), config);
}

#[test]
fn test_feature_search_on_csv() {
    let file = write_dataset();
    let data = DataLoader::new().load_csv(file.path(), "label").unwrap();

    let config = SearchConfig::new()
        .with_n_pairs(3)
        .with_seed(9)
        .with_architecture(4, 1)
        .with_model(ModelConfig::new().with_train(TrainConfig::new(32, 100)))
        .with_knn(KnnConfig { n_neighbors: 3, ..Default::default() });
    let report = FeatureSearch::new(config).run(&data).unwrap();

    // three features give exactly three pairs
    assert_eq!(report.results.len(), 3);
    let best = report.best().unwrap();
    assert_eq!(best.best_auc(), report.results[0].best_auc());

    let json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
    report.save_json(json_file.path()).unwrap();
    let parsed: SearchReport =
        serde_json::from_str(&std::fs::read_to_string(json_file.path()).unwrap()).unwrap();
    assert_eq!(parsed, report);
}
