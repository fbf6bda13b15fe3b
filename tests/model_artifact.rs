use std::fs;

use matchcast::features::FEATURE_NAMES;
use matchcast::model::{
    ModelArtifact, N_FEATURES, TrainConfig, load_artifact, save_artifact, train_final,
};

fn synthetic(n: usize) -> (Vec<[f64; N_FEATURES]>, Vec<u8>) {
    let mut rows = Vec::with_capacity(n);
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let mut row = [1.0; N_FEATURES];
        let (diff, label) = match i % 3 {
            0 => (150.0, 0u8),
            1 => (0.0, 1),
            _ => (-150.0, 2),
        };
        row[0] = diff + (i % 5) as f64;
        rows.push(row);
        labels.push(label);
    }
    (rows, labels)
}

#[test]
fn artifact_survives_a_disk_round_trip() {
    let (rows, labels) = synthetic(120);
    let cfg = TrainConfig::default();
    let (model, cv) = train_final(&rows, &labels, cfg).expect("training should succeed");
    let artifact = ModelArtifact::new(&model, cv, cfg, rows.len());

    let dir = std::env::temp_dir().join("matchcast_artifact_test");
    fs::create_dir_all(&dir).expect("temp dir");
    let path = dir.join("model.json");

    save_artifact(&path, &artifact).expect("save should succeed");
    let loaded = load_artifact(&path).expect("load should succeed");
    fs::remove_file(&path).ok();

    assert_eq!(loaded.version, artifact.version);
    assert_eq!(loaded.feature_names, FEATURE_NAMES.to_vec());
    assert_eq!(loaded.train_samples, rows.len());

    let reloaded = loaded.classifier();
    let original = model.predict_proba(&rows[7]);
    let round_tripped = reloaded.predict_proba(&rows[7]);
    assert_eq!(original.home.to_bits(), round_tripped.home.to_bits());
    assert_eq!(original.draw.to_bits(), round_tripped.draw.to_bits());
    assert_eq!(original.away.to_bits(), round_tripped.away.to_bits());
}

#[test]
fn loading_a_missing_artifact_fails_with_the_path() {
    let path = std::env::temp_dir().join("matchcast_artifact_test_missing.json");
    let err = load_artifact(&path).expect_err("missing file should fail");
    assert!(format!("{err:#}").contains("matchcast_artifact_test_missing"));
}
