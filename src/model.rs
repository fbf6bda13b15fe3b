use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::features::FEATURE_NAMES;

pub const N_FEATURES: usize = FEATURE_NAMES.len();
pub const N_CLASSES: usize = 3;

#[derive(Debug, Clone, Copy)]
pub struct TrainConfig {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    pub cv_folds: usize,
    pub random_state: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.05,
            epochs: 600,
            l2: 1e-3,
            cv_folds: 5,
            random_state: 42,
        }
    }
}

/// Outcome distribution over {home, draw, away}.
#[derive(Debug, Clone, Copy)]
pub struct Prob3 {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
}

impl Prob3 {
    pub fn uniform() -> Self {
        Self {
            home: 1.0 / 3.0,
            draw: 1.0 / 3.0,
            away: 1.0 / 3.0,
        }
    }

    pub fn argmax_label(&self) -> u8 {
        if self.home >= self.draw && self.home >= self.away {
            0
        } else if self.draw >= self.away {
            1
        } else {
            2
        }
    }

    fn class(&self, label: u8) -> f64 {
        match label {
            0 => self.home,
            1 => self.draw,
            _ => self.away,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Metrics {
    pub samples: usize,
    pub log_loss: f64,
    pub accuracy: f64,
}

/// Multinomial logistic regression over standardized features. Any model with
/// this fit/predict_proba shape can stand in; nothing downstream looks inside.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classifier {
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    /// coeffs[class][feature], over standardized inputs.
    pub coeffs: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
}

impl Classifier {
    /// Batch gradient descent with L2 on the weights. Weight init is the only
    /// seeded randomness in the pipeline.
    pub fn fit(rows: &[[f64; N_FEATURES]], labels: &[u8], cfg: TrainConfig) -> Result<Self> {
        if rows.is_empty() {
            return Err(anyhow!("no training rows"));
        }
        if rows.len() != labels.len() {
            return Err(anyhow!(
                "feature/label length mismatch: {} vs {}",
                rows.len(),
                labels.len()
            ));
        }
        if let Some(bad) = labels.iter().find(|l| **l >= N_CLASSES as u8) {
            return Err(anyhow!("label {bad} out of range"));
        }

        let (means, stds) = column_stats(rows);
        let x: Vec<[f64; N_FEATURES]> = rows
            .iter()
            .map(|row| standardize(row, &means, &stds))
            .collect();

        let mut rng = StdRng::seed_from_u64(cfg.random_state);
        let mut coeffs: Vec<Vec<f64>> = (0..N_CLASSES)
            .map(|_| (0..N_FEATURES).map(|_| rng.gen_range(-0.01..0.01)).collect())
            .collect();
        let mut intercepts = vec![0.0; N_CLASSES];

        let n = x.len() as f64;
        for _ in 0..cfg.epochs {
            let mut grad_w = vec![[0.0; N_FEATURES]; N_CLASSES];
            let mut grad_b = [0.0; N_CLASSES];

            for (row, label) in x.iter().zip(labels) {
                let p = softmax(&logits(row, &coeffs, &intercepts));
                for c in 0..N_CLASSES {
                    let err = p[c] - if *label as usize == c { 1.0 } else { 0.0 };
                    grad_b[c] += err;
                    for (g, v) in grad_w[c].iter_mut().zip(row) {
                        *g += err * v;
                    }
                }
            }

            for c in 0..N_CLASSES {
                intercepts[c] -= cfg.learning_rate * grad_b[c] / n;
                for (w, g) in coeffs[c].iter_mut().zip(&grad_w[c]) {
                    *w -= cfg.learning_rate * (g / n + cfg.l2 * *w);
                }
            }
        }

        Ok(Self {
            feature_means: means.to_vec(),
            feature_stds: stds.to_vec(),
            coeffs,
            intercepts,
        })
    }

    pub fn predict_proba(&self, row: &[f64; N_FEATURES]) -> Prob3 {
        let mut means = [0.0; N_FEATURES];
        let mut stds = [1.0; N_FEATURES];
        for i in 0..N_FEATURES {
            means[i] = self.feature_means.get(i).copied().unwrap_or(0.0);
            stds[i] = self.feature_stds.get(i).copied().unwrap_or(1.0);
        }
        let z = standardize(row, &means, &stds);
        let p = softmax(&logits(&z, &self.coeffs, &self.intercepts));
        Prob3 {
            home: p[0],
            draw: p[1],
            away: p[2],
        }
    }
}

pub fn evaluate(model: &Classifier, rows: &[[f64; N_FEATURES]], labels: &[u8]) -> Metrics {
    if rows.is_empty() || rows.len() != labels.len() {
        return Metrics::default();
    }

    let mut log_loss_sum = 0.0;
    let mut correct = 0usize;
    for (row, label) in rows.iter().zip(labels) {
        let p = model.predict_proba(row);
        log_loss_sum += -p.class(*label).clamp(1e-12, 1.0).ln();
        if p.argmax_label() == *label {
            correct += 1;
        }
    }

    let n = rows.len() as f64;
    Metrics {
        samples: rows.len(),
        log_loss: log_loss_sum / n,
        accuracy: correct as f64 / n,
    }
}

/// Expanding-window splits over chronologically ordered samples: fold k
/// trains on everything before its validation slice, never after it.
pub fn time_series_folds(n: usize, n_splits: usize) -> Vec<(std::ops::Range<usize>, std::ops::Range<usize>)> {
    let n_splits = n_splits.max(1);
    let test_size = (n / (n_splits + 1)).max(1);
    let mut out = Vec::new();
    for k in 0..n_splits {
        let test_end = n.saturating_sub((n_splits - 1 - k) * test_size);
        let test_start = test_end.saturating_sub(test_size);
        if test_start == 0 || test_end <= test_start {
            continue;
        }
        out.push((0..test_start, test_start..test_end));
    }
    out
}

pub fn cross_validate(
    rows: &[[f64; N_FEATURES]],
    labels: &[u8],
    cfg: TrainConfig,
) -> Result<Metrics> {
    let folds = time_series_folds(rows.len(), cfg.cv_folds);
    if folds.is_empty() {
        return Err(anyhow!(
            "not enough samples ({}) for {} cv folds",
            rows.len(),
            cfg.cv_folds
        ));
    }

    let mut log_loss_sum = 0.0;
    let mut accuracy_sum = 0.0;
    let mut samples = 0usize;
    let n_folds = folds.len() as f64;

    for (train, test) in folds {
        let model = Classifier::fit(&rows[train.clone()], &labels[train], cfg)?;
        let metrics = evaluate(&model, &rows[test.clone()], &labels[test]);
        log_loss_sum += metrics.log_loss;
        accuracy_sum += metrics.accuracy;
        samples += metrics.samples;
    }

    Ok(Metrics {
        samples,
        log_loss: log_loss_sum / n_folds,
        accuracy: accuracy_sum / n_folds,
    })
}

/// Cross-validates, then refits on the full history.
pub fn train_final(
    rows: &[[f64; N_FEATURES]],
    labels: &[u8],
    cfg: TrainConfig,
) -> Result<(Classifier, Metrics)> {
    let cv = cross_validate(rows, labels, cfg)?;
    let model = Classifier::fit(rows, labels, cfg)?;
    Ok((model, cv))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub generated_at: String,
    pub feature_names: Vec<String>,
    pub feature_means: Vec<f64>,
    pub feature_stds: Vec<f64>,
    pub coeffs: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
    pub cv_log_loss_mean: f64,
    pub cv_accuracy_mean: f64,
    pub train_samples: usize,
}

impl ModelArtifact {
    pub fn new(model: &Classifier, cv: Metrics, cfg: TrainConfig, train_samples: usize) -> Self {
        Self {
            version: 1,
            generated_at: chrono::Utc::now().to_rfc3339(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            feature_means: model.feature_means.clone(),
            feature_stds: model.feature_stds.clone(),
            coeffs: model.coeffs.clone(),
            intercepts: model.intercepts.clone(),
            learning_rate: cfg.learning_rate,
            epochs: cfg.epochs,
            l2: cfg.l2,
            cv_log_loss_mean: cv.log_loss,
            cv_accuracy_mean: cv.accuracy,
            train_samples,
        }
    }

    pub fn classifier(&self) -> Classifier {
        Classifier {
            feature_means: self.feature_means.clone(),
            feature_stds: self.feature_stds.clone(),
            coeffs: self.coeffs.clone(),
            intercepts: self.intercepts.clone(),
        }
    }
}

pub fn save_artifact(path: &Path, artifact: &ModelArtifact) -> Result<()> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(artifact).context("serialize model artifact")?;
    fs::write(&tmp, json).context("write model artifact")?;
    fs::rename(&tmp, path).context("swap model artifact")?;
    Ok(())
}

pub fn load_artifact(path: &Path) -> Result<ModelArtifact> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read model artifact {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("parse model artifact {}", path.display()))
}

fn column_stats(rows: &[[f64; N_FEATURES]]) -> ([f64; N_FEATURES], [f64; N_FEATURES]) {
    let n = rows.len() as f64;
    let mut means = [0.0; N_FEATURES];
    for row in rows {
        for (m, v) in means.iter_mut().zip(row) {
            *m += v;
        }
    }
    for m in &mut means {
        *m /= n;
    }

    let mut stds = [0.0; N_FEATURES];
    for row in rows {
        for i in 0..N_FEATURES {
            let d = row[i] - means[i];
            stds[i] += d * d;
        }
    }
    for s in &mut stds {
        *s = (*s / n).sqrt().max(1e-6);
    }
    (means, stds)
}

fn standardize(
    row: &[f64; N_FEATURES],
    means: &[f64; N_FEATURES],
    stds: &[f64; N_FEATURES],
) -> [f64; N_FEATURES] {
    let mut out = [0.0; N_FEATURES];
    for i in 0..N_FEATURES {
        out[i] = (row[i] - means[i]) / stds[i].max(1e-6);
    }
    out
}

fn logits(
    row: &[f64; N_FEATURES],
    coeffs: &[Vec<f64>],
    intercepts: &[f64],
) -> [f64; N_CLASSES] {
    let mut out = [0.0; N_CLASSES];
    for c in 0..N_CLASSES {
        let mut z = intercepts.get(c).copied().unwrap_or(0.0);
        if let Some(w) = coeffs.get(c) {
            for (wi, xi) in w.iter().zip(row) {
                z += wi * xi;
            }
        }
        out[c] = z;
    }
    out
}

fn softmax(z: &[f64; N_CLASSES]) -> [f64; N_CLASSES] {
    let mx = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut out = [0.0; N_CLASSES];
    let mut sum = 0.0;
    for c in 0..N_CLASSES {
        out[c] = (z[c] - mx).exp();
        sum += out[c];
    }
    let sum = sum.max(1e-12);
    for v in &mut out {
        *v /= sum;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(n: usize) -> (Vec<[f64; N_FEATURES]>, Vec<u8>) {
        // elo_diff alone decides the outcome; the rest is constant noise.
        let mut rows = Vec::with_capacity(n);
        let mut labels = Vec::with_capacity(n);
        for i in 0..n {
            let mut row = [1.2; N_FEATURES];
            let (diff, label) = match i % 3 {
                0 => (180.0, 0u8),
                1 => (0.0, 1),
                _ => (-180.0, 2),
            };
            row[0] = diff + (i % 7) as f64;
            rows.push(row);
            labels.push(label);
        }
        (rows, labels)
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(&[2.0, -1.0, 0.5]);
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(p.iter().all(|v| *v > 0.0));
    }

    #[test]
    fn uniform_log_loss_is_ln_three() {
        let p = Prob3::uniform();
        let loss = -p.class(1).clamp(1e-12, 1.0).ln();
        assert!((loss - 3.0_f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn learns_a_separable_signal() {
        let (rows, labels) = synthetic(300);
        let model = Classifier::fit(&rows, &labels, TrainConfig::default()).unwrap();
        let metrics = evaluate(&model, &rows, &labels);
        assert!(metrics.accuracy > 0.9, "accuracy {}", metrics.accuracy);
        assert!(metrics.log_loss < 3.0_f64.ln());
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let (rows, labels) = synthetic(90);
        let a = Classifier::fit(&rows, &labels, TrainConfig::default()).unwrap();
        let b = Classifier::fit(&rows, &labels, TrainConfig::default()).unwrap();
        assert_eq!(a.coeffs, b.coeffs);
        assert_eq!(a.intercepts, b.intercepts);
    }

    #[test]
    fn folds_never_train_on_the_future() {
        let folds = time_series_folds(120, 5);
        assert_eq!(folds.len(), 5);
        for (train, test) in &folds {
            assert_eq!(train.start, 0);
            assert_eq!(train.end, test.start);
            assert!(test.end <= 120);
        }
        assert_eq!(folds.last().unwrap().1.end, 120);
    }

    #[test]
    fn cross_validation_reports_fold_means() {
        let (rows, labels) = synthetic(240);
        let metrics = cross_validate(&rows, &labels, TrainConfig::default()).unwrap();
        assert!(metrics.samples > 0);
        assert!(metrics.log_loss > 0.0);
    }

    #[test]
    fn artifact_round_trip_scores_identically() {
        let (rows, labels) = synthetic(120);
        let cfg = TrainConfig::default();
        let (model, cv) = train_final(&rows, &labels, cfg).unwrap();
        let artifact = ModelArtifact::new(&model, cv, cfg, rows.len());

        let json = serde_json::to_string(&artifact).unwrap();
        let back: ModelArtifact = serde_json::from_str(&json).unwrap();
        let reloaded = back.classifier();

        let p1 = model.predict_proba(&rows[0]);
        let p2 = reloaded.predict_proba(&rows[0]);
        assert_eq!(p1.home.to_bits(), p2.home.to_bits());
        assert_eq!(p1.draw.to_bits(), p2.draw.to_bits());
        assert_eq!(p1.away.to_bits(), p2.away.to_bits());
    }
}
