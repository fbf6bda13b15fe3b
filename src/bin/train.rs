use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use matchcast::config::{PipelineConfig, default_model_path};
use matchcast::dataset::{load_played_matches, open_db};
use matchcast::features::build_features;
use matchcast::model::{ModelArtifact, save_artifact, train_final};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = PipelineConfig::from_env();

    let db_path = parse_path_arg("--db").unwrap_or(cfg.db_path);
    let out_path = parse_path_arg("--out").unwrap_or_else(default_model_path);

    let conn = open_db(&db_path)?;
    let matches = load_played_matches(&conn)
        .with_context(|| format!("load matches from {}", db_path.display()))?;
    if matches.is_empty() {
        return Err(anyhow!(
            "no finished matches in {}; run ingest first",
            db_path.display()
        ));
    }
    println!("Loaded {} finished matches", matches.len());

    let table = build_features(&matches, cfg.elo, cfg.form)?;
    if table.unknown_results > 0 {
        eprintln!(
            "[WARN] {} matches had unrecognized result tokens and did not move ratings",
            table.unknown_results
        );
    }

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for row in table.labeled() {
        let Some(label) = row.label else { continue };
        rows.push(row.values());
        labels.push(label);
    }
    if rows.len() < table.rows.len() {
        eprintln!(
            "[WARN] {} rows lacked a usable result label and were left out of training",
            table.rows.len() - rows.len()
        );
    }

    let (model, cv) = train_final(&rows, &labels, cfg.train)?;
    let artifact = ModelArtifact::new(&model, cv, cfg.train, rows.len());
    save_artifact(&out_path, &artifact)?;

    println!("Training complete");
    println!("Samples: {}", rows.len());
    println!(
        "CV ({} folds): log loss {:.4}, accuracy {:.3}",
        cfg.train.cv_folds, cv.log_loss, cv.accuracy
    );
    println!("Model: {}", out_path.display());
    Ok(())
}

fn parse_path_arg(flag: &str) -> Option<PathBuf> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(PathBuf::from(trimmed));
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(PathBuf::from(next.trim()));
        }
    }
    None
}
