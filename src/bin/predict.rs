use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use matchcast::config::{PipelineConfig, default_model_path};
use matchcast::dataset::{load_played_matches, open_db};
use matchcast::features::build_features;
use matchcast::fixtures_fetch::{fetch_fixtures, load_fixtures_csv};
use matchcast::model::load_artifact;
use matchcast::predict::{SnapshotTable, score_fixtures, write_predictions_csv};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = PipelineConfig::from_env();

    let db_path = parse_path_arg("--db").unwrap_or(cfg.db_path);
    let model_path = parse_path_arg("--model").unwrap_or_else(default_model_path);

    let artifact = load_artifact(&model_path)?;
    let model = artifact.classifier();
    println!(
        "Model: {} (trained on {} samples, cv log loss {:.4})",
        model_path.display(),
        artifact.train_samples,
        artifact.cv_log_loss_mean
    );

    let fixtures = if let Some(path) = parse_path_arg("--fixtures") {
        load_fixtures_csv(&path)?
    } else {
        let competition = parse_value_arg("--competition").unwrap_or_else(|| "PL".to_string());
        let season = parse_value_arg("--season").and_then(|v| v.parse::<u16>().ok());
        let matchday = parse_value_arg("--matchday").and_then(|v| v.parse::<u8>().ok());
        fetch_fixtures(&competition, season, matchday)?
    };
    if fixtures.is_empty() {
        return Err(anyhow!("no fixtures to score"));
    }

    let conn = open_db(&db_path)?;
    let matches = load_played_matches(&conn)
        .with_context(|| format!("load matches from {}", db_path.display()))?;
    let table = build_features(&matches, cfg.elo, cfg.form)?;
    let snapshots = SnapshotTable::from_rows(&table.rows);

    for fx in &fixtures {
        for team in [&fx.home_team, &fx.away_team] {
            if !snapshots.is_known(team) {
                eprintln!("[WARN] no history for {team}; using league-median form and rating");
            }
        }
    }

    let predictions = score_fixtures(&fixtures, &snapshots, &model);
    for p in &predictions {
        println!(
            "{} {} vs {}: H {:.1}% D {:.1}% A {:.1}% -> {}",
            p.date,
            p.home_team,
            p.away_team,
            p.probs.home * 100.0,
            p.probs.draw * 100.0,
            p.probs.away * 100.0,
            p.predicted
        );
    }

    if let Some(out) = parse_path_arg("--out") {
        write_predictions_csv(&out, &predictions)?;
        println!("Predictions: {}", out.display());
    }
    Ok(())
}

fn parse_value_arg(flag: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_path_arg(flag: &str) -> Option<PathBuf> {
    parse_value_arg(flag).map(PathBuf::from)
}
