use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use matchcast::config::PipelineConfig;
use matchcast::dataset::{open_db, upsert_matches};
use matchcast::season_fetch::download_seasons;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cfg = PipelineConfig::from_env();

    let league = parse_value_arg("--league").unwrap_or(cfg.league);
    let seasons = parse_seasons_arg().unwrap_or(cfg.seasons);
    if seasons.is_empty() {
        return Err(anyhow!("no seasons resolved for ingest"));
    }
    let db_path = parse_path_arg("--db").unwrap_or(cfg.db_path);

    println!("Ingesting {league}, seasons {seasons:?}");
    let batches = download_seasons(&league, &seasons)?;

    let mut conn = open_db(&db_path)?;

    let mut total = 0usize;
    for batch in &batches {
        let upserted = upsert_matches(&mut conn, &batch.matches)
            .with_context(|| format!("store season {}", batch.season))?;
        total += upserted;
        println!(
            "season {}: kept {}/{} rows, upserted {}",
            batch.season, batch.summary.rows_kept, batch.summary.rows_seen, upserted
        );
        if batch.summary.rows_dropped > 0 {
            eprintln!(
                "[WARN] season {}: dropped {} rows missing date or team names",
                batch.season, batch.summary.rows_dropped
            );
        }
    }

    println!("Ingest complete");
    println!("DB: {}", db_path.display());
    println!("Matches upserted: {total}");
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

fn parse_seasons_arg() -> Option<Vec<u16>> {
    let raw = parse_value_arg("--seasons")?;
    let seasons = raw
        .split([',', ';', ' '])
        .filter_map(|part| part.trim().parse::<u16>().ok())
        .collect::<Vec<_>>();
    if seasons.is_empty() { None } else { Some(seasons) }
}
