use std::path::PathBuf;

use crate::elo::EloConfig;
use crate::form::FormConfig;
use crate::model::TrainConfig;

const APP_DIR: &str = "matchcast";
const DEFAULT_LEAGUE: &str = "E0";

/// Everything the pipeline binaries read from the environment, with working
/// defaults so a bare invocation still does something sensible.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// football-data.co.uk division code, e.g. E0 for the Premier League.
    pub league: String,
    /// Season start years to ingest.
    pub seasons: Vec<u16>,
    pub elo: EloConfig,
    pub form: FormConfig,
    pub train: TrainConfig,
    pub db_path: PathBuf,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let elo = EloConfig {
            k_factor: parse_env("MATCHCAST_K_FACTOR", EloConfig::default().k_factor),
            home_advantage: parse_env(
                "MATCHCAST_HOME_ADVANTAGE",
                EloConfig::default().home_advantage,
            ),
        };
        let form = FormConfig {
            window: parse_env("MATCHCAST_ROLLING_WINDOW", FormConfig::default().window).max(1),
        };
        let train = TrainConfig {
            cv_folds: parse_env("MATCHCAST_CV_FOLDS", TrainConfig::default().cv_folds).clamp(2, 20),
            random_state: parse_env("MATCHCAST_RANDOM_STATE", TrainConfig::default().random_state),
            ..TrainConfig::default()
        };

        Self {
            league: opt_env("MATCHCAST_LEAGUE").unwrap_or_else(|| DEFAULT_LEAGUE.to_string()),
            seasons: parse_seasons(opt_env("MATCHCAST_SEASONS").as_deref()),
            elo,
            form,
            train,
            db_path: opt_env("MATCHCAST_DB")
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path),
        }
    }
}

fn opt_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .and_then(|val| if val.trim().is_empty() { None } else { Some(val) })
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    opt_env(key)
        .and_then(|val| val.trim().parse::<T>().ok())
        .unwrap_or(default)
}

/// "2021,2022,2023" -> start years; bad entries are dropped, an empty or
/// missing value falls back to the last five completed seasons.
fn parse_seasons(raw: Option<&str>) -> Vec<u16> {
    let mut seasons: Vec<u16> = raw
        .unwrap_or_default()
        .split(',')
        .filter_map(|part| part.trim().parse::<u16>().ok())
        .collect();
    if seasons.is_empty() {
        seasons = (2020..=2024).collect();
    }
    seasons.dedup();
    seasons
}

pub fn app_cache_dir() -> PathBuf {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return PathBuf::from(base).join(APP_DIR);
        }
    }
    match std::env::var("HOME") {
        Ok(home) if !home.trim().is_empty() => PathBuf::from(home).join(".cache").join(APP_DIR),
        _ => PathBuf::from(".").join(APP_DIR),
    }
}

pub fn default_db_path() -> PathBuf {
    app_cache_dir().join("matches.sqlite")
}

pub fn default_model_path() -> PathBuf {
    app_cache_dir().join("model.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_list_parses_and_skips_junk() {
        assert_eq!(parse_seasons(Some("2022, 2023,x,2024")), vec![2022, 2023, 2024]);
    }

    #[test]
    fn empty_season_list_gets_a_default_range() {
        let seasons = parse_seasons(None);
        assert!(!seasons.is_empty());
        assert!(seasons.windows(2).all(|w| w[0] < w[1]));
    }
}
