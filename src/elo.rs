use std::collections::HashMap;

use crate::dataset::PlayedMatch;

pub const BASE_RATING: f64 = 1500.0;

#[derive(Debug, Clone, Copy)]
pub struct EloConfig {
    pub k_factor: f64,
    pub home_advantage: f64,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            k_factor: 20.0,
            home_advantage: 60.0,
        }
    }
}

/// Ratings of both sides as they stood before the match was applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreMatchRatings {
    pub home: f64,
    pub away: f64,
}

#[derive(Debug, Clone)]
pub struct RatingReplay {
    /// One entry per input match, aligned by index.
    pub pre_match: Vec<PreMatchRatings>,
    /// Result tokens that were present but not H/D/A (case-insensitive).
    /// Those matches kept their pre-match snapshot but updated no ratings.
    pub unknown_results: usize,
}

/// Folds the rating state over the given matches. The slice must already be
/// in ascending date order with date ties keeping table order; the replay is
/// then fully deterministic for a given input and config.
pub fn replay_ratings(matches: &[PlayedMatch], cfg: EloConfig) -> RatingReplay {
    let mut ratings: HashMap<&str, f64> = HashMap::new();
    let mut pre_match = Vec::with_capacity(matches.len());
    let mut unknown_results = 0usize;

    for m in matches {
        let ra = ratings
            .get(m.home_team.as_str())
            .copied()
            .unwrap_or(BASE_RATING);
        let rb = ratings
            .get(m.away_team.as_str())
            .copied()
            .unwrap_or(BASE_RATING);
        // Snapshot before the outcome is folded in; this is the feature value.
        pre_match.push(PreMatchRatings { home: ra, away: rb });

        let scores = match m.result.as_deref() {
            Some(token) => {
                let parsed = result_scores(token);
                if parsed.is_none() {
                    unknown_results += 1;
                }
                parsed
            }
            None => None,
        };
        let Some((score_home, score_away)) = scores else {
            continue;
        };

        let e_home = expected_home_score(ra, rb, cfg.home_advantage);
        let e_away = 1.0 - e_home;
        ratings.insert(&m.home_team, ra + cfg.k_factor * (score_home - e_home));
        ratings.insert(&m.away_team, rb + cfg.k_factor * (score_away - e_away));
    }

    RatingReplay {
        pre_match,
        unknown_results,
    }
}

/// Expected score for the home side; the advantage bonus applies only here,
/// never to the stored rating.
pub fn expected_home_score(ra: f64, rb: f64, home_advantage: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((rb - (ra + home_advantage)) / 400.0))
}

fn result_scores(token: &str) -> Option<(f64, f64)> {
    match token.trim().to_ascii_uppercase().as_str() {
        "H" => Some((1.0, 0.0)),
        "A" => Some((0.0, 1.0)),
        "D" => Some((0.5, 0.5)),
        _ => None,
    }
}
