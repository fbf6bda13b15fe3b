use std::collections::HashSet;
use std::fmt;

use anyhow::Result;
use chrono::NaiveDate;

use crate::dataset::PlayedMatch;
use crate::elo::{EloConfig, replay_ratings};
use crate::form::{FormConfig, replay_form};

/// Column order fed to the classifier; projection rows must match it exactly.
pub const FEATURE_NAMES: [&str; 9] = [
    "elo_diff",
    "gf_diff",
    "ga_diff",
    "elo_home_pre",
    "elo_away_pre",
    "home_gf",
    "home_ga",
    "away_gf",
    "away_ga",
];

/// One historical match joined with both sides' pre-match rating and form.
#[derive(Debug, Clone)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub elo_home_pre: f64,
    pub elo_away_pre: f64,
    pub elo_diff: f64,
    pub home_gf: f64,
    pub home_ga: f64,
    pub away_gf: f64,
    pub away_ga: f64,
    pub gf_diff: f64,
    pub ga_diff: f64,
    /// 0=H, 1=D, 2=A; absent when the result token does not map.
    pub label: Option<u8>,
}

impl FeatureRow {
    /// Values in `FEATURE_NAMES` order.
    pub fn values(&self) -> [f64; 9] {
        [
            self.elo_diff,
            self.gf_diff,
            self.ga_diff,
            self.elo_home_pre,
            self.elo_away_pre,
            self.home_gf,
            self.home_ga,
            self.away_gf,
            self.away_ga,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Rows in replay (chronological) order.
    pub rows: Vec<FeatureRow>,
    /// Matches whose result token did not map to H/D/A.
    pub unknown_results: usize,
}

impl FeatureTable {
    /// Rows usable for supervised training.
    pub fn labeled(&self) -> impl Iterator<Item = &FeatureRow> {
        self.rows.iter().filter(|r| r.label.is_some())
    }
}

/// A duplicate (date, home, away) key would make the rating/form join
/// ambiguous and silently corrupt training, so assembly refuses to continue.
#[derive(Debug, Clone)]
pub struct DataIntegrityError {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
}

impl fmt::Display for DataIntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duplicate match key {} {} vs {}",
            self.date, self.home_team, self.away_team
        )
    }
}

impl std::error::Error for DataIntegrityError {}

pub fn outcome_to_label(result: &str) -> Option<u8> {
    match result.trim().to_ascii_uppercase().as_str() {
        "H" => Some(0),
        "D" => Some(1),
        "A" => Some(2),
        _ => None,
    }
}

pub fn label_to_outcome(label: u8) -> char {
    match label {
        0 => 'H',
        1 => 'D',
        2 => 'A',
        _ => '?',
    }
}

/// Builds the training feature table: a stable date sort, one rating replay,
/// one form replay, then the per-match join and differentials.
pub fn build_features(
    matches: &[PlayedMatch],
    elo_cfg: EloConfig,
    form_cfg: FormConfig,
) -> Result<FeatureTable> {
    let mut ordered: Vec<&PlayedMatch> = matches.iter().collect();
    // Stable, so date ties keep the original table order.
    ordered.sort_by_key(|m| m.date);

    let mut seen: HashSet<(NaiveDate, &str, &str)> = HashSet::with_capacity(ordered.len());
    for m in &ordered {
        if !seen.insert((m.date, m.home_team.as_str(), m.away_team.as_str())) {
            return Err(DataIntegrityError {
                date: m.date,
                home_team: m.home_team.clone(),
                away_team: m.away_team.clone(),
            }
            .into());
        }
    }

    let ordered_owned: Vec<PlayedMatch> = ordered.iter().map(|m| (*m).clone()).collect();
    let ratings = replay_ratings(&ordered_owned, elo_cfg);
    let forms = replay_form(&ordered_owned, form_cfg);

    let rows = ordered_owned
        .iter()
        .zip(ratings.pre_match.iter())
        .zip(forms.iter())
        .map(|((m, pre), form)| FeatureRow {
            date: m.date,
            home_team: m.home_team.clone(),
            away_team: m.away_team.clone(),
            elo_home_pre: pre.home,
            elo_away_pre: pre.away,
            elo_diff: pre.home - pre.away,
            home_gf: form.home.goals_for,
            home_ga: form.home.goals_against,
            away_gf: form.away.goals_for,
            away_ga: form.away.goals_against,
            gf_diff: form.home.goals_for - form.away.goals_for,
            // Sign flipped on purpose: positive favors the home side for both
            // differential features.
            ga_diff: form.away.goals_against - form.home.goals_against,
            label: m.result.as_deref().and_then(outcome_to_label),
        })
        .collect();

    Ok(FeatureTable {
        rows,
        unknown_results: ratings.unknown_results,
    })
}
