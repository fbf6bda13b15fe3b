use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::features::{FEATURE_NAMES, FeatureRow, label_to_outcome};
use crate::fixtures_fetch::Fixture;
use crate::model::{Classifier, N_FEATURES, Prob3};

/// Rating defaults to the league baseline; goals default to a plausible
/// per-match average so cold-start projections stay in range.
pub const FALLBACK_RATING: f64 = 1500.0;
pub const FALLBACK_GOALS: f64 = 1.2;

/// A team's most recent pre-match state, as seen by the feature table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TeamSnapshot {
    pub rating: f64,
    pub goals_for: f64,
    pub goals_against: f64,
}

/// Latest snapshot per team plus the fallback handed to unseen teams.
#[derive(Debug, Clone)]
pub struct SnapshotTable {
    teams: HashMap<String, TeamSnapshot>,
    fallback: TeamSnapshot,
}

impl SnapshotTable {
    /// Takes each team's most recent home-side snapshot, falling back to its
    /// most recent away-side one for teams without a home appearance. Teams
    /// absent from the history get the cross-team median of each statistic.
    pub fn from_rows(rows: &[FeatureRow]) -> Self {
        let mut home_latest: HashMap<String, TeamSnapshot> = HashMap::new();
        let mut away_latest: HashMap<String, TeamSnapshot> = HashMap::new();
        for row in rows {
            home_latest.insert(
                row.home_team.clone(),
                TeamSnapshot {
                    rating: row.elo_home_pre,
                    goals_for: row.home_gf,
                    goals_against: row.home_ga,
                },
            );
            away_latest.insert(
                row.away_team.clone(),
                TeamSnapshot {
                    rating: row.elo_away_pre,
                    goals_for: row.away_gf,
                    goals_against: row.away_ga,
                },
            );
        }

        let mut teams = home_latest;
        for (team, snap) in away_latest {
            teams.entry(team).or_insert(snap);
        }

        let fallback = median_snapshot(&teams);
        Self { teams, fallback }
    }

    pub fn get(&self, team: &str) -> TeamSnapshot {
        self.teams.get(team).copied().unwrap_or(self.fallback)
    }

    pub fn is_known(&self, team: &str) -> bool {
        self.teams.contains_key(team)
    }

    pub fn fallback(&self) -> TeamSnapshot {
        self.fallback
    }
}

fn median_snapshot(teams: &HashMap<String, TeamSnapshot>) -> TeamSnapshot {
    if teams.is_empty() {
        return TeamSnapshot {
            rating: FALLBACK_RATING,
            goals_for: FALLBACK_GOALS,
            goals_against: FALLBACK_GOALS,
        };
    }
    TeamSnapshot {
        rating: median(teams.values().map(|s| s.rating)),
        goals_for: median(teams.values().map(|s| s.goals_for)),
        goals_against: median(teams.values().map(|s| s.goals_against)),
    }
}

fn median(values: impl Iterator<Item = f64>) -> f64 {
    let mut v: Vec<f64> = values.collect();
    v.sort_by(|a, b| a.total_cmp(b));
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}

/// An upcoming fixture with the same feature columns the model trained on.
#[derive(Debug, Clone)]
pub struct ProjectedFixture {
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    /// In `FEATURE_NAMES` order.
    pub values: [f64; N_FEATURES],
}

/// Builds model-ready rows for upcoming fixtures. Infallible: unseen teams
/// take the median fallback rather than erroring out.
pub fn project_fixtures(fixtures: &[Fixture], snapshots: &SnapshotTable) -> Vec<ProjectedFixture> {
    fixtures
        .iter()
        .map(|fx| {
            let home = snapshots.get(&fx.home_team);
            let away = snapshots.get(&fx.away_team);
            ProjectedFixture {
                date: fx.date.clone(),
                home_team: fx.home_team.clone(),
                away_team: fx.away_team.clone(),
                values: [
                    home.rating - away.rating,
                    home.goals_for - away.goals_for,
                    away.goals_against - home.goals_against,
                    home.rating,
                    away.rating,
                    home.goals_for,
                    home.goals_against,
                    away.goals_for,
                    away.goals_against,
                ],
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct PredictionRow {
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub values: [f64; N_FEATURES],
    pub probs: Prob3,
    pub predicted: char,
}

pub fn score_fixtures(
    fixtures: &[Fixture],
    snapshots: &SnapshotTable,
    model: &Classifier,
) -> Vec<PredictionRow> {
    project_fixtures(fixtures, snapshots)
        .into_iter()
        .map(|fx| {
            let probs = model.predict_proba(&fx.values);
            PredictionRow {
                date: fx.date,
                home_team: fx.home_team,
                away_team: fx.away_team,
                values: fx.values,
                probs,
                predicted: label_to_outcome(probs.argmax_label()),
            }
        })
        .collect()
}

pub fn write_predictions_csv(path: &Path, rows: &[PredictionRow]) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("create predictions file {}", path.display()))?;

    let mut header = vec!["date", "home_team", "away_team"];
    header.extend_from_slice(&FEATURE_NAMES);
    header.extend_from_slice(&["p_home", "p_draw", "p_away", "predicted"]);
    w.write_record(&header).context("write predictions header")?;

    for row in rows {
        let mut rec = vec![row.date.clone(), row.home_team.clone(), row.away_team.clone()];
        rec.extend(row.values.iter().map(|v| format!("{v:.4}")));
        rec.push(format!("{:.4}", row.probs.home));
        rec.push(format!("{:.4}", row.probs.draw));
        rec.push(format!("{:.4}", row.probs.away));
        rec.push(row.predicted.to_string());
        w.write_record(&rec).context("write prediction row")?;
    }
    w.flush().context("flush predictions file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(day: u32, home: &str, away: &str, home_rating: f64, away_rating: f64) -> FeatureRow {
        FeatureRow {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            elo_home_pre: home_rating,
            elo_away_pre: away_rating,
            elo_diff: home_rating - away_rating,
            home_gf: 2.0,
            home_ga: 1.0,
            away_gf: 1.5,
            away_ga: 1.5,
            gf_diff: 0.5,
            ga_diff: 0.5,
            label: Some(0),
        }
    }

    #[test]
    fn home_snapshot_wins_over_away() {
        // A appears away on day 1 and at home on day 2; the home-side
        // snapshot is the one kept even though both exist.
        let rows = vec![row(1, "B", "A", 1510.0, 1490.0), row(2, "A", "C", 1495.0, 1500.0)];
        let table = SnapshotTable::from_rows(&rows);
        assert_eq!(table.get("A").rating, 1495.0);
        assert_eq!(table.get("A").goals_for, 2.0);
    }

    #[test]
    fn away_only_team_still_gets_a_snapshot() {
        let rows = vec![row(1, "B", "A", 1510.0, 1490.0)];
        let table = SnapshotTable::from_rows(&rows);
        assert_eq!(table.get("A").rating, 1490.0);
        assert_eq!(table.get("A").goals_for, 1.5);
    }

    #[test]
    fn unseen_team_takes_the_cross_team_median() {
        let rows = vec![
            row(1, "A", "B", 1400.0, 1500.0),
            row(2, "C", "D", 1600.0, 1700.0),
        ];
        let table = SnapshotTable::from_rows(&rows);
        assert!(!table.is_known("Zenith"));
        // Ratings present: 1400, 1500, 1600, 1700 -> median 1550.
        assert_eq!(table.get("Zenith").rating, 1550.0);
    }

    #[test]
    fn empty_history_falls_back_to_defaults() {
        let table = SnapshotTable::from_rows(&[]);
        let snap = table.get("Anyone");
        assert_eq!(snap.rating, FALLBACK_RATING);
        assert_eq!(snap.goals_for, FALLBACK_GOALS);
        assert_eq!(snap.goals_against, FALLBACK_GOALS);
    }

    #[test]
    fn projection_matches_feature_column_order() {
        let rows = vec![row(1, "A", "B", 1520.0, 1480.0)];
        let table = SnapshotTable::from_rows(&rows);
        let fixtures = vec![Fixture {
            date: "2024-03-09".to_string(),
            home_team: "A".to_string(),
            away_team: "B".to_string(),
        }];
        let projected = project_fixtures(&fixtures, &table);
        assert_eq!(projected.len(), 1);
        let v = projected[0].values;
        assert_eq!(v.len(), FEATURE_NAMES.len());
        assert_eq!(v[0], v[3] - v[4]); // elo_diff
        assert_eq!(v[1], v[5] - v[7]); // gf_diff
        assert_eq!(v[2], v[8] - v[6]); // ga_diff
    }
}
