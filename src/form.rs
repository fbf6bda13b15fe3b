use std::collections::HashMap;
use std::collections::VecDeque;

use crate::dataset::PlayedMatch;

#[derive(Debug, Clone, Copy)]
pub struct FormConfig {
    /// Number of most-recent appearances averaged per role.
    pub window: usize,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self { window: 5 }
    }
}

/// Mean goals scored/conceded over a team's trailing window in one role.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormAverages {
    pub goals_for: f64,
    pub goals_against: f64,
}

/// Form of both sides as of one match. The window is inclusive: the match's
/// own goals are part of its own average.
#[derive(Debug, Clone, Copy)]
pub struct MatchForm {
    pub home: FormAverages,
    pub away: FormAverages,
}

/// Trailing goals-for/against windows, one per team and role. Home and away
/// appearances roll independently, so a side's home form only moves when it
/// plays at home.
#[derive(Debug, Default)]
pub struct FormTracker {
    window: usize,
    home: HashMap<String, RoleWindow>,
    away: HashMap<String, RoleWindow>,
}

#[derive(Debug, Default)]
struct RoleWindow {
    entries: VecDeque<(f64, f64)>,
}

impl RoleWindow {
    fn push_and_average(&mut self, window: usize, gf: f64, ga: f64) -> FormAverages {
        self.entries.push_back((gf, ga));
        while self.entries.len() > window {
            self.entries.pop_front();
        }
        let n = self.entries.len() as f64;
        let (sum_gf, sum_ga) = self
            .entries
            .iter()
            .fold((0.0, 0.0), |(f, a), (gf, ga)| (f + gf, a + ga));
        FormAverages {
            goals_for: sum_gf / n,
            goals_against: sum_ga / n,
        }
    }
}

impl FormTracker {
    pub fn new(cfg: FormConfig) -> Self {
        Self {
            window: cfg.window.max(1),
            home: HashMap::new(),
            away: HashMap::new(),
        }
    }

    /// Records a home appearance and returns the updated window average.
    pub fn record_home(&mut self, team: &str, goals_for: f64, goals_against: f64) -> FormAverages {
        let window = self.window;
        self.home
            .entry(team.to_string())
            .or_default()
            .push_and_average(window, goals_for, goals_against)
    }

    /// Records an away appearance and returns the updated window average.
    pub fn record_away(&mut self, team: &str, goals_for: f64, goals_against: f64) -> FormAverages {
        let window = self.window;
        self.away
            .entry(team.to_string())
            .or_default()
            .push_and_average(window, goals_for, goals_against)
    }
}

/// Folds form state over the matches, one `MatchForm` per input row, aligned
/// by index. Same ordering requirement as the rating replay.
pub fn replay_form(matches: &[PlayedMatch], cfg: FormConfig) -> Vec<MatchForm> {
    let mut tracker = FormTracker::new(cfg);
    matches
        .iter()
        .map(|m| {
            let hg = m.home_goals as f64;
            let ag = m.away_goals as f64;
            MatchForm {
                home: tracker.record_home(&m.home_team, hg, ag),
                away: tracker.record_away(&m.away_team, ag, hg),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn played(day: u32, home: &str, away: &str, hg: i64, ag: i64) -> PlayedMatch {
        PlayedMatch {
            date: NaiveDate::from_ymd_opt(2024, 2, day).unwrap(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals: hg,
            away_goals: ag,
            result: None,
        }
    }

    #[test]
    fn first_appearance_equals_own_goals() {
        let forms = replay_form(&[played(1, "A", "B", 3, 1)], FormConfig::default());
        assert_eq!(forms[0].home.goals_for, 3.0);
        assert_eq!(forms[0].home.goals_against, 1.0);
        assert_eq!(forms[0].away.goals_for, 1.0);
        assert_eq!(forms[0].away.goals_against, 3.0);
    }

    #[test]
    fn window_of_one_always_equals_current_goals() {
        let matches = vec![
            played(1, "A", "B", 2, 0),
            played(2, "A", "B", 0, 5),
            played(3, "A", "B", 1, 1),
        ];
        let forms = replay_form(&matches, FormConfig { window: 1 });
        assert_eq!(forms[1].home.goals_for, 0.0);
        assert_eq!(forms[1].home.goals_against, 5.0);
        assert_eq!(forms[2].home.goals_for, 1.0);
        assert_eq!(forms[2].away.goals_for, 1.0);
    }

    #[test]
    fn short_history_averages_over_what_exists() {
        // Third home appearance with window 5 averages exactly three entries.
        let matches = vec![
            played(1, "A", "B", 1, 0),
            played(2, "A", "C", 2, 0),
            played(3, "A", "D", 6, 3),
        ];
        let forms = replay_form(&matches, FormConfig { window: 5 });
        assert_eq!(forms[2].home.goals_for, 3.0);
        assert_eq!(forms[2].home.goals_against, 1.0);
    }

    #[test]
    fn window_evicts_oldest_entry() {
        let mut matches: Vec<PlayedMatch> = (0..5).map(|i| played(1 + i, "A", "B", 0, 0)).collect();
        matches.push(played(10, "A", "B", 10, 0));
        let forms = replay_form(&matches, FormConfig { window: 2 });
        // Last two home entries are 0 and 10 goals for.
        assert_eq!(forms[5].home.goals_for, 5.0);
    }

    #[test]
    fn home_and_away_roles_roll_independently() {
        let matches = vec![
            played(1, "A", "B", 4, 0), // A at home
            played(2, "B", "A", 0, 1), // A away
            played(3, "A", "C", 2, 2), // A at home again
        ];
        let forms = replay_form(&matches, FormConfig { window: 5 });
        // A's home window holds the two home appearances only.
        assert_eq!(forms[2].home.goals_for, 3.0);
        // B's home window ignores B's away loss on day 1.
        assert_eq!(forms[1].home.goals_for, 0.0);
        assert_eq!(forms[1].home.goals_against, 1.0);
    }
}
