use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{Connection, params};

use crate::team_names::clean_team_name;

/// One normalized row of a raw season table, as persisted in the match store.
/// Goals and result can be absent (abandoned or not-yet-graded rows survive
/// normalization as long as date and both team names parse).
#[derive(Debug, Clone)]
pub struct StoredMatch {
    pub season: String,
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: Option<i64>,
    pub away_goals: Option<i64>,
    pub result: Option<String>,
    pub home_shots: Option<i64>,
    pub away_shots: Option<i64>,
    pub home_shots_on: Option<i64>,
    pub away_shots_on: Option<i64>,
    pub odds_home_avg: Option<f64>,
    pub odds_draw_avg: Option<f64>,
    pub odds_away_avg: Option<f64>,
}

/// A completed match as consumed by the rating and form pipeline. Produced
/// only for stored rows whose final score is present.
#[derive(Debug, Clone)]
pub struct PlayedMatch {
    pub date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: i64,
    pub away_goals: i64,
    pub result: Option<String>,
}

impl StoredMatch {
    pub fn as_played(&self) -> Option<PlayedMatch> {
        let (Some(home_goals), Some(away_goals)) = (self.home_goals, self.away_goals) else {
            return None;
        };
        Some(PlayedMatch {
            date: self.date,
            home_team: self.home_team.clone(),
            away_team: self.away_team.clone(),
            home_goals,
            away_goals,
            result: self.result.clone(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct NormalizeSummary {
    pub rows_seen: usize,
    pub rows_kept: usize,
    pub rows_dropped: usize,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            season TEXT NOT NULL,
            date TEXT NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            result TEXT NULL,
            home_shots INTEGER NULL,
            away_shots INTEGER NULL,
            home_shots_on INTEGER NULL,
            away_shots_on INTEGER NULL,
            odds_home_avg REAL NULL,
            odds_draw_avg REAL NULL,
            odds_away_avg REAL NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (date, home_team, away_team)
        );
        CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season);
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

pub fn upsert_matches(conn: &mut Connection, rows: &[StoredMatch]) -> Result<usize> {
    let tx = conn.transaction().context("begin ingest transaction")?;
    let mut upserted = 0usize;
    for row in rows {
        tx.execute(
            r#"
            INSERT INTO matches (
                season, date, home_team, away_team,
                home_goals, away_goals, result,
                home_shots, away_shots, home_shots_on, away_shots_on,
                odds_home_avg, odds_draw_avg, odds_away_avg, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            ON CONFLICT(date, home_team, away_team) DO UPDATE SET
                season = excluded.season,
                home_goals = excluded.home_goals,
                away_goals = excluded.away_goals,
                result = excluded.result,
                home_shots = excluded.home_shots,
                away_shots = excluded.away_shots,
                home_shots_on = excluded.home_shots_on,
                away_shots_on = excluded.away_shots_on,
                odds_home_avg = excluded.odds_home_avg,
                odds_draw_avg = excluded.odds_draw_avg,
                odds_away_avg = excluded.odds_away_avg,
                updated_at = excluded.updated_at
            "#,
            params![
                row.season,
                row.date.to_string(),
                row.home_team,
                row.away_team,
                row.home_goals,
                row.away_goals,
                row.result,
                row.home_shots,
                row.away_shots,
                row.home_shots_on,
                row.away_shots_on,
                row.odds_home_avg,
                row.odds_draw_avg,
                row.odds_away_avg,
                chrono::Utc::now().to_rfc3339(),
            ],
        )
        .context("upsert match")?;
        upserted += 1;
    }
    tx.commit().context("commit ingest transaction")?;
    Ok(upserted)
}

/// Loads every match with a final score, oldest first. Rowid breaks date ties
/// so a replay over the result is stable across runs.
pub fn load_played_matches(conn: &Connection) -> Result<Vec<PlayedMatch>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT date, home_team, away_team, home_goals, away_goals, result
            FROM matches
            WHERE home_goals IS NOT NULL
              AND away_goals IS NOT NULL
            ORDER BY date ASC, rowid ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        let (date, home_team, away_team, home_goals, away_goals, result) =
            row.context("decode match row")?;
        let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
            .with_context(|| format!("invalid stored date {date}"))?;
        out.push(PlayedMatch {
            date,
            home_team,
            away_team,
            home_goals,
            away_goals,
            result,
        });
    }
    Ok(out)
}

/// Maps a raw football-data.co.uk season file onto the match schema. Rows
/// missing a parseable date or either team name are dropped here and never
/// reach the feature pipeline.
pub fn normalize_csv(raw: &str, season: &str) -> Result<(Vec<StoredMatch>, NormalizeSummary)> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(raw.as_bytes());
    let headers = reader.headers().context("read csv headers")?.clone();
    let col = |name: &str| headers.iter().position(|h| h.trim() == name);

    let idx_date = col("Date");
    let idx_home = col("HomeTeam");
    let idx_away = col("AwayTeam");
    let idx_fthg = col("FTHG");
    let idx_ftag = col("FTAG");
    let idx_ftr = col("FTR");
    let idx_hs = col("HS");
    let idx_as = col("AS");
    let idx_hst = col("HST");
    let idx_ast = col("AST");
    let idx_avgh = col("AvgH");
    let idx_avgd = col("AvgD");
    let idx_avga = col("AvgA");

    let mut out = Vec::new();
    let mut summary = NormalizeSummary::default();

    for record in reader.records() {
        let Ok(record) = record else {
            summary.rows_seen += 1;
            summary.rows_dropped += 1;
            continue;
        };
        summary.rows_seen += 1;

        let field = |idx: Option<usize>| {
            idx.and_then(|i| record.get(i))
                .map(str::trim)
                .filter(|s| !s.is_empty())
        };

        let date = field(idx_date).and_then(parse_day_first_date);
        let home_team = field(idx_home).map(clean_team_name);
        let away_team = field(idx_away).map(clean_team_name);

        let (Some(date), Some(home_team), Some(away_team)) = (date, home_team, away_team) else {
            summary.rows_dropped += 1;
            continue;
        };

        out.push(StoredMatch {
            season: season.to_string(),
            date,
            home_team,
            away_team,
            home_goals: field(idx_fthg).and_then(parse_int),
            away_goals: field(idx_ftag).and_then(parse_int),
            result: field(idx_ftr).map(str::to_string),
            home_shots: field(idx_hs).and_then(parse_int),
            away_shots: field(idx_as).and_then(parse_int),
            home_shots_on: field(idx_hst).and_then(parse_int),
            away_shots_on: field(idx_ast).and_then(parse_int),
            odds_home_avg: field(idx_avgh).and_then(parse_float),
            odds_draw_avg: field(idx_avgd).and_then(parse_float),
            odds_away_avg: field(idx_avga).and_then(parse_float),
        });
        summary.rows_kept += 1;
    }

    Ok((out, summary))
}

/// Result tables write dates day-first, with either a two or four digit year.
fn parse_day_first_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%y"))
        .ok()
}

fn parse_int(raw: &str) -> Option<i64> {
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|v| v as i64))
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Div,Date,HomeTeam,AwayTeam,FTHG,FTAG,FTR,HS,AS,HST,AST,AvgH,AvgD,AvgA
E0,12/08/2023,Arsenal,Nott'm Forest,2,1,H,15,6,9,2,1.25,6.5,11.0
E0,13/08/2023,Brentford,Spurs,2,2,D,12,14,4,7,2.9,3.4,2.4
E0,bad-date,Chelsea,Liverpool,1,1,D,,,,,,,
E0,14/08/2023,,Everton,0,1,A,,,,,,,
E0,15/08/2023,Burnley,Man City,,,,,,,,,,
";

    #[test]
    fn normalize_keeps_parseable_rows_and_drops_broken_ones() {
        let (rows, summary) = normalize_csv(SAMPLE, "2324").unwrap();
        assert_eq!(summary.rows_seen, 5);
        assert_eq!(summary.rows_dropped, 2);
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0].home_team, "Arsenal");
        assert_eq!(rows[0].away_team, "Nottingham Forest");
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2023, 8, 12).unwrap());
        assert_eq!(rows[0].home_goals, Some(2));
        assert_eq!(rows[0].odds_home_avg, Some(1.25));

        assert_eq!(rows[1].away_team, "Tottenham Hotspur");
    }

    #[test]
    fn scoreless_row_is_stored_but_not_played() {
        let (rows, _) = normalize_csv(SAMPLE, "2324").unwrap();
        let burnley = rows.iter().find(|r| r.home_team == "Burnley").unwrap();
        assert!(burnley.home_goals.is_none());
        assert!(burnley.as_played().is_none());
        assert!(rows[0].as_played().is_some());
    }

    #[test]
    fn two_digit_years_parse_day_first() {
        assert_eq!(
            parse_day_first_date("05/03/21"),
            NaiveDate::from_ymd_opt(2021, 3, 5)
        );
        assert_eq!(
            parse_day_first_date("05/03/2021"),
            NaiveDate::from_ymd_opt(2021, 3, 5)
        );
        assert_eq!(parse_day_first_date("2021-03-05"), None);
    }

    #[test]
    fn store_round_trip_preserves_replay_order() {
        let mut conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let (rows, _) = normalize_csv(SAMPLE, "2324").unwrap();
        let n = upsert_matches(&mut conn, &rows).unwrap();
        assert_eq!(n, 3);

        // Second upsert of the same rows must not duplicate.
        upsert_matches(&mut conn, &rows).unwrap();

        let played = load_played_matches(&conn).unwrap();
        assert_eq!(played.len(), 2);
        assert!(played[0].date <= played[1].date);
        assert_eq!(played[0].home_team, "Arsenal");
    }
}
