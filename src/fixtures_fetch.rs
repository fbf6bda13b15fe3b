use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::http_client::http_client;
use crate::team_names::clean_team_name;

const API_BASE: &str = "https://api.football-data.org/v4";
pub const API_TOKEN_VAR: &str = "FOOTBALL_DATA_API_TOKEN";

/// An upcoming match to score. The date stays a display string; projection
/// never orders by it.
#[derive(Debug, Clone)]
pub struct Fixture {
    pub date: String,
    pub home_team: String,
    pub away_team: String,
}

/// Pulls scheduled fixtures for a competition from football-data.org.
/// `season` is the starting year (e.g. 2025); `matchday` narrows further.
pub fn fetch_fixtures(
    competition: &str,
    season: Option<u16>,
    matchday: Option<u8>,
) -> Result<Vec<Fixture>> {
    let token = std::env::var(API_TOKEN_VAR)
        .map_err(|_| anyhow!("{API_TOKEN_VAR} is not set; get a free key at football-data.org"))?;
    let client = http_client()?;

    let mut url = format!("{API_BASE}/competitions/{competition}/matches?status=SCHEDULED,TIMED");
    if let Some(season) = season {
        url.push_str(&format!("&season={season}"));
    }
    if let Some(matchday) = matchday {
        url.push_str(&format!("&matchday={matchday}"));
    }

    let response = client
        .get(&url)
        .header("X-Auth-Token", token.trim())
        .send()
        .with_context(|| format!("request fixtures for {competition}"))?;
    let status = response.status();
    let body = response.text().context("read fixtures response")?;
    if !status.is_success() {
        return Err(anyhow!("fixtures request failed with {status}: {}", body.trim()));
    }

    parse_fixtures_json(&body)
}

#[derive(Debug, Deserialize)]
struct MatchesResponse {
    #[serde(default)]
    matches: Vec<ApiMatch>,
}

#[derive(Debug, Deserialize)]
struct ApiMatch {
    #[serde(rename = "utcDate", default)]
    utc_date: String,
    #[serde(default)]
    status: String,
    #[serde(rename = "homeTeam")]
    home_team: ApiTeam,
    #[serde(rename = "awayTeam")]
    away_team: ApiTeam,
}

#[derive(Debug, Deserialize)]
struct ApiTeam {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "shortName", default)]
    short_name: Option<String>,
}

impl ApiTeam {
    fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .or(self.short_name.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

pub fn parse_fixtures_json(raw: &str) -> Result<Vec<Fixture>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    let data: MatchesResponse = serde_json::from_str(trimmed).context("invalid fixtures json")?;

    let mut fixtures = Vec::new();
    for m in data.matches {
        if !matches!(m.status.as_str(), "SCHEDULED" | "TIMED") {
            continue;
        }
        let (Some(home), Some(away)) = (m.home_team.display_name(), m.away_team.display_name())
        else {
            continue;
        };
        fixtures.push(Fixture {
            date: m.utc_date.chars().take(10).collect(),
            home_team: clean_team_name(home),
            away_team: clean_team_name(away),
        });
    }
    Ok(fixtures)
}

/// Reads fixtures from a local csv with date,home_team,away_team columns.
/// An offline alternative to the API for ad-hoc what-if runs.
pub fn load_fixtures_csv(path: &Path) -> Result<Vec<Fixture>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("open fixtures file {}", path.display()))?;

    let headers = reader.headers().context("read fixtures header")?.clone();
    let col = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));
    let (Some(date_col), Some(home_col), Some(away_col)) =
        (col("date"), col("home_team"), col("away_team"))
    else {
        return Err(anyhow!(
            "fixtures file {} needs date,home_team,away_team columns",
            path.display()
        ));
    };

    let mut fixtures = Vec::new();
    for record in reader.records() {
        let record = record.context("read fixtures row")?;
        let field = |i: usize| record.get(i).map(str::trim).filter(|s| !s.is_empty());
        let (Some(date), Some(home), Some(away)) =
            (field(date_col), field(home_col), field(away_col))
        else {
            continue;
        };
        fixtures.push(Fixture {
            date: date.to_string(),
            home_team: clean_team_name(home),
            away_team: clean_team_name(away),
        });
    }
    Ok(fixtures)
}
