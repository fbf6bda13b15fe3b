use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use rayon::prelude::*;

use crate::dataset::{NormalizeSummary, StoredMatch, normalize_csv};
use crate::http_client::http_client;

const ARCHIVE_BASE: &str = "https://www.football-data.co.uk";
/// Error pages come back 200 with a short HTML body; real season files are
/// tens of kilobytes.
const MIN_CSV_BYTES: usize = 1000;

/// "2023" -> "2324", the archive's two-digit season pair.
pub fn season_code(start_year: u16) -> String {
    format!("{:02}{:02}", start_year % 100, (start_year + 1) % 100)
}

fn season_urls(code: &str, league: &str) -> [String; 2] {
    [
        format!("{ARCHIVE_BASE}/mmz4281/{code}/{league}.csv"),
        format!("{ARCHIVE_BASE}/new/{code}/{league}.csv"),
    ]
}

/// One downloaded and normalized season of results.
#[derive(Debug)]
pub struct SeasonBatch {
    pub season: String,
    pub matches: Vec<StoredMatch>,
    pub summary: NormalizeSummary,
}

/// Fetches one season's csv, trying the main archive layout first and the
/// /new/ layout second. Transient failures retry with a linear backoff.
pub fn download_season(league: &str, start_year: u16) -> Result<String> {
    let code = season_code(start_year);
    let client = http_client()?;
    let mut last_err: Option<anyhow::Error> = None;

    for attempt in 1..=4 {
        for url in season_urls(&code, league) {
            let fetched = client
                .get(&url)
                .send()
                .with_context(|| format!("request {url}"))
                .and_then(|res| {
                    res.error_for_status()
                        .with_context(|| format!("status for {url}"))
                })
                .and_then(|res| res.text().with_context(|| format!("read body {url}")));
            match fetched {
                Ok(body) if body.len() > MIN_CSV_BYTES => return Ok(body),
                Ok(body) => {
                    last_err = Some(anyhow!(
                        "{url} returned {} bytes, likely an error page",
                        body.len()
                    ));
                }
                Err(err) => last_err = Some(err),
            }
        }
        if attempt < 4 {
            std::thread::sleep(Duration::from_millis(500 * attempt));
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("download failed for {league} {code}")))
}

/// Downloads and normalizes several seasons in parallel, preserving the
/// order of `start_years` in the output.
pub fn download_seasons(league: &str, start_years: &[u16]) -> Result<Vec<SeasonBatch>> {
    start_years
        .par_iter()
        .map(|year| {
            let code = season_code(*year);
            let raw = download_season(league, *year)
                .with_context(|| format!("season {code} for {league}"))?;
            let (matches, summary) = normalize_csv(&raw, &code)
                .with_context(|| format!("normalize season {code}"))?;
            Ok(SeasonBatch {
                season: code,
                matches,
                summary,
            })
        })
        .collect()
}
