use std::collections::HashMap;

use once_cell::sync::Lazy;

/// One canonical spelling per club. Historical result tables and the fixtures
/// API disagree on short forms, so both go through this table before any join.
static ALIASES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Manchester Utd", "Manchester United"),
        ("Man United", "Manchester United"),
        ("Man Utd", "Manchester United"),
        ("Man City", "Manchester City"),
        ("Spurs", "Tottenham Hotspur"),
        ("Tottenham", "Tottenham Hotspur"),
        ("Wolves", "Wolverhampton Wanderers"),
        ("Newcastle Utd", "Newcastle United"),
        ("Newcastle", "Newcastle United"),
        ("West Brom", "West Bromwich Albion"),
        ("West Ham", "West Ham United"),
        ("Bournemouth", "AFC Bournemouth"),
        ("Brighton", "Brighton & Hove Albion"),
        ("Leeds", "Leeds United"),
        ("Leeds Utd", "Leeds United"),
        ("Nott'm Forest", "Nottingham Forest"),
        ("Nott Forest", "Nottingham Forest"),
        ("Sheffield Utd", "Sheffield United"),
        ("Ipswich", "Ipswich Town"),
        ("Luton", "Luton Town"),
        ("Sunderland", "Sunderland AFC"),
    ])
});

/// Canonicalizes a free-text team name. Empty input comes back unchanged and
/// the function is idempotent, so it is safe to apply at every boundary.
pub fn clean_team_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return raw.to_string();
    }
    let stripped = strip_club_suffix(trimmed);
    match ALIASES.get(stripped) {
        Some(canonical) => (*canonical).to_string(),
        None => stripped.to_string(),
    }
}

/// Drops a trailing "FC"/"AFC" token (optional trailing dot), as result tables
/// write "Fulham FC" where the API writes "Fulham".
fn strip_club_suffix(name: &str) -> &str {
    let lower = name.to_ascii_lowercase();
    for suffix in ["afc.", "afc", "fc.", "fc"] {
        if let Some(head) = lower.strip_suffix(suffix) {
            let cut = name[..head.len()].trim_end();
            if !cut.is_empty() {
                return cut;
            }
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_aliases() {
        assert_eq!(clean_team_name("Man Utd"), "Manchester United");
        assert_eq!(clean_team_name("Spurs"), "Tottenham Hotspur");
        assert_eq!(clean_team_name("Nott'm Forest"), "Nottingham Forest");
    }

    #[test]
    fn strips_club_suffix_before_lookup() {
        assert_eq!(clean_team_name("Fulham FC"), "Fulham");
        assert_eq!(clean_team_name("Liverpool FC."), "Liverpool");
        assert_eq!(clean_team_name("Brighton AFC"), "Brighton & Hove Albion");
    }

    #[test]
    fn leading_suffix_token_is_kept() {
        assert_eq!(clean_team_name("AFC Bournemouth"), "AFC Bournemouth");
    }

    #[test]
    fn empty_and_whitespace_pass_through() {
        assert_eq!(clean_team_name(""), "");
        assert_eq!(clean_team_name("   "), "   ");
    }

    #[test]
    fn idempotent_over_every_alias() {
        for canonical in ALIASES.values() {
            let once = clean_team_name(canonical);
            assert_eq!(clean_team_name(&once), once, "not stable for {canonical}");
        }
        assert_eq!(
            clean_team_name(&clean_team_name("Man City")),
            "Manchester City"
        );
    }
}
