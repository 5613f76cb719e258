use crate::name_match::normalize_name;

#[derive(Debug, Clone, Copy)]
pub struct NbaTeam {
    pub id: u32,
    pub abbreviation: &'static str,
    pub city: &'static str,
    pub nickname: &'static str,
    pub full_name: &'static str,
    /// Other abbreviations seen in feeds (historic codes, ESPN/odds-site codes).
    pub aliases: &'static [&'static str],
}

#[rustfmt::skip]
pub const NBA_TEAMS: &[NbaTeam] = &[
    NbaTeam { id: 1610612737, abbreviation: "ATL", city: "Atlanta", nickname: "Hawks", full_name: "Atlanta Hawks", aliases: &[] },
    NbaTeam { id: 1610612738, abbreviation: "BOS", city: "Boston", nickname: "Celtics", full_name: "Boston Celtics", aliases: &[] },
    NbaTeam { id: 1610612751, abbreviation: "BKN", city: "Brooklyn", nickname: "Nets", full_name: "Brooklyn Nets", aliases: &["BRK", "NJN"] },
    NbaTeam { id: 1610612766, abbreviation: "CHA", city: "Charlotte", nickname: "Hornets", full_name: "Charlotte Hornets", aliases: &["CHO"] },
    NbaTeam { id: 1610612741, abbreviation: "CHI", city: "Chicago", nickname: "Bulls", full_name: "Chicago Bulls", aliases: &[] },
    NbaTeam { id: 1610612739, abbreviation: "CLE", city: "Cleveland", nickname: "Cavaliers", full_name: "Cleveland Cavaliers", aliases: &[] },
    NbaTeam { id: 1610612742, abbreviation: "DAL", city: "Dallas", nickname: "Mavericks", full_name: "Dallas Mavericks", aliases: &[] },
    NbaTeam { id: 1610612743, abbreviation: "DEN", city: "Denver", nickname: "Nuggets", full_name: "Denver Nuggets", aliases: &[] },
    NbaTeam { id: 1610612765, abbreviation: "DET", city: "Detroit", nickname: "Pistons", full_name: "Detroit Pistons", aliases: &[] },
    NbaTeam { id: 1610612744, abbreviation: "GSW", city: "Golden State", nickname: "Warriors", full_name: "Golden State Warriors", aliases: &["GS"] },
    NbaTeam { id: 1610612745, abbreviation: "HOU", city: "Houston", nickname: "Rockets", full_name: "Houston Rockets", aliases: &[] },
    NbaTeam { id: 1610612754, abbreviation: "IND", city: "Indiana", nickname: "Pacers", full_name: "Indiana Pacers", aliases: &[] },
    NbaTeam { id: 1610612746, abbreviation: "LAC", city: "Los Angeles", nickname: "Clippers", full_name: "LA Clippers", aliases: &["Los Angeles Clippers"] },
    NbaTeam { id: 1610612747, abbreviation: "LAL", city: "Los Angeles", nickname: "Lakers", full_name: "Los Angeles Lakers", aliases: &[] },
    NbaTeam { id: 1610612763, abbreviation: "MEM", city: "Memphis", nickname: "Grizzlies", full_name: "Memphis Grizzlies", aliases: &[] },
    NbaTeam { id: 1610612748, abbreviation: "MIA", city: "Miami", nickname: "Heat", full_name: "Miami Heat", aliases: &[] },
    NbaTeam { id: 1610612749, abbreviation: "MIL", city: "Milwaukee", nickname: "Bucks", full_name: "Milwaukee Bucks", aliases: &[] },
    NbaTeam { id: 1610612750, abbreviation: "MIN", city: "Minnesota", nickname: "Timberwolves", full_name: "Minnesota Timberwolves", aliases: &[] },
    NbaTeam { id: 1610612740, abbreviation: "NOP", city: "New Orleans", nickname: "Pelicans", full_name: "New Orleans Pelicans", aliases: &["NO", "NOH"] },
    NbaTeam { id: 1610612752, abbreviation: "NYK", city: "New York", nickname: "Knicks", full_name: "New York Knicks", aliases: &["NY"] },
    NbaTeam { id: 1610612760, abbreviation: "OKC", city: "Oklahoma City", nickname: "Thunder", full_name: "Oklahoma City Thunder", aliases: &["SEA"] },
    NbaTeam { id: 1610612753, abbreviation: "ORL", city: "Orlando", nickname: "Magic", full_name: "Orlando Magic", aliases: &[] },
    NbaTeam { id: 1610612755, abbreviation: "PHI", city: "Philadelphia", nickname: "76ers", full_name: "Philadelphia 76ers", aliases: &[] },
    NbaTeam { id: 1610612756, abbreviation: "PHX", city: "Phoenix", nickname: "Suns", full_name: "Phoenix Suns", aliases: &["PHO"] },
    NbaTeam { id: 1610612757, abbreviation: "POR", city: "Portland", nickname: "Trail Blazers", full_name: "Portland Trail Blazers", aliases: &[] },
    NbaTeam { id: 1610612758, abbreviation: "SAC", city: "Sacramento", nickname: "Kings", full_name: "Sacramento Kings", aliases: &[] },
    NbaTeam { id: 1610612759, abbreviation: "SAS", city: "San Antonio", nickname: "Spurs", full_name: "San Antonio Spurs", aliases: &["SA"] },
    NbaTeam { id: 1610612761, abbreviation: "TOR", city: "Toronto", nickname: "Raptors", full_name: "Toronto Raptors", aliases: &[] },
    NbaTeam { id: 1610612762, abbreviation: "UTA", city: "Utah", nickname: "Jazz", full_name: "Utah Jazz", aliases: &["UTAH"] },
    NbaTeam { id: 1610612764, abbreviation: "WAS", city: "Washington", nickname: "Wizards", full_name: "Washington Wizards", aliases: &["WSH"] },
];

pub fn team_by_id(id: u32) -> Option<&'static NbaTeam> {
    NBA_TEAMS.iter().find(|t| t.id == id)
}

/// Finds a franchise from an abbreviation, alias, full name, nickname or unambiguous city.
pub fn lookup_team(raw: &str) -> Option<&'static NbaTeam> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let upper = trimmed.to_ascii_uppercase();
    if let Some(team) = NBA_TEAMS.iter().find(|t| {
        t.abbreviation == upper || t.aliases.iter().any(|a| a.eq_ignore_ascii_case(trimmed))
    }) {
        return Some(team);
    }

    let norm = normalize_name(trimmed);
    if let Some(team) = NBA_TEAMS.iter().find(|t| {
        normalize_name(t.full_name) == norm
            || normalize_name(t.nickname) == norm
            || normalize_name(&format!("{} {}", t.city, t.nickname)) == norm
    }) {
        return Some(team);
    }

    let mut by_city = NBA_TEAMS.iter().filter(|t| normalize_name(t.city) == norm);
    match (by_city.next(), by_city.next()) {
        (Some(team), None) => Some(team),
        _ => None,
    }
}

/// Canonical join key for any team reference. Known franchises map to their
/// normalised full name; anything else is just normalised.
pub fn canonical_team_key(raw: &str) -> String {
    match lookup_team(raw) {
        Some(team) => normalize_name(team.full_name),
        None => normalize_name(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abbreviations_and_names_share_a_key() {
        assert_eq!(canonical_team_key("BOS"), "boston_celtics");
        assert_eq!(canonical_team_key("Boston Celtics"), "boston_celtics");
        assert_eq!(canonical_team_key("celtics"), "boston_celtics");
        assert_eq!(canonical_team_key("PHO"), "phoenix_suns");
        assert_eq!(canonical_team_key("Los Angeles Clippers"), "la_clippers");
    }

    #[test]
    fn ambiguous_city_is_not_guessed() {
        assert!(lookup_team("Los Angeles").is_none());
        assert_eq!(canonical_team_key("Los Angeles"), "los_angeles");
        assert_eq!(lookup_team("Utah").map(|t| t.abbreviation), Some("UTA"));
    }

    #[test]
    fn thirty_franchises() {
        assert_eq!(NBA_TEAMS.len(), 30);
    }
}
