use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::name_match::best_match;
use crate::teams::{canonical_team_key, lookup_team};

/// Counting and shooting columns carried by every game-log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Stat {
    Min,
    Pts,
    Reb,
    Ast,
    Stl,
    Blk,
    Tov,
    Fg3m,
    Fg3a,
    Fgm,
    Fga,
    FgPct,
    Fg3Pct,
    Ftm,
    Fta,
    FtPct,
    Oreb,
    Dreb,
    Pf,
    PlusMinus,
}

impl Stat {
    pub const ALL: [Stat; 20] = [
        Stat::Min,
        Stat::Pts,
        Stat::Reb,
        Stat::Ast,
        Stat::Stl,
        Stat::Blk,
        Stat::Tov,
        Stat::Fg3m,
        Stat::Fg3a,
        Stat::Fgm,
        Stat::Fga,
        Stat::FgPct,
        Stat::Fg3Pct,
        Stat::Ftm,
        Stat::Fta,
        Stat::FtPct,
        Stat::Oreb,
        Stat::Dreb,
        Stat::Pf,
        Stat::PlusMinus,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Stat::Min => "MIN",
            Stat::Pts => "PTS",
            Stat::Reb => "REB",
            Stat::Ast => "AST",
            Stat::Stl => "STL",
            Stat::Blk => "BLK",
            Stat::Tov => "TOV",
            Stat::Fg3m => "FG3M",
            Stat::Fg3a => "FG3A",
            Stat::Fgm => "FGM",
            Stat::Fga => "FGA",
            Stat::FgPct => "FG_PCT",
            Stat::Fg3Pct => "FG3_PCT",
            Stat::Ftm => "FTM",
            Stat::Fta => "FTA",
            Stat::FtPct => "FT_PCT",
            Stat::Oreb => "OREB",
            Stat::Dreb => "DREB",
            Stat::Pf => "PF",
            Stat::PlusMinus => "PLUS_MINUS",
        }
    }

    pub fn from_column(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        Stat::ALL.iter().copied().find(|s| s.column() == upper)
    }
}

/// One played game for one player, as delivered by a game-log source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub game_id: String,
    pub game_date: NaiveDate,
    /// Raw matchup text, e.g. `LAL vs. BOS` (home) or `LAL @ BOS` (away).
    pub matchup: String,
    pub minutes: f64,
    pub pts: f64,
    pub reb: f64,
    pub ast: f64,
    pub stl: f64,
    pub blk: f64,
    pub tov: f64,
    pub fg3m: f64,
    pub fg3a: f64,
    pub fgm: f64,
    pub fga: f64,
    pub ftm: f64,
    pub fta: f64,
    pub oreb: f64,
    pub dreb: f64,
    pub pf: f64,
    pub plus_minus: f64,
    #[serde(default)]
    pub fg_pct: Option<f64>,
    #[serde(default)]
    pub fg3_pct: Option<f64>,
    #[serde(default)]
    pub ft_pct: Option<f64>,
}

impl GameRecord {
    pub fn stat(&self, stat: Stat) -> Option<f64> {
        let v = match stat {
            Stat::Min => self.minutes,
            Stat::Pts => self.pts,
            Stat::Reb => self.reb,
            Stat::Ast => self.ast,
            Stat::Stl => self.stl,
            Stat::Blk => self.blk,
            Stat::Tov => self.tov,
            Stat::Fg3m => self.fg3m,
            Stat::Fg3a => self.fg3a,
            Stat::Fgm => self.fgm,
            Stat::Fga => self.fga,
            Stat::FgPct => return self.fg_pct,
            Stat::Fg3Pct => return self.fg3_pct,
            Stat::Ftm => self.ftm,
            Stat::Fta => self.fta,
            Stat::FtPct => return self.ft_pct,
            Stat::Oreb => self.oreb,
            Stat::Dreb => self.dreb,
            Stat::Pf => self.pf,
            Stat::PlusMinus => self.plus_minus,
        };
        Some(v)
    }

    pub fn matchup(&self) -> Option<Matchup> {
        parse_matchup(&self.matchup)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matchup {
    pub team: String,
    pub opponent: String,
    pub home: bool,
}

/// `TEAM vs. OPP` is a home game, `TEAM @ OPP` an away game.
pub fn parse_matchup(raw: &str) -> Option<Matchup> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    if tokens.len() < 3 {
        return None;
    }
    let home = match tokens[1].trim_end_matches('.').to_ascii_lowercase().as_str() {
        "vs" | "v" => true,
        "@" | "at" => false,
        _ => return None,
    };
    Some(Matchup {
        team: tokens[0].to_string(),
        opponent: tokens[2..].join(" "),
        home,
    })
}

/// Sorts ascending by date and keeps the first record for any repeated date, then
/// keeps only the most recent `limit` games.
pub fn normalize_game_log(mut games: Vec<GameRecord>, limit: Option<usize>) -> Vec<GameRecord> {
    games.sort_by(|a, b| a.game_date.cmp(&b.game_date));
    games.dedup_by(|later, earlier| later.game_date == earlier.game_date);
    if let Some(limit) = limit
        && games.len() > limit
    {
        games.drain(..games.len() - limit);
    }
    games
}

/// One team's season aggregate of what it allows to opponents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamDefenseMetric {
    #[serde(default)]
    pub team_id: Option<u32>,
    pub team_name: String,
    #[serde(default)]
    pub def_rating: Option<f64>,
    #[serde(default)]
    pub pace: Option<f64>,
    #[serde(default)]
    pub opp_pts: Option<f64>,
    #[serde(default)]
    pub opp_reb: Option<f64>,
    #[serde(default)]
    pub opp_ast: Option<f64>,
}

/// Read-only lookup keyed by `canonical_team_key`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamDefenseTable {
    by_key: BTreeMap<String, TeamDefenseMetric>,
}

impl TeamDefenseTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_metrics<I>(metrics: I) -> Self
    where
        I: IntoIterator<Item = TeamDefenseMetric>,
    {
        let mut table = Self::new();
        for metric in metrics {
            table.insert(metric);
        }
        table
    }

    pub fn insert(&mut self, metric: TeamDefenseMetric) {
        let key = canonical_team_key(&metric.team_name);
        if key.is_empty() {
            return;
        }
        self.by_key.insert(key, metric);
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&TeamDefenseMetric> {
        self.by_key.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.by_key.keys().map(String::as_str)
    }

    pub fn metrics(&self) -> impl Iterator<Item = &TeamDefenseMetric> {
        self.by_key.values()
    }

    /// Exact canonical-key hit first. Text that names no known franchise falls back
    /// to the closest key at or above `floor`; a known franchise missing from the
    /// table resolves to nothing.
    pub fn resolve(&self, raw_team: &str, floor: f64) -> Option<(&str, &TeamDefenseMetric)> {
        let key = canonical_team_key(raw_team);
        if key.is_empty() {
            return None;
        }
        if let Some((k, v)) = self.by_key.get_key_value(&key) {
            return Some((k.as_str(), v));
        }
        if lookup_team(raw_team).is_some() {
            return None;
        }
        let hit = best_match(&key, self.keys(), floor)?;
        self.by_key
            .get_key_value(hit.candidate)
            .map(|(k, v)| (k.as_str(), v))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerEntry {
    pub id: u32,
    pub full_name: String,
    #[serde(default)]
    pub is_active: bool,
}
