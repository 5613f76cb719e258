//! NBA stats endpoints (`resultSets` tables) and their parsers.

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::http_cache::fetch_cached;
use crate::http_client::http_client;
use crate::records::{GameRecord, PlayerEntry, TeamDefenseMetric, TeamDefenseTable};
use crate::season::Season;
use crate::sources::{GameLogSource, PlayerDirectory, TeamDefenseSource};

pub const DEFAULT_BASE_URL: &str = "https://stats.nba.com/stats";

#[derive(Debug, Clone, PartialEq)]
pub struct StatsApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub cache_ttl_secs: u64,
}

impl Default for StatsApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 10,
            retries: 3,
            retry_backoff_ms: 500,
            cache_ttl_secs: 600,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StatsApi {
    cfg: StatsApiConfig,
}

impl StatsApi {
    pub fn new(cfg: StatsApiConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &StatsApiConfig {
        &self.cfg
    }

    fn url(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Url> {
        let base = format!("{}/{}", self.cfg.base_url.trim_end_matches('/'), endpoint);
        Url::parse_with_params(&base, params).with_context(|| format!("invalid url {base}"))
    }

    /// Fetches and parses with up to `retries` extra attempts; a parse failure is
    /// retried like a transport failure and never served from cache.
    fn fetch<T>(&self, url: &Url, parse: impl Fn(&str) -> Result<T>) -> Result<T> {
        let client = http_client(Duration::from_secs(self.cfg.timeout_secs))?;
        let ttl = Duration::from_secs(self.cfg.cache_ttl_secs);
        let attempts = self.cfg.retries + 1;
        let mut last_err = None;
        for attempt in 0..attempts {
            match fetch_cached(client, url.as_str(), ttl, &parse) {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    debug!(url = %url, attempt, %err, "stats request failed");
                    last_err = Some(err);
                    if attempt + 1 < attempts {
                        let backoff = self.cfg.retry_backoff_ms * u64::from(attempt + 1);
                        std::thread::sleep(Duration::from_millis(backoff));
                    }
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow!("stats request failed")))
    }

    pub fn fetch_game_log(&self, player_id: u32, season: &Season) -> Result<Vec<GameRecord>> {
        let url = self.url(
            "playergamelog",
            &[
                ("PlayerID", player_id.to_string()),
                ("Season", season.to_string()),
                ("SeasonType", "Regular Season".to_string()),
            ],
        )?;
        self.fetch(&url, parse_game_log_json)
    }

    pub fn fetch_team_stats(
        &self,
        season: &Season,
        measure: &str,
    ) -> Result<Vec<TeamDefenseMetric>> {
        let mut params: Vec<(&str, String)> = [
            "Conference",
            "DateFrom",
            "DateTo",
            "Division",
            "GameScope",
            "GameSegment",
            "Location",
            "Outcome",
            "PlayerExperience",
            "PlayerPosition",
            "SeasonSegment",
            "ShotClockRange",
            "StarterBench",
            "VsConference",
            "VsDivision",
        ]
        .into_iter()
        .map(|k| (k, String::new()))
        .collect();
        params.extend([
            ("LastNGames", "0".to_string()),
            ("LeagueID", "00".to_string()),
            ("MeasureType", measure.to_string()),
            ("Month", "0".to_string()),
            ("OpponentTeamID", "0".to_string()),
            ("PaceAdjust", "N".to_string()),
            ("PerMode", "PerGame".to_string()),
            ("Period", "0".to_string()),
            ("PlusMinus", "N".to_string()),
            ("Rank", "N".to_string()),
            ("Season", season.to_string()),
            ("SeasonType", "Regular Season".to_string()),
            ("TeamID", "0".to_string()),
        ]);
        let url = self.url("leaguedashteamstats", &params)?;
        self.fetch(&url, parse_team_stats_json)
    }

    pub fn fetch_players(&self) -> Result<Vec<PlayerEntry>> {
        let season = Season::current(chrono::Local::now().date_naive());
        let url = self.url(
            "commonallplayers",
            &[
                ("LeagueID", "00".to_string()),
                ("Season", season.to_string()),
                ("IsOnlyCurrentSeason", "0".to_string()),
            ],
        )?;
        self.fetch(&url, parse_players_json)
    }
}

impl GameLogSource for StatsApi {
    fn game_log(&self, player_id: u32, season: &Season) -> Result<Vec<GameRecord>, PipelineError> {
        self.fetch_game_log(player_id, season)
            .map_err(PipelineError::unavailable)
    }
}

impl TeamDefenseSource for StatsApi {
    fn team_defense(&self, season: &Season) -> Result<TeamDefenseTable, PipelineError> {
        let advanced = self
            .fetch_team_stats(season, "Advanced")
            .map_err(PipelineError::unavailable)?;
        let opponent = match self.fetch_team_stats(season, "Opponent") {
            Ok(rows) => rows,
            Err(err) => {
                warn!(%err, "opponent team stats unavailable, using advanced only");
                Vec::new()
            }
        };
        Ok(TeamDefenseTable::from_metrics(merge_team_metrics(
            advanced, opponent,
        )))
    }
}

impl PlayerDirectory for StatsApi {
    fn players(&self) -> Result<Vec<PlayerEntry>, PipelineError> {
        self.fetch_players().map_err(PipelineError::unavailable)
    }
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    #[serde(rename = "resultSets", default)]
    result_sets: Vec<ResultSet>,
}

#[derive(Debug, Deserialize)]
struct ResultSet {
    #[serde(default)]
    name: String,
    headers: Vec<String>,
    #[serde(rename = "rowSet", default)]
    row_set: Vec<Vec<Value>>,
}

/// Header-indexed view over one result set.
struct Table<'a> {
    index: HashMap<String, usize>,
    rows: &'a [Vec<Value>],
}

impl<'a> Table<'a> {
    fn new(set: &'a ResultSet) -> Self {
        let index = set
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_ascii_uppercase(), i))
            .collect();
        Self {
            index,
            rows: &set.row_set,
        }
    }

    fn require(&self, columns: &[&str]) -> Result<()> {
        let missing: Vec<&str> = columns
            .iter()
            .copied()
            .filter(|c| !self.index.contains_key(*c))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("result set missing columns: {}", missing.join(", ")))
        }
    }

    fn cell<'r>(&self, row: &'r [Value], column: &str) -> Option<&'r Value> {
        row.get(*self.index.get(column)?)
    }

    fn num(&self, row: &[Value], column: &str) -> Option<f64> {
        match self.cell(row, column)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    fn text(&self, row: &[Value], column: &str) -> Option<String> {
        match self.cell(row, column)? {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

fn parse_response(raw: &str) -> Result<StatsResponse> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(anyhow!("empty stats response"));
    }
    serde_json::from_str(trimmed).context("invalid stats json")
}

fn pick_set<'a>(resp: &'a StatsResponse, name: &str) -> Result<&'a ResultSet> {
    resp.result_sets
        .iter()
        .find(|s| s.name.eq_ignore_ascii_case(name))
        .or_else(|| resp.result_sets.first())
        .ok_or_else(|| anyhow!("stats response has no result sets"))
}

pub fn parse_game_log_json(raw: &str) -> Result<Vec<GameRecord>> {
    let resp = parse_response(raw)?;
    let set = pick_set(&resp, "PlayerGameLog")?;
    let table = Table::new(set);
    table.require(&["GAME_DATE", "MATCHUP", "PTS"])?;

    let mut games = Vec::with_capacity(table.rows.len());
    for row in table.rows {
        let Some(date_raw) = table.text(row, "GAME_DATE") else {
            continue;
        };
        let Some(game_date) = parse_game_date(&date_raw) else {
            debug!(date = %date_raw, "skipping game log row with unreadable date");
            continue;
        };
        let count = |col: &str| table.num(row, col).unwrap_or(0.0);
        games.push(GameRecord {
            game_id: table.text(row, "GAME_ID").unwrap_or_default(),
            game_date,
            matchup: table.text(row, "MATCHUP").unwrap_or_default(),
            minutes: table.cell(row, "MIN").and_then(parse_minutes).unwrap_or(0.0),
            pts: count("PTS"),
            reb: count("REB"),
            ast: count("AST"),
            stl: count("STL"),
            blk: count("BLK"),
            tov: count("TOV"),
            fg3m: count("FG3M"),
            fg3a: count("FG3A"),
            fgm: count("FGM"),
            fga: count("FGA"),
            ftm: count("FTM"),
            fta: count("FTA"),
            oreb: count("OREB"),
            dreb: count("DREB"),
            pf: count("PF"),
            plus_minus: count("PLUS_MINUS"),
            fg_pct: table.num(row, "FG_PCT"),
            fg3_pct: table.num(row, "FG3_PCT"),
            ft_pct: table.num(row, "FT_PCT"),
        });
    }
    Ok(games)
}

/// Accepts `OCT 22, 2024`, `2024-10-22` and `2024-10-22T00:00:00`.
pub fn parse_game_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let date_part = trimmed.split('T').next().unwrap_or(trimmed);
    NaiveDate::parse_from_str(trimmed, "%b %d, %Y")
        .or_else(|_| NaiveDate::parse_from_str(date_part, "%Y-%m-%d"))
        .ok()
}

/// Minutes arrive as a number or as `mm:ss`.
fn parse_minutes(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            match s.split_once(':') {
                Some((m, sec)) => {
                    let m = m.parse::<f64>().ok()?;
                    let sec = sec.parse::<f64>().ok()?;
                    Some(m + sec / 60.0)
                }
                None => s.parse::<f64>().ok(),
            }
        }
        _ => None,
    }
}

pub fn parse_team_stats_json(raw: &str) -> Result<Vec<TeamDefenseMetric>> {
    let resp = parse_response(raw)?;
    let set = pick_set(&resp, "LeagueDashTeamStats")?;
    let table = Table::new(set);
    table.require(&["TEAM_NAME"])?;

    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            let team_name = table.text(row, "TEAM_NAME")?;
            Some(TeamDefenseMetric {
                team_id: table.num(row, "TEAM_ID").map(|v| v as u32),
                team_name,
                def_rating: table.num(row, "DEF_RATING"),
                pace: table.num(row, "PACE"),
                opp_pts: table.num(row, "OPP_PTS"),
                opp_reb: table.num(row, "OPP_REB"),
                opp_ast: table.num(row, "OPP_AST"),
            })
        })
        .collect())
}

/// Combines two measure types of the same league table; fields missing in
/// `primary` are taken from the row in `secondary` with the same team.
pub fn merge_team_metrics(
    primary: Vec<TeamDefenseMetric>,
    secondary: Vec<TeamDefenseMetric>,
) -> Vec<TeamDefenseMetric> {
    let mut out = primary;
    for extra in secondary {
        let slot = out.iter_mut().find(|m| match (m.team_id, extra.team_id) {
            (Some(a), Some(b)) => a == b,
            _ => m.team_name.eq_ignore_ascii_case(&extra.team_name),
        });
        match slot {
            Some(m) => {
                m.def_rating = m.def_rating.or(extra.def_rating);
                m.pace = m.pace.or(extra.pace);
                m.opp_pts = m.opp_pts.or(extra.opp_pts);
                m.opp_reb = m.opp_reb.or(extra.opp_reb);
                m.opp_ast = m.opp_ast.or(extra.opp_ast);
            }
            None => out.push(extra),
        }
    }
    out
}

pub fn parse_players_json(raw: &str) -> Result<Vec<PlayerEntry>> {
    let resp = parse_response(raw)?;
    let set = pick_set(&resp, "CommonAllPlayers")?;
    let table = Table::new(set);
    table.require(&["PERSON_ID", "DISPLAY_FIRST_LAST"])?;

    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            Some(PlayerEntry {
                id: table.num(row, "PERSON_ID")? as u32,
                full_name: table.text(row, "DISPLAY_FIRST_LAST")?,
                is_active: table.num(row, "ROSTERSTATUS").is_some_and(|v| v > 0.0),
            })
        })
        .collect())
}
