//! Source contracts and the degraded-mode boundary around them.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::error::PipelineError;
use crate::name_match::{best_match, normalize_name};
use crate::records::{GameRecord, PlayerEntry, TeamDefenseTable, normalize_game_log};
use crate::season::Season;
use crate::stats_api::{
    merge_team_metrics, parse_game_log_json, parse_players_json, parse_team_stats_json,
};

/// Per-game box scores for one player and season. Implementations should be pure
/// functions of their arguments so any cache can wrap them.
pub trait GameLogSource {
    fn game_log(&self, player_id: u32, season: &Season) -> Result<Vec<GameRecord>, PipelineError>;
}

pub trait TeamDefenseSource {
    fn team_defense(&self, season: &Season) -> Result<TeamDefenseTable, PipelineError>;
}

pub trait PlayerDirectory {
    fn players(&self) -> Result<Vec<PlayerEntry>, PipelineError>;
}

/// Exact name first (active players preferred), then the closest name at or above
/// `floor`. An unreachable directory resolves nobody.
pub fn resolve_player(
    directory: &dyn PlayerDirectory,
    query: &str,
    floor: f64,
) -> Result<PlayerEntry, PipelineError> {
    let players = directory.players().unwrap_or_else(|err| {
        warn!(%err, "player directory unavailable");
        Vec::new()
    });
    let wanted = normalize_name(query);
    if wanted.is_empty() {
        return Err(PipelineError::NotFound(format!("player '{query}'")));
    }

    let mut exact = players
        .iter()
        .filter(|p| normalize_name(&p.full_name) == wanted);
    let first = exact.next();
    let preferred = first
        .filter(|p| p.is_active)
        .or_else(|| exact.find(|p| p.is_active))
        .or(first);
    if let Some(hit) = preferred {
        return Ok(hit.clone());
    }

    let hit = best_match(query, players.iter().map(|p| p.full_name.as_str()), floor)
        .ok_or_else(|| PipelineError::NotFound(format!("player '{query}'")))?;
    info!(query, matched = hit.candidate, score = hit.score, "fuzzy player match");
    players
        .iter()
        .find(|p| p.full_name == hit.candidate)
        .cloned()
        .ok_or_else(|| PipelineError::NotFound(format!("player '{query}'")))
}

/// Game log in ascending date order with duplicate dates removed and only the
/// latest `limit` games kept; any source failure yields an empty log.
pub fn load_game_log(
    source: &dyn GameLogSource,
    player_id: u32,
    season: &Season,
    limit: Option<usize>,
) -> Vec<GameRecord> {
    match source.game_log(player_id, season) {
        Ok(games) => normalize_game_log(games, limit),
        Err(err) => {
            warn!(player_id, %season, %err, "game log unavailable, continuing without games");
            Vec::new()
        }
    }
}

/// Team-defense table for the season, or an empty table on any source failure.
pub fn load_team_defense(source: &dyn TeamDefenseSource, season: &Season) -> TeamDefenseTable {
    match source.team_defense(season) {
        Ok(table) => table,
        Err(err) => {
            warn!(%season, %err, "team defense unavailable, opponent features will be null");
            TeamDefenseTable::new()
        }
    }
}

/// Reads stats-API JSON payloads saved in a directory:
///
/// - `playergamelog_{player_id}_{season}.json` (or `playergamelog_{player_id}.json`)
/// - `leaguedashteamstats_advanced_{season}.json`, `leaguedashteamstats_opponent_{season}.json`
/// - `commonallplayers.json`
#[derive(Debug, Clone)]
pub struct JsonDirSource {
    dir: PathBuf,
}

impl JsonDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read(&self, name: &str) -> Result<String> {
        let path = self.dir.join(name);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }

    fn first_existing(&self, names: &[String]) -> Result<String> {
        names
            .iter()
            .find(|n| self.dir.join(n).is_file())
            .map(|n| self.read(n))
            .unwrap_or_else(|| Err(anyhow::anyhow!("none of {names:?} in {}", self.dir.display())))
    }
}

impl GameLogSource for JsonDirSource {
    fn game_log(&self, player_id: u32, season: &Season) -> Result<Vec<GameRecord>, PipelineError> {
        let names = [
            format!("playergamelog_{player_id}_{season}.json"),
            format!("playergamelog_{player_id}.json"),
        ];
        let raw = self.first_existing(&names).map_err(PipelineError::unavailable)?;
        let games = parse_game_log_json(&raw).map_err(PipelineError::unavailable)?;
        if games.is_empty() {
            return Err(PipelineError::NotFound(format!(
                "games for player {player_id} in {season}"
            )));
        }
        Ok(games)
    }
}

impl TeamDefenseSource for JsonDirSource {
    fn team_defense(&self, season: &Season) -> Result<TeamDefenseTable, PipelineError> {
        let advanced = self
            .read(&format!("leaguedashteamstats_advanced_{season}.json"))
            .and_then(|raw| parse_team_stats_json(&raw))
            .map_err(PipelineError::unavailable)?;
        let opponent = self
            .read(&format!("leaguedashteamstats_opponent_{season}.json"))
            .and_then(|raw| parse_team_stats_json(&raw))
            .unwrap_or_default();
        Ok(TeamDefenseTable::from_metrics(merge_team_metrics(
            advanced, opponent,
        )))
    }
}

impl PlayerDirectory for JsonDirSource {
    fn players(&self) -> Result<Vec<PlayerEntry>, PipelineError> {
        self.read("commonallplayers.json")
            .and_then(|raw| parse_players_json(&raw))
            .map_err(PipelineError::unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Roster(Vec<PlayerEntry>);

    impl PlayerDirectory for Roster {
        fn players(&self) -> Result<Vec<PlayerEntry>, PipelineError> {
            Ok(self.0.clone())
        }
    }

    struct Down;

    impl GameLogSource for Down {
        fn game_log(&self, _: u32, _: &Season) -> Result<Vec<GameRecord>, PipelineError> {
            Err(PipelineError::SourceUnavailable("timeout".into()))
        }
    }

    impl TeamDefenseSource for Down {
        fn team_defense(&self, _: &Season) -> Result<TeamDefenseTable, PipelineError> {
            Err(PipelineError::SourceUnavailable("timeout".into()))
        }
    }

    impl PlayerDirectory for Down {
        fn players(&self) -> Result<Vec<PlayerEntry>, PipelineError> {
            Err(PipelineError::SourceUnavailable("timeout".into()))
        }
    }

    fn entry(id: u32, name: &str, active: bool) -> PlayerEntry {
        PlayerEntry {
            id,
            full_name: name.to_string(),
            is_active: active,
        }
    }

    #[test]
    fn exact_match_prefers_active_player() {
        let roster = Roster(vec![
            entry(1, "Gary Payton", false),
            entry(2, "Gary Payton", true),
            entry(3, "LeBron James", true),
        ]);
        assert_eq!(resolve_player(&roster, "gary payton", 0.6).unwrap().id, 2);
    }

    #[test]
    fn fuzzy_match_respects_floor() {
        let roster = Roster(vec![entry(3, "LeBron James", true), entry(4, "Nikola Jokić", true)]);
        assert_eq!(resolve_player(&roster, "Nikola Jokic", 0.6).unwrap().id, 4);
        assert_eq!(resolve_player(&roster, "Lebron Jame", 0.6).unwrap().id, 3);
        assert!(matches!(
            resolve_player(&roster, "Zzyzx", 0.6),
            Err(PipelineError::NotFound(_))
        ));
    }

    #[test]
    fn failing_sources_degrade_to_empty() {
        let season = Season::starting(2024);
        assert!(load_game_log(&Down, 1, &season, Some(20)).is_empty());
        assert!(load_team_defense(&Down, &season).is_empty());
        assert!(matches!(
            resolve_player(&Down, "LeBron James", 0.6),
            Err(PipelineError::NotFound(_))
        ));
    }
}
