use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::features::{FeatureTable, build_features, season_averages};
use crate::predict::{Projection, predict};
use crate::records::{GameRecord, PlayerEntry, Stat};
use crate::season::Season;
use crate::sources::{
    GameLogSource, PlayerDirectory, TeamDefenseSource, load_game_log, load_team_defense,
    resolve_player,
};
use crate::train::{TrainedModelSet, TrainingReport, train};

#[derive(Clone, Copy)]
pub struct Sources<'a> {
    pub players: &'a dyn PlayerDirectory,
    pub games: &'a dyn GameLogSource,
    pub defense: &'a dyn TeamDefenseSource,
}

impl<'a> Sources<'a> {
    pub fn from_one<S>(source: &'a S) -> Self
    where
        S: PlayerDirectory + GameLogSource + TeamDefenseSource,
    {
        Self {
            players: source,
            games: source,
            defense: source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectionRun {
    pub player: PlayerEntry,
    pub season: Season,
    pub games: Vec<GameRecord>,
    pub features: FeatureTable,
    pub models: TrainedModelSet,
    pub report: TrainingReport,
    pub projection: Projection,
    pub averages: BTreeMap<Stat, f64>,
}

pub fn run_projection(
    sources: Sources<'_>,
    player_query: &str,
    season: Option<Season>,
    cfg: &PipelineConfig,
) -> Result<ProjectionRun, PipelineError> {
    run_projection_on(
        sources,
        player_query,
        season,
        cfg,
        chrono::Local::now().date_naive(),
    )
}

/// Like `run_projection`, with "today" fixed for season detection. Only an
/// unresolvable player is an error; every other failure degrades.
pub fn run_projection_on(
    sources: Sources<'_>,
    player_query: &str,
    season: Option<Season>,
    cfg: &PipelineConfig,
    today: NaiveDate,
) -> Result<ProjectionRun, PipelineError> {
    let player = resolve_player(sources.players, player_query, cfg.player_similarity_floor)?;
    info!(player = %player.full_name, id = player.id, "player resolved");

    let (season, games) = match season {
        Some(season) => {
            let games = load_game_log(sources.games, player.id, &season, cfg.game_limit);
            (season, games)
        }
        None => {
            let current = Season::current(today);
            let games = load_game_log(sources.games, player.id, &current, cfg.game_limit);
            if games.is_empty() {
                let previous = current.previous();
                info!(%current, %previous, "no games this season, trying previous");
                let games = load_game_log(sources.games, player.id, &previous, cfg.game_limit);
                (previous, games)
            } else {
                (current, games)
            }
        }
    };
    if games.is_empty() {
        warn!(player = %player.full_name, %season, "no games found, projection will be empty");
    }

    let defense = load_team_defense(sources.defense, &season);
    let features = build_features(&games, &defense, &cfg.features);
    let (models, report) = train(&features, &cfg.train);
    let projection = predict(&models, &features);
    let averages = season_averages(&games);

    Ok(ProjectionRun {
        player,
        season,
        games,
        features,
        models,
        report,
        projection,
        averages,
    })
}
