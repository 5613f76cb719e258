use std::collections::BTreeSet;
use std::env;

use crate::features::FeatureConfig;
use crate::records::Stat;
use crate::stats_api::StatsApiConfig;
use crate::train::{SplitStrategy, Target, TrainConfig, TrainingMode};

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub features: FeatureConfig,
    pub train: TrainConfig,
    pub source: StatsApiConfig,
    pub player_similarity_floor: f64,
    /// Most recent games kept from the log; `None` keeps the whole season.
    pub game_limit: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            features: FeatureConfig::default(),
            train: TrainConfig::default(),
            source: StatsApiConfig::default(),
            player_similarity_floor: 0.6,
            game_limit: Some(20),
        }
    }
}

impl PipelineConfig {
    /// Reads `.env.local` / `.env` and then the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Unset, blank or unparseable values keep their defaults; numbers are clamped.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        if let Some(raw) = var("PROPCAST_WINDOWS") {
            let mut windows: Vec<usize> = raw
                .split([',', ';', ' '])
                .filter_map(|p| p.trim().parse::<usize>().ok())
                .filter(|w| *w > 0)
                .map(|w| w.min(82))
                .collect();
            windows.sort_unstable();
            windows.dedup();
            if !windows.is_empty() {
                cfg.features.windows = windows;
            }
        }
        if let Some(raw) = var("PROPCAST_TRACKED_STATS") {
            let mut seen = BTreeSet::new();
            let tracked: Vec<Stat> = raw
                .split([',', ';', ' '])
                .filter_map(Stat::from_column)
                .filter(|s| seen.insert(*s))
                .collect();
            if !tracked.is_empty() {
                cfg.features.tracked = tracked;
            }
        }
        if let Some(raw) = var("PROPCAST_TARGETS") {
            let mut seen = BTreeSet::new();
            let targets: Vec<Target> = raw
                .split([',', ';', ' '])
                .filter_map(Target::from_column)
                .filter(|t| seen.insert(*t))
                .collect();
            if !targets.is_empty() {
                cfg.train.targets = targets;
            }
        }
        cfg.features.team_similarity_floor = var("PROPCAST_TEAM_SIMILARITY")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(cfg.features.team_similarity_floor)
            .clamp(0.0, 1.0);
        cfg.player_similarity_floor = var("PROPCAST_PLAYER_SIMILARITY")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(cfg.player_similarity_floor)
            .clamp(0.0, 1.0);

        cfg.train.min_samples = var("PROPCAST_MIN_SAMPLES")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(cfg.train.min_samples)
            .clamp(2, 500);
        cfg.train.test_fraction = var("PROPCAST_TEST_FRACTION")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(cfg.train.test_fraction)
            .clamp(0.05, 0.5);
        cfg.train.seed = var("PROPCAST_SEED")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(cfg.train.seed);
        let mode = var("PROPCAST_TRAINING_MODE").map(|v| v.to_ascii_lowercase());
        cfg.train.mode = match mode.as_deref() {
            Some("same_game") | Some("same-game") | Some("descriptive") => TrainingMode::SameGame,
            _ => TrainingMode::NextGame,
        };
        cfg.train.split = match var("PROPCAST_SPLIT").map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("random") => SplitStrategy::Random,
            _ => SplitStrategy::Chronological,
        };
        cfg.train.params.n_estimators = var("PROPCAST_N_ESTIMATORS")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(cfg.train.params.n_estimators)
            .clamp(1, 5000);
        cfg.train.params.learning_rate = var("PROPCAST_LEARNING_RATE")
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(cfg.train.params.learning_rate)
            .clamp(0.001, 1.0);
        cfg.train.params.max_depth = var("PROPCAST_MAX_DEPTH")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(cfg.train.params.max_depth)
            .clamp(1, 16);

        if let Some(url) = var("NBA_STATS_BASE_URL") {
            cfg.source.base_url = url;
        }
        cfg.source.timeout_secs = var("PROPCAST_HTTP_TIMEOUT_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(cfg.source.timeout_secs)
            .clamp(1, 120);
        cfg.source.retries = var("PROPCAST_HTTP_RETRIES")
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(cfg.source.retries)
            .min(10);
        cfg.source.cache_ttl_secs = var("PROPCAST_CACHE_TTL_SECS")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(cfg.source.cache_ttl_secs);

        cfg.game_limit = match var("PROPCAST_GAME_LIMIT").and_then(|v| v.parse::<usize>().ok()) {
            Some(0) => None,
            Some(n) => Some(n),
            None => cfg.game_limit,
        };
        cfg
    }
}
