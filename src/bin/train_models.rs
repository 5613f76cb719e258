use std::path::PathBuf;

use anyhow::{Result, anyhow};

use propcast::config::PipelineConfig;
use propcast::features::build_features;
use propcast::logging;
use propcast::model_store::{ModelArtifact, default_model_path, save_artifact};
use propcast::pipeline::Sources;
use propcast::season::Season;
use propcast::sources::{JsonDirSource, load_game_log, load_team_defense, resolve_player};
use propcast::stats_api::StatsApi;
use propcast::train::{TargetOutcome, train};

fn main() -> Result<()> {
    logging::init();
    let cfg = PipelineConfig::from_env();

    let player = parse_arg("--player")
        .ok_or_else(|| {
            anyhow!("usage: train_models --player <name> [--season S] [--offline DIR] [--out FILE]")
        })?;
    let season = match parse_arg("--season") {
        Some(raw) => raw.parse::<Season>()?,
        None => Season::current(chrono::Local::now().date_naive()),
    };

    let offline = parse_arg("--offline").map(JsonDirSource::new);
    let api = StatsApi::new(cfg.source.clone());
    let sources = match offline.as_ref() {
        Some(dir) => Sources::from_one(dir),
        None => Sources::from_one(&api),
    };

    let entry = resolve_player(sources.players, &player, cfg.player_similarity_floor)?;
    let games = load_game_log(sources.games, entry.id, &season, cfg.game_limit);
    let defense = load_team_defense(sources.defense, &season);
    let table = build_features(&games, &defense, &cfg.features);
    let (models, report) = train(&table, &cfg.train);

    println!(
        "{} season={} games={} features={} mode={:?}",
        entry.full_name,
        season,
        games.len(),
        table.columns().len(),
        cfg.train.mode
    );
    for e in &report.entries {
        match &e.outcome {
            TargetOutcome::Trained(m) => println!(
                "  {:5} rmse={:.3} baseline={:.3} delta={:+.3} train={} test={}",
                e.target.column(),
                m.rmse,
                m.baseline_rmse,
                m.baseline_rmse - m.rmse,
                m.train_samples,
                m.test_samples
            ),
            TargetOutcome::Skipped(err) => println!("  {:5} skipped: {err}", e.target.column()),
        }
    }

    if models.is_empty() {
        return Err(anyhow!("no targets trained, nothing to write"));
    }

    let out_path = parse_arg("--out")
        .map(PathBuf::from)
        .or_else(|| default_model_path(entry.id))
        .ok_or_else(|| anyhow!("no cache directory; pass --out <file>"))?;
    let mut artifact = ModelArtifact::new(models);
    artifact.player_id = Some(entry.id);
    artifact.player_name = Some(entry.full_name.clone());
    artifact.season = Some(season.to_string());
    save_artifact(&out_path, &artifact)?;
    println!();
    println!("artifact written: {}", out_path.display());
    Ok(())
}

fn parse_arg(flag: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(v) = arg.strip_prefix(&prefix)
            && !v.trim().is_empty()
        {
            return Some(v.to_string());
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.clone());
        }
    }
    None
}
