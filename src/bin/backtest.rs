//! Offline walk-forward check: for each of the last `--holdout` games, train on
//! everything before it and compare the projection with what happened.

use anyhow::{Result, anyhow};

use propcast::config::PipelineConfig;
use propcast::features::build_features;
use propcast::logging;
use propcast::predict::{accuracy, predict};
use propcast::season::Season;
use propcast::sources::{JsonDirSource, load_game_log, load_team_defense, resolve_player};
use propcast::train::train;

fn main() -> Result<()> {
    logging::init();
    let cfg = PipelineConfig::from_env();

    let dir = parse_arg("--dir").unwrap_or_else(|| "tests/fixtures".to_string());
    let player = parse_arg("--player")
        .ok_or_else(|| {
            anyhow!("usage: backtest --player <name> --season S [--dir DIR] [--holdout N]")
        })?;
    let season: Season = parse_arg("--season")
        .ok_or_else(|| anyhow!("--season is required offline"))?
        .parse()?;
    let holdout = parse_arg("--holdout")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(1)
        .max(1);

    let source = JsonDirSource::new(&dir);
    let entry = resolve_player(&source, &player, cfg.player_similarity_floor)?;
    let games = load_game_log(&source, entry.id, &season, None);
    let defense = load_team_defense(&source, &season);
    if games.len() <= holdout {
        return Err(anyhow!(
            "{} games in {dir}, need more than {holdout} to hold out",
            games.len()
        ));
    }

    println!(
        "{} season={} games={} holdout={}",
        entry.full_name,
        season,
        games.len(),
        holdout
    );

    let mut maes = Vec::new();
    for cut in games.len() - holdout..games.len() {
        let history = &games[..cut];
        let actual = &games[cut];
        let table = build_features(history, &defense, &cfg.features);
        let (models, _) = train(&table, &cfg.train);
        let projection = predict(&models, &table);
        let report = accuracy(&projection, actual);

        println!();
        println!(
            "{} {} (trained on {} games)",
            actual.game_date,
            actual.matchup,
            history.len()
        );
        for s in &report.stats {
            println!(
                "  {:5} predicted={:>6.1} actual={:>5.1} abs_err={:>5.2} pct_err={:>6.1}%",
                s.target.column(),
                s.predicted,
                s.actual,
                s.abs_error,
                s.pct_error
            );
        }
        if report.stats.is_empty() {
            println!("  no stats projected");
        } else {
            println!(
                "  mae={:.2} mean_pct_err={:.1}%",
                report.mae, report.mean_pct_error
            );
            maes.push(report.mae);
        }
    }

    if !maes.is_empty() {
        println!();
        println!(
            "overall mae={:.2} over {} games",
            maes.iter().sum::<f64>() / maes.len() as f64,
            maes.len()
        );
    }
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
