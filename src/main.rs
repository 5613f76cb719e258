use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use propcast::config::PipelineConfig;
use propcast::export::export_run;
use propcast::logging;
use propcast::model_store::{ModelArtifact, default_model_path, save_artifact};
use propcast::pipeline::{ProjectionRun, Sources, run_projection};
use propcast::predict::StatProjection;
use propcast::records::Stat;
use propcast::season::Season;
use propcast::sources::JsonDirSource;
use propcast::stats_api::StatsApi;
use propcast::train::TargetOutcome;

const USAGE: &str = "usage: propcast --player <name> [--season 2024-25] [--last-n N] \
[--offline <dir>] [--export <file.xlsx>] [--save-models [file.json]]";

fn main() -> Result<()> {
    logging::init();
    let mut cfg = PipelineConfig::from_env();

    if has_flag("--help") || has_flag("-h") {
        println!("{USAGE}");
        return Ok(());
    }
    let player = arg_value("--player").ok_or_else(|| anyhow!("{USAGE}"))?;
    let season = arg_value("--season")
        .map(|raw| raw.parse::<Season>())
        .transpose()?;
    if let Some(raw) = arg_value("--last-n") {
        let n = raw
            .parse::<usize>()
            .with_context(|| format!("invalid --last-n '{raw}'"))?;
        cfg.game_limit = (n > 0).then_some(n);
    }

    let run = match arg_value("--offline") {
        Some(dir) => {
            let source = JsonDirSource::new(dir);
            run_projection(Sources::from_one(&source), &player, season, &cfg)?
        }
        None => {
            let api = StatsApi::new(cfg.source.clone());
            run_projection(Sources::from_one(&api), &player, season, &cfg)?
        }
    };

    print_run(&run);

    if let Some(path) = arg_value("--export") {
        let path = PathBuf::from(path);
        let report = export_run(&path, &run)?;
        println!();
        println!(
            "workbook written: {} (games={} features={} metrics={} projections={})",
            path.display(),
            report.games,
            report.feature_rows,
            report.metrics,
            report.projections
        );
    }

    if has_flag("--save-models") {
        let path = arg_value("--save-models")
            .filter(|v| !v.starts_with("--"))
            .map(PathBuf::from)
            .or_else(|| default_model_path(run.player.id))
            .ok_or_else(|| anyhow!("no cache directory; pass --save-models <file>"))?;
        let mut artifact = ModelArtifact::new(run.models.clone());
        artifact.player_id = Some(run.player.id);
        artifact.player_name = Some(run.player.full_name.clone());
        artifact.season = Some(run.season.to_string());
        save_artifact(&path, &artifact)?;
        println!("models written: {}", path.display());
    }

    Ok(())
}

fn print_run(run: &ProjectionRun) {
    println!(
        "{} ({}) season={} games={}",
        run.player.full_name,
        run.player.id,
        run.season,
        run.games.len()
    );
    if let Some(last) = run.games.last() {
        println!("last game: {} {}", last.game_date, last.matchup);
    }
    println!();
    println!("Next-game projection:");
    for (target, projection) in run.projection.iter() {
        let avg = Stat::from_column(target.column())
            .and_then(|s| run.averages.get(&s).copied())
            .map(|v| format!("{v:.1}"))
            .unwrap_or_else(|| "-".to_string());
        match projection {
            StatProjection::Predicted(v) => {
                println!("  {:5} {:>6.1}   season avg {avg}", target.column(), v)
            }
            StatProjection::Unavailable => {
                println!("  {:5} {:>6}   season avg {avg}", target.column(), "n/a")
            }
        }
    }

    println!();
    println!("Model validation:");
    for entry in &run.report.entries {
        match &entry.outcome {
            TargetOutcome::Trained(m) => println!(
                "  {:5} rmse={:.2} mae={:.2} r2={:+.3} baseline_rmse={:.2} train={} test={}{}",
                entry.target.column(),
                m.rmse,
                m.mae,
                m.r2,
                m.baseline_rmse,
                m.train_samples,
                m.test_samples,
                if m.weak_validation { " (random split)" } else { "" }
            ),
            TargetOutcome::Skipped(err) => {
                println!("  {:5} untrained: {err}", entry.target.column())
            }
        }
    }
}

fn arg_value(flag: &str) -> Option<String> {
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

fn has_flag(flag: &str) -> bool {
    let prefix = format!("{flag}=");
    std::env::args()
        .skip(1)
        .any(|a| a == flag || a.starts_with(&prefix))
}
