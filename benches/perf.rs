use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use propcast::features::{FeatureConfig, build_features};
use propcast::model::BoosterParams;
use propcast::predict::predict;
use propcast::records::{TeamDefenseTable, normalize_game_log};
use propcast::stats_api::{merge_team_metrics, parse_game_log_json, parse_team_stats_json};
use propcast::train::{TrainConfig, train};

fn fixture_inputs() -> (Vec<propcast::records::GameRecord>, TeamDefenseTable) {
    let games = parse_game_log_json(GAME_LOG_JSON).expect("valid fixture json");
    let advanced = parse_team_stats_json(ADVANCED_JSON).expect("valid fixture json");
    let opponent = parse_team_stats_json(OPPONENT_JSON).expect("valid fixture json");
    (
        normalize_game_log(games, None),
        TeamDefenseTable::from_metrics(merge_team_metrics(advanced, opponent)),
    )
}

fn bench_game_log_parse(c: &mut Criterion) {
    c.bench_function("game_log_parse", |b| {
        b.iter(|| {
            let games = parse_game_log_json(black_box(GAME_LOG_JSON)).unwrap();
            black_box(games.len());
        })
    });
}

fn bench_build_features(c: &mut Criterion) {
    let (games, defense) = fixture_inputs();
    let cfg = FeatureConfig::default();
    c.bench_function("build_features_20_games", |b| {
        b.iter(|| {
            let table = build_features(black_box(&games), &defense, &cfg);
            black_box(table.len());
        })
    });
}

fn bench_train_all_targets(c: &mut Criterion) {
    let (games, defense) = fixture_inputs();
    let table = build_features(&games, &defense, &FeatureConfig::default());
    let cfg = TrainConfig {
        params: BoosterParams {
            n_estimators: 100,
            ..BoosterParams::default()
        },
        ..TrainConfig::default()
    };
    c.bench_function("train_all_targets_100_trees", |b| {
        b.iter(|| {
            let (models, _) = train(black_box(&table), &cfg);
            black_box(models.len());
        })
    });
}

fn bench_predict(c: &mut Criterion) {
    let (games, defense) = fixture_inputs();
    let table = build_features(&games, &defense, &FeatureConfig::default());
    let (models, _) = train(&table, &TrainConfig::default());
    c.bench_function("predict_next_game", |b| {
        b.iter(|| {
            let projection = predict(black_box(&models), &table);
            black_box(projection.available());
        })
    });
}

criterion_group!(
    perf,
    bench_game_log_parse,
    bench_build_features,
    bench_train_all_targets,
    bench_predict
);
criterion_main!(perf);

static GAME_LOG_JSON: &str = include_str!("../tests/fixtures/playergamelog_2544_2024-25.json");
static ADVANCED_JSON: &str = include_str!("../tests/fixtures/leaguedashteamstats_advanced_2024-25.json");
static OPPONENT_JSON: &str = include_str!("../tests/fixtures/leaguedashteamstats_opponent_2024-25.json");
