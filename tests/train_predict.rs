use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use propcast::error::PipelineError;
use propcast::features::{FeatureConfig, FeatureRow, FeatureTable, build_features};
use propcast::model::{BoosterParams, GradientBoostedTrees};
use propcast::model_store::{ModelArtifact, load_artifact, save_artifact};
use propcast::predict::{StatProjection, accuracy, align_features, predict};
use propcast::records::{TeamDefenseTable, normalize_game_log};
use propcast::stats_api::parse_game_log_json;
use propcast::train::{
    Target, TargetOutcome, TrainConfig, TrainedModel, TrainedModelSet, TrainingMode, train,
};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fast_config() -> TrainConfig {
    TrainConfig {
        params: BoosterParams {
            n_estimators: 40,
            ..BoosterParams::default()
        },
        ..TrainConfig::default()
    }
}

fn fixture_table(limit: Option<usize>) -> FeatureTable {
    let games = parse_game_log_json(&read_fixture("playergamelog_2544_2024-25.json"))
        .expect("game log fixture should parse");
    let games = normalize_game_log(games, limit);
    build_features(&games, &TeamDefenseTable::new(), &FeatureConfig::default())
}

fn constant_model(target: Target, features: &[&str], value: f64) -> TrainedModel {
    TrainedModel {
        target,
        mode: TrainingMode::NextGame,
        features: features.iter().map(|s| s.to_string()).collect(),
        booster: GradientBoostedTrees {
            base_score: value,
            learning_rate: 0.1,
            n_features: features.len(),
            trees: Vec::new(),
        },
    }
}

#[test]
fn three_games_train_nothing() {
    let table = fixture_table(Some(3));
    assert_eq!(table.len(), 3);

    for mode in [TrainingMode::NextGame, TrainingMode::SameGame] {
        let cfg = TrainConfig {
            mode,
            ..fast_config()
        };
        let (models, report) = train(&table, &cfg);
        assert!(models.is_empty());
        assert_eq!(report.entries.len(), Target::ALL.len());
        for entry in &report.entries {
            match &entry.outcome {
                TargetOutcome::Skipped(PipelineError::InsufficientData { required, .. }) => {
                    assert_eq!(*required, 5)
                }
                other => panic!("{} should be skipped, got {other:?}", entry.target),
            }
        }
    }
}

#[test]
fn five_game_log_is_enough_to_train() {
    let table = fixture_table(Some(5));
    assert_eq!(table.len(), 5);
    let (models, report) = train(&table, &fast_config());
    assert_eq!(models.len(), Target::ALL.len());
    assert_eq!(report.skipped().count(), 0);

    let table = fixture_table(Some(4));
    let (models, report) = train(&table, &fast_config());
    assert!(models.is_empty());
    for entry in &report.entries {
        assert!(matches!(
            entry.outcome,
            TargetOutcome::Skipped(PipelineError::InsufficientData { samples: 4, required: 5, .. })
        ));
    }
}

#[test]
fn training_is_deterministic() {
    let table = fixture_table(None);
    let cfg = fast_config();
    let (a, report_a) = train(&table, &cfg);
    let (b, report_b) = train(&table, &cfg);
    assert_eq!(a, b);
    assert_eq!(report_a, report_b);
    assert_eq!(a.len(), Target::ALL.len());
}

#[test]
fn report_carries_holdout_metrics() {
    let table = fixture_table(None);
    let (_, report) = train(&table, &fast_config());
    let (_, pts) = report
        .trained()
        .find(|(t, _)| *t == Target::Pts)
        .expect("PTS should train on 20 games");
    // 19 next-game samples, 4 most recent held out
    assert_eq!(pts.train_samples, 15);
    assert_eq!(pts.test_samples, 4);
    assert!(!pts.weak_validation);
    assert!(pts.rmse >= 0.0 && pts.mae >= 0.0);
    assert!(pts.mae <= pts.rmse + 1e-12);
}

#[test]
fn same_game_models_do_not_see_their_target() {
    let table = fixture_table(None);
    let cfg = TrainConfig {
        mode: TrainingMode::SameGame,
        targets: vec![Target::Pts, Target::Pra],
        ..fast_config()
    };
    let (models, _) = train(&table, &cfg);
    let pts = models.get(Target::Pts).unwrap();
    assert!(!pts.schema().iter().any(|c| c == "PTS" || c == "PRA"));
    let pra = models.get(Target::Pra).unwrap();
    let leaks = ["PTS", "REB", "AST", "PRA", "EFF"];
    assert!(!pra.schema().iter().any(|c| leaks.contains(&c.as_str())));
    assert!(pra.schema().iter().any(|c| c == "PTS_ROLL5"));
}

#[test]
fn projected_pra_is_sum_of_components() {
    let table = fixture_table(None);
    let (models, _) = train(&table, &fast_config());
    let projection = predict(&models, &table);

    let pts = projection.get(Target::Pts).value().unwrap();
    let reb = projection.get(Target::Reb).value().unwrap();
    let ast = projection.get(Target::Ast).value().unwrap();
    assert_eq!(projection.get(Target::Pra), StatProjection::Predicted(pts + reb + ast));
    assert!(models.get(Target::Pra).is_some());
}

#[test]
fn direct_pra_model_is_ignored() {
    let table = fixture_table(None);
    let models = TrainedModelSet {
        models: vec![
            constant_model(Target::Pts, &["PTS"], 20.0),
            constant_model(Target::Reb, &["REB"], 7.0),
            constant_model(Target::Ast, &["AST"], 6.0),
            constant_model(Target::Pra, &["PRA"], 999.0),
        ],
    };
    let projection = predict(&models, &table);
    assert_eq!(projection.get(Target::Pra), StatProjection::Predicted(33.0));
}

#[test]
fn schema_drift_fills_missing_and_drops_extra() {
    let date = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
    let columns: Vec<String> = ["A", "B", "D"].iter().map(|s| s.to_string()).collect();
    let table = FeatureTable::new(columns.clone(), vec![FeatureRow::new(date, vec![1.0, 2.0, 3.0])])
        .expect("well-formed table");

    let x: Vec<Vec<f64>> = (0..12)
        .map(|i| vec![i as f64, (i % 3) as f64, (i % 2) as f64])
        .collect();
    let y: Vec<f64> = x.iter().map(|r| r[0] + 10.0 * r[2]).collect();
    let booster = GradientBoostedTrees::fit(&x, &y, &BoosterParams::default(), 42);
    let model = TrainedModel {
        target: Target::Pts,
        mode: TrainingMode::NextGame,
        features: ["A", "B", "C"].iter().map(|s| s.to_string()).collect(),
        booster: booster.clone(),
    };

    let aligned = align_features(model.schema(), &columns, &table.rows()[0].values);
    assert_eq!(aligned.values, vec![1.0, 2.0, 0.0]);
    assert_eq!(aligned.missing, vec!["C".to_string()]);
    assert_eq!(aligned.dropped, vec!["D".to_string()]);

    let projection = predict(&TrainedModelSet { models: vec![model] }, &table);
    let expected = booster.predict(&[1.0, 2.0, 0.0]).max(0.0);
    assert_eq!(projection.get(Target::Pts), StatProjection::Predicted(expected));
}

#[test]
fn missing_model_is_unavailable_not_zero() {
    let table = fixture_table(None);
    let models = TrainedModelSet {
        models: vec![constant_model(Target::Pts, &["PTS"], 0.0)],
    };
    let projection = predict(&models, &table);
    assert_eq!(projection.get(Target::Pts), StatProjection::Predicted(0.0));
    assert_eq!(projection.get(Target::Reb), StatProjection::Unavailable);
    assert_eq!(projection.get(Target::Pra), StatProjection::Unavailable);
    assert_eq!(projection.available(), 1);
}

#[test]
fn negative_predictions_are_clamped() {
    let table = fixture_table(None);
    let models = TrainedModelSet {
        models: vec![constant_model(Target::Tov, &["TOV"], -1.5)],
    };
    assert_eq!(
        predict(&models, &table).get(Target::Tov),
        StatProjection::Predicted(0.0)
    );
}

#[test]
fn accuracy_against_actual_game() {
    let games = normalize_game_log(
        parse_game_log_json(&read_fixture("playergamelog_2544_2024-25.json")).unwrap(),
        None,
    );
    let last = games.last().unwrap();
    let table = fixture_table(None);
    let models = TrainedModelSet {
        models: vec![
            constant_model(Target::Pts, &["PTS"], 20.0),
            constant_model(Target::Reb, &["REB"], 8.0),
            constant_model(Target::Ast, &["AST"], 8.0),
        ],
    };
    let report = accuracy(&predict(&models, &table), last);

    // last fixture game: 24 pts, 8 reb, 8 ast
    let pts = report.stats.iter().find(|s| s.target == Target::Pts).unwrap();
    assert_eq!(pts.abs_error, 4.0);
    assert!((pts.pct_error - 4.0 / (24.0 + 1e-6) * 100.0).abs() < 1e-9);
    let pra = report.stats.iter().find(|s| s.target == Target::Pra).unwrap();
    assert_eq!(pra.actual, 40.0);
    assert_eq!(report.stats.len(), 4);
    assert!((report.mae - (4.0 + 0.0 + 0.0 + 4.0) / 4.0).abs() < 1e-12);
}

#[test]
fn model_artifact_survives_disk() {
    let table = fixture_table(None);
    let cfg = TrainConfig {
        targets: vec![Target::Pts, Target::Reb],
        ..fast_config()
    };
    let (models, _) = train(&table, &cfg);

    let dir = std::env::temp_dir().join(format!("propcast-test-{}", std::process::id()));
    let path = dir.join("models.json");
    let mut artifact = ModelArtifact::new(models.clone());
    artifact.player_id = Some(2544);
    save_artifact(&path, &artifact).expect("artifact should save");
    let loaded = load_artifact(&path).expect("artifact should load");
    let _ = fs::remove_dir_all(&dir);

    assert_eq!(loaded.models, models);
    assert_eq!(predict(&loaded.models, &table), predict(&models, &table));
    assert!(load_artifact(&dir.join("missing.json")).is_err());
}
