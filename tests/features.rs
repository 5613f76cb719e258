use std::fs;
use std::path::PathBuf;

use chrono::{Duration, NaiveDate};

use propcast::features::{
    FeatureConfig, OPP_DEF_RTG, OPP_PACE, OPPONENT_COLUMNS, PRA, build_features,
};
use propcast::records::{GameRecord, TeamDefenseMetric, TeamDefenseTable};
use propcast::stats_api::{merge_team_metrics, parse_team_stats_json};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

fn fixture_defense() -> TeamDefenseTable {
    let advanced = parse_team_stats_json(&read_fixture("leaguedashteamstats_advanced_2024-25.json"))
        .expect("advanced fixture should parse");
    let opponent = parse_team_stats_json(&read_fixture("leaguedashteamstats_opponent_2024-25.json"))
        .expect("opponent fixture should parse");
    TeamDefenseTable::from_metrics(merge_team_metrics(advanced, opponent))
}

fn game(offset: i64, pts: f64, reb: f64, ast: f64, matchup: &str) -> GameRecord {
    let base = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
    GameRecord {
        game_id: format!("g{offset}"),
        game_date: base + Duration::days(offset),
        matchup: matchup.to_string(),
        minutes: 30.0 + (offset % 5) as f64,
        pts,
        reb,
        ast,
        stl: 1.0,
        blk: 0.0,
        tov: 2.0,
        fg3m: 1.0,
        fg3a: 4.0,
        fgm: (pts / 2.0).floor(),
        fga: pts,
        ftm: 2.0,
        fta: 3.0,
        oreb: 1.0,
        dreb: reb - 1.0,
        pf: 2.0,
        plus_minus: 0.0,
        fg_pct: Some(0.5),
        fg3_pct: Some(0.25),
        ft_pct: Some(0.667),
    }
}

fn twenty_games() -> Vec<GameRecord> {
    (0..20)
        .map(|i| {
            let matchup = if i % 4 == 0 { "LAL vs BOS" } else { "LAL @ GSW" };
            game(
                i * 2,
                10.0 + 2.0 * i as f64,
                4.0 + (i % 3) as f64,
                3.0 + (i % 4) as f64,
                matchup,
            )
        })
        .collect()
}

#[test]
fn build_is_idempotent() {
    let games = twenty_games();
    let defense = fixture_defense();
    let cfg = FeatureConfig::default();
    assert_eq!(
        build_features(&games, &defense, &cfg),
        build_features(&games, &defense, &cfg)
    );
}

#[test]
fn output_is_date_ordered_one_row_per_game() {
    let mut games = twenty_games();
    games.reverse();
    games.swap(3, 11);
    let table = build_features(&games, &TeamDefenseTable::new(), &FeatureConfig::default());
    assert_eq!(table.len(), games.len());
    assert!(
        table
            .rows()
            .windows(2)
            .all(|w| w[0].game_date < w[1].game_date)
    );
}

#[test]
fn rolling_window_uses_partial_then_full_windows() {
    let games = twenty_games();
    let table = build_features(&games, &TeamDefenseTable::new(), &FeatureConfig::default());
    let pts = table.column("PTS").unwrap();
    let roll5 = table.column("PTS_ROLL5").unwrap();

    assert_eq!(roll5[0], pts[0]);
    assert_eq!(roll5[4], pts[..5].iter().sum::<f64>() / 5.0);
    assert_eq!(roll5[5], pts[1..6].iter().sum::<f64>() / 5.0);
    assert_eq!(table.value(0, "PTS_ROLL20"), Some(pts[0]));
}

#[test]
fn pra_is_exact_sum_on_every_row() {
    let table = build_features(&twenty_games(), &fixture_defense(), &FeatureConfig::default());
    for i in 0..table.len() {
        let sum = table.value(i, "PTS").unwrap()
            + table.value(i, "REB").unwrap()
            + table.value(i, "AST").unwrap();
        assert_eq!(table.value(i, PRA), Some(sum));
    }
}

#[test]
fn empty_defense_leaves_opponent_fields_null() {
    let table = build_features(
        &twenty_games(),
        &TeamDefenseTable::new(),
        &FeatureConfig::default(),
    );
    assert_eq!(table.len(), 20);
    for i in 0..table.len() {
        assert!(table.rows()[i].opponent.is_none());
        for col in OPPONENT_COLUMNS {
            assert_eq!(table.value(i, col), None, "row {i} column {col}");
            assert_eq!(table.filled(i, col), Some(0.0));
        }
    }
}

#[test]
fn abbreviation_joins_full_team_name() {
    let mut games = twenty_games();
    games[7].matchup = "LAL vs BOS".to_string();
    let defense = TeamDefenseTable::from_metrics([
        TeamDefenseMetric {
            team_id: None,
            team_name: "Boston Celtics".to_string(),
            def_rating: Some(108.4),
            pace: Some(96.9),
            opp_pts: None,
            opp_reb: None,
            opp_ast: None,
        },
        TeamDefenseMetric {
            team_id: None,
            team_name: "Miami Heat".to_string(),
            def_rating: Some(112.0),
            pace: Some(95.0),
            opp_pts: None,
            opp_reb: None,
            opp_ast: None,
        },
    ]);
    let table = build_features(&games, &defense, &FeatureConfig::default());

    let row = table
        .rows()
        .iter()
        .position(|r| r.game_date == games[7].game_date)
        .unwrap();
    assert_eq!(table.rows()[row].opponent.as_deref(), Some("boston_celtics"));
    assert_eq!(table.value(row, OPP_DEF_RTG), Some(108.4));
    assert_eq!(table.value(row, OPP_PACE), Some(96.9));
    assert_eq!(table.value(row, "HOME"), Some(1.0));

    // GSW is not in this table and must not be guessed
    let gsw = table
        .rows()
        .iter()
        .position(|r| r.opponent.is_none())
        .unwrap();
    assert_eq!(table.value(gsw, OPP_DEF_RTG), None);
    assert_eq!(table.value(gsw, "HOME"), Some(0.0));
}

#[test]
fn opponent_missing_from_table_stays_null() {
    let mut games = twenty_games();
    games[3].matchup = "LAL @ BKN".to_string();
    games[5].matchup = "LAL vs. NOP".to_string();
    let defense = TeamDefenseTable::from_metrics(
        ["Boston Celtics", "Charlotte Hornets", "New York Knicks", "Sacramento Kings"].map(|name| {
            TeamDefenseMetric {
                team_id: None,
                team_name: name.to_string(),
                def_rating: Some(100.0),
                pace: Some(100.0),
                opp_pts: None,
                opp_reb: None,
                opp_ast: None,
            }
        }),
    );
    let table = build_features(&games, &defense, &FeatureConfig::default());
    for game in [&games[3], &games[5]] {
        let row = table
            .rows()
            .iter()
            .position(|r| r.game_date == game.game_date)
            .unwrap();
        assert!(table.rows()[row].opponent.is_none(), "{}", game.matchup);
        assert_eq!(table.value(row, OPP_DEF_RTG), None);
        assert_eq!(table.value(row, OPP_PACE), None);
    }
}

#[test]
fn stats_api_fixture_joins_opponent_allowed_stats() {
    let table = build_features(&twenty_games(), &fixture_defense(), &FeatureConfig::default());
    assert_eq!(table.value(0, OPP_DEF_RTG), Some(110.1));
    assert_eq!(table.value(0, "OPP_PTS_ALLOWED"), Some(107.2));
    assert_eq!(table.value(1, OPP_PACE), Some(99.8));
    assert_eq!(table.value(1, "OPP_AST_ALLOWED"), Some(26.1));
}

#[test]
fn empty_log_gives_empty_table_with_full_schema() {
    let cfg = FeatureConfig::default();
    let table = build_features(&[], &fixture_defense(), &cfg);
    assert!(table.is_empty());
    assert_eq!(table.columns(), cfg.columns().as_slice());
}
