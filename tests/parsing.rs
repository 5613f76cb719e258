use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;

use propcast::records::normalize_game_log;
use propcast::season::Season;
use propcast::sources::{
    GameLogSource, JsonDirSource, TeamDefenseSource, load_game_log, resolve_player,
};
use propcast::stats_api::{parse_game_log_json, parse_players_json, parse_team_stats_json};

fn fixtures_dir() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path
}

fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixtures_dir().join(name)).expect("fixture file should be readable")
}

#[test]
fn parses_player_game_log_fixture() {
    let games = parse_game_log_json(&read_fixture("playergamelog_2544_2024-25.json"))
        .expect("fixture should parse");
    assert_eq!(games.len(), 20);

    // newest first, as the endpoint returns it
    assert_eq!(games[0].game_date, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
    assert_eq!(games[0].matchup, "LAL @ GSW");

    let oldest = games.last().unwrap();
    assert_eq!(oldest.game_date, NaiveDate::from_ymd_opt(2024, 10, 22).unwrap());
    assert_eq!(oldest.game_id, "0022400000");
    assert_eq!(oldest.minutes, 32.25);
    assert_eq!(oldest.pts, 10.0);
    assert_eq!(oldest.reb, 5.0);
    assert_eq!(oldest.ast, 6.0);
    assert!(oldest.matchup().unwrap().home);
}

#[test]
fn normalized_log_is_ascending() {
    let games = parse_game_log_json(&read_fixture("playergamelog_2544_2024-25.json")).unwrap();
    let games = normalize_game_log(games, Some(5));
    assert_eq!(games.len(), 5);
    assert!(games.windows(2).all(|w| w[0].game_date < w[1].game_date));
    assert_eq!(games[4].game_date, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
}

#[test]
fn parses_team_stat_fixtures() {
    let advanced = parse_team_stats_json(&read_fixture("leaguedashteamstats_advanced_2024-25.json"))
        .expect("fixture should parse");
    assert_eq!(advanced.len(), 9);
    let bos = advanced.iter().find(|m| m.team_name == "Boston Celtics").unwrap();
    assert_eq!(bos.team_id, Some(1610612738));
    assert_eq!(bos.def_rating, Some(110.1));
    assert_eq!(bos.pace, Some(97.2));
    assert_eq!(bos.opp_pts, None);

    let opponent = parse_team_stats_json(&read_fixture("leaguedashteamstats_opponent_2024-25.json"))
        .expect("fixture should parse");
    let bos = opponent.iter().find(|m| m.team_name == "Boston Celtics").unwrap();
    assert_eq!(bos.opp_pts, Some(107.2));
    assert_eq!(bos.def_rating, None);
}

#[test]
fn parses_player_directory_fixture() {
    let players =
        parse_players_json(&read_fixture("commonallplayers.json")).expect("fixture should parse");
    assert_eq!(players.len(), 6);
    let payton = players.iter().find(|p| p.id == 56).unwrap();
    assert!(!payton.is_active);
    assert_eq!(players[2].full_name, "Nikola Jokić");
}

#[test]
fn json_dir_source_reads_fixtures() {
    let source = JsonDirSource::new(fixtures_dir());
    let season: Season = "2024-25".parse().unwrap();

    let games = source.game_log(2544, &season).expect("game log should load");
    assert_eq!(games.len(), 20);

    let defense = source.team_defense(&season).expect("team defense should load");
    assert_eq!(defense.len(), 9);
    let (key, bos) = defense.resolve("BOS", 0.5).unwrap();
    assert_eq!(key, "boston_celtics");
    assert_eq!(bos.def_rating, Some(110.1));
    assert_eq!(bos.opp_ast, Some(23.9));
    assert!(defense.resolve("SAS", 0.5).is_none());

    assert!(source.game_log(2544, &season.previous()).is_err());
    assert!(load_game_log(&source, 2544, &season.previous(), Some(20)).is_empty());
}

#[test]
fn player_resolution_against_directory_fixture() {
    let source = JsonDirSource::new(fixtures_dir());
    assert_eq!(resolve_player(&source, "LeBron James", 0.6).unwrap().id, 2544);
    assert_eq!(resolve_player(&source, "lebron jamse", 0.6).unwrap().id, 2544);
    assert_eq!(resolve_player(&source, "Nikola Jokic", 0.6).unwrap().id, 203999);
    assert_eq!(resolve_player(&source, "Gary Payton", 0.6).unwrap().id, 56);
    assert!(resolve_player(&source, "Wilt Chamberlain", 0.6).is_err());
}
