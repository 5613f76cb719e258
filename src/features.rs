//! Game log + team-defense table -> numeric feature table.
//!
//! Derivations run on a nullable column-major frame; nulls are only replaced by 0
//! when rows are materialised, and each row remembers which cells were null.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::records::{GameRecord, Stat, TeamDefenseTable};

pub const USG: &str = "USG";
pub const PRA: &str = "PRA";
pub const EFF: &str = "EFF";
pub const OPP_DEF_RTG: &str = "OPP_DEF_RTG";
pub const OPP_PACE: &str = "OPP_PACE";
pub const OPP_PTS_ALLOWED: &str = "OPP_PTS_ALLOWED";
pub const OPP_REB_ALLOWED: &str = "OPP_REB_ALLOWED";
pub const OPP_AST_ALLOWED: &str = "OPP_AST_ALLOWED";
pub const REST_DAYS: &str = "REST_DAYS";
pub const HOME: &str = "HOME";

pub const OPPONENT_COLUMNS: [&str; 5] = [
    OPP_DEF_RTG,
    OPP_PACE,
    OPP_PTS_ALLOWED,
    OPP_REB_ALLOWED,
    OPP_AST_ALLOWED,
];

const FREE_THROW_POSSESSION_WEIGHT: f64 = 0.44;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub windows: Vec<usize>,
    pub tracked: Vec<Stat>,
    /// Minimum similarity for a fuzzy opponent match.
    pub team_similarity_floor: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            windows: vec![5, 10, 20],
            tracked: vec![
                Stat::Pts,
                Stat::Reb,
                Stat::Ast,
                Stat::Stl,
                Stat::Blk,
                Stat::Tov,
                Stat::FgPct,
                Stat::Fg3m,
                Stat::Min,
            ],
            team_similarity_floor: 0.5,
        }
    }
}

impl FeatureConfig {
    /// Column set produced by `build_features` for this configuration, in order.
    pub fn columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = Stat::ALL.iter().map(|s| s.column().to_string()).collect();
        for &w in &self.windows {
            for stat in &self.tracked {
                cols.push(rolling_column(*stat, w));
            }
        }
        cols.extend([USG, PRA, EFF].map(String::from));
        cols.extend(OPPONENT_COLUMNS.map(String::from));
        cols.extend([REST_DAYS, HOME].map(String::from));
        cols
    }
}

pub fn rolling_column(stat: Stat, window: usize) -> String {
    format!("{}_ROLL{}", stat.column(), window)
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub game_date: NaiveDate,
    /// Canonical key of the opponent whose defensive metrics were joined.
    pub opponent: Option<String>,
    pub values: Vec<f64>,
    nulls: Vec<bool>,
}

impl FeatureRow {
    pub fn new(game_date: NaiveDate, values: Vec<f64>) -> Self {
        let nulls = vec![false; values.len()];
        Self {
            game_date,
            opponent: None,
            values,
            nulls,
        }
    }

    pub fn was_null(&self, col: usize) -> bool {
        self.nulls.get(col).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    /// Builds a table from arbitrary columns; every row must match the column count.
    pub fn new(columns: Vec<String>, rows: Vec<FeatureRow>) -> Result<Self, PipelineError> {
        if let Some(bad) = rows.iter().find(|r| r.values.len() != columns.len()) {
            return Err(PipelineError::SchemaMismatch(format!(
                "row for {} has {} values, expected {}",
                bad.game_date,
                bad.values.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Cell value, or `None` if the cell was null before the final 0-fill.
    pub fn value(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.column_index(column)?;
        let r = self.rows.get(row)?;
        if r.was_null(col) {
            None
        } else {
            r.values.get(col).copied()
        }
    }

    /// Cell value after the 0-fill.
    pub fn filled(&self, row: usize, column: &str) -> Option<f64> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.values.get(col).copied()
    }

    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let col = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r.values[col]).collect())
    }

    pub fn last_row(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    /// First `n` rows, same columns.
    pub fn head(&self, n: usize) -> FeatureTable {
        Self {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }
}

struct Frame {
    names: Vec<String>,
    cols: Vec<Vec<Option<f64>>>,
}

impl Frame {
    fn with_capacity(n: usize) -> Self {
        Self {
            names: Vec::with_capacity(n),
            cols: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, name: impl Into<String>, col: Vec<Option<f64>>) {
        self.names.push(name.into());
        self.cols.push(col);
    }

    fn get(&self, name: &str) -> Option<&[Option<f64>]> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(self.cols[idx].as_slice())
    }

    fn values(&self, name: &str, n: usize) -> Vec<Option<f64>> {
        self.get(name).map(<[_]>::to_vec).unwrap_or_else(|| vec![None; n])
    }
}

pub fn build_features(
    games: &[GameRecord],
    defense: &TeamDefenseTable,
    cfg: &FeatureConfig,
) -> FeatureTable {
    let mut sorted: Vec<&GameRecord> = games.iter().collect();
    sorted.sort_by_key(|g| g.game_date);
    let n = sorted.len();

    let mut frame = Frame::with_capacity(cfg.columns().len());
    for stat in Stat::ALL {
        frame.push(stat.column(), sorted.iter().map(|g| g.stat(stat)).collect());
    }

    for &w in &cfg.windows {
        for &stat in &cfg.tracked {
            let raw = frame.values(stat.column(), n);
            frame.push(rolling_column(stat, w), rolling_mean(&raw, w));
        }
    }

    frame.push(USG, usage_rate(&sorted));

    let pts = frame.values(Stat::Pts.column(), n);
    let reb = frame.values(Stat::Reb.column(), n);
    let ast = frame.values(Stat::Ast.column(), n);
    let stl = frame.values(Stat::Stl.column(), n);
    let blk = frame.values(Stat::Blk.column(), n);
    let tov = frame.values(Stat::Tov.column(), n);
    let pra: Vec<Option<f64>> = (0..n)
        .map(|i| Some(pts[i]? + reb[i]? + ast[i]?))
        .collect();
    let eff: Vec<Option<f64>> = (0..n)
        .map(|i| Some(pts[i]? + reb[i]? + ast[i]? + stl[i]? + blk[i]? - tov[i]?))
        .collect();
    frame.push(PRA, pra);
    frame.push(EFF, eff);

    let mut opponents: Vec<Option<String>> = Vec::with_capacity(n);
    let mut opp_cols: [Vec<Option<f64>>; 5] = Default::default();
    let mut home = Vec::with_capacity(n);
    let mut unmatched = 0usize;
    for game in &sorted {
        let matchup = game.matchup();
        home.push(matchup.as_ref().map(|m| if m.home { 1.0 } else { 0.0 }));
        let resolved = matchup
            .as_ref()
            .and_then(|m| defense.resolve(&m.opponent, cfg.team_similarity_floor));
        match resolved {
            Some((key, metric)) => {
                opponents.push(Some(key.to_string()));
                let fields = [
                    metric.def_rating,
                    metric.pace,
                    metric.opp_pts,
                    metric.opp_reb,
                    metric.opp_ast,
                ];
                for (col, v) in opp_cols.iter_mut().zip(fields) {
                    col.push(v);
                }
            }
            None => {
                if !defense.is_empty() {
                    debug!(matchup = %game.matchup, date = %game.game_date, "no opponent metrics");
                }
                unmatched += 1;
                opponents.push(None);
                for col in opp_cols.iter_mut() {
                    col.push(None);
                }
            }
        }
    }
    if unmatched > 0 && !defense.is_empty() {
        warn!(unmatched, games = n, "opponent join left rows without defensive metrics");
    }
    for (name, col) in OPPONENT_COLUMNS.into_iter().zip(opp_cols) {
        frame.push(name, col);
    }

    let rest: Vec<Option<f64>> = (0..n)
        .map(|i| {
            let prev = sorted.get(i.checked_sub(1)?)?;
            Some((sorted[i].game_date - prev.game_date).num_days() as f64)
        })
        .collect();
    frame.push(REST_DAYS, rest);
    frame.push(HOME, home);

    let rows = (0..n)
        .map(|i| {
            let nulls: Vec<bool> = frame.cols.iter().map(|c| c[i].is_none()).collect();
            let values: Vec<f64> = frame.cols.iter().map(|c| c[i].unwrap_or(0.0)).collect();
            FeatureRow {
                game_date: sorted[i].game_date,
                opponent: opponents[i].clone(),
                values,
                nulls,
            }
        })
        .collect();

    FeatureTable {
        columns: frame.names,
        rows,
    }
}

/// Trailing mean over the last `window` values including the current one; null
/// entries are skipped and a window with no values stays null.
fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[start..=i].iter().flatten().copied().collect();
            if present.is_empty() {
                None
            } else {
                Some(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect()
}

/// `(FGA + 0.44 * FTA + TOV) / MIN * 100`. Games without minutes take the mean of
/// the games that have them, or 0 when none do.
fn usage_rate(games: &[&GameRecord]) -> Vec<Option<f64>> {
    let raw: Vec<Option<f64>> = games
        .iter()
        .map(|g| {
            (g.minutes > 0.0).then(|| {
                (g.fga + FREE_THROW_POSSESSION_WEIGHT * g.fta + g.tov) / g.minutes * 100.0
            })
        })
        .collect();
    let present: Vec<f64> = raw.iter().flatten().copied().collect();
    let missing = raw.len() - present.len();
    if missing == 0 {
        return raw;
    }
    let fallback = if present.is_empty() {
        0.0
    } else {
        present.iter().sum::<f64>() / present.len() as f64
    };
    debug!(missing, fallback, "usage rate fallback for games without minutes");
    raw.into_iter().map(|v| Some(v.unwrap_or(fallback))).collect()
}

/// Per-stat mean over the log, skipping games where the stat is missing.
pub fn season_averages(games: &[GameRecord]) -> BTreeMap<Stat, f64> {
    let mut out = BTreeMap::new();
    for stat in Stat::ALL {
        let values: Vec<f64> = games.iter().filter_map(|g| g.stat(stat)).collect();
        if !values.is_empty() {
            out.insert(stat, values.iter().sum::<f64>() / values.len() as f64);
        }
    }
    out
}
