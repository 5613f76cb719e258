use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::features::FeatureTable;
use crate::records::GameRecord;
use crate::train::{Target, TrainedModelSet};

const PCT_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatProjection {
    Predicted(f64),
    /// No model, or no feature row to predict from.
    Unavailable,
}

impl StatProjection {
    pub fn value(self) -> Option<f64> {
        match self {
            StatProjection::Predicted(v) => Some(v),
            StatProjection::Unavailable => None,
        }
    }

    pub fn is_available(self) -> bool {
        matches!(self, StatProjection::Predicted(_))
    }
}

/// Next-game projection for every target. PRA is always PTS + REB + AST.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    stats: BTreeMap<Target, StatProjection>,
}

impl Projection {
    pub fn get(&self, target: Target) -> StatProjection {
        self.stats
            .get(&target)
            .copied()
            .unwrap_or(StatProjection::Unavailable)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Target, StatProjection)> + '_ {
        self.stats.iter().map(|(t, p)| (*t, *p))
    }

    pub fn available(&self) -> usize {
        self.stats.values().filter(|p| p.is_available()).count()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlignedRow {
    pub values: Vec<f64>,
    /// Expected columns absent from the input, filled with 0.
    pub missing: Vec<String>,
    /// Input columns the model never saw, dropped.
    pub dropped: Vec<String>,
}

/// Reorders `values` (named by `columns`) to exactly `expected`.
pub fn align_features(expected: &[String], columns: &[String], values: &[f64]) -> AlignedRow {
    let by_name: HashMap<&str, f64> = columns
        .iter()
        .map(String::as_str)
        .zip(values.iter().copied())
        .collect();
    let mut missing = Vec::new();
    let aligned = expected
        .iter()
        .map(|name| match by_name.get(name.as_str()) {
            Some(v) => *v,
            None => {
                missing.push(name.clone());
                0.0
            }
        })
        .collect();
    let dropped = columns
        .iter()
        .filter(|c| !expected.contains(c))
        .cloned()
        .collect();
    AlignedRow {
        values: aligned,
        missing,
        dropped,
    }
}

/// Projects the next game from the most recent feature row.
pub fn predict(models: &TrainedModelSet, table: &FeatureTable) -> Projection {
    let last = table.last_row();
    let mut stats = BTreeMap::new();

    for target in Target::ALL {
        if target == Target::Pra {
            continue;
        }
        let projection = match (models.get(target), last) {
            (Some(model), Some(row)) => {
                let aligned = align_features(model.schema(), table.columns(), &row.values);
                if !aligned.missing.is_empty() || !aligned.dropped.is_empty() {
                    debug!(
                        %target,
                        missing = ?aligned.missing,
                        dropped = ?aligned.dropped,
                        "realigned features to training schema"
                    );
                }
                StatProjection::Predicted(model.predict_aligned(&aligned.values).max(0.0))
            }
            (None, _) => {
                debug!(%target, "no trained model");
                StatProjection::Unavailable
            }
            (Some(_), None) => StatProjection::Unavailable,
        };
        stats.insert(target, projection);
    }

    let pra = [Target::Pts, Target::Reb, Target::Ast]
        .iter()
        .map(|t| stats.get(t).and_then(|p| p.value()))
        .try_fold(0.0, |acc, v| v.map(|v| acc + v));
    stats.insert(
        Target::Pra,
        pra.map_or(StatProjection::Unavailable, StatProjection::Predicted),
    );

    Projection { stats }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatAccuracy {
    pub target: Target,
    pub predicted: f64,
    pub actual: f64,
    pub abs_error: f64,
    pub pct_error: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccuracyReport {
    pub stats: Vec<StatAccuracy>,
    pub mae: f64,
    pub mean_pct_error: f64,
}

/// Compares a projection with what actually happened; unavailable stats are skipped.
pub fn accuracy(projection: &Projection, actual: &GameRecord) -> AccuracyReport {
    let stats: Vec<StatAccuracy> = projection
        .iter()
        .filter_map(|(target, p)| {
            let predicted = p.value()?;
            let actual = actual_value(actual, target);
            let abs_error = (predicted - actual).abs();
            Some(StatAccuracy {
                target,
                predicted,
                actual,
                abs_error,
                pct_error: abs_error / (actual + PCT_EPSILON) * 100.0,
            })
        })
        .collect();

    let n = stats.len().max(1) as f64;
    let mae = stats.iter().map(|s| s.abs_error).sum::<f64>() / n;
    let mean_pct_error = stats.iter().map(|s| s.pct_error).sum::<f64>() / n;
    AccuracyReport {
        stats,
        mae,
        mean_pct_error,
    }
}

fn actual_value(game: &GameRecord, target: Target) -> f64 {
    match target {
        Target::Pts => game.pts,
        Target::Reb => game.reb,
        Target::Ast => game.ast,
        Target::Stl => game.stl,
        Target::Blk => game.blk,
        Target::Tov => game.tov,
        Target::Fg3m => game.fg3m,
        Target::Pra => game.pts + game.reb + game.ast,
    }
}
