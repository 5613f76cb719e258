//! One boosted-tree model per target statistic, with holdout metrics.

use std::fmt;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::features::{EFF, FeatureTable, PRA, USG};
use crate::model::{BoosterParams, GradientBoostedTrees};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Target {
    Pts,
    Reb,
    Ast,
    Stl,
    Blk,
    Tov,
    Fg3m,
    Pra,
}

impl Target {
    pub const ALL: [Target; 8] = [
        Target::Pts,
        Target::Reb,
        Target::Ast,
        Target::Stl,
        Target::Blk,
        Target::Tov,
        Target::Fg3m,
        Target::Pra,
    ];

    pub fn column(self) -> &'static str {
        match self {
            Target::Pts => "PTS",
            Target::Reb => "REB",
            Target::Ast => "AST",
            Target::Stl => "STL",
            Target::Blk => "BLK",
            Target::Tov => "TOV",
            Target::Fg3m => "FG3M",
            Target::Pra => PRA,
        }
    }

    pub fn from_column(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        Target::ALL.iter().copied().find(|t| t.column() == upper)
    }

    /// Columns that leak this target when features and target come from the same game.
    fn same_game_leaks(self) -> &'static [&'static str] {
        match self {
            Target::Pts | Target::Reb | Target::Ast => &[PRA, EFF],
            Target::Pra => &["PTS", "REB", "AST", EFF],
            Target::Stl | Target::Blk => &[EFF],
            Target::Tov => &[EFF, USG],
            Target::Fg3m => &[],
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingMode {
    /// Features of game t predict the target of game t + 1.
    #[default]
    NextGame,
    /// Features and target from the same game; descriptive only.
    SameGame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SplitStrategy {
    #[default]
    Chronological,
    Random,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub targets: Vec<Target>,
    pub mode: TrainingMode,
    pub split: SplitStrategy,
    pub min_samples: usize,
    pub test_fraction: f64,
    /// Below this many samples the split is random regardless of `split`.
    pub random_split_below: usize,
    pub params: BoosterParams,
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            targets: Target::ALL.to_vec(),
            mode: TrainingMode::NextGame,
            split: SplitStrategy::Chronological,
            min_samples: 5,
            test_fraction: 0.2,
            random_split_below: 10,
            params: BoosterParams::default(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub target: Target,
    pub mode: TrainingMode,
    /// Training-time feature schema, in input order.
    pub features: Vec<String>,
    pub booster: GradientBoostedTrees,
}

impl TrainedModel {
    pub fn schema(&self) -> &[String] {
        &self.features
    }

    /// `row` must already be aligned to `schema()`.
    pub fn predict_aligned(&self, row: &[f64]) -> f64 {
        self.booster.predict(row)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainedModelSet {
    pub models: Vec<TrainedModel>,
}

impl TrainedModelSet {
    pub fn get(&self, target: Target) -> Option<&TrainedModel> {
        self.models.iter().find(|m| m.target == target)
    }

    pub fn targets(&self) -> impl Iterator<Item = Target> + '_ {
        self.models.iter().map(|m| m.target)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
    pub baseline_rmse: f64,
    pub baseline_mae: f64,
    pub train_samples: usize,
    pub test_samples: usize,
    /// Holdout was a random split rather than the most recent games.
    pub weak_validation: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetOutcome {
    Trained(TargetMetrics),
    Skipped(PipelineError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct TargetReport {
    pub target: Target,
    pub outcome: TargetOutcome,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrainingReport {
    pub entries: Vec<TargetReport>,
}

impl TrainingReport {
    pub fn get(&self, target: Target) -> Option<&TargetOutcome> {
        self.entries
            .iter()
            .find(|e| e.target == target)
            .map(|e| &e.outcome)
    }

    pub fn trained(&self) -> impl Iterator<Item = (Target, &TargetMetrics)> + '_ {
        self.entries.iter().filter_map(|e| match &e.outcome {
            TargetOutcome::Trained(m) => Some((e.target, m)),
            TargetOutcome::Skipped(_) => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (Target, &PipelineError)> + '_ {
        self.entries.iter().filter_map(|e| match &e.outcome {
            TargetOutcome::Skipped(err) => Some((e.target, err)),
            TargetOutcome::Trained(_) => None,
        })
    }
}

/// Feature columns a model for `target` sees under `mode`.
pub fn feature_columns(columns: &[String], target: Target, mode: TrainingMode) -> Vec<String> {
    match mode {
        TrainingMode::NextGame => columns.to_vec(),
        TrainingMode::SameGame => {
            let leaks = target.same_game_leaks();
            columns
                .iter()
                .filter(|c| c.as_str() != target.column() && !leaks.contains(&c.as_str()))
                .cloned()
                .collect()
        }
    }
}

struct Samples {
    features: Vec<String>,
    x: Vec<Vec<f64>>,
    y: Vec<f64>,
}

fn samples_for(table: &FeatureTable, target: Target, mode: TrainingMode) -> Option<Samples> {
    let target_col = table.column_index(target.column())?;
    let features = feature_columns(table.columns(), target, mode);
    let idx: Vec<usize> = features
        .iter()
        .filter_map(|f| table.column_index(f))
        .collect();
    let rows = table.rows();
    let pick = |values: &[f64]| idx.iter().map(|&i| values[i]).collect::<Vec<f64>>();

    let (x, y) = match mode {
        TrainingMode::NextGame => rows
            .windows(2)
            .map(|pair| (pick(&pair[0].values), pair[1].values[target_col]))
            .unzip(),
        TrainingMode::SameGame => rows
            .iter()
            .map(|r| (pick(&r.values), r.values[target_col]))
            .unzip(),
    };
    Some(Samples { features, x, y })
}

/// Fits every configured target independently. Targets without enough samples are
/// reported as skipped and left out of the model set.
pub fn train(table: &FeatureTable, cfg: &TrainConfig) -> (TrainedModelSet, TrainingReport) {
    let results: Vec<(TargetReport, Option<TrainedModel>)> = cfg
        .targets
        .par_iter()
        .map(|&target| train_target(table, target, cfg))
        .collect();

    let mut set = TrainedModelSet::default();
    let mut report = TrainingReport::default();
    for (entry, model) in results {
        if let Some(model) = model {
            set.models.push(model);
        }
        report.entries.push(entry);
    }
    info!(
        trained = set.len(),
        skipped = report.entries.len() - set.len(),
        "training finished"
    );
    (set, report)
}

fn train_target(
    table: &FeatureTable,
    target: Target,
    cfg: &TrainConfig,
) -> (TargetReport, Option<TrainedModel>) {
    let skipped = |err: PipelineError| {
        info!(%target, %err, "target not trained");
        (
            TargetReport {
                target,
                outcome: TargetOutcome::Skipped(err),
            },
            None,
        )
    };

    let Some(samples) = samples_for(table, target, cfg.mode) else {
        return skipped(PipelineError::SchemaMismatch(format!(
            "feature table has no {} column",
            target.column()
        )));
    };
    // The threshold counts feature rows; NextGame pairs are one fewer.
    let rows = table.len();
    let required = cfg.min_samples.max(2);
    if rows < required {
        return skipped(PipelineError::InsufficientData {
            target: target.to_string(),
            samples: rows,
            required,
        });
    }
    let n = samples.y.len();
    if n < 2 {
        return skipped(PipelineError::InsufficientData {
            target: target.to_string(),
            samples: n,
            required: 2,
        });
    }

    let (train_idx, test_idx, weak_validation) = split_indices(n, cfg);
    let select = |ids: &[usize]| -> (Vec<Vec<f64>>, Vec<f64>) {
        ids.iter()
            .map(|&i| (samples.x[i].clone(), samples.y[i]))
            .unzip()
    };
    let (x_train, y_train) = select(&train_idx);
    let (x_test, y_test) = select(&test_idx);

    let holdout = GradientBoostedTrees::fit(&x_train, &y_train, &cfg.params, cfg.seed);
    let predicted: Vec<f64> = x_test.iter().map(|row| holdout.predict(row)).collect();
    let train_mean = mean(&y_train);
    let baseline = vec![train_mean; y_test.len()];

    let metrics = TargetMetrics {
        rmse: rmse(&y_test, &predicted),
        mae: mae(&y_test, &predicted),
        r2: r2(&y_test, &predicted),
        baseline_rmse: rmse(&y_test, &baseline),
        baseline_mae: mae(&y_test, &baseline),
        train_samples: y_train.len(),
        test_samples: y_test.len(),
        weak_validation,
    };
    debug!(
        %target,
        rmse = metrics.rmse,
        mae = metrics.mae,
        r2 = metrics.r2,
        train = metrics.train_samples,
        test = metrics.test_samples,
        "holdout evaluated"
    );

    let booster = GradientBoostedTrees::fit(&samples.x, &samples.y, &cfg.params, cfg.seed);
    let model = TrainedModel {
        target,
        mode: cfg.mode,
        features: samples.features,
        booster,
    };
    (
        TargetReport {
            target,
            outcome: TargetOutcome::Trained(metrics),
        },
        Some(model),
    )
}

/// Returns sorted train and test indices and whether the split was random.
fn split_indices(n: usize, cfg: &TrainConfig) -> (Vec<usize>, Vec<usize>, bool) {
    let n_test = ((n as f64 * cfg.test_fraction).ceil() as usize)
        .clamp(1, n.saturating_sub(1).max(1));
    let random = cfg.split == SplitStrategy::Random || n < cfg.random_split_below;
    if !random {
        let cut = n - n_test;
        return ((0..cut).collect(), (cut..n).collect(), false);
    }

    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    order.shuffle(&mut rng);
    let mut test = order[..n_test].to_vec();
    let mut train = order[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    (train, test, true)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    let sq: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .collect();
    mean(&sq).sqrt()
}

pub fn mae(actual: &[f64], predicted: &[f64]) -> f64 {
    let abs: Vec<f64> = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .collect();
    mean(&abs)
}

/// Coefficient of determination. A constant `actual` scores 1.0 when predicted
/// exactly and 0.0 otherwise.
pub fn r2(actual: &[f64], predicted: &[f64]) -> f64 {
    let m = mean(actual);
    let ss_tot: f64 = actual.iter().map(|a| (a - m).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return if ss_res == 0.0 { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}
