//! Gradient-boosted regression trees for squared-error targets.
//!
//! Each round fits a depth-limited tree to the current residuals on a seeded row
//! and column subsample; leaf weights are shrunk by an L2 term (`lambda`) and the
//! learning rate. The whole fit is a pure function of `(x, y, params, seed)`.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoosterParams {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    pub colsample: f64,
    pub lambda: f64,
    pub min_child_samples: usize,
}

impl Default for BoosterParams {
    fn default() -> Self {
        Self {
            n_estimators: 250,
            learning_rate: 0.08,
            max_depth: 6,
            subsample: 0.8,
            colsample: 0.8,
            lambda: 1.0,
            min_child_samples: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// Flattened tree; node 0 is the root. Rows with `x[feature] < threshold` go left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<Node>,
}

impl RegressionTree {
    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes.get(idx) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let x = row.get(*feature).copied().unwrap_or(0.0);
                    idx = if x < *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match nodes.get(idx) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    pub base_score: f64,
    pub learning_rate: f64,
    pub n_features: usize,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoostedTrees {
    /// `x` is row-major and every row must have the same width.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &BoosterParams, seed: u64) -> Self {
        let n = x.len().min(y.len());
        let n_features = x.first().map(Vec::len).unwrap_or(0);
        let base_score = if n == 0 {
            0.0
        } else {
            y[..n].iter().sum::<f64>() / n as f64
        };
        let mut model = Self {
            base_score,
            learning_rate: params.learning_rate,
            n_features,
            trees: Vec::with_capacity(params.n_estimators),
        };
        if n == 0 {
            return model;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut preds = vec![base_score; n];
        let rows_per_tree = sample_size(n, params.subsample);
        let cols_per_tree = sample_size(n_features, params.colsample);

        for _ in 0..params.n_estimators {
            let residuals: Vec<f64> = (0..n).map(|i| y[i] - preds[i]).collect();

            let mut rows = index::sample(&mut rng, n, rows_per_tree).into_vec();
            rows.sort_unstable();
            let mut cols = if n_features == 0 {
                Vec::new()
            } else {
                index::sample(&mut rng, n_features, cols_per_tree).into_vec()
            };
            cols.sort_unstable();

            let mut builder = TreeBuilder {
                x,
                residuals: &residuals,
                cols: &cols,
                params,
                nodes: Vec::new(),
            };
            builder.build(rows, 0);
            let tree = RegressionTree {
                nodes: builder.nodes,
            };

            for (i, pred) in preds.iter_mut().enumerate() {
                *pred += params.learning_rate * tree.predict(&x[i]);
            }
            model.trees.push(tree);
        }

        model
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let boost: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        self.base_score + self.learning_rate * boost
    }
}

fn sample_size(n: usize, fraction: f64) -> usize {
    if n == 0 {
        return 0;
    }
    ((n as f64 * fraction.clamp(0.0, 1.0)).round() as usize).clamp(1, n)
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    residuals: &'a [f64],
    cols: &'a [usize],
    params: &'a BoosterParams,
    nodes: Vec<Node>,
}

struct SplitChoice {
    feature: usize,
    threshold: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

impl TreeBuilder<'_> {
    fn build(&mut self, rows: Vec<usize>, depth: usize) -> usize {
        let idx = self.nodes.len();
        let grad_sum: f64 = rows.iter().map(|&r| self.residuals[r]).sum();
        self.nodes.push(Node::Leaf {
            value: grad_sum / (rows.len() as f64 + self.params.lambda),
        });

        if depth >= self.params.max_depth || rows.len() < 2 * self.params.min_child_samples.max(1) {
            return idx;
        }
        let Some(split) = self.best_split(&rows, grad_sum) else {
            return idx;
        };

        let left = self.build(split.left, depth + 1);
        let right = self.build(split.right, depth + 1);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&self, rows: &[usize], grad_sum: f64) -> Option<SplitChoice> {
        let lambda = self.params.lambda;
        let min_child = self.params.min_child_samples.max(1);
        let n = rows.len() as f64;
        let parent_score = grad_sum * grad_sum / (n + lambda);

        let mut best: Option<(f64, usize, f64)> = None;
        let mut sorted = rows.to_vec();
        for &feature in self.cols {
            sorted.sort_by(|&a, &b| {
                self.x[a][feature]
                    .total_cmp(&self.x[b][feature])
                    .then(a.cmp(&b))
            });

            let mut left_sum = 0.0;
            for pos in 0..sorted.len() - 1 {
                left_sum += self.residuals[sorted[pos]];
                let here = self.x[sorted[pos]][feature];
                let next = self.x[sorted[pos + 1]][feature];
                if here == next {
                    continue;
                }
                let n_left = pos + 1;
                let n_right = sorted.len() - n_left;
                if n_left < min_child || n_right < min_child {
                    continue;
                }
                let right_sum = grad_sum - left_sum;
                let gain = left_sum * left_sum / (n_left as f64 + lambda)
                    + right_sum * right_sum / (n_right as f64 + lambda)
                    - parent_score;
                if gain > MIN_GAIN && best.is_none_or(|(g, _, _)| gain > g) {
                    best = Some((gain, feature, here + (next - here) / 2.0));
                }
            }
        }

        let (_, feature, threshold) = best?;
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| self.x[r][feature] < threshold);
        Some(SplitChoice {
            feature,
            threshold,
            left,
            right,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64, (i % 3) as f64]).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 10.0 } else { 30.0 }).collect();
        (x, y)
    }

    #[test]
    fn learns_a_step_function() {
        let (x, y) = step_data();
        let params = BoosterParams {
            subsample: 1.0,
            colsample: 1.0,
            ..BoosterParams::default()
        };
        let model = GradientBoostedTrees::fit(&x, &y, &params, 42);
        assert!((model.predict(&[5.0, 0.0]) - 10.0).abs() < 0.5);
        assert!((model.predict(&[35.0, 0.0]) - 30.0).abs() < 0.5);
    }

    #[test]
    fn fit_is_deterministic_for_a_seed() {
        let (x, y) = step_data();
        let params = BoosterParams::default();
        let a = GradientBoostedTrees::fit(&x, &y, &params, 7);
        let b = GradientBoostedTrees::fit(&x, &y, &params, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn depth_is_capped() {
        let (x, y) = step_data();
        let params = BoosterParams {
            max_depth: 2,
            n_estimators: 5,
            ..BoosterParams::default()
        };
        let model = GradientBoostedTrees::fit(&x, &y, &params, 1);
        assert!(model.trees.iter().all(|t| t.depth() <= 2));
    }

    #[test]
    fn constant_target_predicts_the_constant() {
        let x: Vec<Vec<f64>> = (0..6).map(|i| vec![i as f64]).collect();
        let y = vec![4.0; 6];
        let model = GradientBoostedTrees::fit(&x, &y, &BoosterParams::default(), 42);
        assert!((model.predict(&[100.0]) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_yields_zero_model() {
        let model = GradientBoostedTrees::fit(&[], &[], &BoosterParams::default(), 42);
        assert!(model.trees.is_empty());
        assert_eq!(model.predict(&[1.0]), 0.0);
    }
}
