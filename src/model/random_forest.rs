//! Random forest regression
//!
//! Bagged CART trees: every tree is grown on a bootstrap sample of the
//! training rows, each split picks the feature/threshold with the largest
//! reduction in squared error, and leaves predict the mean target of their
//! samples. The forest prediction is the mean over trees.
//!
//! Trees are grown in parallel with Rayon. Each tree seeds its own RNG from
//! the base seed and its index, so a fitted forest depends only on the seed.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::{check_training_set, FeatureRow, Regressor};
use crate::config::ModelConfig;
use crate::error::ModelError;

const N_FEATURES: usize = 3;

#[derive(Debug, Clone)]
pub struct RandomForestRegressor {
    n_estimators: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    seed: u64,
    trees: Vec<Tree>,
}

impl RandomForestRegressor {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        Self {
            n_estimators: n_estimators.max(1),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed,
            trees: Vec::new(),
        }
    }

    pub fn from_config(config: &ModelConfig, seed: u64) -> Self {
        Self {
            n_estimators: config.n_estimators.max(1),
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split.max(2),
            min_samples_leaf: config.min_samples_leaf.max(1),
            seed,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth.unwrap_or(usize::MAX),
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &[FeatureRow], y: &[f64]) -> Result<(), ModelError> {
        check_training_set(x, y)?;
        if y.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::Numerical("non-finite training target".to_string()));
        }

        let params = self.tree_params();
        let base_seed = self.seed;
        let n = x.len();

        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                Tree::grow(x, y, sample, &params)
            })
            .collect();

        Ok(())
    }

    fn predict(&self, x: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        let n_trees = self.trees.len() as f64;
        Ok(x
            .par_iter()
            .map(|row| self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / n_trees)
            .collect())
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }
}

// ============================================================================
// Regression tree
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct TreeParams {
    max_depth: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
}

#[derive(Debug, Clone)]
enum Node {
    Leaf(f64),
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Flat node arena, root at index 0
#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl Tree {
    fn grow(x: &[FeatureRow], y: &[f64], sample: Vec<usize>, params: &TreeParams) -> Self {
        let mut tree = Tree { nodes: Vec::new() };
        tree.build(x, y, sample, 0, params);
        tree
    }

    fn build(
        &mut self,
        x: &[FeatureRow],
        y: &[f64],
        sample: Vec<usize>,
        depth: usize,
        params: &TreeParams,
    ) -> usize {
        let node_idx = self.nodes.len();
        let leaf_value = sample.iter().map(|&i| y[i]).sum::<f64>() / sample.len() as f64;
        self.nodes.push(Node::Leaf(leaf_value));

        if depth >= params.max_depth || sample.len() < params.min_samples_split {
            return node_idx;
        }

        let Some(split) = best_split(x, y, &sample, params.min_samples_leaf) else {
            return node_idx;
        };

        let (left_sample, right_sample): (Vec<usize>, Vec<usize>) = sample
            .into_iter()
            .partition(|&i| x[i][split.feature] <= split.threshold);

        // Adjacent floats can put the midpoint on the upper value
        if left_sample.is_empty() || right_sample.is_empty() {
            return node_idx;
        }

        let left = self.build(x, y, left_sample, depth + 1, params);
        let right = self.build(x, y, right_sample, depth + 1, params);
        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn predict(&self, row: &FeatureRow) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf(value) => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    // NaN features go right, matching "not <= threshold"
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Best variance-reduction split over all features, `None` if nothing improves
fn best_split(
    x: &[FeatureRow],
    y: &[f64],
    sample: &[usize],
    min_samples_leaf: usize,
) -> Option<SplitCandidate> {
    let n = sample.len();
    let total_sum: f64 = sample.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = sample.iter().map(|&i| y[i] * y[i]).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;
    if parent_sse <= 1e-12 {
        return None;
    }

    let mut best: Option<SplitCandidate> = None;
    let mut order: Vec<usize> = sample.to_vec();

    for feature in 0..N_FEATURES {
        order.sort_by(|&a, &b| {
            x[a][feature]
                .partial_cmp(&x[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for k in 0..n - 1 {
            let target = y[order[k]];
            left_sum += target;
            left_sq += target * target;

            let left_n = k + 1;
            let right_n = n - left_n;
            if left_n < min_samples_leaf || right_n < min_samples_leaf {
                continue;
            }

            let here = x[order[k]][feature];
            let next = x[order[k + 1]][feature];
            if here.partial_cmp(&next) != Some(std::cmp::Ordering::Less) {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / left_n as f64)
                + (right_sq - right_sum * right_sum / right_n as f64);
            let gain = parent_sse - sse;

            if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(SplitCandidate {
                    feature,
                    threshold: here + (next - here) / 2.0,
                    gain,
                });
            }
        }
    }

    best
}
