//! Random forest regression with bootstrap sampling and variance-reduction splits.
//!
//! Trees are grown independently on rayon workers. Each tree owns a
//! generator seeded from the forest seed plus its index, so the fitted forest
//! does not depend on scheduling.

use rand::prelude::*;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analytics::stats::{mean, r_squared};
use crate::error::{PipelineError, Result};

/// Nodes with fewer samples than this become leaves
const MIN_SAMPLES_SPLIT: usize = 2;

/// Node impurity at or below this value counts as pure
const PURE_EPSILON: f64 = 1e-14;

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// A single regression tree stored as a node arena
#[derive(Debug, Clone, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { value } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }
}

/// Best split found for a node
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Sum of squared errors of both children together
    children_sse: f64,
    left: Vec<usize>,
    right: Vec<usize>,
}

fn sse(indices: &[usize], target: &[f64]) -> f64 {
    let n = indices.len() as f64;
    let (sum, sum_sq) = indices
        .iter()
        .fold((0.0, 0.0), |(s, sq), &i| (s + target[i], sq + target[i] * target[i]));
    (sum_sq - sum * sum / n).max(0.0)
}

fn best_split(
    indices: &[usize],
    rows: &[Vec<f64>],
    target: &[f64],
    features: &[usize],
) -> Option<SplitCandidate> {
    let n = indices.len();
    let total_sum: f64 = indices.iter().map(|&i| target[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| target[i] * target[i]).sum();

    let mut best: Option<(usize, f64, f64)> = None;
    let mut sorted = indices.to_vec();

    for &feature in features {
        sorted.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;
        for pos in 0..n - 1 {
            let y = target[sorted[pos]];
            left_sum += y;
            left_sq += y * y;

            let here = rows[sorted[pos]][feature];
            let next = rows[sorted[pos + 1]][feature];
            if here == next {
                continue;
            }

            let n_left = (pos + 1) as f64;
            let n_right = (n - pos - 1) as f64;
            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let children = (left_sq - left_sum * left_sum / n_left)
                + (right_sq - right_sum * right_sum / n_right);

            if best.is_none_or(|(_, _, b)| children < b) {
                let mut threshold = here + (next - here) / 2.0;
                if threshold >= next {
                    threshold = here;
                }
                best = Some((feature, threshold, children));
            }
        }
    }

    let (feature, threshold, children_sse) = best?;
    let (left, right) = indices
        .iter()
        .partition(|&&i| rows[i][feature] <= threshold);
    Some(SplitCandidate {
        feature,
        threshold,
        children_sse: children_sse.max(0.0),
        left,
        right,
    })
}

/// Grow one tree on a bootstrap sample; returns the tree and its impurity decreases
fn grow_tree(rows: &[Vec<f64>], target: &[f64], seed: u64) -> (Tree, Vec<f64>) {
    let n = rows.len();
    let n_features = rows[0].len();
    let mut rng = StdRng::seed_from_u64(seed);

    let sample: Vec<usize> = (0..n).map(|_| rng.random_range(0..n)).collect();
    let mut importances = vec![0.0; n_features];
    let mut nodes = vec![Node::Leaf { value: 0.0 }];
    let mut stack = vec![(0usize, sample)];

    while let Some((slot, indices)) = stack.pop() {
        let node_sse = sse(&indices, target);
        let value = mean(&indices.iter().map(|&i| target[i]).collect::<Vec<_>>());

        if indices.len() < MIN_SAMPLES_SPLIT || node_sse <= PURE_EPSILON {
            nodes[slot] = Node::Leaf { value };
            continue;
        }

        // All features are considered, in a per-node random order
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut rng);

        let Some(split) = best_split(&indices, rows, target, &features) else {
            nodes[slot] = Node::Leaf { value };
            continue;
        };

        importances[split.feature] += node_sse - split.children_sse;

        let left = nodes.len();
        let right = left + 1;
        nodes.push(Node::Leaf { value: 0.0 });
        nodes.push(Node::Leaf { value: 0.0 });
        nodes[slot] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        stack.push((right, split.right));
        stack.push((left, split.left));
    }

    (Tree { nodes }, importances)
}

fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}

/// A fitted forest
#[derive(Debug, Clone, PartialEq)]
pub struct RandomForest {
    trees: Vec<Tree>,
    /// Mean impurity decrease per feature, summing to 1 unless no tree split
    pub feature_importances: Vec<f64>,
}

impl RandomForest {
    #[must_use]
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

/// Summary of a forest fit for the analytics report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestFit {
    pub n_estimators: usize,
    pub seed: u64,
    /// R² on the training rows
    pub r_squared: f64,
    pub feature_importances: Vec<f64>,
}

/// Fit `n_estimators` trees, tree `i` seeded with `seed + i`
///
/// Trees are grown on the current rayon pool; wrap the call in
/// `ThreadPool::install` to bound the worker count.
pub fn fit_forest(
    rows: &[Vec<f64>],
    target: &[f64],
    n_estimators: usize,
    seed: u64,
) -> Result<RandomForest> {
    if rows.is_empty() || rows.len() != target.len() || n_estimators == 0 {
        return Err(PipelineError::Analytics(format!(
            "random forest needs matching non-empty inputs and at least one tree, got {} rows, {} targets, {n_estimators} trees",
            rows.len(),
            target.len()
        )));
    }

    let grown: Vec<(Tree, Vec<f64>)> = (0..n_estimators)
        .into_par_iter()
        .map(|i| grow_tree(rows, target, seed.wrapping_add(i as u64)))
        .collect();

    let n_features = rows[0].len();
    let mut feature_importances = vec![0.0; n_features];
    let mut trees = Vec::with_capacity(grown.len());
    for (tree, mut importances) in grown {
        normalize(&mut importances);
        for (total, v) in feature_importances.iter_mut().zip(&importances) {
            *total += v;
        }
        trees.push(tree);
    }
    normalize(&mut feature_importances);

    Ok(RandomForest {
        trees,
        feature_importances,
    })
}

/// Fit a forest and score it on its own training rows
pub fn fit_and_score(
    rows: &[Vec<f64>],
    target: &[f64],
    n_estimators: usize,
    seed: u64,
) -> Result<ForestFit> {
    let forest = fit_forest(rows, target, n_estimators, seed)?;
    let predicted: Vec<f64> = rows.iter().map(|r| forest.predict(r)).collect();

    Ok(ForestFit {
        n_estimators: forest.n_trees(),
        seed,
        r_squared: r_squared(target, &predicted),
        feature_importances: forest.feature_importances,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_data() -> (Vec<Vec<f64>>, Vec<f64>) {
        let rows: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![f64::from(i), f64::from(i % 3)])
            .collect();
        let target = rows
            .iter()
            .map(|r| if r[0] < 10.0 { 1.0 } else { 5.0 })
            .collect();
        (rows, target)
    }

    #[test]
    fn test_forest_fits_step_function() {
        let (rows, target) = step_data();
        let fit = fit_and_score(&rows, &target, 25, 42).unwrap();
        assert_eq!(fit.n_estimators, 25);
        assert!(fit.r_squared > 0.9, "r2 = {}", fit.r_squared);

        let total: f64 = fit.feature_importances.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(fit.feature_importances[0] > fit.feature_importances[1]);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let (rows, target) = step_data();
        let a = fit_forest(&rows, &target, 10, 3).unwrap();
        let b = fit_forest(&rows, &target, 10, 3).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_forest_independent_of_pool_size() {
        let (rows, target) = step_data();
        let fit_on = |threads: usize| {
            let pool = rayon::ThreadPoolBuilder::new().num_threads(threads).build().unwrap();
            pool.install(|| fit_forest(&rows, &target, 12, 9).unwrap())
        };
        assert_eq!(fit_on(1), fit_on(4));
    }

    #[test]
    fn test_single_tree_memorizes_pure_leaves() {
        let rows = vec![vec![1.0], vec![2.0], vec![3.0]];
        let target = vec![1.0, 2.0, 3.0];
        let (tree, _) = grow_tree(&rows, &target, 0);
        for row in &rows {
            let p = tree.predict(row);
            assert!(target.contains(&p));
        }
    }

    #[test]
    fn test_constant_target() {
        let rows = vec![vec![1.0], vec![2.0]];
        let fit = fit_and_score(&rows, &[4.0, 4.0], 5, 1).unwrap();
        assert_eq!(fit.r_squared, 1.0);
        assert_eq!(fit.feature_importances, vec![0.0]);
    }
}
