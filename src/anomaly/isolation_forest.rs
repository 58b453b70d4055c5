//! Isolation Forest
//!
//! An ensemble of random binary trees, each grown on a subsample without
//! replacement. Points that are isolated in few splits are anomalous.
//!
//! - Subsample size `ψ = min(max_samples, n)`, depth limit `ceil(log2 ψ)`
//! - Split: random feature with a non-constant range, threshold uniform in `[min, max)`
//! - Path length at a leaf holding `m` points adds `c(m)`, the expected
//!   unsuccessful-search depth of a BST with `m` keys
//! - Anomaly score `s = 2^(-E[h(x)] / c(ψ))`; `score_samples` returns `-s`
//! - Offset: `contamination` quantile of the training `score_samples`
//!
//! Trees are grown in parallel with rayon. Each tree seeds its own `StdRng`
//! from the base seed and its index, so the fitted forest is identical
//! regardless of thread scheduling.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use statrs::consts::EULER_MASCHERONI;
use tracing::debug;

use super::{contamination_offset, validate_params, validate_samples, AnomalyError, FitParams, OutlierModel};

/// Average path length of an unsuccessful BST search over `n` points.
///
/// `c(n) = 2·H(n-1) - 2(n-1)/n` with `H(i) ≈ ln(i) + γ`; `c(1) = 0`, `c(2) = 1`.
#[allow(clippy::cast_precision_loss)]
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Per-tree seed; tree 0 uses the base seed unchanged.
fn tree_seed(base: u64, index: usize) -> u64 {
    base ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

// ============================================================================
// Tree
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// One isolation tree, stored as a flat node arena rooted at index 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow<R: Rng>(data: &[Vec<f64>], rows: Vec<usize>, n_features: usize, max_depth: usize, rng: &mut R) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(data, rows, n_features, 0, max_depth, rng);
        tree
    }

    fn grow_node<R: Rng>(
        &mut self,
        data: &[Vec<f64>],
        rows: Vec<usize>,
        n_features: usize,
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> usize {
        let idx = self.nodes.len();
        if depth >= max_depth || rows.len() <= 1 {
            self.nodes.push(Node::Leaf { size: rows.len() });
            return idx;
        }
        let Some((feature, lo, hi)) = pick_split_feature(data, &rows, n_features, rng) else {
            // Every feature is constant over these rows
            self.nodes.push(Node::Leaf { size: rows.len() });
            return idx;
        };

        let threshold = rng.gen_range(lo..hi);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[r][feature] < threshold);

        self.nodes.push(Node::Leaf { size: 0 }); // placeholder until children exist
        let left = self.grow_node(data, left_rows, n_features, depth + 1, max_depth, rng);
        let right = self.grow_node(data, right_rows, n_features, depth + 1, max_depth, rng);
        self.nodes[idx] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        idx
    }

    /// Edges from the root to the leaf `x` falls into, plus `c(leaf size)`.
    pub fn path_length(&self, x: &[f64]) -> f64 {
        let mut i = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes.get(i) {
                Some(Node::Split { feature, threshold, left, right }) => {
                    i = if x[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Some(Node::Leaf { size }) => return depth + average_path_length(*size),
                None => return depth,
            }
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Children must come after their parent so traversal always terminates.
    fn validate(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let Node::Split { feature, threshold, left, right } = *node {
                if feature >= n_features {
                    return Err(format!("node {idx} splits on feature {feature} of {n_features}"));
                }
                if !threshold.is_finite() {
                    return Err(format!("node {idx} has a non-finite threshold"));
                }
                for child in [left, right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(format!("node {idx} points to invalid child {child}"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Random feature whose values over `rows` span a non-empty range.
fn pick_split_feature<R: Rng>(
    data: &[Vec<f64>],
    rows: &[usize],
    n_features: usize,
    rng: &mut R,
) -> Option<(usize, f64, f64)> {
    let mut order: Vec<usize> = (0..n_features).collect();
    order.shuffle(rng);
    order.into_iter().find_map(|f| {
        let (lo, hi) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
            (lo.min(data[r][f]), hi.max(data[r][f]))
        });
        (hi > lo).then_some((f, lo, hi))
    })
}

// ============================================================================
// Forest
// ============================================================================

/// Fitted isolation forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    n_features: usize,
    /// ψ, the per-tree subsample size actually used
    subsample_size: usize,
    offset: f64,
}

impl IsolationForest {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn subsample_size(&self) -> usize {
        self.subsample_size
    }

    /// Mean path length of `x` across all trees.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_path_length(&self, x: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.path_length(x)).sum::<f64>() / self.trees.len() as f64
    }
}

impl OutlierModel for IsolationForest {
    const ALGORITHM: &'static str = "isolation_forest";

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn fit(samples: &[Vec<f64>], params: &FitParams) -> Result<Self, AnomalyError> {
        validate_params(params)?;
        let n_features = validate_samples(samples)?;

        let n = samples.len();
        let psi = params.max_samples.min(n);
        let max_depth = (psi as f64).log2().ceil() as usize;

        let trees: Vec<IsolationTree> = (0..params.n_estimators)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(params.seed, t));
                let rows = rand::seq::index::sample(&mut rng, n, psi).into_vec();
                IsolationTree::grow(samples, rows, n_features, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            n_features,
            subsample_size: psi,
            offset: 0.0,
        };

        let scores: Vec<f64> = samples.par_iter().map(|s| forest.score_samples(s)).collect();
        forest.offset = contamination_offset(scores, params.contamination);

        debug!(
            n_samples = n,
            n_trees = forest.trees.len(),
            psi,
            max_depth,
            offset = forest.offset,
            "Isolation forest fitted"
        );
        Ok(forest)
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    /// `-2^(-E[h(x)] / c(ψ))`, in `[-1, 0)`. NaN for a tuple of the wrong arity.
    fn score_samples(&self, sample: &[f64]) -> f64 {
        if sample.len() != self.n_features {
            return f64::NAN;
        }
        let c = average_path_length(self.subsample_size);
        if c == 0.0 {
            return -0.5;
        }
        -(2.0_f64).powf(-self.mean_path_length(sample) / c)
    }

    fn offset(&self) -> f64 {
        self.offset
    }

    fn validate(&self) -> Result<(), AnomalyError> {
        if self.trees.is_empty() {
            return Err(AnomalyError::CorruptModel("forest has no trees".to_string()));
        }
        if self.n_features == 0 || self.subsample_size == 0 {
            return Err(AnomalyError::CorruptModel(
                "n_features and subsample_size must be >= 1".to_string(),
            ));
        }
        if !self.offset.is_finite() {
            return Err(AnomalyError::CorruptModel("non-finite offset".to_string()));
        }
        for (t, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features)
                .map_err(|e| AnomalyError::CorruptModel(format!("tree {t}: {e}")))?;
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
