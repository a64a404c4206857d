// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Seeded random forest for binary CME classification.
//!
//! Bootstrap-aggregated CART trees with weighted Gini splits and
//! sqrt-of-features subsampling at every node. Each tree derives its
//! own generator from the run seed and the tree index, so the fitted
//! forest is bit-identical whether trees are grown serially or, with
//! the `rayon` feature, in parallel.

use halo_core::HaloError;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::rng::StableRng;

/// Forest shape and stopping rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct ForestParams {
    pub trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
enum Node {
    Leaf {
        probability: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn predict(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                Node::Leaf { probability } => return probability,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

/// A fitted forest plus its normalized impurity-decrease importances.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RandomForest {
    trees: Vec<Tree>,
    n_features: usize,
    importances: Vec<f64>,
}

impl RandomForest {
    /// Mean positive-class probability across trees.
    pub(crate) fn predict_proba(&self, row: &[f64]) -> Result<f64, HaloError> {
        if row.len() != self.n_features {
            return Err(HaloError::invalid_input(format!(
                "forest expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }
        let sum: f64 = self.trees.iter().map(|tree| tree.predict(row)).sum();
        Ok(sum / self.trees.len() as f64)
    }

    /// Per-feature importances, normalized to sum to one (all zero for
    /// a forest of stumps that never split).
    pub(crate) fn importances(&self) -> &[f64] {
        &self.importances
    }
}

pub(crate) fn fit(
    x: &[Vec<f64>],
    y: &[bool],
    sample_weights: &[f64],
    params: &ForestParams,
    seed: u64,
) -> Result<RandomForest, HaloError> {
    let n = x.len();
    if n == 0 {
        return Err(HaloError::invalid_input("forest needs at least one row"));
    }
    let n_features = x[0].len();
    if n_features == 0 {
        return Err(HaloError::invalid_input("forest needs at least one feature"));
    }
    if x.iter().any(|row| row.len() != n_features) {
        return Err(HaloError::invalid_input("forest rows have uneven widths"));
    }
    if y.len() != n || sample_weights.len() != n {
        return Err(HaloError::invalid_input(format!(
            "forest label/weight lengths {}/{} do not match {n} rows",
            y.len(),
            sample_weights.len()
        )));
    }
    if params.trees == 0 || params.max_depth == 0 || params.min_samples_leaf == 0 {
        return Err(HaloError::invalid_config(
            "forest params must be positive (trees, max_depth, min_samples_leaf)",
        ));
    }

    let fit_one = |tree_idx: usize| -> Result<(Tree, Vec<f64>), HaloError> {
        let tree_seed = seed ^ (tree_idx as u64).wrapping_mul(0xa0761d6478bd642f);
        let mut rng = StableRng::new(tree_seed);
        let mut indices = Vec::with_capacity(n);
        for _ in 0..n {
            indices.push(rng.gen_range(n)?);
        }
        let mut builder = TreeBuilder {
            x,
            y,
            weights: sample_weights,
            params,
            n_features,
            nodes: Vec::new(),
            gains: vec![0.0; n_features],
            root_weight: indices.iter().map(|&i| sample_weights[i]).sum(),
        };
        builder.grow(&mut rng, indices, 0)?;
        Ok((
            Tree {
                nodes: builder.nodes,
            },
            builder.gains,
        ))
    };

    #[cfg(feature = "rayon")]
    let fitted: Vec<(Tree, Vec<f64>)> = (0..params.trees)
        .into_par_iter()
        .map(fit_one)
        .collect::<Result<_, _>>()?;
    #[cfg(not(feature = "rayon"))]
    let fitted: Vec<(Tree, Vec<f64>)> = (0..params.trees)
        .map(fit_one)
        .collect::<Result<_, _>>()?;

    let mut importances = vec![0.0; n_features];
    let mut trees = Vec::with_capacity(params.trees);
    for (tree, gains) in fitted {
        for (total, gain) in importances.iter_mut().zip(gains) {
            *total += gain;
        }
        trees.push(tree);
    }
    let total: f64 = importances.iter().sum();
    if total > 0.0 {
        for importance in &mut importances {
            *importance /= total;
        }
    }

    Ok(RandomForest {
        trees,
        n_features,
        importances,
    })
}

struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [bool],
    weights: &'a [f64],
    params: &'a ForestParams,
    n_features: usize,
    nodes: Vec<Node>,
    gains: Vec<f64>,
    root_weight: f64,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl TreeBuilder<'_> {
    /// Grows the subtree for `indices`, returning its node index.
    fn grow(
        &mut self,
        rng: &mut StableRng,
        indices: Vec<usize>,
        depth: usize,
    ) -> Result<usize, HaloError> {
        let (weight, positive_weight) = self.node_weights(&indices);
        let probability = if weight > 0.0 {
            positive_weight / weight
        } else {
            0.0
        };

        let pure = probability <= 0.0 || probability >= 1.0;
        if depth >= self.params.max_depth || indices.len() < self.params.min_samples_split || pure {
            return Ok(self.push(Node::Leaf { probability }));
        }

        let Some(split) = self.best_split(rng, &indices, weight, probability)? else {
            return Ok(self.push(Node::Leaf { probability }));
        };

        self.gains[split.feature] += weight / self.root_weight * split.gain;

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.x[i][split.feature] <= split.threshold);

        // Reserve the split slot before growing children so the tree
        // is laid out root-first.
        let node_idx = self.push(Node::Leaf { probability });
        let left = self.grow(rng, left_indices, depth + 1)?;
        let right = self.grow(rng, right_indices, depth + 1)?;
        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        Ok(node_idx)
    }

    fn push(&mut self, node: Node) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn node_weights(&self, indices: &[usize]) -> (f64, f64) {
        let mut weight = 0.0;
        let mut positive = 0.0;
        for &i in indices {
            weight += self.weights[i];
            if self.y[i] {
                positive += self.weights[i];
            }
        }
        (weight, positive)
    }

    /// Best weighted-Gini split over a sqrt(d) random feature subset,
    /// or `None` when every candidate feature is constant or violates
    /// the leaf minimum.
    fn best_split(
        &self,
        rng: &mut StableRng,
        indices: &[usize],
        weight: f64,
        probability: f64,
    ) -> Result<Option<BestSplit>, HaloError> {
        let m_try = ((self.n_features as f64).sqrt().floor() as usize).max(1);
        let mut features: Vec<usize> = (0..self.n_features).collect();
        for k in 0..m_try {
            let j = k + rng.gen_range(self.n_features - k)?;
            features.swap(k, j);
        }

        let parent_gini = gini(probability);
        let mut best: Option<BestSplit> = None;

        for &feature in &features[..m_try] {
            let mut ordered: Vec<(f64, f64, f64)> = indices
                .iter()
                .map(|&i| {
                    let w = self.weights[i];
                    (self.x[i][feature], w, if self.y[i] { w } else { 0.0 })
                })
                .collect();
            ordered.sort_by(|a, b| a.0.total_cmp(&b.0));

            let total_positive: f64 = ordered.iter().map(|&(_, _, wp)| wp).sum();
            let mut left_weight = 0.0;
            let mut left_positive = 0.0;
            for (k, &(value, w, wp)) in ordered.iter().enumerate().take(ordered.len() - 1) {
                left_weight += w;
                left_positive += wp;
                let next_value = ordered[k + 1].0;
                if value == next_value {
                    continue;
                }
                let left_count = k + 1;
                let right_count = ordered.len() - left_count;
                if left_count < self.params.min_samples_leaf
                    || right_count < self.params.min_samples_leaf
                {
                    continue;
                }

                let right_weight = weight - left_weight;
                if left_weight <= 0.0 || right_weight <= 0.0 {
                    continue;
                }
                let left_gini = gini(left_positive / left_weight);
                let right_gini = gini((total_positive - left_positive) / right_weight);
                let gain = parent_gini
                    - (left_weight * left_gini + right_weight * right_gini) / weight;
                if gain <= 1e-12 {
                    continue;
                }
                if best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (value + next_value) / 2.0,
                        gain,
                    });
                }
            }
        }
        Ok(best)
    }
}

/// Binary Gini impurity.
fn gini(p: f64) -> f64 {
    2.0 * p * (1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::{fit, ForestParams};

    const PARAMS: ForestParams = ForestParams {
        trees: 25,
        max_depth: 4,
        min_samples_split: 2,
        min_samples_leaf: 1,
    };

    fn separable_data() -> (Vec<Vec<f64>>, Vec<bool>, Vec<f64>) {
        let x: Vec<Vec<f64>> = (0..40).map(|i| vec![i as f64 / 40.0]).collect();
        let y: Vec<bool> = (0..40).map(|i| i >= 20).collect();
        let weights = vec![1.0; 40];
        (x, y, weights)
    }

    #[test]
    fn learns_a_separable_boundary() {
        let (x, y, weights) = separable_data();
        let forest = fit(&x, &y, &weights, &PARAMS, 42).expect("fit should succeed");
        let low = forest.predict_proba(&[0.1]).expect("predict should succeed");
        let high = forest.predict_proba(&[0.9]).expect("predict should succeed");
        assert!(low < 0.2, "low side predicted {low}");
        assert!(high > 0.8, "high side predicted {high}");
    }

    #[test]
    fn fits_are_reproducible_for_a_seed() {
        let (x, y, weights) = separable_data();
        let a = fit(&x, &y, &weights, &PARAMS, 7).expect("fit should succeed");
        let b = fit(&x, &y, &weights, &PARAMS, 7).expect("fit should succeed");
        assert_eq!(a, b);
    }

    #[test]
    fn informative_features_dominate_importances() {
        // Feature 0 separates the classes, feature 1 is constant.
        let x: Vec<Vec<f64>> = (0..60).map(|i| vec![i as f64, 5.0]).collect();
        let y: Vec<bool> = (0..60).map(|i| i >= 30).collect();
        let weights = vec![1.0; 60];
        let forest = fit(&x, &y, &weights, &PARAMS, 1).expect("fit should succeed");

        let importances = forest.importances();
        assert!((importances.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importances[0] > 0.9);
        assert!(importances[1] < 1e-9);
    }

    #[test]
    fn class_weights_shift_the_prediction() {
        // Two positives among many negatives at the same point: with a
        // large enough positive weight the leaves lean positive.
        let x: Vec<Vec<f64>> = vec![vec![0.0]; 10];
        let mut y = vec![false; 10];
        y[0] = true;
        y[1] = true;
        let mut weights = vec![1.0; 10];
        weights[0] = 45.0;
        weights[1] = 45.0;
        let forest = fit(&x, &y, &weights, &PARAMS, 3).expect("fit should succeed");
        // No split is possible; every leaf holds the weighted prior of
        // its bootstrap sample, which is almost always above one half.
        let proba = forest.predict_proba(&[0.0]).expect("predict should succeed");
        assert!(proba > 0.5, "weighted prior predicted {proba}");
    }

    #[test]
    fn rejects_inconsistent_inputs() {
        let err = fit(&[], &[], &[], &PARAMS, 0).expect_err("empty input must fail");
        assert!(err.to_string().contains("at least one row"));

        let err = fit(&[vec![1.0]], &[true, false], &[1.0], &PARAMS, 0)
            .expect_err("length mismatch must fail");
        assert!(err.to_string().contains("do not match"));

        let err = fit(&[vec![1.0], vec![1.0, 2.0]], &[true, false], &[1.0, 1.0], &PARAMS, 0)
            .expect_err("ragged rows must fail");
        assert!(err.to_string().contains("uneven widths"));
    }

    #[test]
    fn predict_rejects_wrong_width() {
        let (x, y, weights) = separable_data();
        let forest = fit(&x, &y, &weights, &PARAMS, 42).expect("fit should succeed");
        assert!(forest.predict_proba(&[0.1, 0.2]).is_err());
    }
}
