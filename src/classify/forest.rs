//! Bagged ensemble of randomized decision trees.

use super::tree::{majority, DecisionTree, TreeParams};
use rand::Rng;

/// Trees grown when no count is configured.
pub const DEFAULT_TREES: usize = 100;

/// Number of features sampled per split for `n_features` inputs:
/// `floor(log2(n)) + 1`, capped at `n`.
pub fn features_per_split(n_features: usize) -> usize {
    if n_features == 0 {
        return 0;
    }
    let sampled = (n_features as f64).log2().floor() as usize + 1;
    sampled.min(n_features)
}

/// A fitted random forest.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForest {
    /// Grow `n_trees` trees, each on a bootstrap sample of the rows.
    pub fn fit<R: Rng + ?Sized>(
        rows: &[&[f64]],
        classes: &[usize],
        n_classes: usize,
        n_trees: usize,
        rng: &mut R,
    ) -> Self {
        let n = rows.len();
        let n_features = rows.first().map_or(0, |r| r.len());
        let params = TreeParams {
            min_samples_leaf: 1,
            max_depth: None,
            max_features: Some(features_per_split(n_features)),
        };

        let mut trees = Vec::with_capacity(n_trees);
        if n > 0 {
            let mut bag_rows: Vec<&[f64]> = Vec::with_capacity(n);
            let mut bag_classes: Vec<usize> = Vec::with_capacity(n);
            for _ in 0..n_trees.max(1) {
                bag_rows.clear();
                bag_classes.clear();
                for _ in 0..n {
                    let i = rng.gen_range(0..n);
                    bag_rows.push(rows[i]);
                    bag_classes.push(classes[i]);
                }
                trees.push(DecisionTree::fit(
                    &bag_rows,
                    &bag_classes,
                    n_classes,
                    &params,
                    rng,
                ));
            }
        }

        Self {
            trees,
            n_classes: n_classes.max(1),
        }
    }

    /// Majority vote over all trees; the lowest class index wins ties.
    pub fn predict(&self, row: &[f64]) -> usize {
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.predict(row)] += 1;
        }
        majority(&votes)
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
