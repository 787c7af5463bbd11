//! CART decision tree with Gini impurity.
//!
//! Splits are binary `value <= threshold` tests with thresholds at the
//! midpoint between adjacent distinct values. A node becomes a leaf when it
//! is pure, too small to split into two leaves of `min_samples_leaf`, at the
//! depth limit, or when no split lowers impurity.

use rand::seq::index::sample;
use rand::Rng;

/// Growth limits for a decision tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    /// Minimum rows on each side of a split
    pub min_samples_leaf: usize,
    /// Maximum depth (root is depth 0); `None` grows until pure
    pub max_depth: Option<usize>,
    /// Features sampled per split; `None` considers all of them
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            min_samples_leaf: 2,
            max_depth: None,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted decision tree.
#[derive(Debug, Clone)]
pub struct DecisionTree {
    root: Node,
}

struct Split {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct Builder<'a> {
    rows: &'a [&'a [f64]],
    classes: &'a [usize],
    n_classes: usize,
    n_features: usize,
    params: &'a TreeParams,
}

impl DecisionTree {
    /// Fit a tree on `rows` labelled with class indices below `n_classes`.
    ///
    /// `rng` is only drawn from when `max_features` limits the features
    /// considered per split.
    pub fn fit<R: Rng + ?Sized>(
        rows: &[&[f64]],
        classes: &[usize],
        n_classes: usize,
        params: &TreeParams,
        rng: &mut R,
    ) -> Self {
        let builder = Builder {
            rows,
            classes,
            n_classes: n_classes.max(1),
            n_features: rows.first().map_or(0, |r| r.len()),
            params,
        };
        let root = builder.build((0..rows.len()).collect(), 0, rng);
        Self { root }
    }

    /// Predict the class index of a row.
    pub fn predict(&self, row: &[f64]) -> usize {
        let mut node = &self.root;
        loop {
            match node {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Number of leaves.
    pub fn leaf_count(&self) -> usize {
        fn count(node: &Node) -> usize {
            match node {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => count(left) + count(right),
            }
        }
        count(&self.root)
    }
}

impl Builder<'_> {
    fn build<R: Rng + ?Sized>(&self, indices: Vec<usize>, depth: usize, rng: &mut R) -> Node {
        let counts = self.class_counts(&indices);
        let leaf = Node::Leaf {
            class: majority(&counts),
        };

        let min_leaf = self.params.min_samples_leaf.max(1);
        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let at_depth_limit = self.params.max_depth.is_some_and(|d| depth >= d);
        if pure || at_depth_limit || self.n_features == 0 || indices.len() < 2 * min_leaf {
            return leaf;
        }

        let Some(split) = self.best_split(&indices, &counts, rng) else {
            return leaf;
        };

        let (left, right): (Vec<usize>, Vec<usize>) = indices
            .into_iter()
            .partition(|&i| self.rows[i][split.feature] <= split.threshold);
        if left.is_empty() || right.is_empty() {
            return leaf;
        }

        Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(self.build(left, depth + 1, rng)),
            right: Box::new(self.build(right, depth + 1, rng)),
        }
    }

    fn class_counts(&self, indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0; self.n_classes];
        for &i in indices {
            counts[self.classes[i]] += 1;
        }
        counts
    }

    fn candidate_features<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        match self.params.max_features {
            Some(m) if m < self.n_features => sample(rng, self.n_features, m.max(1)).into_vec(),
            _ => (0..self.n_features).collect(),
        }
    }

    fn best_split<R: Rng + ?Sized>(
        &self,
        indices: &[usize],
        counts: &[usize],
        rng: &mut R,
    ) -> Option<Split> {
        let n = indices.len();
        let parent = gini(counts, n);
        let min_leaf = self.params.min_samples_leaf.max(1);

        let mut best: Option<Split> = None;
        let mut sorted: Vec<(f64, usize)> = Vec::with_capacity(n);
        let mut left = vec![0usize; self.n_classes];

        for feature in self.candidate_features(rng) {
            sorted.clear();
            sorted.extend(indices.iter().map(|&i| (self.rows[i][feature], self.classes[i])));
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
            left.iter_mut().for_each(|c| *c = 0);

            for pos in 0..n - 1 {
                left[sorted[pos].1] += 1;
                let n_left = pos + 1;
                let n_right = n - n_left;
                let (value, next) = (sorted[pos].0, sorted[pos + 1].0);
                if n_left < min_leaf || n_right < min_leaf || !(value < next) {
                    continue;
                }

                let impurity = (n_left as f64 * gini(&left, n_left)
                    + n_right as f64 * gini_remainder(counts, &left, n_right))
                    / n as f64;
                let improves = impurity < parent - 1e-12;
                if improves && best.as_ref().map_or(true, |b| impurity < b.impurity) {
                    let mid = value + (next - value) / 2.0;
                    best = Some(Split {
                        feature,
                        threshold: if mid < next { mid } else { value },
                        impurity,
                    });
                }
            }
        }

        best
    }
}

fn gini(counts: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / n).powi(2)).sum::<f64>()
}

/// Gini impurity of `total - taken`, which holds `n` rows.
fn gini_remainder(total: &[usize], taken: &[usize], n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    1.0 - total
        .iter()
        .zip(taken)
        .map(|(&t, &l)| ((t - l) as f64 / n).powi(2))
        .sum::<f64>()
}

/// Index of the largest count; the lowest index wins ties.
pub(crate) fn majority(counts: &[usize]) -> usize {
    counts
        .iter()
        .enumerate()
        .fold((0, 0), |best, (i, &c)| if c > best.1 { (i, c) } else { best })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fit(
        rows: &[Vec<f64>],
        classes: &[usize],
        n_classes: usize,
        params: TreeParams,
    ) -> DecisionTree {
        let refs: Vec<&[f64]> = rows.iter().map(Vec::as_slice).collect();
        DecisionTree::fit(&refs, classes, n_classes, &params, &mut ChaCha8Rng::seed_from_u64(7))
    }

    #[test]
    fn test_separable_single_feature() {
        let rows: Vec<Vec<f64>> = (0..10).map(|i| vec![i as f64]).collect();
        let classes: Vec<usize> = (0..10).map(|i| usize::from(i >= 5)).collect();
        let tree = fit(&rows, &classes, 2, TreeParams::default());

        assert_eq!(tree.leaf_count(), 2);
        assert_eq!(tree.predict(&[1.0]), 0);
        assert_eq!(tree.predict(&[4.4]), 0);
        assert_eq!(tree.predict(&[4.6]), 1);
        assert_eq!(tree.predict(&[100.0]), 1);
    }

    #[test]
    fn test_picks_informative_feature() {
        // Feature 0 is noise, feature 1 separates three classes.
        let rows: Vec<Vec<f64>> = (0..30)
            .map(|i| vec![((i * 7) % 5) as f64, (i / 10) as f64 * 10.0])
            .collect();
        let classes: Vec<usize> = (0..30).map(|i| i / 10).collect();
        let tree = fit(&rows, &classes, 3, TreeParams::default());

        for (row, &class) in rows.iter().zip(&classes) {
            assert_eq!(tree.predict(row), class);
        }
        assert_eq!(tree.leaf_count(), 3);
    }

    #[test]
    fn test_depth_limit_and_constant_features() {
        let rows: Vec<Vec<f64>> = (0..8).map(|_| vec![1.0, 1.0]).collect();
        let classes = vec![0, 1, 1, 1, 0, 1, 1, 0];
        let tree = fit(&rows, &classes, 2, TreeParams::default());
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.predict(&[1.0, 1.0]), 1);

        let rows: Vec<Vec<f64>> = (0..8).map(|i| vec![i as f64]).collect();
        let stump = fit(
            &rows,
            &[0, 1, 0, 1, 0, 1, 0, 1],
            2,
            TreeParams {
                max_depth: Some(0),
                ..TreeParams::default()
            },
        );
        assert_eq!(stump.leaf_count(), 1);
    }

    #[test]
    fn test_majority_tie_breaks_low() {
        assert_eq!(majority(&[3, 5, 5]), 1);
        assert_eq!(majority(&[0, 0]), 0);
        assert_eq!(majority(&[]), 0);
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(&[4, 0], 4), 0.0);
        assert!((gini(&[2, 2], 4) - 0.5).abs() < 1e-12);
        assert!((gini_remainder(&[3, 3], &[1, 3], 2) - 0.0).abs() < 1e-12);
    }
}
