//! Stratified k-fold cross-validation over the built-in classifiers.

use super::evaluation::Evaluation;
use super::forest::{RandomForest, DEFAULT_TREES};
use super::margin::{LinearSvm, MarginParams};
use super::tree::{DecisionTree, TreeParams};
use super::{AccuracyOracle, ClassifierKind, OracleError};
use crate::core::Dataset;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Folds used when no count is configured.
pub const DEFAULT_FOLDS: usize = 10;

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 1;

/// Scores datasets by stratified k-fold cross-validation.
///
/// Fold assignment and model randomness both derive from `seed`, so the same
/// dataset and classifier always produce the same evaluation.
#[derive(Debug, Clone)]
pub struct CrossValidator {
    folds: usize,
    seed: u64,
    forest_trees: usize,
    tree: TreeParams,
    margin: MarginParams,
}

impl Default for CrossValidator {
    fn default() -> Self {
        Self::new(DEFAULT_FOLDS, DEFAULT_SEED)
    }
}

/// A model fitted on one training fold.
enum Model {
    Tree(DecisionTree),
    Forest(RandomForest),
    Margin(LinearSvm),
}

impl Model {
    fn predict(&self, row: &[f64]) -> usize {
        match self {
            Model::Tree(m) => m.predict(row),
            Model::Forest(m) => m.predict(row),
            Model::Margin(m) => m.predict(row),
        }
    }
}

impl CrossValidator {
    pub fn new(folds: usize, seed: u64) -> Self {
        Self {
            folds,
            seed,
            forest_trees: DEFAULT_TREES,
            tree: TreeParams::default(),
            margin: MarginParams::default(),
        }
    }

    pub fn with_forest_trees(mut self, trees: usize) -> Self {
        self.forest_trees = trees.max(1);
        self
    }

    pub fn with_margin_params(mut self, params: MarginParams) -> Self {
        self.margin = params;
        self
    }

    pub fn folds(&self) -> usize {
        self.folds
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Run cross-validation and collect the full confusion matrix.
    pub fn evaluate(
        &self,
        dataset: &Dataset,
        kind: ClassifierKind,
    ) -> Result<Evaluation, OracleError> {
        if dataset.is_empty() {
            return Err(OracleError::EmptyDataset);
        }
        if self.folds < 2 {
            return Err(OracleError::InvalidFolds(self.folds));
        }
        let labels = dataset.class_labels();
        if labels.len() < 2 {
            return Err(OracleError::TooFewClasses {
                found: labels.len(),
            });
        }
        if dataset.len() < self.folds {
            return Err(OracleError::TooFewRows {
                rows: dataset.len(),
                folds: self.folds,
            });
        }

        let rows: Vec<&[f64]> = dataset.rows().iter().map(|r| r.values.as_slice()).collect();
        let classes: Vec<usize> = dataset
            .rows()
            .iter()
            .map(|r| labels.binary_search(&r.label).unwrap_or(0))
            .collect();
        let n_classes = labels.len();
        let assignment = self.fold_assignment(&classes);

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut evaluation = Evaluation::new(labels);

        for fold in 0..self.folds {
            let mut train_rows = Vec::with_capacity(rows.len());
            let mut train_classes = Vec::with_capacity(rows.len());
            let mut test = Vec::new();
            for (i, &f) in assignment.iter().enumerate() {
                if f == fold {
                    test.push(i);
                } else {
                    train_rows.push(rows[i]);
                    train_classes.push(classes[i]);
                }
            }

            let model = self.fit(kind, &train_rows, &train_classes, n_classes, &mut rng);
            for i in test {
                evaluation.record(classes[i], model.predict(rows[i]));
            }
        }

        trace!(
            classifier = %kind,
            rows = dataset.len(),
            features = dataset.feature_count(),
            accuracy = evaluation.accuracy(),
            "cross-validation finished"
        );
        Ok(evaluation)
    }

    /// Fold index per row. Rows are shuffled, then stably grouped by class and
    /// dealt round-robin so every fold gets a proportional share of each class.
    fn fold_assignment(&self, classes: &[usize]) -> Vec<usize> {
        let mut order: Vec<usize> = (0..classes.len()).collect();
        order.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));
        order.sort_by_key(|&i| classes[i]);

        let mut assignment = vec![0; classes.len()];
        for (pos, &i) in order.iter().enumerate() {
            assignment[i] = pos % self.folds;
        }
        assignment
    }

    fn fit(
        &self,
        kind: ClassifierKind,
        rows: &[&[f64]],
        classes: &[usize],
        n_classes: usize,
        rng: &mut ChaCha8Rng,
    ) -> Model {
        match kind {
            ClassifierKind::Tree => {
                Model::Tree(DecisionTree::fit(rows, classes, n_classes, &self.tree, rng))
            }
            ClassifierKind::Forest => Model::Forest(RandomForest::fit(
                rows,
                classes,
                n_classes,
                self.forest_trees,
                rng,
            )),
            ClassifierKind::Margin => {
                Model::Margin(LinearSvm::fit(rows, classes, n_classes, &self.margin, rng))
            }
        }
    }
}

impl AccuracyOracle for CrossValidator {
    fn accuracy(&self, dataset: &Dataset, kind: ClassifierKind) -> Result<f64, OracleError> {
        self.evaluate(dataset, kind).map(|e| e.accuracy())
    }
}
