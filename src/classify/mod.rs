//! Classifiers and the accuracy oracle the search algorithms consult.
//!
//! The searches only ever ask one question: "how accurately does classifier
//! `kind` predict this dataset?". [`AccuracyOracle`] is that question.
//! [`CrossValidator`] answers it with stratified k-fold cross-validation over
//! the built-in models; tests answer it with closures.

pub mod cv;
pub mod evaluation;
pub mod forest;
pub mod margin;
pub mod tree;

pub use cv::{CrossValidator, DEFAULT_FOLDS, DEFAULT_SEED};
pub use evaluation::{ClassMetrics, Evaluation};

use crate::core::Dataset;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The classifiers under study.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Single CART decision tree
    Tree,
    /// Bagged random forest
    Forest,
    /// One-vs-rest linear support vector machine
    Margin,
}

impl ClassifierKind {
    /// Every classifier, in reporting order.
    pub const ALL: [ClassifierKind; 3] = [
        ClassifierKind::Tree,
        ClassifierKind::Forest,
        ClassifierKind::Margin,
    ];

    /// Key used in persisted window configuration.
    pub fn key(self) -> &'static str {
        match self {
            ClassifierKind::Tree => "TREE",
            ClassifierKind::Forest => "FOREST",
            ClassifierKind::Margin => "MARGIN",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ClassifierKind::Tree => "Decision Tree",
            ClassifierKind::Forest => "Random Forest",
            ClassifierKind::Margin => "Linear SVM",
        }
    }

    /// Lowercase name used in file and directory names.
    pub fn slug(self) -> &'static str {
        match self {
            ClassifierKind::Tree => "tree",
            ClassifierKind::Forest => "forest",
            ClassifierKind::Margin => "margin",
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tree" | "dt" | "decision_tree" => Ok(ClassifierKind::Tree),
            "forest" | "rf" | "random_forest" => Ok(ClassifierKind::Forest),
            "margin" | "svm" | "linear_svm" => Ok(ClassifierKind::Margin),
            other => Err(format!(
                "unknown classifier '{other}' (expected tree, forest or margin)"
            )),
        }
    }
}

/// Why a dataset could not be scored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    #[error("dataset has no rows")]
    EmptyDataset,

    #[error("need at least two classes, found {found}")]
    TooFewClasses { found: usize },

    #[error("{rows} rows is too few for {folds}-fold cross-validation")]
    TooFewRows { rows: usize, folds: usize },

    #[error("cross-validation needs at least 2 folds, got {0}")]
    InvalidFolds(usize),

    #[error("classifier failed: {0}")]
    Backend(String),

    #[error("accuracy is not a finite number: {0}")]
    NonFiniteScore(String),
}

/// Scores a dataset for a classifier. Results are fractions in `[0, 1]`.
///
/// Implementations must be deterministic for a given dataset and kind.
pub trait AccuracyOracle {
    fn accuracy(&self, dataset: &Dataset, kind: ClassifierKind) -> Result<f64, OracleError>;
}

impl<F> AccuracyOracle for F
where
    F: Fn(&Dataset, ClassifierKind) -> Result<f64, OracleError>,
{
    fn accuracy(&self, dataset: &Dataset, kind: ClassifierKind) -> Result<f64, OracleError> {
        self(dataset, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_names() {
        assert_eq!(ClassifierKind::Tree.key(), "TREE");
        assert_eq!(ClassifierKind::Margin.display_name(), "Linear SVM");
        assert_eq!(ClassifierKind::Forest.to_string(), "Random Forest");
        assert_eq!(ClassifierKind::Forest.slug(), "forest");
    }

    #[test]
    fn test_classifier_from_str() {
        assert_eq!("RF".parse::<ClassifierKind>().unwrap(), ClassifierKind::Forest);
        assert_eq!("svm".parse::<ClassifierKind>().unwrap(), ClassifierKind::Margin);
        assert_eq!(" tree ".parse::<ClassifierKind>().unwrap(), ClassifierKind::Tree);
        assert!("knn".parse::<ClassifierKind>().is_err());
    }

    #[test]
    fn test_closure_oracle() {
        let oracle = |ds: &Dataset, kind: ClassifierKind| -> Result<f64, OracleError> {
            let bonus = if kind == ClassifierKind::Tree { 0.05 } else { 0.0 };
            Ok(ds.feature_count() as f64 / 10.0 + bonus)
        };
        let ds = Dataset::new(vec!["a".into(), "b".into()], "Activity");

        assert!((oracle.accuracy(&ds, ClassifierKind::Tree).unwrap() - 0.25).abs() < 1e-12);
        assert!((oracle.accuracy(&ds, ClassifierKind::Forest).unwrap() - 0.2).abs() < 1e-12);
    }
}
