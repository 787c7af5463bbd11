//! Sequential forward feature selection.
//!
//! Starting from no features, each round tries adding every remaining column
//! to the current selection and scores the projected dataset. The best
//! candidate of the round is committed when it improves on the last committed
//! accuracy by at least the minimum improvement; otherwise the search stops
//! and that candidate is discarded.
//!
//! Candidates are tried in ascending column order and only a strictly better
//! score displaces the round's current best, so ties go to the lowest column.

use super::{finite_score, FailurePolicy, SearchError};
use crate::classify::{AccuracyOracle, ClassifierKind};
use crate::core::{Dataset, DatasetError};
use crate::progress::{ProgressEvent, ProgressSink};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Smallest accuracy gain that keeps the search going.
pub const DEFAULT_MIN_IMPROVEMENT: f64 = 0.001;

/// The best candidate of one round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SfsRound {
    /// Round number, starting at 1
    pub round: usize,
    pub column: usize,
    pub name: String,
    pub accuracy: f64,
    /// Gain over the previously committed accuracy
    pub improvement: f64,
    pub committed: bool,
}

/// Outcome of feature selection for one classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SfsResult {
    classifier: ClassifierKind,
    selected: Vec<usize>,
    selected_names: Vec<String>,
    accuracy: f64,
    rounds: Vec<SfsRound>,
}

impl SfsResult {
    pub fn classifier(&self) -> ClassifierKind {
        self.classifier
    }

    /// Selected columns in the order they were added.
    pub fn selected(&self) -> &[usize] {
        &self.selected
    }

    pub fn selected_names(&self) -> &[String] {
        &self.selected_names
    }

    /// Accuracy of the final selection; 0.0 when nothing was selected.
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Every round, including the final uncommitted one if the search stopped early.
    pub fn rounds(&self) -> &[SfsRound] {
        &self.rounds
    }

    pub fn feature_count(&self) -> usize {
        self.selected.len()
    }

    /// `dataset` reduced to the selected columns, in selection order.
    pub fn project(&self, dataset: &Dataset) -> Result<Dataset, DatasetError> {
        dataset.project(&self.selected)
    }

    /// File name of the projected dataset, e.g. `sfs_forest_4features.csv`.
    pub fn file_name(&self) -> String {
        format!(
            "sfs_{}_{}features.csv",
            self.classifier.slug(),
            self.selected.len()
        )
    }
}

/// Greedy forward selection driven by an accuracy oracle.
pub struct FeatureSelector<'o, O: AccuracyOracle + ?Sized> {
    oracle: &'o O,
    min_improvement: f64,
    policy: FailurePolicy,
}

impl<'o, O: AccuracyOracle + ?Sized> FeatureSelector<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self {
            oracle,
            min_improvement: DEFAULT_MIN_IMPROVEMENT,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_min_improvement(mut self, min_improvement: f64) -> Self {
        self.min_improvement = min_improvement;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn min_improvement(&self) -> f64 {
        self.min_improvement
    }

    /// Run forward selection over every feature column of `dataset`.
    ///
    /// Makes at most `k * (k + 1) / 2` oracle calls for `k` columns.
    pub fn select_features(
        &self,
        kind: ClassifierKind,
        dataset: &Dataset,
        sink: &dyn ProgressSink,
    ) -> Result<SfsResult, SearchError> {
        if !(self.min_improvement.is_finite() && self.min_improvement >= 0.0) {
            return Err(SearchError::InvalidThreshold(self.min_improvement));
        }

        let mut selected: Vec<usize> = Vec::new();
        let mut remaining: BTreeSet<usize> = (0..dataset.feature_count()).collect();
        let mut last_best = 0.0;
        let mut rounds = Vec::new();

        while !remaining.is_empty() {
            let round = rounds.len() + 1;
            let mut trial = selected.clone();
            trial.push(0);
            let mut best: Option<(usize, f64)> = None;

            for &column in &remaining {
                if let Some(slot) = trial.last_mut() {
                    *slot = column;
                }
                let accuracy = self.score(kind, dataset, &trial, round, sink)?;
                if best.map_or(true, |(_, b)| accuracy > b) {
                    best = Some((column, accuracy));
                }
            }

            let Some((column, accuracy)) = best else {
                break;
            };
            let improvement = accuracy - last_best;
            let committed = improvement >= self.min_improvement;
            let name = dataset.feature_names()[column].clone();

            sink.emit(&ProgressEvent::SfsRoundCompleted {
                classifier: kind,
                round,
                column,
                name: name.clone(),
                accuracy,
                improvement,
                committed,
            });
            rounds.push(SfsRound {
                round,
                column,
                name,
                accuracy,
                improvement,
                committed,
            });

            if !committed {
                break;
            }
            selected.push(column);
            remaining.remove(&column);
            last_best = accuracy;
        }

        sink.emit(&ProgressEvent::SfsFinished {
            classifier: kind,
            selected: selected.len(),
            accuracy: last_best,
        });

        let selected_names = selected
            .iter()
            .map(|&c| dataset.feature_names()[c].clone())
            .collect();
        Ok(SfsResult {
            classifier: kind,
            selected,
            selected_names,
            accuracy: last_best,
            rounds,
        })
    }

    fn score(
        &self,
        kind: ClassifierKind,
        dataset: &Dataset,
        columns: &[usize],
        round: usize,
        sink: &dyn ProgressSink,
    ) -> Result<f64, SearchError> {
        let column = columns.last().copied().unwrap_or_default();
        let projected = dataset.project(columns)?;

        match finite_score(self.oracle.accuracy(&projected, kind)) {
            Ok(accuracy) => {
                sink.emit(&ProgressEvent::SfsCandidateEvaluated {
                    classifier: kind,
                    round,
                    column,
                    accuracy,
                });
                Ok(accuracy)
            }
            Err(error) => {
                sink.emit(&ProgressEvent::SfsCandidateFailed {
                    classifier: kind,
                    round,
                    column,
                    error: error.to_string(),
                });
                self.policy
                    .on_failure(error)
                    .map_err(|source| SearchError::Oracle {
                        classifier: kind,
                        source,
                    })
            }
        }
    }
}

/// Write the selected projection of `dataset` into `dir`.
///
/// Returns the path written.
pub fn write_selection(
    dataset: &Dataset,
    result: &SfsResult,
    dir: &Path,
) -> Result<PathBuf, DatasetError> {
    let path = dir.join(result.file_name());
    result.project(dataset)?.write_csv(&path)?;
    Ok(path)
}
