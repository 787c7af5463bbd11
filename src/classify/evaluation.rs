//! Confusion matrix and the metrics derived from it.

use serde::{Deserialize, Serialize};

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of rows whose actual class is this one
    pub support: u64,
}

/// Accumulated predictions of a cross-validation run.
///
/// `confusion[actual][predicted]` counts rows, indexed by position in the
/// sorted label list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    labels: Vec<String>,
    confusion: Vec<Vec<u64>>,
}

impl Evaluation {
    pub fn new(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            confusion: vec![vec![0; n]; n],
        }
    }

    /// Count one prediction.
    pub fn record(&mut self, actual: usize, predicted: usize) {
        self.confusion[actual][predicted] += 1;
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn confusion(&self) -> &[Vec<u64>] {
        &self.confusion
    }

    pub fn total(&self) -> u64 {
        self.confusion.iter().flatten().sum()
    }

    pub fn correct(&self) -> u64 {
        (0..self.labels.len()).map(|i| self.confusion[i][i]).sum()
    }

    /// Fraction of rows classified correctly, 0.0 when nothing was recorded.
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Cohen's kappa: agreement beyond what the marginals predict by chance.
    pub fn kappa(&self) -> f64 {
        let total = self.total() as f64;
        if total == 0.0 {
            return 0.0;
        }

        let observed = self.accuracy();
        let expected: f64 = (0..self.labels.len())
            .map(|i| {
                (self.actual_count(i) as f64 / total) * (self.predicted_count(i) as f64 / total)
            })
            .sum();

        if (1.0 - expected).abs() < f64::EPSILON {
            return if (observed - 1.0).abs() < f64::EPSILON { 1.0 } else { 0.0 };
        }
        (observed - expected) / (1.0 - expected)
    }

    pub fn precision(&self, class: usize) -> f64 {
        ratio(self.confusion[class][class], self.predicted_count(class))
    }

    pub fn recall(&self, class: usize) -> f64 {
        ratio(self.confusion[class][class], self.actual_count(class))
    }

    pub fn f1(&self, class: usize) -> f64 {
        let (p, r) = (self.precision(class), self.recall(class));
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        self.labels
            .iter()
            .enumerate()
            .map(|(i, label)| ClassMetrics {
                label: label.clone(),
                precision: self.precision(i),
                recall: self.recall(i),
                f1: self.f1(i),
                support: self.actual_count(i),
            })
            .collect()
    }

    fn actual_count(&self, class: usize) -> u64 {
        self.confusion[class].iter().sum()
    }

    fn predicted_count(&self, class: usize) -> u64 {
        self.confusion.iter().map(|row| row[class]).sum()
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
