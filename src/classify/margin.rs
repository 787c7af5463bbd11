//! Linear support vector machine trained with Pegasos.
//!
//! Inputs are min-max normalized with the training set's ranges. Multi-class
//! problems use one-vs-rest: one weight vector per class, prediction picks the
//! highest score.

use rand::seq::SliceRandom;
use rand::Rng;

/// Training parameters for the linear SVM.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginParams {
    /// Regularization strength
    pub lambda: f64,
    /// Passes over the training rows per class
    pub epochs: usize,
}

impl Default for MarginParams {
    fn default() -> Self {
        Self {
            lambda: 1e-3,
            epochs: 20,
        }
    }
}

/// A fitted one-vs-rest linear SVM.
#[derive(Debug, Clone)]
pub struct LinearSvm {
    mins: Vec<f64>,
    scales: Vec<f64>,
    /// Per class; the last weight is the bias
    weights: Vec<Vec<f64>>,
}

impl LinearSvm {
    pub fn fit<R: Rng + ?Sized>(
        rows: &[&[f64]],
        classes: &[usize],
        n_classes: usize,
        params: &MarginParams,
        rng: &mut R,
    ) -> Self {
        let n_features = rows.first().map_or(0, |r| r.len());
        let (mins, scales) = ranges(rows, n_features);
        let lambda = if params.lambda > 0.0 { params.lambda } else { 1e-3 };
        let radius = 1.0 / lambda.sqrt();

        let inputs: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| normalize(row, &mins, &scales))
            .collect();
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        let mut weights = vec![vec![0.0; n_features + 1]; n_classes.max(1)];

        for (class, w) in weights.iter_mut().enumerate() {
            let mut step = 0usize;
            for _ in 0..params.epochs {
                order.shuffle(rng);
                for &i in &order {
                    step += 1;
                    let eta = 1.0 / (lambda * step as f64);
                    let target = if classes[i] == class { 1.0 } else { -1.0 };
                    let x = &inputs[i];
                    let margin = target * dot(w, x);

                    let shrink = 1.0 - eta * lambda;
                    w.iter_mut().for_each(|wj| *wj *= shrink);
                    if margin < 1.0 {
                        w.iter_mut()
                            .zip(x)
                            .for_each(|(wj, xj)| *wj += eta * target * xj);
                    }

                    let norm = dot(w, w).sqrt();
                    if norm > radius {
                        let scale = radius / norm;
                        w.iter_mut().for_each(|wj| *wj *= scale);
                    }
                }
            }
        }

        Self {
            mins,
            scales,
            weights,
        }
    }

    /// Class with the highest score; the lowest index wins ties.
    pub fn predict(&self, row: &[f64]) -> usize {
        let x = normalize(row, &self.mins, &self.scales);
        let mut best = (0, f64::NEG_INFINITY);
        for (class, w) in self.weights.iter().enumerate() {
            let score = dot(w, &x);
            if score > best.1 {
                best = (class, score);
            }
        }
        best.0
    }
}

/// Per-feature minimum and `1 / (max - min)`; constant features scale to 0.
fn ranges(rows: &[&[f64]], n_features: usize) -> (Vec<f64>, Vec<f64>) {
    let mut mins = vec![f64::INFINITY; n_features];
    let mut maxs = vec![f64::NEG_INFINITY; n_features];
    for row in rows {
        for (j, &v) in row.iter().enumerate().take(n_features) {
            mins[j] = mins[j].min(v);
            maxs[j] = maxs[j].max(v);
        }
    }

    let scales = mins
        .iter()
        .zip(&maxs)
        .map(|(lo, hi)| {
            let span = hi - lo;
            if span.is_finite() && span > 0.0 {
                1.0 / span
            } else {
                0.0
            }
        })
        .collect();
    let mins = mins
        .into_iter()
        .map(|m| if m.is_finite() { m } else { 0.0 })
        .collect();
    (mins, scales)
}

/// Normalized features followed by a constant bias input.
fn normalize(row: &[f64], mins: &[f64], scales: &[f64]) -> Vec<f64> {
    let mut x: Vec<f64> = row
        .iter()
        .zip(mins.iter().zip(scales))
        .map(|(v, (lo, s))| (v - lo) * s)
        .collect();
    x.push(1.0);
    x
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
