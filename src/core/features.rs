//! Statistical feature extraction from sample windows.
//!
//! Every window yields per-axis summary statistics. Two fixed feature sets
//! are exposed as dataset columns: the six-column `Basic` set (mean and
//! standard deviation per axis) used for window sizing, and the twelve-column
//! `Expanded` set that adds median and RMS per axis for feature selection.

use crate::core::dataset::{Dataset, DatasetError, Row, LABEL_COLUMN};
use crate::core::windowing::{sliding_windows, SampleWindow, WindowSpec};
use crate::ingest::Recording;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Minimum number of samples a window needs to produce a row.
pub const DEFAULT_MIN_SAMPLES_PER_WINDOW: usize = 10;

const BASIC_COLUMNS: [&str; 6] = ["mean_x", "std_x", "mean_y", "std_y", "mean_z", "std_z"];

const EXPANDED_COLUMNS: [&str; 12] = [
    "mean_x", "std_x", "mean_y", "std_y", "mean_z", "std_z", "median_x", "median_y", "median_z",
    "rms_x", "rms_y", "rms_z",
];

/// Which feature columns to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// Mean and standard deviation per axis (6 columns)
    Basic,
    /// Basic plus median and RMS per axis (12 columns)
    Expanded,
}

impl FeatureSet {
    /// Column names in dataset order.
    pub fn column_names(self) -> &'static [&'static str] {
        match self {
            FeatureSet::Basic => &BASIC_COLUMNS,
            FeatureSet::Expanded => &EXPANDED_COLUMNS,
        }
    }

    pub fn len(self) -> usize {
        self.column_names().len()
    }

    pub fn name(self) -> &'static str {
        match self {
            FeatureSet::Basic => "basic",
            FeatureSet::Expanded => "expanded",
        }
    }
}

impl fmt::Display for FeatureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureSet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" | "6" => Ok(FeatureSet::Basic),
            "expanded" | "12" => Ok(FeatureSet::Expanded),
            other => Err(format!("unknown feature set '{other}' (expected basic or expanded)")),
        }
    }
}

/// Summary statistics of one axis within a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisFeatures {
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub median: f64,
    /// Root mean square
    pub rms: f64,
}

/// All computed features for a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowFeatures {
    pub x: AxisFeatures,
    pub y: AxisFeatures,
    pub z: AxisFeatures,
}

impl WindowFeatures {
    /// Feature values in the column order of `set`.
    pub fn values(&self, set: FeatureSet) -> Vec<f64> {
        let (x, y, z) = (&self.x, &self.y, &self.z);
        let mut values = vec![x.mean, x.std_dev, y.mean, y.std_dev, z.mean, z.std_dev];
        if set == FeatureSet::Expanded {
            values.extend([x.median, y.median, z.median, x.rms, y.rms, z.rms]);
        }
        values
    }
}

/// Compute all features from a sample window.
pub fn compute_features(window: &SampleWindow<'_>) -> WindowFeatures {
    let axis = |pick: fn(&crate::ingest::AccelSample) -> f64| {
        axis_features(window.samples.iter().map(pick).collect())
    };

    WindowFeatures {
        x: axis(|s| s.x),
        y: axis(|s| s.y),
        z: axis(|s| s.z),
    }
}

fn axis_features(values: Vec<f64>) -> AxisFeatures {
    if values.is_empty() {
        return AxisFeatures::default();
    }

    let mean = values.iter().mean();
    let std_dev = values.iter().population_std_dev();
    let rms = values.iter().quadratic_mean();
    let median = Data::new(values).median();

    AxisFeatures {
        mean,
        std_dev,
        median,
        rms,
    }
}

/// Turns raw recordings into a labelled feature dataset.
pub trait FeatureExtractor {
    fn extract(&self, spec: WindowSpec, feature_set: FeatureSet) -> Result<Dataset, DatasetError>;
}

/// Extracts features from recordings held in memory.
#[derive(Debug, Clone)]
pub struct RecordingExtractor {
    recordings: Vec<Recording>,
    min_samples_per_window: usize,
}

impl RecordingExtractor {
    pub fn new(recordings: Vec<Recording>) -> Self {
        Self {
            recordings,
            min_samples_per_window: DEFAULT_MIN_SAMPLES_PER_WINDOW,
        }
    }

    /// Windows with fewer samples than this are skipped. Clamped to at least 1.
    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples_per_window = min_samples.max(1);
        self
    }

    pub fn recordings(&self) -> &[Recording] {
        &self.recordings
    }
}

impl FeatureExtractor for RecordingExtractor {
    fn extract(&self, spec: WindowSpec, feature_set: FeatureSet) -> Result<Dataset, DatasetError> {
        let columns = feature_set
            .column_names()
            .iter()
            .map(|c| c.to_string())
            .collect();
        let mut dataset = Dataset::new(columns, LABEL_COLUMN);

        for recording in &self.recordings {
            let before = dataset.len();
            for window in sliding_windows(&recording.samples, spec) {
                if window.len() < self.min_samples_per_window {
                    continue;
                }
                let features = compute_features(&window);
                dataset.push(Row::new(features.values(feature_set), recording.label.clone()))?;
            }
            debug!(
                source = %recording.source,
                windows = dataset.len() - before,
                window_ms = spec.window_ms,
                "extracted feature windows"
            );
        }

        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::AccelSample;

    fn ramp_recording(label: &str, count: i64, step_ms: i64) -> Recording {
        let samples = (0..count)
            .map(|i| AccelSample::new(i * step_ms, i as f64, 2.0, -(i as f64)))
            .collect();
        Recording::new(format!("{label}.csv"), label, samples)
    }

    #[test]
    fn test_axis_features_known_values() {
        let f = axis_features(vec![3.0, 1.0, 4.0, 1.0, 5.0]);
        assert!((f.mean - 2.8).abs() < 1e-12);
        assert!((f.median - 3.0).abs() < 1e-12);
        // population variance = (0.04 + 3.24 + 1.44 + 3.24 + 4.84) / 5 = 2.56
        assert!((f.std_dev - 1.6).abs() < 1e-12);
        // sqrt((9 + 1 + 16 + 1 + 25) / 5)
        assert!((f.rms - (52.0f64 / 5.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_axis_features_empty() {
        assert_eq!(axis_features(Vec::new()), AxisFeatures::default());
    }

    #[test]
    fn test_feature_set_columns() {
        assert_eq!(FeatureSet::Basic.len(), 6);
        assert_eq!(FeatureSet::Expanded.len(), 12);
        assert_eq!(
            &FeatureSet::Expanded.column_names()[..6],
            FeatureSet::Basic.column_names()
        );
        assert_eq!("Expanded".parse::<FeatureSet>().unwrap(), FeatureSet::Expanded);
        assert!("fancy".parse::<FeatureSet>().is_err());
    }

    #[test]
    fn test_window_values_follow_column_order() {
        let data: Vec<AccelSample> = (0..5)
            .map(|i| AccelSample::new(i, i as f64, 1.0, 0.0))
            .collect();
        let window = SampleWindow {
            start_ms: 0,
            end_ms: 5,
            samples: &data,
        };
        let features = compute_features(&window);
        let values = features.values(FeatureSet::Expanded);

        assert_eq!(values.len(), 12);
        assert!((values[0] - 2.0).abs() < 1e-12); // mean_x
        assert!((values[2] - 1.0).abs() < 1e-12); // mean_y
        assert!(values[3].abs() < 1e-12); // std_y
        assert!((values[6] - 2.0).abs() < 1e-12); // median_x
        assert!((values[10] - 1.0).abs() < 1e-12); // rms_y
    }

    #[test]
    fn test_extractor_skips_sparse_windows() {
        // 29 samples 100 ms apart: windows start at 0, 1000 and 2000 ms,
        // and the last one only holds 9 samples.
        let extractor = RecordingExtractor::new(vec![ramp_recording("walking", 29, 100)]);

        let lenient = extractor
            .clone()
            .with_min_samples(1)
            .extract(WindowSpec::new(1000, 1000), FeatureSet::Basic)
            .unwrap();
        assert_eq!(lenient.len(), 3);
        assert_eq!(lenient.feature_count(), 6);
        assert_eq!(lenient.label_name(), LABEL_COLUMN);
        assert!(lenient.rows().iter().all(|r| r.label == "walking"));

        let strict = extractor
            .extract(WindowSpec::new(1000, 1000), FeatureSet::Expanded)
            .unwrap();
        assert_eq!(strict.len(), 2);
        assert_eq!(strict.feature_count(), 12);
    }

    #[test]
    fn test_window_larger_than_recording_yields_partial_rows() {
        let extractor = RecordingExtractor::new(vec![ramp_recording("sitting", 20, 100)]);
        let dataset = extractor
            .extract(WindowSpec::new(4000, 1000), FeatureSet::Basic)
            .unwrap();
        // Starts at 0 and 1000; the second window holds samples 1000..=1900.
        assert_eq!(dataset.len(), 2);
    }
}
