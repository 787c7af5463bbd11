//! Core data handling for the experiment pipeline.
//!
//! This module contains:
//! - Labelled feature datasets and their CSV / ARFF representation
//! - Sliding windows over accelerometer recordings
//! - Feature computation from sample windows

pub mod dataset;
pub mod features;
pub mod windowing;

// Re-export commonly used types
pub use dataset::{Dataset, DatasetError, Row, LABEL_COLUMN};
pub use features::{
    compute_features, AxisFeatures, FeatureExtractor, FeatureSet, RecordingExtractor,
    WindowFeatures, DEFAULT_MIN_SAMPLES_PER_WINDOW,
};
pub use windowing::{sliding_windows, SampleWindow, SlidingWindows, WindowSpec};
