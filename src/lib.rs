//! Activity Tuner - window-size and feature-subset search for accelerometer
//! activity recognition.
//!
//! Raw smartwatch accelerometer exports are cut into sliding windows and
//! summarized as per-axis statistics. Each classifier then gets its own
//! window length and feature subset, chosen by cross-validated accuracy.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Activity Tuner                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Ingest    │──▶│  Windowing  │──▶│  Features   │       │
//! │  │ (raw→fmt)   │   │ (win/stride)│   │ (6 or 12)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │              │
//! │                                              ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Progress   │◀──│  Optimize   │──▶│  Classify   │       │
//! │  │   (sinks)   │   │ (window+SFS)│   │  (k-fold)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                                 │
//! │                           ▼                                 │
//! │                    ┌─────────────┐                          │
//! │                    │   Reports   │                          │
//! │                    └─────────────┘                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use activity_tuner::{Config, Pipeline, TracingSink};
//!
//! let config = Config {
//!     base_dir: "experiment".into(),
//!     ..Config::default()
//! };
//! let pipeline = Pipeline::new(config).with_sink(TracingSink);
//!
//! let summary = pipeline.run_experiment().expect("experiment failed");
//! if let Some(best) = summary.best_performer() {
//!     println!("{} {:.4}", best.classifier(), best.accuracy());
//! }
//! ```

pub mod classify;
pub mod config;
pub mod core;
pub mod ingest;
pub mod optimize;
pub mod pipeline;
pub mod progress;
pub mod report;

// Re-export key types at crate root for convenience
pub use classify::{AccuracyOracle, ClassifierKind, CrossValidator, Evaluation, OracleError};
pub use config::{Config, ConfigError};
pub use crate::core::{
    Dataset, DatasetError, FeatureExtractor, FeatureSet, RecordingExtractor, WindowSpec,
};
pub use optimize::{
    FailurePolicy, FeatureCache, FeatureSelector, SearchError, SfsResult, WindowChoice,
    WindowOptimizationResult, WindowSelector,
};
pub use pipeline::{CustomExperiment, Pipeline, PipelineError};
pub use progress::{
    ChannelSink, Fanout, NullSink, ProgressEvent, ProgressSink, RunStats, TracingSink,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
