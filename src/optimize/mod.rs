//! Per-classifier configuration search.
//!
//! Two searches run independently for every classifier:
//! - [`WindowSelector`] picks the sliding-window length that maximizes
//!   accuracy on the basic feature set.
//! - [`FeatureSelector`] runs sequential forward selection over the expanded
//!   feature set extracted at that window.
//!
//! Both consult an [`AccuracyOracle`](crate::classify::AccuracyOracle) and
//! report progress to a [`ProgressSink`](crate::progress::ProgressSink).
//! Extracted datasets are shared through a [`FeatureCache`].

pub mod cache;
pub mod persist;
pub mod sfs;
pub mod window;

pub use cache::FeatureCache;
pub use persist::{
    load_window_ms, parse_window_config, read_window_config, render_window_config,
    store_window_config, write_window_config, WINDOW_CONFIG_FILE,
};
pub use sfs::{write_selection, FeatureSelector, SfsResult, SfsRound, DEFAULT_MIN_IMPROVEMENT};
pub use window::{
    WindowChoice, WindowOptimizationResult, WindowSelector, DEFAULT_STRIDE_MS, DEFAULT_WINDOW_MENU,
    DEFAULT_WINDOW_MS,
};

use crate::classify::{ClassifierKind, OracleError};
use crate::core::DatasetError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a search does when the oracle cannot score a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Score the candidate 0.0 and keep searching
    #[default]
    ScoreAsZero,
    /// Stop the search and return the error
    Abort,
}

impl FailurePolicy {
    /// Turn a failed evaluation into a score, or give the error back.
    pub fn on_failure(self, error: OracleError) -> Result<f64, OracleError> {
        match self {
            FailurePolicy::ScoreAsZero => Ok(0.0),
            FailurePolicy::Abort => Err(error),
        }
    }
}

/// Treat a NaN or infinite score as a failed evaluation.
pub(crate) fn finite_score(scored: Result<f64, OracleError>) -> Result<f64, OracleError> {
    scored.and_then(|accuracy| {
        if accuracy.is_finite() {
            Ok(accuracy)
        } else {
            Err(OracleError::NonFiniteScore(accuracy.to_string()))
        }
    })
}

/// Errors that end a search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("window menu is empty")]
    EmptyMenu,

    #[error("window sizes must be positive")]
    ZeroWindow,

    #[error("stride must be positive")]
    ZeroStride,

    #[error("minimum improvement must be finite and non-negative, got {0}")]
    InvalidThreshold(f64),

    #[error("feature extraction failed for {window_ms} ms windows: {source}")]
    Extraction {
        window_ms: u32,
        #[source]
        source: DatasetError,
    },

    #[error("{classifier} evaluation failed: {source}")]
    Oracle {
        classifier: ClassifierKind,
        #[source]
        source: OracleError,
    },

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}
