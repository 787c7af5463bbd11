//! Configuration for experiment runs.

use crate::classify::forest::DEFAULT_TREES;
use crate::classify::{DEFAULT_FOLDS, DEFAULT_SEED};
use crate::core::DEFAULT_MIN_SAMPLES_PER_WINDOW;
use crate::ingest::{FORMATTED_DATA_DIR, RAW_DATA_DIR};
use crate::optimize::{
    FailurePolicy, DEFAULT_MIN_IMPROVEMENT, DEFAULT_STRIDE_MS, DEFAULT_WINDOW_MENU,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory under the base directory that receives every output.
pub const RESULTS_DIR: &str = "results";

/// Main configuration for an experiment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Experiment root holding `raw_data/`, `formatted_data/` and `results/`
    pub base_dir: PathBuf,

    /// Window lengths tried by the window search, in tie-break order
    pub window_menu_ms: Vec<u32>,

    /// Offset between window starts
    pub stride_ms: u32,

    /// Windows with fewer samples are dropped
    pub min_samples_per_window: usize,

    /// Smallest accuracy gain that keeps feature selection going
    pub min_improvement: f64,

    /// Cross-validation folds
    pub cv_folds: usize,

    /// Seed for fold assignment and model randomness
    pub seed: u64,

    /// Trees per random forest
    pub forest_trees: usize,

    /// What to do when a candidate cannot be scored
    pub failure_policy: FailurePolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("."),
            window_menu_ms: DEFAULT_WINDOW_MENU.to_vec(),
            stride_ms: DEFAULT_STRIDE_MS,
            min_samples_per_window: DEFAULT_MIN_SAMPLES_PER_WINDOW,
            min_improvement: DEFAULT_MIN_IMPROVEMENT,
            cv_folds: DEFAULT_FOLDS,
            seed: DEFAULT_SEED,
            forest_trees: DEFAULT_TREES,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::ParseError(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("activity-tuner")
            .join("config.json")
    }

    /// Reject settings no run could use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_menu_ms.is_empty() {
            return Err(ConfigError::Invalid("window_menu_ms is empty".into()));
        }
        if self.window_menu_ms.contains(&0) {
            return Err(ConfigError::Invalid("window sizes must be positive".into()));
        }
        if self.stride_ms == 0 {
            return Err(ConfigError::Invalid("stride_ms must be positive".into()));
        }
        if self.cv_folds < 2 {
            return Err(ConfigError::Invalid(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        if !(self.min_improvement.is_finite() && self.min_improvement >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "min_improvement must be finite and non-negative, got {}",
                self.min_improvement
            )));
        }
        Ok(())
    }

    pub fn raw_data_dir(&self) -> PathBuf {
        self.base_dir.join(RAW_DATA_DIR)
    }

    pub fn formatted_data_dir(&self) -> PathBuf {
        self.base_dir.join(FORMATTED_DATA_DIR)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.base_dir.join(RESULTS_DIR)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.results_dir().join("logs")
    }

    /// Ensure all required directories exist.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(self.results_dir())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        std::fs::create_dir_all(self.logs_dir()).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Serialize error: {0}")]
    SerializeError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
