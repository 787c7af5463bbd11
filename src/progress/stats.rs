//! Run statistics.
//!
//! Counts what a run did (extractions, cache hits, oracle calls) from the
//! progress events it emits, and persists the totals as JSON next to the
//! run's reports.

use super::{ProgressEvent, ProgressSink};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the current run.
#[derive(Debug)]
pub struct RunStats {
    /// Datasets extracted from recordings
    extractions: AtomicU64,
    /// Datasets served from the feature cache
    cache_hits: AtomicU64,
    /// Accuracy requests made to the oracle, failed ones included
    oracle_calls: AtomicU64,
    /// Accuracy requests that failed
    oracle_failures: AtomicU64,
    /// SFS rounds completed, committed or not
    sfs_rounds: AtomicU64,
    /// Window candidates that produced no rows
    empty_windows: AtomicU64,
    /// Run start time
    started: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl RunStats {
    pub fn new() -> Self {
        Self {
            extractions: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            oracle_calls: AtomicU64::new(0),
            oracle_failures: AtomicU64::new(0),
            sfs_rounds: AtomicU64::new(0),
            empty_windows: AtomicU64::new(0),
            started: Utc::now(),
            persist_path: None,
        }
    }

    /// Create run stats that [`save`](Self::save) writes to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);
        stats
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStatsSnapshot {
        RunStatsSnapshot {
            extractions: self.extractions.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            oracle_calls: self.oracle_calls.load(Ordering::Relaxed),
            oracle_failures: self.oracle_failures.load(Ordering::Relaxed),
            sfs_rounds: self.sfs_rounds.load(Ordering::Relaxed),
            empty_windows: self.empty_windows.load(Ordering::Relaxed),
            started: self.started,
            duration_secs: (Utc::now() - self.started).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Feature extractions: {}\n\
             - Feature cache hits: {}\n\
             - Classifier evaluations: {}\n\
             - Failed evaluations: {}\n\
             - Feature selection rounds: {}\n\
             - Empty window candidates: {}\n\
             - Duration: {} seconds",
            stats.extractions,
            stats.cache_hits,
            stats.oracle_calls,
            stats.oracle_failures,
            stats.sfs_rounds,
            stats.empty_windows,
            stats.duration_secs
        )
    }

    /// Save stats to disk. Does nothing without a persist path.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats {
                stats: self.stats(),
                finished: Utc::now(),
            };
            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.extractions.store(0, Ordering::Relaxed);
        self.cache_hits.store(0, Ordering::Relaxed);
        self.oracle_calls.store(0, Ordering::Relaxed);
        self.oracle_failures.store(0, Ordering::Relaxed);
        self.sfs_rounds.store(0, Ordering::Relaxed);
        self.empty_windows.store(0, Ordering::Relaxed);
    }
}

impl Default for RunStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for RunStats {
    fn emit(&self, event: &ProgressEvent) {
        let counter = match event {
            ProgressEvent::FeaturesExtracted { .. } => &self.extractions,
            ProgressEvent::FeatureCacheHit { .. } => &self.cache_hits,
            ProgressEvent::WindowEvaluated { .. } | ProgressEvent::SfsCandidateEvaluated { .. } => {
                &self.oracle_calls
            }
            ProgressEvent::WindowCandidateFailed { .. }
            | ProgressEvent::SfsCandidateFailed { .. } => {
                self.oracle_calls.fetch_add(1, Ordering::Relaxed);
                &self.oracle_failures
            }
            ProgressEvent::SfsRoundCompleted { .. } => &self.sfs_rounds,
            ProgressEvent::WindowEmpty { .. } => &self.empty_windows,
            ProgressEvent::WindowSelected { .. } | ProgressEvent::SfsFinished { .. } => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatsSnapshot {
    pub extractions: u64,
    pub cache_hits: u64,
    pub oracle_calls: u64,
    pub oracle_failures: u64,
    pub sfs_rounds: u64,
    pub empty_windows: u64,
    pub started: DateTime<Utc>,
    pub duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    #[serde(flatten)]
    stats: RunStatsSnapshot,
    finished: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ClassifierKind;
    use crate::core::FeatureSet;

    fn failed() -> ProgressEvent {
        ProgressEvent::SfsCandidateFailed {
            classifier: ClassifierKind::Forest,
            round: 1,
            column: 3,
            error: "boom".into(),
        }
    }

    #[test]
    fn test_counts_events() {
        let stats = RunStats::new();

        stats.emit(&ProgressEvent::FeaturesExtracted {
            window_ms: 1000,
            feature_set: FeatureSet::Basic,
            rows: 40,
        });
        stats.emit(&ProgressEvent::FeatureCacheHit {
            window_ms: 1000,
            feature_set: FeatureSet::Basic,
        });
        stats.emit(&ProgressEvent::WindowEvaluated {
            classifier: ClassifierKind::Tree,
            window_ms: 1000,
            accuracy: 0.5,
        });
        stats.emit(&failed());
        stats.emit(&ProgressEvent::WindowEmpty {
            classifier: ClassifierKind::Tree,
            window_ms: 4000,
        });

        let snapshot = stats.stats();
        assert_eq!(snapshot.empty_windows, 1);
        assert_eq!(snapshot.extractions, 1);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.oracle_calls, 2);
        assert_eq!(snapshot.oracle_failures, 1);
        assert_eq!(snapshot.sfs_rounds, 0);
    }

    #[test]
    fn test_reset() {
        let stats = RunStats::new();
        stats.emit(&failed());
        stats.reset();

        let snapshot = stats.stats();
        assert_eq!(snapshot.oracle_calls, 0);
        assert_eq!(snapshot.oracle_failures, 0);
    }

    #[test]
    fn test_summary_format() {
        let summary = RunStats::new().summary();
        assert!(summary.contains("Feature extractions"));
        assert!(summary.contains("Classifier evaluations"));
    }

    #[test]
    fn test_save_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run_stats.json");
        let stats = RunStats::with_persistence(path.clone());
        stats.emit(&failed());
        stats.save().unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["oracle_failures"], 1);
        assert!(json.get("finished").is_some());
    }

    #[test]
    fn test_save_without_path_is_noop() {
        RunStats::new().save().unwrap();
    }
}
