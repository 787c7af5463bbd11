//! Experiment orchestration.
//!
//! A [`Pipeline`] ties the pieces together for one experiment directory:
//!
//! ```text
//! raw_data/ ──format──▶ formatted_data/ ──load──▶ RecordingExtractor
//!                                                      │
//!                                               FeatureCache (shared)
//!                                                      │
//!          ┌──────────────┬────────────────┬───────────┴──────────┐
//!          ▼              ▼                ▼                      ▼
//!      baseline     window search   master datasets      feature selection
//!    (1s, basic)    (basic, menu)   (expanded, best)     (SFS per classifier)
//!          └──────────────┴────────────────┴──────────────────────┘
//!                                    │
//!                          results/final_report/
//! ```
//!
//! Every step writes its artifacts under `<base>/results/`.

use crate::classify::{ClassifierKind, CrossValidator, Evaluation, OracleError};
use crate::config::Config;
use crate::core::{Dataset, DatasetError, FeatureSet, RecordingExtractor, WindowSpec};
use crate::ingest::{self, IngestError};
use crate::optimize::{
    read_window_config, store_window_config, write_selection, FailurePolicy, FeatureCache,
    FeatureSelector, SearchError, SfsResult, WindowOptimizationResult, WindowSelector,
    DEFAULT_WINDOW_MS, WINDOW_CONFIG_FILE,
};
use crate::progress::{NullSink, ProgressSink};
use crate::report::{
    render_baseline_report, render_experiment_report, render_sfs_report, write_evaluation_report,
    BaselineEntry, ExperimentSummary, MasterDataset,
};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

/// Window used by the baseline step.
pub const BASELINE_WINDOW_MS: u32 = DEFAULT_WINDOW_MS;

/// Subdirectories of `<base>/results`.
pub const BASELINE_DIR: &str = "baseline";
pub const FEATURES_DIR: &str = "features";
pub const WINDOW_DIR: &str = "window_optimization";
pub const SELECTION_DIR: &str = "feature_selection";
pub const FINAL_DIR: &str = "final_report";
pub const CUSTOM_DIR: &str = "custom";

type Cache<'e> = FeatureCache<'e, RecordingExtractor>;

/// Errors that stop a pipeline step.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error("no recordings found in {0:?}")]
    NoRecordings(PathBuf),

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PipelineError + '_ {
    move |source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_text(path: &Path, contents: &str) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error(parent))?;
    }
    fs::write(path, contents).map_err(io_error(path))
}

/// A single configuration run outside the full experiment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CustomExperiment {
    pub feature_set: FeatureSet,
    pub window_ms: u32,
    pub classifier: ClassifierKind,
    /// Run feature selection instead of evaluating every column
    pub sfs: bool,
}

impl fmt::Display for CustomExperiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}ms_{}",
            self.feature_set,
            self.window_ms,
            self.classifier.slug()
        )?;
        if self.sfs {
            f.write_str("_sfs")?;
        }
        Ok(())
    }
}

/// What a custom run produced.
#[derive(Debug, Clone)]
pub struct CustomOutcome {
    pub experiment: CustomExperiment,
    pub accuracy: f64,
    pub rows: usize,
    pub selection: Option<SfsResult>,
    pub output_dir: PathBuf,
}

/// Runs experiment steps against one base directory.
pub struct Pipeline {
    config: Config,
    validator: CrossValidator,
    sink: Box<dyn ProgressSink>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let validator = CrossValidator::new(config.cv_folds, config.seed)
            .with_forest_trees(config.forest_trees);
        Self {
            config,
            validator,
            sink: Box::new(NullSink),
        }
    }

    /// Send search progress to `sink` instead of discarding it.
    pub fn with_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn validator(&self) -> &CrossValidator {
        &self.validator
    }

    pub fn results_dir(&self, step: &str) -> PathBuf {
        self.config.results_dir().join(step)
    }

    pub fn window_config_path(&self) -> PathBuf {
        self.results_dir(WINDOW_DIR).join(WINDOW_CONFIG_FILE)
    }

    fn spec(&self, window_ms: u32) -> WindowSpec {
        WindowSpec::new(window_ms, self.config.stride_ms)
    }

    /// Format raw exports. Returns the number of files written.
    pub fn format(&self) -> Result<usize, PipelineError> {
        Ok(ingest::format_raw_data(&self.config.base_dir)?)
    }

    /// Load formatted recordings, formatting raw data first if needed.
    pub fn load_extractor(&self) -> Result<RecordingExtractor, PipelineError> {
        let formatted = self.config.formatted_data_dir();
        if !formatted.is_dir() {
            info!(dir = ?formatted, "formatted data missing, formatting raw data");
            self.format()?;
        }

        let recordings = ingest::load_recordings(&formatted)?;
        if recordings.is_empty() {
            return Err(PipelineError::NoRecordings(formatted));
        }
        Ok(RecordingExtractor::new(recordings).with_min_samples(self.config.min_samples_per_window))
    }

    /// Extract one feature set at one window and write it as CSV.
    ///
    /// Returns the written path and the number of rows.
    pub fn extract(
        &self,
        window_ms: u32,
        feature_set: FeatureSet,
    ) -> Result<(PathBuf, usize), PipelineError> {
        if window_ms == 0 {
            return Err(SearchError::ZeroWindow.into());
        }
        let extractor = self.load_extractor()?;
        let mut cache = FeatureCache::new(&extractor);
        let dataset = cache.get_or_extract(self.spec(window_ms), feature_set, &*self.sink)?;

        let path = self
            .results_dir(FEATURES_DIR)
            .join(format!("{feature_set}_features_{window_ms}ms.csv"));
        dataset.write_csv(&path)?;
        info!(path = ?path, rows = dataset.len(), "features written");
        Ok((path, dataset.len()))
    }

    /// Cross-validate, applying the failure policy. `None` means the
    /// evaluation failed and was scored as zero.
    fn evaluate(
        &self,
        dataset: &Dataset,
        kind: ClassifierKind,
    ) -> Result<Option<Evaluation>, PipelineError> {
        match self.validator.evaluate(dataset, kind) {
            Ok(eval) => Ok(Some(eval)),
            Err(error) => match self.config.failure_policy {
                FailurePolicy::ScoreAsZero => {
                    warn!(classifier = %kind, %error, "evaluation failed, scoring 0");
                    Ok(None)
                }
                FailurePolicy::Abort => Err(error.into()),
            },
        }
    }

    /// Evaluate every classifier on the basic features at the baseline window.
    pub fn baseline(&self) -> Result<Vec<BaselineEntry>, PipelineError> {
        let extractor = self.load_extractor()?;
        let mut cache = FeatureCache::new(&extractor);
        self.baseline_with(&mut cache)
    }

    fn baseline_with(&self, cache: &mut Cache<'_>) -> Result<Vec<BaselineEntry>, PipelineError> {
        let dir = self.results_dir(BASELINE_DIR);
        let dataset = cache.get_or_extract(
            self.spec(BASELINE_WINDOW_MS),
            FeatureSet::Basic,
            &*self.sink,
        )?;
        dataset.write_csv(&dir.join(format!("basic_features_{BASELINE_WINDOW_MS}ms.csv")))?;

        let mut entries = Vec::with_capacity(ClassifierKind::ALL.len());
        for kind in ClassifierKind::ALL {
            let accuracy = match self.evaluate(dataset, kind)? {
                Some(eval) => {
                    write_evaluation_report(&dir, "baseline", kind, dataset, &eval)
                        .map_err(io_error(&dir))?;
                    eval.accuracy()
                }
                None => 0.0,
            };
            info!(classifier = %kind, accuracy, "baseline evaluated");
            entries.push(BaselineEntry {
                classifier: kind,
                accuracy,
            });
        }

        write_text(
            &dir.join("baseline_results.txt"),
            &render_baseline_report(BASELINE_WINDOW_MS, &entries),
        )?;
        Ok(entries)
    }

    /// Find and store the best window for every classifier.
    pub fn optimize_windows(&self) -> Result<WindowOptimizationResult, PipelineError> {
        let extractor = self.load_extractor()?;
        let mut cache = FeatureCache::new(&extractor);
        self.optimize_with(&mut cache)
    }

    fn optimize_with(
        &self,
        cache: &mut Cache<'_>,
    ) -> Result<WindowOptimizationResult, PipelineError> {
        let sink = &*self.sink;
        let dir = self.results_dir(WINDOW_DIR);
        let selector = WindowSelector::new(&self.validator)
            .with_menu(self.config.window_menu_ms.clone())
            .with_stride(self.config.stride_ms)
            .with_policy(self.config.failure_policy);

        let result = selector.select_all(&ClassifierKind::ALL, cache, sink)?;

        for &window_ms in selector.menu() {
            if let Some(dataset) = cache.get(self.spec(window_ms), FeatureSet::Basic) {
                dataset.write_csv(&dir.join(format!("window_{window_ms}ms_features.csv")))?;
            }
        }

        let config_path = self.window_config_path();
        store_window_config(&config_path, &result).map_err(io_error(&config_path))?;
        info!(path = ?config_path, "optimal windows stored");

        for (kind, choice) in result.iter() {
            let dataset =
                cache.get_or_extract(self.spec(choice.window_ms), FeatureSet::Basic, sink)?;
            if let Some(eval) = self.evaluate(dataset, kind)? {
                let report_dir = dir.join(kind.slug());
                write_evaluation_report(
                    &report_dir,
                    &format!("window_{}ms", choice.window_ms),
                    kind,
                    dataset,
                    &eval,
                )
                .map_err(io_error(&report_dir))?;
            }
        }

        Ok(result)
    }

    /// Window choices stored by an earlier run, if any.
    pub fn stored_windows(&self) -> Option<WindowOptimizationResult> {
        read_window_config(&self.window_config_path())
    }

    /// Run feature selection for every classifier on its master dataset.
    ///
    /// Uses stored window choices; runs the window search first when none
    /// are stored.
    pub fn run_selection(&self) -> Result<Vec<SfsResult>, PipelineError> {
        let extractor = self.load_extractor()?;
        let mut cache = FeatureCache::new(&extractor);

        let windows = match self.stored_windows() {
            Some(windows) => windows,
            None => {
                info!("no stored window choices, running window optimization first");
                self.optimize_with(&mut cache)?
            }
        };
        let (_, selections) = self.select_with(&mut cache, &windows)?;
        Ok(selections)
    }

    fn select_with(
        &self,
        cache: &mut Cache<'_>,
        windows: &WindowOptimizationResult,
    ) -> Result<(Vec<MasterDataset>, Vec<SfsResult>), PipelineError> {
        let sink = &*self.sink;
        let dir = self.results_dir(SELECTION_DIR);
        let selector = FeatureSelector::new(&self.validator)
            .with_min_improvement(self.config.min_improvement)
            .with_policy(self.config.failure_policy);

        let mut masters = Vec::with_capacity(ClassifierKind::ALL.len());
        let mut selections = Vec::with_capacity(ClassifierKind::ALL.len());

        for kind in ClassifierKind::ALL {
            let window_ms = windows.window_for(kind);
            let dataset = cache.get_or_extract(self.spec(window_ms), FeatureSet::Expanded, sink)?;

            let master_path = dir.join(format!("master_{}_{window_ms}ms.csv", kind.slug()));
            dataset.write_csv(&master_path)?;
            masters.push(MasterDataset {
                classifier: kind,
                window_ms,
                rows: dataset.len(),
                path: master_path,
            });

            let result = selector.select_features(kind, dataset, sink)?;
            let sfs_dir = dir.join(format!("sfs_{}", kind.slug()));
            self.persist_selection(&sfs_dir, dataset, &result, window_ms)?;
            selections.push(result);
        }

        Ok((masters, selections))
    }

    /// Write the projected dataset, the round trace and an evaluation report
    /// of the selected subset.
    fn persist_selection(
        &self,
        dir: &Path,
        dataset: &Dataset,
        result: &SfsResult,
        window_ms: u32,
    ) -> Result<(), PipelineError> {
        let kind = result.classifier();
        let path = write_selection(dataset, result, dir)?;
        info!(classifier = %kind, path = ?path, "selected features written");

        write_text(
            &dir.join(format!("sfs_{}_report.txt", kind.slug())),
            &render_sfs_report(result, window_ms),
        )?;

        if result.feature_count() > 0 {
            let projected = result.project(dataset)?;
            if let Some(eval) = self.evaluate(&projected, kind)? {
                write_evaluation_report(
                    dir,
                    &format!("sfs_{}features", result.feature_count()),
                    kind,
                    &projected,
                    &eval,
                )
                .map_err(io_error(dir))?;
            }
        }
        Ok(())
    }

    /// Baseline, window search, master datasets and feature selection,
    /// sharing one feature cache, followed by the final report.
    pub fn run_experiment(&self) -> Result<ExperimentSummary, PipelineError> {
        let extractor = self.load_extractor()?;
        let mut cache = FeatureCache::new(&extractor);

        info!("step 1: baseline");
        let baseline = self.baseline_with(&mut cache)?;
        info!("step 2: window optimization");
        let windows = self.optimize_with(&mut cache)?;
        info!("step 3: master datasets and feature selection");
        let (masters, selections) = self.select_with(&mut cache, &windows)?;

        let summary = ExperimentSummary::new(baseline, windows, masters, selections);
        let dir = self.results_dir(FINAL_DIR);
        write_text(
            &dir.join("experiment_report.txt"),
            &render_experiment_report(&summary),
        )?;
        let json_path = dir.join("experiment_summary.json");
        summary.save_json(&json_path).map_err(io_error(&json_path))?;
        info!(run_id = %summary.run_id, datasets = cache.len(), "experiment finished");

        Ok(summary)
    }

    /// Evaluate one feature set, window and classifier, with optional feature selection.
    pub fn run_custom(&self, experiment: CustomExperiment) -> Result<CustomOutcome, PipelineError> {
        if experiment.window_ms == 0 {
            return Err(SearchError::ZeroWindow.into());
        }
        let extractor = self.load_extractor()?;
        let mut cache = FeatureCache::new(&extractor);
        let sink = &*self.sink;
        let kind = experiment.classifier;

        let output_dir = self.results_dir(CUSTOM_DIR).join(experiment.to_string());
        let spec = self.spec(experiment.window_ms);
        let dataset = cache.get_or_extract(spec, experiment.feature_set, sink)?;
        dataset.write_csv(&output_dir.join("features.csv"))?;

        let (accuracy, selection) = if experiment.sfs {
            let result = FeatureSelector::new(&self.validator)
                .with_min_improvement(self.config.min_improvement)
                .with_policy(self.config.failure_policy)
                .select_features(kind, dataset, sink)?;
            self.persist_selection(&output_dir, dataset, &result, experiment.window_ms)?;
            (result.accuracy(), Some(result))
        } else {
            let accuracy = match self.evaluate(dataset, kind)? {
                Some(eval) => {
                    let title = experiment.to_string();
                    write_evaluation_report(&output_dir, &title, kind, dataset, &eval)
                        .map_err(io_error(&output_dir))?;
                    eval.accuracy()
                }
                None => 0.0,
            };
            (accuracy, None)
        };

        Ok(CustomOutcome {
            experiment,
            accuracy,
            rows: dataset.len(),
            selection,
            output_dir,
        })
    }

    /// Convert a feature CSV to ARFF. Defaults to the CSV path with an
    /// `.arff` extension.
    pub fn export_arff(&self, csv: &Path, output: Option<&Path>) -> Result<PathBuf, PipelineError> {
        let dataset = Dataset::read_csv(csv)?;
        let relation = csv
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "activity".to_string());
        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| csv.with_extension("arff"));
        dataset.write_arff(&path, &relation)?;
        Ok(path)
    }
}
