//! Sliding-window length search.

use super::cache::FeatureCache;
use super::{finite_score, FailurePolicy, SearchError};
use crate::classify::{AccuracyOracle, ClassifierKind};
use crate::core::{FeatureExtractor, FeatureSet, WindowSpec};
use crate::progress::{ProgressEvent, ProgressSink};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Window used for a classifier with no stored choice.
pub const DEFAULT_WINDOW_MS: u32 = 1000;

/// Offset between consecutive window starts.
pub const DEFAULT_STRIDE_MS: u32 = 1000;

/// Window lengths tried, in order. Earlier entries win ties.
pub const DEFAULT_WINDOW_MENU: [u32; 4] = [1000, 2000, 3000, 4000];

/// The winning window for one classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowChoice {
    pub window_ms: u32,
    pub accuracy: f64,
}

impl WindowChoice {
    pub fn window_secs(&self) -> f64 {
        f64::from(self.window_ms) / 1000.0
    }
}

/// Winning window per classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowOptimizationResult {
    choices: BTreeMap<ClassifierKind, WindowChoice>,
}

impl WindowOptimizationResult {
    pub fn get(&self, kind: ClassifierKind) -> Option<WindowChoice> {
        self.choices.get(&kind).copied()
    }

    /// The chosen window, or [`DEFAULT_WINDOW_MS`] without a record.
    pub fn window_for(&self, kind: ClassifierKind) -> u32 {
        self.get(kind).map_or(DEFAULT_WINDOW_MS, |c| c.window_ms)
    }

    /// Records in classifier order.
    pub fn iter(&self) -> impl Iterator<Item = (ClassifierKind, WindowChoice)> + '_ {
        self.choices.iter().map(|(&kind, &choice)| (kind, choice))
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// A copy of `self` with every record of `newer` replacing its own.
    pub fn merged_with(&self, newer: &WindowOptimizationResult) -> Self {
        let mut choices = self.choices.clone();
        choices.extend(newer.iter());
        Self { choices }
    }
}

impl FromIterator<(ClassifierKind, WindowChoice)> for WindowOptimizationResult {
    fn from_iter<I: IntoIterator<Item = (ClassifierKind, WindowChoice)>>(iter: I) -> Self {
        Self {
            choices: iter.into_iter().collect(),
        }
    }
}

/// Picks, per classifier, the window length with the highest accuracy.
///
/// Every menu entry is evaluated on the basic feature set. A candidate only
/// replaces the current best when strictly more accurate, so ties go to the
/// earlier (smaller) window and an all-zero sweep returns the first entry.
pub struct WindowSelector<'o, O: AccuracyOracle + ?Sized> {
    oracle: &'o O,
    menu: Vec<u32>,
    stride_ms: u32,
    feature_set: FeatureSet,
    policy: FailurePolicy,
}

impl<'o, O: AccuracyOracle + ?Sized> WindowSelector<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self {
            oracle,
            menu: DEFAULT_WINDOW_MENU.to_vec(),
            stride_ms: DEFAULT_STRIDE_MS,
            feature_set: FeatureSet::Basic,
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_menu(mut self, menu: Vec<u32>) -> Self {
        self.menu = menu;
        self
    }

    pub fn with_stride(mut self, stride_ms: u32) -> Self {
        self.stride_ms = stride_ms;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn menu(&self) -> &[u32] {
        &self.menu
    }

    pub fn stride_ms(&self) -> u32 {
        self.stride_ms
    }

    fn validate(&self) -> Result<(), SearchError> {
        if self.menu.is_empty() {
            return Err(SearchError::EmptyMenu);
        }
        if self.menu.contains(&0) {
            return Err(SearchError::ZeroWindow);
        }
        if self.stride_ms == 0 {
            return Err(SearchError::ZeroStride);
        }
        Ok(())
    }

    /// Sweep the menu for one classifier.
    ///
    /// A window that yields no rows scores 0.0 without consulting the oracle.
    pub fn select_window<E: FeatureExtractor + ?Sized>(
        &self,
        kind: ClassifierKind,
        cache: &mut FeatureCache<'_, E>,
        sink: &dyn ProgressSink,
    ) -> Result<WindowChoice, SearchError> {
        self.validate()?;

        let mut best = WindowChoice {
            window_ms: self.menu[0],
            accuracy: 0.0,
        };

        for &window_ms in &self.menu {
            let spec = WindowSpec::new(window_ms, self.stride_ms);
            let dataset = cache
                .get_or_extract(spec, self.feature_set, sink)
                .map_err(|source| SearchError::Extraction { window_ms, source })?;

            let accuracy = if dataset.is_empty() {
                sink.emit(&ProgressEvent::WindowEmpty {
                    classifier: kind,
                    window_ms,
                });
                0.0
            } else {
                match finite_score(self.oracle.accuracy(dataset, kind)) {
                    Ok(accuracy) => {
                        sink.emit(&ProgressEvent::WindowEvaluated {
                            classifier: kind,
                            window_ms,
                            accuracy,
                        });
                        accuracy
                    }
                    Err(error) => {
                        sink.emit(&ProgressEvent::WindowCandidateFailed {
                            classifier: kind,
                            window_ms,
                            error: error.to_string(),
                        });
                        self.policy
                            .on_failure(error)
                            .map_err(|source| SearchError::Oracle {
                                classifier: kind,
                                source,
                            })?
                    }
                }
            };

            if accuracy > best.accuracy {
                best = WindowChoice {
                    window_ms,
                    accuracy,
                };
            }
        }

        sink.emit(&ProgressEvent::WindowSelected {
            classifier: kind,
            window_ms: best.window_ms,
            accuracy: best.accuracy,
        });
        Ok(best)
    }

    /// Sweep the menu for each classifier, sharing extracted datasets.
    pub fn select_all<E: FeatureExtractor + ?Sized>(
        &self,
        kinds: &[ClassifierKind],
        cache: &mut FeatureCache<'_, E>,
        sink: &dyn ProgressSink,
    ) -> Result<WindowOptimizationResult, SearchError> {
        let mut choices = Vec::with_capacity(kinds.len());
        for &kind in kinds {
            choices.push((kind, self.select_window(kind, cache, sink)?));
        }
        Ok(choices.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::OracleError;
    use crate::core::{Dataset, DatasetError, Row, LABEL_COLUMN};
    use crate::progress::{ChannelSink, NullSink, RunStats};
    use std::cell::Cell;

    /// One row per extraction whose first value is the window length.
    struct WindowEcho {
        calls: Cell<usize>,
    }

    impl WindowEcho {
        fn new() -> Self {
            Self {
                calls: Cell::new(0),
            }
        }
    }

    impl FeatureExtractor for WindowEcho {
        fn extract(&self, spec: WindowSpec, set: FeatureSet) -> Result<Dataset, DatasetError> {
            self.calls.set(self.calls.get() + 1);
            let columns = set.column_names().iter().map(|c| c.to_string()).collect();
            let mut values = vec![0.0; set.len()];
            values[0] = f64::from(spec.window_ms);
            Dataset::with_rows(columns, LABEL_COLUMN, vec![Row::new(values, "walking")])
        }
    }

    fn window_of(ds: &Dataset) -> u32 {
        ds.rows()[0].values[0] as u32
    }

    fn window_choice(window_ms: u32, accuracy: f64) -> WindowChoice {
        WindowChoice {
            window_ms,
            accuracy,
        }
    }

    fn scores(
        table: &'static [(u32, f64)],
    ) -> impl Fn(&Dataset, ClassifierKind) -> Result<f64, OracleError> {
        move |ds: &Dataset, _kind: ClassifierKind| {
            let w = window_of(ds);
            Ok(table.iter().find(|(ms, _)| *ms == w).map_or(0.0, |(_, a)| *a))
        }
    }

    #[test]
    fn test_picks_most_accurate_window() {
        let oracle = scores(&[(1000, 0.70), (2000, 0.85), (3000, 0.80), (4000, 0.60)]);
        let extractor = WindowEcho::new();
        let mut cache = FeatureCache::new(&extractor);

        let choice = WindowSelector::new(&oracle)
            .select_window(ClassifierKind::Tree, &mut cache, &NullSink)
            .unwrap();
        assert_eq!(choice, window_choice(2000, 0.85));
    }

    #[test]
    fn test_tie_goes_to_smaller_window() {
        let oracle = scores(&[(1000, 0.90), (2000, 0.90), (3000, 0.80), (4000, 0.70)]);
        let extractor = WindowEcho::new();
        let mut cache = FeatureCache::new(&extractor);

        let choice = WindowSelector::new(&oracle)
            .select_window(ClassifierKind::Forest, &mut cache, &NullSink)
            .unwrap();
        assert_eq!(choice.window_ms, 1000);
        assert_eq!(choice.accuracy, 0.90);
    }

    #[test]
    fn test_all_zero_returns_first_entry() {
        let oracle = |_: &Dataset, _: ClassifierKind| -> Result<f64, OracleError> { Ok(0.0) };
        let extractor = WindowEcho::new();
        let mut cache = FeatureCache::new(&extractor);

        let choice = WindowSelector::new(&oracle)
            .with_menu(vec![3000, 1000])
            .select_window(ClassifierKind::Margin, &mut cache, &NullSink)
            .unwrap();
        assert_eq!(choice, window_choice(3000, 0.0));
    }

    #[test]
    fn test_failed_candidates_score_zero_by_default() {
        let oracle = |ds: &Dataset, _: ClassifierKind| -> Result<f64, OracleError> {
            match window_of(ds) {
                1000 => Err(OracleError::TooFewClasses { found: 1 }),
                2000 => Ok(0.4),
                _ => Err(OracleError::EmptyDataset),
            }
        };
        let extractor = WindowEcho::new();
        let mut cache = FeatureCache::new(&extractor);
        let stats = RunStats::new();

        let choice = WindowSelector::new(&oracle)
            .select_window(ClassifierKind::Tree, &mut cache, &stats)
            .unwrap();
        assert_eq!(choice.window_ms, 2000);

        let snapshot = stats.stats();
        assert_eq!(snapshot.oracle_failures, 3);
        assert_eq!(snapshot.extractions, 4);
    }

    /// Like [`WindowEcho`], but windows from `empty_from_ms` up yield no rows.
    struct ShortRecording {
        echo: WindowEcho,
        empty_from_ms: u32,
    }

    impl FeatureExtractor for ShortRecording {
        fn extract(&self, spec: WindowSpec, set: FeatureSet) -> Result<Dataset, DatasetError> {
            if spec.window_ms >= self.empty_from_ms {
                let columns = set.column_names().iter().map(|c| c.to_string()).collect();
                return Ok(Dataset::new(columns, LABEL_COLUMN));
            }
            self.echo.extract(spec, set)
        }
    }

    #[test]
    fn test_window_without_rows_scores_zero_unevaluated() {
        let evaluated = std::cell::RefCell::new(Vec::new());
        let oracle = |ds: &Dataset, _: ClassifierKind| -> Result<f64, OracleError> {
            evaluated.borrow_mut().push(window_of(ds));
            Ok(0.0)
        };
        let extractor = ShortRecording {
            echo: WindowEcho::new(),
            empty_from_ms: 4000,
        };
        let mut cache = FeatureCache::new(&extractor);
        let (sink, events) = ChannelSink::channel();

        let choice = WindowSelector::new(&oracle)
            .with_menu(vec![1000, 4000])
            .select_window(ClassifierKind::Tree, &mut cache, &sink)
            .unwrap();

        assert_eq!(choice, window_choice(1000, 0.0));
        assert_eq!(*evaluated.borrow(), vec![1000]);

        let events: Vec<ProgressEvent> = events.try_iter().collect();
        assert!(events.contains(&ProgressEvent::WindowEmpty {
            classifier: ClassifierKind::Tree,
            window_ms: 4000,
        }));
        assert!(!events.iter().any(|e| matches!(
            e,
            ProgressEvent::WindowEvaluated {
                window_ms: 4000,
                ..
            }
        )));
    }

    #[test]
    fn test_empty_windows_are_counted() {
        let oracle = scores(&[(1000, 0.6)]);
        let extractor = ShortRecording {
            echo: WindowEcho::new(),
            empty_from_ms: 3000,
        };
        let mut cache = FeatureCache::new(&extractor);
        let stats = RunStats::new();

        let choice = WindowSelector::new(&oracle)
            .select_window(ClassifierKind::Margin, &mut cache, &stats)
            .unwrap();
        assert_eq!(choice.window_ms, 1000);

        let snapshot = stats.stats();
        assert_eq!(snapshot.empty_windows, 2);
        assert_eq!(snapshot.oracle_calls, 2);
        assert_eq!(snapshot.oracle_failures, 0);
    }

    #[test]
    fn test_nan_score_is_a_failed_candidate() {
        let oracle = |ds: &Dataset, _: ClassifierKind| -> Result<f64, OracleError> {
            match window_of(ds) {
                1000 => Ok(f64::NAN),
                2000 => Ok(0.3),
                _ => Ok(0.2),
            }
        };
        let extractor = WindowEcho::new();
        let mut cache = FeatureCache::new(&extractor);

        let choice = WindowSelector::new(&oracle)
            .select_window(ClassifierKind::Forest, &mut cache, &NullSink)
            .unwrap();
        assert_eq!(choice, window_choice(2000, 0.3));

        let err = WindowSelector::new(&oracle)
            .with_policy(FailurePolicy::Abort)
            .select_window(ClassifierKind::Forest, &mut cache, &NullSink)
            .unwrap_err();
        assert!(matches!(
            err,
            SearchError::Oracle {
                source: OracleError::NonFiniteScore(_),
                ..
            }
        ));
    }

    #[test]
    fn test_abort_policy_propagates() {
        let oracle = |_: &Dataset, _: ClassifierKind| -> Result<f64, OracleError> {
            Err(OracleError::EmptyDataset)
        };
        let extractor = WindowEcho::new();
        let mut cache = FeatureCache::new(&extractor);

        let err = WindowSelector::new(&oracle)
            .with_policy(FailurePolicy::Abort)
            .select_window(ClassifierKind::Tree, &mut cache, &NullSink)
            .unwrap_err();
        assert!(matches!(
            err,
            SearchError::Oracle {
                classifier: ClassifierKind::Tree,
                source: OracleError::EmptyDataset
            }
        ));
    }

    #[test]
    fn test_invalid_menus() {
        let oracle = scores(&[]);
        let extractor = WindowEcho::new();
        let mut cache = FeatureCache::new(&extractor);

        let empty = WindowSelector::new(&oracle).with_menu(Vec::new());
        assert!(matches!(
            empty.select_window(ClassifierKind::Tree, &mut cache, &NullSink),
            Err(SearchError::EmptyMenu)
        ));
        let zero = WindowSelector::new(&oracle).with_menu(vec![1000, 0]);
        assert!(matches!(
            zero.select_window(ClassifierKind::Tree, &mut cache, &NullSink),
            Err(SearchError::ZeroWindow)
        ));
        let no_stride = WindowSelector::new(&oracle).with_stride(0);
        assert!(matches!(
            no_stride.select_window(ClassifierKind::Tree, &mut cache, &NullSink),
            Err(SearchError::ZeroStride)
        ));
    }

    #[test]
    fn test_select_all_shares_extractions() {
        let oracle = scores(&[(1000, 0.5), (4000, 0.9)]);
        let extractor = WindowEcho::new();
        let mut cache = FeatureCache::new(&extractor);
        let (sink, events) = ChannelSink::channel();

        let result = WindowSelector::new(&oracle)
            .select_all(&ClassifierKind::ALL, &mut cache, &sink)
            .unwrap();

        assert_eq!(extractor.calls.get(), 4);
        assert_eq!(result.len(), 3);
        for kind in ClassifierKind::ALL {
            assert_eq!(result.window_for(kind), 4000);
        }
        let selected = events
            .try_iter()
            .filter(|e| matches!(e, ProgressEvent::WindowSelected { .. }))
            .count();
        assert_eq!(selected, 3);
    }

    #[test]
    fn test_selection_is_deterministic() {
        let oracle = scores(&[(1000, 0.61), (2000, 0.64), (3000, 0.66), (4000, 0.65)]);
        let extractor = WindowEcho::new();
        let run = || {
            let mut cache = FeatureCache::new(&extractor);
            WindowSelector::new(&oracle)
                .select_window(ClassifierKind::Forest, &mut cache, &NullSink)
                .unwrap()
        };
        assert_eq!(run(), run());
        assert_eq!(run().window_ms, 3000);
    }

    #[test]
    fn test_result_defaults_and_merge() {
        let empty = WindowOptimizationResult::default();
        assert_eq!(empty.window_for(ClassifierKind::Tree), DEFAULT_WINDOW_MS);
        assert!(empty.get(ClassifierKind::Tree).is_none());

        let old: WindowOptimizationResult = [
            (ClassifierKind::Tree, window_choice(2000, 0.8)),
            (ClassifierKind::Margin, window_choice(3000, 0.7)),
        ]
        .into_iter()
        .collect();
        let newer: WindowOptimizationResult =
            [(ClassifierKind::Tree, window_choice(4000, 0.9))]
                .into_iter()
                .collect();

        let merged = old.merged_with(&newer);
        assert_eq!(merged.window_for(ClassifierKind::Tree), 4000);
        assert_eq!(merged.window_for(ClassifierKind::Margin), 3000);
        assert_eq!(old.window_for(ClassifierKind::Tree), 2000);
    }
}
