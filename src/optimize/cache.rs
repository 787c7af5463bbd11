//! Memoized feature extraction.

use crate::core::{Dataset, DatasetError, FeatureExtractor, FeatureSet, WindowSpec};
use crate::progress::{ProgressEvent, ProgressSink};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Extracts each `(window, stride, feature set)` dataset once and hands out
/// shared references afterwards.
pub struct FeatureCache<'e, E: FeatureExtractor + ?Sized> {
    extractor: &'e E,
    datasets: BTreeMap<(WindowSpec, FeatureSet), Dataset>,
}

impl<'e, E: FeatureExtractor + ?Sized> FeatureCache<'e, E> {
    pub fn new(extractor: &'e E) -> Self {
        Self {
            extractor,
            datasets: BTreeMap::new(),
        }
    }

    /// Return the cached dataset, extracting it on first use.
    pub fn get_or_extract(
        &mut self,
        spec: WindowSpec,
        feature_set: FeatureSet,
        sink: &dyn ProgressSink,
    ) -> Result<&Dataset, DatasetError> {
        match self.datasets.entry((spec, feature_set)) {
            Entry::Occupied(entry) => {
                sink.emit(&ProgressEvent::FeatureCacheHit {
                    window_ms: spec.window_ms,
                    feature_set,
                });
                Ok(entry.into_mut())
            }
            Entry::Vacant(entry) => {
                let dataset = self.extractor.extract(spec, feature_set)?;
                sink.emit(&ProgressEvent::FeaturesExtracted {
                    window_ms: spec.window_ms,
                    feature_set,
                    rows: dataset.len(),
                });
                Ok(entry.insert(dataset))
            }
        }
    }

    /// A dataset that was already extracted.
    pub fn get(&self, spec: WindowSpec, feature_set: FeatureSet) -> Option<&Dataset> {
        self.datasets.get(&(spec, feature_set))
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    /// Cached datasets ordered by window, stride, then feature set.
    pub fn iter(&self) -> impl Iterator<Item = (WindowSpec, FeatureSet, &Dataset)> + '_ {
        self.datasets.iter().map(|(&(spec, set), ds)| (spec, set, ds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Row, LABEL_COLUMN};
    use crate::progress::ChannelSink;
    use std::cell::Cell;

    struct CountingExtractor {
        calls: Cell<usize>,
    }

    impl FeatureExtractor for CountingExtractor {
        fn extract(
            &self,
            spec: WindowSpec,
            feature_set: FeatureSet,
        ) -> Result<Dataset, DatasetError> {
            self.calls.set(self.calls.get() + 1);
            let columns = feature_set.column_names().iter().map(|c| c.to_string()).collect();
            let values = vec![f64::from(spec.window_ms); feature_set.len()];
            Dataset::with_rows(columns, LABEL_COLUMN, vec![Row::new(values, "walking")])
        }
    }

    #[test]
    fn test_extracts_once_per_key() {
        let extractor = CountingExtractor {
            calls: Cell::new(0),
        };
        let mut cache = FeatureCache::new(&extractor);
        let (sink, events) = ChannelSink::channel();

        let spec = WindowSpec::new(2000, 1000);
        let first = cache.get_or_extract(spec, FeatureSet::Basic, &sink).unwrap().clone();
        let second = cache.get_or_extract(spec, FeatureSet::Basic, &sink).unwrap();
        assert_eq!(&first, second);
        assert_eq!(extractor.calls.get(), 1);

        cache.get_or_extract(spec, FeatureSet::Expanded, &sink).unwrap();
        cache
            .get_or_extract(WindowSpec::new(3000, 1000), FeatureSet::Basic, &sink)
            .unwrap();
        assert_eq!(extractor.calls.get(), 3);
        assert_eq!(cache.len(), 3);

        let events: Vec<ProgressEvent> = events.try_iter().collect();
        assert_eq!(events.len(), 4);
        assert!(matches!(events[1], ProgressEvent::FeatureCacheHit { window_ms: 2000, .. }));
    }

    #[test]
    fn test_iter_is_ordered() {
        let extractor = CountingExtractor {
            calls: Cell::new(0),
        };
        let mut cache = FeatureCache::new(&extractor);
        for window_ms in [3000, 1000, 2000] {
            let spec = WindowSpec::new(window_ms, 1000);
            cache
                .get_or_extract(spec, FeatureSet::Basic, &crate::progress::NullSink)
                .unwrap();
        }
        let windows: Vec<u32> = cache.iter().map(|(spec, _, _)| spec.window_ms).collect();
        assert_eq!(windows, vec![1000, 2000, 3000]);
        assert!(cache.get(WindowSpec::new(4000, 1000), FeatureSet::Basic).is_none());
    }
}
