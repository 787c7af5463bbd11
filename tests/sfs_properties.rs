//! Property tests for forward feature selection against arbitrary oracles.

use activity_tuner::core::{Dataset, Row, LABEL_COLUMN};
use activity_tuner::{ClassifierKind, FeatureSelector, NullSink, OracleError, SfsResult};
use proptest::prelude::*;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// `k` columns named `f0..`, one row.
fn dataset(k: usize) -> Dataset {
    let names = (0..k).map(|i| format!("f{i}")).collect();
    Dataset::with_rows(names, LABEL_COLUMN, vec![Row::new(vec![0.0; k], "a")]).unwrap()
}

/// Accuracy as a deterministic function of the column set, independent of
/// column order.
fn scrambled_accuracy(dataset: &Dataset, seed: u64) -> f64 {
    let names: BTreeSet<&String> = dataset.feature_names().iter().collect();
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    names.hash(&mut hasher);
    (hasher.finish() % 10_000) as f64 / 10_000.0
}

fn run(k: usize, seed: u64, threshold: f64) -> SfsResult {
    let oracle = move |d: &Dataset, _: ClassifierKind| -> Result<f64, OracleError> {
        Ok(scrambled_accuracy(d, seed))
    };
    FeatureSelector::new(&oracle)
        .with_min_improvement(threshold)
        .select_features(ClassifierKind::Forest, &dataset(k), &NullSink)
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn committed_rounds_improve_by_threshold(
        k in 1usize..8,
        seed in any::<u64>(),
        threshold in 0.0f64..0.05,
    ) {
        let result = run(k, seed, threshold);

        let mut previous = 0.0;
        for round in result.rounds().iter().filter(|r| r.committed) {
            prop_assert!(round.accuracy >= previous);
            prop_assert!(round.improvement >= threshold);
            previous = round.accuracy;
        }
        prop_assert_eq!(result.accuracy(), previous);
    }

    #[test]
    fn search_is_bounded_by_column_count(
        k in 1usize..8,
        seed in any::<u64>(),
        threshold in 0.0f64..0.05,
    ) {
        let result = run(k, seed, threshold);

        prop_assert!(result.rounds().len() <= k);
        prop_assert!(result.feature_count() <= k);

        let distinct: BTreeSet<usize> = result.selected().iter().copied().collect();
        prop_assert_eq!(distinct.len(), result.feature_count());

        let committed = result.rounds().iter().filter(|r| r.committed).count();
        prop_assert_eq!(committed, result.feature_count());

        // Only the last round may be rejected, and only if columns remained.
        if let Some(last) = result.rounds().last() {
            if !last.committed {
                prop_assert!(result.feature_count() < k);
            }
        }
        for round in result.rounds().iter().rev().skip(1) {
            prop_assert!(round.committed);
        }
    }

    #[test]
    fn selection_is_deterministic(
        k in 1usize..8,
        seed in any::<u64>(),
        threshold in 0.0f64..0.05,
    ) {
        prop_assert_eq!(run(k, seed, threshold), run(k, seed, threshold));
    }

    #[test]
    fn selected_names_follow_selected_columns(k in 1usize..8, seed in any::<u64>()) {
        let result = run(k, seed, 0.0);
        let expected: Vec<String> = result.selected().iter().map(|c| format!("f{c}")).collect();
        prop_assert_eq!(result.selected_names(), expected.as_slice());
    }
}
