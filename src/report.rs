//! Plain-text and CSV reports.
//!
//! - Detailed evaluation reports and confusion-matrix CSVs for a single
//!   classifier on a single dataset
//! - The baseline table (basic features at the default window)
//! - Feature selection traces
//! - The final experiment report and its JSON summary

use crate::classify::{ClassifierKind, Evaluation};
use crate::core::Dataset;
use crate::optimize::{SfsResult, WindowOptimizationResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const WIDTH: usize = 80;

fn heavy_rule() -> String {
    "=".repeat(WIDTH)
}

fn rule() -> String {
    "-".repeat(WIDTH)
}

/// Replace anything but ASCII alphanumerics, `_` and `-` with `_`.
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn write_file(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

/// Confusion matrix as aligned text, rows = actual, columns = predicted.
pub fn confusion_matrix_text(eval: &Evaluation) -> String {
    let labels = eval.labels();
    let label_width = labels.iter().map(|l| l.len()).max().unwrap_or(0).max(6);
    let mut out = String::new();

    let _ = write!(out, "{:width$}  ", "", width = label_width);
    for label in labels {
        let _ = write!(out, "{:<10}", truncate(label, 10));
    }
    out.push_str(" <-- classified as\n");

    for (label, row) in labels.iter().zip(eval.confusion()) {
        let _ = write!(out, "{label:<label_width$} |");
        for count in row {
            let _ = write!(out, " {count:<8} ");
        }
        let _ = writeln!(out, "| {label}");
    }
    out
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Confusion matrix as CSV with an `Actual/Predicted` header cell.
pub fn confusion_csv(eval: &Evaluation) -> String {
    let mut out = String::from("Actual/Predicted");
    for label in eval.labels() {
        let _ = write!(out, ",{label}");
    }
    out.push('\n');
    for (label, row) in eval.labels().iter().zip(eval.confusion()) {
        out.push_str(label);
        for count in row {
            let _ = write!(out, ",{count}");
        }
        out.push('\n');
    }
    out
}

/// Full evaluation report for one classifier on one dataset.
pub fn render_evaluation_report(
    experiment: &str,
    classifier: ClassifierKind,
    dataset: &Dataset,
    eval: &Evaluation,
    generated: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heavy_rule());
    let _ = writeln!(out, "EVALUATION REPORT");
    let _ = writeln!(out, "{}\n", heavy_rule());
    let _ = writeln!(out, "Experiment: {experiment}");
    let _ = writeln!(out, "Classifier: {}", classifier.display_name());
    let _ = writeln!(out, "Generated:  {}", generated.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Instances:  {}", dataset.len());
    let _ = writeln!(
        out,
        "Features:   {} ({})",
        dataset.feature_count(),
        dataset.feature_names().join(", ")
    );
    let _ = writeln!(out, "Classes:    {}\n", eval.labels().len());

    let _ = writeln!(out, "OVERALL PERFORMANCE");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "Accuracy:  {:.4} ({:.2}%)",
        eval.accuracy(),
        eval.accuracy() * 100.0
    );
    let _ = writeln!(out, "Kappa:     {:.4}", eval.kappa());
    let _ = writeln!(out, "Correct:   {} / {}\n", eval.correct(), eval.total());

    let _ = writeln!(out, "PER-CLASS METRICS");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "{:<20}  Precision  Recall    F1-Score  Support",
        "Class"
    );
    let _ = writeln!(out, "{}", rule());
    for m in eval.class_metrics() {
        let _ = writeln!(
            out,
            "{:<20}  {:.4}     {:.4}    {:.4}    {}",
            truncate(&m.label, 20),
            m.precision,
            m.recall,
            m.f1,
            m.support
        );
    }
    out.push('\n');

    let _ = writeln!(out, "CONFUSION MATRIX");
    let _ = writeln!(out, "{}", rule());
    out.push_str(&confusion_matrix_text(eval));
    out
}

/// Write `<experiment>_<classifier>_evaluation.txt` and
/// `<experiment>_<classifier>_confusion_matrix.csv` into `dir`.
///
/// Returns the report path.
pub fn write_evaluation_report(
    dir: &Path,
    experiment: &str,
    classifier: ClassifierKind,
    dataset: &Dataset,
    eval: &Evaluation,
) -> io::Result<PathBuf> {
    let stem = format!("{}_{}", file_safe(experiment), classifier.slug());
    let report_path = dir.join(format!("{stem}_evaluation.txt"));
    let csv_path = dir.join(format!("{stem}_confusion_matrix.csv"));

    write_file(
        &report_path,
        &render_evaluation_report(experiment, classifier, dataset, eval, Utc::now()),
    )?;
    write_file(&csv_path, &confusion_csv(eval))?;
    Ok(report_path)
}

/// Accuracy of one classifier on the baseline configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineEntry {
    pub classifier: ClassifierKind,
    pub accuracy: f64,
}

pub fn render_baseline_report(window_ms: u32, entries: &[BaselineEntry]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Baseline Results");
    let _ = writeln!(
        out,
        "Configuration: 6 basic features, {:.1}s window, {:.1}s stride\n",
        f64::from(window_ms) / 1000.0,
        1.0
    );
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<20}: {:.4} ({:.2}%)",
            entry.classifier.display_name(),
            entry.accuracy,
            entry.accuracy * 100.0
        );
    }
    out
}

/// Round-by-round trace of one feature selection run.
pub fn render_sfs_report(result: &SfsResult, window_ms: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heavy_rule());
    let _ = writeln!(
        out,
        "SEQUENTIAL FORWARD SELECTION: {}",
        result.classifier().display_name()
    );
    let _ = writeln!(out, "{}\n", heavy_rule());
    let _ = writeln!(out, "Window:   {window_ms} ms");
    let _ = writeln!(out, "Selected: {}", result.selected_names().join(", "));
    let _ = writeln!(out, "Accuracy: {:.4}\n", result.accuracy());

    let _ = writeln!(
        out,
        "{:<6} {:<12} {:>10} {:>12}  {}",
        "Round", "Feature", "Accuracy", "Improvement", "Result"
    );
    let _ = writeln!(out, "{}", rule());
    for round in result.rounds() {
        let _ = writeln!(
            out,
            "{:<6} {:<12} {:>10.4} {:>+12.4}  {}",
            round.round,
            round.name,
            round.accuracy,
            round.improvement,
            if round.committed { "added" } else { "stopped" }
        );
    }
    out
}

/// A per-classifier expanded-feature dataset written during an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterDataset {
    pub classifier: ClassifierKind,
    pub window_ms: u32,
    pub rows: usize,
    pub path: PathBuf,
}

/// Everything a complete experiment produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    pub run_id: Uuid,
    pub generated: DateTime<Utc>,
    pub baseline: Vec<BaselineEntry>,
    pub windows: WindowOptimizationResult,
    pub master_datasets: Vec<MasterDataset>,
    /// In classifier order
    pub selections: Vec<SfsResult>,
}

impl ExperimentSummary {
    pub fn new(
        baseline: Vec<BaselineEntry>,
        windows: WindowOptimizationResult,
        master_datasets: Vec<MasterDataset>,
        selections: Vec<SfsResult>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated: Utc::now(),
            baseline,
            windows,
            master_datasets,
            selections,
        }
    }

    pub fn best_performer(&self) -> Option<&SfsResult> {
        best_performer(&self.selections)
    }

    /// Save the summary as pretty-printed JSON.
    pub fn save_json(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        write_file(path, &json)
    }
}

/// The most accurate selection; the earliest wins ties.
pub fn best_performer(results: &[SfsResult]) -> Option<&SfsResult> {
    let mut best: Option<&SfsResult> = None;
    for result in results {
        if best.map_or(true, |b| result.accuracy() > b.accuracy()) {
            best = Some(result);
        }
    }
    best
}

pub fn render_experiment_report(summary: &ExperimentSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", heavy_rule());
    let _ = writeln!(out, "EXPERIMENT REPORT");
    let _ = writeln!(out, "{}\n", heavy_rule());
    let _ = writeln!(out, "Run:       {}", summary.run_id);
    let _ = writeln!(
        out,
        "Generated: {}\n",
        summary.generated.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let _ = writeln!(out, "1. BASELINE (6 features, 1s window)");
    let _ = writeln!(out, "{}", rule());
    for entry in &summary.baseline {
        let _ = writeln!(
            out,
            "  {:<20}: {:.4}",
            entry.classifier.display_name(),
            entry.accuracy
        );
    }
    out.push('\n');

    let _ = writeln!(out, "2. WINDOW OPTIMIZATION (6 features, per classifier)");
    let _ = writeln!(out, "{}", rule());
    for (kind, choice) in summary.windows.iter() {
        let _ = writeln!(
            out,
            "  {:<20}: {:.1}s (accuracy: {:.4})",
            kind.display_name(),
            choice.window_secs(),
            choice.accuracy
        );
    }
    out.push('\n');

    let _ = writeln!(out, "3. MASTER DATASETS (12 features, optimal windows)");
    let _ = writeln!(out, "{}", rule());
    for master in &summary.master_datasets {
        let name = master
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "  {:<20}: {} ({} rows, {} ms)",
            master.classifier.display_name(),
            name,
            master.rows,
            master.window_ms
        );
    }
    out.push('\n');

    let _ = writeln!(out, "4. FEATURE SELECTION");
    let _ = writeln!(out, "{}", rule());
    for result in &summary.selections {
        let _ = writeln!(
            out,
            "  {:<20}: {:.4} with {} features [{}]",
            result.classifier().display_name(),
            result.accuracy(),
            result.feature_count(),
            result.selected_names().join(", ")
        );
    }
    out.push('\n');

    let _ = writeln!(out, "5. FINAL COMPARISON");
    let _ = writeln!(out, "{}", rule());
    let _ = writeln!(
        out,
        "  {:<20} {:>9} {:>10} {:>9} {:>10}",
        "Classifier", "Baseline", "Window", "Features", "Final"
    );
    for result in &summary.selections {
        let kind = result.classifier();
        let baseline = summary
            .baseline
            .iter()
            .find(|e| e.classifier == kind)
            .map(|e| format!("{:.4}", e.accuracy))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<20} {:>9} {:>8}ms {:>9} {:>10.4}",
            kind.display_name(),
            baseline,
            summary.windows.window_for(kind),
            result.feature_count(),
            result.accuracy()
        );
    }

    match summary.best_performer() {
        Some(best) => {
            let _ = writeln!(
                out,
                "\nBest performer: {} (accuracy: {:.4})",
                best.classifier().display_name(),
                best.accuracy()
            );
        }
        None => {
            let _ = writeln!(out, "\nBest performer: none");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::OracleError;
    use crate::core::{Row, LABEL_COLUMN};
    use crate::optimize::{FeatureSelector, WindowChoice};
    use crate::progress::NullSink;

    fn eval() -> Evaluation {
        let mut eval = Evaluation::new(vec!["sitting".into(), "walking".into()]);
        for (a, p) in [(0, 0), (0, 0), (0, 1), (1, 1), (1, 1)] {
            eval.record(a, p);
        }
        eval
    }

    fn dataset() -> Dataset {
        Dataset::with_rows(
            vec!["mean_x".into(), "std_x".into()],
            LABEL_COLUMN,
            vec![Row::new(vec![1.0, 2.0], "sitting"), Row::new(vec![3.0, 4.0], "walking")],
        )
        .unwrap()
    }

    /// SFS result whose accuracy equals `accuracy` after selecting column 0.
    fn selection(kind: ClassifierKind, accuracy: f64) -> SfsResult {
        let oracle = move |ds: &Dataset, _: ClassifierKind| -> Result<f64, OracleError> {
            Ok(if ds.feature_count() == 1 { accuracy } else { 0.0 })
        };
        FeatureSelector::new(&oracle)
            .select_features(kind, &dataset(), &NullSink)
            .unwrap()
    }

    #[test]
    fn test_confusion_csv() {
        assert_eq!(
            confusion_csv(&eval()),
            "Actual/Predicted,sitting,walking\nsitting,2,1\nwalking,0,2\n"
        );
    }

    #[test]
    fn test_evaluation_report_sections() {
        let report = render_evaluation_report(
            "window 2000ms",
            ClassifierKind::Forest,
            &dataset(),
            &eval(),
            Utc::now(),
        );
        assert!(report.contains("Classifier: Random Forest"));
        assert!(report.contains("Accuracy:  0.8000 (80.00%)"));
        assert!(report.contains("Features:   2 (mean_x, std_x)"));
        assert!(report.contains("PER-CLASS METRICS"));
        assert!(report.contains("<-- classified as"));
    }

    #[test]
    fn test_write_evaluation_report_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_evaluation_report(
            dir.path(),
            "window 2000ms",
            ClassifierKind::Tree,
            &dataset(),
            &eval(),
        )
        .unwrap();

        assert!(path.ends_with("window_2000ms_tree_evaluation.txt"));
        assert!(dir.path().join("window_2000ms_tree_confusion_matrix.csv").exists());
    }

    #[test]
    fn test_best_performer_ties_go_to_first() {
        let results = vec![
            selection(ClassifierKind::Tree, 0.8),
            selection(ClassifierKind::Forest, 0.9),
            selection(ClassifierKind::Margin, 0.9),
        ];
        assert_eq!(
            best_performer(&results).map(|r| r.classifier()),
            Some(ClassifierKind::Forest)
        );
        assert!(best_performer(&[]).is_none());
    }

    #[test]
    fn test_experiment_report_and_json() {
        let windows: WindowOptimizationResult = [(
            ClassifierKind::Tree,
            WindowChoice {
                window_ms: 2000,
                accuracy: 0.7,
            },
        )]
        .into_iter()
        .collect();
        let summary = ExperimentSummary::new(
            vec![BaselineEntry {
                classifier: ClassifierKind::Tree,
                accuracy: 0.6,
            }],
            windows,
            vec![MasterDataset {
                classifier: ClassifierKind::Tree,
                window_ms: 2000,
                rows: 2,
                path: PathBuf::from("master_tree_2000ms.csv"),
            }],
            vec![selection(ClassifierKind::Tree, 0.75)],
        );

        let report = render_experiment_report(&summary);
        assert!(report.contains("Decision Tree       : 2.0s (accuracy: 0.7000)"));
        assert!(report.contains("master_tree_2000ms.csv"));
        assert!(report.contains("Best performer: Decision Tree (accuracy: 0.7500)"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment_summary.json");
        summary.save_json(&path).unwrap();
        let loaded: ExperimentSummary =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.run_id, summary.run_id);
        assert_eq!(loaded.selections, summary.selections);
    }

    #[test]
    fn test_sfs_report_lists_rounds() {
        let report = render_sfs_report(&selection(ClassifierKind::Margin, 0.5), 3000);
        assert!(report.contains("Linear SVM"));
        assert!(report.contains("Window:   3000 ms"));
        assert!(report.contains("added"));
        assert!(report.contains("stopped"));
    }

    #[test]
    fn test_baseline_report() {
        let report = render_baseline_report(
            1000,
            &[BaselineEntry {
                classifier: ClassifierKind::Margin,
                accuracy: 0.5,
            }],
        );
        assert!(report.contains("1.0s window"));
        assert!(report.contains("Linear SVM          : 0.5000 (50.00%)"));
    }

    #[test]
    fn test_file_safe() {
        assert_eq!(file_safe("window 2000ms/basic"), "window_2000ms_basic");
        assert_eq!(truncate("abcdef", 3), "abc");
        assert_eq!(truncate("ab", 3), "ab");
    }
}
