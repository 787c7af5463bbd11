//! Flat `key=value` persistence of window choices.
//!
//! ```text
//! # Optimal window sizes per classifier
//!
//! # Decision Tree
//! TREE_window_ms=2000
//! TREE_window_sec=2.0
//! TREE_accuracy=0.8125
//! ```
//!
//! Readers only need `<KIND>_window_ms=`; the other keys are informational.

use super::window::{WindowChoice, WindowOptimizationResult, DEFAULT_WINDOW_MS};
use crate::classify::ClassifierKind;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::Path;

/// File name of the window record inside the results directory.
pub const WINDOW_CONFIG_FILE: &str = "optimal_windows.txt";

/// Render the record file for `result`.
pub fn render_window_config(result: &WindowOptimizationResult) -> String {
    let mut out = String::from("# Optimal window sizes per classifier\n\n");
    for (kind, choice) in result.iter() {
        let key = kind.key();
        let _ = writeln!(out, "# {}", kind.display_name());
        let _ = writeln!(out, "{key}_window_ms={}", choice.window_ms);
        let _ = writeln!(out, "{key}_window_sec={:.1}", choice.window_secs());
        let _ = writeln!(out, "{key}_accuracy={:.4}", choice.accuracy);
        out.push('\n');
    }
    out
}

/// Overwrite `path` with exactly the records of `result`.
pub fn write_window_config(path: &Path, result: &WindowOptimizationResult) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, render_window_config(result))
}

/// Store `result`, keeping records already in `path` for other classifiers.
///
/// Returns everything now on disk. A missing file starts empty; any other
/// read error is returned and the file is left untouched.
pub fn store_window_config(
    path: &Path,
    result: &WindowOptimizationResult,
) -> io::Result<WindowOptimizationResult> {
    let existing = match fs::read_to_string(path) {
        Ok(text) => parse_window_config(&text),
        Err(e) if e.kind() == io::ErrorKind::NotFound => WindowOptimizationResult::default(),
        Err(e) => return Err(e),
    };
    let merged = existing.merged_with(result);
    write_window_config(path, &merged)?;
    Ok(merged)
}

/// Parse a record file. Unknown and malformed lines are ignored; the first
/// valid value of a key wins.
///
/// A classifier needs a positive `_window_ms` to appear in the result; a
/// missing `_accuracy` reads as 0.0.
pub fn parse_window_config(text: &str) -> WindowOptimizationResult {
    ClassifierKind::ALL
        .iter()
        .filter_map(|&kind| {
            let window_ms = values(text, kind, "_window_ms=")
                .filter_map(|v| v.parse::<u32>().ok())
                .find(|&ms| ms > 0)?;
            let accuracy = values(text, kind, "_accuracy=")
                .find_map(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0);
            Some((
                kind,
                WindowChoice {
                    window_ms,
                    accuracy,
                },
            ))
        })
        .collect()
}

/// Values of every line starting with `<KIND><suffix>`, in file order.
fn values<'t>(
    text: &'t str,
    kind: ClassifierKind,
    suffix: &str,
) -> impl Iterator<Item = &'t str> + 't {
    let prefix = format!("{}{suffix}", kind.key());
    text.lines()
        .filter_map(move |line| line.trim().strip_prefix(prefix.as_str()).map(str::trim))
}

/// Read stored window choices. `None` when the file is missing, unreadable,
/// or holds no valid record.
pub fn read_window_config(path: &Path) -> Option<WindowOptimizationResult> {
    let text = fs::read_to_string(path).ok()?;
    let result = parse_window_config(&text);
    (!result.is_empty()).then_some(result)
}

/// Stored window for `kind`, or [`DEFAULT_WINDOW_MS`] without a record.
pub fn load_window_ms(path: &Path, kind: ClassifierKind) -> u32 {
    read_window_config(path).map_or(DEFAULT_WINDOW_MS, |r| r.window_for(kind))
}
