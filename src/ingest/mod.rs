//! Raw recording ingestion.
//!
//! Raw smartwatch exports live in `<base>/raw_data/*.csv`. Each file starts
//! with one artifact line and then carries
//! `timestamp,sensor_type,accuracy,ax,ay,az` rows for several sensors.
//! Formatting keeps only accelerometer rows as `timestamp,ax,ay,az` in
//! `<base>/formatted_data/`, which is what the feature extractor reads.

pub mod types;

pub use types::{AccelSample, Recording};

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Directory holding raw exports, relative to the experiment base directory.
pub const RAW_DATA_DIR: &str = "raw_data";

/// Directory holding formatted recordings.
pub const FORMATTED_DATA_DIR: &str = "formatted_data";

/// Sensor type code of the accelerometer in raw exports.
const ACCELEROMETER_SENSOR: i32 = 1;

/// Errors raised while reading or formatting recordings.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("data directory not found: {0:?}")]
    MissingDirectory(PathBuf),

    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> IngestError + '_ {
    move |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// List `*.csv` files in a directory, sorted by name.
fn csv_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !dir.is_dir() {
        return Err(IngestError::MissingDirectory(dir.to_path_buf()));
    }

    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map_err(io_error(dir))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|e| e == "csv").unwrap_or(false))
        .collect();
    files.sort();
    Ok(files)
}

/// Format every raw export under `base_dir/raw_data` into `base_dir/formatted_data`.
///
/// Returns the number of files written.
pub fn format_raw_data(base_dir: &Path) -> Result<usize, IngestError> {
    let raw_dir = base_dir.join(RAW_DATA_DIR);
    let formatted_dir = base_dir.join(FORMATTED_DATA_DIR);

    let files = csv_files(&raw_dir)?;
    fs::create_dir_all(&formatted_dir).map_err(io_error(&formatted_dir))?;

    for src in &files {
        let Some(name) = src.file_name() else {
            continue;
        };
        let dst = formatted_dir.join(name);
        let kept = format_file(src, &dst)?;
        debug!(file = ?name, samples = kept, "formatted raw recording");
    }

    info!(files = files.len(), dir = ?formatted_dir, "formatted raw data");
    Ok(files.len())
}

/// Format one raw file. Returns the number of samples kept.
fn format_file(src: &Path, dst: &Path) -> Result<usize, IngestError> {
    let reader = BufReader::new(fs::File::open(src).map_err(io_error(src))?);
    let mut writer = BufWriter::new(fs::File::create(dst).map_err(io_error(dst))?);
    let mut kept = 0;

    // The first line of every export is an artifact.
    for line in reader.lines().skip(1) {
        let line = line.map_err(io_error(src))?;
        if let Some(formatted) = format_line(&line) {
            writeln!(writer, "{formatted}").map_err(io_error(dst))?;
            kept += 1;
        }
    }

    writer.flush().map_err(io_error(dst))?;
    Ok(kept)
}

/// Reduce one raw line to `timestamp,ax,ay,az`, or drop it.
fn format_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let tokens: Vec<&str> = line.split(',').map(str::trim).collect();
    match tokens.len() {
        6 => {
            let sensor: i32 = tokens[1].parse().ok()?;
            if sensor != ACCELEROMETER_SENSOR {
                return None;
            }
            Some(format!(
                "{},{},{},{}",
                tokens[0], tokens[3], tokens[4], tokens[5]
            ))
        }
        4 => Some(line.to_string()),
        _ => None,
    }
}

/// Derive the activity label from a recording's file name.
///
/// The label is the fifth `-`-separated field. Hand-wash variants are
/// normalized so that `non_hand_wash` never collapses into `hand_wash`.
pub fn activity_label(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    let Some(field) = stem.split('-').nth(4) else {
        return "unknown".to_string();
    };
    let activity = field.to_lowercase();

    if ["non_hand_wash", "no_hand_wash", "not_hand_wash"]
        .iter()
        .any(|v| activity.contains(v))
    {
        return "non_hand_wash".to_string();
    }
    if activity.contains("hand_wash") {
        return "hand_wash".to_string();
    }
    activity
}

/// Load every formatted recording in `dir`, sorted by file name.
///
/// Lines that don't parse as `timestamp,ax,ay,az` are skipped.
pub fn load_recordings(dir: &Path) -> Result<Vec<Recording>, IngestError> {
    let mut recordings = Vec::new();

    for path in csv_files(dir)? {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = fs::read_to_string(&path).map_err(io_error(&path))?;
        let samples = content.lines().filter_map(AccelSample::parse).collect();

        recordings.push(Recording::new(name.clone(), activity_label(&name), samples));
    }

    info!(recordings = recordings.len(), dir = ?dir, "loaded recordings");
    Ok(recordings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activity_label() {
        assert_eq!(activity_label("u01-watch-2024-a2-walking-1.csv"), "walking");
        assert_eq!(activity_label("u01-watch-2024-a2-Sitting.csv"), "sitting");
        assert_eq!(
            activity_label("u01-watch-2024-a2-non_hand_wash_2.csv"),
            "non_hand_wash"
        );
        assert_eq!(
            activity_label("u01-watch-2024-a2-not_hand_wash.csv"),
            "non_hand_wash"
        );
        assert_eq!(activity_label("u01-watch-2024-a2-hand_wash_3.csv"), "hand_wash");
        assert_eq!(activity_label("short-name.csv"), "unknown");
    }

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line("1000,1,3,0.5,-0.25,9.8").as_deref(),
            Some("1000,0.5,-0.25,9.8")
        );
        assert_eq!(format_line("1000,4,3,0.5,-0.25,9.8"), None);
        assert_eq!(
            format_line(" 1000,0.5,-0.25,9.8 ").as_deref(),
            Some("1000,0.5,-0.25,9.8")
        );
        assert_eq!(format_line("garbage"), None);
        assert_eq!(format_line(""), None);
    }

    #[test]
    fn test_format_and_load_round_trip() {
        let base = tempfile::tempdir().unwrap();
        let raw = base.path().join(RAW_DATA_DIR);
        fs::create_dir_all(&raw).unwrap();
        fs::write(
            raw.join("u1-w-x-y-walking.csv"),
            "artifact\n\
             2000,1,3,1.0,2.0,3.0\n\
             1000,1,3,4.0,5.0,6.0\n\
             1500,4,3,7.0,8.0,9.0\n",
        )
        .unwrap();
        fs::write(raw.join("notes.txt"), "ignored").unwrap();

        assert_eq!(format_raw_data(base.path()).unwrap(), 1);

        let recordings = load_recordings(&base.path().join(FORMATTED_DATA_DIR)).unwrap();
        assert_eq!(recordings.len(), 1);
        let rec = &recordings[0];
        assert_eq!(rec.label, "walking");
        assert_eq!(
            rec.samples,
            vec![
                AccelSample::new(1000, 4.0, 5.0, 6.0),
                AccelSample::new(2000, 1.0, 2.0, 3.0),
            ]
        );
    }

    #[test]
    fn test_missing_raw_directory() {
        let base = tempfile::tempdir().unwrap();
        assert!(matches!(
            format_raw_data(base.path()),
            Err(IngestError::MissingDirectory(_))
        ));
    }
}
