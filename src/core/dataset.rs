//! Tabular feature datasets.
//!
//! A dataset is an ordered list of named numeric feature columns followed by
//! one categorical label column. On disk it is a plain comma-separated file
//! with a header row; the label is always the last column.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the label column written by the feature extractor.
pub const LABEL_COLUMN: &str = "Activity";

/// Errors raised while building, reading or writing a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset {0:?} has no data rows")]
    Empty(PathBuf),

    #[error("dataset has no header row")]
    MissingHeader,

    #[error("line {line}: expected {expected} values, found {found}")]
    RowWidth {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}, column {column}: invalid number {value:?}")]
    InvalidNumber {
        line: usize,
        column: usize,
        value: String,
    },

    #[error("feature column {index} out of range ({count} feature columns)")]
    ColumnOutOfRange { index: usize, count: usize },
}

/// One dataset row: feature values in column order plus the class label.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub values: Vec<f64>,
    pub label: String,
}

impl Row {
    pub fn new(values: Vec<f64>, label: impl Into<String>) -> Self {
        Self {
            values,
            label: label.into(),
        }
    }
}

/// A labelled feature table.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    feature_names: Vec<String>,
    label_name: String,
    rows: Vec<Row>,
}

impl Dataset {
    /// Create an empty dataset with the given columns.
    pub fn new(feature_names: Vec<String>, label_name: impl Into<String>) -> Self {
        Self {
            feature_names,
            label_name: label_name.into(),
            rows: Vec::new(),
        }
    }

    /// Create a dataset and validate every row's width.
    pub fn with_rows(
        feature_names: Vec<String>,
        label_name: impl Into<String>,
        rows: Vec<Row>,
    ) -> Result<Self, DatasetError> {
        let mut dataset = Self::new(feature_names, label_name);
        for row in rows {
            dataset.push(row)?;
        }
        Ok(dataset)
    }

    /// Append a row, rejecting it if its width doesn't match the columns.
    pub fn push(&mut self, row: Row) -> Result<(), DatasetError> {
        if row.values.len() != self.feature_names.len() {
            return Err(DatasetError::RowWidth {
                line: self.rows.len() + 2,
                expected: self.feature_names.len() + 1,
                found: row.values.len() + 1,
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn label_name(&self) -> &str {
        &self.label_name
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of feature columns (the label column is not counted).
    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct class labels in lexicographic order.
    pub fn class_labels(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|r| r.label.as_str())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Project onto the given feature columns, in the given order.
    ///
    /// The label column is always kept and stays last.
    pub fn project(&self, columns: &[usize]) -> Result<Dataset, DatasetError> {
        let count = self.feature_count();
        if let Some(&index) = columns.iter().find(|&&c| c >= count) {
            return Err(DatasetError::ColumnOutOfRange { index, count });
        }

        let feature_names = columns
            .iter()
            .map(|&c| self.feature_names[c].clone())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| Row {
                values: columns.iter().map(|&c| row.values[c]).collect(),
                label: row.label.clone(),
            })
            .collect();

        Ok(Dataset {
            feature_names,
            label_name: self.label_name.clone(),
            rows,
        })
    }

    /// Parse CSV text: header row first, label in the last column.
    ///
    /// Blank lines are ignored. Fields are split on literal commas. Names and
    /// labels are kept verbatim; only numeric fields are trimmed.
    pub fn from_csv_str(text: &str) -> Result<Self, DatasetError> {
        let mut lines = text
            .lines()
            .enumerate()
            .map(|(i, l)| (i + 1, l))
            .filter(|(_, l)| !l.trim().is_empty());

        let (_, header) = lines.next().ok_or(DatasetError::MissingHeader)?;
        let mut columns: Vec<String> = header.split(',').map(str::to_string).collect();
        let label_name = columns.pop().unwrap_or_default();
        let width = columns.len() + 1;

        let mut dataset = Self::new(columns, label_name);
        for (line, text) in lines {
            let fields: Vec<&str> = text.split(',').collect();
            if fields.len() != width {
                return Err(DatasetError::RowWidth {
                    line,
                    expected: width,
                    found: fields.len(),
                });
            }

            let (label, values) = fields.split_last().ok_or(DatasetError::RowWidth {
                line,
                expected: width,
                found: 0,
            })?;
            let values = values
                .iter()
                .enumerate()
                .map(|(column, v)| {
                    v.trim().parse::<f64>().map_err(|_| DatasetError::InvalidNumber {
                        line,
                        column: column + 1,
                        value: v.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            dataset.rows.push(Row::new(values, *label));
        }

        Ok(dataset)
    }

    /// Read a dataset CSV file. A file without data rows is an error.
    pub fn read_csv(path: &Path) -> Result<Self, DatasetError> {
        let content = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dataset = Self::from_csv_str(&content)?;
        if dataset.is_empty() {
            return Err(DatasetError::Empty(path.to_path_buf()));
        }
        Ok(dataset)
    }

    /// Render as CSV. Values use the shortest representation that reads back
    /// to the same `f64`.
    pub fn to_csv_string(&self) -> String {
        let mut out = String::new();
        for name in &self.feature_names {
            out.push_str(name);
            out.push(',');
        }
        out.push_str(&self.label_name);
        out.push('\n');

        for row in &self.rows {
            for value in &row.values {
                let _ = write!(out, "{value},");
            }
            out.push_str(&row.label);
            out.push('\n');
        }
        out
    }

    /// Write the dataset as CSV, creating parent directories as needed.
    pub fn write_csv(&self, path: &Path) -> Result<(), DatasetError> {
        write_file(path, &self.to_csv_string())
    }

    /// Render in ARFF format with a nominal class attribute.
    pub fn to_arff_string(&self, relation: &str) -> String {
        let mut out = format!("@RELATION {relation}\n\n");
        for name in &self.feature_names {
            let _ = writeln!(out, "@ATTRIBUTE {name} NUMERIC");
        }
        let _ = writeln!(
            out,
            "@ATTRIBUTE {} {{{}}}\n",
            self.label_name,
            self.class_labels().join(",")
        );

        out.push_str("@DATA\n");
        let body = self.to_csv_string();
        for line in body.lines().skip(1) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    /// Write the dataset in ARFF format.
    pub fn write_arff(&self, path: &Path, relation: &str) -> Result<(), DatasetError> {
        write_file(path, &self.to_arff_string(relation))
    }
}

fn write_file(path: &Path, content: &str) -> Result<(), DatasetError> {
    let io_err = |source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    std::fs::write(path, content).map_err(io_err)
}
