//! CSV dataset loading, preparation and splitting
//!
//! Reads a header-first CSV into a string table, turns it into an encoded
//! feature matrix plus log-space targets, and provides the seeded
//! train/validation/test partitioning.

mod prepare;
mod split;

pub use prepare::{prepare, ColumnKind, PreparedDataset};
pub use split::{three_way_split, train_test_split, SplitIndices, HOLDOUT_FRACTION, TEST_SHARE_OF_HOLDOUT};

use crate::encoding::EncodeError;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Errors raised while reading or preparing a dataset
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("failed to read dataset: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },

    #[error("dataset has no rows")]
    EmptyDataset,

    #[error("duplicate column '{0}' in dataset header")]
    DuplicateColumn(String),

    #[error("target column '{0}' not found in dataset")]
    MissingTarget(String),

    #[error("line {line}: target value '{value}' is not a non-negative number")]
    InvalidTarget { line: usize, value: String },

    #[error("dataset has {rows} rows, not enough for a train/validation/test split")]
    InsufficientRows { rows: usize },

    #[error(transparent)]
    Encoding(#[from] EncodeError),
}

/// Raw string table as read from a CSV file
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, DatasetError> {
        let mut seen = HashSet::with_capacity(headers.len());
        for header in &headers {
            if !seen.insert(header.as_str()) {
                return Err(DatasetError::DuplicateColumn(header.clone()));
            }
        }
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != headers.len()) {
            return Err(DatasetError::RaggedRow {
                row: idx + 1,
                expected: headers.len(),
                found: row.len(),
            });
        }
        Ok(Self { headers, rows })
    }

    /// Load a table from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path.as_ref())?;
        Self::from_csv_reader(reader)
    }

    /// Load a table from any CSV source with a header row
    pub fn from_reader<R: Read>(source: R) -> Result<Self, DatasetError> {
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(source);
        Self::from_csv_reader(reader)
    }

    fn from_csv_reader<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, DatasetError> {
        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Remove the named columns that are present; returns the ones removed
    pub fn drop_columns(&mut self, names: &[String]) -> Vec<String> {
        let mut dropped = Vec::new();
        for name in names {
            if let Some(idx) = self.column_index(name) {
                self.headers.remove(idx);
                for row in &mut self.rows {
                    row.remove(idx);
                }
                dropped.push(name.clone());
            }
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
