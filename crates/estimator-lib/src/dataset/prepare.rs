//! Turns a raw table into the encoded training matrix
//!
//! Column typing follows the data: a feature column whose non-empty cells
//! all parse as numbers is numeric, anything else is categorical and gets a
//! label encoder fitted on every value it holds. Rows are then pushed through
//! the same [`FeatureEncoder`] the predictor uses.

use super::{DatasetError, RawTable};
use crate::encoding::{transform_target, CategoricalEncoders, ColumnSchema, FeatureEncoder, LabelEncoder};
use crate::models::{RawRow, RawValue};

/// How a feature column is represented in the model input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

/// Encoded features and targets ready for splitting
#[derive(Debug, Clone)]
pub struct PreparedDataset {
    pub encoder: FeatureEncoder,
    pub column_kinds: Vec<(String, ColumnKind)>,
    /// Row-major feature matrix in schema order
    pub features: Vec<Vec<f64>>,
    /// Targets in log space
    pub targets: Vec<f64>,
    /// Targets in original price units
    pub prices: Vec<f64>,
}

impl PreparedDataset {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

/// Build the schema, fit encoders and encode every row
pub fn prepare(table: &RawTable, target_column: &str) -> Result<PreparedDataset, DatasetError> {
    if table.is_empty() {
        return Err(DatasetError::EmptyDataset);
    }
    let target_idx = table
        .column_index(target_column)
        .ok_or_else(|| DatasetError::MissingTarget(target_column.to_string()))?;

    let prices = table
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| parse_target(&row[target_idx], i))
        .collect::<Result<Vec<f64>, _>>()?;

    let feature_columns: Vec<(usize, &String)> = table
        .headers()
        .iter()
        .enumerate()
        .filter(|(idx, _)| *idx != target_idx)
        .collect();

    let mut column_kinds = Vec::with_capacity(feature_columns.len());
    let mut encoders = CategoricalEncoders::new();
    for &(idx, name) in &feature_columns {
        let kind = classify_column(table, idx);
        if kind == ColumnKind::Categorical {
            let encoder = LabelEncoder::fit(table.rows().iter().map(|row| row[idx].as_str()))?;
            encoders.insert(name.clone(), encoder);
        }
        column_kinds.push((name.clone(), kind));
    }

    let schema = ColumnSchema::new(feature_columns.iter().map(|(_, name)| name.as_str()))?;
    let encoder = FeatureEncoder::new(schema, encoders)?;

    let raw_rows: Vec<RawRow> = table
        .rows()
        .iter()
        .map(|row| raw_row(row, &feature_columns, &column_kinds))
        .collect();
    let features = encoder.encode_batch(&raw_rows)?;
    let targets = prices.iter().map(|&p| transform_target(p)).collect();

    Ok(PreparedDataset {
        encoder,
        column_kinds,
        features,
        targets,
        prices,
    })
}

fn parse_target(cell: &str, row_idx: usize) -> Result<f64, DatasetError> {
    match cell.trim().parse::<f64>() {
        Ok(price) if price.is_finite() && price >= 0.0 => Ok(price),
        _ => Err(DatasetError::InvalidTarget {
            // header is line 1
            line: row_idx + 2,
            value: cell.to_string(),
        }),
    }
}

fn classify_column(table: &RawTable, idx: usize) -> ColumnKind {
    let numeric = table.rows().iter().all(|row| {
        let cell = row[idx].trim();
        cell.is_empty() || cell.parse::<f64>().map(f64::is_finite).unwrap_or(false)
    });
    if numeric {
        ColumnKind::Numeric
    } else {
        ColumnKind::Categorical
    }
}

/// Empty numeric cells are left out so the encoder applies its zero default.
fn raw_row(row: &[String], columns: &[(usize, &String)], kinds: &[(String, ColumnKind)]) -> RawRow {
    columns
        .iter()
        .zip(kinds)
        .filter_map(|(&(idx, name), (_, kind))| {
            let cell = &row[idx];
            match kind {
                ColumnKind::Categorical => Some((name.clone(), RawValue::Text(cell.clone()))),
                ColumnKind::Numeric => cell
                    .trim()
                    .parse::<f64>()
                    .ok()
                    .map(|v| (name.clone(), RawValue::Number(v))),
            }
        })
        .collect()
}
