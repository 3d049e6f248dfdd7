//! Ordered feature column schema

use super::EncodeError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered list of feature names fixed at training time.
///
/// Persisted as a bare JSON array; the position of a name is the position of
/// its value in every encoded vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnSchema {
    columns: Vec<String>,
}

impl ColumnSchema {
    pub fn new<I, S>(columns: I) -> Result<Self, EncodeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(EncodeError::DuplicateColumn(column.clone()));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl TryFrom<Vec<String>> for ColumnSchema {
    type Error = EncodeError;

    fn try_from(columns: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(columns)
    }
}

impl From<ColumnSchema> for Vec<String> {
    fn from(schema: ColumnSchema) -> Self {
        schema.columns
    }
}
