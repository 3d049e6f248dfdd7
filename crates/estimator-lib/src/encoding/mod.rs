//! Train/serve encoding contract
//!
//! Maps raw rows into the exact positional vector the regressor was fit on,
//! and maps the log-space model output back into a price. The trainer and
//! the predictor both go through [`FeatureEncoder`], so there is a single
//! code path for column order, categorical codes and missing-value defaults.

mod encoder;
mod label;
mod schema;
mod target;

pub use encoder::{CategoricalEncoders, EncodedRow, FeatureEncoder, UnseenLabel};
pub use label::{LabelEncoder, LabelLookup};
pub use schema::ColumnSchema;
pub use target::{inverse_target, transform_target};

use thiserror::Error;

/// Errors raised while building or applying the encoding contract
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EncodeError {
    #[error("label encoder has no labels")]
    NoLabels,

    #[error("label codes must be contiguous from 0 to {expected}")]
    NonContiguousCodes { expected: usize },

    #[error("duplicate column '{0}' in schema")]
    DuplicateColumn(String),

    #[error("encoder column '{0}' is not part of the schema")]
    UnknownEncoderColumn(String),

    #[error("column '{column}' expects a number, got '{value}'")]
    NonNumeric { column: String, value: String },
}
