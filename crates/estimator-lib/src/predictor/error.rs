//! Prediction error kinds

use crate::encoding::EncodeError;
use thiserror::Error;

/// Why a prediction could not be produced
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    /// No bundle was loaded at startup
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The caller sent something the encoder cannot use
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The model produced an unusable result
    #[error("internal error: {0}")]
    Internal(String),
}

impl PredictError {
    /// Stable label used for metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::ModelUnavailable(_) => "model_unavailable",
            PredictError::InvalidRequest(_) => "invalid_request",
            PredictError::Internal(_) => "internal",
        }
    }
}

impl From<EncodeError> for PredictError {
    fn from(err: EncodeError) -> Self {
        PredictError::InvalidRequest(err.to_string())
    }
}
